//! `Inst`: the IR instruction node (component A, §3).
//!
//! Instructions are tagged variants (design note, §9: "polymorphism over
//! instruction kinds") dispatched by `match` rather than virtual calls. The
//! `Graph` arena owns every `Inst`; callers never see an `Inst` outside a
//! `&Graph`/`&mut Graph` borrow, which is what lets the "dominates or is a
//! constant/parameter" invariant (I1) be checked cheaply against `BlockId`
//! RPO positions instead of real pointers.

use cranelift_entity::entity_impl;

use crate::ir::block::BlockId;
use crate::ir::cc::ConditionCode;
use crate::ir::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstId(u32);
entity_impl!(InstId);

/// A back-edge: `inst` uses the owning instruction as input number `input_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Use {
    pub user: InstId,
    pub input_index: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstValue {
    Bool(bool),
    I64(i64),
    U64(u64),
    F64Bits(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    SDiv,
    UDiv,
    SRem,
    URem,
    And,
    Or,
    Xor,
    Shl,
    AShr,
    LShr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EquivClass {
    Array,
    Static,
    ConstantPool,
    Object,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeoptReason {
    InlineIc,
    NullCheck,
    BoundsCheck,
    NegativeCheck,
    TypeCheck,
    Generic,
}

/// Kind of a call family instruction (§3 "Call family").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    CallStatic,
    CallVirtual,
    CallResolvedVirtual,
    CallResolvedStatic,
    CallDynamic,
    Intrinsic,
}

/// Opaque handle into the runtime's method table (§6 runtime interface).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodRef(pub u32);

#[derive(Debug, Clone, PartialEq)]
pub enum InstKind {
    // --- Entry / constants ---
    Parameter { index: u32 },
    Constant(ConstValue),
    NullPtr,

    // --- SSA merge ---
    Phi,

    // --- Arithmetic ---
    BinOpInst { op: BinOp },
    UnaryOpInst { op: UnaryOp },

    // --- Branch primitives (§3) ---
    /// Three-valued signed comparator, result in {-1, 0, 1}.
    Cmp,
    /// Boolean relational producer over two operands.
    Compare { cc: ConditionCode },
    /// Bitwise AND used as a bit-test producer (rule E5 input).
    AndZero,
    /// `len(array) >= 0`-style length read; always non-negative (rule E3).
    LenArray,

    // --- Call family ---
    Call { kind: CallKind, method: MethodRef, inlined: bool },
    /// Marker left behind at a call site whose body has been spliced in
    /// (I4); destination cleared, SaveState kept.
    InlinedCallMarker { method: MethodRef },
    /// Paired with an `InlinedCallMarker` on every exit path of the
    /// inlined region (I4).
    ReturnInlined { barrier: bool },

    // --- Memory (§3 "Memory") ---
    LoadObject { volatile: bool },
    StoreObject { volatile: bool },
    LoadArray { volatile: bool },
    StoreArray { volatile: bool },
    LoadArrayPair { volatile: bool },
    StoreArrayPair { volatile: bool },
    LoadStatic { volatile: bool },
    StoreStatic { volatile: bool },
    LoadString,
    LoadType,
    LoadConstArray,
    FillConstArray,

    // --- Checks (§3 "Check") ---
    NullCheck,
    BoundsCheck,
    NegativeCheck,
    DeoptimizeIf { reason: DeoptReason },
    IsMustDeoptimize,
    /// Reads the runtime-attached class of a reference (used by
    /// devirtualization guards, §4.F).
    GetInstanceClass,
    /// Compares a loaded class against a compile-time-known class pointer;
    /// the devirtualization guard ladder is built from chained instances
    /// of this instruction (§4.F "Polymorphic inlining").
    CompareClass { class: u32 },

    // --- State / control ---
    SaveState,
    SafePoint,

    // --- Terminators (every non-empty block ends in exactly one of these) ---
    Goto,
    If { cc: ConditionCode },
    IfImm { cc: ConditionCode, imm: i64 },
    Return,
    ReturnVoid,
    Throw,
    Deoptimize { reason: DeoptReason },
}

impl InstKind {
    pub fn is_phi(&self) -> bool {
        matches!(self, InstKind::Phi)
    }

    pub fn is_constant_like(&self) -> bool {
        matches!(self, InstKind::Constant(_) | InstKind::NullPtr)
    }

    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            InstKind::Goto
                | InstKind::If { .. }
                | InstKind::IfImm { .. }
                | InstKind::Return
                | InstKind::ReturnVoid
                | InstKind::Throw
                | InstKind::Deoptimize { .. }
        )
    }

    /// True for Throw/Deoptimize: the block that ends in this never falls
    /// through or returns to the caller's control flow normally (used by
    /// §4.F "always throw" detection and splicing's return-block pairing).
    pub fn is_abrupt_exit(&self) -> bool {
        matches!(self, InstKind::Throw | InstKind::Deoptimize { .. })
    }

    pub fn is_call(&self) -> bool {
        matches!(self, InstKind::Call { .. })
    }

    /// Instructions whose §3 category requires a dominating SaveState (I2).
    pub fn requires_save_state(&self) -> bool {
        matches!(
            self,
            InstKind::Call { .. }
                | InstKind::NullCheck
                | InstKind::BoundsCheck
                | InstKind::NegativeCheck
                | InstKind::DeoptimizeIf { .. }
        )
    }

    pub fn equiv_class(&self) -> Option<EquivClass> {
        match self {
            InstKind::LoadArray { .. } | InstKind::StoreArray { .. } | InstKind::LoadArrayPair { .. }
            | InstKind::StoreArrayPair { .. } => Some(EquivClass::Array),
            InstKind::LoadStatic { .. } | InstKind::StoreStatic { .. } => Some(EquivClass::Static),
            InstKind::LoadConstArray | InstKind::FillConstArray | InstKind::LoadString | InstKind::LoadType => {
                Some(EquivClass::ConstantPool)
            }
            InstKind::LoadObject { .. } | InstKind::StoreObject { .. } => Some(EquivClass::Object),
            _ => None,
        }
    }

    pub fn is_volatile(&self) -> bool {
        matches!(
            self,
            InstKind::LoadObject { volatile: true }
                | InstKind::StoreObject { volatile: true }
                | InstKind::LoadArray { volatile: true }
                | InstKind::StoreArray { volatile: true }
                | InstKind::LoadArrayPair { volatile: true }
                | InstKind::StoreArrayPair { volatile: true }
                | InstKind::LoadStatic { volatile: true }
                | InstKind::StoreStatic { volatile: true }
        )
    }

    pub fn is_store(&self) -> bool {
        matches!(
            self,
            InstKind::StoreObject { .. }
                | InstKind::StoreArray { .. }
                | InstKind::StoreArrayPair { .. }
                | InstKind::StoreStatic { .. }
        )
    }

    pub fn is_load(&self) -> bool {
        matches!(
            self,
            InstKind::LoadObject { .. }
                | InstKind::LoadArray { .. }
                | InstKind::LoadArrayPair { .. }
                | InstKind::LoadStatic { .. }
                | InstKind::LoadString
                | InstKind::LoadType
                | InstKind::LoadConstArray
        )
    }

    /// §4.E "heap-invalidating instruction": volatile load, non-inlined
    /// call, init-class, resolve-field, monitor-enter, or a generic
    /// heap-invalidator flag.
    pub fn is_heap_invalidating(&self) -> bool {
        matches!(
            self,
            InstKind::LoadObject { volatile: true }
                | InstKind::LoadArray { volatile: true }
                | InstKind::LoadStatic { volatile: true }
                | InstKind::Call { inlined: false, .. }
        )
    }

    /// §4.E "heap-reading instruction": throw-capable, reference-returning
    /// intrinsic, volatile store, monitor-exit.
    pub fn is_heap_reading(&self) -> bool {
        matches!(
            self,
            InstKind::Throw
                | InstKind::StoreObject { volatile: true }
                | InstKind::StoreArray { volatile: true }
                | InstKind::StoreStatic { volatile: true }
                | InstKind::Call { kind: CallKind::Intrinsic, .. }
        )
    }
}

#[derive(Debug, Clone)]
pub struct Inst {
    pub id: InstId,
    pub kind: InstKind,
    pub ty: Type,
    pub block: BlockId,
    pub pc: u32,
    pub inputs: Vec<InstId>,
    pub users: Vec<Use>,
    pub(crate) marker: std::cell::Cell<u32>,
}

impl Inst {
    pub fn new(id: InstId, kind: InstKind, ty: Type, block: BlockId, pc: u32, inputs: Vec<InstId>) -> Self {
        Inst { id, kind, ty, block, pc, inputs, users: Vec::new(), marker: std::cell::Cell::new(0) }
    }

    pub fn is_reference_valued(&self) -> bool {
        self.ty.is_reference()
    }

    pub fn save_state_input(&self) -> Option<InstId> {
        if self.kind.requires_save_state() {
            self.inputs.last().copied()
        } else {
            None
        }
    }
}
