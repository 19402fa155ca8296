//! The runtime interface: method/class metadata, CHA, and the inline-cache
//! oracle (§6 "Runtime interface (consumed)"). This is an external
//! collaborator's contract, not something the core implements — §1 lists it
//! among "external collaborators whose contracts we consume". The core only
//! ever calls through `&dyn RuntimeInterface`, synchronously, and never
//! caches an answer past the pass invocation that asked for it (§5: "the
//! runtime interface... must be thread-safe internally — the core treats it
//! as a read-only oracle and does not lock").

use crate::ir::{Inst, MethodRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassRef(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntrinsicId(pub u32);

/// Receiver classification reported by the inline-cache oracle (glossary:
/// PIC).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InlineCacheKind {
    Monomorphic(ClassRef),
    Polymorphic(Vec<ClassRef>),
    Megamorphic,
    Unknown,
}

/// Type info attached to a reference-valued instruction by the (out-of-scope)
/// ObjectTypePropagation analysis; consulted by devirtualization (§4.F
/// target resolution, step 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectTypeInfo {
    pub class: ClassRef,
    /// True when the receiver's dynamic type is known to be exactly
    /// `class`, not merely assignable to it.
    pub exact: bool,
}

pub trait ClassHierarchyAnalysis {
    /// §6 `cha.is_single_implementation(method)`.
    fn is_single_implementation(&self, method: MethodRef) -> bool;
    /// §6 `cha.add_dependency(method, caller_method)`.
    fn add_dependency(&mut self, method: MethodRef, caller_method: MethodRef);
}

pub trait RuntimeInterface {
    fn resolve_virtual(&self, klass: ClassRef, method: MethodRef) -> Option<MethodRef>;
    fn resolve_interface(&self, klass: ClassRef, method: MethodRef) -> Option<MethodRef>;
    fn method_code_size(&self, method: MethodRef) -> u32;
    fn method_args_count(&self, method: MethodRef) -> u32;
    fn method_registers_count(&self, method: MethodRef) -> u32;
    fn method_is_final(&self, method: MethodRef) -> bool;
    fn class_is_final(&self, klass: ClassRef) -> bool;
    fn is_method_external(&self, method: MethodRef) -> bool;
    fn is_method_abstract(&self, method: MethodRef) -> bool;
    fn is_method_can_be_inlined(&self, method: MethodRef) -> bool;
    fn get_intrinsic_id(&self, method: MethodRef) -> Option<IntrinsicId>;
    fn get_ic_classes(&self, method: MethodRef, pc: u32) -> InlineCacheKind;
    /// Fully-qualified name, consulted for §4.F admissibility (blacklist /
    /// "no-inline" marker checks).
    fn method_name(&self, method: MethodRef) -> String;
    /// True if the runtime tags this callee's frame-exit as requiring a GC
    /// write barrier on every return (§4.F "Call-site finalization").
    fn method_requires_return_barrier(&self, method: MethodRef) -> bool;
}

/// Declared receiver class of a call's `this` argument, read off the call
/// site's static type (used when no dynamic type info is attached).
pub fn declared_class_of(_inst: &Inst) -> Option<ClassRef> {
    None
}
