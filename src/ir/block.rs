//! `BasicBlock`: an ordered sequence of phis then non-phi instructions (§3).

use cranelift_entity::entity_impl;

use crate::ir::inst::InstId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(u32);
entity_impl!(BlockId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoopId(u32);
entity_impl!(LoopId);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockFlags {
    pub try_begin: bool,
    pub try_end: bool,
    pub catch_begin: bool,
    pub catch: bool,
    pub loop_header: bool,
    pub osr_entry: bool,
    pub start: bool,
    pub end: bool,
}

#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub id: BlockId,
    /// Phis first, then non-phi instructions, in program order (§3).
    pub insts: Vec<InstId>,
    /// `successors[0]` is the true edge of a terminator, when applicable.
    pub predecessors: Vec<BlockId>,
    pub successors: Vec<BlockId>,
    pub loop_id: Option<LoopId>,
    pub flags: BlockFlags,
    pub(crate) marker: std::cell::Cell<u32>,
}

impl BasicBlock {
    pub fn new(id: BlockId) -> Self {
        BasicBlock {
            id,
            insts: Vec::new(),
            predecessors: Vec::new(),
            successors: Vec::new(),
            loop_id: None,
            flags: BlockFlags::default(),
            marker: std::cell::Cell::new(0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.insts.is_empty()
    }

    /// Phis live at the front of `insts` by construction (§3); this returns
    /// how many leading instructions are phis without needing a `Graph`
    /// borrow (callers that have one should prefer `Graph::phis_of`).
    pub fn phi_count(&self, is_phi: impl Fn(InstId) -> bool) -> usize {
        self.insts.iter().take_while(|&&i| is_phi(i)).count()
    }
}
