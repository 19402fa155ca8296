//! `Loop`: natural-loop metadata produced by the (consumed) LoopAnalyzer (§3, §4.B).

use crate::ir::block::{BlockId, LoopId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopFlags {
    pub irreducible: bool,
    pub osr: bool,
    pub try_catch: bool,
    pub root: bool,
}

#[derive(Debug, Clone)]
pub struct Loop {
    pub id: LoopId,
    pub header: Option<BlockId>,
    pub pre_header: Option<BlockId>,
    pub back_edges: Vec<BlockId>,
    pub blocks: Vec<BlockId>,
    pub inner: Vec<LoopId>,
    pub outer: Option<LoopId>,
    pub flags: LoopFlags,
}

impl Loop {
    pub fn root(id: LoopId) -> Self {
        Loop {
            id,
            header: None,
            pre_header: None,
            back_edges: Vec::new(),
            blocks: Vec::new(),
            inner: Vec::new(),
            outer: None,
            flags: LoopFlags { root: true, ..Default::default() },
        }
    }

    pub fn is_root(&self) -> bool {
        self.flags.root
    }

    /// §4.E/§4.F treat irreducible, OSR, and try-catch loops as opaque: no
    /// hoisting, no phi-candidate tracking, no recursive inline descent.
    pub fn opts_disabled(&self) -> bool {
        self.flags.irreducible || self.flags.osr || self.flags.try_catch
    }
}
