//! DominatorTree (§4.B, consumed contract): `dominates(a, b)` and
//! `immediate_dominator(b)`.
//!
//! The tree is assumed valid between pass boundaries (§4.B): a pass that
//! restructures the CFG either maintains it incrementally or invalidates and
//! reruns `DominatorTree::compute`. We use the standard Cooper/Harvey/Kennedy
//! iterative algorithm over RPO, which is the textbook choice for this data
//! model (no parent pointers needed beyond immediate dominators).

use crate::common::fx_hash::FxHashMap;
use crate::ir::{BlockId, Graph};

pub struct DominatorTree {
    rpo: Vec<BlockId>,
    rpo_index: FxHashMap<BlockId, usize>,
    idom: FxHashMap<BlockId, BlockId>,
}

impl DominatorTree {
    pub fn compute(graph: &Graph) -> Self {
        let rpo = graph.compute_rpo();
        let mut rpo_index = FxHashMap::default();
        for (i, &b) in rpo.iter().enumerate() {
            rpo_index.insert(b, i);
        }

        let start = graph.start_block();
        let mut idom: FxHashMap<BlockId, BlockId> = FxHashMap::default();
        idom.insert(start, start);

        let mut changed = true;
        while changed {
            changed = false;
            for &b in rpo.iter().skip(1) {
                let preds: Vec<BlockId> =
                    graph.block(b).predecessors.iter().copied().filter(|p| idom.contains_key(p)).collect();
                let Some(&first) = preds.first() else { continue };
                let mut new_idom = first;
                for &p in preds.iter().skip(1) {
                    new_idom = Self::intersect(&rpo_index, &idom, new_idom, p);
                }
                if idom.get(&b) != Some(&new_idom) {
                    idom.insert(b, new_idom);
                    changed = true;
                }
            }
        }

        DominatorTree { rpo, rpo_index, idom }
    }

    fn intersect(
        rpo_index: &FxHashMap<BlockId, usize>,
        idom: &FxHashMap<BlockId, BlockId>,
        mut a: BlockId,
        mut b: BlockId,
    ) -> BlockId {
        while a != b {
            while rpo_index[&a] > rpo_index[&b] {
                a = idom[&a];
            }
            while rpo_index[&b] > rpo_index[&a] {
                b = idom[&b];
            }
        }
        a
    }

    pub fn immediate_dominator(&self, b: BlockId) -> Option<BlockId> {
        if self.rpo.first() == Some(&b) {
            return None; // the start block has no immediate dominator
        }
        self.idom.get(&b).copied()
    }

    /// `dominates(a, b)`: true when every path from start to `b` passes
    /// through `a` (a dominates itself).
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        if a == b {
            return self.rpo_index.contains_key(&a);
        }
        if !self.rpo_index.contains_key(&b) {
            return false;
        }
        let start = self.rpo[0];
        let mut cur = b;
        loop {
            if cur == start {
                return false;
            }
            cur = self.idom[&cur];
            if cur == a {
                return true;
            }
        }
    }

    pub fn is_reachable(&self, b: BlockId) -> bool {
        self.rpo_index.contains_key(&b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Arch, Graph, InstKind, MethodRef, Type};

    fn diamond() -> (Graph, BlockId, BlockId, BlockId, BlockId) {
        let mut g = Graph::new(MethodRef(0), Arch::X86_64);
        let b0 = g.start_block();
        let b1 = g.create_block();
        let b2 = g.create_block();
        let b3 = g.create_block();
        g.set_end_block(b3);

        let cond = g.create_inst(InstKind::Constant(crate::ir::ConstValue::Bool(true)), Type::Bool, vec![]);
        let term = g.create_inst(InstKind::If { cc: crate::ir::ConditionCode::Eq }, Type::Void, vec![cond]);
        g.append_inst(b0, term);
        g.add_edge(b0, b1);
        g.add_edge(b0, b2);

        let g1 = g.create_inst(InstKind::Goto, Type::Void, vec![]);
        g.append_inst(b1, g1);
        g.add_edge(b1, b3);

        let g2 = g.create_inst(InstKind::Goto, Type::Void, vec![]);
        g.append_inst(b2, g2);
        g.add_edge(b2, b3);

        let ret = g.create_inst(InstKind::ReturnVoid, Type::Void, vec![]);
        g.append_inst(b3, ret);

        (g, b0, b1, b2, b3)
    }

    #[test]
    fn diamond_join_dominated_only_by_entry() {
        let (g, b0, b1, b2, b3) = diamond();
        let dt = DominatorTree::compute(&g);
        assert!(dt.dominates(b0, b3));
        assert!(!dt.dominates(b1, b3));
        assert!(!dt.dominates(b2, b3));
        assert_eq!(dt.immediate_dominator(b3), Some(b0));
        assert_eq!(dt.immediate_dominator(b1), Some(b0));
        assert_eq!(dt.immediate_dominator(b2), Some(b0));
    }

    #[test]
    fn every_block_dominates_itself() {
        let (g, b0, b1, _b2, b3) = diamond();
        let dt = DominatorTree::compute(&g);
        assert!(dt.dominates(b0, b0));
        assert!(dt.dominates(b1, b1));
        assert!(dt.dominates(b3, b3));
    }
}
