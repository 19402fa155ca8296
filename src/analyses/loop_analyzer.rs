//! LoopAnalyzer (§4.B, consumed contract): natural loops, headers,
//! pre-headers, back-edges, inner/outer relation, irreducible/OSR/try-catch
//! classification.
//!
//! A back-edge is any CFG edge `n -> h` where `h` dominates `n` (standard
//! definition); the natural loop of that back-edge is `h` plus every block
//! that can reach `n` without passing through `h`. Multiple back-edges
//! sharing a header merge into one loop (§3 "a set of back-edge blocks").

use crate::analyses::dominators::DominatorTree;
use crate::common::fx_hash::{FxHashMap, FxHashSet};
use crate::ir::{BlockId, Graph, LoopId};

pub struct LoopAnalyzer;

impl LoopAnalyzer {
    /// Populates `graph`'s loop table and each block's `loop_id`, replacing
    /// whatever was there before (pass-restructuring invalidates this
    /// analysis; the caller reruns it, per §4.B).
    pub fn analyze(graph: &mut Graph, dom: &DominatorTree) {
        let rpo = graph.compute_rpo();

        let mut back_edges_by_header: FxHashMap<BlockId, Vec<BlockId>> = FxHashMap::default();
        for &b in &rpo {
            for &succ in &graph.block(b).successors.clone() {
                if dom.is_reachable(b) && dom.dominates(succ, b) {
                    back_edges_by_header.entry(succ).or_default().push(b);
                }
            }
        }

        for b in graph.block_ids().collect::<Vec<_>>() {
            graph.block_mut(b).loop_id = None;
            graph.block_mut(b).flags.loop_header = false;
        }

        for (&header, back_edges) in &back_edges_by_header {
            let mut body: FxHashSet<BlockId> = FxHashSet::default();
            body.insert(header);
            let mut worklist: Vec<BlockId> = back_edges.clone();
            while let Some(b) = worklist.pop() {
                if body.insert(b) {
                    for &p in &graph.block(b).predecessors.clone() {
                        worklist.push(p);
                    }
                }
            }

            let loop_id = graph.create_loop();
            {
                let l = graph.loop_mut(loop_id);
                l.header = Some(header);
                l.back_edges = back_edges.clone();
                l.blocks = body.iter().copied().collect();
            }

            let irreducible = body.iter().any(|&b| {
                b != header
                    && graph.block(b).predecessors.iter().any(|p| !body.contains(p))
            });
            graph.loop_mut(loop_id).flags.irreducible = irreducible;

            let pre_header = graph
                .block(header)
                .predecessors
                .iter()
                .copied()
                .find(|p| !back_edges.contains(p));
            graph.loop_mut(loop_id).pre_header = pre_header;

            graph.block_mut(header).flags.loop_header = true;
            for &b in &body {
                graph.block_mut(b).loop_id = Some(loop_id);
            }
        }

        Self::link_nesting(graph);
    }

    fn link_nesting(graph: &mut Graph) {
        let loop_ids: Vec<LoopId> = graph.loop_ids().filter(|&id| id != graph.root_loop()).collect();
        for &a in &loop_ids {
            let a_blocks: FxHashSet<BlockId> = graph.loop_(a).blocks.iter().copied().collect();
            let mut best: Option<LoopId> = None;
            let mut best_size = usize::MAX;
            for &b in &loop_ids {
                if a == b {
                    continue;
                }
                let b_blocks = &graph.loop_(b).blocks;
                if b_blocks.len() > a_blocks.len()
                    && a_blocks.iter().all(|x| b_blocks.contains(x))
                    && b_blocks.len() < best_size
                {
                    best_size = b_blocks.len();
                    best = Some(b);
                }
            }
            let outer = best.unwrap_or_else(|| graph.root_loop());
            graph.loop_mut(a).outer = Some(outer);
        }
        for &a in &loop_ids {
            let outer = graph.loop_(a).outer.unwrap();
            graph.loop_mut(outer).inner.push(a);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Arch, ConditionCode, ConstValue, Graph, InstKind, MethodRef, Type};

    fn simple_loop() -> (Graph, BlockId, BlockId, BlockId) {
        let mut g = Graph::new(MethodRef(0), Arch::X86_64);
        let pre = g.start_block();
        let header = g.create_block();
        let exit = g.create_block();
        g.set_end_block(exit);

        let goto = g.create_inst(InstKind::Goto, Type::Void, vec![]);
        g.append_inst(pre, goto);
        g.add_edge(pre, header);

        let cond = g.create_inst(InstKind::Constant(ConstValue::Bool(true)), Type::Bool, vec![]);
        let br = g.create_inst(InstKind::If { cc: ConditionCode::Eq }, Type::Void, vec![cond]);
        g.append_inst(header, br);
        g.add_edge(header, header); // back-edge to self
        g.add_edge(header, exit);

        let ret = g.create_inst(InstKind::ReturnVoid, Type::Void, vec![]);
        g.append_inst(exit, ret);

        (g, pre, header, exit)
    }

    #[test]
    fn detects_self_loop_header_and_preheader() {
        let (mut g, pre, header, _exit) = simple_loop();
        let dom = DominatorTree::compute(&g);
        LoopAnalyzer::analyze(&mut g, &dom);
        assert!(g.block(header).flags.loop_header);
        let loop_id = g.block(header).loop_id.expect("header has a loop");
        assert_eq!(g.loop_(loop_id).header, Some(header));
        assert_eq!(g.loop_(loop_id).pre_header, Some(pre));
        assert!(!g.loop_(loop_id).flags.irreducible);
    }
}
