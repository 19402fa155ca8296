//! `SaveStateBridgesBuilder` (component C, §4.C).
//!
//! Passes that relocate or clone a reference-valued instruction — splicing an
//! inlined callee's body into the caller (§4.F), hoisting a load out of a
//! loop (§4.E) — can widen the live range of that value across `SaveState`s
//! that never used to need to report it to the GC. This builder repairs
//! that: given the instruction and the point its use now lives at, it walks
//! every CFG path back to the instruction's defining block and adds the
//! instruction as an extra input of each `SaveState` it crosses, so the GC's
//! root set stays correct no matter how many bridges are in flight.
//!
//! A no-op in bytecode-optimizer mode (§4.C, §9): that mode's consumer
//! tracks liveness a different way and must not see extra `SaveState`
//! inputs appear underneath it.

use crate::common::fx_hash::FxHashSet;
use crate::ir::{BlockId, Graph, InstId, InstKind};

pub struct SaveStateBridgesBuilder;

impl SaveStateBridgesBuilder {
    /// Ensures every `SaveState` on a path from `source`'s defining block to
    /// `use_block` (exclusive of `source`'s own block) carries `source` as
    /// an input. Walks predecessors breadth-first, short-circuiting a path
    /// as soon as it reaches a `SaveState` that already lists `source` (the
    /// rest of that path was bridged by an earlier call) or reaches
    /// `source`'s own block.
    pub fn add_bridge(graph: &mut Graph, source: InstId, use_block: BlockId) {
        if graph.is_bytecode_optimizer_mode() {
            return;
        }
        let origin = graph.inst(source).block;
        if origin == use_block {
            return;
        }

        let mut visited: FxHashSet<BlockId> = FxHashSet::default();
        let mut worklist = vec![use_block];
        visited.insert(use_block);

        while let Some(block) = worklist.pop() {
            if block == origin {
                continue;
            }
            if Self::bridge_block(graph, source, block) {
                // Already bridged on an earlier call; this path is done.
                continue;
            }
            for &pred in &graph.block(block).predecessors.clone() {
                if pred != origin && visited.insert(pred) {
                    worklist.push(pred);
                }
            }
        }
    }

    /// Adds `source` to every `SaveState` instruction owned by `block`.
    /// Returns `true` if every such `SaveState` already carried `source`
    /// (the signal to stop walking further back along this path).
    fn bridge_block(graph: &mut Graph, source: InstId, block: BlockId) -> bool {
        let save_states: Vec<InstId> = graph
            .insts_in_block(block)
            .filter(|&i| matches!(graph.inst(i).kind, InstKind::SaveState))
            .collect();
        if save_states.is_empty() {
            return false;
        }
        let mut all_already_present = true;
        for ss in save_states {
            if graph.inst(ss).inputs.contains(&source) {
                continue;
            }
            all_already_present = false;
            graph.push_input(ss, source);
        }
        all_already_present
    }

    /// Re-bridges every user of `inst` that lives in a different block,
    /// used right after a pass moves `inst` itself (so its producer's block
    /// changed) rather than just adding a new distant user.
    pub fn fix_inst_usage(graph: &mut Graph, inst: InstId) {
        if graph.is_bytecode_optimizer_mode() || !graph.inst(inst).is_reference_valued() {
            return;
        }
        let user_blocks: Vec<BlockId> = graph
            .users_of(inst)
            .iter()
            .map(|u| graph.inst(u.user).block)
            .collect();
        for user_block in user_blocks {
            Self::add_bridge(graph, inst, user_block);
        }
    }

    /// Re-bridges every reference-valued instruction newly owned by `block`
    /// (e.g. after splicing a callee's body in, §4.F); called once per
    /// spliced block rather than once per instruction.
    pub fn fix_block(graph: &mut Graph, block: BlockId) {
        let insts: Vec<InstId> = graph.insts_in_block(block).collect();
        for inst in insts {
            Self::fix_inst_usage(graph, inst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Arch, ConditionCode, ConstValue, MethodRef, Type};

    /// entry (defines a reference) -> mid (has a SaveState) -> tail (uses the
    /// reference). Bridging from `tail` must add the reference to `mid`'s
    /// SaveState.
    fn chain() -> (Graph, InstId, InstId, BlockId) {
        let mut g = Graph::new(MethodRef(0), Arch::X86_64);
        let entry = g.start_block();
        let mid = g.create_block();
        let tail = g.create_block();
        g.set_end_block(tail);

        let obj = g.create_inst(InstKind::NullPtr, Type::Reference, vec![]);
        g.append_inst(entry, obj);
        let goto1 = g.create_inst(InstKind::Goto, Type::Void, vec![]);
        g.append_inst(entry, goto1);
        g.add_edge(entry, mid);

        let ss = g.create_inst(InstKind::SaveState, Type::Void, vec![]);
        g.append_inst(mid, ss);
        let goto2 = g.create_inst(InstKind::Goto, Type::Void, vec![]);
        g.append_inst(mid, goto2);
        g.add_edge(mid, tail);

        let ret = g.create_inst(InstKind::ReturnVoid, Type::Void, vec![]);
        g.append_inst(tail, ret);

        (g, obj, ss, tail)
    }

    #[test]
    fn bridges_intervening_save_state() {
        let (mut g, obj, ss, tail) = chain();
        assert!(!g.inst(ss).inputs.contains(&obj));
        SaveStateBridgesBuilder::add_bridge(&mut g, obj, tail);
        assert!(g.inst(ss).inputs.contains(&obj));
    }

    #[test]
    fn is_idempotent() {
        let (mut g, obj, ss, tail) = chain();
        SaveStateBridgesBuilder::add_bridge(&mut g, obj, tail);
        let count_before = g.inst(ss).inputs.iter().filter(|&&i| i == obj).count();
        SaveStateBridgesBuilder::add_bridge(&mut g, obj, tail);
        let count_after = g.inst(ss).inputs.iter().filter(|&&i| i == obj).count();
        assert_eq!(count_before, 1);
        assert_eq!(count_after, 1);
    }

    #[test]
    fn noop_in_bytecode_optimizer_mode() {
        let (mut g, obj, ss, tail) = chain();
        g.set_bytecode_optimizer_mode(true);
        SaveStateBridgesBuilder::add_bridge(&mut g, obj, tail);
        assert!(!g.inst(ss).inputs.contains(&obj));
    }
}
