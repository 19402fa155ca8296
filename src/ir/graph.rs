//! `Graph`: the procedure-level IR owner (component A, §3).
//!
//! Owns every `Inst` and `BasicBlock` behind dense, stable indices
//! (`cranelift_entity::PrimaryMap`) — the "arena" of §3. Passes never hold
//! a `&Inst`/`&BasicBlock` across a mutation; they re-borrow through
//! `Graph` methods, which is what keeps the doubly-linked user lists (I1-I3)
//! consistent without unsafe aliasing.

use cranelift_entity::{EntityRef, PrimaryMap};

use crate::common::fx_hash::FxHashMap;
use crate::ir::block::{BasicBlock, BlockId, LoopId};
use crate::ir::cc::ConditionCode;
use crate::ir::inst::{ConstValue, Inst, InstId, InstKind, MethodRef, Use};
use crate::ir::loop_info::Loop;
use crate::ir::marker::MarkerHolder;
use crate::ir::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    X86_64,
    Aarch64,
    Riscv64,
}

/// A (call-site, caller) pair recorded when inlining devirtualizes through
/// CHA, so a driver can recompile `caller` if `callee`'s single-implementation
/// property is later invalidated (SPEC_FULL.md §B.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChaDependency {
    pub callee: MethodRef,
    pub caller: MethodRef,
}

fn const_key(ty: Type, val: ConstValue) -> (Type, ConstValue) {
    (ty, val)
}

pub struct Graph {
    pub method: MethodRef,
    pub arch: Arch,
    insts: PrimaryMap<InstId, Inst>,
    blocks: PrimaryMap<BlockId, BasicBlock>,
    loops: PrimaryMap<LoopId, Loop>,
    start_block: Option<BlockId>,
    end_block: Option<BlockId>,
    const_pool: FxHashMap<(Type, ConstValue), InstId>,
    null_ptr: Option<InstId>,
    next_marker_id: u32,
    /// §9 design note: the bytecode-optimizer mode flag. When set, bridge
    /// maintenance (component C) and loop hoisting (§4.E) are no-ops.
    bytecode_optimizer_mode: bool,
    pub cha_dependencies: Vec<ChaDependency>,
    next_pc: u32,
    /// `PrimaryMap` never releases a slot, so a removed block's id stays
    /// indexable forever; this tracks which ids `remove_block` has retired
    /// so `block_ids()` can still report live blocks only.
    removed_blocks: crate::common::fx_hash::FxHashSet<BlockId>,
}

impl Graph {
    pub fn new(method: MethodRef, arch: Arch) -> Self {
        let mut blocks = PrimaryMap::new();
        let start = blocks.push(BasicBlock::new(BlockId::from_u32(0)));
        {
            let b = &mut blocks[start];
            b.id = start;
            b.flags.start = true;
        }
        let mut loops = PrimaryMap::new();
        loops.push(Loop::root(LoopId::from_u32(0)));

        Graph {
            method,
            arch,
            insts: PrimaryMap::new(),
            blocks,
            loops,
            start_block: Some(start),
            end_block: None,
            const_pool: FxHashMap::default(),
            null_ptr: None,
            next_marker_id: 1,
            bytecode_optimizer_mode: false,
            cha_dependencies: Vec::new(),
            next_pc: 0,
            removed_blocks: crate::common::fx_hash::FxHashSet::default(),
        }
    }

    // ---- Mode flag (§9) ----

    pub fn is_bytecode_optimizer_mode(&self) -> bool {
        self.bytecode_optimizer_mode
    }

    pub fn set_bytecode_optimizer_mode(&mut self, v: bool) {
        self.bytecode_optimizer_mode = v;
    }

    // ---- Blocks ----

    pub fn start_block(&self) -> BlockId {
        self.start_block.expect("graph always has a start block (I1)")
    }

    pub fn end_block(&self) -> Option<BlockId> {
        self.end_block
    }

    pub fn set_end_block(&mut self, id: BlockId) {
        debug_assert!(self.end_block.is_none(), "at most one end block (invariant)");
        self.blocks[id].flags.end = true;
        self.end_block = Some(id);
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.blocks[id]
    }

    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.blocks.keys().filter(|b| !self.removed_blocks.contains(b))
    }

    pub fn create_block(&mut self) -> BlockId {
        let id = self.blocks.next_key();
        let block = BasicBlock::new(id);
        self.blocks.push(block);
        id
    }

    pub fn add_edge(&mut self, from: BlockId, to: BlockId) {
        self.blocks[from].successors.push(to);
        self.blocks[to].predecessors.push(from);
    }

    pub fn remove_edge(&mut self, from: BlockId, to: BlockId) {
        if let Some(pos) = self.blocks[from].successors.iter().position(|&b| b == to) {
            self.blocks[from].successors.remove(pos);
        }
        if let Some(pos) = self.blocks[to].predecessors.iter().position(|&b| b == from) {
            self.blocks[to].predecessors.remove(pos);
        }
    }

    /// Swaps the two outgoing edges of a two-successor block and inverts
    /// its terminator's condition code, preserving semantics. Used by
    /// branch-elimination style peepholes that want the "likely" edge
    /// first.
    pub fn swap_successors(&mut self, block: BlockId) {
        debug_assert_eq!(self.blocks[block].successors.len(), 2);
        self.blocks[block].successors.swap(0, 1);
        if let Some(term) = self.terminator_of(block) {
            let inst = &mut self.insts[term];
            match &mut inst.kind {
                InstKind::If { cc } | InstKind::IfImm { cc, .. } => *cc = cc.inverse(),
                _ => {}
            }
        }
    }

    pub fn terminator_of(&self, block: BlockId) -> Option<InstId> {
        let b = &self.blocks[block];
        b.insts.last().copied().filter(|&i| self.insts[i].kind.is_terminator())
    }

    /// Removes a block entirely: erases every instruction it owns (which
    /// must by then have no users) and unlinks it from neighbors.
    pub fn remove_block(&mut self, block: BlockId) {
        let preds = self.blocks[block].predecessors.clone();
        let succs = self.blocks[block].successors.clone();
        for p in preds {
            if let Some(pos) = self.blocks[p].successors.iter().position(|&b| b == block) {
                self.blocks[p].successors.remove(pos);
            }
        }
        for s in succs {
            if let Some(pos) = self.blocks[s].predecessors.iter().position(|&b| b == block) {
                self.blocks[s].predecessors.remove(pos);
            }
        }
        let insts: Vec<InstId> = self.blocks[block].insts.clone();
        for i in insts.into_iter().rev() {
            self.force_erase_inst(i);
        }
        self.removed_blocks.insert(block);
    }

    // ---- Loops ----

    pub fn root_loop(&self) -> LoopId {
        LoopId::from_u32(0)
    }

    pub fn loop_(&self, id: LoopId) -> &Loop {
        &self.loops[id]
    }

    pub fn loop_mut(&mut self, id: LoopId) -> &mut Loop {
        &mut self.loops[id]
    }

    pub fn create_loop(&mut self) -> LoopId {
        let id = self.loops.next_key();
        self.loops.push(Loop { id, ..Loop::root(id) });
        self.loops[id].flags.root = false;
        id
    }

    pub fn loop_ids(&self) -> impl Iterator<Item = LoopId> + '_ {
        self.loops.keys()
    }

    // ---- Instructions ----

    pub fn inst(&self, id: InstId) -> &Inst {
        &self.insts[id]
    }

    pub fn inst_mut(&mut self, id: InstId) -> &mut Inst {
        &mut self.insts[id]
    }

    pub fn users_of(&self, id: InstId) -> &[Use] {
        &self.insts[id].users
    }

    fn fresh_pc(&mut self) -> u32 {
        self.next_pc += 1;
        self.next_pc
    }

    /// Creates a free-floating instruction (not yet in any block) and wires
    /// up the user back-edges on each of its inputs.
    pub fn create_inst(&mut self, kind: InstKind, ty: Type, inputs: Vec<InstId>) -> InstId {
        let pc = self.fresh_pc();
        let id = self.insts.next_key();
        for (idx, &input) in inputs.iter().enumerate() {
            self.insts[input].users.push(Use { user: id, input_index: idx as u32 });
        }
        let inst = Inst::new(id, kind, ty, self.start_block(), pc, inputs);
        self.insts.push(inst);
        id
    }

    /// Interns a constant (I5): equal (type, value) pairs share one Inst.
    pub fn intern_constant(&mut self, ty: Type, val: ConstValue) -> InstId {
        if let Some(&id) = self.const_pool.get(&const_key(ty, val)) {
            return id;
        }
        let id = self.create_inst(InstKind::Constant(val), ty, Vec::new());
        self.const_pool.insert(const_key(ty, val), id);
        id
    }

    /// The unique NullPtr instruction (I5).
    pub fn null_ptr(&mut self) -> InstId {
        if let Some(id) = self.null_ptr {
            return id;
        }
        let id = self.create_inst(InstKind::NullPtr, Type::Reference, Vec::new());
        self.null_ptr = Some(id);
        id
    }

    pub fn is_constant_pool_member(&self, id: InstId) -> bool {
        self.insts[id].kind.is_constant_like()
    }

    fn block_of_inst_is_none(&self, id: InstId) -> bool {
        // An instruction is "in" a block iff that block's inst list
        // contains it; free-floating instructions are simply absent from
        // every block's list. We scan the owner block recorded on the
        // Inst itself only after insertion, so prior to the first append
        // this check is vacuously true.
        !self.blocks.values().any(|b| b.insts.contains(&id))
    }

    pub fn append_inst(&mut self, block: BlockId, inst: InstId) {
        debug_assert!(
            self.block_of_inst_is_none(inst),
            "contract violation: inserting an instruction already owned by a block"
        );
        self.insts[inst].block = block;
        self.blocks[block].insts.push(inst);
    }

    pub fn prepend_inst(&mut self, block: BlockId, inst: InstId) {
        debug_assert!(self.block_of_inst_is_none(inst));
        self.insts[inst].block = block;
        let is_phi = self.insts[inst].kind.is_phi();
        let b = &mut self.blocks[block];
        if is_phi {
            b.insts.insert(0, inst);
        } else {
            let pos = b.insts.iter().take_while(|&&i| self.insts[i].kind.is_phi()).count();
            b.insts.insert(pos, inst);
        }
    }

    /// Inserts `inst` immediately after `after` in `after`'s block.
    pub fn insert_after(&mut self, after: InstId, inst: InstId) {
        debug_assert!(self.block_of_inst_is_none(inst));
        let block = self.insts[after].block;
        self.insts[inst].block = block;
        let b = &mut self.blocks[block];
        let pos = b.insts.iter().position(|&i| i == after).expect("`after` must be live in its block");
        b.insts.insert(pos + 1, inst);
    }

    pub fn insert_before(&mut self, before: InstId, inst: InstId) {
        debug_assert!(self.block_of_inst_is_none(inst));
        let block = self.insts[before].block;
        self.insts[inst].block = block;
        let b = &mut self.blocks[block];
        let pos = b.insts.iter().position(|&i| i == before).expect("`before` must be live in its block");
        b.insts.insert(pos, inst);
    }

    /// Erases an instruction. Contract: it must have no remaining users
    /// (a violation is a debug-mode assertion, per §7).
    pub fn erase_inst(&mut self, inst: InstId) {
        debug_assert!(
            self.insts[inst].users.is_empty(),
            "contract violation: erasing an instruction with remaining users"
        );
        self.force_erase_inst(inst);
    }

    /// Like `erase_inst` but used internally by `remove_block`, where the
    /// whole block (and hence every intra-block user) is going away
    /// together; callers outside this module should use `erase_inst`.
    fn force_erase_inst(&mut self, inst: InstId) {
        let block = self.insts[inst].block;
        if let Some(pos) = self.blocks[block].insts.iter().position(|&i| i == inst) {
            self.blocks[block].insts.remove(pos);
        }
        let inputs = self.insts[inst].inputs.clone();
        for input in inputs {
            if let Some(producer) = self.insts.get_mut(input) {
                producer.users.retain(|u| u.user != inst);
            }
        }
    }

    /// Rewrites every use of `old` to use `new` instead, preserving each
    /// use's input index, and updates both instructions' user lists.
    pub fn replace_users(&mut self, old: InstId, new: InstId) {
        if old == new {
            return;
        }
        let uses = std::mem::take(&mut self.insts[old].users);
        for u in &uses {
            self.insts[u.user].inputs[u.input_index as usize] = new;
            self.insts[new].users.push(*u);
        }
    }

    /// Appends `new_input` as an additional input of `inst`, recording the
    /// corresponding back-edge. Used for bridges (component C) and phi
    /// incoming-value construction.
    pub fn push_input(&mut self, inst: InstId, new_input: InstId) {
        let idx = self.insts[inst].inputs.len() as u32;
        self.insts[inst].inputs.push(new_input);
        self.insts[new_input].users.push(Use { user: inst, input_index: idx });
    }

    /// Removes the input at `idx` from `inst` (used when a Phi loses an
    /// incoming edge after a predecessor is disconnected). Shifts every
    /// later use's recorded `input_index` down by one so it stays correct.
    pub fn remove_input(&mut self, inst: InstId, idx: usize) {
        let removed = self.insts[inst].inputs.remove(idx);
        if let Some(producer) = self.insts.get_mut(removed) {
            if let Some(pos) = producer.users.iter().position(|u| u.user == inst && u.input_index == idx as u32) {
                producer.users.remove(pos);
            }
            for u in producer.users.iter_mut() {
                if u.user == inst && u.input_index > idx as u32 {
                    u.input_index -= 1;
                }
            }
        }
        // Other producers' back-edges into `inst` at higher indices must
        // also shift down.
        let later_inputs: Vec<InstId> = self.insts[inst].inputs[idx..].to_vec();
        for input in later_inputs {
            if let Some(producer) = self.insts.get_mut(input) {
                for u in producer.users.iter_mut() {
                    if u.user == inst && (u.input_index as usize) >= idx {
                        u.input_index -= 1;
                    }
                }
            }
        }
    }

    // ---- Iteration (component A "iterate") ----

    pub fn insts_in_block(&self, block: BlockId) -> impl Iterator<Item = InstId> + '_ {
        self.blocks[block].insts.iter().copied()
    }

    pub fn phis_in_block(&self, block: BlockId) -> impl Iterator<Item = InstId> + '_ {
        self.blocks[block].insts.iter().copied().take_while(move |&i| self.insts[i].kind.is_phi())
    }

    pub fn non_phi_insts_in_block(&self, block: BlockId) -> impl Iterator<Item = InstId> + '_ {
        self.blocks[block].insts.iter().copied().skip_while(move |&i| self.insts[i].kind.is_phi())
    }

    /// Reverse post-order over the blocks reachable from `start_block`.
    pub fn compute_rpo(&self) -> Vec<BlockId> {
        let start = self.start_block();
        let mut visited = vec![false; self.blocks.len()];
        let mut post_order = Vec::with_capacity(self.blocks.len());
        let mut stack: Vec<(BlockId, usize)> = vec![(start, 0)];
        visited[start.index()] = true;
        while let Some((block, next_succ)) = stack.pop() {
            let succs = &self.blocks[block].successors;
            if next_succ < succs.len() {
                let succ = succs[next_succ];
                stack.push((block, next_succ + 1));
                if !visited[succ.index()] {
                    visited[succ.index()] = true;
                    stack.push((succ, 0));
                }
            } else {
                post_order.push(block);
            }
        }
        post_order.reverse();
        post_order
    }

    // ---- Markers (§9) ----

    pub fn new_marker(&mut self) -> MarkerHolder {
        let id = self.next_marker_id;
        self.next_marker_id += 1;
        MarkerHolder::new(id)
    }

    // ---- Block splitting (component A op) ----

    /// Splits `block` immediately after `after`, moving every later
    /// instruction (including the terminator) into a fresh continuation
    /// block with the same successors and loop membership. `block` is left
    /// with a `Goto` to the continuation.
    pub fn split_block_after(&mut self, block: BlockId, after: InstId) -> BlockId {
        let cont = self.create_block();
        self.blocks[cont].loop_id = self.blocks[block].loop_id;

        let pos = self.blocks[block].insts.iter().position(|&i| i == after).expect("`after` lives in `block`");
        let tail: Vec<InstId> = self.blocks[block].insts.split_off(pos + 1);
        for &i in &tail {
            self.insts[i].block = cont;
        }
        self.blocks[cont].insts = tail;

        let old_succs = std::mem::take(&mut self.blocks[block].successors);
        for &s in &old_succs {
            if let Some(p) = self.blocks[s].predecessors.iter().position(|&b| b == block) {
                self.blocks[s].predecessors[p] = cont;
            }
        }
        self.blocks[cont].successors = old_succs;

        let goto = self.create_inst(InstKind::Goto, Type::Void, Vec::new());
        self.append_inst(block, goto);
        self.add_edge(block, cont);

        if self.end_block == Some(block) {
            self.blocks[block].flags.end = false;
            self.blocks[cont].flags.end = true;
            self.end_block = Some(cont);
        }

        cont
    }

    pub fn arch_supports_deopt(&self) -> bool {
        // All three targets named in §1 PURPOSE support deoptimization; this
        // is a Graph-level hook so a future target can opt out (§4.F rule 3).
        true
    }

    pub fn inst_count(&self) -> usize {
        self.insts.len()
    }

    pub fn inst_ids(&self) -> impl Iterator<Item = InstId> + '_ {
        self.insts.keys()
    }

    /// Removes `block`'s current terminator (if any) and appends `new_term`
    /// in its place. Used by inlining splicing to collapse a spliced-in
    /// `Return`/`ReturnVoid` into a `Goto` once its value has been
    /// substituted into the caller (§4.F "Splicing (control-flow)").
    pub fn replace_terminator(&mut self, block: BlockId, new_term: InstId) {
        let old = self.terminator_of(block);
        self.append_inst(block, new_term);
        if let Some(old) = old {
            self.erase_inst(old);
        }
    }

    /// Copies every block, instruction, and edge of `other` into `self`,
    /// remapping ids as it goes. Absorbed blocks start outside every loop;
    /// §4.B's contract applies here the same way it does to any other
    /// CFG-restructuring mutation — the caller reruns `LoopAnalyzer` before
    /// any pass that depends on loop membership runs again.
    pub fn absorb(&mut self, other: &Graph) -> GraphMapping {
        let mut blocks = FxHashMap::default();
        for old in other.block_ids() {
            blocks.insert(old, self.create_block());
        }

        let mut insts = FxHashMap::default();
        for old in other.inst_ids() {
            let placeholder = self.insts.push(Inst::new(
                InstId::from_u32(0),
                InstKind::Goto,
                Type::Void,
                self.start_block(),
                0,
                Vec::new(),
            ));
            insts.insert(old, placeholder);
        }
        for (&old, &new) in &insts {
            let src = other.inst(old);
            let new_inputs: Vec<InstId> = src.inputs.iter().map(|i| insts[i]).collect();
            let new_block = blocks[&src.block];
            let pc = self.fresh_pc();
            self.insts[new] = Inst::new(new, src.kind.clone(), src.ty, new_block, pc, new_inputs.clone());
            for (idx, &input) in new_inputs.iter().enumerate() {
                self.insts[input].users.push(Use { user: new, input_index: idx as u32 });
            }
        }

        for (&old_b, &new_b) in &blocks {
            let src = other.block(old_b);
            let remapped_insts = src.insts.iter().map(|i| insts[i]).collect();
            let remapped_preds = src.predecessors.iter().map(|b| blocks[b]).collect();
            let remapped_succs = src.successors.iter().map(|b| blocks[b]).collect();
            let b = &mut self.blocks[new_b];
            b.insts = remapped_insts;
            b.predecessors = remapped_preds;
            b.successors = remapped_succs;
            b.flags = src.flags;
            b.flags.start = false;
            b.flags.end = false;
        }

        GraphMapping { blocks }
    }
}

/// Old-id to new-id translation produced by `Graph::absorb`.
pub struct GraphMapping {
    blocks: FxHashMap<BlockId, BlockId>,
}

impl GraphMapping {
    pub fn block(&self, old: BlockId) -> BlockId {
        self.blocks[&old]
    }

    pub fn blocks(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.blocks.values().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_const() -> impl Strategy<Value = (Type, ConstValue)> {
        prop_oneof![
            any::<i64>().prop_map(|v| (Type::I64, ConstValue::I64(v))),
            any::<u64>().prop_map(|v| (Type::I64, ConstValue::U64(v))),
            any::<bool>().prop_map(|v| (Type::Bool, ConstValue::Bool(v))),
        ]
    }

    proptest! {
        /// P4: equal (type, value) pairs always intern to the same Inst.
        #[test]
        fn constants_with_equal_type_and_value_are_interned_to_one_inst(
            consts in prop::collection::vec(arb_const(), 1..20),
        ) {
            let mut g = Graph::new(MethodRef(0), Arch::X86_64);
            let mut seen: crate::common::fx_hash::FxHashMap<(Type, ConstValue), InstId> =
                crate::common::fx_hash::FxHashMap::default();
            for (ty, val) in consts {
                let id = g.intern_constant(ty, val);
                match seen.get(&(ty, val)) {
                    Some(&prior) => prop_assert_eq!(prior, id),
                    None => {
                        seen.insert((ty, val), id);
                    }
                }
            }
        }
    }
}
