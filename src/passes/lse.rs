//! Load-Store Elimination (component E, §4.E).
//!
//! Per-block heap model plus a forward RPO walk with a conservative join at
//! merge points and loop-invariant hoisting of loads into the pre-header.
//! Aliasing decisions go through `AliasAnalysis` so a sharper implementation
//! can be swapped in without touching this pass.

use crate::analyses::alias::{AliasAnalysis, AliasKind, ConservativeAliasAnalysis};
use crate::common::error::OptResult;
use crate::common::fx_hash::{FxHashMap, FxHashSet};
use crate::config::Options;
use crate::ir::{BlockId, EquivClass, Graph, InstId, InstKind, LoopId};
use crate::passes::Pass;

/// §4.E "HeapValue": one entry per tracked memory slot.
#[derive(Debug, Clone, Copy)]
struct HeapValue {
    origin: InstId,
    val: InstId,
    read: bool,
    local: bool,
}

/// Per-block heap, keyed by the representative memory instruction whose
/// operands define the slot.
type Heap = FxHashMap<InstId, HeapValue>;

pub struct LoadStoreElimination;

impl Pass for LoadStoreElimination {
    type Options = Options;

    #[tracing::instrument(level = "debug", skip_all)]
    fn run(graph: &mut Graph, options: &Options) -> OptResult<bool> {
        if !options.lse.enabled {
            return Ok(false);
        }
        let aa = ConservativeAliasAnalysis;
        Ok(run_on_graph(graph, &aa, &options.lse))
    }
}

fn run_on_graph(graph: &mut Graph, aa: &dyn AliasAnalysis, opts: &crate::config::LseOptions) -> bool {
    let rpo = graph.compute_rpo();
    let mut block_heaps: FxHashMap<BlockId, Heap> = FxHashMap::default();
    let mut elim: FxHashMap<InstId, (InstId, InstId)> = FxHashMap::default(); // elim -> (origin, val)
    let mut shadow_candidates: Vec<InstId> = Vec::new();
    let mut changed = false;

    for &block in &rpo {
        let (mut heap, synthesized_phi) = join_predecessors(graph, &block_heaps, block);
        changed |= synthesized_phi;
        let mut aa_calls = 0u32;
        let mut base_accesses: FxHashMap<InstId, u32> = FxHashMap::default();
        let insts: Vec<InstId> = graph.non_phi_insts_in_block(block).collect();

        for inst in insts {
            let kind = graph.inst(inst).kind.clone();

            if kind.is_heap_invalidating() {
                heap.clear();
                continue;
            }
            if kind.is_heap_reading() {
                for hv in heap.values_mut() {
                    hv.read = true;
                }
                continue;
            }
            let Some(class) = kind.equiv_class() else { continue };
            if !eliminable(graph, inst) {
                continue;
            }

            // §4.E "Alias-call budget": a per-base-object access cap,
            // separate from the per-block `aa_calls_limit`.
            if let Some(&base) = graph.inst(inst).inputs.first() {
                let count = base_accesses.entry(base).or_insert(0);
                *count += 1;
                if *count > opts.ls_access_limit {
                    heap.clear();
                    continue;
                }
            }

            if kind.is_load() {
                aa_calls += 1;
                if aa_calls > opts.aa_calls_limit {
                    heap.clear();
                    continue;
                }
                if let Some((&key, hv)) = heap
                    .iter()
                    .find(|(&k, hv)| hv_class(graph, k) == Some(class) && aa.alias(graph, inst, k) == AliasKind::MustAlias)
                {
                    elim.insert(inst, (hv.origin, hv.val));
                } else {
                    heap.insert(inst, HeapValue { origin: inst, val: inst, read: false, local: false });
                }
            } else if kind.is_store() {
                let v = *graph.inst(inst).inputs.last().expect("store has a value operand");
                aa_calls += 1;
                if aa_calls > opts.aa_calls_limit {
                    heap.clear();
                    continue;
                }
                let must_match = heap.iter().find(|(&k, hv)| {
                    hv_class(graph, k) == Some(class) && aa.alias(graph, inst, k) == AliasKind::MustAlias && hv.val == v
                });
                if must_match.is_some() {
                    elim.insert(inst, (inst, v));
                    continue;
                }
                let mut shadow_candidate = None;
                heap.retain(|&k, hv| {
                    if hv_class(graph, k) != Some(class) {
                        return true;
                    }
                    match aa.alias(graph, inst, k) {
                        AliasKind::NoAlias => true,
                        AliasKind::MustAlias => {
                            // §4.E: shadow registration requires a MUST_ALIAS
                            // eviction — a MAY_ALIAS eviction doesn't prove
                            // `inst` actually overwrites `k`'s slot, so it
                            // must not be treated as shadowing it.
                            if !hv.read && graph.inst(hv.origin).kind.is_store() {
                                shadow_candidate = Some(hv.origin);
                            }
                            false
                        }
                        AliasKind::MayAlias => false,
                    }
                });
                if let Some(shadowed_store) = shadow_candidate {
                    shadow_candidates.push(shadowed_store);
                }
                heap.insert(inst, HeapValue { origin: inst, val: v, read: false, local: false });
            }
        }

        block_heaps.insert(block, heap);
    }

    changed |= materialize_loop_header_phis(graph, aa, &block_heaps);

    if opts.hoist_loads {
        hoist_loop_invariant_loads(graph, aa);
    }

    let order: Vec<InstId> = elim.keys().copied().collect();
    for inst in order {
        let (_, mut val) = elim[&inst];
        let mut guard = 0;
        while let Some(&(_, deeper)) = elim.get(&val) {
            if deeper == val || guard > 64 {
                break;
            }
            val = deeper;
            guard += 1;
        }
        if graph.inst(inst).ty == graph.inst(val).ty {
            graph.replace_users(inst, val);
            crate::bridges::SaveStateBridgesBuilder::fix_inst_usage(graph, val);
            if graph.inst(inst).users.is_empty() {
                graph.erase_inst(inst);
                changed = true;
            }
        }
    }
    for store in shadow_candidates {
        if graph.inst(store).users.is_empty() && is_fully_shadowed(graph, aa, store) {
            graph.erase_inst(store);
            changed = true;
        }
    }

    changed
}

/// §4.E "Shadow-store elimination": `shadowed` is fully shadowed iff every
/// CFG path from it to procedure exit crosses another MUST_ALIAS store to
/// its slot before any intervening read. DFS forward from `shadowed`'s
/// position, stopping each path as soon as it is resolved one way or the
/// other; a cycle that never resolves is treated conservatively as
/// unshadowed.
fn is_fully_shadowed(graph: &Graph, aa: &dyn AliasAnalysis, shadowed: InstId) -> bool {
    let class = graph.inst(shadowed).kind.equiv_class();
    let start_block = graph.inst(shadowed).block;
    let mut visiting: FxHashSet<BlockId> = FxHashSet::default();
    shadow_dfs_block(graph, aa, shadowed, class, start_block, true, &mut visiting)
}

fn shadow_dfs_block(
    graph: &Graph,
    aa: &dyn AliasAnalysis,
    shadowed: InstId,
    class: Option<EquivClass>,
    block: BlockId,
    skip_to_after: bool,
    visiting: &mut FxHashSet<BlockId>,
) -> bool {
    let insts: Vec<InstId> = graph.insts_in_block(block).collect();
    let mut past_shadowed = !skip_to_after;
    for inst in insts {
        if !past_shadowed {
            if inst == shadowed {
                past_shadowed = true;
            }
            continue;
        }
        if inst == shadowed {
            continue;
        }
        let kind = graph.inst(inst).kind.clone();
        if kind.equiv_class() == class {
            if kind.is_load() {
                if aa.alias(graph, inst, shadowed).may_or_must() {
                    return false; // intervening read before any resolving store
                }
            } else if kind.is_store() && aa.alias(graph, inst, shadowed) == AliasKind::MustAlias {
                return true; // overwritten on this path before any read
            }
        }
        if kind.is_heap_reading() || kind.is_heap_invalidating() {
            return false;
        }
    }

    let successors = graph.block(block).successors.clone();
    if successors.is_empty() {
        return false; // reached procedure exit without a shadowing store
    }
    if !visiting.insert(block) {
        return false; // revisiting a block on this DFS without resolving: give up
    }
    let resolved =
        successors.iter().all(|&succ| shadow_dfs_block(graph, aa, shadowed, class, succ, false, visiting));
    visiting.remove(&block);
    resolved
}

fn hv_class(graph: &Graph, inst: InstId) -> Option<EquivClass> {
    graph.inst(inst).kind.equiv_class()
}

/// §4.E "instruction eliminability": no barrier (volatile), and not in an
/// irreducible/OSR/try-catch loop.
fn eliminable(graph: &Graph, inst: InstId) -> bool {
    if graph.inst(inst).kind.is_volatile() {
        return false;
    }
    let block = graph.inst(inst).block;
    match graph.block(block).loop_id {
        Some(loop_id) => !graph.loop_(loop_id).opts_disabled(),
        None => true,
    }
}

/// §4.E "Per-block join": an entry survives when every predecessor agrees
/// on both key and value. When predecessors agree on the key but disagree
/// only on value, synthesize a phi in `block` (inputs positionally aligned
/// with `block`'s predecessor list) and use it as the merged value — unless
/// the block is a catch entry, its loop is irreducible, or some
/// predecessor's incoming value wasn't itself defined in that predecessor
/// (so there's no single well-formed phi input to use), in which case the
/// entry is dropped instead.
fn join_predecessors(graph: &mut Graph, block_heaps: &FxHashMap<BlockId, Heap>, block: BlockId) -> (Heap, bool) {
    let preds = graph.block(block).predecessors.clone();
    if preds.is_empty() || preds.iter().any(|p| !block_heaps.contains_key(p)) {
        // Entry block, or a predecessor not yet processed (a loop
        // back-edge): starting empty is always a sound approximation.
        return (Heap::default(), false);
    }

    let allow_phi = !graph.block(block).flags.catch_begin
        && match graph.block(block).loop_id {
            Some(loop_id) => !graph.loop_(loop_id).flags.irreducible,
            None => true,
        };

    let mut merged = Heap::default();
    let mut synthesized_phi = false;
    let first_heap = &block_heaps[&preds[0]];
    'key: for (&key, first_hv) in first_heap.iter() {
        let mut per_pred_vals: Vec<InstId> = Vec::with_capacity(preds.len());
        let mut all_agree = true;
        let mut all_read = true;
        for &pred in &preds {
            let Some(hv) = block_heaps[&pred].get(&key) else { continue 'key };
            per_pred_vals.push(hv.val);
            all_read &= hv.read;
            all_agree &= hv.val == first_hv.val;
        }
        if all_agree {
            merged.insert(key, HeapValue { origin: first_hv.origin, val: first_hv.val, read: all_read, local: first_hv.local });
            continue;
        }
        if !allow_phi {
            continue;
        }
        let originates_locally =
            preds.iter().zip(&per_pred_vals).all(|(&pred, &val)| graph.inst(val).block == pred);
        if !originates_locally {
            continue;
        }
        let ty = graph.inst(per_pred_vals[0]).ty;
        if per_pred_vals.iter().any(|&v| graph.inst(v).ty != ty) {
            continue;
        }
        let phi = graph.create_inst(InstKind::Phi, ty, per_pred_vals);
        graph.prepend_inst(block, phi);
        synthesized_phi = true;
        merged.insert(key, HeapValue { origin: phi, val: phi, read: false, local: true });
    }
    (merged, synthesized_phi)
}

/// §4.E "Loop headers", the MUST_ALIAS-store case: a candidate slot is one
/// with a known value at the end of the pre-header, that is both read and
/// written (MUST_ALIAS) somewhere in the loop body. If the loop body never
/// stores to the slot, the loads-only half is handled by
/// `hoist_loop_invariant_loads` instead. If it does, synthesize a phi in the
/// header — pre-header input is the candidate's pre-header value, back-edge
/// inputs are each back edge's last MUST_ALIAS value for the slot — and
/// replace every MUST_ALIAS load in the loop with it.
fn materialize_loop_header_phis(graph: &mut Graph, aa: &dyn AliasAnalysis, block_heaps: &FxHashMap<BlockId, Heap>) -> bool {
    let loop_ids: Vec<LoopId> = graph.loop_ids().filter(|&id| id != graph.root_loop()).collect();
    let mut changed = false;

    for loop_id in loop_ids {
        let l = graph.loop_(loop_id).clone();
        if l.opts_disabled() {
            continue;
        }
        let (Some(pre_header), Some(header)) = (l.pre_header, l.header) else { continue };
        if graph.block(header).flags.catch_begin {
            continue;
        }
        let Some(pre_heap) = block_heaps.get(&pre_header) else { continue };

        let candidates: Vec<(InstId, InstId, Option<EquivClass>)> =
            pre_heap.iter().map(|(&key, hv)| (key, hv.val, hv_class(graph, key))).collect();
        let inner_blocks = inner_loop_blocks(graph, &l);

        'candidate: for (key, pre_val, class) in candidates {
            let mut loads: Vec<InstId> = Vec::new();
            let mut has_store = false;

            for &b in &l.blocks {
                if b == pre_header {
                    continue;
                }
                for inst in graph.insts_in_block(b).collect::<Vec<_>>() {
                    let kind = graph.inst(inst).kind.clone();
                    if kind.equiv_class() != class {
                        continue;
                    }
                    if kind.is_load() {
                        if aa.alias(graph, inst, key) == AliasKind::MustAlias {
                            loads.push(inst);
                        }
                    } else if kind.is_store() && aa.alias(graph, inst, key) == AliasKind::MustAlias {
                        has_store = true;
                        if inner_blocks.contains(&b) {
                            continue 'candidate; // disqualified: store lives in a nested loop
                        }
                    }
                }
            }
            if !has_store || loads.is_empty() {
                continue;
            }

            let preds = graph.block(header).predecessors.clone();
            let ty = graph.inst(pre_val).ty;
            let mut inputs: Vec<InstId> = Vec::with_capacity(preds.len());
            for &pred in &preds {
                let val = if pred == pre_header {
                    Some(pre_val)
                } else {
                    last_must_alias_value(graph, aa, block_heaps, pred, key, class)
                };
                let Some(val) = val else { continue 'candidate };
                if graph.inst(val).ty != ty {
                    continue 'candidate;
                }
                inputs.push(val);
            }

            let phi = graph.create_inst(InstKind::Phi, ty, inputs);
            graph.prepend_inst(header, phi);
            changed = true;
            for load in loads {
                graph.replace_users(load, phi);
                crate::bridges::SaveStateBridgesBuilder::fix_inst_usage(graph, phi);
                if graph.inst(load).users.is_empty() {
                    graph.erase_inst(load);
                }
            }
        }
    }

    changed
}

/// The value a loop-header phi should carry in from `pred`, a back-edge
/// block: the value left in `pred`'s final heap state for a slot that
/// MUST_ALIAS with `key`, or, failing that (the slot was evicted by the
/// budget caps before the block ended), the value operand of the last
/// MUST_ALIAS store found by walking `pred` backwards.
fn last_must_alias_value(
    graph: &Graph,
    aa: &dyn AliasAnalysis,
    block_heaps: &FxHashMap<BlockId, Heap>,
    pred: BlockId,
    key: InstId,
    class: Option<EquivClass>,
) -> Option<InstId> {
    if let Some(heap) = block_heaps.get(&pred) {
        if let Some((_, hv)) = heap.iter().find(|(&k, _)| hv_class(graph, k) == class && aa.alias(graph, k, key) == AliasKind::MustAlias) {
            return Some(hv.val);
        }
    }
    graph.insts_in_block(pred).collect::<Vec<_>>().into_iter().rev().find_map(|inst| {
        let kind = graph.inst(inst).kind.clone();
        if kind.is_store() && kind.equiv_class() == class && aa.alias(graph, inst, key) == AliasKind::MustAlias {
            graph.inst(inst).inputs.last().copied()
        } else {
            None
        }
    })
}

/// All blocks belonging to a loop nested inside `l`, transitively.
fn inner_loop_blocks(graph: &Graph, l: &crate::ir::Loop) -> FxHashSet<BlockId> {
    let mut set = FxHashSet::default();
    let mut stack = l.inner.clone();
    while let Some(id) = stack.pop() {
        let inner = graph.loop_(id);
        set.extend(inner.blocks.iter().copied());
        stack.extend(inner.inner.iter().copied());
    }
    set
}

/// §4.E "Hoisting": post-order over loops, move loads with no aliasing or
/// heap-invalidating instruction between the pre-header and the load, and
/// no loop-local dependency, into the pre-header.
fn hoist_loop_invariant_loads(graph: &mut Graph, aa: &dyn AliasAnalysis) {
    let loop_ids: Vec<LoopId> = graph.loop_ids().filter(|&id| id != graph.root_loop()).collect();
    for loop_id in loop_ids {
        let l = graph.loop_(loop_id).clone();
        if l.opts_disabled() {
            continue;
        }
        let Some(pre_header) = l.pre_header else { continue };

        let mut candidates: Vec<InstId> = Vec::new();
        for &b in &l.blocks {
            for inst in graph.non_phi_insts_in_block(b).collect::<Vec<_>>() {
                if graph.inst(inst).kind.is_load() && eliminable(graph, inst) {
                    candidates.push(inst);
                }
            }
        }

        'candidate: for load in candidates {
            let class = graph.inst(load).kind.equiv_class();
            for &b in &l.blocks {
                for other in graph.insts_in_block(b).collect::<Vec<_>>() {
                    if other == load {
                        continue;
                    }
                    let other_kind = graph.inst(other).kind.clone();
                    if other_kind.is_heap_invalidating() {
                        continue 'candidate;
                    }
                    if other_kind.equiv_class() == class
                        && (other_kind.is_store() || other_kind.is_load())
                        && aa.alias(graph, load, other).may_or_must()
                        && other != load
                    {
                        continue 'candidate;
                    }
                }
            }
            let depends_in_loop =
                graph.inst(load).inputs.iter().any(|&i| l.blocks.contains(&graph.inst(i).block));
            if depends_in_loop {
                continue;
            }

            let old_block = graph.inst(load).block;
            relocate_to_block(graph, load, old_block, pre_header);
            crate::bridges::SaveStateBridgesBuilder::fix_inst_usage(graph, load);
        }
    }
}

fn relocate_to_block(graph: &mut Graph, inst: InstId, from: BlockId, to: BlockId) {
    if let Some(pos) = graph.block_mut(from).insts.iter().position(|&i| i == inst) {
        graph.block_mut(from).insts.remove(pos);
    }
    let term = graph.terminator_of(to);
    graph.inst_mut(inst).block = to;
    match term {
        Some(t) => {
            let pos = graph.block_mut(to).insts.iter().position(|&i| i == t).unwrap();
            graph.block_mut(to).insts.insert(pos, inst);
        }
        None => graph.block_mut(to).insts.push(inst),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyses::dominators::DominatorTree;
    use crate::analyses::loop_analyzer::LoopAnalyzer;
    use crate::ir::{Arch, ConditionCode, ConstValue, Graph, MethodRef, Type};

    #[test]
    fn redundant_load_after_store_is_eliminated() {
        let mut g = Graph::new(MethodRef(0), Arch::X86_64);
        let entry = g.start_block();
        g.set_end_block(entry);

        let obj = g.create_inst(InstKind::Parameter { index: 0 }, Type::Reference, vec![]);
        let v = g.create_inst(InstKind::Parameter { index: 1 }, Type::I32, vec![]);
        let store = g.create_inst(InstKind::StoreObject { volatile: false }, Type::Void, vec![obj, v]);
        g.append_inst(entry, store);
        let load = g.create_inst(InstKind::LoadObject { volatile: false }, Type::I32, vec![obj]);
        g.append_inst(entry, load);
        let consumer = g.create_inst(InstKind::UnaryOpInst { op: crate::ir::UnaryOp::Neg }, Type::I32, vec![load]);
        g.append_inst(entry, consumer);
        let ret = g.create_inst(InstKind::ReturnVoid, Type::Void, vec![]);
        g.append_inst(entry, ret);

        let aa = ConservativeAliasAnalysis;
        run_on_graph(&mut g, &aa, &crate::config::LseOptions::default());
        assert_eq!(g.inst(consumer).inputs[0], v);
    }

    /// (B3) a volatile load is a barrier: the store ahead of it must
    /// survive even though nothing else reads through it.
    #[test]
    fn volatile_load_prevents_store_elimination() {
        let mut g = Graph::new(MethodRef(0), Arch::X86_64);
        let entry = g.start_block();
        g.set_end_block(entry);

        let obj = g.create_inst(InstKind::Parameter { index: 0 }, Type::Reference, vec![]);
        let v = g.create_inst(InstKind::Parameter { index: 1 }, Type::I32, vec![]);
        let store = g.create_inst(InstKind::StoreObject { volatile: false }, Type::Void, vec![obj, v]);
        g.append_inst(entry, store);
        let load = g.create_inst(InstKind::LoadObject { volatile: true }, Type::I32, vec![obj]);
        g.append_inst(entry, load);
        let consumer = g.create_inst(InstKind::UnaryOpInst { op: crate::ir::UnaryOp::Neg }, Type::I32, vec![load]);
        g.append_inst(entry, consumer);
        let ret = g.create_inst(InstKind::ReturnVoid, Type::Void, vec![]);
        g.append_inst(entry, ret);

        let aa = ConservativeAliasAnalysis;
        run_on_graph(&mut g, &aa, &crate::config::LseOptions::default());

        assert!(g.insts_in_block(entry).any(|i| i == store));
        assert_eq!(g.inst(consumer).inputs[0], load);
    }

    /// Dumps each live block's non-phi instruction kinds, for a cheap
    /// structural-equality check across two pass runs (L2).
    fn snapshot(g: &Graph) -> Vec<(BlockId, Vec<String>)> {
        g.block_ids()
            .map(|b| (b, g.insts_in_block(b).map(|i| format!("{:?}", g.inst(i).kind)).collect()))
            .collect()
    }

    /// (L2) a second LSE pass over an already-fixed-point graph is a no-op.
    #[test]
    fn lse_is_idempotent_after_a_fixed_point() {
        let mut g = Graph::new(MethodRef(0), Arch::X86_64);
        let entry = g.start_block();
        g.set_end_block(entry);

        let obj = g.create_inst(InstKind::Parameter { index: 0 }, Type::Reference, vec![]);
        let v = g.create_inst(InstKind::Parameter { index: 1 }, Type::I32, vec![]);
        let store = g.create_inst(InstKind::StoreObject { volatile: false }, Type::Void, vec![obj, v]);
        g.append_inst(entry, store);
        let load = g.create_inst(InstKind::LoadObject { volatile: false }, Type::I32, vec![obj]);
        g.append_inst(entry, load);
        let consumer = g.create_inst(InstKind::UnaryOpInst { op: crate::ir::UnaryOp::Neg }, Type::I32, vec![load]);
        g.append_inst(entry, consumer);
        let ret = g.create_inst(InstKind::ReturnVoid, Type::Void, vec![]);
        g.append_inst(entry, ret);

        let aa = ConservativeAliasAnalysis;
        run_on_graph(&mut g, &aa, &crate::config::LseOptions::default());
        let after_first = snapshot(&g);

        let changed = run_on_graph(&mut g, &aa, &crate::config::LseOptions::default());
        let after_second = snapshot(&g);

        assert!(!changed);
        pretty_assertions::assert_eq!(after_first, after_second);
    }

    /// §4.E "Loop headers", MUST_ALIAS-store case: a self-loop that loads
    /// and re-stores the same slot every iteration should get a header phi
    /// carrying the pre-header value on entry and the loop's own last store
    /// on the back edge, with the in-loop load replaced by it.
    #[test]
    fn loop_header_phi_replaces_must_alias_load_across_a_store() {
        let mut g = Graph::new(MethodRef(0), Arch::X86_64);
        let pre = g.start_block();
        let header = g.create_block();
        let exit = g.create_block();
        g.set_end_block(exit);

        let obj = g.create_inst(InstKind::Parameter { index: 0 }, Type::Reference, vec![]);
        let v1 = g.create_inst(InstKind::Parameter { index: 1 }, Type::I32, vec![]);
        let v2 = g.create_inst(InstKind::Parameter { index: 2 }, Type::I32, vec![]);
        let store_pre = g.create_inst(InstKind::StoreObject { volatile: false }, Type::Void, vec![obj, v1]);
        g.append_inst(pre, store_pre);
        let goto = g.create_inst(InstKind::Goto, Type::Void, vec![]);
        g.append_inst(pre, goto);
        g.add_edge(pre, header);

        let load = g.create_inst(InstKind::LoadObject { volatile: false }, Type::I32, vec![obj]);
        g.append_inst(header, load);
        let consumer = g.create_inst(InstKind::UnaryOpInst { op: crate::ir::UnaryOp::Neg }, Type::I32, vec![load]);
        g.append_inst(header, consumer);
        let store_header = g.create_inst(InstKind::StoreObject { volatile: false }, Type::Void, vec![obj, v2]);
        g.append_inst(header, store_header);
        let cond = g.create_inst(InstKind::Constant(ConstValue::Bool(true)), Type::Bool, vec![]);
        let br = g.create_inst(InstKind::If { cc: ConditionCode::Eq }, Type::Void, vec![cond]);
        g.append_inst(header, br);
        g.add_edge(header, header);
        g.add_edge(header, exit);

        let ret = g.create_inst(InstKind::ReturnVoid, Type::Void, vec![]);
        g.append_inst(exit, ret);

        let dom = DominatorTree::compute(&g);
        LoopAnalyzer::analyze(&mut g, &dom);

        let aa = ConservativeAliasAnalysis;
        run_on_graph(&mut g, &aa, &crate::config::LseOptions::default());

        let fed = g.inst(consumer).inputs[0];
        assert_ne!(fed, load, "the load should have been replaced by the header phi");
        assert_eq!(g.inst(fed).kind, InstKind::Phi);
        assert_eq!(g.inst(fed).inputs, vec![v1, v2]);
    }

    /// A MAY_ALIAS eviction must never register a shadow candidate: two
    /// stores to distinct, unrelated bases in the same equivalence class are
    /// MAY_ALIAS under the conservative oracle, so the first store must
    /// survive even though it's never read.
    #[test]
    fn distinct_base_stores_do_not_shadow_each_other() {
        let mut g = Graph::new(MethodRef(0), Arch::X86_64);
        let entry = g.start_block();
        g.set_end_block(entry);

        let o1 = g.create_inst(InstKind::Parameter { index: 0 }, Type::Reference, vec![]);
        let o2 = g.create_inst(InstKind::Parameter { index: 1 }, Type::Reference, vec![]);
        let v1 = g.create_inst(InstKind::Parameter { index: 2 }, Type::I32, vec![]);
        let v2 = g.create_inst(InstKind::Parameter { index: 3 }, Type::I32, vec![]);
        let store1 = g.create_inst(InstKind::StoreObject { volatile: false }, Type::Void, vec![o1, v1]);
        g.append_inst(entry, store1);
        let store2 = g.create_inst(InstKind::StoreObject { volatile: false }, Type::Void, vec![o2, v2]);
        g.append_inst(entry, store2);
        let ret = g.create_inst(InstKind::ReturnVoid, Type::Void, vec![]);
        g.append_inst(entry, ret);

        let aa = ConservativeAliasAnalysis;
        run_on_graph(&mut g, &aa, &crate::config::LseOptions::default());

        assert!(g.insts_in_block(entry).any(|i| i == store1), "unrelated store must not be erased as shadowed");
        assert!(g.insts_in_block(entry).any(|i| i == store2));
    }

    /// The positive counterpart: a store that is MUST_ALIAS-overwritten on
    /// every path to exit, with no intervening read, is genuinely dead.
    #[test]
    fn must_alias_overwrite_shadows_the_earlier_store() {
        let mut g = Graph::new(MethodRef(0), Arch::X86_64);
        let entry = g.start_block();
        g.set_end_block(entry);

        let obj = g.create_inst(InstKind::Parameter { index: 0 }, Type::Reference, vec![]);
        let v1 = g.create_inst(InstKind::Parameter { index: 1 }, Type::I32, vec![]);
        let v2 = g.create_inst(InstKind::Parameter { index: 2 }, Type::I32, vec![]);
        let store1 = g.create_inst(InstKind::StoreObject { volatile: false }, Type::Void, vec![obj, v1]);
        g.append_inst(entry, store1);
        let store2 = g.create_inst(InstKind::StoreObject { volatile: false }, Type::Void, vec![obj, v2]);
        g.append_inst(entry, store2);
        let ret = g.create_inst(InstKind::ReturnVoid, Type::Void, vec![]);
        g.append_inst(entry, ret);

        let aa = ConservativeAliasAnalysis;
        run_on_graph(&mut g, &aa, &crate::config::LseOptions::default());

        assert!(!g.insts_in_block(entry).any(|i| i == store1), "fully shadowed store should be erased");
        assert!(g.insts_in_block(entry).any(|i| i == store2));
    }
}
