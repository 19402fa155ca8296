//! Branch Elimination (component D, §4.D): fold `IfImm` terminators whose
//! condition is statically resolvable, then prune the now-unreachable
//! subgraph.
//!
//! Each rule only ever narrows or folds the *condition feeding* a block's
//! `IfImm`; actually disconnecting an edge always goes through
//! `eliminate_branch` so dead-block discovery and phi repair stay in one
//! place. We iterate blocks in RPO once (§4.D "re-run to a fixed point... is
//! not required") — a fold that creates a new folding opportunity is left
//! for the next pass invocation.

use crate::analyses::dominators::DominatorTree;
use crate::common::error::OptResult;
use crate::common::fx_hash::{FxHashMap, FxHashSet};
use crate::config::Options;
use crate::ir::{BlockId, ConditionCode, ConstValue, Graph, Inst, InstId, InstKind};
use crate::passes::Pass;

pub struct BranchElimination;

impl Pass for BranchElimination {
    type Options = Options;

    #[tracing::instrument(level = "debug", skip_all)]
    fn run(graph: &mut Graph, options: &Options) -> OptResult<bool> {
        if !options.branch_elimination_enabled {
            return Ok(false);
        }
        Ok(run_on_graph(graph))
    }
}

fn run_on_graph(graph: &mut Graph) -> bool {
    let dom = DominatorTree::compute(graph);
    let rpo = graph.compute_rpo();
    let mut changed = false;
    let mut dead_edges: Vec<(BlockId, BlockId)> = Vec::new();

    for block in rpo {
        let Some(term) = graph.terminator_of(block) else { continue };
        let InstKind::IfImm { cc, imm } = graph.inst(term).kind else { continue };
        let cond = match graph.inst(term).inputs.first().copied() {
            Some(c) => c,
            None => continue,
        };

        if let Some(new_cond) = simplify_condition(graph, cond) {
            if new_cond != cond {
                rewire_condition(graph, term, cond, new_cond);
                changed = true;
            }
        }

        let cond = graph.inst(term).inputs[0];
        if let Some(taken) = resolve_constant(graph, cond, cc, imm)
            .or_else(|| resolve_dominating(graph, &dom, block, cond, cc, imm))
        {
            let successors = graph.block(block).successors.clone();
            if successors.len() == 2 {
                let dead = if taken { successors[1] } else { successors[0] };
                dead_edges.push((block, dead));
            }
        }
    }

    for (block, dead) in dead_edges {
        if eliminate_branch(graph, block, dead) {
            changed = true;
        }
    }

    let orphans = mark_unreachable_blocks(graph);
    if !orphans.is_empty() {
        disconnect_blocks(graph, &orphans);
        changed = true;
    }

    changed
}

/// Applies E2/E3/E5/E6: rewrites `cond`'s *kind in place* where one of those
/// rules fires, returning `cond` unchanged when none apply. Folding into a
/// brand-new constant (E6, the "equal inputs" sub-case of E3) returns the
/// interned constant instruction instead of mutating `cond`.
fn simplify_condition(graph: &mut Graph, cond: InstId) -> Option<InstId> {
    let InstKind::Compare { cc } = graph.inst(cond).kind else { return None };
    let inputs = graph.inst(cond).inputs.clone();
    let (a, b) = (inputs[0], inputs[1]);

    // E6: Compare(a, a, cc) — equal operand identity folds to a constant.
    if a == b {
        let truth = cc.eval_signum(0);
        return Some(graph.intern_constant(crate::ir::Type::Bool, ConstValue::Bool(truth)));
    }

    // E2: Compare(Cmp(x, y), 0, cc) collapses to Compare(x, y, cc').
    if let InstKind::Cmp = graph.inst(a).kind {
        if is_zero(graph, b) {
            let cmp_inputs = graph.inst(a).inputs.clone();
            if cmp_inputs.len() == 2 {
                let signed = graph.inst(cmp_inputs[0]).ty.is_signed();
                let cc2 = if signed { cc } else { cc.to_unsigned() };
                let new = graph.create_inst(
                    InstKind::Compare { cc: cc2 },
                    crate::ir::Type::Bool,
                    vec![cmp_inputs[0], cmp_inputs[1]],
                );
                graph.insert_before(cond, new);
                return Some(new);
            }
        }
    }

    // E3: Compare(LenArray(r), 0, cc) — len >= 0 is an invariant.
    let (len_side, zero_side, swapped) = if matches!(graph.inst(a).kind, InstKind::LenArray) && is_zero(graph, b) {
        (Some(a), true, false)
    } else if matches!(graph.inst(b).kind, InstKind::LenArray) && is_zero(graph, a) {
        (Some(b), true, true)
    } else {
        (None, false, false)
    };
    if len_side.is_some() && zero_side {
        let eff_cc = if swapped { cc.swap_operands() } else { cc };
        let truth = match eff_cc {
            ConditionCode::Lt | ConditionCode::B => Some(false),
            ConditionCode::Ge | ConditionCode::Ae => Some(true),
            _ => None,
        };
        if let Some(t) = truth {
            return Some(graph.intern_constant(crate::ir::Type::Bool, ConstValue::Bool(t)));
        }
    }

    // E5: AndZero(x, y) cc 0 for cc in {EQ, NE} becomes a bit-test Compare.
    if matches!(graph.inst(a).kind, InstKind::AndZero) && is_zero(graph, b) && cc.is_equality() {
        let and_inputs = graph.inst(a).inputs.clone();
        if and_inputs.len() == 2 {
            let tst_cc = if cc == ConditionCode::Eq { ConditionCode::TstEq } else { ConditionCode::TstNe };
            let new = graph.create_inst(
                InstKind::Compare { cc: tst_cc },
                crate::ir::Type::Bool,
                vec![and_inputs[0], and_inputs[1]],
            );
            graph.insert_before(cond, new);
            return Some(new);
        }
    }

    None
}

fn is_zero(graph: &Graph, inst: InstId) -> bool {
    matches!(
        graph.inst(inst).kind,
        InstKind::Constant(ConstValue::I64(0))
            | InstKind::Constant(ConstValue::U64(0))
            | InstKind::Constant(ConstValue::Bool(false))
    )
}

fn rewire_condition(graph: &mut Graph, term: InstId, old: InstId, new: InstId) {
    graph.inst_mut(term).inputs[0] = new;
    if let Some(pos) = graph.inst(old).users.iter().position(|u| u.user == term) {
        let u = graph.inst(old).users[pos];
        graph.inst_mut(old).users.remove(pos);
        graph.inst_mut(new).users.push(u);
    }
}

/// E1: the condition input is already a compile-time constant.
fn resolve_constant(graph: &Graph, cond: InstId, cc: ConditionCode, imm: i64) -> Option<bool> {
    let v = match graph.inst(cond).kind {
        InstKind::Constant(ConstValue::Bool(b)) => b as i64,
        InstKind::Constant(ConstValue::I64(i)) => i,
        InstKind::Constant(ConstValue::U64(u)) => u as i64,
        _ => return None,
    };
    Some(cc.eval_signum((v - imm).signum() as i32))
}

/// E4: a dominating `IfImm` over the same two operands with a known
/// outcome on the path to `block` determines this test's outcome too.
fn resolve_dominating(
    graph: &Graph,
    dom: &DominatorTree,
    block: BlockId,
    cond: InstId,
    cc: ConditionCode,
    imm: i64,
) -> Option<bool> {
    let InstKind::Compare { cc: cmp_cc } = graph.inst(cond).kind else { return None };
    if imm != 1 && imm != 0 {
        return None;
    }
    let wanted = cc.eval_signum((1 - imm).signum() as i32); // does imm==1 correspond to "true"?
    let inputs = graph.inst(cond).inputs.clone();
    if inputs.len() != 2 {
        return None;
    }
    let (a, b) = (inputs[0], inputs[1]);

    let mut cur = block;
    while let Some(idom) = dom.immediate_dominator(cur) {
        if let Some(dom_term) = graph.terminator_of(idom) {
            if let InstKind::IfImm { cc: dcc, imm: dimm } = graph.inst(dom_term).kind {
                if let Some(dcond) = graph.inst(dom_term).inputs.first().copied() {
                    if let InstKind::Compare { cc: dcmp_cc } = graph.inst(dcond).kind {
                        let dinputs = graph.inst(dcond).inputs.clone();
                        if dinputs.len() == 2 {
                            let (same_order, matches) = if dinputs[0] == a && dinputs[1] == b {
                                (true, true)
                            } else if dinputs[0] == b && dinputs[1] == a {
                                (false, true)
                            } else {
                                (true, false)
                            };
                            if matches {
                                let successors = graph.block(idom).successors.clone();
                                if successors.len() == 2 {
                                    let took_true_edge = dom.dominates(successors[0], block) && !dom.dominates(successors[1], block);
                                    let took_false_edge = dom.dominates(successors[1], block) && !dom.dominates(successors[0], block);
                                    if took_true_edge || took_false_edge {
                                        let outcome_true = cc.eval_signum((1 - dimm).signum() as i32);
                                        let known_true = if took_true_edge { outcome_true } else { !outcome_true };
                                        let effective_dcc = if same_order { dcmp_cc } else { dcmp_cc.swap_operands() };
                                        if let Some(determined) = implied_truth(effective_dcc, known_true, cmp_cc) {
                                            return Some(determined == wanted);
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
        cur = idom;
    }
    None
}

/// Given that `Compare(_, _, cc_d)` is known to equal `known_true` on the
/// current path, determines (if possible) the truth of `Compare(_, _, cc)`
/// over the same operand pair, using the three-valued-compare semantics
/// both condition codes are defined over.
fn implied_truth(cc_d: ConditionCode, known_true: bool, cc: ConditionCode) -> Option<bool> {
    if cc_d.to_unsigned() == ConditionCode::TstEq || cc.to_unsigned() == ConditionCode::TstEq {
        // Bit-test codes aren't part of the shared signum algebra.
        if cc_d == cc {
            return Some(known_true);
        }
        if cc_d.inverse() == cc {
            return Some(!known_true);
        }
        return None;
    }
    let admitted: Vec<i32> = [-1, 0, 1].into_iter().filter(|&s| cc_d.eval_signum(s) == known_true).collect();
    if admitted.iter().all(|&s| cc.eval_signum(s)) {
        return Some(true);
    }
    if admitted.iter().all(|&s| !cc.eval_signum(s)) {
        return Some(false);
    }
    None
}

/// Disconnects `dead` as a successor of `if_block`, dropping its incoming
/// phi slot. Returns `false` if the edge was already gone (idempotent).
fn eliminate_branch(graph: &mut Graph, if_block: BlockId, dead: BlockId) -> bool {
    if !graph.block(if_block).successors.contains(&dead) {
        return false;
    }
    let pred_index = graph.block(dead).predecessors.iter().position(|&p| p == if_block);
    graph.remove_edge(if_block, dead);
    if let Some(idx) = pred_index {
        drop_phi_inputs(graph, dead, idx);
    }

    let term = graph.terminator_of(if_block).expect("if_block had an IfImm terminator");
    let cond = graph.inst(term).inputs[0];
    graph.inst_mut(term).kind = InstKind::Goto;
    graph.inst_mut(term).inputs.clear();
    if let Some(pos) = graph.inst(cond).users.iter().position(|u| u.user == term) {
        graph.inst_mut(cond).users.remove(pos);
    }
    true
}

fn drop_phi_inputs(graph: &mut Graph, block: BlockId, pred_index: usize) {
    let phis: Vec<InstId> = graph.phis_in_block(block).collect();
    for phi in phis {
        if pred_index < graph.inst(phi).inputs.len() {
            graph.remove_input(phi, pred_index);
        }
    }
}

/// BFS from the start block; any block not reached is dead.
fn mark_unreachable_blocks(graph: &Graph) -> FxHashSet<BlockId> {
    let mut reachable: FxHashSet<BlockId> = FxHashSet::default();
    let mut stack = vec![graph.start_block()];
    reachable.insert(graph.start_block());
    while let Some(b) = stack.pop() {
        for &s in &graph.block(b).successors {
            if reachable.insert(s) {
                stack.push(s);
            }
        }
    }
    graph.block_ids().filter(|b| !reachable.contains(b) && !graph.block(*b).flags.osr_entry).collect()
}

/// Deletes every block in `dead`, dropping phi slots in any surviving
/// successor first.
fn disconnect_blocks(graph: &mut Graph, dead: &FxHashSet<BlockId>) {
    for &b in dead {
        for &s in &graph.block(b).successors.clone() {
            if !dead.contains(&s) {
                if let Some(idx) = graph.block(s).predecessors.iter().position(|&p| p == b) {
                    drop_phi_inputs(graph, s, idx);
                }
            }
        }
    }
    for &b in dead {
        graph.remove_block(b);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Arch, MethodRef, Type};

    fn diamond_with_constant_cond(value: bool) -> (Graph, BlockId, BlockId, BlockId) {
        let mut g = Graph::new(MethodRef(0), Arch::X86_64);
        let entry = g.start_block();
        let then_b = g.create_block();
        let else_b = g.create_block();
        let join = g.create_block();
        g.set_end_block(join);

        let c = g.intern_constant(Type::Bool, ConstValue::Bool(value));
        let term = g.create_inst(InstKind::IfImm { cc: ConditionCode::Eq, imm: 1 }, Type::Void, vec![c]);
        g.append_inst(entry, term);
        g.add_edge(entry, then_b);
        g.add_edge(entry, else_b);

        let g1 = g.create_inst(InstKind::Goto, Type::Void, vec![]);
        g.append_inst(then_b, g1);
        g.add_edge(then_b, join);
        let g2 = g.create_inst(InstKind::Goto, Type::Void, vec![]);
        g.append_inst(else_b, g2);
        g.add_edge(else_b, join);

        let ret = g.create_inst(InstKind::ReturnVoid, Type::Void, vec![]);
        g.append_inst(join, ret);

        (g, entry, then_b, else_b)
    }

    #[test]
    fn e1_folds_constant_condition_and_prunes_dead_branch() {
        let (mut g, entry, then_b, else_b) = diamond_with_constant_cond(true);
        run_on_graph(&mut g);
        assert_eq!(g.block(entry).successors, vec![then_b]);
        assert!(!g.block_ids().any(|b| b == else_b));
    }

    #[test]
    fn e1_false_condition_prunes_then_branch() {
        let (mut g, entry, then_b, else_b) = diamond_with_constant_cond(false);
        run_on_graph(&mut g);
        assert_eq!(g.block(entry).successors, vec![else_b]);
        assert!(!g.block_ids().any(|b| b == then_b));
    }

    #[test]
    fn e6_equal_operands_fold_to_constant_then_prune() {
        let mut g = Graph::new(MethodRef(0), Arch::X86_64);
        let entry = g.start_block();
        let then_b = g.create_block();
        let else_b = g.create_block();
        g.set_end_block(else_b);

        let x = g.create_inst(InstKind::Parameter { index: 0 }, Type::I32, vec![]);
        let cmp = g.create_inst(InstKind::Compare { cc: ConditionCode::Eq }, Type::Bool, vec![x, x]);
        let term = g.create_inst(InstKind::IfImm { cc: ConditionCode::Eq, imm: 1 }, Type::Void, vec![cmp]);
        g.append_inst(entry, term);
        g.add_edge(entry, then_b);
        g.add_edge(entry, else_b);
        let g1 = g.create_inst(InstKind::ReturnVoid, Type::Void, vec![]);
        g.append_inst(then_b, g1);
        let g2 = g.create_inst(InstKind::ReturnVoid, Type::Void, vec![]);
        g.append_inst(else_b, g2);

        run_on_graph(&mut g);
        assert_eq!(g.block(entry).successors, vec![then_b]);
    }

    #[test]
    fn e3_array_length_nonnegative_invariant_folds() {
        let mut g = Graph::new(MethodRef(0), Arch::X86_64);
        let entry = g.start_block();
        let then_b = g.create_block();
        let else_b = g.create_block();
        g.set_end_block(else_b);

        let arr = g.create_inst(InstKind::Parameter { index: 0 }, Type::Reference, vec![]);
        let len = g.create_inst(InstKind::LenArray, Type::I32, vec![arr]);
        let zero = g.intern_constant(Type::I32, ConstValue::I64(0));
        let cmp = g.create_inst(InstKind::Compare { cc: ConditionCode::Lt }, Type::Bool, vec![len, zero]);
        let term = g.create_inst(InstKind::IfImm { cc: ConditionCode::Eq, imm: 1 }, Type::Void, vec![cmp]);
        g.append_inst(entry, term);
        g.add_edge(entry, then_b);
        g.add_edge(entry, else_b);
        let g1 = g.create_inst(InstKind::ReturnVoid, Type::Void, vec![]);
        g.append_inst(then_b, g1);
        let g2 = g.create_inst(InstKind::ReturnVoid, Type::Void, vec![]);
        g.append_inst(else_b, g2);

        run_on_graph(&mut g);
        assert_eq!(g.block(entry).successors, vec![else_b]);
    }
}
