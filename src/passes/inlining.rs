//! Inlining (component F, §4.F).
//!
//! The callee IR builder, and the Cleanup/Peepholes/ObjectTypeCheckElimination
//! stages of the callee mini-pipeline, are external collaborators (§1) the
//! core only consumes through `CalleeGraphBuilder`; this module owns target
//! resolution, admissibility, splicing, and call-site finalization.

use crate::bridges::SaveStateBridgesBuilder;
use crate::common::error::OptResult;
use crate::config::{InliningOptions, Options};
use crate::events::{EventSink, InlineDecision, InlineEvent};
use crate::ir::{BlockId, CallKind, ConstValue, DeoptReason, Graph, Inst, InstId, InstKind, MethodRef, Type};
use crate::passes::Pass;
use crate::runtime::{ClassHierarchyAnalysis, ClassRef, InlineCacheKind, ObjectTypeInfo, RuntimeInterface};

/// External collaborator (§1): builds a callee's `Graph` and runs the
/// pre-inlining mini-pipeline (§4.F "Graph construction") on it. A caller
/// wires in whatever builds IR from bytecode and whatever Cleanup/Peepholes/
/// ObjectTypeCheckElimination it already has; this pass only ever sees the
/// resulting `Graph`.
pub trait CalleeGraphBuilder {
    fn build(&mut self, method: MethodRef, parent_save_state: InstId, parent: &Graph) -> Option<Graph>;
}

pub struct InliningContext<'a> {
    pub runtime: &'a dyn RuntimeInterface,
    pub cha: &'a mut dyn ClassHierarchyAnalysis,
    pub callee_builder: &'a mut dyn CalleeGraphBuilder,
    pub events: &'a mut dyn EventSink,
    pub object_types: &'a dyn Fn(InstId) -> Option<ObjectTypeInfo>,
    pub caller_method: MethodRef,
    pub depth: u32,
}

pub struct Inlining;

impl Inlining {
    /// Visits every call present at the start of this invocation exactly
    /// once, in RPO; calls introduced by splicing a callee in are left for
    /// the driver's next invocation (the natural reading of §4.F's depth
    /// limit, which "disables recursive descent but not the current
    /// inline" — recursion across invocations, not within one).
    #[tracing::instrument(level = "debug", skip_all, fields(depth = ctx.depth))]
    pub fn run(graph: &mut Graph, options: &Options, ctx: &mut InliningContext) -> OptResult<bool> {
        let mut changed = false;
        let mut insts_budget = graph.inst_count() as u32;
        let mut vregs_budget = insts_budget;

        let calls: Vec<InstId> = graph
            .compute_rpo()
            .into_iter()
            .flat_map(|b| graph.insts_in_block(b).collect::<Vec<_>>())
            .filter(|&i| matches!(graph.inst(i).kind, InstKind::Call { inlined: false, .. }))
            .collect();

        for call in calls {
            if let Some(true) =
                try_inline_one(graph, call, options, ctx, &mut insts_budget, &mut vregs_budget)
            {
                changed = true;
            }
        }
        Ok(changed)
    }
}

enum Target {
    Direct(MethodRef),
    ChaGuarded(MethodRef),
    PicMonomorphic(MethodRef, crate::runtime::ClassRef),
    /// §4.F "Polymorphic inlining" (S6): the unresolved virtual method plus
    /// the IC's receiver classes, resolved one-by-one while the dispatch
    /// ladder is built.
    Polymorphic(MethodRef, Vec<crate::runtime::ClassRef>),
}

fn try_inline_one(
    graph: &mut Graph,
    call: InstId,
    options: &Options,
    ctx: &mut InliningContext,
    insts_budget: &mut u32,
    vregs_budget: &mut u32,
) -> Option<bool> {
    let target = resolve_target(graph, call, options, ctx)?;
    if let Target::Polymorphic(method, classes) = target {
        return try_inline_polymorphic(graph, call, method, classes, options, ctx, insts_budget, vregs_budget);
    }
    let method = match target {
        Target::Direct(m) | Target::ChaGuarded(m) | Target::PicMonomorphic(m, _) => m,
        Target::Polymorphic(..) => unreachable!("handled above"),
    };

    if ctx.runtime.get_intrinsic_id(method).is_some() {
        return Some(try_inline_intrinsic(graph, call, method, &target, ctx));
    }

    if !admissible(&options.inlining, options.max_vregs, ctx.runtime, method, *insts_budget, *vregs_budget) {
        emit(ctx, method, InlineDecision::Unsuitable);
        return Some(false);
    }

    let InstKind::Call { .. } = graph.inst(call).kind else { return Some(false) };
    let save_state = graph.inst(call).save_state_input()?;
    let Some(mut callee) = ctx.callee_builder.build(method, save_state, graph) else {
        emit(ctx, method, InlineDecision::Unsuitable);
        return Some(false);
    };

    if callee_always_throws(&callee) && options.inlining.skip_always_throw {
        emit(ctx, method, InlineDecision::InfLoop);
        return Some(false);
    }

    if options.inlining.simple_only && callee_has_runtime_calls(&callee) {
        emit(ctx, method, InlineDecision::Unsuitable);
        return Some(false);
    }

    if options.inlining.skip_throw_blocks && callee_has_throw_block(&callee) {
        emit(ctx, method, InlineDecision::Unsuitable);
        return Some(false);
    }

    if ctx.runtime.is_method_external(method) && !external_body_is_inlinable(&callee, graph, call) {
        emit(ctx, method, InlineDecision::SkipExternal);
        return Some(false);
    }

    if let Target::ChaGuarded(_) = target {
        ctx.cha.add_dependency(method, ctx.caller_method);
        graph.cha_dependencies.push(crate::ir::ChaDependency { callee: method, caller: ctx.caller_method });
    }

    if let Target::PicMonomorphic(_, class) = target {
        insert_class_guard(graph, call, save_state, class);
    }

    *insts_budget += callee.inst_count() as u32;

    splice(graph, call, &mut callee, method, ctx.runtime);

    emit(
        ctx,
        method,
        match target {
            Target::Direct(_) => InlineDecision::Success,
            Target::ChaGuarded(_) => InlineDecision::Devirtualized,
            Target::PicMonomorphic(..) => InlineDecision::VirtualMonomorphicSuccess,
            Target::Polymorphic(..) => unreachable!("handled above"),
        },
    );
    Some(true)
}

/// §4.F "Intrinsics": a resolved callee the runtime's code generator can
/// encode natively is lowered in place rather than given a spliced-in body —
/// any devirtualization guard the target resolution required still applies
/// first, then the call is rewritten to carry `CallKind::Intrinsic` with the
/// same inputs. `inlined: true` marks it settled, the same way a spliced
/// call's marker does, so a later invocation doesn't try to resolve it again.
fn try_inline_intrinsic(graph: &mut Graph, call: InstId, method: MethodRef, target: &Target, ctx: &mut InliningContext) -> bool {
    if let Target::ChaGuarded(_) = target {
        ctx.cha.add_dependency(method, ctx.caller_method);
        graph.cha_dependencies.push(crate::ir::ChaDependency { callee: method, caller: ctx.caller_method });
    }
    if let Target::PicMonomorphic(_, class) = *target {
        if let Some(save_state) = graph.inst(call).save_state_input() {
            insert_class_guard(graph, call, save_state, class);
        }
    }

    graph.inst_mut(call).kind = InstKind::Call { kind: CallKind::Intrinsic, method, inlined: true };

    emit(ctx, method, InlineDecision::Success);
    true
}

/// §4.F "Polymorphic inlining" (monomorphic case, S5): `GetInstanceClass(this)
/// != class` deoptimizes with reason `InlineIc` rather than branching to a
/// residual call — `DeoptimizeIf` is a Check-family instruction here, not a
/// terminator, so the guard is just inserted ahead of the call, no block
/// split needed.
fn insert_class_guard(graph: &mut Graph, call: InstId, save_state: InstId, class: ClassRef) {
    let this = graph.inst(call).inputs[0];
    let get_class = graph.create_inst(InstKind::GetInstanceClass, Type::Reference, vec![this]);
    graph.insert_before(call, get_class);
    let mismatch = graph.create_inst(InstKind::CompareClass { class: class.0 }, Type::Bool, vec![get_class]);
    graph.insert_before(call, mismatch);
    let deopt = graph.create_inst(
        InstKind::DeoptimizeIf { reason: DeoptReason::InlineIc },
        Type::Void,
        vec![mismatch, save_state],
    );
    graph.insert_before(call, deopt);
}

/// §4.F "Target resolution".
fn resolve_target(graph: &Graph, call: InstId, options: &Options, ctx: &InliningContext) -> Option<Target> {
    let InstKind::Call { kind, method, .. } = graph.inst(call).kind else { return None };
    match kind {
        CallKind::CallStatic | CallKind::CallResolvedStatic | CallKind::CallResolvedVirtual => {
            Some(Target::Direct(method))
        }
        CallKind::CallVirtual | CallKind::CallDynamic => {
            if options.inlining.no_virtual {
                return None;
            }
            let this = *graph.inst(call).inputs.first()?;
            if let Some(info) = (ctx.object_types)(this) {
                if ctx.runtime.class_is_final(info.class)
                    || ctx.runtime.method_is_final(method)
                    || info.exact
                {
                    let resolved = ctx.runtime.resolve_virtual(info.class, method)?;
                    return Some(Target::Direct(resolved));
                }
            }
            if !options.inlining.no_cha && graph.arch_supports_deopt() && ctx.cha.is_single_implementation(method) {
                return Some(Target::ChaGuarded(method));
            }
            if options.inlining.no_pic {
                return None;
            }
            match ctx.runtime.get_ic_classes(method, graph.inst(call).pc) {
                InlineCacheKind::Monomorphic(class) => {
                    let resolved = ctx.runtime.resolve_virtual(class, method)?;
                    Some(Target::PicMonomorphic(resolved, class))
                }
                InlineCacheKind::Polymorphic(classes) if !classes.is_empty() => {
                    Some(Target::Polymorphic(method, classes))
                }
                // Megamorphic/Unknown/empty-Polymorphic: no usable receiver
                // set to dispatch on.
                _ => None,
            }
        }
        CallKind::Intrinsic => None,
    }
}

/// §4.F "Admissibility".
fn admissible(
    opts: &InliningOptions,
    max_vregs: u32,
    runtime: &dyn RuntimeInterface,
    method: MethodRef,
    insts_so_far: u32,
    vregs_so_far: u32,
) -> bool {
    let name = runtime.method_name(method);
    if opts.blacklist.iter().any(|b| b == &name) {
        return false;
    }
    if name.contains("$noinline$") {
        return false;
    }
    if runtime.method_code_size(method) >= opts.max_size {
        return false;
    }
    let callee_insts = runtime.method_code_size(method);
    if insts_so_far + callee_insts > opts.max_insts && callee_insts > opts.small_method_threshold {
        return false;
    }
    let callee_vregs = runtime.method_registers_count(method);
    if vregs_so_far + callee_vregs > max_vregs {
        return false;
    }
    if runtime.is_method_external(method) && !opts.external_methods {
        return false;
    }
    if runtime.is_method_abstract(method) || !runtime.is_method_can_be_inlined(method) {
        return false;
    }
    true
}

/// §4.F admissibility, "simple only" mode: a callee performing runtime
/// calls of its own is unsuitable for inlining into an already-simple caller.
fn callee_has_runtime_calls(callee: &Graph) -> bool {
    callee.block_ids().any(|b| callee.insts_in_block(b).any(|i| matches!(callee.inst(i).kind, InstKind::Call { .. })))
}

/// §6 `inlining.skip_throw_blocks`: reject a callee that contains any block
/// terminating in `Throw`, distinct from `skip_always_throw` (which only
/// rejects a callee where *every* exit path throws).
fn callee_has_throw_block(callee: &Graph) -> bool {
    callee.block_ids().any(|b| {
        callee.terminator_of(b).is_some_and(|t| matches!(callee.inst(t).kind, InstKind::Throw))
    })
}

fn callee_always_throws(callee: &Graph) -> bool {
    let Some(end) = callee.end_block() else { return false };
    callee.block(end).predecessors.iter().all(|&p| {
        callee
            .terminator_of(p)
            .map(|t| callee.inst(t).kind.is_abrupt_exit())
            .unwrap_or(false)
    }) && !callee.block(end).predecessors.is_empty()
}

fn arg_offset_for(kind: CallKind) -> usize {
    matches!(kind, CallKind::CallResolvedVirtual | CallKind::CallResolvedStatic) as usize
}

/// §4.F "External / AOT": an external callee is only inlinable if its body
/// performs no runtime calls of its own, and every `NullCheck` it contains
/// guards a parameter whose call-site argument is itself already a
/// `NullCheck` result (the one non-null provenance our IR models; the
/// spec's alternative, a `NewObject` argument, has no equivalent
/// instruction here).
fn external_body_is_inlinable(callee: &Graph, graph: &Graph, call: InstId) -> bool {
    if callee_has_runtime_calls(callee) {
        return false;
    }
    let InstKind::Call { kind, .. } = graph.inst(call).kind else { return false };
    let arg_offset = arg_offset_for(kind);
    let args = &graph.inst(call).inputs;
    callee
        .block_ids()
        .flat_map(|b| callee.insts_in_block(b).collect::<Vec<_>>())
        .filter(|&i| matches!(callee.inst(i).kind, InstKind::NullCheck))
        .all(|check| {
            let Some(&guarded) = callee.inst(check).inputs.first() else { return false };
            let InstKind::Parameter { index } = callee.inst(guarded).kind else { return false };
            let arg_idx = index as usize + arg_offset;
            args.get(arg_idx).is_some_and(|&a| matches!(graph.inst(a).kind, InstKind::NullCheck))
        })
}

/// §4.F "Polymorphic inlining" (S6): a compare-class-ladder guarded dispatch
/// chain over up to `max_pic_receivers` IC classes (each resolved and
/// admissibility-checked before any graph mutation, so a chain that can't be
/// built fully is abandoned cleanly). A class's true-branch gets its own
/// inlined callee body; the chain ends in a `DeoptimizeIf` when the whole IC
/// set fit under the receiver cap, or a residual (non-inlined) virtual call
/// otherwise. Every returning branch — plus the residual call, if present —
/// feeds one phi in the join block.
#[allow(clippy::too_many_arguments)]
fn try_inline_polymorphic(
    graph: &mut Graph,
    call: InstId,
    method: MethodRef,
    classes: Vec<ClassRef>,
    options: &Options,
    ctx: &mut InliningContext,
    insts_budget: &mut u32,
    vregs_budget: &mut u32,
) -> Option<bool> {
    let cap = (options.inlining.max_pic_receivers.max(1) as usize).min(classes.len());
    if cap == 0 {
        return None;
    }
    let chosen = &classes[..cap];
    let full_coverage = classes.len() <= cap;

    let InstKind::Call { kind: orig_kind, .. } = graph.inst(call).kind else { return None };
    let this = *graph.inst(call).inputs.first()?;
    let save_state = graph.inst(call).save_state_input()?;
    let call_ty = graph.inst(call).ty;
    let has_result = !graph.inst(call).users.is_empty();
    let call_inputs = graph.inst(call).inputs.clone();

    // Resolve and admissibility-check every branch up front; any failure
    // here means no graph mutation has happened yet.
    let mut local_insts = *insts_budget;
    let mut branches: Vec<(MethodRef, Graph)> = Vec::with_capacity(chosen.len());
    for &class in chosen {
        let resolved = ctx.runtime.resolve_virtual(class, method)?;
        if !admissible(&options.inlining, options.max_vregs, ctx.runtime, resolved, local_insts, *vregs_budget) {
            return None;
        }
        let callee = ctx.callee_builder.build(resolved, save_state, graph)?;
        if callee_always_throws(&callee) && options.inlining.skip_always_throw {
            return None;
        }
        if options.inlining.simple_only && callee_has_runtime_calls(&callee) {
            return None;
        }
        if options.inlining.skip_throw_blocks && callee_has_throw_block(&callee) {
            return None;
        }
        local_insts += callee.inst_count() as u32;
        branches.push((resolved, callee));
    }
    *insts_budget = local_insts;

    let call_block = graph.inst(call).block;
    let call_cont = graph.split_block_after(call_block, call);
    graph.remove_edge(call_block, call_cont);

    let mut current = call_block;
    let mut join_vals: Vec<InstId> = Vec::new();
    let last = branches.len() - 1;

    for (idx, (resolved, mut callee)) in branches.into_iter().enumerate() {
        let class = chosen[idx];
        let get_class = graph.create_inst(InstKind::GetInstanceClass, Type::Reference, vec![this]);
        graph.append_inst(current, get_class);
        let mismatch = graph.create_inst(InstKind::CompareClass { class: class.0 }, Type::Bool, vec![get_class]);
        graph.append_inst(current, mismatch);

        let body_block = graph.create_block();
        if idx == last && full_coverage {
            let deopt = graph.create_inst(
                InstKind::DeoptimizeIf { reason: DeoptReason::InlineIc },
                Type::Void,
                vec![mismatch, save_state],
            );
            graph.append_inst(current, deopt);
            let goto = graph.create_inst(InstKind::Goto, Type::Void, vec![]);
            graph.append_inst(current, goto);
            graph.add_edge(current, body_block);
        } else {
            let next_block = graph.create_block();
            let br = graph.create_inst(InstKind::If { cc: crate::ir::ConditionCode::Ne }, Type::Void, vec![mismatch]);
            graph.append_inst(current, br);
            graph.add_edge(current, body_block);
            graph.add_edge(current, next_block);
            current = next_block;
        }

        let branch_call = graph.create_inst(
            InstKind::Call { kind: CallKind::CallVirtual, method: resolved, inlined: false },
            call_ty,
            call_inputs.clone(),
        );
        graph.append_inst(body_block, branch_call);
        let (branch_cont, branch_val) = splice(graph, branch_call, &mut callee, resolved, ctx.runtime);
        let goto = graph.create_inst(InstKind::Goto, Type::Void, vec![]);
        graph.append_inst(branch_cont, goto);
        graph.add_edge(branch_cont, call_cont);
        if has_result {
            if let Some(val) = branch_val {
                join_vals.push(val);
            }
        }
    }

    if !full_coverage {
        let residual = graph.create_inst(
            InstKind::Call { kind: orig_kind, method, inlined: false },
            call_ty,
            call_inputs,
        );
        graph.append_inst(current, residual);
        let goto = graph.create_inst(InstKind::Goto, Type::Void, vec![]);
        graph.append_inst(current, goto);
        graph.add_edge(current, call_cont);
        if has_result {
            join_vals.push(residual);
        }
    }

    if has_result {
        let merged = match join_vals.len() {
            0 => None,
            1 => Some(join_vals[0]),
            _ => {
                let phi = graph.create_inst(InstKind::Phi, call_ty, join_vals);
                graph.prepend_inst(call_cont, phi);
                Some(phi)
            }
        };
        if let Some(val) = merged {
            graph.replace_users(call, val);
            SaveStateBridgesBuilder::fix_inst_usage(graph, val);
        }
    }
    graph.inst_mut(call).inputs.clear();
    graph.erase_inst(call);

    emit(
        ctx,
        method,
        if full_coverage { InlineDecision::VirtualPolymorphicSuccess } else { InlineDecision::VirtualPolymorphicFail },
    );
    Some(true)
}

/// §4.F "Splicing": re-parents `callee`'s blocks into `graph`, rewires
/// control flow around the call site, substitutes parameters/constants for
/// call arguments, and finalizes the call site. Returns the continuation
/// block and the value (if any) that should flow from this call site —
/// either substituted directly into `call`'s own users (single-target
/// inlining) or, when `call` has none (a polymorphic ladder branch), left
/// for the caller to merge into an outer join phi.
fn splice(graph: &mut Graph, call: InstId, callee: &mut Graph, method: MethodRef, runtime: &dyn RuntimeInterface) -> (BlockId, Option<InstId>) {
    let call_block = graph.inst(call).block;
    let call_cont = graph.split_block_after(call_block, call);

    let mapping = graph.absorb(callee);
    // `split_block_after` leaves `call_block` with a Goto straight to
    // `call_cont`; that edge is provisional and must be replaced by one
    // into the callee before anything below adds a second successor to it.
    graph.remove_edge(call_block, call_cont);

    let callee_start = mapping.block(callee.start_block());
    let callee_end = mapping.block(callee.end_block().expect("callee has an end block"));

    let args = graph.inst(call).inputs.clone();
    let arg_offset = match graph.inst(call).kind {
        InstKind::Call { kind: CallKind::CallResolvedVirtual | CallKind::CallResolvedStatic, .. } => 1,
        _ => 0,
    };

    // Resolve every return/throw path into `callee_end` first, while its
    // predecessors (which may include `callee_start` itself, for a callee
    // whose entire body is one block) are still live — removing
    // `callee_start` up front would erase the very Return/Throw terminator
    // this loop needs to read.
    let mut return_blocks: Vec<InstId> = Vec::new();
    let mut return_vals: Vec<InstId> = Vec::new();
    let mut start_is_return_block = false;
    for &pred in &graph.block(callee_end).predecessors.clone() {
        if pred == callee_start {
            start_is_return_block = true;
        }
        let Some(term) = graph.terminator_of(pred) else { continue };
        if graph.inst(term).kind.is_abrupt_exit() {
            graph.remove_edge(pred, callee_end);
            if let Some(caller_end) = graph.end_block() {
                graph.add_edge(pred, caller_end);
            }
            return_blocks.push(term);
        } else {
            let ret_val = match graph.inst(term).kind {
                InstKind::Return => graph.inst(term).inputs.first().copied(),
                _ => None,
            };
            graph.remove_edge(pred, callee_end);
            graph.add_edge(pred, call_cont);
            if matches!(graph.inst(term).kind, InstKind::Return | InstKind::ReturnVoid) {
                let goto = graph.create_inst(InstKind::Goto, Type::Void, vec![]);
                graph.replace_terminator(pred, goto);
            }
            if let Some(val) = ret_val {
                return_vals.push(val);
            }
        }
    }
    graph.remove_block(callee_end);

    if start_is_return_block {
        // `callee_start` carries the callee's real body and was already
        // rewired above; just splice control flow into it directly.
        graph.add_edge(call_block, callee_start);
    } else {
        for goto_target in graph.block(callee_start).successors.clone() {
            graph.add_edge(call_block, goto_target);
        }
        graph.remove_block(callee_start);
    }

    let callee_blocks: Vec<_> = mapping.blocks().collect();
    let params: Vec<InstId> = callee_blocks
        .iter()
        .flat_map(|&b| graph.insts_in_block(b).collect::<Vec<_>>())
        .filter(|&i| matches!(graph.inst(i).kind, InstKind::Parameter { .. }))
        .collect();
    for p in params {
        if let InstKind::Parameter { index } = graph.inst(p).kind {
            let arg_idx = index as usize + arg_offset;
            if let Some(&arg) = args.get(arg_idx) {
                graph.replace_users(p, arg);
                SaveStateBridgesBuilder::fix_inst_usage(graph, arg);
            }
        }
    }

    let constants: Vec<InstId> = callee_blocks
        .iter()
        .flat_map(|&b| graph.insts_in_block(b).collect::<Vec<_>>())
        .filter(|&i| graph.inst(i).kind.is_constant_like())
        .collect();
    for c in constants {
        let interned = match graph.inst(c).kind {
            InstKind::Constant(val) => graph.intern_constant(graph.inst(c).ty, val),
            InstKind::NullPtr => graph.null_ptr(),
            _ => continue,
        };
        if interned != c {
            graph.replace_users(c, interned);
        }
    }

    if runtime.is_method_external(method) {
        // §4.F "External / AOT": a callee NullCheck whose guarded operand
        // has, after parameter substitution above, itself become a
        // NullCheck result is redundant — the caller already proved
        // non-null at the call site — so fold it away.
        let checks: Vec<InstId> = callee_blocks
            .iter()
            .flat_map(|&b| graph.insts_in_block(b).collect::<Vec<_>>())
            .filter(|&i| matches!(graph.inst(i).kind, InstKind::NullCheck))
            .collect();
        for check in checks {
            let Some(&guarded) = graph.inst(check).inputs.first() else { continue };
            if matches!(graph.inst(guarded).kind, InstKind::NullCheck) {
                graph.replace_users(check, guarded);
                graph.inst_mut(check).inputs.clear();
                graph.erase_inst(check);
                for v in return_vals.iter_mut() {
                    if *v == check {
                        *v = guarded;
                    }
                }
            }
        }
    }

    // §4.F "Splicing (data-flow)": a single returning predecessor's value
    // substitutes directly; more than one merges through a fresh phi in
    // `call_cont`.
    let merged = match return_vals.len() {
        0 => None,
        1 => Some(return_vals[0]),
        _ => {
            let ty = graph.inst(return_vals[0]).ty;
            let phi = graph.create_inst(InstKind::Phi, ty, return_vals.clone());
            graph.prepend_inst(call_cont, phi);
            Some(phi)
        }
    };
    if let Some(val) = merged {
        if !graph.inst(call).users.is_empty() {
            graph.replace_users(call, val);
            SaveStateBridgesBuilder::fix_inst_usage(graph, val);
        }
    }

    if !return_blocks.is_empty() {
        graph.inst_mut(call).kind = InstKind::InlinedCallMarker { method };
        let requires_barrier = runtime.method_requires_return_barrier(method);
        for term in return_blocks {
            let ri = graph.create_inst(InstKind::ReturnInlined { barrier: requires_barrier }, Type::Void, vec![]);
            graph.insert_before(term, ri);
        }
    } else {
        let ss = graph.inst(call).save_state_input();
        graph.inst_mut(call).inputs.clear();
        graph.erase_inst(call);
        if let Some(ss) = ss {
            if graph.inst(ss).users.is_empty() {
                graph.erase_inst(ss);
            }
        }
    }

    (call_cont, merged)
}

fn emit(ctx: &mut InliningContext, callee: MethodRef, decision: InlineDecision) {
    ctx.events.record(InlineEvent { caller: ctx.caller_method, callee, depth: ctx.depth, decision });
}
