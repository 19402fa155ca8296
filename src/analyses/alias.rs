//! AliasAnalysis (§4.B, consumed contract): a conservative boolean oracle
//! over memory-accessing instructions and base pointers.

use crate::ir::{Graph, InstId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasKind {
    NoAlias,
    MayAlias,
    MustAlias,
}

impl AliasKind {
    pub fn may_or_must(self) -> bool {
        matches!(self, AliasKind::MayAlias | AliasKind::MustAlias)
    }
}

pub trait AliasAnalysis {
    fn alias(&self, graph: &Graph, i1: InstId, i2: InstId) -> AliasKind;
    fn ref_alias(&self, graph: &Graph, obj1: InstId, obj2: InstId) -> AliasKind;
}

/// The conservative fallback the core falls back to when no sharper
/// analysis is wired in: same equivalence class and identical memory-
/// instruction operands is MUST_ALIAS, same equivalence class with distinct
/// operands is MAY_ALIAS (always an admissible, if pessimistic, answer per
/// §4.B), otherwise NO_ALIAS.
#[derive(Debug, Default)]
pub struct ConservativeAliasAnalysis;

impl ConservativeAliasAnalysis {
    /// The operands that identify *where* a memory instruction reads or
    /// writes, excluding the value operand a store carries (its last
    /// input) — a store's address is everything before that.
    fn address_inputs(graph: &Graph, inst: InstId) -> Option<&[InstId]> {
        let i = graph.inst(inst);
        i.kind.equiv_class()?;
        if i.kind.is_store() {
            Some(&i.inputs[..i.inputs.len().saturating_sub(1)])
        } else {
            Some(&i.inputs)
        }
    }
}

impl AliasAnalysis for ConservativeAliasAnalysis {
    fn alias(&self, graph: &Graph, i1: InstId, i2: InstId) -> AliasKind {
        if i1 == i2 {
            return AliasKind::MustAlias;
        }
        let (Some(addr1), Some(addr2)) = (Self::address_inputs(graph, i1), Self::address_inputs(graph, i2)) else {
            return AliasKind::NoAlias;
        };
        let c1 = graph.inst(i1).kind.equiv_class();
        let c2 = graph.inst(i2).kind.equiv_class();
        if c1 != c2 {
            return AliasKind::NoAlias;
        }
        if addr1 == addr2 {
            AliasKind::MustAlias
        } else {
            AliasKind::MayAlias
        }
    }

    fn ref_alias(&self, graph: &Graph, obj1: InstId, obj2: InstId) -> AliasKind {
        if obj1 == obj2 {
            return AliasKind::MustAlias;
        }
        let k1 = &graph.inst(obj1).kind;
        let k2 = &graph.inst(obj2).kind;
        if k1.is_constant_like() && k2.is_constant_like() {
            return AliasKind::NoAlias;
        }
        AliasKind::MayAlias
    }
}
