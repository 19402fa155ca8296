//! The three optimizer passes (§4.D/E/F) and the shared pass-invocation
//! contract (§6 "Pass interface").

pub mod branch_elimination;
pub mod inlining;
pub mod lse;

use crate::common::error::OptResult;
use crate::ir::Graph;

/// §6: every pass is `run(graph, options) -> Result<bool, OptError>`, where
/// `Ok(true)` means the graph changed and any analysis a later pass depends
/// on (dominators, loops) must be recomputed by its caller.
pub trait Pass {
    type Options;

    fn run(graph: &mut Graph, options: &Self::Options) -> OptResult<bool>;
}
