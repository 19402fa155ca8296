//! Consumed analyses (§4.B): dominators, natural loops, and alias analysis.
//! The core treats all three as read-only oracles recomputed by a pass
//! whenever it restructures the graph; none of them own graph state.

pub mod alias;
pub mod dominators;
pub mod loop_analyzer;

pub use alias::{AliasAnalysis, AliasKind, ConservativeAliasAnalysis};
pub use dominators::DominatorTree;
pub use loop_analyzer::LoopAnalyzer;
