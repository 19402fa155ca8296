// Allow dead code and unused variables in scaffold code.
// These will be fixed as features are implemented.
#![allow(dead_code, unused_variables, unused_imports, unreachable_patterns)]

pub mod analyses;
pub mod bridges;
pub mod common;
pub mod config;
pub mod events;
pub mod ir;
pub mod passes;
pub mod runtime;
