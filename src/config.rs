//! Process-wide, read-only compiler options (§6).
//!
//! A single `Options` value is shared (by reference) across every pass
//! invocation for one compilation; it is never mutated mid-pass, matching
//! §5 "Compiler options are process-wide read-only".

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InliningOptions {
    pub max_insts: u32,
    pub max_size: u32,
    pub max_depth: u32,
    pub blacklist: Vec<String>,
    pub external_methods: bool,
    pub simple_only: bool,
    pub skip_always_throw: bool,
    pub skip_throw_blocks: bool,
    pub no_virtual: bool,
    pub no_cha: bool,
    pub no_pic: bool,
    /// §4.F: bytecode size at/above which the callee is too large to inline.
    pub small_method_threshold: u32,
    /// §4.F "Polymorphic inlining": up to N receiver classes from the IC.
    pub max_pic_receivers: u32,
}

impl Default for InliningOptions {
    fn default() -> Self {
        InliningOptions {
            max_insts: 2000,
            max_size: 200,
            max_depth: 3,
            blacklist: Vec::new(),
            external_methods: false,
            simple_only: false,
            skip_always_throw: true,
            skip_throw_blocks: false,
            no_virtual: false,
            no_cha: false,
            no_pic: false,
            small_method_threshold: 5,
            max_pic_receivers: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LseOptions {
    pub enabled: bool,
    pub hoist_loads: bool,
    /// §4.E "Alias-call budget": per-block cap on alias queries.
    pub aa_calls_limit: u32,
    /// §4.E: per-base-object cap on tracked load/store accesses.
    pub ls_access_limit: u32,
}

impl Default for LseOptions {
    fn default() -> Self {
        LseOptions { enabled: true, hoist_loads: true, aa_calls_limit: 20_000, ls_access_limit: 32 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    pub inlining: InliningOptions,
    pub lse: LseOptions,
    pub branch_elimination_enabled: bool,
    pub max_vregs: u32,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            inlining: InliningOptions::default(),
            lse: LseOptions::default(),
            branch_elimination_enabled: true,
            max_vregs: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_section_6() {
        let o = Options::default();
        assert_eq!(o.inlining.max_insts, 2000);
        assert_eq!(o.inlining.max_size, 200);
        assert_eq!(o.inlining.max_depth, 3);
        assert_eq!(o.max_vregs, 256);
        assert_eq!(o.lse.aa_calls_limit, 20_000);
        assert_eq!(o.lse.ls_access_limit, 32);
    }

    #[test]
    fn round_trips_through_json() {
        let o = Options::default();
        let s = serde_json::to_string(&o).unwrap();
        let back: Options = serde_json::from_str(&s).unwrap();
        assert_eq!(back.inlining.max_depth, o.inlining.max_depth);
    }
}
