//! Fast, non-cryptographic hash maps/sets for compiler-internal bookkeeping
//! (heap models, phi-candidate tables, dominator caches) where the key space
//! is attacker-unreachable and hashing speed dominates.

pub use rustc_hash::{FxHashMap, FxHashSet};
