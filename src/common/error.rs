//! Error handling (§7, SPEC_FULL.md §A.1).
//!
//! The core recognizes exactly two *recoverable* failure categories; every
//! other inconsistency is a contract violation and is asserted, not
//! returned, because recovering from it would require mutating program
//! semantics (§7 forbids that).

#[derive(Debug, thiserror::Error)]
pub enum OptError {
    #[error("arena allocation failed while running {pass}: {source}")]
    ArenaExhausted {
        pass: &'static str,
        #[source]
        source: std::collections::TryReserveError,
    },

    #[error("{analysis} is stale for this graph; rerun it before invoking {pass}")]
    AnalysisStale { analysis: &'static str, pass: &'static str },
}

pub type OptResult<T> = Result<T, OptError>;
