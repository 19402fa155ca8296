//! Structured event log for inlining decisions (§4.F "Stats & events", §6).
//!
//! Independent of `tracing`: a driver consumes this as data (e.g. to print a
//! per-method inlining report), whereas `tracing` carries ephemeral
//! human-facing diagnostics. Passes that emit events also emit a `tracing`
//! debug span, but the two are not redundant — `EventSink` implementations
//! are expected to outlive a single process, `tracing` subscribers are not.

use crate::ir::MethodRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InlineDecision {
    Success,
    Devirtualized,
    SkipExternal,
    Unsuitable,
    Limit,
    InfLoop,
    NoInline,
    FailMegamorphic,
    LostSingleImpl,
    VirtualMonomorphicSuccess,
    VirtualPolymorphicSuccess,
    VirtualMonomorphicFail,
    VirtualPolymorphicFail,
}

#[derive(Debug, Clone, Copy)]
pub struct InlineEvent {
    pub caller: MethodRef,
    pub callee: MethodRef,
    pub depth: u32,
    pub decision: InlineDecision,
}

/// Injected per compilation (§9 "Global state": "event logging is an
/// optional sink injected per compilation").
pub trait EventSink {
    fn record(&mut self, event: InlineEvent);
}

/// Default sink: keeps every event in memory, for drivers that want a
/// post-hoc report rather than a streaming one.
#[derive(Debug, Default)]
pub struct VecEventSink {
    pub events: Vec<InlineEvent>,
}

impl EventSink for VecEventSink {
    fn record(&mut self, event: InlineEvent) {
        self.events.push(event);
    }
}

/// A sink that discards everything; the zero-cost default when no driver
/// cares about the report.
#[derive(Debug, Default)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn record(&mut self, _event: InlineEvent) {}
}
