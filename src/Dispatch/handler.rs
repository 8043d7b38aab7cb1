use crate::Codec::Events::{CompEvent, CxtEvent, MemEvent, SyncEvent};

/// Per-event callbacks of an analysis backend.
///
/// One handler instance serves one worker, so no method needs to be
/// thread-safe. Views are only valid for the duration of the call.
pub trait EventHandler {
    fn on_memory(&mut self, _ev: &MemEvent<'_>) {}

    fn on_compute(&mut self, _ev: &CompEvent<'_>) {}

    fn on_sync(&mut self, _ev: &SyncEvent<'_>) {}

    fn on_context(&mut self, _ev: &CxtEvent<'_>) {}

    /// Timestamp of the event delivered next.
    fn on_timestamp(&mut self, _ts: u64) {}
}

/// Ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHandler;

impl EventHandler for NullHandler {}
