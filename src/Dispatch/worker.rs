use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use super::handler::EventHandler;
use crate::Channel::ConsumerEnd;
use crate::Codec::Decoder::{decode_and_dispatch, DecodeStats};
use crate::Core::error::{Result, TransportError};

/// What one worker saw before end-of-stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorkerReport {
    pub worker: usize,
    pub buffers: u64,
    pub stats: DecodeStats,
}

/// Acquire, decode and release buffers until the producer ends the stream.
pub fn drain_channel(consumer: &mut ConsumerEnd, handler: &mut dyn EventHandler) -> Result<WorkerReport> {
    let mut cfg = consumer.field_config();
    let mut stats = DecodeStats::default();

    while let Some(buffer) = consumer.acquire()? {
        let decoded = decode_and_dispatch(
            consumer.events(&buffer),
            consumer.timestamps(&buffer),
            &mut cfg,
            &mut *handler,
        )?;
        stats += decoded;
        consumer.release(buffer)?;
    }

    let report = WorkerReport {
        worker: consumer.worker(),
        buffers: consumer.acquired(),
        stats,
    };
    debug!(
        worker = report.worker,
        buffers = report.buffers,
        events = report.stats.dispatched,
        "worker drained channel"
    );
    Ok(report)
}

pub(crate) fn spawn_named<T, F>(name: String, f: F) -> Result<JoinHandle<Result<T>>>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    Ok(thread::Builder::new().name(name).spawn(f)?)
}

pub(crate) fn join<T>(worker: usize, handle: JoinHandle<Result<T>>) -> Result<T> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => {
            warn!(worker, "worker thread panicked");
            Err(TransportError::WorkerPanicked { worker })
        }
    }
}

/// Pick the error worth reporting: a peer disconnect is usually the echo of
/// a failure on the other side.
pub(crate) fn first_cause(errors: Vec<TransportError>) -> Option<TransportError> {
    let mut fallback = None;
    for err in errors {
        match err {
            TransportError::PeerDisconnected => {
                fallback.get_or_insert(err);
            }
            other => return Some(other),
        }
    }
    fallback
}
