// src/Channel/consumer.rs

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace};

use crate::Capability::ResolvedCapabilities;
use crate::Channel::builder::ChannelPaths;
use crate::Channel::Buffer::Arena::BufferArena;
use crate::Channel::queue::{IndexReceiver, IndexSender, SENTINEL};
use crate::Codec::FieldConfig::FieldConfig;
use crate::Core::error::{ProtocolError, Result, TransportError};

/// Ownership of one full buffer, held by the consumer between
/// [`ConsumerEnd::acquire`] and [`ConsumerEnd::release`].
///
/// Not `Clone`: releasing consumes the handle, so a buffer cannot be
/// returned twice.
#[derive(Debug)]
pub struct BufferHandle {
    index: u32,
    used: usize,
    ts_used: usize,
}

impl BufferHandle {
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Encoded bytes, End byte included.
    pub fn used(&self) -> usize {
        self.used
    }

    pub fn timestamps_used(&self) -> usize {
        self.ts_used
    }
}

/// The consumer's end of a channel.
pub struct ConsumerEnd {
    arena: Arc<BufferArena>,
    full: Box<dyn IndexReceiver>,
    empty: Option<Box<dyn IndexSender>>,
    outstanding: Vec<bool>,
    timeout: Option<Duration>,
    worker: usize,
    acquired: u64,
    finished: bool,
    // file artifacts removed on drop
    paths: Option<ChannelPaths>,
}

impl ConsumerEnd {
    pub(crate) fn new(
        arena: Arc<BufferArena>,
        full: Box<dyn IndexReceiver>,
        empty: Box<dyn IndexSender>,
        timeout: Option<Duration>,
        worker: usize,
        paths: Option<ChannelPaths>,
    ) -> Self {
        let buffers = arena.buffers();
        Self {
            arena,
            full,
            empty: Some(empty),
            outstanding: vec![false; buffers],
            timeout,
            worker,
            acquired: 0,
            finished: false,
            paths,
        }
    }

    pub fn worker(&self) -> usize {
        self.worker
    }

    pub fn buffers(&self) -> usize {
        self.outstanding.len()
    }

    /// Buffers received so far.
    pub fn acquired(&self) -> u64 {
        self.acquired
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn paths(&self) -> Option<&ChannelPaths> {
        self.paths.as_ref()
    }

    pub fn capabilities(&self) -> Result<ResolvedCapabilities> {
        self.arena.capabilities()
    }

    /// FieldConfig the stream starts with.
    pub fn field_config(&self) -> FieldConfig {
        self.arena.field_config()
    }

    /// Block until the producer hands over a full buffer.
    ///
    /// Returns `Ok(None)` once the end-of-stream sentinel arrives; the
    /// "empty" queue is closed at that point, which acknowledges the
    /// producer's `finish`. A producer that goes away without the sentinel
    /// is reported as [`TransportError::PeerDisconnected`].
    pub fn acquire(&mut self) -> Result<Option<BufferHandle>> {
        if self.finished {
            return Ok(None);
        }

        let index = match self.full.recv(self.timeout)? {
            Some(SENTINEL) => {
                self.finished = true;
                if let Some(mut empty) = self.empty.take() {
                    empty.close();
                }
                debug!(worker = self.worker, buffers = self.acquired, "end of stream");
                return Ok(None);
            }
            Some(index) => index,
            None => return Err(TransportError::PeerDisconnected),
        };

        let buffers = self.outstanding.len();
        if index as usize >= buffers {
            return Err(TransportError::InvalidIndex { index, buffers });
        }
        if self.outstanding[index as usize] {
            return Err(TransportError::DuplicateIndex { index });
        }

        let slot = self.arena.slot(index);
        let used = slot.used.load(Ordering::Acquire) as usize;
        let ts_used = slot.ts_used.load(Ordering::Acquire) as usize;
        let layout = self.arena.layout();
        if used == 0 || used > layout.buffer_bytes {
            return Err(ProtocolError::Truncated {
                offset: 0,
                needed: used,
                available: layout.buffer_bytes,
            }
            .into());
        }
        if ts_used > layout.ts_capacity {
            return Err(ProtocolError::TimestampMismatch {
                timestamps: ts_used,
                events: layout.ts_capacity,
            }
            .into());
        }

        self.outstanding[index as usize] = true;
        self.acquired += 1;
        trace!(worker = self.worker, index, used, "buffer acquired");
        Ok(Some(BufferHandle { index, used, ts_used }))
    }

    /// Encoded bytes of an acquired buffer, End byte included.
    pub fn events(&self, handle: &BufferHandle) -> &[u8] {
        unsafe { self.arena.events(handle.index, handle.used) }
    }

    pub fn timestamps(&self, handle: &BufferHandle) -> &[u64] {
        unsafe { self.arena.timestamps(handle.index, handle.ts_used) }
    }

    /// Return a drained buffer to the producer.
    pub fn release(&mut self, handle: BufferHandle) -> Result<()> {
        let index = handle.index;
        match self.outstanding.get_mut(index as usize) {
            Some(owned) if *owned => *owned = false,
            _ => {
                return Err(TransportError::InvalidIndex {
                    index,
                    buffers: self.outstanding.len(),
                })
            }
        }
        match self.empty.as_mut() {
            Some(empty) => empty.send(index),
            // stream already ended; nobody is waiting for it
            None => Ok(()),
        }
    }
}

impl Drop for ConsumerEnd {
    fn drop(&mut self) {
        if let Some(paths) = self.paths.take() {
            for path in paths.iter() {
                let _ = std::fs::remove_file(path);
            }
        }
    }
}

impl std::fmt::Debug for ConsumerEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        crate::Debug::StructDebug::debug_consumer_end(self, f)
    }
}
