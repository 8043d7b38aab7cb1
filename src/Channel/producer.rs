// src/Channel/producer.rs

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace};

use crate::Capability::ResolvedCapabilities;
use crate::Channel::Buffer::Arena::BufferArena;
use crate::Channel::queue::{IndexReceiver, IndexSender, SENTINEL};
use crate::Codec::FieldConfig::FieldConfig;
use crate::Codec::Primitive::END_BYTE;
use crate::Core::error::{EncodeError, Result, TransportError};

/// The producer's end of a channel.
///
/// Owns exactly one buffer at a time (the *current* buffer) and fills it
/// in place. Buffers are handed over in circular order; the producer only
/// blocks when the next buffer in that order is still with the consumer.
pub struct ProducerEnd {
    arena: Arc<BufferArena>,
    full: Box<dyn IndexSender>,
    empty: Box<dyn IndexReceiver>,
    in_flight: Vec<bool>,
    current: u32,
    mask: u32,
    timeout: Option<Duration>,
    worker: usize,
    flushed: u64,
    finished: bool,
}

impl ProducerEnd {
    pub(crate) fn new(
        arena: Arc<BufferArena>,
        full: Box<dyn IndexSender>,
        empty: Box<dyn IndexReceiver>,
        timeout: Option<Duration>,
        worker: usize,
    ) -> Self {
        let buffers = arena.buffers();
        Self {
            arena,
            full,
            empty,
            in_flight: vec![false; buffers],
            current: 0,
            mask: (buffers - 1) as u32,
            timeout,
            worker,
            flushed: 0,
            finished: false,
        }
    }

    pub fn worker(&self) -> usize {
        self.worker
    }

    pub fn buffers(&self) -> usize {
        self.in_flight.len()
    }

    /// Event bytes per buffer, End byte included.
    pub fn buffer_bytes(&self) -> usize {
        self.arena.buffer_bytes()
    }

    pub fn timestamp_capacity(&self) -> usize {
        self.arena.layout().ts_capacity
    }

    pub fn current_index(&self) -> u32 {
        self.current
    }

    /// Buffers handed to the consumer so far.
    pub fn flushed(&self) -> u64 {
        self.flushed
    }

    /// Buffers currently owned by the consumer.
    pub fn in_flight(&self) -> usize {
        self.in_flight.iter().filter(|&&f| f).count()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Capabilities resolved by the consumer that created the channel.
    pub fn capabilities(&self) -> Result<ResolvedCapabilities> {
        self.arena.capabilities()
    }

    /// FieldConfig the consumer's decoder starts from.
    pub fn field_config(&self) -> FieldConfig {
        self.arena.field_config()
    }

    pub fn arena(&self) -> &BufferArena {
        &self.arena
    }

    /// Event bytes of the current buffer.
    pub fn events_mut(&mut self) -> &mut [u8] {
        unsafe { self.arena.events_mut(self.current) }
    }

    /// Timestamp array of the current buffer; empty without timestamps.
    pub fn timestamps_mut(&mut self) -> &mut [u64] {
        unsafe { self.arena.timestamps_mut(self.current) }
    }

    fn seal(&mut self, used: usize, ts_used: usize) -> Result<u32> {
        let capacity = self.arena.buffer_bytes();
        if used >= capacity {
            return Err(EncodeError::EventTooLarge {
                len: used + 1,
                capacity,
            }
            .into());
        }
        let ts_used = ts_used.min(self.timestamp_capacity());

        let index = self.current;
        unsafe { self.arena.events_mut(index)[used] = END_BYTE };
        let slot = self.arena.slot(index);
        slot.used.store((used + 1) as u64, std::sync::atomic::Ordering::Release);
        slot.ts_used.store(ts_used as u64, std::sync::atomic::Ordering::Release);

        self.in_flight[index as usize] = true;
        self.full.send(index)?;
        self.flushed += 1;
        trace!(worker = self.worker, index, used = used + 1, "buffer handed to consumer");
        Ok(index)
    }

    /// Mark a released index as free again.
    fn mark_free(&mut self, index: u32) -> Result<()> {
        match self.in_flight.get_mut(index as usize) {
            Some(slot) => {
                *slot = false;
                Ok(())
            }
            None => Err(TransportError::InvalidIndex {
                index,
                buffers: self.in_flight.len(),
            }),
        }
    }

    /// Block until `expected` is back from the consumer. Releases of other
    /// buffers seen on the way are recorded, so any release order works.
    fn reclaim(&mut self, expected: u32) -> Result<()> {
        while self.in_flight[expected as usize] {
            match self.empty.recv(self.timeout)? {
                Some(got) => {
                    self.mark_free(got)?;
                    if got != expected {
                        trace!(worker = self.worker, expected, got, "release ahead of order");
                    }
                }
                None => return Err(TransportError::PeerDisconnected),
            }
        }
        Ok(())
    }

    /// Terminate the current buffer with End, hand it to the consumer and
    /// move to the next buffer in circular order.
    ///
    /// `used` is the number of event bytes written, without the End byte;
    /// at least one byte must remain for it. Blocks while the next buffer
    /// is still owned by the consumer.
    pub fn flush_and_rotate(&mut self, used: usize, ts_used: usize) -> Result<()> {
        if self.finished {
            return Err(TransportError::Finished);
        }
        let index = self.seal(used, ts_used)?;

        let next = (index + 1) & self.mask;
        if self.in_flight[next as usize] {
            self.reclaim(next)?;
        }
        self.current = next;
        Ok(())
    }

    /// End the stream.
    ///
    /// Hands over the current buffer if it holds events, sends the
    /// sentinel and closes the "full" queue, then drains releases until
    /// the consumer closes the "empty" queue. Returns once the consumer is
    /// done with every buffer.
    pub fn finish(&mut self, used: usize, ts_used: usize) -> Result<()> {
        if self.finished {
            return Err(TransportError::Finished);
        }
        if used > 0 {
            self.seal(used, ts_used)?;
        }
        self.full.send(SENTINEL)?;
        self.full.close();
        self.finished = true;

        while let Some(index) = self.empty.recv(self.timeout)? {
            self.mark_free(index)?;
        }
        debug!(worker = self.worker, buffers = self.flushed, "producer finished");
        Ok(())
    }
}

impl std::fmt::Debug for ProducerEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        crate::Debug::StructDebug::debug_producer_end(self, f)
    }
}
