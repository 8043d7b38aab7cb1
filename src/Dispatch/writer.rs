// Producer facade: encodes typed events straight into the channel's
// current buffer.

use std::path::Path;
use std::time::Duration;

use tracing::debug;

use crate::Capability::{CapabilityField, ResolvedCapabilities};
use crate::Channel::{ChannelBuilder, ChannelPaths, ProducerEnd};
use crate::Codec::Encoder::Encode;
use crate::Codec::Events::{ComputeOp, ConfigChange, ContextMark, MemAccess, SyncOp};
use crate::Codec::FieldConfig::FieldConfig;
use crate::Codec::Primitive::{CxtType, EventKind};
use crate::Core::error::{EncodeError, Result};

pub struct EventWriter {
    channel: ProducerEnd,
    cfg: FieldConfig,
    caps: ResolvedCapabilities,
    used: usize,
    ts_used: usize,
    last_ts: u64,
    events: u64,
}

impl EventWriter {
    /// Wrap a producer end, adopting the FieldConfig and capabilities the
    /// consumer wrote into the segment.
    pub fn new(channel: ProducerEnd) -> Result<Self> {
        let caps = channel.capabilities()?;
        let cfg = channel.field_config();
        Ok(Self {
            channel,
            cfg,
            caps,
            used: 0,
            ts_used: 0,
            last_ts: 0,
            events: 0,
        })
    }

    /// Attach to channel `worker` of a consumer serving from `dir`.
    pub fn attach(dir: &Path, base_name: &str, worker: usize, timeout: Option<Duration>) -> Result<Self> {
        let paths = ChannelPaths::new(dir, base_name, worker);
        let channel = ChannelBuilder::new()
            .with_worker(worker)
            .with_liveness_timeout(timeout)
            .attach_producer(&paths)?;
        Self::new(channel)
    }

    pub fn field_config(&self) -> &FieldConfig {
        &self.cfg
    }

    pub fn capabilities(&self) -> &ResolvedCapabilities {
        &self.caps
    }

    /// Events written (Config events not included).
    pub fn events_written(&self) -> u64 {
        self.events
    }

    /// Encoded bytes waiting in the current buffer.
    pub fn buffered(&self) -> usize {
        self.used
    }

    pub fn channel(&self) -> &ProducerEnd {
        &self.channel
    }

    /// Timestamp for the events written from now on. Ignored when the
    /// channel carries no timestamps.
    pub fn timestamp(&mut self, ts: u64) {
        self.last_ts = ts;
    }

    pub fn memory(&mut self, ev: &MemAccess) -> Result<()> {
        if !self.caps.is_enabled(CapabilityField::MemoryEnabled) {
            return Ok(());
        }
        self.write(ev, true)
    }

    pub fn compute(&mut self, ev: &ComputeOp) -> Result<()> {
        if !self.caps.is_enabled(CapabilityField::ComputeEnabled) {
            return Ok(());
        }
        self.write(ev, true)
    }

    pub fn sync(&mut self, ev: &SyncOp) -> Result<()> {
        if !self.caps.is_enabled(CapabilityField::SyncEnabled) {
            return Ok(());
        }
        self.write(ev, true)
    }

    pub fn context(&mut self, ev: &ContextMark<'_>) -> Result<()> {
        let field = match ev.cxt_type() {
            CxtType::Instruction => CapabilityField::ContextInstruction,
            CxtType::BasicBlock => CapabilityField::ContextBasicBlock,
            CxtType::FunctionEnter | CxtType::FunctionExit => CapabilityField::ContextFunction,
            CxtType::Thread => CapabilityField::ContextThread,
        };
        if !self.caps.is_enabled(field) {
            return Ok(());
        }
        self.write(ev, true)
    }

    /// Emit a Config event and switch the local FieldConfig with it.
    pub fn configure(&mut self, target: EventKind, bits: u8) -> Result<()> {
        let change = ConfigChange::new(target, bits);
        self.write(&change, false)?;
        self.cfg.apply(target, bits)?;
        Ok(())
    }

    fn write<E: Encode>(&mut self, ev: &E, dispatched: bool) -> Result<()> {
        let len = ev.encoded_len(&self.cfg);
        // one byte of every buffer is reserved for End
        let room = self.channel.buffer_bytes() - 1;
        if len > room {
            return Err(EncodeError::EventTooLarge { len, capacity: room }.into());
        }

        let ts_capacity = self.channel.timestamp_capacity();
        let ts_full = dispatched && ts_capacity > 0 && self.ts_used == ts_capacity;
        if self.used + len > room || ts_full {
            self.rotate()?;
        }

        let used = self.used;
        let written = ev.encode_into(&self.cfg, &mut self.channel.events_mut()[used..room])?;
        self.used += written;

        if dispatched {
            if ts_capacity > 0 {
                let ts_used = self.ts_used;
                self.channel.timestamps_mut()[ts_used] = self.last_ts;
                self.ts_used += 1;
            }
            self.events += 1;
        }
        Ok(())
    }

    fn rotate(&mut self) -> Result<()> {
        self.channel.flush_and_rotate(self.used, self.ts_used)?;
        self.used = 0;
        self.ts_used = 0;
        Ok(())
    }

    /// Hand the current buffer over now if it holds anything.
    pub fn flush(&mut self) -> Result<()> {
        if self.used > 0 {
            self.rotate()?;
        }
        Ok(())
    }

    /// Flush, send end-of-stream and wait for the consumer to let go.
    pub fn finish(&mut self) -> Result<()> {
        self.channel.finish(self.used, self.ts_used)?;
        self.used = 0;
        self.ts_used = 0;
        debug!(worker = self.channel.worker(), events = self.events, "writer finished");
        Ok(())
    }
}

impl std::fmt::Debug for EventWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        crate::Debug::StructDebug::debug_event_writer(self, f)
    }
}
