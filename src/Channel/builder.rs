use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::queue::{self, local_queue, PipeReceiver, PipeSender};
use super::{BufferArena, ConsumerEnd, ProducerEnd, SegmentLayout};
use crate::Capability::ResolvedCapabilities;
use crate::Codec::FieldConfig::FieldConfig;
use crate::Core::error::Result;
use crate::Core::Config::{TransportConfig, DEFAULT_BUFFERS, DEFAULT_BUFFER_BYTES};
use crate::Core::error::ConfigError;

/// Filesystem artifacts of one cross-process channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelPaths {
    pub segment: PathBuf,
    pub full: PathBuf,
    pub empty: PathBuf,
}

impl ChannelPaths {
    /// `{dir}/{base}-shmem-{id}`, `{dir}/{base}-full-{id}`, `{dir}/{base}-empty-{id}`.
    pub fn new(dir: &Path, base_name: &str, id: usize) -> Self {
        Self {
            segment: dir.join(format!("{}-shmem-{}", base_name, id)),
            full: dir.join(format!("{}-full-{}", base_name, id)),
            empty: dir.join(format!("{}-empty-{}", base_name, id)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        [self.segment.as_path(), self.full.as_path(), self.empty.as_path()].into_iter()
    }
}

pub struct ChannelBuilder {
    buffers: usize,
    buffer_bytes: usize,
    timestamps: bool,
    timeout: Option<Duration>,
    worker: usize,
}

impl Default for ChannelBuilder {
    fn default() -> Self {
        Self {
            buffers: DEFAULT_BUFFERS,
            buffer_bytes: DEFAULT_BUFFER_BYTES,
            timestamps: false,
            timeout: None,
            worker: 0,
        }
    }
}

impl ChannelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &TransportConfig) -> Self {
        Self {
            buffers: config.buffers(),
            buffer_bytes: config.buffer_bytes(),
            timestamps: config.timestamps(),
            timeout: config.liveness_timeout(),
            worker: 0,
        }
    }

    pub fn with_buffers(mut self, buffers: usize) -> Self {
        self.buffers = buffers;
        self
    }

    pub fn with_buffer_bytes(mut self, bytes: usize) -> Self {
        self.buffer_bytes = bytes;
        self
    }

    pub fn with_timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }

    pub fn with_liveness_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_worker(mut self, worker: usize) -> Self {
        self.worker = worker;
        self
    }

    fn layout(&self) -> Result<SegmentLayout> {
        TransportConfig::new()
            .with_buffers(self.buffers)
            .with_buffer_bytes(self.buffer_bytes)
            .validate()?;
        if self.buffers > u32::MAX as usize / 2 {
            return Err(ConfigError::Buffers { value: self.buffers }.into());
        }
        Ok(SegmentLayout::new(self.buffers, self.buffer_bytes, self.timestamps))
    }

    /// Both ends of a channel between two threads of this process.
    pub fn build_in_process(self, caps: &ResolvedCapabilities) -> Result<(ProducerEnd, ConsumerEnd)> {
        let layout = self.layout()?;
        let cfg = FieldConfig::from_resolved(caps);
        let arena = Arc::new(BufferArena::create_heap(layout, caps, &cfg)?);

        let (full_tx, full_rx) = local_queue();
        let (empty_tx, empty_rx) = local_queue();

        let producer = ProducerEnd::new(
            Arc::clone(&arena),
            Box::new(full_tx),
            Box::new(empty_rx),
            self.timeout,
            self.worker,
        );
        let consumer = ConsumerEnd::new(
            arena,
            Box::new(full_rx),
            Box::new(empty_tx),
            self.timeout,
            self.worker,
            None,
        );
        Ok((producer, consumer))
    }

    /// Create the segment and both pipes at `paths`.
    ///
    /// The pipes are not opened yet; [`PendingConsumer::open`] does that and
    /// blocks until a producer attaches.
    pub fn create_consumer(self, paths: ChannelPaths, caps: &ResolvedCapabilities) -> Result<PendingConsumer> {
        let layout = self.layout()?;
        let cfg = FieldConfig::from_resolved(caps);
        let arena = BufferArena::create_file(&paths.segment, layout, caps, &cfg)?;
        queue::make_fifo(&paths.full)?;
        queue::make_fifo(&paths.empty)?;
        debug!(worker = self.worker, segment = %paths.segment.display(), bytes = layout.total, "channel artifacts created");

        Ok(PendingConsumer {
            arena: Arc::new(arena),
            paths,
            timeout: self.timeout,
            worker: self.worker,
        })
    }

    /// Attach to a channel created by a consumer.
    ///
    /// Blocks until the consumer has opened its pipe ends (or the liveness
    /// timeout passes).
    pub fn attach_producer(self, paths: &ChannelPaths) -> Result<ProducerEnd> {
        let arena = BufferArena::attach_file(&paths.segment)?;
        // "empty" first on both sides so the blocking opens pair up
        let empty = PipeReceiver::open(&paths.empty, self.timeout)?;
        let full = PipeSender::open(&paths.full, self.timeout)?;
        debug!(worker = self.worker, segment = %paths.segment.display(), "producer attached");

        Ok(ProducerEnd::new(
            Arc::new(arena),
            Box::new(full),
            Box::new(empty),
            self.timeout,
            self.worker,
        ))
    }
}

/// A consumer whose artifacts exist but whose pipes are not open yet.
pub struct PendingConsumer {
    arena: Arc<BufferArena>,
    paths: ChannelPaths,
    timeout: Option<Duration>,
    worker: usize,
}

impl PendingConsumer {
    pub fn paths(&self) -> &ChannelPaths {
        &self.paths
    }

    pub fn worker(&self) -> usize {
        self.worker
    }

    /// Open both pipes, waiting for the producer to attach.
    pub fn open(self) -> Result<ConsumerEnd> {
        let empty = PipeSender::open(&self.paths.empty, self.timeout)?;
        let full = PipeReceiver::open(&self.paths.full, self.timeout)?;
        debug!(worker = self.worker, "consumer pipes open");

        Ok(ConsumerEnd::new(
            self.arena,
            Box::new(full),
            Box::new(empty),
            self.timeout,
            self.worker,
            Some(self.paths),
        ))
    }
}
