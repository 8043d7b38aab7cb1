// Session orchestration: negotiation, channel setup, one worker thread per
// channel, and the one-time finish hook.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use super::registry::Backend;
use super::source::EventSource;
use super::worker::{drain_channel, first_cause, join, spawn_named, WorkerReport};
use super::writer::EventWriter;
use crate::Capability::{resolve, CapabilityVector, ResolvedCapabilities};
use crate::Channel::{ChannelBuilder, ChannelPaths, PendingConsumer};
use crate::Codec::Decoder::DecodeStats;
use crate::Core::error::{ConfigError, Result, TransportError};
use crate::Core::Cleanup::{fatal, CleanupRegistry};
use crate::Core::Config::{TransportConfig, MAX_WORKERS};

/// State shared by every channel of one run, passed explicitly instead of
/// living in globals.
///
/// Dropping the context removes the run's IPC artifacts.
pub struct TransportContext {
    config: TransportConfig,
    cleanup: Option<Arc<CleanupRegistry>>,
    capabilities: Vec<ResolvedCapabilities>,
}

impl TransportContext {
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn cleanup(&self) -> Option<&Arc<CleanupRegistry>> {
        self.cleanup.as_ref()
    }

    /// Resolved capabilities, one entry per channel.
    pub fn capabilities(&self) -> &[ResolvedCapabilities] {
        &self.capabilities
    }

    /// Apply the fatal-error policy: terminate when configured to, else
    /// hand the error back.
    fn fail(&self, err: TransportError) -> TransportError {
        escalate(&self.config, self.cleanup.as_deref(), err)
    }
}

impl Drop for TransportContext {
    fn drop(&mut self) {
        if let Some(registry) = self.cleanup.take() {
            registry.cleanup();
            registry.uninstall_process_hooks();
        }
    }
}

fn escalate(config: &TransportConfig, registry: Option<&CleanupRegistry>, err: TransportError) -> TransportError {
    if config.exits_on_error() {
        fatal(&err, registry);
    }
    err
}

/// Per-worker results of a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub workers: Vec<WorkerReport>,
}

impl RunSummary {
    pub fn totals(&self) -> DecodeStats {
        let mut total = DecodeStats::default();
        for w in &self.workers {
            total += w.stats;
        }
        total
    }

    pub fn buffers(&self) -> u64 {
        self.workers.iter().map(|w| w.buffers).sum()
    }
}

fn finish_run(ctx: &TransportContext, backend: &mut Backend, results: Vec<Result<WorkerReport>>) -> Result<RunSummary> {
    let mut workers = Vec::with_capacity(results.len());
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(report) => workers.push(report),
            Err(e) => errors.push(e),
        }
    }
    if let Some(err) = first_cause(errors) {
        return Err(ctx.fail(err));
    }

    // every worker has joined; the hook runs exactly once
    if let Some(hook) = backend.take_on_finish() {
        hook();
    }
    let summary = RunSummary { workers };
    info!(
        backend = backend.name(),
        workers = summary.workers.len(),
        buffers = summary.buffers(),
        events = summary.totals().dispatched,
        "all streams finished"
    );
    Ok(summary)
}

#[derive(Debug)]
pub struct Session {
    config: TransportConfig,
}

impl Session {
    pub fn new(config: TransportConfig) -> Result<Self> {
        if let Err(e) = config.validate() {
            return Err(escalate(&config, None, e.into()));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Run every source against `backend`, one in-process channel, producer
    /// thread and worker thread per source.
    pub fn run_in_process(&self, sources: Vec<Box<dyn EventSource>>, mut backend: Backend) -> Result<RunSummary> {
        let mut ctx = TransportContext {
            config: self.config.clone(),
            cleanup: None,
            capabilities: Vec::with_capacity(sources.len()),
        };
        if sources.is_empty() || sources.len() > MAX_WORKERS {
            return Err(ctx.fail(ConfigError::Workers { value: sources.len() }.into()));
        }

        for source in &sources {
            match resolve(&source.offered(), backend.requested()) {
                Ok(caps) => ctx.capabilities.push(caps),
                Err(e) => return Err(ctx.fail(e.into())),
            }
        }

        let mut channels = Vec::with_capacity(sources.len());
        for (i, caps) in ctx.capabilities.iter().enumerate() {
            match ChannelBuilder::from_config(&self.config)
                .with_worker(i)
                .build_in_process(caps)
            {
                Ok(ends) => channels.push(ends),
                Err(e) => return Err(ctx.fail(e)),
            }
        }

        let factory = backend.factory();
        let mut threads = Vec::with_capacity(sources.len());
        for (i, (mut source, (producer, mut consumer))) in sources.into_iter().zip(channels).enumerate() {
            let produce = spawn_named(format!("evpipe-producer-{}", i), move || {
                let mut writer = EventWriter::new(producer)?;
                source.run(&mut writer)?;
                writer.finish()?;
                Ok(writer.events_written())
            });
            let factory = Arc::clone(&factory);
            let work = spawn_named(format!("evpipe-worker-{}", i), move || {
                let mut handler = factory(i);
                drain_channel(&mut consumer, handler.as_mut())
            });
            match (produce, work) {
                (Ok(p), Ok(w)) => threads.push((i, p, w)),
                (Err(e), _) | (_, Err(e)) => return Err(ctx.fail(e)),
            }
        }

        let mut results = Vec::with_capacity(threads.len() * 2);
        for (i, producer, worker) in threads {
            if let Err(e) = join(i, producer) {
                results.push(Err(e));
            }
            results.push(join(i, worker));
        }
        finish_run(&ctx, &mut backend, results)
    }

    /// Create `workers` cross-process channels for producers to attach to.
    ///
    /// `offered` is the producer's capability vector. The artifacts exist
    /// when this returns; [`ServeHandle::wait`] runs the workers.
    pub fn serve(&self, offered: &CapabilityVector, backend: Backend) -> Result<ServeHandle> {
        let caps = resolve(offered, backend.requested()).map_err(|e| escalate(&self.config, None, e.into()))?;
        let dir = self
            .config
            .create_ipc_dir()
            .map_err(|e| escalate(&self.config, None, e))?;

        let workers = self.config.workers();
        let registry = match CleanupRegistry::new(&dir, self.config.base_name(), workers) {
            Ok(r) => Arc::new(r),
            Err(e) => {
                let _ = std::fs::remove_dir(&dir);
                return Err(escalate(&self.config, None, e));
            }
        };
        if self.config.exits_on_error() {
            registry.install_process_hooks();
        }

        let ctx = TransportContext {
            config: self.config.clone(),
            cleanup: Some(registry),
            capabilities: vec![caps; workers],
        };

        let mut pending = Vec::with_capacity(workers);
        for i in 0..workers {
            let paths = ChannelPaths::new(&dir, self.config.base_name(), i);
            match ChannelBuilder::from_config(&self.config)
                .with_worker(i)
                .create_consumer(paths, &caps)
            {
                Ok(p) => pending.push(p),
                Err(e) => return Err(ctx.fail(e)),
            }
        }

        info!(dir = %dir.display(), workers, capabilities = %caps.vector(), "serving channels");
        Ok(ServeHandle {
            ctx,
            pending,
            backend,
        })
    }
}

/// Channels created by [`Session::serve`], waiting for their producers.
pub struct ServeHandle {
    ctx: TransportContext,
    pending: Vec<PendingConsumer>,
    backend: Backend,
}

impl ServeHandle {
    /// Directory holding every artifact.
    pub fn dir(&self) -> Option<&Path> {
        self.ctx.cleanup().map(|r| r.dir())
    }

    pub fn paths(&self) -> impl Iterator<Item = &ChannelPaths> {
        self.pending.iter().map(|p| p.paths())
    }

    pub fn capabilities(&self) -> &[ResolvedCapabilities] {
        self.ctx.capabilities()
    }

    pub fn context(&self) -> &TransportContext {
        &self.ctx
    }

    /// Run one worker per channel until every producer has ended its
    /// stream, then run the backend's finish hook and remove the artifacts.
    pub fn wait(self) -> Result<RunSummary> {
        let ServeHandle {
            ctx,
            pending,
            mut backend,
        } = self;

        let factory = backend.factory();
        let mut threads = Vec::with_capacity(pending.len());
        for channel in pending {
            let i = channel.worker();
            let factory = Arc::clone(&factory);
            let spawned = spawn_named(format!("evpipe-worker-{}", i), move || {
                let mut consumer = channel.open()?;
                let mut handler = factory(i);
                drain_channel(&mut consumer, handler.as_mut())
            });
            match spawned {
                Ok(handle) => threads.push((i, handle)),
                Err(e) => return Err(ctx.fail(e)),
            }
        }
        debug!(workers = threads.len(), "workers started");

        let results = threads.into_iter().map(|(i, h)| join(i, h)).collect();
        finish_run(&ctx, &mut backend, results)
    }
}
