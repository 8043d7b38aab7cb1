// Analysis backends and the name -> backend registry.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::info;

use super::handler::{EventHandler, NullHandler};
use crate::Capability::{Availability, CapabilityField, CapabilityVector};
use crate::Codec::Events::{CompEvent, CxtEvent, MemEvent, SyncEvent};
use crate::Core::error::{Result, TransportError};

pub type HandlerFactory = Arc<dyn Fn(usize) -> Box<dyn EventHandler> + Send + Sync>;
pub type FinishHook = Box<dyn FnOnce() + Send>;
pub type BackendFactory = Box<dyn Fn() -> Backend + Send + Sync>;

/// Everything a session needs from an analysis backend.
pub struct Backend {
    name: String,
    requested: CapabilityVector,
    factory: HandlerFactory,
    on_finish: Option<FinishHook>,
}

impl Backend {
    /// `factory` is called once per worker, on that worker's thread.
    pub fn new<F>(name: impl Into<String>, requested: CapabilityVector, factory: F) -> Self
    where
        F: Fn(usize) -> Box<dyn EventHandler> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            requested,
            factory: Arc::new(factory),
            on_finish: None,
        }
    }

    /// Run `hook` once, after every worker of the session has finished.
    pub fn with_on_finish<F>(mut self, hook: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.on_finish = Some(Box::new(hook));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn requested(&self) -> &CapabilityVector {
        &self.requested
    }

    pub(crate) fn factory(&self) -> HandlerFactory {
        Arc::clone(&self.factory)
    }

    pub(crate) fn take_on_finish(&mut self) -> Option<FinishHook> {
        self.on_finish.take()
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend")
            .field("name", &self.name)
            .field("requested", &format_args!("{}", self.requested))
            .field("on_finish", &self.on_finish.is_some())
            .finish()
    }
}

pub struct BackendRegistry {
    factories: BTreeMap<String, BackendFactory>,
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl BackendRegistry {
    /// A registry with nothing in it.
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// `"null"` and `"simple-count"`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("null", null_backend);
        registry.register("simple-count", || SimpleCount::new().backend());
        registry
    }

    /// Register (or replace) the backend called `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Backend + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
        self
    }

    pub fn create(&self, name: &str) -> Result<Backend> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| TransportError::UnknownBackend {
                name: name.to_string(),
            })
    }

    /// Registered names, sorted.
    pub fn available(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

/// Event kinds only; no optional fields.
pub fn kinds_only() -> CapabilityVector {
    let mut caps = CapabilityVector::filled(Availability::Disabled);
    for field in [
        CapabilityField::MemoryEnabled,
        CapabilityField::ComputeEnabled,
        CapabilityField::SyncEnabled,
        CapabilityField::ContextInstruction,
        CapabilityField::ContextBasicBlock,
        CapabilityField::ContextFunction,
        CapabilityField::ContextThread,
    ] {
        caps.set(field, Availability::Enabled);
    }
    caps
}

pub fn null_backend() -> Backend {
    Backend::new(
        "null",
        CapabilityVector::filled(Availability::Disabled),
        |_| Box::new(NullHandler),
    )
}

/// Totals of a `simple-count` run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EventCounts {
    pub memory: u64,
    pub loads: u64,
    pub stores: u64,
    pub compute: u64,
    pub iops: u64,
    pub flops: u64,
    pub sync: u64,
    pub context: u64,
}

impl EventCounts {
    pub fn total(&self) -> u64 {
        self.memory + self.compute + self.sync + self.context
    }
}

#[derive(Debug, Default)]
struct SharedCounts {
    memory: AtomicU64,
    loads: AtomicU64,
    stores: AtomicU64,
    compute: AtomicU64,
    iops: AtomicU64,
    flops: AtomicU64,
    sync: AtomicU64,
    context: AtomicU64,
}

impl SharedCounts {
    fn add(&self, local: &EventCounts) {
        self.memory.fetch_add(local.memory, Ordering::Relaxed);
        self.loads.fetch_add(local.loads, Ordering::Relaxed);
        self.stores.fetch_add(local.stores, Ordering::Relaxed);
        self.compute.fetch_add(local.compute, Ordering::Relaxed);
        self.iops.fetch_add(local.iops, Ordering::Relaxed);
        self.flops.fetch_add(local.flops, Ordering::Relaxed);
        self.sync.fetch_add(local.sync, Ordering::Relaxed);
        self.context.fetch_add(local.context, Ordering::Relaxed);
    }

    fn snapshot(&self) -> EventCounts {
        EventCounts {
            memory: self.memory.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            stores: self.stores.load(Ordering::Relaxed),
            compute: self.compute.load(Ordering::Relaxed),
            iops: self.iops.load(Ordering::Relaxed),
            flops: self.flops.load(Ordering::Relaxed),
            sync: self.sync.load(Ordering::Relaxed),
            context: self.context.load(Ordering::Relaxed),
        }
    }
}

/// Counts events per kind across all workers.
///
/// Workers count locally and fold into the shared totals when their
/// handler is dropped, i.e. before the session's finish hook runs.
#[derive(Debug, Default, Clone)]
pub struct SimpleCount {
    totals: Arc<SharedCounts>,
}

impl SimpleCount {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counts(&self) -> EventCounts {
        self.totals.snapshot()
    }

    pub fn backend(&self) -> Backend {
        let totals = Arc::clone(&self.totals);
        let report = Arc::clone(&self.totals);
        let requested = kinds_only()
            .with(CapabilityField::MemoryLoadStoreType, Availability::Enabled)
            .with(CapabilityField::ComputeIntOrFloat, Availability::Enabled);
        Backend::new("simple-count", requested, move |_| {
            Box::new(CountHandler {
                local: EventCounts::default(),
                totals: Arc::clone(&totals),
            })
        })
        .with_on_finish(move || {
            let c = report.snapshot();
            info!(
                memory = c.memory,
                loads = c.loads,
                stores = c.stores,
                compute = c.compute,
                iops = c.iops,
                flops = c.flops,
                sync = c.sync,
                context = c.context,
                "event counts"
            );
        })
    }
}

struct CountHandler {
    local: EventCounts,
    totals: Arc<SharedCounts>,
}

impl EventHandler for CountHandler {
    fn on_memory(&mut self, ev: &MemEvent<'_>) {
        self.local.memory += 1;
        if ev.is_load() {
            self.local.loads += 1;
        } else if ev.is_store() {
            self.local.stores += 1;
        }
    }

    fn on_compute(&mut self, ev: &CompEvent<'_>) {
        self.local.compute += 1;
        if ev.is_integer() {
            self.local.iops += 1;
        } else if ev.is_float() {
            self.local.flops += 1;
        }
    }

    fn on_sync(&mut self, _ev: &SyncEvent<'_>) {
        self.local.sync += 1;
    }

    fn on_context(&mut self, _ev: &CxtEvent<'_>) {
        self.local.context += 1;
    }
}

impl Drop for CountHandler {
    fn drop(&mut self) {
        self.totals.add(&self.local);
    }
}
