use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::Capability::CapabilityField;

/// Convenience alias used across the transport.
pub type Result<T> = std::result::Result<T, TransportError>;

/// The consumer asked for event detail the producer cannot deliver.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationError {
    #[error("insufficient event capture capability: `{field}` is required but the producer cannot supply it")]
    Insufficient { field: CapabilityField },
}

/// Malformed bytes in a received buffer.
///
/// Any of these means producer and consumer disagree about the active field
/// configuration; there is no safe way to resynchronize the stream.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("unknown event kind tag {tag} at offset {offset}")]
    UnknownKind { tag: u8, offset: usize },
    #[error("reserved event kind (control flow) at offset {offset}")]
    ReservedKind { offset: usize },
    #[error("unknown {kind} subtype {value} at offset {offset}")]
    UnknownSubtype {
        kind: &'static str,
        value: u8,
        offset: usize,
    },
    #[error("event at offset {offset} needs {needed} bytes but only {available} remain")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("buffer carries {timestamps} timestamps for {events} events")]
    TimestampMismatch { timestamps: usize, events: usize },
}

/// An event that cannot be represented on the wire.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("value {value:#x} does not fit in the 56-bit address field")]
    AddressOverflow { value: u64 },
    #[error("context name length {len} outside 1..=256")]
    NameLength { len: usize },
    #[error("compute arity {arity} outside 1..=4")]
    Arity { arity: u8 },
    #[error("size class {class} outside 0..=7")]
    SizeClass { class: u8 },
    #[error("config target must be memory, compute, sync or context")]
    ConfigTarget,
    #[error("event of {len} bytes does not fit in a buffer of {capacity} bytes")]
    EventTooLarge { len: usize, capacity: usize },
}

/// Invalid transport configuration, detected before any channel opens.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("worker count {value} outside 1..=16")]
    Workers { value: usize },
    #[error("buffer count {value} must be a power of two and at least 2")]
    Buffers { value: usize },
    #[error("buffer size {value} is below the {} byte minimum", crate::Core::Config::MIN_BUFFER_BYTES)]
    BufferBytes { value: usize },
    #[error("environment variable {var} has invalid value `{value}`")]
    Env { var: &'static str, value: String },
    #[error("IPC directory `{}` not found; set EVPIPE_SHM_DIR to a tmpfs mount", path.display())]
    IpcDirMissing { path: PathBuf },
    #[error("invalid capability string: {reason}")]
    CapabilityString { reason: String },
}

/// Umbrella error for every transport operation.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    Negotiation(#[from] NegotiationError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{context} `{}`: {source}", path.display())]
    Artifact {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("I/O error on channel: {0}")]
    Io(#[from] io::Error),
    #[error("shared segment rejected: {reason}")]
    SegmentMismatch { reason: String },
    #[error("peer closed the channel before sending the end-of-stream sentinel")]
    PeerDisconnected,
    #[error("no message from peer within {timeout:?}")]
    PeerTimeout { timeout: Duration },
    #[error("buffer index {index} out of range for {buffers} buffers")]
    InvalidIndex { index: u32, buffers: usize },
    #[error("buffer index {index} handed over while still owned by the consumer")]
    DuplicateIndex { index: u32 },
    #[error("channel already finished")]
    Finished,
    #[error("worker {worker} panicked")]
    WorkerPanicked { worker: usize },
    #[error("no backend registered under `{name}`")]
    UnknownBackend { name: String },
}

impl TransportError {
    pub(crate) fn artifact(context: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        TransportError::Artifact {
            context,
            path: path.into(),
            source,
        }
    }
}
