//! Shared-memory event transport.
//!
//! An instrumented program (the producer) encodes compact binary events
//! into fixed-size buffers of a shared arena; a consumer process drains
//! them through a pair of index pipes and dispatches every decoded event to
//! an analysis backend.

// Module naming follows project convention
#[allow(non_snake_case)]
pub mod Capability;
#[allow(non_snake_case)]
pub mod Channel;
#[allow(non_snake_case)]
pub mod Codec;
#[allow(non_snake_case)]
pub mod Core;
#[allow(non_snake_case)]
pub mod Debug {
    pub mod StructDebug;
}
#[allow(non_snake_case)]
pub mod Dispatch;
pub mod ffi;

pub use Capability::{resolve, Availability, CapabilityField, CapabilityVector, ResolvedCapabilities};
pub use Channel::{BufferHandle, ChannelBuilder, ChannelPaths, ConsumerEnd, ProducerEnd};
pub use Codec::FieldConfig::FieldConfig;
pub use Codec::{decode_and_dispatch, DecodeStats, Encode, EventKind, EventRecord};
pub use Core::{ConfigError, EncodeError, NegotiationError, ProtocolError, Result, TransportConfig, TransportError};
pub use Dispatch::{Backend, BackendRegistry, EventHandler, EventWriter, Session};
