//! Binary event wire format.
//!
//! Each event starts with a header byte whose top three bits carry the
//! [`EventKind`](Primitive::EventKind). The remaining header bits and any
//! extension bytes depend on the active [`FieldConfig`](FieldConfig::FieldConfig)
//! for that kind. Multi-byte values are little-endian; addresses and context
//! ids are packed to 56 bits.

pub mod Decoder;
pub mod Encoder;
pub mod Events;
pub mod FieldConfig;
pub mod Primitive;

pub use Decoder::{decode_and_dispatch, DecodeStats};
pub use Encoder::{encode_end, Encode};
pub use Events::{
    CompEvent, ComputeOp, ConfigChange, ContextMark, CxtEvent, EventRecord, MemAccess, MemEvent,
    SyncEvent, SyncOp,
};
pub use FieldConfig::{CompFieldConfig, MemFieldConfig};
pub use Primitive::{CompFormat, CxtType, EventKind, MemType, OpType, SyncType, END_BYTE};
