//! Bounded single-producer/single-consumer handoff of fixed-size buffers.
//!
//! A channel is N buffers (N a power of two, at least 2) in one arena plus
//! two index queues: "full" carries indices of filled buffers to the
//! consumer, "empty" carries drained indices back. Whoever last received an
//! index owns that buffer; nothing else synchronizes the payload.

mod builder;
mod consumer;
mod producer;
pub mod queue;

pub use builder::{ChannelBuilder, ChannelPaths, PendingConsumer};
pub use consumer::{BufferHandle, ConsumerEnd};
pub use producer::ProducerEnd;
pub use queue::{IndexReceiver, IndexSender, SENTINEL};

pub mod Buffer {
    pub mod Arena;
    pub mod layout;
    pub use Arena::BufferArena; // re-export for stable path
    pub use layout::{SegmentHeader, SegmentLayout, SlotHeader};
}

pub use Buffer::{BufferArena, SegmentLayout};
