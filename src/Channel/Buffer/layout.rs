use std::mem::size_of;
use std::sync::atomic::AtomicU64;

use crate::Capability::CAPABILITY_COUNT;

/// "EVPIPESG", identifies a channel segment.
pub const SEGMENT_MAGIC: u64 = 0x4556_5049_5045_5347;
pub const SEGMENT_VERSION: u32 = 1;

/// Slot stride alignment; keeps neighbouring slot headers on separate lines.
pub const SLOT_ALIGN: usize = 64;

/// Fixed header at offset 0 of every channel segment.
///
/// Written once by the side that creates the segment, before the peer can
/// attach, and read-only afterwards.
#[repr(C, align(128))]
pub struct SegmentHeader {
    pub magic: u64,
    pub version: u32,
    /// Buffers in the arena (power of two).
    pub buffer_count: u32,
    /// Event bytes per buffer.
    pub buffer_bytes: u64,
    /// Non-zero when every buffer carries a timestamp array.
    pub timestamps: u32,
    pub reserved: u32,
    /// Resolved capability vector, one availability value per field.
    pub capabilities: [u8; CAPABILITY_COUNT],
    /// Initial FieldConfig bytes: memory, compute, sync, context.
    pub field_config: [u8; 4],
}

/// Per-buffer header, at the start of every slot.
///
/// Written by whichever side owns the buffer; ownership moves only through
/// the channel's index queues.
#[repr(C, align(64))]
pub struct SlotHeader {
    /// Encoded bytes in the buffer, End byte included.
    pub used: AtomicU64,
    /// Entries in the buffer's timestamp array.
    pub ts_used: AtomicU64,
}

/// Offsets of everything in a segment, derived from the header values.
///
/// ```text
/// [SegmentHeader][slot 0][slot 1]...[slot N-1]
/// slot = [SlotHeader][timestamps: u64 * ts_capacity][events: buffer_bytes] (padded to SLOT_ALIGN)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentLayout {
    pub buffers: usize,
    pub buffer_bytes: usize,
    pub ts_capacity: usize,
    pub stride: usize,
    pub total: usize,
}

#[inline]
const fn align_up(n: usize, align: usize) -> usize {
    (n + align - 1) & !(align - 1)
}

impl SegmentLayout {
    pub fn new(buffers: usize, buffer_bytes: usize, timestamps: bool) -> Self {
        // as many timestamp bytes as event bytes
        let ts_capacity = if timestamps { (buffer_bytes / 8).max(1) } else { 0 };
        let stride = align_up(
            size_of::<SlotHeader>() + ts_capacity * size_of::<u64>() + buffer_bytes,
            SLOT_ALIGN,
        );
        Self {
            buffers,
            buffer_bytes,
            ts_capacity,
            stride,
            total: size_of::<SegmentHeader>() + buffers * stride,
        }
    }

    pub fn has_timestamps(&self) -> bool {
        self.ts_capacity > 0
    }

    pub fn slot_offset(&self, index: usize) -> usize {
        size_of::<SegmentHeader>() + index * self.stride
    }

    pub fn timestamps_offset(&self, index: usize) -> usize {
        self.slot_offset(index) + size_of::<SlotHeader>()
    }

    pub fn events_offset(&self, index: usize) -> usize {
        self.timestamps_offset(index) + self.ts_capacity * size_of::<u64>()
    }
}
