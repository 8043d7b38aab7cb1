// The buffer arena: a segment header followed by N fixed-size slots,
// addressed only by slot index.

use std::mem::size_of;
use std::path::Path;
use std::slice;

use super::layout::{SegmentHeader, SegmentLayout, SlotHeader, SEGMENT_MAGIC, SEGMENT_VERSION};
use crate::Capability::ResolvedCapabilities;
use crate::Codec::FieldConfig::FieldConfig;
use crate::Core::error::{Result, TransportError};
use crate::Core::SharedMemory::{self, SharedMemoryBackend, SEGMENT_ALIGN};

pub struct BufferArena {
    mem: Box<dyn SharedMemoryBackend>,
    layout: SegmentLayout,
}

impl BufferArena {
    /// Create a file-backed arena at `path` and write its header.
    pub fn create_file(
        path: &Path,
        layout: SegmentLayout,
        caps: &ResolvedCapabilities,
        cfg: &FieldConfig,
    ) -> Result<Self> {
        let mem = SharedMemory::create_shared_memory(path, layout.total)
            .map_err(|e| TransportError::artifact("failed to create channel segment", path, e))?;
        Self::init(mem, layout, caps, cfg)
    }

    /// Process-private arena for an in-process channel.
    pub fn create_heap(layout: SegmentLayout, caps: &ResolvedCapabilities, cfg: &FieldConfig) -> Result<Self> {
        let mem = SharedMemory::heap_memory(layout.total)?;
        Self::init(mem, layout, caps, cfg)
    }

    /// Map the segment created by the peer and validate its header.
    pub fn attach_file(path: &Path) -> Result<Self> {
        let mem = SharedMemory::attach_shared_memory(path, size_of::<SegmentHeader>())
            .map_err(|e| TransportError::artifact("failed to attach channel segment", path, e))?;
        Self::check_alignment(&*mem)?;

        let header = unsafe { &*(mem.as_ptr() as *const SegmentHeader) };
        if header.magic != SEGMENT_MAGIC {
            return Err(TransportError::SegmentMismatch {
                reason: format!("bad magic {:#018x}", header.magic),
            });
        }
        if header.version != SEGMENT_VERSION {
            return Err(TransportError::SegmentMismatch {
                reason: format!("version {} (expected {})", header.version, SEGMENT_VERSION),
            });
        }
        let buffers = header.buffer_count as usize;
        if buffers < 2 || !buffers.is_power_of_two() {
            return Err(TransportError::SegmentMismatch {
                reason: format!("buffer count {} is not a power of two >= 2", buffers),
            });
        }

        let layout = SegmentLayout::new(buffers, header.buffer_bytes as usize, header.timestamps != 0);
        if mem.size() < layout.total {
            return Err(TransportError::SegmentMismatch {
                reason: format!("segment holds {} bytes, layout needs {}", mem.size(), layout.total),
            });
        }

        Ok(Self { mem, layout })
    }

    fn check_alignment(mem: &dyn SharedMemoryBackend) -> Result<()> {
        if (mem.as_ptr() as usize) % SEGMENT_ALIGN != 0 {
            return Err(TransportError::SegmentMismatch {
                reason: "segment base not properly aligned".to_string(),
            });
        }
        Ok(())
    }

    fn init(
        mem: Box<dyn SharedMemoryBackend>,
        layout: SegmentLayout,
        caps: &ResolvedCapabilities,
        cfg: &FieldConfig,
    ) -> Result<Self> {
        Self::check_alignment(&*mem)?;
        if mem.size() < layout.total {
            return Err(TransportError::SegmentMismatch {
                reason: format!("segment holds {} bytes, layout needs {}", mem.size(), layout.total),
            });
        }

        unsafe {
            std::ptr::write(
                mem.as_ptr() as *mut SegmentHeader,
                SegmentHeader {
                    magic: SEGMENT_MAGIC,
                    version: SEGMENT_VERSION,
                    buffer_count: layout.buffers as u32,
                    buffer_bytes: layout.buffer_bytes as u64,
                    timestamps: layout.has_timestamps() as u32,
                    reserved: 0,
                    capabilities: caps.vector().to_bytes(),
                    field_config: cfg.to_bytes(),
                },
            );
        }

        Ok(Self { mem, layout })
    }

    pub fn header(&self) -> &SegmentHeader {
        unsafe { &*(self.mem.as_ptr() as *const SegmentHeader) }
    }

    pub fn layout(&self) -> &SegmentLayout {
        &self.layout
    }

    pub fn buffers(&self) -> usize {
        self.layout.buffers
    }

    pub fn buffer_bytes(&self) -> usize {
        self.layout.buffer_bytes
    }

    pub fn memory(&self) -> &dyn SharedMemoryBackend {
        &*self.mem
    }

    pub fn capabilities(&self) -> Result<ResolvedCapabilities> {
        ResolvedCapabilities::from_wire(&self.header().capabilities).ok_or_else(|| {
            TransportError::SegmentMismatch {
                reason: "capability vector in header is not a resolved vector".to_string(),
            }
        })
    }

    /// FieldConfig both ends start from.
    pub fn field_config(&self) -> FieldConfig {
        FieldConfig::from_bytes(self.header().field_config)
    }

    pub(crate) fn slot(&self, index: u32) -> &SlotHeader {
        debug_assert!((index as usize) < self.layout.buffers);
        unsafe { &*(self.mem.as_ptr().add(self.layout.slot_offset(index as usize)) as *const SlotHeader) }
    }

    /// # Safety
    /// The caller must own buffer `index` under the queue protocol.
    pub(crate) unsafe fn events_mut(&self, index: u32) -> &mut [u8] {
        let ptr = self.mem.as_ptr().add(self.layout.events_offset(index as usize));
        slice::from_raw_parts_mut(ptr, self.layout.buffer_bytes)
    }

    /// # Safety
    /// As [`events_mut`](Self::events_mut); `len` must not exceed the buffer size.
    pub(crate) unsafe fn events(&self, index: u32, len: usize) -> &[u8] {
        let ptr = self.mem.as_ptr().add(self.layout.events_offset(index as usize));
        slice::from_raw_parts(ptr, len)
    }

    /// # Safety
    /// The caller must own buffer `index` under the queue protocol.
    pub(crate) unsafe fn timestamps_mut(&self, index: u32) -> &mut [u64] {
        let ptr = self.mem.as_ptr().add(self.layout.timestamps_offset(index as usize)) as *mut u64;
        slice::from_raw_parts_mut(ptr, self.layout.ts_capacity)
    }

    /// # Safety
    /// As [`timestamps_mut`](Self::timestamps_mut); `len` must not exceed the capacity.
    pub(crate) unsafe fn timestamps(&self, index: u32, len: usize) -> &[u64] {
        let ptr = self.mem.as_ptr().add(self.layout.timestamps_offset(index as usize)) as *const u64;
        slice::from_raw_parts(ptr, len)
    }
}

impl std::fmt::Debug for BufferArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        crate::Debug::StructDebug::debug_buffer_arena(self, f)
    }
}
