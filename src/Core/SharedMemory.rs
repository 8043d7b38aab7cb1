// Shared memory backends for the buffer arena.
// A file-backed mapping for cross-process channels, and a heap region for
// channels whose two ends are threads of one process.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::fmt::Debug;
use std::fs::OpenOptions;
use std::io;
#[cfg(unix)]
use std::os::fd::IntoRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::ptr;
use std::ptr::NonNull;

/// Alignment of every segment base; matches the segment header alignment.
pub const SEGMENT_ALIGN: usize = 128;

/// Shared memory backend trait for the buffer arena
pub trait SharedMemoryBackend: Send + Sync + Debug {
    /// Get a pointer to the mapped memory region
    fn as_ptr(&self) -> *mut u8;

    /// Get the size of the mapped region in bytes
    fn size(&self) -> usize;

    /// Get the underlying handle
    fn raw_handle(&self) -> RawHandle;
}

/// Platform-specific handle type
#[derive(Debug, Clone, Copy)]
pub enum RawHandle {
    /// Unix file descriptor (Linux)
    Fd(i32),
    /// Process-private heap region
    Heap,
}

/// Create a file-backed shared memory segment at `path`.
///
/// The file is created (or truncated) with mode 0600, sized to `size` bytes
/// and mapped read/write. Any existing contents are discarded.
#[cfg(unix)]
pub fn create_shared_memory(path: &Path, size: usize) -> io::Result<Box<dyn SharedMemoryBackend>> {
    Ok(Box::new(FileSharedMemory::create(path, size)?))
}

/// Map an existing file-backed segment created by the peer.
///
/// Fails with `InvalidData` if the file is smaller than `min_size`.
#[cfg(unix)]
pub fn attach_shared_memory(path: &Path, min_size: usize) -> io::Result<Box<dyn SharedMemoryBackend>> {
    Ok(Box::new(FileSharedMemory::attach(path, min_size)?))
}

/// Allocate a zeroed, process-private region for an in-process channel.
pub fn heap_memory(size: usize) -> io::Result<Box<dyn SharedMemoryBackend>> {
    Ok(Box::new(HeapMemory::new(size)?))
}

#[cfg(unix)]
#[derive(Debug)]
pub struct FileSharedMemory {
    ptr: NonNull<u8>,
    size: usize,
    fd: i32,
}

#[cfg(unix)]
unsafe impl Send for FileSharedMemory {}
#[cfg(unix)]
unsafe impl Sync for FileSharedMemory {}

#[cfg(unix)]
impl FileSharedMemory {
    pub fn create(path: &Path, size: usize) -> io::Result<Self> {
        if size == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "shared memory segment must not be empty",
            ));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .map_err(|e| {
                io::Error::new(
                    e.kind(),
                    format!("Failed to create shared memory file at {}: {}", path.display(), e),
                )
            })?;

        // ftruncate zero-fills, so every buffer header starts out empty
        file.set_len(size as u64)?;

        Self::map(file.into_raw_fd(), size)
    }

    pub fn attach(path: &Path, min_size: usize) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("Failed to open shared memory at {}: {}", path.display(), e),
                )
            })?;

        let file_size = file.metadata()?.len() as usize;
        if file_size < min_size.max(1) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Shared memory size too small: expected at least {} bytes, got {}",
                    min_size, file_size
                ),
            ));
        }

        Self::map(file.into_raw_fd(), file_size)
    }

    fn map(fd: i32, size: usize) -> io::Result<Self> {
        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };

        if ptr == libc::MAP_FAILED {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(err);
        }

        // mmap hands back page-aligned addresses, which satisfies SEGMENT_ALIGN
        let ptr = NonNull::new(ptr as *mut u8).ok_or_else(|| {
            io::Error::new(io::ErrorKind::Other, "mmap returned a null mapping")
        })?;

        Ok(Self { ptr, size, fd })
    }
}

#[cfg(unix)]
impl Drop for FileSharedMemory {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.size);
            libc::close(self.fd);
        }
    }
}

#[cfg(unix)]
impl SharedMemoryBackend for FileSharedMemory {
    fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    fn size(&self) -> usize {
        self.size
    }

    fn raw_handle(&self) -> RawHandle {
        RawHandle::Fd(self.fd)
    }
}

/// Zeroed heap region with the same alignment guarantees as a mapping.
#[derive(Debug)]
pub struct HeapMemory {
    ptr: NonNull<u8>,
    layout: Layout,
}

unsafe impl Send for HeapMemory {}
unsafe impl Sync for HeapMemory {}

impl HeapMemory {
    pub fn new(size: usize) -> io::Result<Self> {
        let layout = Layout::from_size_align(size.max(1), SEGMENT_ALIGN)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
        let ptr = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(ptr).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::OutOfMemory,
                format!("Failed to allocate {} bytes for channel buffers", size),
            )
        })?;
        Ok(Self { ptr, layout })
    }
}

impl Drop for HeapMemory {
    fn drop(&mut self) {
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) };
    }
}

impl SharedMemoryBackend for HeapMemory {
    fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    fn size(&self) -> usize {
        self.layout.size()
    }

    fn raw_handle(&self) -> RawHandle {
        RawHandle::Heap
    }
}
