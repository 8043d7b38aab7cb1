// Index queues: the only way buffer ownership moves between channel ends.
//
// Two realizations: named pipes carrying 4-byte little-endian indices for
// cross-process channels, and a futex-backed in-process queue for channels
// whose ends are threads of one process. Both deliver indices in FIFO order
// and report the peer closing its end.

use std::collections::VecDeque;
use std::ffi::CString;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_utils::CachePadded;
use parking_lot::Mutex;

use crate::Core::error::{Result, TransportError};
use crate::Core::futex::Semaphore;

/// End-of-stream marker on the "full" queue; never a valid index.
pub const SENTINEL: u32 = 0xFFFF_FFFF;

/// Sending half of an index queue.
pub trait IndexSender: Send {
    fn send(&mut self, index: u32) -> Result<()>;

    /// Close the queue; the receiver sees end-of-queue after draining.
    fn close(&mut self);
}

/// Receiving half of an index queue.
pub trait IndexReceiver: Send {
    /// Block for the next index.
    ///
    /// `Ok(None)` means the sender closed its end. With a `timeout`, a quiet
    /// peer yields [`TransportError::PeerTimeout`].
    fn recv(&mut self, timeout: Option<Duration>) -> Result<Option<u32>>;
}

// -----------------------------------------------------------------------------
// Named pipes
// -----------------------------------------------------------------------------

/// Create a FIFO at `path` with mode 0600.
pub fn make_fifo(path: &Path) -> Result<()> {
    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|e| {
        TransportError::artifact(
            "invalid pipe path",
            path,
            io::Error::new(io::ErrorKind::InvalidInput, e),
        )
    })?;
    if unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) } != 0 {
        return Err(TransportError::artifact(
            "failed to create pipe",
            path,
            io::Error::last_os_error(),
        ));
    }
    Ok(())
}

fn clear_nonblocking(file: &File) -> io::Result<()> {
    let fd = file.as_raw_fd();
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags < 0 || libc::fcntl(fd, libc::F_SETFL, flags & !libc::O_NONBLOCK) < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

/// Open the write end of a FIFO.
///
/// Without a timeout this blocks until a reader opens the other end. With
/// one, the open is retried until a reader appears or the deadline passes.
fn open_fifo_write(path: &Path, timeout: Option<Duration>) -> Result<File> {
    let Some(timeout) = timeout else {
        return OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|e| TransportError::artifact("failed to open pipe for writing", path, e));
    };

    let deadline = Instant::now() + timeout;
    loop {
        match OpenOptions::new()
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)
        {
            Ok(file) => {
                clear_nonblocking(&file)
                    .map_err(|e| TransportError::artifact("failed to configure pipe", path, e))?;
                return Ok(file);
            }
            // no reader yet
            Err(e) if e.raw_os_error() == Some(libc::ENXIO) => {
                let now = Instant::now();
                if now >= deadline {
                    return Err(TransportError::PeerTimeout { timeout });
                }
                std::thread::sleep(std::cmp::min(deadline - now, Duration::from_millis(5)));
            }
            Err(e) => {
                return Err(TransportError::artifact("failed to open pipe for writing", path, e))
            }
        }
    }
}

/// Open the read end of a FIFO. With a timeout the open does not wait for
/// a writer; waiting moves to [`PipeReceiver::recv`].
fn open_fifo_read(path: &Path, timeout: Option<Duration>) -> Result<File> {
    let mut opts = OpenOptions::new();
    opts.read(true);
    if timeout.is_some() {
        opts.custom_flags(libc::O_NONBLOCK);
    }
    let file = opts
        .open(path)
        .map_err(|e| TransportError::artifact("failed to open pipe for reading", path, e))?;
    if timeout.is_some() {
        clear_nonblocking(&file)
            .map_err(|e| TransportError::artifact("failed to configure pipe", path, e))?;
    }
    Ok(file)
}

pub struct PipeSender {
    file: Option<File>,
    path: PathBuf,
}

impl PipeSender {
    pub fn open(path: &Path, timeout: Option<Duration>) -> Result<Self> {
        Ok(Self {
            file: Some(open_fifo_write(path, timeout)?),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl IndexSender for PipeSender {
    fn send(&mut self, index: u32) -> Result<()> {
        let file = self.file.as_mut().ok_or(TransportError::Finished)?;
        // 4 bytes < PIPE_BUF, so the write is atomic
        match file.write_all(&index.to_le_bytes()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Err(TransportError::PeerDisconnected),
            Err(e) => Err(e.into()),
        }
    }

    fn close(&mut self) {
        self.file = None;
    }
}

pub struct PipeReceiver {
    file: File,
    path: PathBuf,
}

impl PipeReceiver {
    pub fn open(path: &Path, timeout: Option<Duration>) -> Result<Self> {
        Ok(Self {
            file: open_fifo_read(path, timeout)?,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn wait_readable(&self, timeout: Duration) -> Result<()> {
        let mut pfd = libc::pollfd {
            fd: self.file.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        let ms = timeout.as_millis().min(i32::MAX as u128) as libc::c_int;
        loop {
            let ret = unsafe { libc::poll(&mut pfd, 1, ms) };
            if ret > 0 {
                return Ok(());
            }
            if ret == 0 {
                return Err(TransportError::PeerTimeout { timeout });
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err.into());
            }
        }
    }
}

impl IndexReceiver for PipeReceiver {
    fn recv(&mut self, timeout: Option<Duration>) -> Result<Option<u32>> {
        if let Some(timeout) = timeout {
            self.wait_readable(timeout)?;
        }
        let mut raw = [0u8; 4];
        match self.file.read_exact(&mut raw) {
            Ok(()) => Ok(Some(u32::from_le_bytes(raw))),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

// -----------------------------------------------------------------------------
// In-process queue
// -----------------------------------------------------------------------------

#[derive(Debug)]
struct LocalQueue {
    items: CachePadded<Mutex<VecDeque<u32>>>,
    ready: CachePadded<Semaphore>,
    closed: AtomicBool,
    receiver_gone: AtomicBool,
}

/// An unbounded in-process index queue.
///
/// The channel protocol itself bounds it: at most N indices are ever
/// queued.
pub fn local_queue() -> (LocalSender, LocalReceiver) {
    let shared = Arc::new(LocalQueue {
        items: CachePadded::new(Mutex::new(VecDeque::new())),
        ready: CachePadded::new(Semaphore::new(0)),
        closed: AtomicBool::new(false),
        receiver_gone: AtomicBool::new(false),
    });
    (
        LocalSender {
            shared: Arc::clone(&shared),
        },
        LocalReceiver { shared },
    )
}

#[derive(Debug)]
pub struct LocalSender {
    shared: Arc<LocalQueue>,
}

impl IndexSender for LocalSender {
    fn send(&mut self, index: u32) -> Result<()> {
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(TransportError::Finished);
        }
        if self.shared.receiver_gone.load(Ordering::Acquire) {
            return Err(TransportError::PeerDisconnected);
        }
        self.shared.items.lock().push_back(index);
        self.shared.ready.post();
        Ok(())
    }

    fn close(&mut self) {
        if !self.shared.closed.swap(true, Ordering::AcqRel) {
            self.shared.ready.post();
        }
    }
}

impl Drop for LocalSender {
    fn drop(&mut self) {
        self.close();
    }
}

#[derive(Debug)]
pub struct LocalReceiver {
    shared: Arc<LocalQueue>,
}

impl IndexReceiver for LocalReceiver {
    fn recv(&mut self, timeout: Option<Duration>) -> Result<Option<u32>> {
        loop {
            if let Some(index) = self.shared.items.lock().pop_front() {
                return Ok(Some(index));
            }
            if self.shared.closed.load(Ordering::Acquire) {
                // a send may have landed between the pop and the load
                return Ok(self.shared.items.lock().pop_front());
            }
            if !self.shared.ready.wait_timeout(timeout) {
                if let Some(timeout) = timeout {
                    return Err(TransportError::PeerTimeout { timeout });
                }
            }
        }
    }
}

impl Drop for LocalReceiver {
    fn drop(&mut self) {
        self.shared.receiver_gone.store(true, Ordering::Release);
    }
}
