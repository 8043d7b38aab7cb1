// Removal of filesystem IPC artifacts on every way out of the process:
// normal return, exit(), SIGINT/SIGSEGV, panic, and fatal transport errors.
//
// Everything the signal path touches is precomputed when the registry is
// built, so the handler itself only does atomic operations, unlink and rmdir.

use std::ffi::CString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicUsize, Ordering};
use std::sync::Arc;

use lazy_static::lazy_static;
use tracing::{debug, error, warn};

use crate::Channel::ChannelPaths;
use crate::Core::error::{Result, TransportError};

/// Upper bound on registries armed at the same time.
const MAX_ARMED: usize = 64;

#[allow(clippy::declare_interior_mutable_const)]
const EMPTY_SLOT: AtomicPtr<CleanupRegistry> = AtomicPtr::new(ptr::null_mut());

static ARMED: [AtomicPtr<CleanupRegistry>; MAX_ARMED] = [EMPTY_SLOT; MAX_ARMED];
/// Hooks currently walking `ARMED`. A disarmed registry is only released
/// once this drops to zero.
static READERS: AtomicUsize = AtomicUsize::new(0);
static PREV_SIGINT: AtomicPtr<libc::sigaction> = AtomicPtr::new(ptr::null_mut());
static PREV_SIGSEGV: AtomicPtr<libc::sigaction> = AtomicPtr::new(ptr::null_mut());

lazy_static! {
    // Forced once per process by `install_process_hooks`.
    static ref PROCESS_HOOKS: () = unsafe { arm_process_hooks() };
}

/// Every artifact path of one session, kept as C strings.
pub struct CleanupRegistry {
    dir: PathBuf,
    dir_c: CString,
    files: Vec<CString>,
    done: AtomicBool,
}

impl CleanupRegistry {
    /// Precompute the segment and pipe paths of `workers` channels in `dir`.
    pub fn new(dir: impl Into<PathBuf>, base_name: &str, workers: usize) -> Result<Self> {
        let dir = dir.into();
        let dir_c = c_path(&dir)?;
        let mut files = Vec::with_capacity(workers * 3);
        for id in 0..workers {
            let paths = ChannelPaths::new(&dir, base_name, id);
            for p in paths.iter() {
                files.push(c_path(p)?);
            }
        }

        Ok(Self {
            dir,
            dir_c,
            files,
            done: AtomicBool::new(false),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn artifact_count(&self) -> usize {
        self.files.len()
    }

    pub fn is_cleaned(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Unlink every artifact and remove the directory. Idempotent.
    ///
    /// Only async-signal-safe calls are made here.
    pub fn cleanup(&self) {
        if self.done.swap(true, Ordering::AcqRel) {
            return;
        }
        unsafe {
            for file in &self.files {
                libc::unlink(file.as_ptr());
            }
            libc::rmdir(self.dir_c.as_ptr());
        }
    }

    /// Arm this registry for exit, SIGINT, SIGSEGV and panic.
    ///
    /// The process-wide handlers are installed on the first call only and
    /// chain to whatever was installed before them. Returns `false` when
    /// every slot is taken.
    pub fn install_process_hooks(self: &Arc<Self>) -> bool {
        lazy_static::initialize(&PROCESS_HOOKS);

        let raw = Arc::into_raw(Arc::clone(self)) as *mut CleanupRegistry;
        for slot in ARMED.iter() {
            if slot
                .compare_exchange(ptr::null_mut(), raw, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                debug!(dir = %self.dir.display(), "cleanup registry armed");
                return true;
            }
        }

        unsafe { drop(Arc::from_raw(raw)) };
        warn!(dir = %self.dir.display(), "no free cleanup slot; artifacts will not be removed on signal");
        false
    }

    /// Disarm this registry. Its artifacts are left alone.
    ///
    /// Waits for hooks that may still hold the old slot value before the
    /// slot's reference is released.
    pub fn uninstall_process_hooks(self: &Arc<Self>) {
        let me = Arc::as_ptr(self) as *mut CleanupRegistry;
        for slot in ARMED.iter() {
            if slot
                .compare_exchange(me, ptr::null_mut(), Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                while READERS.load(Ordering::SeqCst) != 0 {
                    std::hint::spin_loop();
                }
                unsafe { drop(Arc::from_raw(me)) };
                return;
            }
        }
    }
}

impl Drop for CleanupRegistry {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl std::fmt::Debug for CleanupRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        crate::Debug::StructDebug::debug_cleanup_registry(self, f)
    }
}

/// Log `err`, remove the session's artifacts and terminate with status 1.
pub fn fatal(err: &TransportError, registry: Option<&CleanupRegistry>) -> ! {
    error!(error = %err, "fatal transport error, terminating");
    if let Some(registry) = registry {
        registry.cleanup();
    }
    cleanup_armed();
    std::process::exit(1)
}

fn c_path(path: &Path) -> Result<CString> {
    CString::new(path.as_os_str().as_bytes()).map_err(|e| {
        TransportError::artifact(
            "path contains an interior nul byte",
            path,
            io::Error::new(io::ErrorKind::InvalidInput, e),
        )
    })
}

fn cleanup_armed() {
    READERS.fetch_add(1, Ordering::SeqCst);
    for slot in ARMED.iter() {
        let registry = slot.load(Ordering::SeqCst);
        if !registry.is_null() {
            unsafe { (*registry).cleanup() };
        }
    }
    READERS.fetch_sub(1, Ordering::SeqCst);
}

extern "C" fn on_exit() {
    cleanup_armed();
}

extern "C" fn on_signal(sig: libc::c_int, info: *mut libc::siginfo_t, ctx: *mut libc::c_void) {
    cleanup_armed();

    let prev = match sig {
        libc::SIGINT => PREV_SIGINT.load(Ordering::Acquire),
        libc::SIGSEGV => PREV_SIGSEGV.load(Ordering::Acquire),
        _ => ptr::null_mut(),
    };

    unsafe {
        if !prev.is_null() {
            let prev = &*prev;
            let handler = prev.sa_sigaction;
            if handler == libc::SIG_IGN {
                return;
            }
            if handler != libc::SIG_DFL {
                if prev.sa_flags & libc::SA_SIGINFO != 0 {
                    let f: extern "C" fn(libc::c_int, *mut libc::siginfo_t, *mut libc::c_void) =
                        std::mem::transmute(handler);
                    f(sig, info, ctx);
                } else {
                    let f: extern "C" fn(libc::c_int) = std::mem::transmute(handler);
                    f(sig);
                }
                return;
            }
        }

        libc::signal(sig, libc::SIG_DFL);
        libc::raise(sig);
    }
}

unsafe fn arm_process_hooks() {
    if libc::atexit(on_exit) != 0 {
        warn!("atexit registration failed");
    }

    for (sig, prev_slot) in [(libc::SIGINT, &PREV_SIGINT), (libc::SIGSEGV, &PREV_SIGSEGV)] {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = on_signal as usize;
        action.sa_flags = libc::SA_SIGINFO;
        libc::sigemptyset(&mut action.sa_mask);

        let mut previous: libc::sigaction = std::mem::zeroed();
        if libc::sigaction(sig, &action, &mut previous) != 0 {
            warn!(signal = sig, error = %io::Error::last_os_error(), "sigaction failed");
            continue;
        }
        prev_slot.store(Box::into_raw(Box::new(previous)), Ordering::Release);
    }

    let prev_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        cleanup_armed();
        prev_hook(info);
    }));
}
