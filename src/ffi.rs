use std::ffi::{c_char, CStr};
use std::path::Path;
use std::ptr;

use tracing::error;

use crate::Codec::Events::{ComputeOp, ContextMark, MemAccess, SyncOp};
use crate::Codec::Primitive::{CompFormat, CxtType, MemType, OpType, SyncType, MAX_ARITY};
use crate::Core::error::TransportError;
use crate::Core::Config::TransportConfig;
use crate::Dispatch::EventWriter;

// Error codes
pub const EVPIPE_SUCCESS: i32 = 0;
pub const EVPIPE_ERROR_NULL_POINTER: i32 = -1;
pub const EVPIPE_ERROR_INVALID_ARG: i32 = -2;
pub const EVPIPE_ERROR_ENCODE: i32 = -3;
pub const EVPIPE_ERROR_DISCONNECTED: i32 = -4;
pub const EVPIPE_ERROR_TIMEOUT: i32 = -5;
pub const EVPIPE_ERROR_INTERNAL: i32 = -6;

/// Handle to an attached producer (opaque pointer)
pub struct ProducerHandle {
    inner: EventWriter,
}

fn status(result: crate::Core::error::Result<()>) -> i32 {
    match result {
        Ok(()) => EVPIPE_SUCCESS,
        Err(TransportError::Encode(_)) => EVPIPE_ERROR_ENCODE,
        Err(TransportError::PeerDisconnected) => EVPIPE_ERROR_DISCONNECTED,
        Err(TransportError::PeerTimeout { .. }) => EVPIPE_ERROR_TIMEOUT,
        Err(e) => {
            error!(error = %e, "FFI call failed");
            EVPIPE_ERROR_INTERNAL
        }
    }
}

/// Ignore SIGPIPE unless the host installed its own disposition, so a
/// departed consumer surfaces as `EVPIPE_ERROR_DISCONNECTED` instead of
/// killing the process.
fn ignore_default_sigpipe() {
    unsafe {
        let mut current: libc::sigaction = std::mem::zeroed();
        if libc::sigaction(libc::SIGPIPE, ptr::null(), &mut current) == 0
            && current.sa_sigaction == libc::SIG_DFL
        {
            libc::signal(libc::SIGPIPE, libc::SIG_IGN);
        }
    }
}

fn writer<'a>(handle: *mut ProducerHandle) -> Option<&'a mut EventWriter> {
    // SAFETY: non-null handles only come from evpipe_producer_attach
    unsafe { handle.as_mut().map(|h| &mut h.inner) }
}

// -----------------------------------------------------------------------------
// Producer API
// -----------------------------------------------------------------------------

/// Attach to channel `worker` of a consumer serving from `dir`.
///
/// Base name and liveness timeout come from the `EVPIPE_*` environment.
/// A default SIGPIPE disposition is switched to ignore on the first call.
///
/// # Returns
/// * Pointer to `ProducerHandle`, or NULL on failure.
#[no_mangle]
pub extern "C" fn evpipe_producer_attach(dir: *const c_char, worker: u32) -> *mut ProducerHandle {
    if dir.is_null() {
        return ptr::null_mut();
    }
    ignore_default_sigpipe();
    let dir = match unsafe { CStr::from_ptr(dir) }.to_str() {
        Ok(d) => Path::new(d),
        Err(_) => return ptr::null_mut(),
    };
    let config = match TransportConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "FFI Error: invalid environment");
            return ptr::null_mut();
        }
    };

    match EventWriter::attach(dir, config.base_name(), worker as usize, config.liveness_timeout()) {
        Ok(inner) => Box::into_raw(Box::new(ProducerHandle { inner })),
        Err(e) => {
            error!(error = %e, worker, "FFI Error: failed to attach producer");
            ptr::null_mut()
        }
    }
}

/// Set the timestamp recorded for the events that follow.
#[no_mangle]
pub extern "C" fn evpipe_timestamp(handle: *mut ProducerHandle, ts: u64) -> i32 {
    match writer(handle) {
        Some(w) => {
            w.timestamp(ts);
            EVPIPE_SUCCESS
        }
        None => EVPIPE_ERROR_NULL_POINTER,
    }
}

/// Emit a memory access. `is_store` selects the type; `size_class` is
/// log2 of the accessed bytes.
#[no_mangle]
pub extern "C" fn evpipe_emit_mem(
    handle: *mut ProducerHandle,
    is_store: bool,
    size_class: u8,
    address: u64,
    id: u8,
) -> i32 {
    let Some(w) = writer(handle) else {
        return EVPIPE_ERROR_NULL_POINTER;
    };
    let ev = MemAccess {
        mem_type: if is_store { MemType::Store } else { MemType::Load },
        size_class,
        address,
        id,
    };
    status(w.memory(&ev))
}

/// Emit a compute operation with `arity` operand ids read from `ids`.
#[no_mangle]
pub extern "C" fn evpipe_emit_comp(
    handle: *mut ProducerHandle,
    is_float: bool,
    width_class: u8,
    op: u8,
    ids: *const u8,
    arity: u8,
) -> i32 {
    let Some(w) = writer(handle) else {
        return EVPIPE_ERROR_NULL_POINTER;
    };
    let Some(op) = OpType::from_u8(op) else {
        return EVPIPE_ERROR_INVALID_ARG;
    };
    if arity == 0 || arity > MAX_ARITY {
        return EVPIPE_ERROR_INVALID_ARG;
    }
    if ids.is_null() {
        return EVPIPE_ERROR_NULL_POINTER;
    }
    let ids = unsafe { std::slice::from_raw_parts(ids, arity as usize) };
    let format = if is_float { CompFormat::Float } else { CompFormat::Integer };
    status(w.compute(&ComputeOp::new(format, width_class, op, ids)))
}

/// Emit a sync event. `data2` is only used for condition waits.
#[no_mangle]
pub extern "C" fn evpipe_emit_sync(handle: *mut ProducerHandle, sync_type: u8, data: u64, data2: u64) -> i32 {
    let Some(w) = writer(handle) else {
        return EVPIPE_ERROR_NULL_POINTER;
    };
    let ev = match SyncType::from_u8(sync_type) {
        Some(SyncType::CondWait) => SyncOp::cond_wait(data, data2),
        Some(t) => SyncOp::new(t, data),
        None => return EVPIPE_ERROR_INVALID_ARG,
    };
    status(w.sync(&ev))
}

/// Emit an id-carrying context event (instruction, basic block, thread).
#[no_mangle]
pub extern "C" fn evpipe_emit_cxt_id(handle: *mut ProducerHandle, cxt_type: u8, id: u64) -> i32 {
    let Some(w) = writer(handle) else {
        return EVPIPE_ERROR_NULL_POINTER;
    };
    match CxtType::from_u8(cxt_type).and_then(|t| ContextMark::from_id(t, id)) {
        Some(mark) => status(w.context(&mark)),
        None => EVPIPE_ERROR_INVALID_ARG,
    }
}

/// Emit a function enter/exit event with a `len`-byte name.
#[no_mangle]
pub extern "C" fn evpipe_emit_cxt_name(
    handle: *mut ProducerHandle,
    cxt_type: u8,
    name: *const u8,
    len: usize,
) -> i32 {
    let Some(w) = writer(handle) else {
        return EVPIPE_ERROR_NULL_POINTER;
    };
    if name.is_null() {
        return EVPIPE_ERROR_NULL_POINTER;
    }
    let name = unsafe { std::slice::from_raw_parts(name, len) };
    match CxtType::from_u8(cxt_type).and_then(|t| ContextMark::from_name(t, name)) {
        Some(mark) => status(w.context(&mark)),
        None => EVPIPE_ERROR_INVALID_ARG,
    }
}

/// Hand over the current buffer now.
#[no_mangle]
pub extern "C" fn evpipe_flush(handle: *mut ProducerHandle) -> i32 {
    match writer(handle) {
        Some(w) => status(w.flush()),
        None => EVPIPE_ERROR_NULL_POINTER,
    }
}

/// End the stream, wait for the consumer, and free the handle.
///
/// The handle is freed even when finishing fails.
#[no_mangle]
pub extern "C" fn evpipe_producer_finish(handle: *mut ProducerHandle) -> i32 {
    if handle.is_null() {
        return EVPIPE_ERROR_NULL_POINTER;
    }
    let mut handle = unsafe { Box::from_raw(handle) };
    status(handle.inner.finish())
}
