//! C API for hosts calling registered functions
//!
//! Design: one request struct per call, filled in place:
//! - `callbridge_call` writes the result tuple into `outs` and returns
//!   null, or leaves `outs` as the zero tuple and returns an error string
//! - `callbridge_free` releases `outs`; it is a no-op on the zero tuple
//! - error strings are released with `callbridge_free_error`
//!
//! No panic unwinds into the host: callees run behind the fault barrier and
//! each entry point has its own outer barrier.

mod buffer;

pub use buffer::{BridgeRequest, BridgeTuple};

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::panic::{self, AssertUnwindSafe};
use std::process;
use std::ptr;
use std::sync::Once;

use tracing::{error, warn};

use crate::builtins;
use crate::config;
use crate::dispatch::{CallError, Dispatcher};
use crate::fault;
use crate::hook;
use crate::logging;
use crate::registry;
use crate::stats::{self, BridgeStats};

static BUILTINS: Once = Once::new();

/// Load configuration and start logging (safe to call repeatedly).
/// Returns 0 on success, -1 if the configuration is invalid.
#[no_mangle]
pub extern "C" fn callbridge_init() -> c_int {
    let outcome = panic::catch_unwind(|| {
        let config = config::get();
        match logging::init() {
            Ok(_) => {
                logging::log_bridge_init(registry::global().len());
                tracing::debug!(?config, "configuration loaded");
                0
            }
            Err(err) => {
                eprintln!("callbridge: {}", err);
                -1
            }
        }
    });
    outcome.unwrap_or(-1)
}

/// Flush buffered log output
#[no_mangle]
pub extern "C" fn callbridge_shutdown() {
    logging::shutdown();
}

/// Call a registered function.
///
/// `request` must point to a request whose `func_name` is a NUL-terminated
/// string and whose `ins` describe readable memory for the whole call.
/// Any previous `outs` must have been released; they are overwritten.
/// Returns null on success, otherwise an error string to be freed with
/// `callbridge_free_error`.
#[no_mangle]
pub extern "C" fn callbridge_call(request: *mut BridgeRequest) -> *mut c_char {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        if request.is_null() {
            return Err(CallError::InvalidRequest("null request".to_string()));
        }
        let request = unsafe { &mut *request };
        request.outs = BridgeTuple::empty();
        call_request(request)
    }));

    match outcome {
        Ok(Ok(())) => ptr::null_mut(),
        Ok(Err(err)) => {
            if matches!(err, CallError::InvalidRequest(_)) {
                logging::log_ffi_error(&err.to_string());
            }
            error_string(&err.to_string())
        }
        Err(payload) => {
            let message = fault::panic_message(payload.as_ref());
            error!(event = "ffi_panic", error = %message, "panic inside callbridge_call");
            error_string(&format!("callbridge: internal error: {}", message))
        }
    }
}

fn call_request(request: &mut BridgeRequest) -> Result<(), CallError> {
    if request.func_name.is_null() {
        return Err(CallError::InvalidRequest("null function name".to_string()));
    }
    let name = unsafe { CStr::from_ptr(request.func_name) }
        .to_str()
        .map_err(|_| CallError::InvalidRequest("function name is not valid UTF-8".to_string()))?;
    let count = request.ins.count()?;
    let payload = unsafe { request.ins.payload()? };
    logging::log_ffi_call(name, count, payload.len());

    let output = Dispatcher::new(registry::global()).dispatch_bytes(name, count, payload)?;
    request.outs = BridgeTuple::from_tuple(output)?;
    Ok(())
}

fn error_string(message: &str) -> *mut c_char {
    CString::new(message.replace('\0', "\\0"))
        .unwrap_or_default()
        .into_raw()
}

/// Release the result tuple of `request` and reset it to the zero tuple.
/// Null requests, zero tuples and repeated calls are no-ops.
#[no_mangle]
pub extern "C" fn callbridge_free(request: *mut BridgeRequest) {
    if request.is_null() {
        return;
    }
    unsafe {
        (*request).outs.release();
    }
}

/// Free an error string returned by `callbridge_call`
#[no_mangle]
pub extern "C" fn callbridge_free_error(err: *mut c_char) {
    if !err.is_null() {
        unsafe {
            drop(CString::from_raw(err));
        }
    }
}

/// Bootstrap: run the main hook once
#[no_mangle]
pub extern "C" fn callbridge_main() {
    match panic::catch_unwind(hook::run_main) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(error = %err, "callbridge_main called again"),
        Err(payload) => error!(
            event = "main_panic",
            error = %fault::panic_message(payload.as_ref()),
            "main hook panicked"
        ),
    }
}

/// Register the stock functions in the process-wide registry, once.
///
/// A name clash is a fatal wiring error: it is logged and the process
/// aborts, leaving no partially registered set behind.
#[no_mangle]
pub extern "C" fn callbridge_register_builtins() {
    BUILTINS.call_once(|| {
        let outcome =
            panic::catch_unwind(|| builtins::try_register_builtins(registry::global()));
        let message = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(err)) => err.to_string(),
            Err(payload) => fault::panic_message(payload.as_ref()),
        };
        error!(event = "builtins_failed", error = %message, "registering builtins failed");
        logging::shutdown();
        eprintln!("{}", message);
        process::abort();
    });
}

/// Snapshot of the call counters
#[no_mangle]
pub extern "C" fn callbridge_stats() -> BridgeStats {
    stats::stats()
}
