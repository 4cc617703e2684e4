//! Fault containment
//!
//! Every invocation of a registered function runs behind `contain`, which
//! turns a panic into a `Fault` value. A panic hook, installed once,
//! records where the panic happened and a backtrace, but only on threads
//! currently inside a barrier; any other panic is forwarded to the hook
//! that was installed before.
//!
//! Only unwinding panics can be contained, so the crate must not be built
//! with `panic = "abort"`.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

use crate::config;

thread_local! {
    static BARRIER: Cell<Barrier> = const { Cell::new(Barrier { depth: 0, backtrace: false }) };
    static CAPTURED: RefCell<Option<Capture>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

#[derive(Clone, Copy)]
struct Barrier {
    depth: usize,
    backtrace: bool,
}

struct Capture {
    location: Option<String>,
    backtrace: Option<String>,
}

/// A panic caught at the call boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub function: String,
    pub message: String,
    /// `file:line:column` of the panic
    pub location: Option<String>,
    pub backtrace: Option<String>,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "callbridge: panic during call to {:?}: {}",
            self.function, self.message
        )?;
        if let Some(location) = &self.location {
            write!(f, "\n  at {}", location)?;
        }
        if let Some(backtrace) = &self.backtrace {
            write!(f, "\n\nstack backtrace:\n{}", backtrace)?;
        }
        Ok(())
    }
}

impl std::error::Error for Fault {}

/// Run `f`, converting a panic into a `Fault` attributed to `function`.
///
/// Backtrace capture follows the `[faults]` configuration.
pub fn contain<T>(function: &str, f: impl FnOnce() -> T) -> Result<T, Fault> {
    contain_with(function, config::get().faults.capture_backtrace, f)
}

/// `contain` with an explicit backtrace setting
pub fn contain_with<T>(
    function: &str,
    capture_backtrace: bool,
    f: impl FnOnce() -> T,
) -> Result<T, Fault> {
    install_hook();

    let result = {
        let _guard = BarrierGuard::enter(capture_backtrace);
        panic::catch_unwind(AssertUnwindSafe(f))
    };
    let capture = CAPTURED.with(|captured| captured.borrow_mut().take());

    result.map_err(|payload| {
        let capture = capture.unwrap_or(Capture {
            location: None,
            backtrace: None,
        });
        Fault {
            function: function.to_string(),
            message: panic_message(payload.as_ref()),
            location: capture.location,
            backtrace: capture.backtrace,
        }
    })
}

/// Whether the current thread is inside a barrier
pub fn in_barrier() -> bool {
    BARRIER.with(|barrier| barrier.get().depth > 0)
}

/// Text of a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

struct BarrierGuard {
    previous: Barrier,
}

impl BarrierGuard {
    fn enter(backtrace: bool) -> Self {
        let previous = BARRIER.with(|barrier| {
            let previous = barrier.get();
            barrier.set(Barrier {
                depth: previous.depth + 1,
                backtrace,
            });
            previous
        });
        Self { previous }
    }
}

impl Drop for BarrierGuard {
    fn drop(&mut self) {
        BARRIER.with(|barrier| barrier.set(self.previous));
    }
}

fn install_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let barrier = BARRIER.with(Cell::get);
            if barrier.depth == 0 {
                previous(info);
                return;
            }
            let capture = Capture {
                location: info.location().map(|location| location.to_string()),
                backtrace: barrier
                    .backtrace
                    .then(|| Backtrace::force_capture().to_string()),
            };
            CAPTURED.with(|captured| *captured.borrow_mut() = Some(capture));
        }));
    });
}
