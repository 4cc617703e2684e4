//! Bootstrap ("main") hook
//!
//! One replaceable zero-argument entry point per process. It defaults to a
//! no-op, may be overridden once before bootstrap and runs at most once.

use parking_lot::Mutex;
use thiserror::Error;

use crate::logging;
use crate::registry;

type MainFn = Box<dyn FnOnce() + Send>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HookError {
    #[error("callbridge: main hook already overridden")]
    AlreadySet,

    #[error("callbridge: main hook already started")]
    AlreadyStarted,
}

enum State {
    Default,
    Overridden(MainFn),
    Started,
}

/// Holder for one bootstrap entry point
pub struct MainHook {
    state: Mutex<State>,
}

impl Default for MainHook {
    fn default() -> Self {
        Self::new()
    }
}

impl MainHook {
    pub const fn new() -> Self {
        Self {
            state: parking_lot::const_mutex(State::Default),
        }
    }

    /// Replace the no-op entry point; allowed once, before `run`
    pub fn set(&self, f: impl FnOnce() + Send + 'static) -> Result<(), HookError> {
        let mut state = self.state.lock();
        match *state {
            State::Default => {
                *state = State::Overridden(Box::new(f));
                Ok(())
            }
            State::Overridden(_) => Err(HookError::AlreadySet),
            State::Started => Err(HookError::AlreadyStarted),
        }
    }

    /// Run the entry point. Later calls return `AlreadyStarted`.
    pub fn run(&self) -> Result<(), HookError> {
        let previous = std::mem::replace(&mut *self.state.lock(), State::Started);
        match previous {
            State::Default => {
                logging::log_main(false);
                Ok(())
            }
            // Lock released above; the hook may block for the process lifetime
            State::Overridden(f) => {
                logging::log_main(true);
                f();
                Ok(())
            }
            State::Started => Err(HookError::AlreadyStarted),
        }
    }

    pub fn is_started(&self) -> bool {
        matches!(*self.state.lock(), State::Started)
    }
}

static MAIN: MainHook = MainHook::new();

/// Override the process-wide entry point
pub fn set_main(f: impl FnOnce() + Send + 'static) -> Result<(), HookError> {
    MAIN.set(f)
}

/// Run the process-wide entry point, after the link-time initializers
pub fn run_main() -> Result<(), HookError> {
    registry::global();
    MAIN.run()
}
