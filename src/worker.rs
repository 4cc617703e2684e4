//! Remote worker bootstrap
//!
//! The same library runs in two roles: loaded into a host process, where
//! bootstrap does nothing, or started as a remote worker of a distributed
//! execution system, where bootstrap hands the process to the worker
//! service. The role is taken from `CALLBRIDGE_REMOTE_WORKER`.

use tracing::info;

use crate::hook::{self, HookError, MainHook};

pub const REMOTE_WORKER_ENV: &str = "CALLBRIDGE_REMOTE_WORKER";

/// Whether this process was started as a remote worker ("true" only)
pub fn is_remote_worker() -> bool {
    std::env::var(REMOTE_WORKER_ENV).map_or(false, |value| value == "true")
}

/// Bootstrap body: run `serve` on remote workers, return otherwise.
///
/// Returns whether `serve` ran.
pub fn worker_main(remote: bool, serve: impl FnOnce()) -> bool {
    if !remote {
        return false;
    }
    info!(event = "worker_start", "starting remote worker service");
    serve();
    true
}

/// Install the worker bootstrap as the process-wide main hook
pub fn install_worker_main(serve: impl FnOnce() + Send + 'static) -> Result<(), HookError> {
    hook::set_main(move || {
        worker_main(is_remote_worker(), serve);
    })
}

/// Install the worker bootstrap on `hook` with an explicit role
pub fn install_worker_main_on(
    hook: &MainHook,
    remote: bool,
    serve: impl FnOnce() + Send + 'static,
) -> Result<(), HookError> {
    hook.set(move || {
        worker_main(remote, serve);
    })
}
