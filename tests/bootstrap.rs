//! Process-wide main hook driven through the C ABI
//!
//! Kept to a single test: the hook is per process and runs once.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use callbridge::ffi::{callbridge_init, callbridge_main};
use callbridge::{run_main, set_main, HookError};

#[test]
fn main_hook_overridden_then_run_once() {
    assert_eq!(callbridge_init(), 0);

    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    set_main(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();
    assert_eq!(set_main(|| {}), Err(HookError::AlreadySet));
    assert_eq!(runs.load(Ordering::SeqCst), 0);

    callbridge_main();
    callbridge_main();
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    assert_eq!(set_main(|| {}), Err(HookError::AlreadyStarted));
    assert_eq!(run_main(), Err(HookError::AlreadyStarted));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}
