//! Link-time initializers feeding the process-wide registry and main hook

use std::ffi::CString;
use std::sync::atomic::{AtomicUsize, Ordering};

use callbridge::ffi::{callbridge_call, callbridge_free, callbridge_main};
use callbridge::linkme::distributed_slice;
use callbridge::worker::{install_worker_main, REMOTE_WORKER_ENV};
use callbridge::{
    BridgeRequest, BridgeTuple, HookError, Initializer, Registry, TypeDesc, Value, INITIALIZERS,
};

static SERVED: AtomicUsize = AtomicUsize::new(0);

#[distributed_slice(INITIALIZERS)]
#[linkme(crate = callbridge::linkme)]
static WORKER: Initializer = Initializer {
    name: "worker_bootstrap",
    init: init_worker,
};

fn init_worker(registry: &Registry) {
    registry.register("boot.double", |n: i64| n * 2);
    install_worker_main(|| {
        SERVED.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();
}

#[test]
fn initializers_run_before_main_and_calls() {
    std::env::set_var(REMOTE_WORKER_ENV, "true");
    assert_eq!(SERVED.load(Ordering::SeqCst), 0);

    // First touch of the registry happens here and installs the hook
    callbridge_main();
    assert_eq!(SERVED.load(Ordering::SeqCst), 1);
    callbridge_main();
    assert_eq!(SERVED.load(Ordering::SeqCst), 1);
    assert_eq!(callbridge::set_main(|| {}), Err(HookError::AlreadyStarted));

    let name = CString::new("boot.double").unwrap();
    let input = callbridge::encode(&[Value::Int(21)]).unwrap();
    let mut request = BridgeRequest {
        func_name: name.as_ptr(),
        ins: BridgeTuple::borrowing(1, &input),
        outs: BridgeTuple::empty(),
    };
    assert!(callbridge_call(&mut request).is_null());
    let output = unsafe { std::slice::from_raw_parts(request.outs.data, request.outs.data_size) };
    assert_eq!(
        callbridge::decode(output, &[TypeDesc::Int]).unwrap(),
        vec![Value::Int(42)]
    );
    callbridge_free(&mut request);
    assert!(request.outs.is_empty());
}
