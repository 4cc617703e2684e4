//! Call statistics for monitoring

use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of the process-wide call counters
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    /// Calls received, including failed ones
    pub calls: u64,
    /// Calls that produced an error string
    pub failures: u64,
    /// Failures caused by a panic in the callee
    pub faults: u64,
    /// Argument payload bytes received
    pub bytes_in: u64,
    /// Result payload bytes handed out
    pub bytes_out: u64,
}

/// Atomic call counters
#[derive(Debug, Default)]
pub struct Counters {
    calls: AtomicU64,
    failures: AtomicU64,
    faults: AtomicU64,
    bytes_in: AtomicU64,
    bytes_out: AtomicU64,
}

impl Counters {
    pub const fn new() -> Self {
        Self {
            calls: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            faults: AtomicU64::new(0),
            bytes_in: AtomicU64::new(0),
            bytes_out: AtomicU64::new(0),
        }
    }

    pub fn record_call(&self, bytes_in: usize) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.bytes_in.fetch_add(bytes_in as u64, Ordering::Relaxed);
    }

    pub fn record_success(&self, bytes_out: usize) {
        self.bytes_out.fetch_add(bytes_out as u64, Ordering::Relaxed);
    }

    pub fn record_failure(&self, faulted: bool) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        if faulted {
            self.faults.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> BridgeStats {
        BridgeStats {
            calls: self.calls.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            faults: self.faults.load(Ordering::Relaxed),
            bytes_in: self.bytes_in.load(Ordering::Relaxed),
            bytes_out: self.bytes_out.load(Ordering::Relaxed),
        }
    }
}

static COUNTERS: Counters = Counters::new();

/// Counters updated by every dispatcher
pub fn counters() -> &'static Counters {
    &COUNTERS
}

/// Current process-wide statistics
pub fn stats() -> BridgeStats {
    COUNTERS.snapshot()
}
