//! Foreign tuple buffers and their ownership rules
//!
//! Input tuples are borrowed from the host for the duration of a call.
//! Output tuples are allocated here and owned by the host until
//! `callbridge_free` hands them back; the zero tuple owns nothing.

use std::os::raw::{c_char, c_int};
use std::ptr;
use std::slice;

use crate::dispatch::{CallError, Tuple};

/// `{count, byte length, data}` as laid out for the host
#[repr(C)]
#[derive(Debug)]
pub struct BridgeTuple {
    pub num: c_int,
    pub data_size: usize,
    pub data: *mut u8,
}

/// One call: function name, arguments, and the results written back
#[repr(C)]
#[derive(Debug)]
pub struct BridgeRequest {
    pub func_name: *const c_char,
    pub ins: BridgeTuple,
    pub outs: BridgeTuple,
}

impl Default for BridgeTuple {
    fn default() -> Self {
        Self::empty()
    }
}

impl BridgeTuple {
    /// The zero tuple
    pub const fn empty() -> Self {
        Self {
            num: 0,
            data_size: 0,
            data: ptr::null_mut(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.num == 0 && self.data_size == 0 && self.data.is_null()
    }

    /// Non-owning view of `bytes`, for input tuples
    pub fn borrowing(num: c_int, bytes: &[u8]) -> Self {
        Self {
            num,
            data_size: bytes.len(),
            data: bytes.as_ptr() as *mut u8,
        }
    }

    /// Transfer an encoded tuple to the host
    pub(crate) fn from_tuple(tuple: Tuple) -> Result<Self, CallError> {
        let num = c_int::try_from(tuple.count()).map_err(|_| {
            CallError::InvalidRequest(format!("{} results exceed the tuple count range", tuple.count()))
        })?;
        let payload = tuple.into_payload();
        if payload.is_empty() {
            return Ok(Self { num, ..Self::empty() });
        }
        let data_size = payload.len();
        let data = Box::into_raw(payload.into_boxed_slice()) as *mut u8;
        Ok(Self {
            num,
            data_size,
            data,
        })
    }

    /// Declared count, rejecting negative values
    pub(crate) fn count(&self) -> Result<usize, CallError> {
        usize::try_from(self.num)
            .map_err(|_| CallError::InvalidRequest(format!("negative tuple count {}", self.num)))
    }

    /// Borrow the payload.
    ///
    /// # Safety
    /// `data` must be null with `data_size == 0`, or point to `data_size`
    /// readable bytes that stay valid and unmodified for `'a`.
    pub(crate) unsafe fn payload<'a>(&self) -> Result<&'a [u8], CallError> {
        match (self.data.is_null(), self.data_size) {
            (_, 0) => Ok(&[]),
            (true, size) => Err(CallError::InvalidRequest(format!(
                "null data with {} byte length",
                size
            ))),
            (false, size) => Ok(slice::from_raw_parts(self.data, size)),
        }
    }

    /// Free a buffer produced by `from_tuple` and reset to the zero tuple.
    ///
    /// # Safety
    /// The tuple must be the zero tuple or exactly as filled in by a call.
    pub(crate) unsafe fn release(&mut self) {
        if !self.data.is_null() {
            let buffer = ptr::slice_from_raw_parts_mut(self.data, self.data_size);
            drop(Box::from_raw(buffer));
        }
        *self = Self::empty();
    }
}

impl Default for BridgeRequest {
    fn default() -> Self {
        Self {
            func_name: ptr::null(),
            ins: BridgeTuple::empty(),
            outs: BridgeTuple::empty(),
        }
    }
}
