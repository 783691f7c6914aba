// Copyright (c) Microsoft Corporation.
// License: MIT OR Apache-2.0

//! # Abstract
//!
//!    This crate holds the part of the integer overflow sample that does not
//!    depend on the kernel: the size check, the copy into a fixed stack
//!    buffer, and the dispatch entry that feeds them a caller supplied
//!    pointer and length.
//!
//!    The size check comes in two flavours. [`SizePolicy::Secure`] compares
//!    the caller's length against a constant and never does arithmetic on it.
//!    [`SizePolicy::Vulnerable`] adds the terminator size to the caller's
//!    length first, so a length near `u32::MAX` wraps to a tiny value, slips
//!    past the check, and the copy loop walks off the end of the buffer.
//!
//!    The driver in `kmdf/driver` hosts this crate and supplies the
//!    [`ProbeForRead`] capability; tests and the fuzz target supply their own.

#![no_std]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::cargo)]
#![deny(unsafe_op_in_unsafe_fn)]
#![allow(clippy::module_name_repetitions)]

#[cfg(test)]
extern crate std;

pub mod buffer;
pub mod dispatch;
pub mod engine;
pub mod ioctl;
pub mod policy;
pub mod probe;
pub mod status;

#[cfg(test)]
mod proptest_engine;

pub use buffer::{
    CheckedView,
    Element,
    ElementSink,
    FixedBuffer,
    RawView,
    BUFFER_SIZE,
    BUFFER_TERMINATOR,
    CAPACITY_BYTES,
    ELEMENT_SIZE,
    TERMINATOR_SIZE,
};
pub use dispatch::{dispatch, ControlRequest};
pub use engine::{CopyEngine, CopyError, CopyReport};
pub use policy::{SizePolicy, ValidationOutcome, MAX_ALLOWED_LENGTH};
pub use probe::{ProbeFault, ProbeForRead, Region, UserProbe};
pub use status::{NtStatus, Status};

/// Width of the caller supplied length.
///
/// `IO_STACK_LOCATION::Parameters.DeviceIoControl.InputBufferLength` is a
/// `ULONG`, so every size computation on the caller's value happens in 32
/// bits regardless of the pointer width of the machine.
pub type BufferLength = u32;
