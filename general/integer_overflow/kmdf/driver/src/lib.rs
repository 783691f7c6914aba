// Copyright (c) Microsoft Corporation.
// License: MIT OR Apache-2.0

//! # Abstract
//!
//!    This driver demonstrates an integer overflow in a buffer size check.
//!
//!    A single `METHOD_NEITHER` IOCTL hands the driver a user mode pointer and
//!    length. The driver probes the pointer, checks the length against a
//!    fixed stack buffer and copies the caller's data in until it hits a
//!    terminator or the declared length runs out.
//!
//!    Built without the `secure` feature, the size check adds the terminator
//!    size to the caller's length before comparing, so a length of
//!    0xFFFFFFFF wraps to 3 and passes. The copy that follows is bounded only
//!    by the caller's data and overwrites the stack beyond the buffer.
//!
//!    Because the user mode pointer is only meaningful in the sender's
//!    address space, the request is handled in `EvtIoInCallerContext` and
//!    never reaches the queue.

#![no_std]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::cargo)]
#![allow(clippy::missing_safety_doc)]

mod device;
mod driver;
mod logger;
mod queue;

#[cfg(not(test))]
extern crate wdk_panic;

use integer_overflow_core::{
    ioctl::GUID_DEVINTERFACE_INTEGER_OVERFLOW as INTERFACE_GUID,
    CopyEngine,
    SizePolicy,
    UserProbe,
};
#[cfg(not(test))]
use wdk_alloc::WdkAllocator;
use wdk_sys::{GUID, ULONG, USHORT, WDF_DRIVER_CONFIG, WDF_IO_QUEUE_CONFIG, WDF_REQUEST_PARAMETERS};

#[cfg(not(test))]
#[global_allocator]
static GLOBAL_ALLOCATOR: WdkAllocator = WdkAllocator;

// {6A1CE3F4-2B7D-4E89-9C05-7F3B1D2A8E61}
const GUID_DEVINTERFACE_INTEGER_OVERFLOW: GUID = GUID {
    Data1: INTERFACE_GUID.data1,
    Data2: INTERFACE_GUID.data2,
    Data3: INTERFACE_GUID.data3,
    Data4: INTERFACE_GUID.data4,
};

/// Engine shared by every request. It holds no per-request state.
static ENGINE: CopyEngine<UserProbe> = CopyEngine::new(SizePolicy::configured(), UserProbe::X64);

// None of the below SIZE constants should be needed after an equivalent `WDF_STRUCTURE_SIZE` macro is added to `wdk-sys`: https://github.com/microsoft/windows-drivers-rs/issues/242

#[allow(
    clippy::cast_possible_truncation,
    reason = "size_of::<WDF_DRIVER_CONFIG>() is known to fit in ULONG due to below const assert"
)]
const WDF_DRIVER_CONFIG_SIZE: ULONG = {
    const S: usize = core::mem::size_of::<WDF_DRIVER_CONFIG>();
    const {
        assert!(
            S <= ULONG::MAX as usize,
            "size_of::<WDF_DRIVER_CONFIG>() should fit in ULONG"
        );
    };
    S as ULONG
};

#[allow(
    clippy::cast_possible_truncation,
    reason = "size_of::<WDF_IO_QUEUE_CONFIG>() is known to fit in ULONG due to below const assert"
)]
const WDF_IO_QUEUE_CONFIG_SIZE: ULONG = {
    const S: usize = core::mem::size_of::<WDF_IO_QUEUE_CONFIG>();
    const {
        assert!(
            S <= ULONG::MAX as usize,
            "size_of::<WDF_IO_QUEUE_CONFIG>() should fit in ULONG"
        );
    };
    S as ULONG
};

#[allow(
    clippy::cast_possible_truncation,
    reason = "size_of::<WDF_REQUEST_PARAMETERS>() is known to fit in USHORT due to below const \
              assert"
)]
const WDF_REQUEST_PARAMETERS_SIZE: USHORT = {
    const S: usize = core::mem::size_of::<WDF_REQUEST_PARAMETERS>();
    const {
        assert!(
            S <= USHORT::MAX as usize,
            "size_of::<WDF_REQUEST_PARAMETERS>() should fit in USHORT"
        );
    };
    S as USHORT
};
