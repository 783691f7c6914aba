// Copyright (c) Microsoft Corporation.
// License: MIT OR Apache-2.0

use core::ffi::c_void;

use log::warn;

use crate::{engine::CopyEngine, probe::ProbeForRead, status::Status, BufferLength};

/// Pointer and length pulled out of a `METHOD_NEITHER` device control
/// request. Both are untrusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlRequest {
    /// `Type3InputBuffer`, an address in the caller's address space.
    pub source: *const c_void,
    /// `InputBufferLength`.
    pub length: BufferLength,
}

impl ControlRequest {
    #[must_use]
    pub const fn new(source: *const c_void, length: BufferLength) -> Self {
        Self { source, length }
    }
}

/// Integer overflow IOCTL handler.
///
/// Returns [`Status::Unsuccessful`] for a null source, otherwise whatever the
/// engine returns.
///
/// # Safety
///
/// See [`CopyEngine::trigger`].
pub unsafe fn dispatch<P: ProbeForRead>(
    engine: &CopyEngine<P>,
    request: &ControlRequest,
) -> Status {
    if request.source.is_null() {
        warn!("integer overflow request without an input buffer");
        return Status::Unsuccessful;
    }

    // SAFETY: forwarded from the caller.
    unsafe { engine.trigger(request.source, request.length) }
}
