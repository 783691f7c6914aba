// Copyright (c) Microsoft Corporation.
// License: MIT OR Apache-2.0

use core::fmt;

use crate::{
    engine::{CopyError, CopyReport},
    probe::ProbeFault,
};

/// Same representation as `wdk_sys::NTSTATUS`.
pub type NtStatus = i32;

#[allow(
    clippy::cast_possible_wrap,
    reason = "NTSTATUS values are defined as 32-bit patterns; the severity bits land in the sign bit"
)]
const fn ntstatus(code: u32) -> NtStatus {
    code as NtStatus
}

pub const STATUS_SUCCESS: NtStatus = 0;
pub const STATUS_UNSUCCESSFUL: NtStatus = ntstatus(0xC000_0001);
pub const STATUS_ACCESS_VIOLATION: NtStatus = ntstatus(0xC000_0005);
pub const STATUS_INVALID_BUFFER_SIZE: NtStatus = ntstatus(0xC000_0206);
pub const STATUS_DATATYPE_MISALIGNMENT: NtStatus = ntstatus(0x8000_0002);

/// What a caller of the dispatch entry gets back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    /// No source buffer was supplied.
    Unsuccessful,
    /// The size check rejected the caller's length.
    InvalidBufferSize,
    /// The source range failed the probe.
    Fault(ProbeFault),
}

impl Status {
    #[must_use]
    pub const fn as_ntstatus(self) -> NtStatus {
        match self {
            Self::Success => STATUS_SUCCESS,
            Self::Unsuccessful => STATUS_UNSUCCESSFUL,
            Self::InvalidBufferSize => STATUS_INVALID_BUFFER_SIZE,
            Self::Fault(fault) => fault.exception_code(),
        }
    }

    /// Mirrors `NT_SUCCESS`.
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.as_ntstatus() >= 0
    }
}

impl From<CopyError> for Status {
    fn from(error: CopyError) -> Self {
        match error {
            CopyError::InvalidSourceAddress(fault) => Self::Fault(fault),
            CopyError::InvalidRequestedSize { .. } => Self::InvalidBufferSize,
        }
    }
}

impl From<Result<CopyReport, CopyError>> for Status {
    fn from(result: Result<CopyReport, CopyError>) -> Self {
        result.map_or_else(Self::from, |_| Self::Success)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Success => "STATUS_SUCCESS",
            Self::Unsuccessful => "STATUS_UNSUCCESSFUL",
            Self::InvalidBufferSize => "STATUS_INVALID_BUFFER_SIZE",
            Self::Fault(ProbeFault::AccessViolation) => "STATUS_ACCESS_VIOLATION",
            Self::Fault(ProbeFault::DatatypeMisalignment) => "STATUS_DATATYPE_MISALIGNMENT",
        };
        write!(f, "{name} ({:#010X})", self.as_ntstatus())
    }
}
