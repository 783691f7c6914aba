// Copyright (c) Microsoft Corporation.
// License: MIT OR Apache-2.0

//! Validation of a caller supplied address range before the engine reads it.
//!
//! In the kernel this is `ProbeForRead`, which raises an exception the
//! driver catches with SEH. Here the check is a capability handed to the
//! engine and its failure is an ordinary `Err`.

use thiserror::Error;

use crate::status::{
    NtStatus,
    STATUS_ACCESS_VIOLATION,
    STATUS_DATATYPE_MISALIGNMENT,
};

/// Fault raised by a failed probe.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ProbeFault {
    /// The range is not inside memory the caller owns.
    #[error("access violation")]
    AccessViolation,
    /// The start address does not meet the required alignment.
    #[error("datatype misalignment")]
    DatatypeMisalignment,
}

impl ProbeFault {
    /// Exception code the kernel would have raised for this fault.
    #[must_use]
    pub const fn exception_code(self) -> NtStatus {
        match self {
            Self::AccessViolation => STATUS_ACCESS_VIOLATION,
            Self::DatatypeMisalignment => STATUS_DATATYPE_MISALIGNMENT,
        }
    }
}

/// Checks that `length` bytes at `address` belong to the caller and are
/// aligned to `alignment`.
pub trait ProbeForRead {
    /// # Errors
    ///
    /// Returns the [`ProbeFault`] the range violates.
    fn probe_for_read(&self, address: usize, length: usize, alignment: usize)
        -> Result<(), ProbeFault>;
}

impl<P: ProbeForRead + ?Sized> ProbeForRead for &P {
    fn probe_for_read(
        &self,
        address: usize,
        length: usize,
        alignment: usize,
    ) -> Result<(), ProbeFault> {
        (**self).probe_for_read(address, length, alignment)
    }
}

const fn is_misaligned(address: usize, alignment: usize) -> bool {
    debug_assert!(alignment.is_power_of_two());
    address & (alignment - 1) != 0
}

/// The `ProbeForRead` rules against a fixed user/kernel split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserProbe {
    highest_user_address: usize,
}

impl UserProbe {
    /// `MM_USER_PROBE_ADDRESS` on x64.
    pub const X64: Self = Self::new(0x7FFF_FFFF_0000);

    #[must_use]
    pub const fn new(highest_user_address: usize) -> Self {
        Self {
            highest_user_address,
        }
    }
}

impl ProbeForRead for UserProbe {
    fn probe_for_read(
        &self,
        address: usize,
        length: usize,
        alignment: usize,
    ) -> Result<(), ProbeFault> {
        if length == 0 {
            return Ok(());
        }

        if is_misaligned(address, alignment) {
            return Err(ProbeFault::DatatypeMisalignment);
        }

        let end = address
            .checked_add(length)
            .ok_or(ProbeFault::AccessViolation)?;
        if end > self.highest_user_address {
            return Err(ProbeFault::AccessViolation);
        }

        Ok(())
    }
}

/// Accepts only ranges that lie entirely within one known region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    base: usize,
    len: usize,
}

impl Region {
    #[must_use]
    pub const fn new(base: usize, len: usize) -> Self {
        Self { base, len }
    }

    /// Region covering the memory of `slice`.
    #[must_use]
    pub fn of<T>(slice: &[T]) -> Self {
        Self::new(slice.as_ptr() as usize, core::mem::size_of_val(slice))
    }
}

impl ProbeForRead for Region {
    fn probe_for_read(
        &self,
        address: usize,
        length: usize,
        alignment: usize,
    ) -> Result<(), ProbeFault> {
        if length == 0 {
            return Ok(());
        }

        if is_misaligned(address, alignment) {
            return Err(ProbeFault::DatatypeMisalignment);
        }

        let end = address
            .checked_add(length)
            .ok_or(ProbeFault::AccessViolation)?;
        if address < self.base || end > self.base.saturating_add(self.len) {
            return Err(ProbeFault::AccessViolation);
        }

        Ok(())
    }
}
