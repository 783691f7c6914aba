// Copyright (c) Microsoft Corporation.
// License: MIT OR Apache-2.0

use core::{
    ffi::c_void,
    mem::{align_of, size_of},
};

use log::{debug, error, info};
use thiserror::Error;

use crate::{
    buffer::{Element, ElementSink, FixedBuffer, BUFFER_TERMINATOR, CAPACITY_BYTES, ELEMENT_SIZE},
    policy::{SizePolicy, ValidationOutcome},
    probe::{ProbeFault, ProbeForRead},
    status::Status,
    BufferLength,
};

/// Reasons the engine refuses a request.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CopyError {
    #[error("invalid source address: {0}")]
    InvalidSourceAddress(#[from] ProbeFault),
    #[error("invalid buffer size: {requested:#X}")]
    InvalidRequestedSize { requested: BufferLength },
}

/// What an accepted copy did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyReport {
    /// Elements written to the destination.
    pub elements_copied: usize,
    /// Whether the copy stopped on [`BUFFER_TERMINATOR`].
    pub terminated: bool,
}

/// Validates a caller supplied length and copies the caller's elements into a
/// [`FixedBuffer`].
#[derive(Debug, Clone, Copy)]
pub struct CopyEngine<P> {
    policy: SizePolicy,
    probe: P,
}

impl<P: ProbeForRead> CopyEngine<P> {
    pub const fn new(policy: SizePolicy, probe: P) -> Self {
        Self { policy, probe }
    }

    pub const fn policy(&self) -> SizePolicy {
        self.policy
    }

    /// Runs one request against a fresh stack buffer and reports the outcome
    /// as a [`Status`].
    ///
    /// Under [`SizePolicy::Secure`] the buffer is written through its checked
    /// view. Under [`SizePolicy::Vulnerable`] it is written through its raw
    /// view, so an accepted oversized length writes past the end of the
    /// buffer into the caller's stack frame.
    ///
    /// # Safety
    ///
    /// If the probe accepts `source`, every element the copy loop visits must
    /// be readable. Under [`SizePolicy::Vulnerable`] the caller additionally
    /// accepts that a wrapped length corrupts memory adjacent to the buffer;
    /// this is undefined behaviour and the point of the sample.
    pub unsafe fn trigger(&self, source: *const c_void, length: BufferLength) -> Status {
        let mut buffer = FixedBuffer::new();

        debug!("fixed buffer: {:p}", buffer.as_slice().as_ptr());
        debug!("fixed buffer size: {CAPACITY_BYTES:#X}");

        // SAFETY: forwarded from the caller.
        let result = unsafe { self.copy(source, length, &mut buffer) };

        match &result {
            Ok(report) => debug!(
                "copied {} elements, terminated: {}",
                report.elements_copied, report.terminated
            ),
            Err(e) => error!("{e}"),
        }

        Status::from(result)
    }

    /// Like [`Self::trigger`], but into a caller owned buffer and with the
    /// [`CopyReport`] returned.
    ///
    /// # Errors
    ///
    /// [`CopyError::InvalidSourceAddress`] when the probe fails,
    /// [`CopyError::InvalidRequestedSize`] when the size check rejects
    /// `length`.
    ///
    /// # Safety
    ///
    /// Same contract as [`Self::trigger`]. Under [`SizePolicy::Vulnerable`]
    /// the writes past the end of `buffer` land in whatever follows it.
    pub unsafe fn copy(
        &self,
        source: *const c_void,
        length: BufferLength,
        buffer: &mut FixedBuffer,
    ) -> Result<CopyReport, CopyError> {
        match self.policy {
            // SAFETY: forwarded from the caller.
            SizePolicy::Secure => unsafe { self.copy_into(source, length, &mut buffer.checked()) },
            SizePolicy::Vulnerable => {
                // SAFETY: the raw view's index contract is the caller's
                // acceptance of out of bounds writes under this policy.
                let mut raw = unsafe { buffer.raw() };
                // SAFETY: forwarded from the caller.
                unsafe { self.copy_into(source, length, &mut raw) }
            }
        }
    }

    /// Probe, size check and copy loop over an arbitrary [`ElementSink`].
    ///
    /// The probe covers `size_of::<FixedBuffer>()` bytes at the buffer's
    /// alignment, not `length`.
    ///
    /// # Errors
    ///
    /// See [`Self::copy`].
    ///
    /// # Safety
    ///
    /// If the probe accepts `source`, the first `length / ELEMENT_SIZE`
    /// elements at `source`, or all of them up to the first terminator, must
    /// be readable.
    pub unsafe fn copy_into<S: ElementSink>(
        &self,
        source: *const c_void,
        length: BufferLength,
        sink: &mut S,
    ) -> Result<CopyReport, CopyError> {
        debug!("source buffer: {source:p}");
        debug!("source buffer size: {length:#X}");

        self.probe.probe_for_read(
            source as usize,
            size_of::<FixedBuffer>(),
            align_of::<FixedBuffer>(),
        )?;

        if self.policy == SizePolicy::Vulnerable {
            info!("triggering integer overflow");
        }

        if self.policy.validate(length) == ValidationOutcome::RejectedSize {
            return Err(CopyError::InvalidRequestedSize { requested: length });
        }

        // Truncating division: a trailing partial element is never read.
        let limit = length as usize / ELEMENT_SIZE;
        let mut cursor = source.cast::<Element>();
        let mut count = 0;
        let mut terminated = false;

        while count < limit {
            // SAFETY: readability of the visited elements is the caller's
            // contract; alignment was probed.
            let value = unsafe { cursor.read_volatile() };
            if value == BUFFER_TERMINATOR {
                terminated = true;
                break;
            }

            if !sink.store(count, value) {
                break;
            }

            cursor = cursor.wrapping_add(1);
            count += 1;
        }

        Ok(CopyReport {
            elements_copied: count,
            terminated,
        })
    }
}

#[cfg(test)]
mod tests {
    use core::ptr;

    use super::*;
    use crate::{
        buffer::{RawView, BUFFER_SIZE},
        probe::{Region, UserProbe},
    };

    /// Source stream of `len` words counting up from 1, terminator at
    /// `terminator_at` if given.
    fn source(len: usize, terminator_at: Option<usize>) -> std::vec::Vec<Element> {
        let mut words: std::vec::Vec<Element> = (1..=len as Element).collect();
        if let Some(at) = terminator_at {
            words[at] = BUFFER_TERMINATOR;
        }
        words
    }

    fn engine_for(policy: SizePolicy, words: &[Element]) -> CopyEngine<Region> {
        CopyEngine::new(policy, Region::of(words))
    }

    #[test]
    fn largest_allowed_length_copies_31_elements_under_both_policies() {
        let words = source(40, None);
        for policy in [SizePolicy::Secure, SizePolicy::Vulnerable] {
            let engine = engine_for(policy, &words);
            let mut buffer = FixedBuffer::new();

            let report = unsafe { engine.copy(words.as_ptr().cast(), 124, &mut buffer) }.unwrap();

            assert_eq!(
                report,
                CopyReport {
                    elements_copied: 31,
                    terminated: false,
                }
            );
            assert_eq!(&buffer.as_slice()[..31], &words[..31]);
            assert_eq!(buffer.as_slice()[31], 0);
        }
    }

    #[test]
    fn secure_rejects_maximum_length_without_copying() {
        let words = source(40, None);
        let engine = engine_for(SizePolicy::Secure, &words);
        let mut buffer = FixedBuffer::new();

        let result = unsafe { engine.copy(words.as_ptr().cast(), u32::MAX, &mut buffer) };

        assert_eq!(
            result,
            Err(CopyError::InvalidRequestedSize {
                requested: u32::MAX
            })
        );
        assert_eq!(buffer, FixedBuffer::new());
    }

    #[test]
    fn vulnerable_accepts_maximum_length_and_stops_on_terminator() {
        let words = source(40, Some(10));
        let engine = engine_for(SizePolicy::Vulnerable, &words);
        let mut buffer = FixedBuffer::new();

        let report =
            unsafe { engine.copy(words.as_ptr().cast(), 0xFFFF_FFFF, &mut buffer) }.unwrap();

        assert_eq!(
            report,
            CopyReport {
                elements_copied: 10,
                terminated: true,
            }
        );
        assert_eq!(&buffer.as_slice()[..10], &words[..10]);
        assert!(buffer.as_slice()[10..].iter().all(|&e| e == 0));
    }

    #[test]
    fn terminator_short_circuits_under_both_policies() {
        for k in [0, 1, 15, BUFFER_SIZE - 2] {
            let words = source(40, Some(k));
            for policy in [SizePolicy::Secure, SizePolicy::Vulnerable] {
                let engine = engine_for(policy, &words);
                let mut buffer = FixedBuffer::new();

                let report =
                    unsafe { engine.copy(words.as_ptr().cast(), 124, &mut buffer) }.unwrap();

                assert_eq!(report.elements_copied, k, "{policy} with terminator at {k}");
                assert!(report.terminated);
            }
        }
    }

    #[test]
    fn iteration_count_truncates_partial_elements() {
        let words = source(40, None);
        let engine = engine_for(SizePolicy::Secure, &words);

        for (length, expected) in [(0, 0), (3, 0), (4, 1), (7, 1), (123, 30)] {
            let mut buffer = FixedBuffer::new();
            let report =
                unsafe { engine.copy(words.as_ptr().cast(), length, &mut buffer) }.unwrap();
            assert_eq!(report.elements_copied, expected, "length {length}");
        }
    }

    #[test]
    fn probe_failure_never_reaches_the_copy_loop() {
        let words = source(40, None);
        // Region too small for a whole FixedBuffer.
        let engine = CopyEngine::new(SizePolicy::Vulnerable, Region::of(&words[..8]));
        let mut buffer = FixedBuffer::new();

        let result = unsafe { engine.copy(words.as_ptr().cast(), 16, &mut buffer) };

        assert_eq!(
            result,
            Err(CopyError::InvalidSourceAddress(ProbeFault::AccessViolation))
        );
        assert_eq!(buffer, FixedBuffer::new());
    }

    #[test]
    fn kernel_address_is_converted_to_fault_status() {
        let engine = CopyEngine::new(SizePolicy::Secure, UserProbe::X64);

        // The probe rejects the address, so it is never dereferenced.
        let status = unsafe { engine.trigger(0xFFFF_F800_0000_1000_usize as *const c_void, 16) };

        assert_eq!(status, Status::Fault(ProbeFault::AccessViolation));
    }

    #[test]
    fn misaligned_source_is_converted_to_fault_status() {
        let words = source(40, None);
        let engine = engine_for(SizePolicy::Secure, &words);
        let misaligned = words.as_ptr().cast::<u8>().wrapping_add(1);

        let status = unsafe { engine.trigger(misaligned.cast(), 16) };

        assert_eq!(status, Status::Fault(ProbeFault::DatatypeMisalignment));
    }

    #[test]
    fn trigger_reports_status_for_concrete_scenario() {
        let words = source(40, Some(20));

        let secure = engine_for(SizePolicy::Secure, &words);
        let vulnerable = engine_for(SizePolicy::Vulnerable, &words);

        unsafe {
            assert_eq!(secure.trigger(words.as_ptr().cast(), 124), Status::Success);
            assert_eq!(vulnerable.trigger(words.as_ptr().cast(), 124), Status::Success);
            assert_eq!(
                secure.trigger(words.as_ptr().cast(), 0xFFFF_FFFF),
                Status::InvalidBufferSize
            );
            assert_eq!(
                vulnerable.trigger(words.as_ptr().cast(), 0xFFFF_FFFF),
                Status::Success
            );
        }
    }

    #[repr(C)]
    struct GuardedFrame {
        buffer: FixedBuffer,
        guard: [Element; 8],
    }

    #[test]
    fn wrapped_length_overflows_into_adjacent_memory() {
        let mut words = std::vec![0x4141_4141; BUFFER_SIZE + 4];
        words.push(BUFFER_TERMINATOR);
        let engine = engine_for(SizePolicy::Vulnerable, &words);
        let mut frame = GuardedFrame {
            buffer: FixedBuffer::new(),
            guard: [0; 8],
        };

        // SAFETY: the copy stops at the terminator after BUFFER_SIZE + 4
        // elements, which still lie inside `frame`.
        let report = unsafe {
            let mut raw = RawView::from_raw(ptr::addr_of_mut!(frame).cast::<Element>());
            engine.copy_into(words.as_ptr().cast(), u32::MAX, &mut raw)
        }
        .unwrap();

        assert_eq!(report.elements_copied, BUFFER_SIZE + 4);
        assert!(report.terminated);
        assert_eq!(frame.guard[..4], [0x4141_4141; 4]);
        assert_eq!(frame.guard[4..], [0; 4]);
    }

    #[test]
    fn checked_view_stops_at_the_end_of_the_buffer() {
        let mut words = std::vec![0x4141_4141; BUFFER_SIZE + 4];
        words.push(BUFFER_TERMINATOR);
        let engine = engine_for(SizePolicy::Vulnerable, &words);
        let mut buffer = FixedBuffer::new();

        let report =
            unsafe { engine.copy_into(words.as_ptr().cast(), u32::MAX, &mut buffer.checked()) }
                .unwrap();

        assert_eq!(report.elements_copied, BUFFER_SIZE);
        assert!(!report.terminated);
        assert!(buffer.as_slice().iter().all(|&e| e == 0x4141_4141));
    }
}
