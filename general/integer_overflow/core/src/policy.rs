// Copyright (c) Microsoft Corporation.
// License: MIT OR Apache-2.0

use core::fmt;

use crate::{
    buffer::{CAPACITY_BYTES, TERMINATOR_SIZE},
    BufferLength,
};

#[allow(
    clippy::cast_possible_truncation,
    reason = "CAPACITY_BYTES is known to fit in BufferLength due to below const assert"
)]
const CAPACITY_LENGTH: BufferLength = {
    const S: usize = CAPACITY_BYTES;
    const {
        assert!(
            S <= BufferLength::MAX as usize,
            "CAPACITY_BYTES should fit in BufferLength"
        );
    };
    S as BufferLength
};

#[allow(
    clippy::cast_possible_truncation,
    reason = "TERMINATOR_SIZE is known to fit in BufferLength due to below const assert"
)]
const TERMINATOR_LENGTH: BufferLength = {
    const S: usize = TERMINATOR_SIZE;
    const {
        assert!(
            S <= BufferLength::MAX as usize,
            "TERMINATOR_SIZE should fit in BufferLength"
        );
    };
    S as BufferLength
};

/// Largest caller length the secure check lets through. Computed from
/// constants only.
pub const MAX_ALLOWED_LENGTH: BufferLength = CAPACITY_LENGTH - TERMINATOR_LENGTH;

/// Result of running a [`SizePolicy`] over a caller supplied length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationOutcome {
    Accepted,
    RejectedSize,
}

/// How the copy engine decides whether the caller's length fits the fixed
/// buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizePolicy {
    /// Compare the caller's length against [`MAX_ALLOWED_LENGTH`].
    Secure,
    /// Add the terminator size to the caller's length, then compare against
    /// the capacity. The addition wraps.
    Vulnerable,
}

impl SizePolicy {
    /// Policy selected by the `secure` cargo feature. Without the feature the
    /// vulnerable check is built, as in the original sample.
    #[must_use]
    pub const fn configured() -> Self {
        if cfg!(feature = "secure") {
            Self::Secure
        } else {
            Self::Vulnerable
        }
    }

    #[must_use]
    pub const fn validate(self, length: BufferLength) -> ValidationOutcome {
        let rejected = match self {
            Self::Secure => length > MAX_ALLOWED_LENGTH,
            // Vulnerability: with `length` at 0xFFFF_FFFF the sum wraps to 3,
            // which is never larger than the capacity.
            Self::Vulnerable => length.wrapping_add(TERMINATOR_LENGTH) > CAPACITY_LENGTH,
        };

        if rejected {
            ValidationOutcome::RejectedSize
        } else {
            ValidationOutcome::Accepted
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Secure => "secure",
            Self::Vulnerable => "vulnerable",
        }
    }
}

impl fmt::Display for SizePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_allowed_length_leaves_room_for_terminator() {
        assert_eq!(MAX_ALLOWED_LENGTH, 124);
    }

    #[test]
    fn both_policies_accept_lengths_that_fit() {
        for length in [0, 1, 4, 123, 124] {
            assert_eq!(
                SizePolicy::Secure.validate(length),
                ValidationOutcome::Accepted
            );
            assert_eq!(
                SizePolicy::Vulnerable.validate(length),
                ValidationOutcome::Accepted
            );
        }
    }

    #[test]
    fn both_policies_reject_moderately_oversized_lengths() {
        for length in [125, 128, 129, 0x1000, 0x7FFF_FFFF] {
            assert_eq!(
                SizePolicy::Secure.validate(length),
                ValidationOutcome::RejectedSize
            );
            assert_eq!(
                SizePolicy::Vulnerable.validate(length),
                ValidationOutcome::RejectedSize
            );
        }
    }

    #[test]
    fn secure_rejects_the_maximum_length() {
        assert_eq!(
            SizePolicy::Secure.validate(u32::MAX),
            ValidationOutcome::RejectedSize
        );
    }

    #[test]
    fn vulnerable_accepts_lengths_that_wrap() {
        // 0xFFFF_FFFC + 4 wraps to 0, 0xFFFF_FFFF + 4 wraps to 3.
        for length in (u32::MAX - 3)..=u32::MAX {
            assert_eq!(
                SizePolicy::Vulnerable.validate(length),
                ValidationOutcome::Accepted,
                "length {length:#X}"
            );
        }
        assert_eq!(u32::MAX.wrapping_add(4), 3);
    }

    #[test]
    fn vulnerable_rejects_just_below_the_wrap() {
        assert_eq!(
            SizePolicy::Vulnerable.validate(u32::MAX - 4),
            ValidationOutcome::RejectedSize
        );
    }

    #[test]
    fn configured_policy_follows_secure_feature() {
        let expected = if cfg!(feature = "secure") {
            SizePolicy::Secure
        } else {
            SizePolicy::Vulnerable
        };
        assert_eq!(SizePolicy::configured(), expected);
    }

    #[test]
    fn display_uses_policy_name() {
        assert_eq!(std::format!("{}", SizePolicy::Secure), "secure");
        assert_eq!(std::format!("{}", SizePolicy::Vulnerable), "vulnerable");
    }
}
