// Copyright (c) Microsoft Corporation.
// License: MIT OR Apache-2.0

//! Property-based tests for the size policies and the copy loop.

use proptest::prelude::*;

use crate::{
    buffer::{Element, FixedBuffer, BUFFER_SIZE, BUFFER_TERMINATOR},
    engine::CopyEngine,
    policy::{SizePolicy, ValidationOutcome, MAX_ALLOWED_LENGTH},
    probe::Region,
};

fn any_policy() -> impl Strategy<Value = SizePolicy> {
    prop_oneof![Just(SizePolicy::Secure), Just(SizePolicy::Vulnerable)]
}

/// Source words that never contain the terminator.
fn payload() -> impl Strategy<Value = std::vec::Vec<Element>> {
    prop::collection::vec(
        any::<Element>().prop_filter("terminator", |&e| e != BUFFER_TERMINATOR),
        BUFFER_SIZE..=BUFFER_SIZE + 8,
    )
}

proptest! {
    /// Property: the secure check is a plain comparison against the constant.
    #[test]
    fn prop_secure_rejects_exactly_above_max(length in any::<u32>()) {
        let expected = if length > MAX_ALLOWED_LENGTH {
            ValidationOutcome::RejectedSize
        } else {
            ValidationOutcome::Accepted
        };
        prop_assert_eq!(SizePolicy::Secure.validate(length), expected);
    }

    /// Property: both policies agree everywhere the addition cannot wrap.
    #[test]
    fn prop_policies_agree_without_wrap(length in 0u32..=(u32::MAX - 4)) {
        prop_assert_eq!(
            SizePolicy::Vulnerable.validate(length),
            SizePolicy::Secure.validate(length)
        );
    }

    /// Property: every wrapping length is accepted by the vulnerable check
    /// and rejected by the secure one.
    #[test]
    fn prop_wrapped_lengths_split_the_policies(length in (u32::MAX - 3)..=u32::MAX) {
        prop_assert_eq!(SizePolicy::Vulnerable.validate(length), ValidationOutcome::Accepted);
        prop_assert_eq!(SizePolicy::Secure.validate(length), ValidationOutcome::RejectedSize);
    }

    /// Property: an accepted length that fits never writes more than N
    /// elements and copies exactly `length / 4`.
    #[test]
    fn prop_fitting_lengths_stay_in_bounds(
        policy in any_policy(),
        words in payload(),
        length in 0u32..=MAX_ALLOWED_LENGTH,
    ) {
        let engine = CopyEngine::new(policy, Region::of(&words));
        let mut buffer = FixedBuffer::new();

        let report = unsafe { engine.copy(words.as_ptr().cast(), length, &mut buffer) };

        let report = report.expect("fitting length is accepted");
        prop_assert!(report.elements_copied < BUFFER_SIZE);
        prop_assert_eq!(report.elements_copied, length as usize / 4);
        prop_assert_eq!(
            &buffer.as_slice()[..report.elements_copied],
            &words[..report.elements_copied]
        );
    }

    /// Property: a terminator at offset k < N stops the copy after exactly k
    /// elements, whatever length was declared.
    #[test]
    fn prop_terminator_stops_after_k(
        policy in any_policy(),
        mut words in payload(),
        k in 0usize..BUFFER_SIZE - 1,
        length in prop_oneof![
            ((BUFFER_SIZE as u32 - 1) * 4..=MAX_ALLOWED_LENGTH),
            ((u32::MAX - 3)..=u32::MAX),
        ],
    ) {
        words[k] = BUFFER_TERMINATOR;
        let engine = CopyEngine::new(policy, Region::of(&words));
        let mut buffer = FixedBuffer::new();

        let result = unsafe { engine.copy(words.as_ptr().cast(), length, &mut buffer) };

        match result {
            Ok(report) => {
                prop_assert_eq!(report.elements_copied, k);
                prop_assert!(report.terminated);
                prop_assert!(buffer.as_slice()[k..].iter().all(|&e| e == 0));
            }
            // Only the secure policy may refuse, and only for wrapped lengths.
            Err(_) => {
                prop_assert!(policy == SizePolicy::Secure && length > MAX_ALLOWED_LENGTH);
            }
        }
    }
}
