// Copyright (c) Microsoft Corporation.
// License: MIT OR Apache-2.0

//! Fuzz harness for the integer overflow dispatch entry.
//!
//! The first four bytes are the declared length, the rest is the source
//! stream. Built with `--features secure` the target must run clean; built
//! without it, AddressSanitizer reports the stack buffer overflow as soon as
//! the fuzzer finds a wrapping length without an early terminator.

#![no_main]
use integer_overflow_core::{
    dispatch,
    ControlRequest,
    CopyEngine,
    Element,
    Region,
    SizePolicy,
    BUFFER_SIZE,
    ELEMENT_SIZE,
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((length, payload)) = data.split_first_chunk::<4>() else {
        return;
    };
    let length = u32::from_le_bytes(*length);

    let mut words: Vec<Element> = payload
        .chunks_exact(ELEMENT_SIZE)
        .map(|chunk| Element::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();
    // The probe always covers a whole fixed buffer.
    if words.len() < BUFFER_SIZE {
        words.resize(BUFFER_SIZE, 0);
    }

    let engine = CopyEngine::new(SizePolicy::configured(), Region::of(&words));
    let request = ControlRequest::new(words.as_ptr().cast(), length);

    // SAFETY: the secure policy never reads past `words`; under the
    // vulnerable policy the out of bounds accesses are what this target is
    // for.
    let _ = unsafe { dispatch(&engine, &request) };
});
