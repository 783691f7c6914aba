// Copyright (c) Microsoft Corporation.
// License: MIT OR Apache-2.0

//! The fixed stack buffer the copy engine fills, and the two ways of writing
//! into it.
//!
//! [`CheckedView`] refuses any index past the end of the buffer.
//! [`RawView`] writes through a raw pointer with no bound at all; it is the
//! only place in the crate where an element store can leave the buffer.

use core::{marker::PhantomData, mem::size_of};

/// Element type of the fixed buffer and of the caller's source stream.
pub type Element = u32;

/// Number of elements in [`FixedBuffer`].
pub const BUFFER_SIZE: usize = 32;

/// Size in bytes of one [`Element`].
pub const ELEMENT_SIZE: usize = size_of::<Element>();

/// Capacity of [`FixedBuffer`] in bytes.
pub const CAPACITY_BYTES: usize = BUFFER_SIZE * ELEMENT_SIZE;

/// Sentinel that ends the copy early when it shows up in the source stream.
pub const BUFFER_TERMINATOR: Element = 0xBAD0_B0B0;

/// Size in bytes of [`BUFFER_TERMINATOR`].
pub const TERMINATOR_SIZE: usize = size_of::<Element>();

const _: () = assert!(size_of::<FixedBuffer>() == CAPACITY_BYTES);

/// Stack storage for one copy. Lives for a single engine invocation.
#[repr(C)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedBuffer {
    elements: [Element; BUFFER_SIZE],
}

impl FixedBuffer {
    /// Returns a zero filled buffer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            elements: [0; BUFFER_SIZE],
        }
    }

    #[must_use]
    pub const fn as_slice(&self) -> &[Element] {
        &self.elements
    }

    /// Bounds checked writer over this buffer.
    pub fn checked(&mut self) -> CheckedView<'_> {
        CheckedView {
            elements: &mut self.elements,
        }
    }

    /// Unchecked writer starting at the first element of this buffer.
    ///
    /// # Safety
    ///
    /// Every index later passed to [`ElementSink::store`] on the returned
    /// view must address memory the caller is allowed to write. Indices past
    /// [`BUFFER_SIZE`] write beyond this buffer into whatever follows it.
    pub unsafe fn raw(&mut self) -> RawView<'_> {
        // SAFETY: the pointer comes from a live mutable borrow of the buffer;
        // the caller upholds the index contract.
        unsafe { RawView::from_raw(self.elements.as_mut_ptr()) }
    }
}

impl Default for FixedBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Destination of the copy loop.
pub trait ElementSink {
    /// Stores `value` at `index`.
    ///
    /// Returns `false` if the sink refused the index, in which case nothing
    /// was written and the copy stops.
    fn store(&mut self, index: usize, value: Element) -> bool;
}

/// Slice backed writer. An index outside the buffer is refused.
#[derive(Debug)]
pub struct CheckedView<'a> {
    elements: &'a mut [Element],
}

impl ElementSink for CheckedView<'_> {
    fn store(&mut self, index: usize, value: Element) -> bool {
        match self.elements.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}

/// Pointer backed writer with no bound.
#[derive(Debug)]
pub struct RawView<'a> {
    base: *mut Element,
    _frame: PhantomData<&'a mut Element>,
}

impl RawView<'_> {
    /// Builds a view that writes at `base.add(index)`.
    ///
    /// # Safety
    ///
    /// `base` must be valid for aligned writes at every index later passed
    /// to [`ElementSink::store`], for as long as the view is used, and no
    /// other reference may access that memory in the meantime.
    pub const unsafe fn from_raw(base: *mut Element) -> Self {
        Self {
            base,
            _frame: PhantomData,
        }
    }
}

impl ElementSink for RawView<'_> {
    fn store(&mut self, index: usize, value: Element) -> bool {
        // SAFETY: validity of `base + index` is the contract of `from_raw`.
        unsafe { self.base.add(index).write(value) };
        true
    }
}
