//! Helper functions that don't particularly belong to any concrete module.

use std::mem;

/// Machine word size in bytes. Every size the allocator stores is a multiple
/// of this value.
pub(crate) const WORD_SIZE: usize = mem::size_of::<usize>();

/// It aligns `to_be_aligned` using `aligment`, which must be a power of two.
///
/// Block sizes are rounded up to the machine word so that the header of a
/// block carved right after another block's content is properly aligned.
#[inline]
pub(crate) fn align(to_be_aligned: usize, aligment: usize) -> usize {
    (to_be_aligned + (aligment - 1)) & !(aligment - 1)
}

/// Same as [`align`] to the machine word, but returns `None` instead of
/// wrapping around for sizes close to `usize::MAX`.
#[inline]
pub(crate) fn checked_word_align(size: usize) -> Option<usize> {
    Some(size.checked_add(WORD_SIZE - 1)? & !(WORD_SIZE - 1))
}
