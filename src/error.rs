use thiserror::Error;

/// Everything that can go wrong inside the allocator.
///
/// The sentinel API ([`crate::Allocator::allocate`] and friends) turns all of
/// these into an empty result or a no-op. The `try_*` variants hand them back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
    #[error("zero-byte allocation requested")]
    ZeroSize,

    #[error("requested size {size} overflows once the block header is added")]
    SizeOverflow { size: usize },

    #[error("failed to map a {len} byte region")]
    MapFailed { len: usize },

    /// Only reported when header verification is on.
    #[error("pointer {address:#x} was not handed out by this allocator")]
    InvalidPointer { address: usize },

    /// Only reported when header verification is on.
    #[error("pointer {address:#x} was already released")]
    DoubleRelease { address: usize },
}
