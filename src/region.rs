use std::ptr::NonNull;

use log::{trace, warn};

use crate::{
    block::{BLOCK_HEADER_SIZE, Header},
    error::AllocError,
    kernel::PlatformMemory,
};

/// Asks `memory` for a region that fits exactly one block of `size` content
/// bytes and writes the block header at its start.
///
/// This is the only place where new memory enters the allocator. The region
/// is not recorded anywhere and the block is returned in use, so it is not on
/// the free list either:
///
/// ```text
/// +--------------------------------+ <- address returned by the platform
/// | Header (size, in use, no links)|
/// +--------------------------------+
/// |         `size` bytes           |
/// +--------------------------------+ <- end of the region
/// ```
///
/// `size` must already be aligned to the machine word.
pub(crate) fn request_space<M: PlatformMemory>(
    memory: &mut M,
    size: usize,
) -> Result<NonNull<Header>, AllocError> {
    let len = size
        .checked_add(BLOCK_HEADER_SIZE)
        .ok_or(AllocError::SizeOverflow { size })?;

    let Some(addr) = memory.request_memory(len) else {
        warn!("platform refused a {len} byte region");
        return Err(AllocError::MapFailed { len });
    };

    trace!("mapped {len} bytes at {addr:?}");

    // SAFETY: `PlatformMemory` guarantees `len` writable, word aligned bytes.
    Ok(unsafe { Header::write(addr, size, false) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{doubles::{Arena, Exhausted}, Kernel};

    #[test]
    fn fresh_block_is_in_use_and_unlinked() {
        let mut arena = Arena::with_capacity(256);
        let base = arena.base();

        let header = request_space(&mut arena, 48).unwrap();

        assert_eq!(header.as_ptr() as usize, base);
        unsafe {
            let block = header.as_ref();
            assert_eq!(block.size(), 48);
            assert!(!block.is_free());
            assert!(block.has_valid_tag());
            assert!(block.next.is_none() && block.prev.is_none());
        }

        // Exactly header + content was requested, so the next region follows.
        let next = request_space(&mut arena, 8).unwrap();
        assert_eq!(next.as_ptr() as usize, base + BLOCK_HEADER_SIZE + 48);
    }

    #[test]
    fn kernel_backed_block_is_usable() {
        let header = request_space(&mut Kernel, 1024).unwrap();

        unsafe {
            let content = Header::content_address_of(header);
            content.as_ptr().write_bytes(0xAB, 1024);
            assert_eq!(*content.as_ptr().add(1023), 0xAB);
            assert_eq!(header.as_ref().size(), 1024);
        }
    }

    #[test]
    fn platform_failure_is_reported() {
        assert_eq!(
            request_space(&mut Exhausted, 64).unwrap_err(),
            AllocError::MapFailed { len: 64 + BLOCK_HEADER_SIZE }
        );
    }

    #[test]
    fn oversized_request_is_rejected_before_mapping() {
        let mut arena = Arena::with_capacity(64);

        assert_eq!(
            request_space(&mut arena, usize::MAX - 7).unwrap_err(),
            AllocError::SizeOverflow { size: usize::MAX - 7 }
        );
        assert_eq!(arena.requests, 0);
    }
}
