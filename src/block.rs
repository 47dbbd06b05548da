use std::{mem, ptr::NonNull};
use crate::list::Node;


/// Every block header is a [`Node<Block>`]: the node links are the free list
/// links and [`Block`] is the rest of the metadata.
pub(crate) type Header = Node<Block>;

/// Header size of a block. We need to add the overhead introduced by our
/// [`Node`] structure since we always use our `Block` as a node of our linked list.
pub const BLOCK_HEADER_SIZE: usize = mem::size_of::<Header>();

/// Written into every live header. A header that has been absorbed by a merge
/// gets [`DEAD_TAG`] instead, so a stale pointer to it no longer looks valid.
pub(crate) const BLOCK_TAG: u32 = 0xB10C_F1F0;
pub(crate) const DEAD_TAG: u32 = 0;

/// This is the structure of a block. The fields of the block are its metadata,
/// content is placed after this header.
///
/// The following diagram represents this structure including the [`Node`]
/// wrapper, whose links are only meaningful while the block is free:
///
/// ```text
/// +---------------------+ <------+
/// |   next free block   |        |
/// +---------------------+        |
/// |   prev free block   |        |
/// +---------------------+        | -> Header
/// |        size         |        |
/// +---------------------+        |
/// | is_free (1b) | tag  |        |
/// +---------------------+ <------+
/// |       Content       |        |
/// |         ...         |        | -> Addressable content (`size` bytes)
/// |         ...         |        |
/// +---------------------+ <------+
/// ```
///
/// Header size is a multiple of the machine word and every size we store is
/// aligned to the word as well (see [`crate::utils::align`]), so a header
/// carved at `content + size` is always properly aligned.
pub(crate) struct Block {
    /// Size of the content, header excluded.
    pub size: usize,
    /// Flag to tell whether the block is free or not.
    pub is_free: bool,
    /// Either [`BLOCK_TAG`] or [`DEAD_TAG`].
    pub tag: u32,
}

impl Header {
    /// Writes a fresh, unlinked header at `addr`.
    ///
    /// **SAFETY**: `addr` must be valid for writes of [`BLOCK_HEADER_SIZE`]
    /// bytes and aligned for [`Header`].
    pub unsafe fn write(addr: NonNull<u8>, size: usize, is_free: bool) -> NonNull<Self> {
        let header = addr.cast::<Self>();

        unsafe {
            header.as_ptr().write(Node {
                next: None,
                prev: None,
                data: Block { size, is_free, tag: BLOCK_TAG },
            });
        }

        header
    }

    /// Returns the header that precedes a content address we previously
    /// handed out.
    ///
    /// ```text
    /// +-------------+
    /// |   Header    | <- Returned address points here.
    /// +-------------+
    /// |   Content   | <- Given address should point here.
    /// +-------------+
    /// ```
    ///
    /// **SAFETY**: `address` must be at least [`BLOCK_HEADER_SIZE`] bytes past
    /// the start of a mapping. Whether a header actually lives there is only
    /// known after checking its tag.
    #[inline]
    pub unsafe fn from_content_address(address: NonNull<u8>) -> NonNull<Self> {
        unsafe { NonNull::new_unchecked(address.as_ptr().sub(BLOCK_HEADER_SIZE)).cast() }
    }

    /// Address of the first content byte of `header`.
    #[inline]
    pub unsafe fn content_address_of(header: NonNull<Self>) -> NonNull<u8> {
        unsafe { NonNull::new_unchecked(header.as_ptr().cast::<u8>().add(BLOCK_HEADER_SIZE)) }
    }

    /// Address one past the last content byte, which is where the header of the
    /// physically next block would start.
    #[inline]
    pub unsafe fn end_address_of(header: NonNull<Self>) -> usize {
        unsafe { header.as_ptr() as usize + header.as_ref().total_size() }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.data.size
    }

    #[inline]
    pub fn is_free(&self) -> bool {
        self.data.is_free
    }

    /// Total block size including [`BLOCK_HEADER_SIZE`].
    #[inline]
    pub fn total_size(&self) -> usize {
        BLOCK_HEADER_SIZE + self.data.size
    }

    #[inline]
    pub fn has_valid_tag(&self) -> bool {
        self.data.tag == BLOCK_TAG
    }
}
