use std::ptr::NonNull;

use crate::{
    block::{BLOCK_HEADER_SIZE, Block, DEAD_TAG, Header},
    list::{Link, List},
};

/// Linked list to keep track of free [`Block`]s.
///
/// The links live in the block headers themselves (see [`Header`]), so a block
/// joins or leaves the list without any extra memory. Only free blocks are
/// members, and the list says nothing about where blocks are in memory:
///
/// ```text
///                     Free List
///
///     head                          Next free block
///      |            +-----------------------------------------------+
///      v            |                                               v
/// +--------------+--|--+  +--------------+  +--------------+  +-----------+
/// |  Free        |     |  |  In use      |  |  In use      |  |  Free     |
/// +--------------+-----+  +--------------+  +--------------+  +-----------+
///   region A                region B          region C          region A'
/// ```
///
/// Physical neighbours are found by address arithmetic instead: the block right
/// after `b` starts at `b + BLOCK_HEADER_SIZE + b.size`. Since every free block
/// is on this list, "is my neighbour free?" is answered by looking for a member
/// that starts where we end, or ends where we start.
pub(crate) struct FreeList {
    items: List<Block>,
}

/// What [`FreeList::neighbours_of`] finds around a block.
pub(crate) struct Neighbours {
    /// Free block whose content ends exactly where the block's header starts.
    pub prev: Link<Header>,
    /// Free block whose header starts exactly where the block's content ends.
    pub next: Link<Header>,
}

impl FreeList {
    /// Creates a new empty List
    pub const fn new() -> Self {
        Self { items: List::new() }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Marks `block` as free and links it at the head of the list.
    pub unsafe fn insert_free_block(&mut self, mut block: NonNull<Header>) {
        unsafe {
            block.as_mut().data.is_free = true;
            self.items.push_front(block);
        }
    }

    /// Unlinks `block`. The free flag is left to the caller.
    pub unsafe fn remove_free_block(&mut self, block: NonNull<Header>) {
        unsafe { self.items.remove(block) }
    }

    /// `remainder` takes the exact list position of `block`, which leaves the
    /// list. Used after splitting a free block so the first-fit order is kept.
    pub unsafe fn replace_free_block(&mut self, block: NonNull<Header>, remainder: NonNull<Header>) {
        unsafe { self.items.replace(block, remainder) }
    }

    /// Returns the first block in list order that is free and can hold `size`
    /// bytes, or `None`. This is the first-fit policy: no attempt is made to
    /// find the block that fits best.
    pub fn find_free_block(&self, size: usize) -> Link<Header> {
        self.items.iter().find(|node| unsafe {
            let block = node.as_ref();
            block.is_free() && block.size() >= size
        })
    }

    /// Looks for free blocks physically adjacent to `block` in a single pass.
    pub fn neighbours_of(&self, block: NonNull<Header>) -> Neighbours {
        let start = block.as_ptr() as usize;
        let end = unsafe { Header::end_address_of(block) };

        let mut neighbours = Neighbours { prev: None, next: None };

        for node in &self.items {
            if node == block {
                continue;
            }
            if node.as_ptr() as usize == end {
                neighbours.next = Some(node);
            } else if unsafe { Header::end_address_of(node) } == start {
                neighbours.prev = Some(node);
            }
            if neighbours.prev.is_some() && neighbours.next.is_some() {
                break;
            }
        }

        neighbours
    }

    /// Absorbs `next`, the free block physically after `block`, into `block`.
    /// `next` leaves the list and its header becomes plain content.
    ///
    /// ```text
    /// +--------+---------+--------+--------------+
    /// | Header | Content | Header |   Content    |
    /// +--------+---------+--------+--------------+
    ///   block              next
    ///
    /// +--------+---------------------------------+
    /// | Header |            Content              |
    /// +--------+---------------------------------+
    ///   block
    /// ```
    pub unsafe fn merge_with_next(&mut self, mut block: NonNull<Header>, mut next: NonNull<Header>) {
        unsafe {
            self.items.remove(next);

            // We need to cover the header and the actual content of the block
            block.as_mut().data.size += BLOCK_HEADER_SIZE + next.as_ref().size();
            next.as_mut().data.tag = DEAD_TAG;
        }
    }

    /// Grows `prev`, the free block physically before `block`, over `block`.
    /// `prev` keeps its place in the list and `block` must not be a member.
    pub unsafe fn merge_with_prev(&mut self, mut prev: NonNull<Header>, mut block: NonNull<Header>) {
        unsafe {
            prev.as_mut().data.size += BLOCK_HEADER_SIZE + block.as_ref().size();
            block.as_mut().data.tag = DEAD_TAG;
        }
    }

    /// Iterates over the free blocks in list order.
    pub fn iter(&self) -> impl Iterator<Item = NonNull<Header>> + '_ {
        self.items.iter()
    }
}
