use std::ptr::{self, NonNull};

use log::{debug, error, trace};

use crate::{
    block::{BLOCK_HEADER_SIZE, Header},
    config::Config,
    error::AllocError,
    freelist::FreeList,
    kernel::{Kernel, PlatformMemory},
    region::request_space,
    utils::checked_word_align,
};

/// A free block as seen from the outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    /// Content address, the one a caller would have been given.
    pub address: usize,
    /// Content size in bytes.
    pub size: usize,
}

/// Counters describing the allocator at a point in time.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    /// Regions requested from the platform so far.
    pub regions: usize,
    /// Bytes requested from the platform so far, headers included.
    pub mapped_bytes: usize,
    /// Blocks currently on the free list.
    pub free_blocks: usize,
    /// Content bytes held by those blocks.
    pub free_bytes: usize,
}

/// First-fit allocator over a single free list.
///
/// ```text
///            Free List
///   head --> +------+ --> +------+ --> +------+
///            | Free |     | Free |     | Free |
///            +------+ <-- +------+ <-- +------+
/// ```
///
/// - [`Allocator::allocate`] walks the list from the head and takes the first
///   block that is big enough, splitting it when the leftover can hold a header
///   and at least one word. When nothing fits, a new region sized for exactly
///   one block is requested from the [`PlatformMemory`].
/// - [`Allocator::release`] merges the block with whichever physical neighbours
///   are free, so two adjacent free blocks never survive a release.
/// - [`Allocator::resize`] always moves: allocate, copy, release.
///
/// Memory is never returned to the platform. Dropping the allocator simply
/// forgets about it.
///
/// This type needs `&mut self` for everything. To share one between threads
/// wrap it in a [`crate::LockedAllocator`].
pub struct Allocator<M: PlatformMemory = Kernel> {
    /// Where new regions come from.
    memory: M,
    /// Linked list of free blocks identified by [`crate::block::Block::is_free`]
    free_list: FreeList,
    config: Config,
    regions: usize,
    mapped_bytes: usize,
}

// SAFETY: every block reachable from the free list belongs to this allocator
// alone, so moving the whole thing to another thread moves all of it.
unsafe impl<M: PlatformMemory + Send> Send for Allocator<M> {}

impl Allocator<Kernel> {
    /// Allocator backed by the operating system with the default [`Config`].
    pub const fn new() -> Self {
        Self::with_source(Kernel, Config::new())
    }

    /// Allocator backed by the operating system.
    pub const fn with_config(config: Config) -> Self {
        Self::with_source(Kernel, config)
    }
}

impl Default for Allocator<Kernel> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: PlatformMemory> Allocator<M> {
    /// Allocator that gets its regions from `memory`.
    pub const fn with_source(memory: M, config: Config) -> Self {
        Self {
            memory,
            free_list: FreeList::new(),
            config,
            regions: 0,
            mapped_bytes: 0,
        }
    }

    /// Configuration this allocator was built with.
    pub fn config(&self) -> Config {
        self.config
    }

    /// Returns a pointer to at least `size` writable bytes, or `None` if `size`
    /// is zero or no memory could be obtained.
    pub fn allocate(&mut self, size: usize) -> Option<NonNull<u8>> {
        match self.try_allocate(size) {
            Ok(address) => Some(address),
            Err(err) => {
                debug!("allocate failed: {err}");
                None
            }
        }
    }

    /// Same as [`Allocator::allocate`] but tells why nothing was allocated.
    pub fn try_allocate(&mut self, size: usize) -> Result<NonNull<u8>, AllocError> {
        if size == 0 {
            return Err(AllocError::ZeroSize);
        }

        let needed = checked_word_align(size).ok_or(AllocError::SizeOverflow { size })?;

        let block = match self.free_list.find_free_block(needed) {
            Some(block) => {
                unsafe { self.take_free_block(block, needed) };
                block
            }
            None => {
                let block = request_space(&mut self.memory, needed)?;
                self.regions += 1;
                self.mapped_bytes += needed + BLOCK_HEADER_SIZE;
                block
            }
        };

        let address = unsafe { Header::content_address_of(block) };
        trace!("allocate({size}) -> {address:?}");

        Ok(address)
    }

    /// Gives the block at `address` back to the allocator. `None` is ignored.
    ///
    /// With [`Config::verify_headers`] on, pointers that were not handed out by
    /// this allocator, or were already released, are logged and ignored
    /// (as long as the bytes before them can be read at all).
    ///
    /// # Safety
    ///
    /// `address` must be `None` or a pointer returned by this allocator that has
    /// not been released or resized since. Anything else is undefined
    /// behaviour when header verification is off.
    pub unsafe fn release(&mut self, address: Option<NonNull<u8>>) {
        if let Err(err) = unsafe { self.try_release(address) } {
            error!("release ignored: {err}");
        }
    }

    /// Same as [`Allocator::release`] but returns what verification rejected.
    ///
    /// # Safety
    ///
    /// See [`Allocator::release`].
    pub unsafe fn try_release(&mut self, address: Option<NonNull<u8>>) -> Result<(), AllocError> {
        let Some(address) = address else {
            return Ok(());
        };

        unsafe {
            let block = self.recover_header(address)?;
            self.release_block(block);
        }

        trace!("release({address:?})");

        Ok(())
    }

    /// Moves the content at `address` into a new block of `new_size` bytes.
    ///
    /// - `new_size == 0` releases `address` and returns `None`.
    /// - `address == None` is a plain [`Allocator::allocate`].
    /// - Otherwise a new block is always allocated, the first
    ///   `min(old size, new_size)` bytes are copied and the old block is
    ///   released. If the allocation fails, `None` is returned and `address`
    ///   stays valid and untouched.
    ///
    /// # Safety
    ///
    /// Same contract as [`Allocator::release`] for `address`.
    pub unsafe fn resize(&mut self, address: Option<NonNull<u8>>, new_size: usize) -> Option<NonNull<u8>> {
        match unsafe { self.try_resize(address, new_size) } {
            Ok(address) => address,
            Err(err) => {
                debug!("resize failed: {err}");
                None
            }
        }
    }

    /// Same as [`Allocator::resize`] with errors. `Ok(None)` only happens for
    /// `new_size == 0`.
    ///
    /// # Safety
    ///
    /// See [`Allocator::release`].
    pub unsafe fn try_resize(
        &mut self,
        address: Option<NonNull<u8>>,
        new_size: usize,
    ) -> Result<Option<NonNull<u8>>, AllocError> {
        if new_size == 0 {
            unsafe { self.try_release(address)? };
            return Ok(None);
        }

        let Some(address) = address else {
            return self.try_allocate(new_size).map(Some);
        };

        unsafe {
            let old_block = self.recover_header(address)?;
            let old_size = old_block.as_ref().size();

            let new_address = self.try_allocate(new_size)?;

            // The old block is in use, so the new one can't overlap it.
            ptr::copy_nonoverlapping(
                address.as_ptr(),
                new_address.as_ptr(),
                old_size.min(new_size),
            );

            self.release_block(old_block);

            trace!("resize({address:?}, {new_size}) -> {new_address:?}");

            Ok(Some(new_address))
        }
    }

    /// Content size of the block at `address`, at least what was requested.
    ///
    /// # Safety
    ///
    /// `address` must be a live pointer handed out by this allocator.
    pub unsafe fn usable_size(&self, address: NonNull<u8>) -> usize {
        unsafe { Header::from_content_address(address).as_ref().size() }
    }

    /// Free blocks in free list order, which is first-fit search order.
    pub fn free_blocks(&self) -> impl Iterator<Item = BlockInfo> + '_ {
        self.free_list.iter().map(|block| unsafe {
            BlockInfo {
                address: Header::content_address_of(block).as_ptr() as usize,
                size: block.as_ref().size(),
            }
        })
    }

    /// Snapshot of the counters, see [`Stats`].
    pub fn stats(&self) -> Stats {
        Stats {
            regions: self.regions,
            mapped_bytes: self.mapped_bytes,
            free_blocks: self.free_list.len(),
            free_bytes: self.free_blocks().map(|block| block.size).sum(),
        }
    }

    /// Hands the free `block` out for `size` bytes. If the block is larger
    /// than `size` plus a header the tail is split off and takes the block's
    /// place on the free list, otherwise the whole block leaves the list.
    unsafe fn take_free_block(&mut self, mut block: NonNull<Header>, size: usize) {
        unsafe {
            block.as_mut().data.is_free = false;

            if block.as_ref().size() > size + BLOCK_HEADER_SIZE {
                let remainder = split_block(block, size);
                self.free_list.replace_free_block(block, remainder);
            } else {
                self.free_list.remove_free_block(block);
            }
        }
    }

    /// Marks `block` free and coalesces it with its free physical neighbours.
    ///
    /// ```text
    ///  prev (free)       block          next (free)
    /// +------+------+ +------+------+ +------+------+
    /// |Header|  ... | |Header|  ... | |Header|  ... |
    /// +------+------+ +------+------+ +------+------+
    ///
    ///  prev (free, on the list where it already was)
    /// +------+--------------------------------------+
    /// |Header|                 ...                  |
    /// +------+--------------------------------------+
    /// ```
    ///
    /// Without a free predecessor the block goes to the head of the free list.
    unsafe fn release_block(&mut self, mut block: NonNull<Header>) {
        unsafe {
            block.as_mut().data.is_free = true;

            let neighbours = self.free_list.neighbours_of(block);

            if let Some(next) = neighbours.next {
                trace!("merging {block:?} with next {next:?}");
                self.free_list.merge_with_next(block, next);
            }

            match neighbours.prev {
                Some(prev) => {
                    trace!("merging {block:?} into prev {prev:?}");
                    self.free_list.merge_with_prev(prev, block);
                }
                None => self.free_list.insert_free_block(block),
            }
        }
    }

    /// Header in front of `address`, checked if verification is on.
    unsafe fn recover_header(&self, address: NonNull<u8>) -> Result<NonNull<Header>, AllocError> {
        let block = unsafe { Header::from_content_address(address) };

        if self.config.verify_headers {
            let header = unsafe { block.as_ref() };
            let address = address.as_ptr() as usize;

            if !header.has_valid_tag() {
                return Err(AllocError::InvalidPointer { address });
            }
            if header.is_free() {
                return Err(AllocError::DoubleRelease { address });
            }
        }

        Ok(block)
    }
}

/// Block splitting. `block` keeps `size` bytes and a new free block is carved
/// out of the rest:
///
/// **Before**:
///
/// ```text
///         +-->  +-----------+
///         |     |   Header  | <- H bytes.
/// Block   |     +-----------+
///         |     |  Content  | <- S bytes.
///         +-->  +-----------+
/// ```
/// **After**:
///
/// ```text
///         +-->  +-----------+
///         |     |   Header  | <- H bytes.
/// Block   |     +-----------+
///         |     |  Content  | <- size bytes.
///         +-->  +-----------+
///         |     |   Header  | <- H bytes.
/// Rest    |     +-----------+
///         |     |  Content  | <- S - size - H bytes.
///         +-->  +-----------+
/// ```
///
/// Only headers are rewritten, content is not moved. The returned remainder
/// is free but not linked, that is up to the caller.
///
/// # Safety
///
/// `block.size > size + BLOCK_HEADER_SIZE` and `size` is word aligned.
unsafe fn split_block(mut block: NonNull<Header>, size: usize) -> NonNull<Header> {
    unsafe {
        let remainder_size = block.as_ref().size() - size - BLOCK_HEADER_SIZE;
        let address = Header::content_address_of(block).add(size);

        block.as_mut().data.size = size;

        Header::write(address, remainder_size, true)
    }
}
