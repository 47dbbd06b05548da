//! First-fit memory allocator that gets its memory straight from the
//! operating system (`mmap` on unix, `VirtualAlloc` on windows) instead of
//! going through the platform's general purpose allocator.
//!
//! Every block handed out is preceded by a small header:
//!
//! ```text
//! +-------------------------------+
//! | Header   | Actual memory block|
//! +-------------------------------+
//!            ^
//!            +-- pointer returned to the caller
//! ```
//!
//! Free blocks are kept in one doubly linked list whose links live inside the
//! headers. Allocation takes the first free block that is big enough and
//! splits off whatever it doesn't need. Release merges the block with any free
//! block right before or after it in memory. Resize always moves the data to a
//! new block. When no free block fits, a new region big enough for exactly one
//! block is requested. Memory is never given back to the operating system.
//!
//! ```rust
//! use freelist_alloc::Allocator;
//!
//! let mut allocator = Allocator::new();
//!
//! let a = allocator.allocate(15).unwrap();
//! unsafe {
//!     a.as_ptr().write_bytes(1, 15);
//!
//!     let b = allocator.resize(Some(a), 64).unwrap();
//!     assert_eq!(*b.as_ptr().add(14), 1);
//!
//!     allocator.release(Some(b));
//! }
//! ```
//!
//! [`Allocator`] is single threaded and needs `&mut self`. [`LockedAllocator`]
//! puts one behind a mutex.

mod block;
mod config;
mod error;
mod freelist;
mod kernel;
mod list;
mod memalloc;
mod region;
mod sync;
mod utils;

pub use block::BLOCK_HEADER_SIZE;
pub use config::Config;
pub use error::AllocError;
pub use kernel::{Kernel, PlatformMemory};
pub use memalloc::{Allocator, BlockInfo, Stats};
pub use sync::LockedAllocator;
