use std::{ptr::NonNull, sync::Mutex};

use log::warn;

use crate::{
    config::Config,
    kernel::{Kernel, PlatformMemory},
    memalloc::{Allocator, Stats},
};

/// [`Allocator`] behind a [`Mutex`], so it can be shared between threads.
/// Every entry point takes the lock for the whole operation, the algorithms
/// themselves are unchanged.
///
/// A poisoned lock makes `allocate` and `resize` return `None` and `release`
/// do nothing.
pub struct LockedAllocator<M: PlatformMemory = Kernel> {
    allocator: Mutex<Allocator<M>>,
}

impl LockedAllocator<Kernel> {
    /// Locked allocator backed by the operating system with the default [`Config`].
    pub const fn new() -> Self {
        Self::with_config(Config::new())
    }

    /// Locked allocator backed by the operating system.
    pub const fn with_config(config: Config) -> Self {
        Self { allocator: Mutex::new(Allocator::with_config(config)) }
    }
}

impl Default for LockedAllocator<Kernel> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: PlatformMemory> LockedAllocator<M> {
    /// Locked allocator that gets its regions from `memory`.
    pub fn with_source(memory: M, config: Config) -> Self {
        Self { allocator: Mutex::new(Allocator::with_source(memory, config)) }
    }

    /// See [`Allocator::allocate`].
    pub fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        match self.allocator.lock() {
            Ok(mut allocator) => allocator.allocate(size),
            Err(_) => {
                warn!("allocator lock poisoned");
                None
            }
        }
    }

    /// See [`Allocator::release`].
    ///
    /// # Safety
    ///
    /// Same contract as [`Allocator::release`].
    pub unsafe fn release(&self, address: Option<NonNull<u8>>) {
        match self.allocator.lock() {
            Ok(mut allocator) => unsafe { allocator.release(address) },
            Err(_) => warn!("allocator lock poisoned"),
        }
    }

    /// See [`Allocator::resize`].
    ///
    /// # Safety
    ///
    /// Same contract as [`Allocator::resize`].
    pub unsafe fn resize(&self, address: Option<NonNull<u8>>, new_size: usize) -> Option<NonNull<u8>> {
        match self.allocator.lock() {
            Ok(mut allocator) => unsafe { allocator.resize(address, new_size) },
            Err(_) => {
                warn!("allocator lock poisoned");
                None
            }
        }
    }

    /// See [`Allocator::stats`]. `None` if the lock is poisoned.
    pub fn stats(&self) -> Option<Stats> {
        self.allocator.lock().ok().map(|allocator| allocator.stats())
    }
}

#[cfg(test)]
mod tests {
    use std::{panic, sync::Barrier, thread};

    use super::*;

    /// Platform that blows up on the first request, leaving the lock poisoned.
    struct Failing;

    unsafe impl PlatformMemory for Failing {
        fn request_memory(&mut self, _len: usize) -> Option<NonNull<u8>> {
            panic!("platform failure");
        }
    }

    #[test]
    fn threads_get_disjoint_blocks() {
        let allocator = LockedAllocator::new();
        let num_threads = 8;
        let barrier = Barrier::new(num_threads);

        thread::scope(|scope| {
            for t in 0..num_threads {
                let allocator = &allocator;
                let barrier = &barrier;

                scope.spawn(move || unsafe {
                    let size = 512;
                    let address = allocator.allocate(size).unwrap();
                    address.as_ptr().write_bytes(t as u8, size);

                    barrier.wait();

                    // Check memory corruption.
                    for i in 0..size {
                        assert_eq!(*address.as_ptr().add(i), t as u8);
                    }

                    let address = allocator.resize(Some(address), size * 2).unwrap();
                    for i in 0..size {
                        assert_eq!(*address.as_ptr().add(i), t as u8);
                    }

                    allocator.release(Some(address));
                });
            }
        });

        let stats = allocator.stats().unwrap();
        assert_eq!(stats.regions, stats.free_blocks);
    }

    #[test]
    fn freed_memory_is_shared_between_threads() {
        let allocator = LockedAllocator::new();

        let address = allocator.allocate(64).unwrap();
        let raw = address.as_ptr() as usize;

        thread::scope(|scope| {
            scope.spawn(|| unsafe {
                allocator.release(NonNull::new(raw as *mut u8));
            });
        });

        assert_eq!(allocator.allocate(64), Some(address));
        assert_eq!(allocator.stats().unwrap().regions, 1);
    }

    #[test]
    fn poisoned_lock_turns_operations_into_no_ops() {
        let _ = env_logger::builder().is_test(true).try_init();
        let allocator = LockedAllocator::with_source(Failing, Config::default());

        let result = panic::catch_unwind(panic::AssertUnwindSafe(|| allocator.allocate(8)));
        assert!(result.is_err());

        assert!(allocator.allocate(8).is_none());
        unsafe {
            assert!(allocator.resize(None, 8).is_none());
            allocator.release(None);
        }
        assert!(allocator.stats().is_none());
    }
}
