use std::ptr::NonNull;

/// This trait provides an abstraction over the one low level operation the
/// allocator needs: getting fresh memory from somewhere. As the allocator, our
/// top level view of this has nothing to do with the concrete APIs offered by
/// each kernel.
///
/// Memory obtained here is never given back. The allocator treats it as its
/// own for as long as it lives.
///
/// # Safety
///
/// Implementors must return either `None` or a pointer to `len` bytes that are
/// readable, writable, aligned to at least the machine word, not aliased by
/// anything else and valid for as long as the allocator using them exists.
pub unsafe trait PlatformMemory {
    /// Request a memory region of size `len`. It returns a pointer to the
    /// given location or `None` if the underlying call fails.
    fn request_memory(&mut self, len: usize) -> Option<NonNull<u8>>;
}

/// Zero sized [`PlatformMemory`] backed by the operating system: `mmap` on
/// unix and `VirtualAlloc` on windows. Mappings are private, anonymous,
/// committed and read/write.
#[derive(Debug, Default, Clone, Copy)]
pub struct Kernel;

#[cfg(unix)]
mod unix {
    use super::{Kernel, PlatformMemory};

    use libc::{mmap, off_t, size_t};

    use std::{os::raw::{c_int, c_void}, ptr::NonNull};

    unsafe impl PlatformMemory for Kernel {
        fn request_memory(&mut self, len: usize) -> Option<NonNull<u8>> {
            // mmap parameters.
            const ADDR: *mut c_void = std::ptr::null_mut::<c_void>();
            // Read-Write only memory.
            const PROT: c_int = libc::PROT_READ | libc::PROT_WRITE;
            const FLAGS: c_int = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS;
            const FD: c_int = -1;
            const OFFSET: off_t = 0;

            // mmap(2) rejects zero length mappings anyway.
            if len == 0 {
                return None;
            }

            let addr = unsafe { mmap(ADDR, len as size_t, PROT, FLAGS, FD, OFFSET) };

            match addr {
                libc::MAP_FAILED => None,
                addr => NonNull::new(addr.cast::<u8>()),
            }
        }
    }
}

#[cfg(windows)]
mod windows {
    use std::ptr::NonNull;

    use super::{Kernel, PlatformMemory};

    use windows::Win32::System::Memory;

    unsafe impl PlatformMemory for Kernel {
        fn request_memory(&mut self, len: usize) -> Option<NonNull<u8>> {
            // Read-Write only.
            let protection = Memory::PAGE_READWRITE;

            // Reserve and commit in one go, the memory is usable right away.
            let flags = Memory::MEM_RESERVE | Memory::MEM_COMMIT;

            unsafe {
                let addr = Memory::VirtualAlloc(None, len, flags, protection);

                NonNull::new(addr.cast())
            }
        }
    }
}

/// Memory sources used by the tests. The arena hands out consecutive chunks of
/// one buffer, which makes regions physically adjacent and addresses
/// predictable.
#[cfg(test)]
pub(crate) mod doubles {
    use std::ptr::NonNull;

    use super::PlatformMemory;
    use crate::utils::{align, WORD_SIZE};

    pub(crate) struct Arena {
        storage: Box<[usize]>,
        used: usize,
        pub requests: usize,
    }

    impl Arena {
        pub fn with_capacity(bytes: usize) -> Self {
            Self {
                storage: vec![0; align(bytes, WORD_SIZE) / WORD_SIZE].into_boxed_slice(),
                used: 0,
                requests: 0,
            }
        }

        pub fn base(&mut self) -> usize {
            self.storage.as_mut_ptr() as usize
        }
    }

    unsafe impl PlatformMemory for Arena {
        fn request_memory(&mut self, len: usize) -> Option<NonNull<u8>> {
            self.requests += 1;

            let len = align(len, WORD_SIZE);
            let capacity = self.storage.len() * WORD_SIZE;
            if len == 0 || self.used + len > capacity {
                return None;
            }

            let addr = unsafe { self.storage.as_mut_ptr().cast::<u8>().add(self.used) };
            self.used += len;

            NonNull::new(addr)
        }
    }

    /// Every request fails, like a process that ran out of address space.
    pub(crate) struct Exhausted;

    unsafe impl PlatformMemory for Exhausted {
        fn request_memory(&mut self, _len: usize) -> Option<NonNull<u8>> {
            None
        }
    }
}
