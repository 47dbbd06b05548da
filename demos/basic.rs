
use std::ptr::NonNull;

use freelist_alloc::Allocator;

fn log_alloc(what: &str, addr: Option<NonNull<u8>>) {
    println!("{what}: received this address: {addr:?}");
}

fn main() {
    env_logger::init();

    let mut allocator = Allocator::new();

    unsafe {
        let first = allocator.allocate(15);
        log_alloc("Allocated 15 bytes", first);

        let second = allocator.allocate(8);
        log_alloc("Allocated 8 bytes", second);

        allocator.release(first);
        println!("Freed 15 bytes");

        let third = allocator.resize(second, 11);
        log_alloc("Reallocated to 11 bytes", third);

        let fourth = allocator.allocate(16);
        log_alloc("Allocated 16 bytes", fourth);

        allocator.release(third);
        println!("Freed 11 bytes");
    }

    for block in allocator.free_blocks() {
        println!("Free block at {:#x}, {} bytes", block.address, block.size);
    }
    println!("{:?}", allocator.stats());
}
