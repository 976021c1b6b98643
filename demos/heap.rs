use std::{io::Read, ptr::NonNull};

use tagalloc::{Heap, HeapProvider, Sbrk};

/// Waits until the user presses ENTER.
/// Useful when you want to inspect memory state with tools like `pmap`, `htop`,
/// `gdb`, or just visually track how allocations change the program break.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints the current program break using `sbrk(0)`.
fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:?}",
    label,
    std::process::id(),
    Sbrk::program_break(),
  );
}

fn print_alloc<P: HeapProvider>(
  heap: &Heap<P>,
  size: usize,
  ptr: NonNull<u8>,
) {
  println!(
    "Allocated {} bytes, address = {:?}, heap offset = {}, heap size = {}",
    size,
    ptr,
    ptr.as_ptr() as usize - heap.heap_lo() as usize,
    heap.heap_size(),
  );
}

/// Dumps every block in address order, the way the heap sees them.
fn print_blocks<P: HeapProvider>(heap: &Heap<P>) {
  for block in heap.blocks() {
    println!(
      "  {:>6}  {:>5} bytes  {}",
      block.payload.as_ptr() as usize - heap.heap_lo() as usize,
      block.size,
      if block.allocated { "allocated" } else { "free" },
    );
  }

  let free: Vec<_> = heap
    .free_blocks()
    .map(|block| block.payload.as_ptr() as usize - heap.heap_lo() as usize)
    .collect();
  println!("  free list: {:?}", free);
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();

  print_program_break("start");
  let mut heap = Heap::init(Sbrk::new())?;
  print_program_break("after init");
  print_blocks(&heap);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 1) Two allocations carved out of the initial chunk.
  // --------------------------------------------------------------------
  let first = heap.allocate(100)?.ok_or("zero-size request")?;
  println!("\n[1] Allocate 100 bytes");
  print_alloc(&heap, 100, first);

  let second = heap.allocate(24)?.ok_or("zero-size request")?;
  println!("[1] Allocate 24 bytes");
  print_alloc(&heap, 24, second);
  print_blocks(&heap);

  unsafe { first.as_ptr().write_bytes(0xAB, 100) };
  println!("[1] Initialized first block with 0xAB");

  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 2) Free the first block; it goes to the head of the free list.
  // --------------------------------------------------------------------
  unsafe { heap.deallocate(first) };
  println!("\n[2] Deallocated first block at {:?}", first);
  print_blocks(&heap);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 3) A smaller request reuses the block freed last.
  // --------------------------------------------------------------------
  let third = heap.allocate(50)?.ok_or("zero-size request")?;
  println!("\n[3] Allocate 50 bytes (check reuse of freed block)");
  print_alloc(&heap, 50, third);
  println!(
    "[3] third == first? {}",
    if third == first {
      "Yes, it reused the freed block"
    } else {
      "No, it allocated somewhere else"
    }
  );
  print_blocks(&heap);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 4) Grow the third block; the contents move with it.
  // --------------------------------------------------------------------
  unsafe { third.as_ptr().write_bytes(0xCD, 50) };
  let grown = unsafe { heap.reallocate(Some(third), 400)? }.ok_or("zero-size request")?;
  println!("\n[4] Reallocate 50 -> 400 bytes");
  print_alloc(&heap, 400, grown);
  println!("[4] First byte after the move = 0x{:X}", unsafe { grown.as_ptr().read() });
  print_blocks(&heap);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 5) A large request grows the heap past the current chunk.
  // --------------------------------------------------------------------
  print_program_break("before large alloc");

  let big = heap.allocate(64 * 1024)?.ok_or("zero-size request")?;
  println!("\n[5] Allocate large 64 KiB block");
  print_alloc(&heap, 64 * 1024, big);

  print_program_break("after large alloc");
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 6) Free everything; the heap collapses back into one free block.
  // --------------------------------------------------------------------
  unsafe {
    heap.deallocate(big);
    heap.deallocate(grown);
    heap.deallocate(second);
  }
  println!("\n[6] Freed every block");
  print_blocks(&heap);
  heap.check()?;

  println!("\n[7] End of example. The heap is consistent; the OS reclaims it at exit.");

  Ok(())
}
