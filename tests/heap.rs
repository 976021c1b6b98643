use std::{
  ptr::NonNull,
  sync::{Arc, Mutex},
  thread,
};

use tagalloc::{AllocError, BlockInfo, Heap, HeapConfig, MmapArena};

fn heap() -> Heap<MmapArena> {
  Heap::init(MmapArena::new(MmapArena::DEFAULT_CAPACITY).unwrap()).unwrap()
}

fn allocate(
  heap: &mut Heap<MmapArena>,
  size: usize,
) -> NonNull<u8> {
  let ptr = heap.allocate(size).unwrap().unwrap();
  heap.check().unwrap();
  ptr
}

fn deallocate(
  heap: &mut Heap<MmapArena>,
  ptr: NonNull<u8>,
) {
  unsafe { heap.deallocate(ptr) };
  heap.check().unwrap();
}

fn fill(
  ptr: NonNull<u8>,
  size: usize,
  seed: u8,
) {
  for i in 0..size {
    unsafe { ptr.as_ptr().add(i).write(seed.wrapping_add(i as u8)) };
  }
}

fn holds(
  ptr: NonNull<u8>,
  size: usize,
  seed: u8,
) -> bool {
  (0..size).all(|i| unsafe { ptr.as_ptr().add(i).read() } == seed.wrapping_add(i as u8))
}

/// Small deterministic generator so workloads are reproducible.
struct Lcg(u64);

impl Lcg {
  fn next(&mut self) -> u64 {
    self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    self.0 >> 33
  }

  fn below(
    &mut self,
    bound: u64,
  ) -> usize {
    (self.next() % bound) as usize
  }
}

#[test]
fn test_two_allocations_do_not_overlap() {
  let mut heap = heap();

  let p1 = allocate(&mut heap, 100);
  let p2 = allocate(&mut heap, 200);

  assert_ne!(p1, p2);
  let (lo, hi) = (p1.as_ptr() as usize, p2.as_ptr() as usize);
  assert!(hi >= lo + 100 || lo >= hi + 200);
}

#[test]
fn test_freed_block_is_reused() {
  let mut heap = heap();

  let p1 = allocate(&mut heap, 100);
  deallocate(&mut heap, p1);
  let p2 = allocate(&mut heap, 50);

  assert_eq!(p1, p2);
}

#[test]
fn test_neighbors_coalesce_without_growth() {
  let mut heap = heap();

  let a = allocate(&mut heap, 24);
  let b = allocate(&mut heap, 24);
  assert_eq!(b.as_ptr() as usize - a.as_ptr() as usize, 32);

  deallocate(&mut heap, a);
  deallocate(&mut heap, b);

  let free: Vec<BlockInfo> = heap.free_blocks().collect();
  assert_eq!(free.len(), 1);
  assert_eq!(free[0].payload, a);

  let size = heap.heap_size();
  let c = allocate(&mut heap, 56);
  assert_eq!(c, a);
  assert_eq!(heap.heap_size(), size);
}

#[test]
fn test_large_request_grows_heap() {
  let mut heap = heap();
  let size = heap.heap_size();

  let ptr = allocate(&mut heap, 10_000);

  assert_eq!(ptr.as_ptr() as usize % 8, 0);
  assert!(heap.heap_size() >= size + 10_000);
  fill(ptr, 10_000, 7);
  assert!(holds(ptr, 10_000, 7));
  assert!(ptr.as_ptr() as *const u8 >= heap.heap_lo());
  assert!(unsafe { ptr.as_ptr().add(10_000 - 1) } as *const u8 <= heap.heap_hi());
}

#[test]
fn test_zero_size_and_null_realloc() {
  let mut other = heap();
  let mut heap = heap();

  assert_eq!(heap.allocate(0).unwrap(), None);

  let via_realloc = unsafe { heap.reallocate(None, 64) }.unwrap().unwrap();
  let via_alloc = other.allocate(64).unwrap().unwrap();

  assert_eq!(
    via_realloc.as_ptr() as usize - heap.heap_lo() as usize,
    via_alloc.as_ptr() as usize - other.heap_lo() as usize
  );
  heap.check().unwrap();
}

#[test]
fn test_realloc_preserves_prefix() {
  let mut heap = heap();

  let p = allocate(&mut heap, 40);
  fill(p, 40, 3);

  let grown = unsafe { heap.reallocate(Some(p), 300) }.unwrap().unwrap();
  heap.check().unwrap();
  assert!(holds(grown, 40, 3));

  let shrunk = unsafe { heap.reallocate(Some(grown), 10) }.unwrap().unwrap();
  heap.check().unwrap();
  assert!(holds(shrunk, 10, 3));
}

#[test]
fn test_exhaustion_is_recoverable() {
  let arena = MmapArena::new(8192).unwrap();
  let mut heap = Heap::with_config(arena, HeapConfig { chunk_size: 512 }).unwrap();

  let mut live = Vec::new();
  let err = loop {
    match heap.allocate(1000) {
      Ok(ptr) => live.push(ptr.unwrap()),
      Err(err) => break err,
    }
  };

  assert!(matches!(err, AllocError::OutOfMemory { size: 1000, .. }));
  assert!(!live.is_empty());
  heap.check().unwrap();

  for ptr in live {
    deallocate(&mut heap, ptr);
  }
  assert_eq!(heap.free_blocks().count(), 1);
  allocate(&mut heap, 4000);
}

#[test]
fn test_random_workload_keeps_invariants() {
  let mut heap = heap();
  let mut rng = Lcg(0x5eed);
  let mut live: Vec<(NonNull<u8>, usize, u8)> = Vec::new();

  for round in 0..2000 {
    match rng.below(10) {
      0..=4 => {
        let size = 1 + rng.below(512);
        let ptr = heap.allocate(size).unwrap().unwrap();
        assert_eq!(ptr.as_ptr() as usize % 8, 0);
        let seed = round as u8;
        fill(ptr, size, seed);
        live.push((ptr, size, seed));
      }
      5..=7 if !live.is_empty() => {
        let (ptr, size, seed) = live.swap_remove(rng.below(live.len() as u64));
        assert!(holds(ptr, size, seed));
        unsafe { heap.deallocate(ptr) };
      }
      8..=9 if !live.is_empty() => {
        let index = rng.below(live.len() as u64);
        let (ptr, size, seed) = live[index];
        let new_size = 1 + rng.below(1024);
        let moved = unsafe { heap.reallocate(Some(ptr), new_size) }.unwrap().unwrap();
        assert!(holds(moved, size.min(new_size), seed));
        fill(moved, new_size, seed);
        live[index] = (moved, new_size, seed);
      }
      _ => {}
    }

    if round % 50 == 0 {
      heap.check().unwrap();
    }
  }

  heap.check().unwrap();

  // Every live allocation is still intact and disjoint from the others.
  let mut spans: Vec<(usize, usize)> = live
    .iter()
    .map(|&(ptr, size, _)| (ptr.as_ptr() as usize, size))
    .collect();
  spans.sort();
  for pair in spans.windows(2) {
    assert!(pair[0].0 + pair[0].1 <= pair[1].0);
  }
  for &(ptr, size, seed) in &live {
    assert!(holds(ptr, size, seed));
  }

  // No two physical neighbors are free, and the free list is exactly the free blocks.
  let blocks: Vec<BlockInfo> = heap.blocks().collect();
  for pair in blocks.windows(2) {
    assert!(pair[0].allocated || pair[1].allocated);
  }
  let mut free_in_heap: Vec<_> = blocks
    .iter()
    .filter(|b| !b.allocated)
    .map(|b| b.payload)
    .collect();
  let mut free_in_list: Vec<_> = heap.free_blocks().map(|b| b.payload).collect();
  free_in_heap.sort();
  free_in_list.sort();
  assert_eq!(free_in_heap, free_in_list);

  for (ptr, _, _) in live {
    unsafe { heap.deallocate(ptr) };
  }
  heap.check().unwrap();
  assert_eq!(heap.blocks().count(), 1);
}

#[test]
fn test_heap_behind_mutex_moves_across_threads() {
  let shared = Arc::new(Mutex::new(heap()));

  let worker = {
    let shared = Arc::clone(&shared);
    thread::spawn(move || {
      let mut heap = shared.lock().unwrap();
      let ptr = heap.allocate(128).unwrap().unwrap();
      fill(ptr, 128, 9);
      ptr.as_ptr() as usize - heap.heap_lo() as usize
    })
  };
  let offset = worker.join().unwrap();

  let mut heap = shared.lock().unwrap();
  let ptr = NonNull::new(heap.heap_lo().wrapping_add(offset) as *mut u8).unwrap();
  assert!(holds(ptr, 128, 9));
  deallocate(&mut heap, ptr);
  assert_eq!(heap.free_blocks().count(), 1);
}

#[test]
fn test_foreign_pointers_are_rejected() {
  let mut other = heap();
  let mut heap = heap();
  let p = allocate(&mut heap, 64);
  let stranger = allocate(&mut other, 64);
  let before: Vec<BlockInfo> = heap.blocks().collect();

  deallocate(&mut heap, stranger);
  assert_eq!(heap.blocks().collect::<Vec<_>>(), before);

  let err = unsafe { heap.reallocate(Some(stranger), 32) }.unwrap_err();
  assert!(matches!(
    err,
    AllocError::ForeignPointer { address } if address == stranger.as_ptr() as usize
  ));
  heap.check().unwrap();
  assert_eq!(heap.blocks().collect::<Vec<_>>(), before);
  assert!(heap.blocks().any(|info| info.payload == p && info.allocated));
}
