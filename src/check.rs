//! Heap consistency validator.
//!
//! Nothing on the allocation path relies on it; it exists to catch
//! metadata corruption early in tests and debug builds.

use std::collections::HashSet;

use crate::{
  align::{DSIZE, MIN_BLOCK_SIZE, WSIZE},
  block::{Block, Region, Tag},
  error::{AllocError, Result},
  free_list::FreeList,
};

fn corrupt(
  block: Block,
  reason: &'static str,
) -> AllocError {
  AllocError::Corrupt {
    offset: block.offset(),
    reason,
  }
}

/// Walks the heap in address order and then the free list, checking:
///
/// - prologue and epilogue are intact,
/// - every block is aligned, at least [`MIN_BLOCK_SIZE`] and inside the heap,
/// - header and footer agree,
/// - no two neighbors are both free,
/// - list links stay inside the heap and `prev` mirrors `next`,
/// - the list holds each free block exactly once and nothing else.
pub fn check(
  region: &Region,
  list: &FreeList,
) -> Result<()> {
  let root = list.root();
  let prologue = Tag::pack(MIN_BLOCK_SIZE, true);

  if region.header(root) != prologue || region.footer(root) != prologue {
    return Err(corrupt(root, "prologue damaged"));
  }

  let mut free = HashSet::new();
  let mut prev_free = false;
  let mut block = region.next_block(root);

  loop {
    if block.offset() > region.len() {
      return Err(corrupt(block, "block runs past the heap end"));
    }

    let (size, allocated) = region.header(block).unpack();

    if size == 0 {
      break;
    }

    if block.offset() % DSIZE != 0 {
      return Err(corrupt(block, "payload not aligned"));
    }

    if size < MIN_BLOCK_SIZE {
      return Err(corrupt(block, "block smaller than minimum"));
    }

    if block.offset() + size > region.len() {
      return Err(corrupt(block, "block runs past the heap end"));
    }

    if region.header(block) != region.footer(block) {
      return Err(corrupt(block, "header and footer differ"));
    }

    if !allocated {
      if prev_free {
        return Err(corrupt(block, "two adjacent free blocks"));
      }
      free.insert(block);
    }

    prev_free = !allocated;
    block = region.next_block(block);
  }

  if block.offset() != region.len() || !region.header(block).is_allocated() {
    return Err(corrupt(block, "epilogue not at the heap end"));
  }

  let mut seen = HashSet::new();
  let mut expected_prev = None;
  let mut current = list.head(region);

  while let Some(block) = current {
    let in_bounds = block.offset() >= root.offset() + MIN_BLOCK_SIZE
      && block.offset() + MIN_BLOCK_SIZE - WSIZE <= region.len();

    if !in_bounds || block.offset() % DSIZE != 0 {
      return Err(corrupt(block, "free list link outside the heap"));
    }

    if !seen.insert(block) {
      return Err(corrupt(block, "free list cycle"));
    }

    if !free.contains(&block) {
      return Err(corrupt(block, "free list entry is not a free block"));
    }

    if region.prev_link(block) != expected_prev {
      return Err(corrupt(block, "free list prev link broken"));
    }

    expected_prev = Some(block);
    current = region.next_link(block);
  }

  if let Some(&missing) = free.difference(&seen).min() {
    return Err(corrupt(missing, "free block missing from the free list"));
  }

  Ok(())
}
