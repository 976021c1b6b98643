use log::trace;

use crate::{
  block::{Block, Region},
  free_list::FreeList,
};

/// Merges a free, unlisted `block` with whichever physical neighbors are free.
///
/// The merged block is inserted at the head of `list` exactly once and
/// returned; its payload moves back to the predecessor's when that one was
/// absorbed. The prologue and epilogue are always allocated, so both
/// neighbors exist for every real block.
pub fn coalesce(
  region: &mut Region,
  list: &FreeList,
  block: Block,
) -> Block {
  let prev = region.prev_block(block);
  let next = region.next_block(block);
  let prev_allocated = region.footer(prev).is_allocated();
  let next_allocated = region.is_allocated(next);
  let mut size = region.size(block);

  let merged = match (prev_allocated, next_allocated) {
    (true, true) => block,
    (true, false) => {
      size += region.size(next);
      list.remove(region, next);
      block
    }
    (false, true) => {
      size += region.size(prev);
      list.remove(region, prev);
      prev
    }
    (false, false) => {
      size += region.size(prev) + region.size(next);
      list.remove(region, prev);
      list.remove(region, next);
      prev
    }
  };

  trace!(
    "coalesce block {} -> block {} ({} bytes)",
    block.offset(),
    merged.offset(),
    size
  );

  region.set_tags(merged, size, false);
  list.insert_front(region, merged);

  merged
}
