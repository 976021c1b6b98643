use crate::block::{Block, Region};

/// Explicit, LIFO-ordered list of free blocks.
///
/// The links live inside the free blocks themselves. The list head is the
/// `next` slot of the root, which is the prologue's payload; the root is
/// never a member, so the head's `prev` is null rather than the root.
#[derive(Clone, Copy, Debug)]
pub struct FreeList {
  root: Block,
}

impl FreeList {
  pub fn new(root: Block) -> Self {
    Self { root }
  }

  pub fn root(&self) -> Block {
    self.root
  }

  pub fn head(
    &self,
    region: &Region,
  ) -> Option<Block> {
    region.next_link(self.root)
  }

  fn set_head(
    &self,
    region: &mut Region,
    head: Option<Block>,
  ) {
    region.set_next_link(self.root, head);
  }

  /// Clears the root so the list is empty.
  pub fn reset(
    &self,
    region: &mut Region,
  ) {
    region.set_next_link(self.root, None);
    region.set_prev_link(self.root, None);
  }

  /// Pushes `block` at the head.
  pub fn insert_front(
    &self,
    region: &mut Region,
    block: Block,
  ) {
    let head = self.head(region);

    if let Some(head) = head {
      region.set_prev_link(head, Some(block));
    }

    region.set_next_link(block, head);
    region.set_prev_link(block, None);
    self.set_head(region, Some(block));
  }

  /// Unlinks `block` from wherever it sits.
  pub fn remove(
    &self,
    region: &mut Region,
    block: Block,
  ) {
    let prev = region.prev_link(block);
    let next = region.next_link(block);

    match (prev, next) {
      (Some(prev), Some(next)) => {
        region.set_next_link(prev, Some(next));
        region.set_prev_link(next, Some(prev));
      }
      (None, Some(next)) => {
        self.set_head(region, Some(next));
        region.set_prev_link(next, None);
      }
      (Some(prev), None) => {
        region.set_next_link(prev, None);
      }
      (None, None) => {
        self.set_head(region, None);
      }
    }
  }

  /// Puts `replacement` in the list slot held by `block`.
  ///
  /// Used when splitting: the remainder takes over the original block's
  /// position instead of going to the head. Both links are read before any
  /// write, as `replacement` starts inside what used to be `block`.
  pub fn replace(
    &self,
    region: &mut Region,
    block: Block,
    replacement: Block,
  ) {
    let prev = region.prev_link(block);
    let next = region.next_link(block);

    match prev {
      Some(prev) => region.set_next_link(prev, Some(replacement)),
      None => self.set_head(region, Some(replacement)),
    }

    if let Some(next) = next {
      region.set_prev_link(next, Some(replacement));
    }

    region.set_next_link(replacement, next);
    region.set_prev_link(replacement, prev);
  }

  /// First-fit search: the first block in list order of at least `size` bytes.
  pub fn find_fit(
    &self,
    region: &Region,
    size: usize,
  ) -> Option<Block> {
    self.iter(region).find(|&block| region.size(block) >= size)
  }

  pub fn iter<'r>(
    &self,
    region: &'r Region,
  ) -> Iter<'r> {
    Iter {
      region,
      current: self.head(region),
    }
  }
}

/// Walks the list following `next` links.
pub struct Iter<'r> {
  region: &'r Region,
  current: Option<Block>,
}

impl Iterator for Iter<'_> {
  type Item = Block;

  fn next(&mut self) -> Option<Block> {
    let block = self.current?;
    self.current = self.region.next_link(block);
    Some(block)
  }
}
