use std::ptr::{self, NonNull};

use crate::align::{DSIZE, WSIZE};

/// Boundary tag word: block size with the allocation flag in the low bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tag(u32);

impl Tag {
  const ALLOCATED: u32 = 0x1;
  const FLAGS: u32 = 0x7;

  pub fn pack(
    size: usize,
    allocated: bool,
  ) -> Self {
    debug_assert_eq!(size % DSIZE, 0, "block size {size} is not aligned");
    debug_assert!(size <= u32::MAX as usize);

    Self(size as u32 | if allocated { Self::ALLOCATED } else { 0 })
  }

  pub fn from_raw(word: u32) -> Self {
    Self(word)
  }

  pub fn raw(self) -> u32 {
    self.0
  }

  pub fn size(self) -> usize {
    (self.0 & !Self::FLAGS) as usize
  }

  pub fn is_allocated(self) -> bool {
    self.0 & Self::ALLOCATED != 0
  }

  pub fn unpack(self) -> (usize, bool) {
    (self.size(), self.is_allocated())
  }
}

/// A block identified by the offset of its payload from the heap base.
///
/// Offset `0` is never a payload (the padding word lives there), so it
/// doubles as the null link inside free blocks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Block(u32);

impl Block {
  /// The prologue's payload, whose two link slots hold the free-list root.
  pub const ROOT: Block = Block((2 * WSIZE) as u32);

  pub fn new(offset: usize) -> Self {
    debug_assert!(offset <= u32::MAX as usize);
    Self(offset as u32)
  }

  pub fn offset(self) -> usize {
    self.0 as usize
  }

  fn from_link(link: u32) -> Option<Self> {
    (link != 0).then_some(Self(link))
  }

  fn to_link(block: Option<Self>) -> u32 {
    block.map_or(0, |b| b.0)
  }
}

/// View over the managed memory, `[base, base + len)`.
///
/// Every read and write of heap metadata goes through here. Word accesses
/// are bounds checked, so a corrupted tag can at worst produce a panic,
/// never an access outside the region.
#[derive(Debug)]
pub struct Region {
  base: NonNull<u8>,
  len: usize,
}

// A Region is the sole view over its span; moving it moves that access.
unsafe impl Send for Region {}

impl Region {
  /// # Safety
  ///
  /// `base` must be 8-byte aligned and valid for reads and writes of `len`
  /// bytes for as long as the region is used.
  pub unsafe fn new(
    base: NonNull<u8>,
    len: usize,
  ) -> Self {
    debug_assert_eq!(base.as_ptr() as usize % DSIZE, 0);
    Self { base, len }
  }

  /// Extends the view by `bytes` bytes at the high end.
  ///
  /// # Safety
  ///
  /// The `bytes` bytes right after the current end must be valid for reads
  /// and writes, like the rest of the region.
  pub unsafe fn grow(
    &mut self,
    bytes: usize,
  ) {
    self.len += bytes;
  }

  pub fn base(&self) -> NonNull<u8> {
    self.base
  }

  pub fn len(&self) -> usize {
    self.len
  }

  pub fn read_word(
    &self,
    offset: usize,
  ) -> u32 {
    self.check_word(offset);
    unsafe { self.base.as_ptr().add(offset).cast::<u32>().read() }
  }

  pub fn write_word(
    &mut self,
    offset: usize,
    value: u32,
  ) {
    self.check_word(offset);
    unsafe { self.base.as_ptr().add(offset).cast::<u32>().write(value) }
  }

  fn check_word(
    &self,
    offset: usize,
  ) {
    assert!(
      offset % WSIZE == 0 && offset + WSIZE <= self.len,
      "word at offset {offset} outside heap of {} bytes",
      self.len
    );
  }

  /// Client pointer for a block's payload.
  pub fn payload(
    &self,
    block: Block,
  ) -> NonNull<u8> {
    debug_assert!(block.offset() < self.len);
    unsafe { self.base.add(block.offset()) }
  }

  /// Maps a client pointer back to its block, if it points inside the region.
  pub fn block_of(
    &self,
    ptr: NonNull<u8>,
  ) -> Option<Block> {
    let offset = (ptr.as_ptr() as usize).checked_sub(self.base.as_ptr() as usize)?;

    (offset >= DSIZE && offset < self.len && offset % DSIZE == 0).then(|| Block::new(offset))
  }

  pub fn header_of(
    &self,
    block: Block,
  ) -> usize {
    block.offset() - WSIZE
  }

  /// Footer position; depends on the size currently encoded in the header.
  pub fn footer_of(
    &self,
    block: Block,
  ) -> usize {
    block.offset() + self.header(block).size() - DSIZE
  }

  pub fn header(
    &self,
    block: Block,
  ) -> Tag {
    Tag::from_raw(self.read_word(self.header_of(block)))
  }

  pub fn footer(
    &self,
    block: Block,
  ) -> Tag {
    Tag::from_raw(self.read_word(self.footer_of(block)))
  }

  pub fn size(
    &self,
    block: Block,
  ) -> usize {
    self.header(block).size()
  }

  pub fn is_allocated(
    &self,
    block: Block,
  ) -> bool {
    self.header(block).is_allocated()
  }

  /// Rewrites header then footer; the footer lands where the new size says.
  pub fn set_tags(
    &mut self,
    block: Block,
    size: usize,
    allocated: bool,
  ) {
    let tag = Tag::pack(size, allocated);

    self.write_word(self.header_of(block), tag.raw());
    self.write_word(self.footer_of(block), tag.raw());
  }

  /// Writes the zero-size allocated sentinel at the very end of the heap.
  pub fn set_epilogue(&mut self) {
    let offset = self.len - WSIZE;
    self.write_word(offset, Tag::pack(0, true).raw());
  }

  pub fn next_block(
    &self,
    block: Block,
  ) -> Block {
    Block::new(block.offset() + self.size(block))
  }

  /// Previous block, found through the size in its footer.
  pub fn prev_block(
    &self,
    block: Block,
  ) -> Block {
    let prev_footer = Tag::from_raw(self.read_word(block.offset() - DSIZE));
    Block::new(block.offset() - prev_footer.size())
  }

  pub fn next_link(
    &self,
    block: Block,
  ) -> Option<Block> {
    Block::from_link(self.read_word(block.offset()))
  }

  pub fn prev_link(
    &self,
    block: Block,
  ) -> Option<Block> {
    Block::from_link(self.read_word(block.offset() + WSIZE))
  }

  pub fn set_next_link(
    &mut self,
    block: Block,
    next: Option<Block>,
  ) {
    self.write_word(block.offset(), Block::to_link(next));
  }

  pub fn set_prev_link(
    &mut self,
    block: Block,
    prev: Option<Block>,
  ) {
    self.write_word(block.offset() + WSIZE, Block::to_link(prev));
  }

  /// Copies `count` payload bytes between two distinct blocks.
  pub fn copy_payload(
    &mut self,
    from: Block,
    to: Block,
    count: usize,
  ) {
    assert!(from.offset() + count <= self.len && to.offset() + count <= self.len);
    debug_assert!(from.offset() + count <= to.offset() || to.offset() + count <= from.offset());

    unsafe {
      ptr::copy_nonoverlapping(
        self.payload(from).as_ptr(),
        self.payload(to).as_ptr(),
        count,
      );
    }
  }
}
