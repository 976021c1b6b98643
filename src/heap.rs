use std::ptr::NonNull;

use log::{debug, trace, warn};

use crate::{
  align,
  align::{CHUNK_SIZE, DSIZE, MIN_BLOCK_SIZE, WSIZE, adjusted_size},
  block::{Block, Region},
  check,
  coalesce::coalesce,
  error::{AllocError, ExtendError, Result},
  free_list::FreeList,
  provider::HeapProvider,
};

/// Bytes laid down by `init` before the first extension: padding word,
/// prologue header, root next, root prev, prologue footer, epilogue header.
const PROLOGUE_SIZE: usize = 6 * WSIZE;

/// Tuning knobs for a [`Heap`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeapConfig {
  /// Minimum number of bytes requested from the provider per extension.
  pub chunk_size: usize,
}

impl Default for HeapConfig {
  fn default() -> Self {
    Self {
      chunk_size: CHUNK_SIZE,
    }
  }
}

impl HeapConfig {
  fn chunk(&self) -> usize {
    align!(self.chunk_size.min(u32::MAX as usize / 2)).max(MIN_BLOCK_SIZE)
  }
}

/// A block as seen from outside the allocator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockInfo {
  pub payload: NonNull<u8>,
  /// Whole block size, header and footer included.
  pub size: usize,
  pub allocated: bool,
}

/// Explicit free-list allocator over memory from a [`HeapProvider`].
///
/// Not thread-safe: every operation takes `&mut self`. The heap is `Send`
/// whenever `P` is, so a `Mutex<Heap<P>>` can be shared between threads.
pub struct Heap<P: HeapProvider> {
  provider: P,
  pub(crate) region: Region,
  pub(crate) list: FreeList,
  chunk_size: usize,
}

impl<P: HeapProvider> Heap<P> {
  /// Builds a heap with the default chunk size.
  pub fn init(provider: P) -> Result<Self> {
    Self::with_config(provider, HeapConfig::default())
  }

  /// Lays down the prologue and epilogue, then grows the heap by one chunk.
  ///
  /// On success the free list holds exactly one block, the fresh chunk.
  pub fn with_config(
    mut provider: P,
    config: HeapConfig,
  ) -> Result<Self> {
    let base = provider.extend(PROLOGUE_SIZE).map_err(AllocError::Init)?;

    if base.as_ptr() as usize % DSIZE != 0 {
      return Err(AllocError::Init(ExtendError::Misaligned {
        address: base.as_ptr() as usize,
      }));
    }

    let mut region = unsafe { Region::new(base, PROLOGUE_SIZE) };
    let list = FreeList::new(Block::ROOT);

    region.write_word(0, 0);
    region.set_tags(list.root(), MIN_BLOCK_SIZE, true);
    list.reset(&mut region);
    region.set_epilogue();

    let mut heap = Self {
      provider,
      region,
      list,
      chunk_size: config.chunk(),
    };

    heap.extend(heap.chunk_size).map_err(AllocError::Init)?;

    debug!(
      "heap initialized at {:?} ({} bytes, chunk {})",
      heap.region.base(),
      heap.region.len(),
      heap.chunk_size
    );

    Ok(heap)
  }

  /// Grows the heap by `bytes` (rounded to alignment) and returns the free
  /// block covering the new space, merged with a trailing free block if any.
  fn extend(
    &mut self,
    bytes: usize,
  ) -> core::result::Result<Block, ExtendError> {
    let size = align!(bytes);
    let old_len = self.region.len();

    if size > u32::MAX as usize - old_len {
      return Err(ExtendError::TooLarge {
        limit: u32::MAX as usize,
      });
    }

    let span = self.provider.extend(size)?;
    let expected = self.region.base().as_ptr() as usize + old_len;

    if span.as_ptr() as usize != expected {
      return Err(ExtendError::Discontiguous {
        expected,
        actual: span.as_ptr() as usize,
      });
    }

    unsafe { self.region.grow(size) };

    // The new block's header overwrites the old epilogue.
    let block = Block::new(old_len);
    self.region.set_tags(block, size, false);
    self.region.set_epilogue();

    debug!("heap extended by {} bytes to {}", size, self.region.len());

    Ok(coalesce(&mut self.region, &self.list, block))
  }

  /// Allocates at least `size` bytes, 8-byte aligned.
  ///
  /// Returns `Ok(None)` for a zero-size request. When the provider cannot
  /// grow the heap the error is returned and the heap stays usable.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Result<Option<NonNull<u8>>> {
    let block = self.allocate_block(size)?;

    Ok(block.map(|block| self.region.payload(block)))
  }

  fn allocate_block(
    &mut self,
    size: usize,
  ) -> Result<Option<Block>> {
    if size == 0 {
      return Ok(None);
    }

    let asize = adjusted_size(size).ok_or(AllocError::OutOfMemory { size, source: None })?;

    let block = match self.list.find_fit(&self.region, asize) {
      Some(block) => block,
      None => self.extend(asize.max(self.chunk_size)).map_err(|source| {
        warn!("allocation of {} bytes failed: {}", size, source);
        AllocError::OutOfMemory {
          size,
          source: Some(source),
        }
      })?,
    };

    self.place(block, asize);

    trace!("allocate({}) -> block {} ({} bytes)", size, block.offset(), asize);

    Ok(Some(block))
  }

  /// Marks the listed free `block` allocated with `asize` bytes, splitting
  /// off the tail when it is big enough to be a block of its own.
  fn place(
    &mut self,
    block: Block,
    asize: usize,
  ) {
    let csize = self.region.size(block);

    if csize - asize >= MIN_BLOCK_SIZE {
      self.region.set_tags(block, asize, true);

      let remainder = self.region.next_block(block);
      self.region.set_tags(remainder, csize - asize, false);
      self.list.replace(&mut self.region, block, remainder);

      trace!(
        "split block {}: {} allocated, {} left at {}",
        block.offset(),
        asize,
        csize - asize,
        remainder.offset()
      );
    } else {
      self.list.remove(&mut self.region, block);
      self.region.set_tags(block, csize, true);
    }
  }

  /// Frees a block, merging it with free neighbors.
  ///
  /// # Safety
  ///
  /// `ptr` must come from [`allocate`](Self::allocate) or
  /// [`reallocate`](Self::reallocate) on this heap and must not have been
  /// freed since.
  pub unsafe fn deallocate(
    &mut self,
    ptr: NonNull<u8>,
  ) {
    let Some(block) = self.region.block_of(ptr) else {
      warn!("deallocate of foreign pointer {:?} ignored", ptr);
      return;
    };

    let size = self.region.size(block);
    self.region.set_tags(block, size, false);

    trace!("deallocate block {} ({} bytes)", block.offset(), size);

    coalesce(&mut self.region, &self.list, block);
  }

  /// Moves an allocation to a fresh block of at least `size` bytes.
  ///
  /// `None` behaves like [`allocate`](Self::allocate); a zero `size` frees
  /// `ptr` and returns `Ok(None)`. On failure `ptr` is left untouched. A
  /// pointer outside the heap is refused with [`AllocError::ForeignPointer`].
  ///
  /// # Safety
  ///
  /// Same contract as [`deallocate`](Self::deallocate) for a `Some` pointer.
  pub unsafe fn reallocate(
    &mut self,
    ptr: Option<NonNull<u8>>,
    size: usize,
  ) -> Result<Option<NonNull<u8>>> {
    let Some(ptr) = ptr else {
      return self.allocate(size);
    };

    if size == 0 {
      unsafe { self.deallocate(ptr) };
      return Ok(None);
    }

    let Some(old) = self.region.block_of(ptr) else {
      warn!("reallocate of foreign pointer {:?} refused", ptr);
      return Err(AllocError::ForeignPointer {
        address: ptr.as_ptr() as usize,
      });
    };

    let Some(new) = self.allocate_block(size)? else {
      return Ok(None);
    };

    let count = (self.region.size(old) - DSIZE).min(align!(size));
    self.region.copy_payload(old, new, count);

    trace!(
      "reallocate block {} -> block {} ({} bytes copied)",
      old.offset(),
      new.offset(),
      count
    );

    unsafe { self.deallocate(ptr) };

    Ok(Some(self.region.payload(new)))
  }

  /// Walks the whole heap and free list, reporting the first broken invariant
  /// as [`AllocError::Corrupt`].
  pub fn check(&self) -> Result<()> {
    check::check(&self.region, &self.list)
  }

  /// Every real block in address order, prologue and epilogue excluded.
  pub fn blocks(&self) -> impl Iterator<Item = BlockInfo> + '_ {
    let first = self.region.next_block(self.list.root());

    std::iter::successors(Some(first), |&block| Some(self.region.next_block(block)))
      .take_while(|&block| self.region.size(block) > 0)
      .map(|block| self.info(block))
  }

  /// Free blocks in list order, most recently freed first.
  pub fn free_blocks(&self) -> impl Iterator<Item = BlockInfo> + '_ {
    self.list.iter(&self.region).map(|block| self.info(block))
  }

  fn info(
    &self,
    block: Block,
  ) -> BlockInfo {
    let (size, allocated) = self.region.header(block).unpack();

    BlockInfo {
      payload: self.region.payload(block),
      size,
      allocated,
    }
  }

  /// Total bytes obtained from the provider.
  pub fn heap_size(&self) -> usize {
    self.region.len()
  }

  /// First byte of the heap.
  pub fn heap_lo(&self) -> *const u8 {
    self.region.base().as_ptr()
  }

  /// Last byte of the heap.
  pub fn heap_hi(&self) -> *const u8 {
    self.heap_lo().wrapping_add(self.region.len() - 1)
  }

  pub fn provider(&self) -> &P {
    &self.provider
  }
}
