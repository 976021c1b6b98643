/// Header and footer word size (bytes).
pub const WSIZE: usize = 4;

/// Double word size, also the payload alignment (bytes).
pub const DSIZE: usize = 8;

/// Smallest block: header, footer and the two free-list links.
pub const MIN_BLOCK_SIZE: usize = 2 * DSIZE;

/// Default amount the heap grows by when no free block fits.
pub const CHUNK_SIZE: usize = 1 << 8;

/// Rounds the given size up to the next multiple of [`DSIZE`].
///
/// # Examples
///
/// ```rust
/// use tagalloc::align;
///
/// assert_eq!(align!(13), 16);
/// assert_eq!(align!(16), 16);
/// assert_eq!(align!(1), 8);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    ($value + $crate::align::DSIZE - 1) & !($crate::align::DSIZE - 1)
  };
}

/// Computes the block size needed to serve a `size`-byte request.
///
/// Adds header and footer overhead, rounds up to alignment and promotes
/// tiny requests to [`MIN_BLOCK_SIZE`]. Returns `None` when the result does
/// not fit in a boundary tag.
pub fn adjusted_size(size: usize) -> Option<usize> {
  if size <= DSIZE {
    return Some(MIN_BLOCK_SIZE);
  }

  let padded = size.checked_add(2 * DSIZE - 1)?;
  let adjusted = DSIZE * (padded / DSIZE);

  (adjusted <= u32::MAX as usize).then_some(adjusted)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_align() {
    let mut alignments = Vec::new();

    for i in 0..10 {
      let sizes = (DSIZE * i + 1)..=(DSIZE * (i + 1));

      let expected_alignment = DSIZE * (i + 1);

      alignments.push((sizes, expected_alignment));
    }

    for (sizes, expected) in alignments {
      for size in sizes {
        assert_eq!(expected, align!(size));
      }
    }
  }

  #[test]
  fn test_adjusted_size_minimum() {
    for size in 0..=DSIZE {
      assert_eq!(adjusted_size(size), Some(MIN_BLOCK_SIZE));
    }
  }

  #[test]
  fn test_adjusted_size_adds_overhead() {
    assert_eq!(adjusted_size(9), Some(24));
    assert_eq!(adjusted_size(16), Some(24));
    assert_eq!(adjusted_size(17), Some(32));
    assert_eq!(adjusted_size(24), Some(32));
    assert_eq!(adjusted_size(100), Some(112));
    assert_eq!(adjusted_size(200), Some(208));
  }

  #[test]
  fn test_adjusted_size_overflow() {
    assert_eq!(adjusted_size(usize::MAX), None);
    assert_eq!(adjusted_size(u32::MAX as usize), None);
  }
}
