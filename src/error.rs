use thiserror::Error;

/// Failures reported by a [`HeapProvider`](crate::HeapProvider).
#[derive(Debug, Error)]
pub enum ExtendError {
  #[error("heap limit reached (requested: {requested} bytes, available: {available} bytes)")]
  Exhausted { requested: usize, available: usize },

  #[error("heap extension landed at {actual:#x}, expected {expected:#x}")]
  Discontiguous { expected: usize, actual: usize },

  #[error("heap base {address:#x} is not 8-byte aligned")]
  Misaligned { address: usize },

  #[error("heap would exceed {limit} bytes")]
  TooLarge { limit: usize },

  #[error("system call failed: {0}")]
  Os(#[from] std::io::Error),
}

/// Allocator errors.
#[derive(Debug, Error)]
pub enum AllocError {
  #[error("failed to create the initial heap")]
  Init(#[source] ExtendError),

  #[error("out of memory (requested: {size} bytes)")]
  OutOfMemory {
    size: usize,
    #[source]
    source: Option<ExtendError>,
  },

  #[error("pointer {address:#x} does not belong to this heap")]
  ForeignPointer { address: usize },

  #[error("heap corrupted at offset {offset}: {reason}")]
  Corrupt { offset: usize, reason: &'static str },
}

pub type Result<T> = core::result::Result<T, AllocError>;

#[cfg(test)]
mod tests {
  use std::error::Error as _;

  use super::*;

  #[test]
  fn test_out_of_memory_keeps_provider_cause() {
    let err = AllocError::OutOfMemory {
      size: 4096,
      source: Some(ExtendError::Exhausted {
        requested: 4112,
        available: 100,
      }),
    };

    assert_eq!(err.to_string(), "out of memory (requested: 4096 bytes)");
    assert_eq!(
      err.source().map(ToString::to_string).as_deref(),
      Some("heap limit reached (requested: 4112 bytes, available: 100 bytes)")
    );
  }

  #[test]
  fn test_unencodable_request_has_no_cause() {
    let err = AllocError::OutOfMemory {
      size: usize::MAX,
      source: None,
    };

    assert!(err.source().is_none());
  }
}
