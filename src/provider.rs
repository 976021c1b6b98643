use std::{io, ptr::{self, NonNull}};

use libc::{c_void, intptr_t, sbrk};
use log::debug;

use crate::{align, error::ExtendError};

/// Source of the raw memory a [`Heap`](crate::Heap) manages.
///
/// The first call to [`extend`](HeapProvider::extend) returns the 8-byte
/// aligned heap base; every later call returns the previous end, so the heap
/// is one contiguous span. Fresh memory reads as zero. Memory is never
/// handed back.
pub trait HeapProvider {
  fn extend(
    &mut self,
    bytes: usize,
  ) -> Result<NonNull<u8>, ExtendError>;
}

/// Fixed-capacity heap backed by one anonymous private mapping.
///
/// The whole capacity is reserved up front and handed out by moving a break
/// offset, so running past the capacity behaves like hitting the platform
/// memory limit.
#[derive(Debug)]
pub struct MmapArena {
  base: NonNull<u8>,
  mapped: usize,
  capacity: usize,
  brk: usize,
}

impl MmapArena {
  pub const DEFAULT_CAPACITY: usize = 20 * (1 << 20);

  pub fn new(capacity: usize) -> Result<Self, ExtendError> {
    let mapped = capacity.max(1);

    let address = unsafe {
      libc::mmap(
        ptr::null_mut(),
        mapped,
        libc::PROT_READ | libc::PROT_WRITE,
        libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_NORESERVE,
        -1,
        0,
      )
    };

    if address == libc::MAP_FAILED {
      return Err(io::Error::last_os_error().into());
    }

    let base = NonNull::new(address.cast::<u8>())
      .ok_or_else(|| io::Error::from(io::ErrorKind::OutOfMemory))?;

    debug!("mapped {} byte arena at {:?}", capacity, base);

    Ok(Self {
      base,
      mapped,
      capacity,
      brk: 0,
    })
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// Bytes handed out so far.
  pub fn used(&self) -> usize {
    self.brk
  }
}

impl HeapProvider for MmapArena {
  fn extend(
    &mut self,
    bytes: usize,
  ) -> Result<NonNull<u8>, ExtendError> {
    let available = self.capacity - self.brk;

    if bytes > available {
      return Err(ExtendError::Exhausted {
        requested: bytes,
        available,
      });
    }

    let address = unsafe { self.base.add(self.brk) };
    self.brk += bytes;

    Ok(address)
  }
}

// The arena owns its mapping outright.
unsafe impl Send for MmapArena {}

impl Drop for MmapArena {
  fn drop(&mut self) {
    unsafe {
      libc::munmap(self.base.as_ptr().cast::<c_void>(), self.mapped);
    }
  }
}

/// Grows the process data segment with `sbrk(2)`.
///
/// Anything else moving the program break between two extensions breaks
/// contiguity; that is reported as [`ExtendError::Discontiguous`] and the
/// stray span is left behind.
#[derive(Debug, Default)]
pub struct Sbrk {
  end: Option<NonNull<u8>>,
}

impl Sbrk {
  pub fn new() -> Self {
    Self::default()
  }

  /// Current program break, `sbrk(0)`.
  pub fn program_break() -> *mut u8 {
    unsafe { sbrk(0) as *mut u8 }
  }

  fn bump(increment: usize) -> Result<*mut u8, ExtendError> {
    let increment = intptr_t::try_from(increment).map_err(|_| ExtendError::Exhausted {
      requested: increment,
      available: intptr_t::MAX as usize,
    })?;

    let address = unsafe { sbrk(increment) };

    if address == usize::MAX as *mut c_void {
      return Err(io::Error::last_os_error().into());
    }

    Ok(address as *mut u8)
  }
}

// `end` is only compared against the program break, never dereferenced.
unsafe impl Send for Sbrk {}

impl HeapProvider for Sbrk {
  fn extend(
    &mut self,
    bytes: usize,
  ) -> Result<NonNull<u8>, ExtendError> {
    let start = match self.end {
      Some(end) => {
        let address = Self::bump(bytes)?;

        if address != end.as_ptr() {
          return Err(ExtendError::Discontiguous {
            expected: end.as_ptr() as usize,
            actual: address as usize,
          });
        }

        address
      }
      None => {
        let current = Self::program_break() as usize;
        let padding = align!(current) - current;
        let address = Self::bump(padding + bytes)?;

        debug!("sbrk heap starts at {:?} (padding {})", address, padding);

        unsafe { address.add(padding) }
      }
    };

    let start = NonNull::new(start).ok_or_else(|| io::Error::from(io::ErrorKind::OutOfMemory))?;
    self.end = Some(unsafe { start.add(bytes) });

    Ok(start)
  }
}
