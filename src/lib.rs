//! # tagalloc - A Boundary-Tag Memory Allocator Library
//!
//! This crate provides an **explicit free-list allocator** with boundary tags,
//! first-fit search and immediate coalescing, running over a single heap that
//! only ever grows at its high end.
//!
//! ## Overview
//!
//! Every block carries its size and allocation bit twice, in a header word
//! before the payload and in a footer word at its end. Free blocks reuse their
//! payload to hold the links of a doubly linked free list:
//!
//! ```text
//!   Allocated block:                      Free block:
//!
//!   ┌──────────┐ ◄── header (size | 1)    ┌──────────┐ ◄── header (size | 0)
//!   ├──────────┤ ◄── payload pointer      ├──────────┤
//!   │          │                          │   next   │  payload offset or 0
//!   │ payload  │                          │   prev   │  payload offset or 0
//!   │          │                          │   ....   │
//!   ├──────────┤                          ├──────────┤
//!   └──────────┘ ◄── footer (size | 1)    └──────────┘ ◄── footer (size | 0)
//! ```
//!
//! The footer lets `free` look at the block right below without any search,
//! so a freed block is merged with both neighbors in O(1).
//!
//! ## Heap Layout
//!
//! ```text
//!   offset 0    4        8      12      16       20     24
//!   ┌──────┬────────┬───────┬───────┬────────┬────────┬───────────────┬────────┐
//!   │ pad  │ 16 | 1 │ root  │ root  │ 16 | 1 │ blocks │      ...      │  0 | 1 │
//!   │      │        │ next  │ prev  │        │  ...   │               │        │
//!   └──────┴────────┴───────┴───────┴────────┴────────┴───────────────┴────────┘
//!          └──────── prologue block ─────────┘                         epilogue
//! ```
//!
//! The prologue is a permanently allocated minimum block whose payload holds
//! the free-list root. The epilogue is a zero-size allocated header that moves
//! to the new end every time the heap grows.
//!
//! ## Crate Structure
//!
//! ```text
//!   tagalloc
//!   ├── align      - Word constants, align! macro, request size adjustment
//!   ├── block      - Boundary tags and the Region view over heap memory
//!   ├── free_list  - LIFO free list and first-fit search
//!   ├── coalesce   - Merging a free block with free neighbors
//!   ├── heap       - Heap: init, allocate, deallocate, reallocate
//!   ├── check      - Heap consistency validator
//!   ├── provider   - HeapProvider trait, MmapArena and Sbrk
//!   └── error      - Error types
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use tagalloc::{Heap, MmapArena};
//!
//! let arena = MmapArena::new(MmapArena::DEFAULT_CAPACITY).unwrap();
//! let mut heap = Heap::init(arena).unwrap();
//!
//! let ptr = heap.allocate(64).unwrap().expect("non-zero request");
//! assert_eq!(ptr.as_ptr() as usize % 8, 0);
//!
//! unsafe {
//!     ptr.as_ptr().write_bytes(0xAB, 64);
//!     heap.deallocate(ptr);
//! }
//!
//! heap.check().unwrap();
//! ```
//!
//! ## Policies
//!
//! - **First fit**: the free list is scanned from the head and the first block
//!   that is large enough wins.
//! - **LIFO**: freed and merged blocks go to the head of the list.
//! - **Splitting**: a block is split when the leftover is at least 16 bytes;
//!   the leftover keeps the original block's place in the list.
//! - **Growth**: on a miss the heap grows by `max(request, chunk size)`.
//! - **Realloc**: always allocate, copy and free.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: no synchronization; a `Heap` is `Send` when its
//!   provider is, so wrap it in a mutex to share it between threads
//! - **No shrinking**: memory is never returned to the provider
//! - **4 GiB heap**: tags and links are 32-bit words
//!
//! ## Safety
//!
//! `allocate` is safe, but handing a pointer back through `deallocate` or
//! `reallocate` is `unsafe`: the heap trusts its caller not to double free or
//! pass foreign pointers, and not to write past an allocation.

pub mod align;
mod block;
mod check;
mod coalesce;
mod error;
mod free_list;
mod heap;
mod provider;

pub use error::{AllocError, ExtendError, Result};
pub use heap::{BlockInfo, Heap, HeapConfig};
pub use provider::{HeapProvider, MmapArena, Sbrk};
