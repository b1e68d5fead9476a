//! A free-list allocator over fixed size pages, with first-fit, best-fit and
//! worst-fit placement.
//!
//! Single threaded, no coalescing, pages are only returned on reset. Requests
//! are multiples of 8 between 8 and 4000 bytes by default.
//!
//! ```
//! use fitalloc::{Allocator, BestFit, HeapSupplier};
//!
//! let mut alloc = Allocator::new(BestFit, HeapSupplier::new());
//! let ptr = alloc.allocate(64).unwrap();
//! alloc.payload_mut(ptr).unwrap().fill(0xAA);
//! alloc.release(ptr).unwrap();
//! ```

/// Allocation engine
pub mod alloc;
pub mod config;
pub mod error;
/// Intrusive free list
pub mod free_list;
#[cfg(all(target_arch = "x86_64", target_os = "linux"))]
pub mod mmap;
/// Page suppliers
pub mod page;
/// Slot headers and handles
pub mod slot;
/// Placement policies
pub mod strategy;
pub mod workload;

pub use alloc::{Allocator, Stats};
pub use config::Config;
pub use error::{Error, Result};
pub use page::{HeapSupplier, PageSupplier, SystemSupplier};
#[cfg(all(target_arch = "x86_64", target_os = "linux"))]
pub use page::{MappedPage, MmapSupplier};
pub use slot::{ObjectPtr, SlotRef};
pub use strategy::{BestFit, FirstFit, Policy, Strategy, WorstFit};
