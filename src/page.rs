//! Page suppliers: where the allocator gets its memory from.

use std::ops::{Deref, DerefMut};

use log::debug;

use crate::error::{Error, Result};

/// Source of fixed size pages. The allocator only calls
/// [`acquire_page`](Self::acquire_page) when its free list cannot satisfy a
/// request, and gives pages back through [`release_page`](Self::release_page)
/// on reset or finalization.
pub trait PageSupplier {
    type Page: Deref<Target = [u8]> + DerefMut;

    fn acquire_page(&mut self, size: usize) -> Result<Self::Page>;

    fn release_page(&mut self, page: Self::Page) {
        drop(page);
    }
}

/// Hands out zeroed boxed slices. Optionally capped to simulate exhaustion.
#[derive(Debug, Default)]
pub struct HeapSupplier {
    limit: Option<usize>,
    outstanding: usize,
    acquired: usize,
    released: usize,
}

impl HeapSupplier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails with [`Error::OutOfMemory`] once `pages` pages are outstanding.
    pub fn with_limit(pages: usize) -> Self {
        HeapSupplier {
            limit: Some(pages),
            ..Self::default()
        }
    }

    pub fn acquired(&self) -> usize {
        self.acquired
    }

    pub fn released(&self) -> usize {
        self.released
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding
    }
}

impl PageSupplier for HeapSupplier {
    type Page = Box<[u8]>;

    fn acquire_page(&mut self, size: usize) -> Result<Self::Page> {
        if self.limit.is_some_and(|limit| self.outstanding >= limit) {
            debug!("heap supplier limit of {:?} pages reached", self.limit);
            return Err(Error::OutOfMemory { size });
        }
        self.outstanding += 1;
        self.acquired += 1;
        Ok(vec![0u8; size].into_boxed_slice())
    }

    fn release_page(&mut self, page: Self::Page) {
        self.outstanding -= 1;
        self.released += 1;
        drop(page);
    }
}

#[cfg(all(target_arch = "x86_64", target_os = "linux"))]
pub use self::mapped::{MappedPage, MmapSupplier};

/// Supplier used when the caller does not pick one.
#[cfg(all(target_arch = "x86_64", target_os = "linux"))]
pub type SystemSupplier = MmapSupplier;
#[cfg(not(all(target_arch = "x86_64", target_os = "linux")))]
pub type SystemSupplier = HeapSupplier;

#[cfg(all(target_arch = "x86_64", target_os = "linux"))]
mod mapped {
    use super::*;
    use crate::mmap;
    use log::warn;
    use std::ptr::NonNull;

    /// An anonymous read/write mapping, unmapped on drop.
    #[derive(Debug)]
    pub struct MappedPage {
        ptr: NonNull<u8>,
        len: usize,
    }

    impl Deref for MappedPage {
        type Target = [u8];

        fn deref(&self) -> &[u8] {
            unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
        }
    }

    impl DerefMut for MappedPage {
        fn deref_mut(&mut self) -> &mut [u8] {
            unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
        }
    }

    impl Drop for MappedPage {
        fn drop(&mut self) {
            if let Err(errno) = mmap::munmap(self.ptr, self.len) {
                warn!("munmap of {:p} failed: errno={errno}", self.ptr);
            }
        }
    }

    /// Pages straight from the kernel via anonymous private `mmap`.
    #[derive(Debug, Default)]
    pub struct MmapSupplier {
        mapped: usize,
    }

    impl MmapSupplier {
        pub fn new() -> Self {
            Self::default()
        }

        /// Pages currently mapped through this supplier.
        pub fn mapped(&self) -> usize {
            self.mapped
        }
    }

    impl PageSupplier for MmapSupplier {
        type Page = MappedPage;

        fn acquire_page(&mut self, size: usize) -> Result<Self::Page> {
            let ptr = mmap::mmap_anonymous(size).map_err(|errno| {
                warn!("mmap of {size} bytes failed: errno={errno}");
                Error::OutOfMemory { size }
            })?;
            self.mapped += 1;
            Ok(MappedPage { ptr, len: size })
        }

        fn release_page(&mut self, page: Self::Page) {
            self.mapped -= 1;
            drop(page);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn heap_pages_are_zeroed_and_sized() {
        let mut supplier = HeapSupplier::new();
        let page = supplier.acquire_page(4096).unwrap();
        assert_eq!(page.len(), 4096);
        assert!(page.iter().all(|&b| b == 0));
        assert_eq!(supplier.acquired(), 1);
        supplier.release_page(page);
        assert_eq!(supplier.released(), 1);
        assert_eq!(supplier.outstanding(), 0);
    }

    #[test]
    fn heap_limit_reports_out_of_memory() {
        let mut supplier = HeapSupplier::with_limit(1);
        let page = supplier.acquire_page(64).unwrap();
        assert_eq!(
            supplier.acquire_page(64),
            Err(Error::OutOfMemory { size: 64 })
        );
        supplier.release_page(page);
        assert!(supplier.acquire_page(64).is_ok());
    }

    #[cfg(all(target_arch = "x86_64", target_os = "linux"))]
    #[test]
    fn mapped_pages_are_writable() {
        let mut supplier = MmapSupplier::new();
        let mut page = supplier.acquire_page(4096).unwrap();
        assert_eq!(supplier.mapped(), 1);
        page[..8].copy_from_slice(&u64::MAX.to_ne_bytes());
        page[4095] = 7;
        assert_eq!(page[4095], 7);
        assert_eq!(page[..8], u64::MAX.to_ne_bytes());
        supplier.release_page(page);
        assert_eq!(supplier.mapped(), 0);
    }
}
