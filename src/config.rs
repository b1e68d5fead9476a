use crate::error::{Error, Result};
use crate::slot::{GRANULE, HEADER_SIZE};

pub const PAGE_SIZE: usize = 4096;
pub const MIN_REQUEST: usize = 8;
pub const MAX_REQUEST: usize = 4000;

/// Page geometry and request bounds of an [`Allocator`](crate::alloc::Allocator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// bytes requested from the page supplier per refill
    pub page_size: usize,
    pub min_request: usize,
    pub max_request: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            page_size: PAGE_SIZE,
            min_request: MIN_REQUEST,
            max_request: MAX_REQUEST,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.page_size % GRANULE != 0 {
            return Err(Error::InvalidConfig("page size must be a multiple of 8"));
        }
        if self.page_size > u32::MAX as usize {
            return Err(Error::InvalidConfig("page size must fit in 32 bits"));
        }
        if self.min_request == 0 {
            return Err(Error::InvalidConfig("minimum request must be non-zero"));
        }
        if self.min_request % GRANULE != 0 || self.max_request % GRANULE != 0 {
            return Err(Error::InvalidConfig(
                "request bounds must be multiples of 8",
            ));
        }
        if self.min_request > self.max_request {
            return Err(Error::InvalidConfig(
                "minimum request exceeds maximum request",
            ));
        }
        // a fresh page must always satisfy the retry after a refill
        if self.max_request > self.page_size.saturating_sub(HEADER_SIZE) {
            return Err(Error::InvalidConfig(
                "a fresh page cannot hold the largest request",
            ));
        }
        Ok(())
    }

    /// Payload bytes of the single free slot a fresh page is formatted as.
    pub fn page_capacity(&self) -> usize {
        self.page_size - HEADER_SIZE
    }

    pub fn accepts(&self, size: usize) -> bool {
        size >= self.min_request && size <= self.max_request && size % GRANULE == 0
    }
}
