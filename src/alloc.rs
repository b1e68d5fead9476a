use std::fmt::Display;

use log::{debug, trace, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::free_list::{Candidate, FreeList};
use crate::page::PageSupplier;
use crate::slot::{GRANULE, HEADER_SIZE, Header, HeaderStore, ObjectPtr, SlotRef, SlotState};
use crate::strategy::Strategy;

/// Counters describing what the allocator holds right now.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// pages obtained from the supplier and not yet returned
    pub pages: usize,
    pub mapped_bytes: usize,
    pub live_objects: usize,
    /// sum of the sizes requested by live objects
    pub live_bytes: usize,
    pub free_slots: usize,
    pub allocations: u64,
    pub releases: u64,
}

impl Stats {
    /// Share of the mapped bytes handed out to live objects, in `[0, 1]`.
    pub fn utilization(&self) -> f64 {
        if self.mapped_bytes == 0 {
            return 0.0;
        }
        self.live_bytes as f64 / self.mapped_bytes as f64
    }
}

impl Display for Stats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "pages={} live={} ({}B) free_slots={} utilization={:.1}%",
            self.pages,
            self.live_objects,
            self.live_bytes,
            self.free_slots,
            self.utilization() * 100.0
        )
    }
}

/// Free-list allocator over pages from a [`PageSupplier`], placing objects
/// with the [`Strategy`] `S`.
///
/// Requests must be multiples of 8 within the configured bounds. Each page is
/// formatted as one free slot; slots are split on allocation and pushed back
/// onto the free list on release, adjacent free slots are never merged and
/// pages are only returned on [`initialize`](Self::initialize) or
/// [`finalize`](Self::finalize).
pub struct Allocator<S, P: PageSupplier> {
    config: Config,
    strategy: S,
    supplier: P,
    pages: Vec<P::Page>,
    free_list: FreeList,
    live_objects: usize,
    live_bytes: usize,
    allocations: u64,
    releases: u64,
}

impl<S, P> Default for Allocator<S, P>
where
    S: Strategy + Default,
    P: PageSupplier + Default,
{
    fn default() -> Self {
        Self::new(S::default(), P::default())
    }
}

impl<S, P> Allocator<S, P>
where
    S: Strategy,
    P: PageSupplier,
{
    /// Empty allocator with the default 4096 byte pages and `[8, 4000]` requests.
    pub fn new(strategy: S, supplier: P) -> Self {
        Allocator {
            config: Config::default(),
            strategy,
            supplier,
            pages: Vec::new(),
            free_list: FreeList::new(),
            live_objects: 0,
            live_bytes: 0,
            allocations: 0,
            releases: 0,
        }
    }

    pub fn with_config(config: Config, strategy: S, supplier: P) -> Result<Self> {
        config.validate()?;
        Ok(Allocator {
            config,
            ..Self::new(strategy, supplier)
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    pub fn supplier(&self) -> &P {
        &self.supplier
    }

    /// Returns every page to the supplier and starts over with an empty free
    /// list. Objects handed out before the reset are gone.
    pub fn initialize(&mut self) {
        let pages = self.release_pages();
        self.live_objects = 0;
        self.live_bytes = 0;
        self.allocations = 0;
        self.releases = 0;
        debug!("{} allocator reset, returned {pages} pages", self.strategy.name());
    }

    /// Returns every page to the supplier and hands the supplier back.
    pub fn finalize(mut self) -> P {
        let pages = self.release_pages();
        debug!("{} allocator finalized, returned {pages} pages", self.strategy.name());
        self.supplier
    }

    fn release_pages(&mut self) -> usize {
        let count = self.pages.len();
        for page in self.pages.drain(..) {
            self.supplier.release_page(page);
        }
        self.free_list.clear();
        count
    }

    /// Hands out `size` payload bytes.
    ///
    /// Scans the free list with the strategy; when nothing fits, exactly one
    /// page is requested from the supplier and the scan is repeated. The
    /// chosen slot is split when the remainder can hold a header plus at
    /// least one byte, otherwise the remainder stays behind as padding.
    pub fn allocate(&mut self, size: usize) -> Result<ObjectPtr> {
        if !self.config.accepts(size) {
            warn!("rejected allocation of {size} bytes");
            return Err(Error::InvalidSize {
                size,
                min: self.config.min_request,
                max: self.config.max_request,
            });
        }

        let candidate = match self.find(size) {
            Some(candidate) => candidate,
            None => {
                self.grow()?;
                self.find(size)
                    .ok_or(Error::Corrupt("a fresh page did not satisfy the request"))?
            }
        };

        let slot = candidate.slot;
        let remaining = candidate.size - size;
        self.free_list.remove(&mut self.pages[..], slot, candidate.prev);
        self.pages.set_header(
            slot,
            Header {
                size,
                state: SlotState::Allocated,
                next: None,
            },
        );

        if remaining > HEADER_SIZE {
            let rest = SlotRef {
                page: slot.page,
                offset: slot.offset + (HEADER_SIZE + size) as u32,
            };
            self.pages.set_header(rest, Header::free(remaining - HEADER_SIZE));
            self.free_list.insert_front(&mut self.pages[..], rest);
        }

        self.live_objects += 1;
        self.live_bytes += size;
        self.allocations += 1;

        let ptr = slot.object();
        trace!(
            "{} allocate({size}) -> {ptr} from a {} byte slot",
            self.strategy.name(),
            candidate.size
        );
        Ok(ptr)
    }

    /// Puts the object back at the head of the free list.
    pub fn release(&mut self, ptr: ObjectPtr) -> Result<()> {
        let (slot, mut header) = self.lookup(ptr)?;
        if header.state == SlotState::Free {
            warn!("double release of {ptr}");
            return Err(Error::DoubleRelease { ptr });
        }

        header.state = SlotState::Free;
        header.next = None;
        self.pages.set_header(slot, header);
        self.free_list.insert_front(&mut self.pages[..], slot);

        self.live_objects -= 1;
        self.live_bytes -= header.size;
        self.releases += 1;
        trace!("{} release({ptr}) of {} bytes", self.strategy.name(), header.size);
        Ok(())
    }

    /// Payload size recorded for a live object.
    pub fn object_size(&self, ptr: ObjectPtr) -> Result<usize> {
        let (_, header) = self.live(ptr)?;
        Ok(header.size)
    }

    pub fn payload(&self, ptr: ObjectPtr) -> Result<&[u8]> {
        let (_, header) = self.live(ptr)?;
        let start = ptr.offset as usize;
        Ok(&self.pages[ptr.page as usize][start..start + header.size])
    }

    pub fn payload_mut(&mut self, ptr: ObjectPtr) -> Result<&mut [u8]> {
        let (_, header) = self.live(ptr)?;
        let start = ptr.offset as usize;
        Ok(&mut self.pages[ptr.page as usize][start..start + header.size])
    }

    /// Free slots and their sizes, in free-list order.
    pub fn free_slots(&self) -> impl Iterator<Item = (SlotRef, usize)> + '_ {
        self.free_list.iter(&self.pages[..]).map(|c| (c.slot, c.size))
    }

    pub fn stats(&self) -> Stats {
        Stats {
            pages: self.pages.len(),
            mapped_bytes: self.pages.len() * self.config.page_size,
            live_objects: self.live_objects,
            live_bytes: self.live_bytes,
            free_slots: self.free_list.len(),
            allocations: self.allocations,
            releases: self.releases,
        }
    }

    /// Walks the free list and checks every member is a free slot inside its
    /// page and that the walk ends after exactly `len` members.
    pub fn check_integrity(&self) -> Result<()> {
        let mut cur = self.free_list.head();
        let mut seen = 0;
        while let Some(slot) = cur {
            if seen == self.free_list.len() {
                return Err(Error::Corrupt("free list is longer than its member count"));
            }
            if !self.holds_header(slot) {
                return Err(Error::Corrupt("free list links outside the page arena"));
            }
            let header = self.pages.header(slot);
            if header.state != SlotState::Free {
                return Err(Error::Corrupt("non-free slot on the free list"));
            }
            if slot.offset as usize + HEADER_SIZE + header.size > self.config.page_size {
                return Err(Error::Corrupt("free slot extends past its page"));
            }
            seen += 1;
            cur = header.next;
        }
        if seen != self.free_list.len() {
            return Err(Error::Corrupt("free list is shorter than its member count"));
        }
        Ok(())
    }

    fn find(&self, size: usize) -> Option<Candidate> {
        self.strategy
            .select(self.free_list.iter(&self.pages[..]), size)
    }

    fn grow(&mut self) -> Result<()> {
        let size = self.config.page_size;
        let page = self.supplier.acquire_page(size)?;
        if page.len() != size {
            let actual = page.len();
            self.supplier.release_page(page);
            return Err(Error::PageSize {
                expected: size,
                actual,
            });
        }

        let index = self.pages.len();
        if index > u32::MAX as usize {
            self.supplier.release_page(page);
            return Err(Error::OutOfMemory { size });
        }
        self.pages.push(page);

        let slot = SlotRef::new(index, 0);
        self.pages
            .set_header(slot, Header::free(self.config.page_capacity()));
        self.free_list.insert_front(&mut self.pages[..], slot);
        debug!(
            "{} acquired page {index} ({size} bytes)",
            self.strategy.name()
        );
        Ok(())
    }

    fn holds_header(&self, slot: SlotRef) -> bool {
        (slot.page as usize) < self.pages.len()
            && slot.offset as usize % GRANULE == 0
            && slot.offset as usize + HEADER_SIZE <= self.config.page_size
    }

    /// Header of the slot behind `ptr`, free or allocated, after checking
    /// that the handle lands on a header this allocator wrote.
    fn lookup(&self, ptr: ObjectPtr) -> Result<(SlotRef, Header)> {
        let invalid = || Error::InvalidPointer { ptr };
        let slot = ptr.slot().ok_or_else(invalid)?;
        if !self.holds_header(slot) {
            return Err(invalid());
        }
        let header = self.pages.header(slot);
        let consistent = match header.state {
            SlotState::Allocated => header.next.is_none(),
            SlotState::Free => true,
            SlotState::Unknown(_) => false,
        };
        if !consistent || ptr.offset as usize + header.size > self.config.page_size {
            return Err(invalid());
        }
        Ok((slot, header))
    }

    fn live(&self, ptr: ObjectPtr) -> Result<(SlotRef, Header)> {
        match self.lookup(ptr)? {
            (_, header) if header.state == SlotState::Free => Err(Error::InvalidPointer { ptr }),
            found => Ok(found),
        }
    }
}
