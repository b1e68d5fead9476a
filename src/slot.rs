//! Slot metadata and the handles used to name slots inside the page arena.
//!
//! Every slot, free or allocated, is preceded by a 16 byte header written
//! directly into the page bytes:
//!
//! ```text
//! ... | header | object | header | free slot | header | object | ...
//!
//! header: | size: u32 | state: u32 | next: u64 |
//! ```
//!
//! `next` packs the page index into the high 32 bits and the header offset
//! into the low 32 bits, `u64::MAX` marks "no next slot".

use std::fmt::Display;
use std::ops::Deref;
use std::ops::DerefMut;

pub const HEADER_SIZE: usize = 16;
/// Payload sizes and header offsets are multiples of this.
pub const GRANULE: usize = 8;

const NONE: u64 = u64::MAX;
const TAG_FREE: u32 = u32::from_be_bytes(*b"FREE");
const TAG_USED: u32 = u32::from_be_bytes(*b"USED");

const _: () = assert!(HEADER_SIZE % GRANULE == 0);

/// Names a slot header: page index in the arena plus byte offset of the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotRef {
    pub page: u32,
    pub offset: u32,
}

impl SlotRef {
    pub(crate) fn new(page: usize, offset: usize) -> Self {
        SlotRef {
            page: page as u32,
            offset: offset as u32,
        }
    }

    /// Handle of the payload that follows this header.
    pub fn object(self) -> ObjectPtr {
        ObjectPtr {
            page: self.page,
            offset: self.offset + HEADER_SIZE as u32,
        }
    }

    fn encode(link: Option<SlotRef>) -> u64 {
        match link {
            Some(slot) => (u64::from(slot.page) << 32) | u64::from(slot.offset),
            None => NONE,
        }
    }

    fn decode(raw: u64) -> Option<SlotRef> {
        if raw == NONE {
            return None;
        }
        Some(SlotRef {
            page: (raw >> 32) as u32,
            offset: raw as u32,
        })
    }
}

/// The "pointer" handed out by `allocate` and taken back by `release`: page
/// index plus byte offset of the first payload byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectPtr {
    pub page: u32,
    pub offset: u32,
}

impl ObjectPtr {
    /// Header preceding this payload, `None` if the offset leaves no room for one.
    pub fn slot(self) -> Option<SlotRef> {
        let offset = self.offset.checked_sub(HEADER_SIZE as u32)?;
        Some(SlotRef {
            page: self.page,
            offset,
        })
    }
}

impl Display for ObjectPtr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "object(page={}, offset={:#x})", self.page, self.offset)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Free,
    Allocated,
    /// tag bytes that were never written by the allocator
    Unknown(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub size: usize,
    pub state: SlotState,
    pub next: Option<SlotRef>,
}

impl Header {
    pub fn free(size: usize) -> Self {
        Header {
            size,
            state: SlotState::Free,
            next: None,
        }
    }

    pub fn read(bytes: &[u8]) -> Self {
        let mut size = [0u8; 4];
        let mut tag = [0u8; 4];
        let mut next = [0u8; 8];
        size.copy_from_slice(&bytes[0..4]);
        tag.copy_from_slice(&bytes[4..8]);
        next.copy_from_slice(&bytes[8..16]);
        let (size, tag, next) = (
            u32::from_ne_bytes(size),
            u32::from_ne_bytes(tag),
            u64::from_ne_bytes(next),
        );
        let state = match tag {
            TAG_FREE => SlotState::Free,
            TAG_USED => SlotState::Allocated,
            other => SlotState::Unknown(other),
        };
        Header {
            size: size as usize,
            state,
            next: SlotRef::decode(next),
        }
    }

    pub fn write(&self, bytes: &mut [u8]) {
        let tag = match self.state {
            SlotState::Free => TAG_FREE,
            SlotState::Allocated => TAG_USED,
            SlotState::Unknown(tag) => tag,
        };
        bytes[0..4].copy_from_slice(&(self.size as u32).to_ne_bytes());
        bytes[4..8].copy_from_slice(&tag.to_ne_bytes());
        bytes[8..16].copy_from_slice(&SlotRef::encode(self.next).to_ne_bytes());
    }
}

/// Header access over an arena of pages. Out of range slots are an internal
/// invariant violation and panic.
pub trait HeaderStore {
    fn header(&self, slot: SlotRef) -> Header;
    fn set_header(&mut self, slot: SlotRef, header: Header);

    fn set_next(&mut self, slot: SlotRef, next: Option<SlotRef>) {
        let mut header = self.header(slot);
        header.next = next;
        self.set_header(slot, header);
    }
}

impl<P> HeaderStore for [P]
where
    P: Deref<Target = [u8]> + DerefMut,
{
    fn header(&self, slot: SlotRef) -> Header {
        let start = slot.offset as usize;
        Header::read(&self[slot.page as usize][start..start + HEADER_SIZE])
    }

    fn set_header(&mut self, slot: SlotRef, header: Header) {
        let start = slot.offset as usize;
        header.write(&mut self[slot.page as usize][start..start + HEADER_SIZE]);
    }
}
