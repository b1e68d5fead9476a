//! Intrusive singly linked list of free slots.
//!
//! The list only stores the head link and a member count; the links
//! themselves live in the slot headers inside the pages. Insertion is always
//! at the head, so the order is "most recently freed or split first".

use crate::slot::{HeaderStore, SlotRef};

#[derive(Debug, Default)]
pub struct FreeList {
    head: Option<SlotRef>,
    len: usize,
}

/// One free slot as seen during a scan, together with its predecessor so
/// that the scan result can be handed straight to [`FreeList::remove`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub prev: Option<SlotRef>,
    pub slot: SlotRef,
    pub size: usize,
}

impl FreeList {
    pub const fn new() -> Self {
        FreeList { head: None, len: 0 }
    }

    pub fn head(&self) -> Option<SlotRef> {
        self.head
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Forgets every member. The headers are left as they are.
    pub fn clear(&mut self) {
        self.head = None;
        self.len = 0;
    }

    pub fn insert_front<S>(&mut self, store: &mut S, slot: SlotRef)
    where
        S: HeaderStore + ?Sized,
    {
        let mut header = store.header(slot);
        // a linked slot would create a cycle
        assert!(header.next.is_none(), "slot {slot:?} is already linked");
        header.next = self.head;
        store.set_header(slot, header);
        self.head = Some(slot);
        self.len += 1;
    }

    /// Detaches `slot`. `prev` must come from the same scan that found `slot`.
    pub fn remove<S>(&mut self, store: &mut S, slot: SlotRef, prev: Option<SlotRef>)
    where
        S: HeaderStore + ?Sized,
    {
        let next = store.header(slot).next;
        match prev {
            Some(prev) => {
                debug_assert_eq!(store.header(prev).next, Some(slot), "stale predecessor");
                store.set_next(prev, next);
            }
            None => {
                debug_assert_eq!(self.head, Some(slot), "slot is not the head");
                self.head = next;
            }
        }
        store.set_next(slot, None);
        self.len -= 1;
    }

    pub fn iter<'a, S>(&self, store: &'a S) -> Iter<'a, S>
    where
        S: HeaderStore + ?Sized,
    {
        Iter {
            store,
            prev: None,
            cur: self.head,
            remaining: self.len,
        }
    }
}

/// Walks the list in link order. Stops after `len` members even if the links
/// say otherwise, so a corrupted list cannot spin forever.
pub struct Iter<'a, S: ?Sized> {
    store: &'a S,
    prev: Option<SlotRef>,
    cur: Option<SlotRef>,
    remaining: usize,
}

impl<S> Iterator for Iter<'_, S>
where
    S: HeaderStore + ?Sized,
{
    type Item = Candidate;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let slot = self.cur?;
        let header = self.store.header(slot);
        let candidate = Candidate {
            prev: self.prev,
            slot,
            size: header.size,
        };
        self.prev = Some(slot);
        self.cur = header.next;
        self.remaining -= 1;
        Some(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::Header;
    use test_log::test;

    fn arena(slots: &[usize]) -> (Vec<Box<[u8]>>, Vec<SlotRef>) {
        let mut pages = vec![vec![0u8; 256].into_boxed_slice()];
        let refs = slots
            .iter()
            .enumerate()
            .map(|(i, &size)| {
                let slot = SlotRef::new(0, i * 32);
                pages.set_header(slot, Header::free(size));
                slot
            })
            .collect();
        (pages, refs)
    }

    fn sizes(list: &FreeList, pages: &[Box<[u8]>]) -> Vec<usize> {
        list.iter(pages).map(|c| c.size).collect()
    }

    #[test]
    fn insert_front_builds_lifo_order() {
        let (mut pages, slots) = arena(&[16, 64, 32]);
        let mut list = FreeList::new();
        assert!(list.is_empty());
        for &slot in &slots {
            list.insert_front(&mut pages[..], slot);
        }
        assert_eq!(list.len(), 3);
        assert_eq!(list.head(), Some(slots[2]));
        assert_eq!(sizes(&list, &pages), vec![32, 64, 16]);
    }

    #[test]
    fn iter_reports_predecessors() {
        let (mut pages, slots) = arena(&[8, 16, 24]);
        let mut list = FreeList::new();
        for &slot in &slots {
            list.insert_front(&mut pages[..], slot);
        }
        let prevs: Vec<_> = list.iter(&pages[..]).map(|c| c.prev).collect();
        assert_eq!(prevs, vec![None, Some(slots[2]), Some(slots[1])]);
    }

    #[test]
    fn remove_head_middle_and_tail() {
        let (mut pages, slots) = arena(&[8, 16, 24, 32]);
        let mut list = FreeList::new();
        for &slot in &slots {
            list.insert_front(&mut pages[..], slot);
        }
        // order: 32, 24, 16, 8
        list.remove(&mut pages[..], slots[1], Some(slots[2]));
        assert_eq!(sizes(&list, &pages), vec![32, 24, 8]);
        assert_eq!(pages.header(slots[1]).next, None);

        list.remove(&mut pages[..], slots[3], None);
        assert_eq!(sizes(&list, &pages), vec![24, 8]);
        assert_eq!(list.head(), Some(slots[2]));

        list.remove(&mut pages[..], slots[0], Some(slots[2]));
        assert_eq!(sizes(&list, &pages), vec![24]);

        list.remove(&mut pages[..], slots[2], None);
        assert!(list.is_empty());
        assert_eq!(list.len(), 0);
    }

    #[test]
    fn removed_slot_can_be_reinserted() {
        let (mut pages, slots) = arena(&[8, 16]);
        let mut list = FreeList::new();
        list.insert_front(&mut pages[..], slots[0]);
        list.insert_front(&mut pages[..], slots[1]);
        list.remove(&mut pages[..], slots[0], Some(slots[1]));
        list.insert_front(&mut pages[..], slots[0]);
        assert_eq!(sizes(&list, &pages), vec![8, 16]);
    }

    #[test]
    #[should_panic(expected = "already linked")]
    fn double_insert_panics() {
        let (mut pages, slots) = arena(&[8, 16]);
        let mut list = FreeList::new();
        list.insert_front(&mut pages[..], slots[0]);
        list.insert_front(&mut pages[..], slots[1]);
        list.insert_front(&mut pages[..], slots[1]);
    }

    #[test]
    fn iteration_is_bounded_by_len() {
        let (mut pages, slots) = arena(&[8, 16]);
        let mut list = FreeList::new();
        list.insert_front(&mut pages[..], slots[0]);
        list.insert_front(&mut pages[..], slots[1]);
        // corrupt: tail points back at head
        pages.set_next(slots[0], Some(slots[1]));
        assert_eq!(sizes(&list, &pages), vec![16, 8]);
    }
}
