//! Least-recently-used list.

use std::collections::HashMap;

use crate::codec::BlockId;

type SlotId = usize;

/// Slot of the head sentinel (most recently used side).
const HEAD: SlotId = 0;
/// Slot of the tail sentinel (least recently used side).
const TAIL: SlotId = 1;

struct Slot<T> {
    entry: Option<(BlockId, T)>,
    prev: SlotId,
    next: SlotId,
}

/// Recency ordered list of blocks.
/// Entries are kept in an arena of slots linked by index, so insert, evict and promote are O(1)
/// and no node references escape the list. An index from block id to slot keeps lookups O(1).
pub struct LruList<T> {
    slots: Vec<Slot<T>>,
    free: Vec<SlotId>,
    index: HashMap<BlockId, SlotId>,
}

impl<T> LruList<T> {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty list with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity + 2);
        slots.push(Slot {
            entry: None,
            prev: HEAD,
            next: TAIL,
        });
        slots.push(Slot {
            entry: None,
            prev: HEAD,
            next: TAIL,
        });

        return LruList {
            slots,
            free: Vec::new(),
            index: HashMap::with_capacity(capacity),
        };
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Checks if the block is in the list.
    pub fn contains(&self, block_id: BlockId) -> bool {
        self.index.contains_key(&block_id)
    }

    pub fn get(&self, block_id: BlockId) -> Option<&T> {
        let slot = *self.index.get(&block_id)?;
        self.slots[slot].entry.as_ref().map(|(_, value)| value)
    }

    pub fn get_mut(&mut self, block_id: BlockId) -> Option<&mut T> {
        let slot = *self.index.get(&block_id)?;
        self.slots[slot].entry.as_mut().map(|(_, value)| value)
    }

    /// Inserts an entry as the most recently used one.
    /// The block must not be in the list already.
    pub fn insert_most_recent(&mut self, block_id: BlockId, value: T) {
        debug_assert!(!self.contains(block_id), "block {} inserted twice", block_id);

        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot].entry = Some((block_id, value));
                slot
            }
            None => {
                self.slots.push(Slot {
                    entry: Some((block_id, value)),
                    prev: HEAD,
                    next: TAIL,
                });
                self.slots.len() - 1
            }
        };

        self.link_front(slot);
        self.index.insert(block_id, slot);
    }

    /// Removes and returns the least recently used entry.
    pub fn evict_least_recent(&mut self) -> Option<(BlockId, T)> {
        let slot = self.slots[TAIL].prev;
        if slot == HEAD {
            return None;
        }

        self.unlink(slot);
        let (block_id, value) = self.slots[slot].entry.take()?;
        self.index.remove(&block_id);
        self.free.push(slot);

        return Some((block_id, value));
    }

    /// Moves an entry to the most recently used position.
    /// Returns `false` if the block is not in the list.
    pub fn promote(&mut self, block_id: BlockId) -> bool {
        let slot = match self.index.get(&block_id) {
            Some(&slot) => slot,
            None => return false,
        };

        if self.slots[HEAD].next != slot {
            self.unlink(slot);
            self.link_front(slot);
        }

        return true;
    }

    /// Iterates block ids from the most to the least recently used.
    pub fn iter_ids(&self) -> impl Iterator<Item = BlockId> + '_ {
        let mut slot = self.slots[HEAD].next;
        std::iter::from_fn(move || {
            let (block_id, _) = self.slots[slot].entry.as_ref()?;
            slot = self.slots[slot].next;
            Some(*block_id)
        })
    }

    fn link_front(&mut self, slot: SlotId) {
        let first = self.slots[HEAD].next;
        self.slots[slot].prev = HEAD;
        self.slots[slot].next = first;
        self.slots[first].prev = slot;
        self.slots[HEAD].next = slot;
    }

    fn unlink(&mut self, slot: SlotId) {
        let Slot { prev, next, .. } = self.slots[slot];
        self.slots[prev].next = next;
        self.slots[next].prev = prev;
    }
}

impl<T> Default for LruList<T> {
    fn default() -> Self {
        LruList::new()
    }
}
