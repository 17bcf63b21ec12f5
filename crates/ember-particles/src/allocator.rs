//! Slot allocators: which pool slots are live, and which one to claim next
//!
//! Two strategies share one interface. The ring allocator keeps the live
//! slots as one cyclic range and can only release the oldest one; the free
//! list keeps a stack of unused ids and releases in any order.

use crate::pool::SlotId;
use std::ops::Range;
use std::sync::{Arc, Mutex, PoisonError};

/// Hands out and takes back pool slot ids.
///
/// `live_count() + free_count() == capacity()` holds after every call.
pub trait SlotAllocator {
    /// Claim an unused slot, or `None` when the pool is exhausted.
    fn try_claim(&mut self) -> Option<SlotId>;

    /// Return a live slot. Panics on ids the allocator did not hand out or
    /// (for the ring) on anything but the oldest live slot.
    fn release(&mut self, id: SlotId);

    fn capacity(&self) -> usize;

    fn live_count(&self) -> usize;

    fn free_count(&self) -> usize {
        self.capacity() - self.live_count()
    }
}

/// Live slots form the cyclic range `[first_alive, first_dead)`.
///
/// An explicit live count disambiguates the full ring from the empty one,
/// since both have `first_alive == first_dead`.
#[derive(Debug, Clone)]
pub struct RingAllocator {
    first_alive: u32,
    first_dead: u32,
    living: u32,
    capacity: u32,
}

impl RingAllocator {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring allocator needs at least one slot");
        assert!(capacity <= u32::MAX as usize, "ring capacity exceeds slot id range");
        Self {
            first_alive: 0,
            first_dead: 0,
            living: 0,
            capacity: capacity as u32,
        }
    }

    /// Oldest live slot, if any
    pub fn first_alive(&self) -> Option<SlotId> {
        (self.living > 0).then_some(self.first_alive)
    }

    /// Slot the next claim will return
    pub fn first_dead(&self) -> SlotId {
        self.first_dead
    }

    /// Distance walking forward from `first_alive` to `first_dead`, wrapping.
    /// Zero for both the empty and the full ring.
    pub fn cyclic_distance(&self) -> u32 {
        let cap = self.capacity as u64;
        ((self.first_dead as u64 + cap - self.first_alive as u64) % cap) as u32
    }

    /// Live slots oldest-first, as at most two contiguous ranges
    pub fn alive_ranges(&self) -> (Range<SlotId>, Range<SlotId>) {
        if self.living == 0 {
            return (0..0, 0..0);
        }
        let end = self.first_alive as u64 + self.living as u64;
        if end <= self.capacity as u64 {
            (self.first_alive..end as u32, 0..0)
        } else {
            let wrapped = (end - self.capacity as u64) as u32;
            (self.first_alive..self.capacity, 0..wrapped)
        }
    }

    /// Live slots oldest-first
    pub fn iter_alive(&self) -> impl Iterator<Item = SlotId> {
        let (a, b) = self.alive_ranges();
        a.chain(b)
    }
}

impl SlotAllocator for RingAllocator {
    fn try_claim(&mut self) -> Option<SlotId> {
        if self.living == self.capacity {
            return None;
        }
        let id = self.first_dead;
        self.first_dead = (self.first_dead + 1) % self.capacity;
        self.living += 1;
        Some(id)
    }

    fn release(&mut self, id: SlotId) {
        assert!(self.living > 0, "release of slot {id} from an empty ring");
        assert_eq!(
            id, self.first_alive,
            "ring allocator can only release the oldest live slot"
        );
        self.first_alive = (self.first_alive + 1) % self.capacity;
        self.living -= 1;
    }

    fn capacity(&self) -> usize {
        self.capacity as usize
    }

    fn live_count(&self) -> usize {
        self.living as usize
    }
}

/// Stack of unused ids; claims pop, releases push.
///
/// A membership bitmap catches double releases and foreign ids before they
/// can corrupt the stack.
#[derive(Debug, Clone)]
pub struct FreeListAllocator {
    free: Vec<SlotId>,
    in_free: Vec<bool>,
}

impl FreeListAllocator {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "free list needs at least one slot");
        assert!(capacity <= u32::MAX as usize, "free list capacity exceeds slot id range");
        // reversed so the first claim returns slot 0
        Self {
            free: (0..capacity as u32).rev().collect(),
            in_free: vec![true; capacity],
        }
    }

    pub fn is_free(&self, id: SlotId) -> bool {
        self.in_free.get(id as usize).copied().unwrap_or(false)
    }
}

impl SlotAllocator for FreeListAllocator {
    fn try_claim(&mut self) -> Option<SlotId> {
        let id = self.free.pop()?;
        self.in_free[id as usize] = false;
        Some(id)
    }

    fn release(&mut self, id: SlotId) {
        let slot = self
            .in_free
            .get_mut(id as usize)
            .unwrap_or_else(|| panic!("slot {id} is outside the pool"));
        assert!(!*slot, "slot {id} released twice");
        *slot = true;
        self.free.push(id);
    }

    fn capacity(&self) -> usize {
        self.in_free.len()
    }

    fn live_count(&self) -> usize {
        self.in_free.len() - self.free.len()
    }

    fn free_count(&self) -> usize {
        self.free.len()
    }
}

/// Free list that many threads can claim from and release into at once.
///
/// Each claim or release is atomic with respect to the others, so no two
/// concurrent claims can see the same id.
#[derive(Debug, Clone)]
pub struct SharedFreeList {
    inner: Arc<Mutex<FreeListAllocator>>,
}

impl SharedFreeList {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(FreeListAllocator::new(capacity))),
        }
    }

    pub fn try_claim(&self) -> Option<SlotId> {
        self.lock().try_claim()
    }

    pub fn release(&self, id: SlotId) {
        self.lock().release(id)
    }

    pub fn live_count(&self) -> usize {
        self.lock().live_count()
    }

    pub fn free_count(&self) -> usize {
        self.lock().free_count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FreeListAllocator> {
        // a panic while holding the lock leaves the stack and bitmap consistent
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
