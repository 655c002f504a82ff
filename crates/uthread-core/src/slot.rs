//! Slot allocator for green thread ids
//!
//! Hands out arena indices for new threads and takes them back at join.
//! Uses a LIFO free stack so the most recently released slot (whose record
//! and stack are still warm) is reused first. Every release bumps the slot's
//! generation so handles to a previous occupant can be told apart.

use crate::id::GreenId;
use crate::error::{SchedError, SchedResult};

/// Single-threaded slot allocator
#[derive(Debug)]
pub struct SlotAllocator {
    /// LIFO stack of free slot ids
    free_stack: Vec<u32>,

    /// Next never-used slot id
    next_fresh: u32,

    /// Maximum number of slots
    max_slots: u32,

    /// Generation per slot ever handed out
    generations: Vec<u32>,

    /// Number of currently allocated slots
    allocated: u32,
}

impl SlotAllocator {
    pub fn new(max_slots: usize) -> Self {
        let max_slots = max_slots.min(GreenId::NONE.as_u32() as usize) as u32;
        Self {
            free_stack: Vec::new(),
            next_fresh: 0,
            max_slots,
            generations: Vec::new(),
            allocated: 0,
        }
    }

    /// Allocate a slot, returning its id and current generation
    pub fn allocate(&mut self) -> SchedResult<(GreenId, u32)> {
        let id = match self.free_stack.pop() {
            Some(id) => id,
            None => {
                if self.next_fresh >= self.max_slots {
                    return Err(SchedError::NoSlotsAvailable);
                }
                let id = self.next_fresh;
                self.next_fresh += 1;
                self.generations.push(0);
                id
            }
        };
        self.allocated += 1;
        Ok((GreenId::new(id), self.generations[id as usize]))
    }

    /// Return a slot; its generation advances so stale handles are detected
    pub fn release(&mut self, id: GreenId) {
        if !self.is_valid(id) || id.index() >= self.generations.len() {
            return;
        }
        let gen = &mut self.generations[id.index()];
        *gen = gen.wrapping_add(1);
        self.free_stack.push(id.as_u32());
        self.allocated -= 1;
    }

    /// Current generation of a slot, `None` if never allocated
    #[cfg(test)]
    fn generation(&self, id: GreenId) -> Option<u32> {
        self.generations.get(id.index()).copied()
    }

    #[inline]
    pub fn allocated_count(&self) -> u32 {
        self.allocated
    }

    #[cfg(test)]
    fn free_stack_size(&self) -> usize {
        self.free_stack.len()
    }

    #[inline]
    fn is_valid(&self, id: GreenId) -> bool {
        !id.is_none() && id.as_u32() < self.max_slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_sequential() {
        let mut alloc = SlotAllocator::new(100);

        let (id1, g1) = alloc.allocate().unwrap();
        let (id2, _) = alloc.allocate().unwrap();
        let (id3, _) = alloc.allocate().unwrap();

        assert_eq!(id1.as_u32(), 0);
        assert_eq!(id2.as_u32(), 1);
        assert_eq!(id3.as_u32(), 2);
        assert_eq!(g1, 0);
        assert_eq!(alloc.allocated_count(), 3);
    }

    #[test]
    fn test_release_reuses_lifo_with_new_generation() {
        let mut alloc = SlotAllocator::new(100);

        let (id1, gen1) = alloc.allocate().unwrap();
        let (id2, _) = alloc.allocate().unwrap();

        alloc.release(id1);
        alloc.release(id2);
        assert_eq!(alloc.allocated_count(), 0);
        assert_eq!(alloc.free_stack_size(), 2);

        // Last released comes back first
        let (again, _) = alloc.allocate().unwrap();
        assert_eq!(again, id2);

        let (id1_again, gen1_again) = alloc.allocate().unwrap();
        assert_eq!(id1_again, id1);
        assert_eq!(gen1_again, gen1 + 1);
        assert_eq!(alloc.generation(id1), Some(gen1 + 1));
    }

    #[test]
    fn test_exhaustion() {
        let mut alloc = SlotAllocator::new(2);
        alloc.allocate().unwrap();
        alloc.allocate().unwrap();
        assert_eq!(alloc.allocate(), Err(SchedError::NoSlotsAvailable));
    }

    #[test]
    fn test_release_out_of_range_is_ignored() {
        let mut alloc = SlotAllocator::new(4);
        alloc.allocate().unwrap();
        alloc.release(GreenId::NONE);
        alloc.release(GreenId::new(3));
        assert_eq!(alloc.allocated_count(), 1);
        assert_eq!(alloc.generation(GreenId::new(3)), None);
    }
}
