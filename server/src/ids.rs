//! Entity id allocation.
//!
//! Ids are 16-bit because they travel in every partial/full wire block.
//! Released ids are recycled, but only become reusable one tick later so a
//! deletion for the old holder is always flushed before the id reappears.

/// Stable handle to an entity in the world registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u16);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out entity ids and recycles released ones with a one-tick delay.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: u16,
    free: Vec<u16>,
    /// Released this tick; drained into `free` on the next tick boundary.
    pending: Vec<u16>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> EntityId {
        if let Some(id) = self.free.pop() {
            return EntityId(id);
        }
        let id = self.next;
        self.next = self.next.wrapping_add(1);
        EntityId(id)
    }

    /// Return an id once its holder is fully removed from the registry and
    /// the spatial index.
    pub fn release(&mut self, id: EntityId) {
        self.pending.push(id.0);
    }

    /// Called at the start of every tick: ids released last tick become
    /// allocatable again.
    pub fn roll_tick(&mut self) {
        self.free.append(&mut self.pending);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_released_id_not_reused_same_tick() {
        let mut alloc = IdAllocator::new();
        let a = alloc.allocate();
        alloc.release(a);

        // Same tick: must hand out a fresh id.
        let b = alloc.allocate();
        assert_ne!(a, b);

        // Next tick: the released id is available again.
        alloc.roll_tick();
        let c = alloc.allocate();
        assert_eq!(a, c);
    }

    #[test]
    fn test_sequential_allocation() {
        let mut alloc = IdAllocator::new();
        assert_eq!(alloc.allocate(), EntityId(0));
        assert_eq!(alloc.allocate(), EntityId(1));
        assert_eq!(alloc.allocate(), EntityId(2));
    }
}
