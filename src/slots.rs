use std::collections::BTreeSet;

/// Hands out the smallest free slot number, starting at 1. Freed slots are
/// reused, so the numbers stay small enough to name containers by
#[derive(Debug)]
pub(crate) struct Slots {
    free: BTreeSet<usize>,
    next: usize,
}

impl Slots {
    pub(crate) fn new() -> Self {
        Self {
            free: BTreeSet::new(),
            next: 1,
        }
    }

    pub(crate) fn take(&mut self) -> usize {
        match self.free.pop_first() {
            Some(slot) => slot,
            None => {
                let slot = self.next;
                self.next += 1;
                slot
            }
        }
    }

    pub(crate) fn give(&mut self, slot: usize) {
        debug_assert!(slot > 0 && slot < self.next, "foreign slot {slot}");
        self.free.insert(slot);
    }
}
