//! Per-run slot table.

use shardcast_common::protocol::NodeOutcome;

/// One write-once slot per dispatched node, addressed by dispatch index.
///
/// Owned by a single run's collector task, so slots need no locking.
#[derive(Debug)]
pub struct SlotTable<S> {
    slots: Vec<Option<NodeOutcome<S>>>,
    filled: usize,
}

impl<S> SlotTable<S> {
    pub fn with_size(size: usize) -> Self {
        Self {
            slots: (0..size).map(|_| None).collect(),
            filled: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn filled(&self) -> usize {
        self.filled
    }

    pub fn is_complete(&self) -> bool {
        self.filled == self.slots.len()
    }

    /// Writes `outcome` into slot `index`.
    ///
    /// Returns `false`, leaving the table untouched, if the index is out of
    /// range or the slot was already written.
    pub fn fill(&mut self, index: usize, outcome: NodeOutcome<S>) -> bool {
        match self.slots.get_mut(index) {
            Some(slot) if slot.is_none() => {
                *slot = Some(outcome);
                self.filled += 1;
                true
            }
            _ => false,
        }
    }

    /// Fills every empty slot with `make(index)`. Returns how many were filled.
    pub fn fill_missing<F>(&mut self, mut make: F) -> usize
    where
        F: FnMut(usize) -> NodeOutcome<S>,
    {
        let mut count = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(make(index));
                count += 1;
            }
        }
        self.filled += count;
        count
    }

    /// Outcomes in dispatch order, paired with their slot index.
    ///
    /// Empty slots are skipped; call this on a complete table.
    pub fn into_outcomes(self) -> impl Iterator<Item = (usize, NodeOutcome<S>)> {
        self.slots
            .into_iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.map(|outcome| (index, outcome)))
    }
}
