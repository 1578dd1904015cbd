use std::collections::BTreeMap;

/// Buffers out-of-order items and hands them back in sequence order.
pub(super) struct Resequencer<T> {
    next_seq: u64,
    pending: BTreeMap<u64, T>,
}

impl<T> Resequencer<T> {
    pub(super) fn new() -> Self {
        Self {
            next_seq: 0,
            pending: BTreeMap::new(),
        }
    }

    pub(super) fn push(&mut self, seq: u64, item: T) {
        if seq < self.next_seq {
            return;
        }
        self.pending.insert(seq, item);
    }

    /// Next item if it continues the released run.
    pub(super) fn pop_ready(&mut self) -> Option<T> {
        let item = self.pending.remove(&self.next_seq)?;
        self.next_seq = self.next_seq.wrapping_add(1);
        Some(item)
    }

    #[cfg(test)]
    pub(super) fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Everything still buffered, in sequence order, gaps skipped.
    pub(super) fn drain_all(&mut self) -> impl Iterator<Item = T> {
        if let Some(last) = self.pending.keys().next_back() {
            self.next_seq = last.wrapping_add(1);
        }
        std::mem::take(&mut self.pending).into_values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn releases_only_contiguous_runs() {
        let mut seq = Resequencer::new();
        seq.push(2, "c");
        seq.push(1, "b");
        assert_eq!(seq.pop_ready(), None);

        seq.push(0, "a");
        assert_eq!(seq.pop_ready(), Some("a"));
        assert_eq!(seq.pop_ready(), Some("b"));
        assert_eq!(seq.pop_ready(), Some("c"));
        assert_eq!(seq.pop_ready(), None);
        assert_eq!(seq.pending_len(), 0);
    }

    #[test]
    fn drain_skips_gaps_in_order() {
        let mut seq = Resequencer::new();
        seq.push(5, 5);
        seq.push(3, 3);
        seq.push(9, 9);
        assert_eq!(seq.drain_all().collect::<Vec<_>>(), vec![3, 5, 9]);
        assert_eq!(seq.pending_len(), 0);

        seq.push(4, 4);
        assert_eq!(seq.pending_len(), 0);
        seq.push(10, 10);
        assert_eq!(seq.pop_ready(), Some(10));
    }
}
