//! Pending Action Queue
//!
//! Actions waiting for their target frame, kept sorted by `(frame, seq)`.
//! Entries with equal keys keep their insertion order.

use std::collections::VecDeque;

/// An item scheduled for a frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Scheduled<T> {
    /// Target frame
    pub frame: u32,
    /// Sequence number assigned by the host
    pub seq: u32,
    /// Payload
    pub item: T,
}

impl<T> Scheduled<T> {
    /// Create an entry.
    pub fn new(frame: u32, seq: u32, item: T) -> Self {
        Self { frame, seq, item }
    }

    fn key(&self) -> (u32, u32) {
        (self.frame, self.seq)
    }
}

/// Sorted queue of scheduled items.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingQueue<T> {
    items: VecDeque<Scheduled<T>>,
}

impl<T> Default for PendingQueue<T> {
    fn default() -> Self {
        Self { items: VecDeque::new() }
    }
}

impl<T> PendingQueue<T> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate in application order.
    pub fn iter(&self) -> impl Iterator<Item = &Scheduled<T>> {
        self.items.iter()
    }

    /// Next item to apply.
    pub fn front(&self) -> Option<&Scheduled<T>> {
        self.items.front()
    }

    /// Insert after every entry whose key is not greater.
    pub fn insert(&mut self, entry: Scheduled<T>) {
        let key = entry.key();
        // Appends are the common case.
        if self.items.back().map_or(true, |last| last.key() <= key) {
            self.items.push_back(entry);
            return;
        }
        let at = self.items.partition_point(|e| e.key() <= key);
        self.items.insert(at, entry);
    }

    /// Remove and return every entry due at or before `frame`.
    pub fn pop_due(&mut self, frame: u32) -> Vec<Scheduled<T>> {
        let n = self.count_before(frame.saturating_add(1));
        self.items.drain(..n).collect()
    }

    /// Drop the first `count` entries.
    pub fn drop_prefix(&mut self, count: usize) {
        let n = count.min(self.items.len());
        self.items.drain(..n);
    }

    /// Drop leading entries while `pred` holds, returning how many went.
    pub fn drop_while(&mut self, mut pred: impl FnMut(&Scheduled<T>) -> bool) -> usize {
        let mut n = 0;
        while self.items.front().is_some_and(&mut pred) {
            self.items.pop_front();
            n += 1;
        }
        n
    }

    /// Merge another sorted queue. On equal keys, entries already here go first.
    pub fn merge(&mut self, other: PendingQueue<T>) {
        let mut left = std::mem::take(&mut self.items);
        let mut right = other.items;
        let mut merged = VecDeque::with_capacity(left.len() + right.len());
        loop {
            let take_left = match (left.front(), right.front()) {
                (Some(l), Some(r)) => l.key() <= r.key(),
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (None, None) => break,
            };
            let next = if take_left { left.pop_front() } else { right.pop_front() };
            merged.extend(next);
        }
        self.items = merged;
    }

    /// Number of entries targeting a frame before `frame`.
    pub fn count_before(&self, frame: u32) -> usize {
        self.items.partition_point(|e| e.frame < frame)
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T> FromIterator<Scheduled<T>> for PendingQueue<T> {
    fn from_iter<I: IntoIterator<Item = Scheduled<T>>>(iter: I) -> Self {
        let mut q = Self::new();
        for e in iter {
            q.insert(e);
        }
        q
    }
}

impl<T> IntoIterator for PendingQueue<T> {
    type Item = Scheduled<T>;
    type IntoIter = std::collections::vec_deque::IntoIter<Scheduled<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn keys<T>(q: &PendingQueue<T>) -> Vec<(u32, u32)> {
        q.iter().map(|e| (e.frame, e.seq)).collect()
    }

    #[test]
    fn test_ties_keep_arrival_order() {
        let mut q = PendingQueue::new();
        q.insert(Scheduled::new(5, 1, "a"));
        q.insert(Scheduled::new(3, 0, "b"));
        q.insert(Scheduled::new(5, 1, "c"));
        q.insert(Scheduled::new(5, 0, "d"));
        let items: Vec<_> = q.iter().map(|e| e.item).collect();
        assert_eq!(items, vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn test_pop_due() {
        let mut q: PendingQueue<()> = [(1, 0), (2, 1), (2, 2), (7, 3)]
            .into_iter()
            .map(|(f, s)| Scheduled::new(f, s, ()))
            .collect();
        assert_eq!(q.count_before(2), 1);
        let due = q.pop_due(2);
        assert_eq!(due.len(), 3);
        assert_eq!(keys(&q), vec![(7, 3)]);
        assert!(q.pop_due(6).is_empty());
    }

    #[test]
    fn test_drop_while_seq() {
        let mut q: PendingQueue<()> = (0..5).map(|s| Scheduled::new(10, s, ())).collect();
        assert_eq!(q.drop_while(|e| e.seq <= 2), 3);
        assert_eq!(q.front().map(|e| e.seq), Some(3));
    }

    proptest! {
        #[test]
        fn prop_insert_sorted_and_stable(entries in prop::collection::vec((0u32..20, 0u32..5), 0..60)) {
            let q: PendingQueue<usize> = entries
                .iter()
                .enumerate()
                .map(|(i, &(f, s))| Scheduled::new(f, s, i))
                .collect();
            let mut expected: Vec<(u32, u32, usize)> =
                entries.iter().enumerate().map(|(i, &(f, s))| (f, s, i)).collect();
            expected.sort_by_key(|&(f, s, _)| (f, s));
            let got: Vec<(u32, u32, usize)> = q.iter().map(|e| (e.frame, e.seq, e.item)).collect();
            prop_assert_eq!(got, expected);
        }

        #[test]
        fn prop_merge_matches_sort(
            a in prop::collection::vec((0u32..20, 0u32..5), 0..40),
            b in prop::collection::vec((0u32..20, 0u32..5), 0..40),
        ) {
            let qa: PendingQueue<(u8, usize)> =
                a.iter().enumerate().map(|(i, &(f, s))| Scheduled::new(f, s, (0, i))).collect();
            let qb: PendingQueue<(u8, usize)> =
                b.iter().enumerate().map(|(i, &(f, s))| Scheduled::new(f, s, (1, i))).collect();

            let mut expected: Vec<_> = qa.iter().chain(qb.iter()).cloned().collect();
            expected.sort_by_key(|e| (e.frame, e.seq));

            let mut merged = qa.clone();
            merged.merge(qb);
            let got: Vec<_> = merged.into_iter().collect();
            prop_assert_eq!(got, expected);
        }

        #[test]
        fn prop_count_before(entries in prop::collection::vec((0u32..50, 0u32..5), 0..60), frame in 0u32..60) {
            let q: PendingQueue<()> = entries.iter().map(|&(f, s)| Scheduled::new(f, s, ())).collect();
            let expected = entries.iter().filter(|(f, _)| *f < frame).count();
            prop_assert_eq!(q.count_before(frame), expected);
        }
    }
}
