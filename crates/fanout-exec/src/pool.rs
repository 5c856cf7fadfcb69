//! Ring of live execution slots.
//!
//! Slots live in a slab (`Vec` of entries plus a free list) and are linked into a
//! circular doubly-linked ring by index. A cursor marks the current position:
//! [`SlotPool::admit`] inserts right after it, [`SlotPool::remove`] splices a slot
//! out and hands back its successor. Both are O(1); index reuse goes through the
//! free list so the slab never grows past the peak pool size.
//!
//! The pool has a single owner (the scheduler loop), so no ring state is ever
//! visible half-spliced.

use std::fmt;

/// Stable handle to a slot while it is in the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(usize);

impl SlotId {
    #[cfg(test)]
    pub(crate) fn from_raw(idx: usize) -> Self {
        SlotId(idx)
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
enum Entry<T> {
    Occupied { value: T, prev: usize, next: usize },
    Vacant { next_free: Option<usize> },
}

/// Result of splicing a slot out of the ring.
#[derive(Debug)]
pub struct Removed<T> {
    pub value: T,
    /// Successor to visit next; `None` when the ring became empty.
    pub next: Option<SlotId>,
}

#[derive(Debug)]
pub struct SlotPool<T> {
    entries: Vec<Entry<T>>,
    free: Option<usize>,
    cursor: Option<usize>,
    len: usize,
}

impl<T> Default for SlotPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SlotPool<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            free: None,
            cursor: None,
            len: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            ..Self::new()
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert `value` right after the cursor and move the cursor onto it.
    pub fn admit(&mut self, value: T) -> SlotId {
        let idx = self.alloc();
        let (prev, next) = match self.cursor {
            None => (idx, idx),
            Some(cur) => (cur, self.next_of(cur)),
        };
        self.entries[idx] = Entry::Occupied { value, prev, next };
        if prev != idx {
            self.set_next(prev, idx);
            self.set_prev(next, idx);
        }
        self.cursor = Some(idx);
        self.len += 1;
        SlotId(idx)
    }

    /// Splice `id` out of the ring.
    ///
    /// If the cursor pointed at the removed slot it moves to the successor.
    /// Returns `None` for an id that is not in the pool.
    pub fn remove(&mut self, id: SlotId) -> Option<Removed<T>> {
        let idx = id.0;
        let (prev, next) = match self.entries.get(idx)? {
            Entry::Occupied { prev, next, .. } => (*prev, *next),
            Entry::Vacant { .. } => return None,
        };

        let successor = if next == idx {
            None
        } else {
            self.set_next(prev, next);
            self.set_prev(next, prev);
            Some(next)
        };

        if self.cursor == Some(idx) {
            self.cursor = successor;
        }

        let old = std::mem::replace(
            &mut self.entries[idx],
            Entry::Vacant {
                next_free: self.free,
            },
        );
        self.free = Some(idx);
        self.len -= 1;

        match old {
            Entry::Occupied { value, .. } => Some(Removed {
                value,
                next: successor.map(SlotId),
            }),
            Entry::Vacant { .. } => None,
        }
    }

    pub fn get(&self, id: SlotId) -> Option<&T> {
        match self.entries.get(id.0)? {
            Entry::Occupied { value, .. } => Some(value),
            Entry::Vacant { .. } => None,
        }
    }

    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut T> {
        match self.entries.get_mut(id.0)? {
            Entry::Occupied { value, .. } => Some(value),
            Entry::Vacant { .. } => None,
        }
    }

    /// Linear scan from the cursor, bounded by the pool size.
    pub fn find(&self, mut pred: impl FnMut(&T) -> bool) -> Option<SlotId> {
        self.iter().find(|(_, v)| pred(v)).map(|(id, _)| id)
    }

    /// Walk the ring once, starting at the cursor.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            pool: self,
            at: self.cursor,
            remaining: self.len,
        }
    }

    fn alloc(&mut self) -> usize {
        match self.free {
            Some(idx) => {
                self.free = match self.entries[idx] {
                    Entry::Vacant { next_free } => next_free,
                    Entry::Occupied { .. } => None,
                };
                idx
            }
            None => {
                self.entries.push(Entry::Vacant { next_free: None });
                self.entries.len() - 1
            }
        }
    }

    fn next_of(&self, idx: usize) -> usize {
        match self.entries[idx] {
            Entry::Occupied { next, .. } => next,
            Entry::Vacant { .. } => idx,
        }
    }

    fn set_next(&mut self, idx: usize, to: usize) {
        if let Entry::Occupied { next, .. } = &mut self.entries[idx] {
            *next = to;
        }
    }

    fn set_prev(&mut self, idx: usize, to: usize) {
        if let Entry::Occupied { prev, .. } = &mut self.entries[idx] {
            *prev = to;
        }
    }
}

pub struct Iter<'a, T> {
    pool: &'a SlotPool<T>,
    at: Option<usize>,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (SlotId, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let idx = self.at?;
        match &self.pool.entries[idx] {
            Entry::Occupied { value, next, .. } => {
                self.remaining -= 1;
                self.at = Some(*next);
                Some((SlotId(idx), value))
            }
            Entry::Vacant { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(pool: &SlotPool<&'static str>) -> Vec<&'static str> {
        pool.iter().map(|(_, v)| *v).collect()
    }

    fn cursor<T>(pool: &SlotPool<T>) -> Option<SlotId> {
        pool.cursor.map(SlotId)
    }

    #[test]
    fn admit_inserts_after_cursor() {
        let mut pool = SlotPool::new();
        let a = pool.admit("a");
        assert_eq!(cursor(&pool), Some(a));
        pool.admit("b");
        pool.admit("c");

        // Cursor sits on the newest slot; the ring continues in admission order.
        assert_eq!(ring(&pool), vec!["c", "a", "b"]);
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn remove_returns_successor_and_moves_cursor() {
        let mut pool = SlotPool::new();
        let a = pool.admit("a");
        let b = pool.admit("b");
        let c = pool.admit("c");

        let removed = pool.remove(c).unwrap();
        assert_eq!(removed.value, "c");
        assert_eq!(removed.next, Some(a));
        assert_eq!(cursor(&pool), Some(a));
        assert_eq!(ring(&pool), vec!["a", "b"]);

        // Removing a non-cursor slot leaves the cursor alone.
        let removed = pool.remove(b).unwrap();
        assert_eq!(removed.next, Some(a));
        assert_eq!(cursor(&pool), Some(a));
        assert_eq!(ring(&pool), vec!["a"]);
    }

    #[test]
    fn removing_last_slot_empties_ring() {
        let mut pool = SlotPool::new();
        let a = pool.admit("a");
        let removed = pool.remove(a).unwrap();

        assert_eq!(removed.next, None);
        assert!(pool.is_empty());
        assert_eq!(cursor(&pool), None);
        assert_eq!(pool.iter().count(), 0);
        assert!(pool.remove(a).is_none());

        // The pool is usable again after going empty.
        pool.admit("b");
        assert_eq!(ring(&pool), vec!["b"]);
    }

    #[test]
    fn freed_indices_are_reused() {
        let mut pool = SlotPool::with_capacity(2);
        let a = pool.admit("a");
        pool.admit("b");
        pool.remove(a);
        let c = pool.admit("c");
        assert_eq!(c.0, a.0);
        assert_eq!(pool.entries.len(), 2);
        assert_eq!(pool.get(c), Some(&"c"));
    }

    #[test]
    fn stale_id_is_rejected() {
        let mut pool = SlotPool::new();
        let a = pool.admit("a");
        pool.admit("b");
        pool.remove(a);
        assert!(pool.get(a).is_none());
        assert!(pool.get_mut(a).is_none());
        assert!(pool.remove(a).is_none());
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn find_walks_the_whole_ring() {
        let mut pool = SlotPool::new();
        let one = pool.admit(1);
        let two = pool.admit(2);
        pool.admit(3);

        // The match before the cursor is still reached after wrapping.
        assert_eq!(pool.find(|v| *v == 1), Some(one));
        assert_eq!(pool.find(|v| *v == 2), Some(two));
        assert_eq!(pool.find(|v| *v == 9), None);
    }

    #[test]
    fn draining_by_successor_visits_every_slot() {
        let mut pool = SlotPool::new();
        for v in 0..6 {
            pool.admit(v);
        }
        let mut at = pool.find(|v| v % 2 == 0);
        let mut removed = Vec::new();
        while let Some(id) = at {
            let r = pool.remove(id).unwrap();
            removed.push(r.value);
            at = r.next;
        }
        removed.sort();
        assert_eq!(removed, vec![0, 1, 2, 3, 4, 5]);
        assert!(pool.is_empty());
        assert_eq!(cursor(&pool), None);
    }
}
