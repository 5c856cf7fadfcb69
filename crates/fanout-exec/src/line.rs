/// Bounded per-stream line accumulator.
///
/// Bytes are appended one at a time. A newline completes a record; reaching
/// `capacity - 1` buffered bytes forces a record break so a stream that never
/// emits a newline still makes progress in fixed memory. Empty records are
/// never produced, so blank lines and a newline right after a forced break
/// are dropped.
#[derive(Debug, Clone)]
pub struct LineBuffer {
    buf: Vec<u8>,
    limit: usize,
}

impl LineBuffer {
    /// `capacity` must be at least 2.
    pub fn new(capacity: usize) -> Self {
        let limit = capacity.saturating_sub(1).max(1);
        Self {
            buf: Vec::with_capacity(limit),
            limit,
        }
    }

    /// Longest record this buffer can produce.
    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Append `bytes`, returning every record completed along the way.
    ///
    /// The newline itself is not part of the record.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        let mut records = Vec::new();
        for &b in bytes {
            if b == b'\n' {
                if !self.buf.is_empty() {
                    records.push(self.take());
                }
                continue;
            }
            self.buf.push(b);
            if self.buf.len() >= self.limit {
                records.push(self.take());
            }
        }
        records
    }

    /// Remove an unterminated tail, if any. A second call returns `None`.
    pub fn take_partial(&mut self) -> Option<Vec<u8>> {
        if self.buf.is_empty() {
            None
        } else {
            Some(self.take())
        }
    }

    fn take(&mut self) -> Vec<u8> {
        std::mem::replace(&mut self.buf, Vec::with_capacity(self.limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(records: Vec<Vec<u8>>) -> Vec<String> {
        records
            .into_iter()
            .map(|r| String::from_utf8(r).unwrap())
            .collect()
    }

    #[test]
    fn splits_on_newlines_across_chunks() {
        let mut lb = LineBuffer::new(120);
        assert!(lb.feed(b"hel").is_empty());
        assert_eq!(strings(lb.feed(b"lo\nwor")), vec!["hello"]);
        assert_eq!(strings(lb.feed(b"ld\n\n")), vec!["world"]);
        assert!(lb.is_empty());
    }

    #[test]
    fn overflow_forces_a_record_break() {
        let mut lb = LineBuffer::new(5);
        assert_eq!(lb.limit(), 4);
        assert_eq!(strings(lb.feed(b"abcdefghij")), vec!["abcd", "efgh"]);
        assert_eq!(lb.take_partial(), Some(b"ij".to_vec()));
    }

    #[test]
    fn overflow_then_newline_does_not_duplicate() {
        let mut lb = LineBuffer::new(5);
        assert_eq!(strings(lb.feed(b"abcd\n")), vec!["abcd"]);
        assert_eq!(strings(lb.feed(b"\nxy\n")), vec!["xy"]);
    }

    #[test]
    fn blank_lines_produce_no_records() {
        let mut lb = LineBuffer::new(120);
        assert_eq!(strings(lb.feed(b"\n\na\n\n\nb\n")), vec!["a", "b"]);
        assert!(lb.feed(b"\n").is_empty());
        assert_eq!(lb.take_partial(), None);
    }

    #[test]
    fn partial_is_taken_exactly_once() {
        let mut lb = LineBuffer::new(120);
        assert!(lb.feed(b"no newline").is_empty());
        assert_eq!(lb.take_partial(), Some(b"no newline".to_vec()));
        assert_eq!(lb.take_partial(), None);
    }

    #[test]
    fn default_capacity_caps_records() {
        let mut lb = LineBuffer::new(120);
        let long = vec![b'x'; 300];
        let records = lb.feed(&long);
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.len() == 119));
        assert_eq!(lb.take_partial().map(|r| r.len()), Some(62));
    }
}
