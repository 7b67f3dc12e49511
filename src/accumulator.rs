//! Value octets that arrive split across input chunks.

use bytes::{Bytes, BytesMut};

/// Collects the value of one primitive TLV until its declared length is met.
///
/// Only used when a value spans chunk boundaries; a value that arrives whole
/// is handed out as a slice of the chunk instead.
#[derive(Debug, Default)]
pub struct Accumulator {
    buf: BytesMut,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn is_satisfied(&self, declared_length: usize) -> bool {
        self.buf.len() >= declared_length
    }

    /// Octets still missing for a value of `declared_length`.
    pub fn missing(&self, declared_length: usize) -> usize {
        declared_length.saturating_sub(self.buf.len())
    }

    /// Take everything collected so far, leaving the accumulator empty.
    pub fn drain(&mut self) -> Bytes {
        self.buf.split().freeze()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulates_across_feeds() {
        let mut acc = Accumulator::new();
        acc.feed(b"hel");
        assert!(!acc.is_satisfied(5));
        assert_eq!(acc.missing(5), 2);
        acc.feed(b"lo");
        assert!(acc.is_satisfied(5));
        assert_eq!(acc.drain(), Bytes::from_static(b"hello"));
        assert!(acc.is_empty());
    }

    #[test]
    fn test_zero_length_is_immediately_satisfied() {
        let acc = Accumulator::new();
        assert!(acc.is_satisfied(0));
        assert_eq!(acc.missing(0), 0);
    }
}
