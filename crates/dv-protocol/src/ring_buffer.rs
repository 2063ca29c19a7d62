//! Fixed-capacity circular queue
//!
//! Every network adapter queues received datagrams here (length-prefixed)
//! between `clock()` and `read()`. Overflow is destructive: an `add` that
//! does not fit clears the whole buffer so that no partially-queued frame
//! can desynchronise the length framing.

use tracing::error;

/// Circular buffer over a pre-allocated array
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    buffer: Vec<T>,
    input: usize,
    output: usize,
    name: &'static str,
}

impl<T: Copy + Default> RingBuffer<T> {
    /// Create a buffer holding up to `length` items
    pub fn new(length: usize, name: &'static str) -> Self {
        assert!(length > 0, "ring buffer length must be non-zero");
        Self {
            buffer: vec![T::default(); length],
            input: 0,
            output: 0,
            name,
        }
    }

    /// Total capacity
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Append items; on overflow the buffer is cleared and `false` returned
    pub fn add(&mut self, items: &[T]) -> bool {
        if items.len() >= self.free() {
            error!(
                "{} buffer overflow, clearing the buffer. ({} >= {})",
                self.name,
                items.len(),
                self.free()
            );
            self.clear();
            return false;
        }

        for &item in items {
            self.buffer[self.input] = item;
            self.input = (self.input + 1) % self.buffer.len();
        }

        true
    }

    /// Remove items into `out`; fails without mutation when too little is buffered
    pub fn get(&mut self, out: &mut [T]) -> bool {
        if !self.peek(out) {
            return false;
        }
        self.output = (self.output + out.len()) % self.buffer.len();
        true
    }

    /// Copy items into `out` without removing them
    pub fn peek(&self, out: &mut [T]) -> bool {
        if self.size() < out.len() {
            error!(
                "{} buffer underflow. ({} < {})",
                self.name,
                self.size(),
                out.len()
            );
            return false;
        }

        let mut pos = self.output;
        for slot in out.iter_mut() {
            *slot = self.buffer[pos];
            pos = (pos + 1) % self.buffer.len();
        }
        true
    }

    /// Discard `count` items
    pub fn remove(&mut self, count: usize) -> bool {
        if self.size() < count {
            error!(
                "{} buffer underflow. ({} < {})",
                self.name,
                self.size(),
                count
            );
            return false;
        }
        self.output = (self.output + count) % self.buffer.len();
        true
    }

    /// Drop everything buffered
    pub fn clear(&mut self) {
        self.input = 0;
        self.output = 0;
    }

    /// Free space in items
    pub fn free(&self) -> usize {
        self.buffer.len() - self.size()
    }

    /// Number of buffered items
    pub fn size(&self) -> usize {
        if self.input >= self.output {
            self.input - self.output
        } else {
            self.buffer.len() + self.input - self.output
        }
    }

    /// Whether anything is buffered
    pub fn has_data(&self) -> bool {
        self.input != self.output
    }

    /// Whether the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.input == self.output
    }
}

impl RingBuffer<u8> {
    /// Queue one datagram behind a two-byte big-endian length prefix
    pub fn add_frame(&mut self, frame: &[u8]) -> bool {
        let Ok(len) = u16::try_from(frame.len()) else {
            error!("{} frame of {} bytes is too long", self.name, frame.len());
            return false;
        };
        // Prefix and payload go in as one add so an overflow never leaves half a record
        let mut record = Vec::with_capacity(frame.len() + 2);
        record.extend_from_slice(&len.to_be_bytes());
        record.extend_from_slice(frame);
        self.add(&record)
    }

    /// Dequeue one length-prefixed datagram
    pub fn get_frame(&mut self) -> Option<Vec<u8>> {
        let mut len = [0u8; 2];
        if !self.get(&mut len) {
            return None;
        }
        let mut frame = vec![0u8; u16::from_be_bytes(len) as usize];
        if !self.get(&mut frame) {
            self.clear();
            return None;
        }
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_add_get() {
        let mut rb = RingBuffer::<u8>::new(8, "test");
        assert!(rb.add(&[1, 2, 3]));
        assert_eq!(rb.size(), 3);
        let mut out = [0u8; 2];
        assert!(rb.get(&mut out));
        assert_eq!(out, [1, 2]);
        assert_eq!(rb.size(), 1);
    }

    #[test]
    fn test_overflow_clears() {
        let mut rb = RingBuffer::<u8>::new(8, "test");
        assert!(rb.add(&[1, 2, 3, 4]));
        // free is 4, adding 4 must fail and clear
        assert!(!rb.add(&[5, 6, 7, 8]));
        assert_eq!(rb.size(), 0);
        assert!(rb.is_empty());
    }

    #[test]
    fn test_underflow_leaves_buffer() {
        let mut rb = RingBuffer::<u8>::new(8, "test");
        rb.add(&[1, 2]);
        let mut out = [0u8; 3];
        assert!(!rb.get(&mut out));
        assert!(!rb.peek(&mut out));
        assert!(!rb.remove(3));
        assert_eq!(rb.size(), 2);
    }

    #[test]
    fn test_wraparound() {
        let mut rb = RingBuffer::<u8>::new(5, "test");
        let mut out = [0u8; 3];
        rb.add(&[1, 2, 3]);
        rb.get(&mut out);
        rb.add(&[4, 5, 6]);
        assert_eq!(rb.size(), 3);
        assert!(rb.get(&mut out));
        assert_eq!(out, [4, 5, 6]);
    }

    #[test]
    fn test_frames() {
        let mut rb = RingBuffer::<u8>::new(64, "test");
        assert!(rb.add_frame(b"DSRP"));
        assert!(rb.add_frame(b"ICOM!"));
        assert_eq!(rb.get_frame().as_deref(), Some(&b"DSRP"[..]));
        assert_eq!(rb.get_frame().as_deref(), Some(&b"ICOM!"[..]));
        assert!(rb.get_frame().is_none());
    }

    #[test]
    fn test_frame_overflow_clears() {
        let mut rb = RingBuffer::<u8>::new(16, "test");
        assert!(rb.add_frame(&[0u8; 8]));
        assert!(!rb.add_frame(&[0u8; 8]));
        assert!(rb.is_empty());
    }

    proptest! {
        #[test]
        fn size_plus_free_is_capacity(ops in proptest::collection::vec((any::<bool>(), 1usize..10), 0..50)) {
            let mut rb = RingBuffer::<u8>::new(32, "prop");
            for (is_add, n) in ops {
                if is_add {
                    let before = rb.free();
                    let ok = rb.add(&vec![0xAA; n]);
                    if n >= before {
                        prop_assert!(!ok);
                        prop_assert_eq!(rb.size(), 0);
                    } else {
                        prop_assert!(ok);
                    }
                } else {
                    let before = rb.size();
                    let mut out = vec![0u8; n];
                    let ok = rb.get(&mut out);
                    prop_assert_eq!(ok, n <= before);
                    if !ok {
                        prop_assert_eq!(rb.size(), before);
                    }
                }
                prop_assert_eq!(rb.size() + rb.free(), rb.capacity());
            }
        }
    }
}
