//! The internal receive buffer.
//!
//! An ordered sequence of opaque byte blocks plus a running size counter.
//! `get` is the only operation allowed to split a block; `unget` always
//! prepends a whole new block (or an entire other buffer, preserving
//! order) rather than merging into an existing one.

use std::collections::VecDeque;

/// The chunk size every raw read asks the transport for, absent a
/// smaller caller-supplied hint.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

#[derive(Debug, Default)]
pub struct Buffer {
    blocks: VecDeque<Box<[u8]>>,
    size: usize,
}

impl Buffer {
    pub fn new() -> Self {
        Buffer {
            blocks: VecDeque::new(),
            size: 0,
        }
    }

    /// Total number of buffered bytes. O(1).
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Appends a block at the tail. A no-op if `block` is empty, so the
    /// "no empty block ever stored" invariant always holds.
    pub fn add(&mut self, block: impl Into<Box<[u8]>>) {
        let block = block.into();
        if block.is_empty() {
            return;
        }
        self.size += block.len();
        self.blocks.push_back(block);
    }

    /// Prepends a block at the head, as if it had never been consumed.
    /// A no-op if `block` is empty.
    pub fn unget(&mut self, block: impl Into<Box<[u8]>>) {
        let block = block.into();
        if block.is_empty() {
            return;
        }
        self.size += block.len();
        self.blocks.push_front(block);
    }

    /// Prepends an entire other buffer, preserving its internal order, as
    /// a single push-back operation.
    pub fn unget_buffer(&mut self, mut other: Buffer) {
        while let Some(block) = other.blocks.pop_back() {
            self.size += block.len();
            self.blocks.push_front(block);
        }
        other.size = 0;
    }

    /// Returns up to `n` bytes from the front (all buffered bytes if `n`
    /// is `None` or `>= size`). Splits the head block if `n` falls in its
    /// interior; never copies untouched tail blocks out unnecessarily.
    pub fn get(&mut self, n: Option<usize>) -> Box<[u8]> {
        let want = n.unwrap_or(self.size).min(self.size);
        if want == 0 {
            return Box::new([]);
        }
        if want == self.size {
            // Fast path: take everything without a byte-by-byte copy loop
            // beyond the unavoidable flatten.
            let mut out = Vec::with_capacity(self.size);
            for block in self.blocks.drain(..) {
                out.extend_from_slice(&block);
            }
            self.size = 0;
            return out.into_boxed_slice();
        }

        let mut out = Vec::with_capacity(want);
        let mut remaining = want;
        while remaining > 0 {
            let block = self.blocks.front_mut().expect("size invariant violated");
            if block.len() <= remaining {
                out.extend_from_slice(block);
                remaining -= block.len();
                self.blocks.pop_front();
            } else {
                out.extend_from_slice(&block[..remaining]);
                let rest = block[remaining..].to_vec().into_boxed_slice();
                *block = rest;
                remaining = 0;
            }
        }
        self.size -= want;
        out.into_boxed_slice()
    }

    /// The chunk size a raw read should request: `min(hint, 4096)` when a
    /// hint is given, else `4096`.
    pub fn get_fill_size(&self, hint: Option<usize>) -> usize {
        match hint {
            Some(h) => h.min(DEFAULT_CHUNK_SIZE),
            None => DEFAULT_CHUNK_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_skips_empty_blocks() {
        let mut b = Buffer::new();
        b.add(Vec::new());
        assert_eq!(b.size(), 0);
        assert!(b.is_empty());
    }

    #[test]
    fn size_tracks_added_bytes() {
        let mut b = Buffer::new();
        b.add(*b"hello");
        b.add(*b" world");
        assert_eq!(b.size(), 11);
    }

    #[test]
    fn get_none_drains_everything_in_order() {
        let mut b = Buffer::new();
        b.add(*b"abc");
        b.add(*b"def");
        assert_eq!(&*b.get(None), b"abcdef");
        assert_eq!(b.size(), 0);
    }

    #[test]
    fn get_splits_head_block() {
        let mut b = Buffer::new();
        b.add(*b"abcdef");
        assert_eq!(&*b.get(Some(2)), b"ab");
        assert_eq!(b.size(), 4);
        assert_eq!(&*b.get(Some(4)), b"cdef");
        assert_eq!(b.size(), 0);
    }

    #[test]
    fn get_across_multiple_blocks() {
        let mut b = Buffer::new();
        b.add(*b"ab");
        b.add(*b"cd");
        b.add(*b"ef");
        assert_eq!(&*b.get(Some(3)), b"abc");
        assert_eq!(&*b.get(Some(3)), b"def");
    }

    #[test]
    fn unget_prepends_in_original_order() {
        let mut b = Buffer::new();
        b.add(*b"World");
        b.unget(*b"Hello ");
        assert_eq!(&*b.get(None), b"Hello World");
    }

    #[test]
    fn unget_buffer_preserves_order() {
        let mut a = Buffer::new();
        a.add(*b"tail");
        let mut popped = Buffer::new();
        popped.add(*b"head-");
        popped.add(*b"more-");
        a.unget_buffer(popped);
        assert_eq!(&*a.get(None), b"head-more-tail");
    }

    #[test]
    fn get_fill_size_caps_at_default() {
        let b = Buffer::new();
        assert_eq!(b.get_fill_size(None), DEFAULT_CHUNK_SIZE);
        assert_eq!(b.get_fill_size(Some(10)), 10);
        assert_eq!(b.get_fill_size(Some(999_999)), DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn get_more_than_size_returns_all() {
        let mut b = Buffer::new();
        b.add(*b"abc");
        assert_eq!(&*b.get(Some(100)), b"abc");
        assert!(b.is_empty());
    }
}
