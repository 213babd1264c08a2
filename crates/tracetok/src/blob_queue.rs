use std::collections::VecDeque;

use bytes::{Buf, Bytes, BytesMut};

/// A FIFO of byte chunks that can be read as one contiguous stream.
///
/// Reads that fall inside the front chunk are zero-copy; reads spanning
/// several chunks are copied into a single new buffer.
#[derive(Debug, Default)]
pub struct BlobQueue {
    chunks: VecDeque<Bytes>,
    len: usize,
}

impl BlobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_back(&mut self, chunk: Bytes) {
        if chunk.is_empty() {
            return;
        }
        self.len += chunk.len();
        self.chunks.push_back(chunk);
    }

    /// Total number of buffered bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the first `n` bytes without consuming them, or `None` if fewer
    /// than `n` bytes are buffered.
    pub fn peek(&self, n: usize) -> Option<Bytes> {
        if n > self.len {
            return None;
        }
        match self.chunks.front() {
            None => Some(Bytes::new()),
            Some(front) if front.len() >= n => Some(front.slice(..n)),
            Some(_) => {
                let mut out = BytesMut::with_capacity(n);
                for chunk in &self.chunks {
                    let take = (n - out.len()).min(chunk.len());
                    out.extend_from_slice(&chunk[..take]);
                    if out.len() == n {
                        break;
                    }
                }
                Some(out.freeze())
            }
        }
    }

    /// Drops the first `n` bytes. Returns `false`, consuming nothing, if fewer
    /// than `n` bytes are buffered.
    pub fn advance(&mut self, mut n: usize) -> bool {
        if n > self.len {
            return false;
        }
        self.len -= n;
        while n > 0 {
            let Some(front) = self.chunks.front_mut() else {
                break;
            };
            if front.len() > n {
                front.advance(n);
                break;
            }
            n -= front.len();
            self.chunks.pop_front();
        }
        true
    }

    /// Removes and returns the first `n` bytes.
    pub fn take(&mut self, n: usize) -> Option<Bytes> {
        let bytes = self.peek(n)?;
        self.advance(n);
        Some(bytes)
    }

    /// Removes everything, returning the buffered bytes as one blob.
    pub fn take_all(&mut self) -> Bytes {
        let n = self.len;
        self.take(n).unwrap_or_default()
    }
}
