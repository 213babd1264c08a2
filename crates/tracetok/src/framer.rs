//! Reassembly of length-prefixed records from arbitrarily chunked input.
//!
//! Every record starts with an 8-byte little-endian header word from which the
//! total record length can be derived. The framer keeps the bytes of at most
//! one incomplete record between calls and maintains two properties:
//!
//! 1. every byte passed to [`RecordFramer::feed`] has either been delivered as
//!    part of a record or is held in the leftover buffer, never both;
//! 2. the leftover buffer never holds a complete record once `feed` returns.
//!
//! Records contained in a single chunk are delivered as zero-copy slices of
//! that chunk. A record spanning chunks is stitched into one new allocation.

use bytes::{Buf, Bytes, BytesMut};

use crate::error::{Result, TokenizeError};

/// Size of the record header word.
pub const HEADER_SIZE: usize = 8;

/// Maps a header word to the total record length in bytes (header included).
pub type RecordLenFn = fn(u64) -> u64;

pub struct RecordFramer {
    leftover: BytesMut,
    record_len: RecordLenFn,
}

impl RecordFramer {
    pub fn new(record_len: RecordLenFn) -> Self {
        RecordFramer {
            leftover: BytesMut::new(),
            record_len,
        }
    }

    /// Bytes received that do not yet form a complete record.
    pub fn leftover(&self) -> &[u8] {
        &self.leftover
    }

    fn record_len_bytes(&self, header: u64) -> Result<u64> {
        match (self.record_len)(header) {
            0 => Err(TokenizeError::ZeroLengthRecord),
            len => Ok(len),
        }
    }

    /// Splits `chunk` (together with any leftover bytes) into complete records,
    /// handing each one to `on_record` in stream order.
    ///
    /// Returns an error when a header declares a zero length. The framer must
    /// not be fed again after an error.
    pub fn feed<F>(&mut self, mut chunk: Bytes, mut on_record: F) -> Result<()>
    where
        F: FnMut(Bytes),
    {
        if self.leftover.len() + chunk.len() < HEADER_SIZE {
            // Not even a header yet.
            self.leftover.extend_from_slice(&chunk);
            return Ok(());
        }

        if !self.leftover.is_empty() {
            if self.leftover.len() < HEADER_SIZE {
                let needed = HEADER_SIZE - self.leftover.len();
                self.leftover.extend_from_slice(&chunk[..needed]);
                chunk.advance(needed);
            }

            let header = read_header(&self.leftover, 0);
            let record_len = self.record_len_bytes(header)?;
            let missing = record_len.saturating_sub(self.leftover.len() as u64);

            if missing <= chunk.len() as u64 {
                let missing = missing as usize;
                let mut record = BytesMut::with_capacity(self.leftover.len() + missing);
                record.extend_from_slice(&self.leftover);
                record.extend_from_slice(&chunk[..missing]);
                chunk.advance(missing);
                self.leftover.clear();
                on_record(record.freeze());
            } else {
                self.leftover.extend_from_slice(&chunk);
                return Ok(());
            }
        }

        let mut offset = 0usize;
        while offset + HEADER_SIZE <= chunk.len() {
            let header = read_header(&chunk, offset);
            let record_len = self.record_len_bytes(header)?;
            let available = (chunk.len() - offset) as u64;
            if record_len > available {
                break;
            }
            let end = offset + record_len as usize;
            on_record(chunk.slice(offset..end));
            offset = end;
        }

        self.leftover.extend_from_slice(&chunk[offset..]);
        Ok(())
    }
}

fn read_header(buf: &[u8], offset: usize) -> u64 {
    let mut word = [0u8; HEADER_SIZE];
    word.copy_from_slice(&buf[offset..offset + HEADER_SIZE]);
    u64::from_le_bytes(word)
}
