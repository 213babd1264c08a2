use serde::Serialize;

/// Size of one record word in bytes.
pub const WORD_SIZE: usize = 8;

/// An inclusive range of bits `[lo, hi]` within a little-endian 64-bit word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitRange {
    pub lo: u32,
    pub hi: u32,
}

impl BitRange {
    pub const fn new(lo: u32, hi: u32) -> Self {
        BitRange { lo, hi }
    }

    /// Extracts this range from `word`.
    #[inline]
    pub const fn get(self, word: u64) -> u64 {
        read_field(word, self.lo, self.hi)
    }

    #[inline]
    pub const fn get_u32(self, word: u64) -> u32 {
        self.get(word) as u32
    }

    /// Places `value` into this range of `word`. Bits of `value` that do not
    /// fit are discarded.
    #[inline]
    pub const fn set(self, word: u64, value: u64) -> u64 {
        let mask = field_mask(self.lo, self.hi);
        (word & !(mask << self.lo)) | ((value & mask) << self.lo)
    }
}

const fn field_mask(lo: u32, hi: u32) -> u64 {
    let width = hi - lo + 1;
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// Extracts bits `[lo, hi]` (inclusive) from `word`.
#[inline]
pub const fn read_field(word: u64, lo: u32, hi: u32) -> u64 {
    (word >> lo) & field_mask(lo, hi)
}

/// Process and thread koids of a thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct ThreadInfo {
    pub pid: u64,
    pub tid: u64,
}

/// Converts a tick count to nanoseconds.
///
/// Returns `None` when `ticks_per_second` is zero or when the result does not
/// fit into a non-negative `i64`.
pub fn ticks_to_ns(ticks: u64, ticks_per_second: u64) -> Option<i64> {
    if ticks_per_second == 0 {
        return None;
    }
    let ns = (ticks as u128 * 1_000_000_000u128) / ticks_per_second as u128;
    i64::try_from(ns).ok()
}

/// Number of words needed to hold `len` bytes.
#[inline]
pub fn words_for(len: u64) -> u64 {
    len.div_ceil(WORD_SIZE as u64)
}

/// A forward-only reader over the bytes of one complete record.
///
/// Every read returns `None` when not enough bytes remain; a failed read leaves
/// the position untouched. Variable-length data (inline strings, blobs) is
/// padded to whole words, matching the wire format.
#[derive(Debug, Clone)]
pub struct RecordCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> RecordCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        RecordCursor { data, pos: 0 }
    }

    /// Current position in bytes.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Current position in whole words from the start of the record.
    pub fn word_index(&self) -> u64 {
        (self.pos / WORD_SIZE) as u64
    }

    /// Moves to word `index`. Fails, without moving, when `index` lies past
    /// the end of the record.
    pub fn set_word_index(&mut self, index: u64) -> Option<()> {
        let byte_pos = index.checked_mul(WORD_SIZE as u64)?;
        if byte_pos > self.data.len() as u64 {
            return None;
        }
        self.pos = byte_pos as usize;
        Some(())
    }

    /// Skips `n` words.
    pub fn skip_words(&mut self, n: u64) -> Option<()> {
        let index = self.word_index().checked_add(n)?;
        self.set_word_index(index)
    }

    /// Reads `n` bytes as a slice.
    fn read_slice(&mut self, n: u64) -> Option<&'a [u8]> {
        if n > self.remaining() as u64 {
            return None;
        }
        let start = self.pos;
        self.pos += n as usize;
        Some(&self.data[start..self.pos])
    }

    /// Reads `len` bytes padded up to a whole number of words.
    fn read_padded(&mut self, len: u64) -> Option<&'a [u8]> {
        let padded = words_for(len) * WORD_SIZE as u64;
        let bytes = self.read_slice(padded)?;
        Some(&bytes[..len as usize])
    }

    /// Reads a little-endian u64.
    pub fn read_u64(&mut self) -> Option<u64> {
        let b = self.read_slice(8)?;
        Some(u64::from_le_bytes(b.try_into().ok()?))
    }

    /// Reads a little-endian i64.
    pub fn read_i64(&mut self) -> Option<i64> {
        self.read_u64().map(|u| u as i64)
    }

    /// Reads a little-endian f64.
    pub fn read_f64(&mut self) -> Option<f64> {
        self.read_u64().map(f64::from_bits)
    }

    /// Reads an inline string of `len` bytes.
    pub fn read_inline_string(&mut self, len: u32) -> Option<&'a [u8]> {
        self.read_padded(len as u64)
    }

    /// Reads an inline thread: a process koid word followed by a thread koid word.
    pub fn read_inline_thread(&mut self) -> Option<ThreadInfo> {
        let start = self.pos;
        let pid = self.read_u64()?;
        match self.read_u64() {
            Some(tid) => Some(ThreadInfo { pid, tid }),
            None => {
                self.pos = start;
                None
            }
        }
    }

    /// Reads a tick count and converts it to nanoseconds.
    ///
    /// Fails when the word is missing or the conversion overflows.
    pub fn read_timestamp(&mut self, ticks_per_second: u64) -> Option<i64> {
        let start = self.pos;
        let ticks = self.read_u64()?;
        match ticks_to_ns(ticks, ticks_per_second) {
            Some(ts) => Some(ts),
            None => {
                self.pos = start;
                None
            }
        }
    }

    /// Reads a word-padded blob of `len` bytes.
    pub fn read_blob(&mut self, len: u64) -> Option<&'a [u8]> {
        self.read_padded(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(ws: &[u64]) -> Vec<u8> {
        ws.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    #[test]
    fn test_read_field() {
        let word = 0xABCD_0000_0000_1234u64;
        assert_eq!(read_field(word, 0, 3), 0x4);
        assert_eq!(read_field(word, 4, 15), 0x123);
        assert_eq!(read_field(word, 48, 63), 0xABCD);
        assert_eq!(read_field(u64::MAX, 0, 63), u64::MAX);
    }

    #[test]
    fn test_bit_range_set() {
        let r = BitRange::new(4, 15);
        let word = r.set(0x3, 0x12);
        assert_eq!(word, 0x123);
        assert_eq!(r.get(word), 0x12);
        // Values wider than the range are truncated.
        assert_eq!(r.get(r.set(0, 0x1FFF)), 0xFFF);
    }

    #[test]
    fn test_reader_u64() {
        let data = words(&[42, 7]);
        let mut c = RecordCursor::new(&data);
        assert_eq!(c.read_u64(), Some(42));
        assert_eq!(c.read_i64(), Some(7));
        assert_eq!(c.read_u64(), None);
        assert_eq!(c.position(), 16);
    }

    #[test]
    fn test_failed_read_does_not_move() {
        let data = [1u8, 2, 3];
        let mut c = RecordCursor::new(&data);
        assert_eq!(c.read_u64(), None);
        assert_eq!(c.position(), 0);
    }

    #[test]
    fn test_inline_string_padding() {
        let mut data = b"hello\0\0\0".to_vec();
        data.extend_from_slice(&9u64.to_le_bytes());
        let mut c = RecordCursor::new(&data);
        assert_eq!(c.read_inline_string(5), Some(&b"hello"[..]));
        assert_eq!(c.word_index(), 1);
        assert_eq!(c.read_u64(), Some(9));
    }

    #[test]
    fn test_inline_string_empty() {
        let mut c = RecordCursor::new(&[]);
        assert_eq!(c.read_inline_string(0), Some(&b""[..]));
    }

    #[test]
    fn test_inline_string_truncated() {
        let data = b"hel".to_vec();
        let mut c = RecordCursor::new(&data);
        assert_eq!(c.read_inline_string(3), None);
        assert_eq!(c.position(), 0);
    }

    #[test]
    fn test_inline_thread() {
        let data = words(&[10, 20]);
        let mut c = RecordCursor::new(&data);
        assert_eq!(c.read_inline_thread(), Some(ThreadInfo { pid: 10, tid: 20 }));

        let data = words(&[10]);
        let mut c = RecordCursor::new(&data);
        assert_eq!(c.read_inline_thread(), None);
        assert_eq!(c.position(), 0);
    }

    #[test]
    fn test_read_timestamp() {
        let data = words(&[2_000]);
        let mut c = RecordCursor::new(&data);
        assert_eq!(c.read_timestamp(1_000), Some(2_000_000_000));
    }

    #[test]
    fn test_read_timestamp_overflow() {
        let data = words(&[u64::MAX]);
        let mut c = RecordCursor::new(&data);
        assert_eq!(c.read_timestamp(1), None);
        assert_eq!(c.position(), 0);
    }

    #[test]
    fn test_ticks_to_ns() {
        assert_eq!(ticks_to_ns(1_000_000_000, 1_000_000_000), Some(1_000_000_000));
        assert_eq!(ticks_to_ns(3, 2), Some(1_500_000_000));
        assert_eq!(ticks_to_ns(i64::MAX as u64, 1_000_000_000), Some(i64::MAX));
        assert_eq!(ticks_to_ns(u64::MAX, 1_000_000_000), None);
        assert_eq!(ticks_to_ns(1, 0), None);
        assert_eq!(ticks_to_ns(u64::MAX, 1_000), None);
    }

    #[test]
    fn test_set_word_index_bounds() {
        let data = words(&[1, 2, 3]);
        let mut c = RecordCursor::new(&data);
        assert_eq!(c.set_word_index(3), Some(()));
        assert_eq!(c.remaining(), 0);
        assert_eq!(c.set_word_index(4), None);
        assert_eq!(c.word_index(), 3);
        assert_eq!(c.set_word_index(1), Some(()));
        assert_eq!(c.read_u64(), Some(2));
        assert_eq!(c.set_word_index(u64::MAX), None);
    }

    #[test]
    fn test_skip_words() {
        let data = words(&[1, 2, 3]);
        let mut c = RecordCursor::new(&data);
        assert_eq!(c.skip_words(2), Some(()));
        assert_eq!(c.read_u64(), Some(3));
        assert_eq!(c.skip_words(1), None);
    }

    #[test]
    fn test_read_blob() {
        let mut data = vec![1u8, 2, 3, 0, 0, 0, 0, 0];
        data.extend_from_slice(&5u64.to_le_bytes());
        let mut c = RecordCursor::new(&data);
        assert_eq!(c.read_blob(3), Some(&[1u8, 2, 3][..]));
        assert_eq!(c.read_u64(), Some(5));
    }
}
