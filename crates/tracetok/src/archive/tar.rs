//! Streaming reader for ustar and GNU tar archives.

use std::sync::Arc;

use bytes::Bytes;

use crate::archive::entry::{parse_entries, ArchiveEntry};
use crate::blob_queue::BlobQueue;
use crate::context::TraceContext;
use crate::error::{Result, TokenizeError};
use crate::reader::ChunkedTraceReader;
use crate::stats::Stat;

pub const BLOCK_SIZE: usize = 512;

const USTAR_MAGIC: &[u8] = b"ustar\0";
const USTAR_VERSION: &[u8] = b"00";
const GNU_MAGIC: &[u8] = b"ustar ";
const GNU_VERSION: &[u8] = b" \0";

const TYPE_REGULAR: u8 = b'0';
const TYPE_REGULAR_OLD: u8 = b'\0';
const TYPE_CONTIGUOUS: u8 = b'7';
const TYPE_GNU_LONG_NAME: u8 = b'L';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Expecting a header block.
    Metadata,
    /// One all-zero block seen; a second one ends the archive.
    ZeroMetadata,
    /// Expecting the content of the entry described by the last header.
    Content,
    Done,
}

#[derive(Debug)]
enum ContentKind {
    File(String),
    LongName,
    Skip,
}

#[derive(Debug)]
struct PendingContent {
    kind: ContentKind,
    size: usize,
    /// `size` rounded up to a whole number of blocks.
    padded: usize,
}

/// Fields of a tar header block used by the reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TarHeader {
    pub name: String,
    pub size: u64,
    pub type_flag: u8,
}

impl TarHeader {
    /// Parses one 512-byte header block.
    pub fn parse(block: &[u8]) -> Result<TarHeader> {
        if block.len() != BLOCK_SIZE {
            return Err(TokenizeError::PrematureEof("tar"));
        }
        let magic = &block[257..263];
        let version = &block[263..265];
        let is_ustar = magic == USTAR_MAGIC && version == USTAR_VERSION;
        let is_gnu = magic == GNU_MAGIC && version == GNU_VERSION;
        if !is_ustar && !is_gnu {
            return Err(TokenizeError::InvalidTarMagic(
                String::from_utf8_lossy(magic).into_owned(),
            ));
        }

        let mut name = c_string(&block[0..100]);
        if is_ustar {
            let prefix = c_string(&block[345..500]);
            if !prefix.is_empty() {
                name = format!("{}/{}", prefix, name);
            }
        }

        Ok(TarHeader {
            name,
            size: parse_size(&block[124..136])?,
            type_flag: block[156],
        })
    }
}

fn c_string(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

fn invalid_size(field: &[u8]) -> TokenizeError {
    TokenizeError::InvalidTarField {
        field: "size",
        value: String::from_utf8_lossy(field).into_owned(),
    }
}

/// Parses the size field: NUL or space terminated octal, or GNU base-256
/// when the high bit of the first byte is set.
pub fn parse_size(field: &[u8]) -> Result<u64> {
    if field.first().is_some_and(|b| b & 0x80 != 0) {
        let mut value: u64 = (field[0] & 0x7F) as u64;
        for &b in &field[1..] {
            value = value
                .checked_mul(256)
                .and_then(|v| v.checked_add(b as u64))
                .ok_or_else(|| invalid_size(field))?;
        }
        return Ok(value);
    }

    let mut value: u64 = 0;
    let mut seen_digit = false;
    for &b in field {
        match b {
            b'0'..=b'7' => {
                seen_digit = true;
                value = value
                    .checked_mul(8)
                    .and_then(|v| v.checked_add((b - b'0') as u64))
                    .ok_or_else(|| invalid_size(field))?;
            }
            b' ' | 0 if seen_digit => break,
            b' ' => continue,
            0 => break,
            _ => return Err(invalid_size(field)),
        }
    }
    Ok(value)
}

/// Reads a tar archive, collecting its regular files, and parses them as
/// traces once the stream ends.
pub struct TarReader {
    ctx: Arc<TraceContext>,
    state: State,
    buffer: BlobQueue,
    pending: Option<PendingContent>,
    long_name: Option<String>,
    entries: Vec<ArchiveEntry>,
}

impl TarReader {
    pub fn new(ctx: Arc<TraceContext>) -> Self {
        TarReader {
            ctx,
            state: State::Metadata,
            buffer: BlobQueue::new(),
            pending: None,
            long_name: None,
            entries: Vec::new(),
        }
    }

    /// Entries collected so far, in archive order.
    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    /// Consumes one header block if available.
    fn parse_metadata(&mut self) -> Result<bool> {
        let Some(block) = self.buffer.take(BLOCK_SIZE) else {
            return Ok(false);
        };

        if block.iter().all(|&b| b == 0) {
            self.state = match self.state {
                State::ZeroMetadata => State::Done,
                _ => State::ZeroMetadata,
            };
            return Ok(true);
        }

        let header = TarHeader::parse(&block)?;
        let too_large = || TokenizeError::InvalidTarField {
            field: "size",
            value: header.size.to_string(),
        };
        let size = usize::try_from(header.size).map_err(|_| too_large())?;
        let padded = size
            .checked_next_multiple_of(BLOCK_SIZE)
            .ok_or_else(too_large)?;

        let kind = match header.type_flag {
            TYPE_REGULAR | TYPE_REGULAR_OLD | TYPE_CONTIGUOUS => {
                ContentKind::File(self.long_name.take().unwrap_or(header.name))
            }
            TYPE_GNU_LONG_NAME => ContentKind::LongName,
            other => {
                log::debug!(
                    "skipping tar entry {} of type {:?}",
                    header.name,
                    other as char
                );
                self.ctx.stats.increment(Stat::TarEntrySkipped);
                self.long_name = None;
                ContentKind::Skip
            }
        };

        self.pending = Some(PendingContent { kind, size, padded });
        self.state = State::Content;
        Ok(true)
    }

    /// Consumes the content of the pending entry, padding included, if it
    /// has been fully received.
    fn parse_content(&mut self) -> Result<bool> {
        let Some(pending) = self.pending.as_ref() else {
            self.state = State::Metadata;
            return Ok(true);
        };
        if self.buffer.len() < pending.padded {
            return Ok(false);
        }

        let (size, padded) = (pending.size, pending.padded);
        let data = self.buffer.take(size).unwrap_or_default();
        self.buffer.advance(padded - size);

        if let Some(pending) = self.pending.take() {
            match pending.kind {
                ContentKind::File(name) => {
                    let index = self.entries.len();
                    self.entries.push(ArchiveEntry::new(name, index, data));
                }
                ContentKind::LongName => self.long_name = Some(c_string(&data)),
                ContentKind::Skip => {}
            }
        }
        self.state = State::Metadata;
        Ok(true)
    }
}

impl ChunkedTraceReader for TarReader {
    fn parse(&mut self, chunk: Bytes) -> Result<()> {
        if self.state == State::Done {
            return Ok(());
        }
        self.buffer.push_back(chunk);
        loop {
            let progressed = match self.state {
                State::Metadata | State::ZeroMetadata => self.parse_metadata()?,
                State::Content => self.parse_content()?,
                State::Done => {
                    // Trailing padding after the end-of-archive marker.
                    self.buffer = BlobQueue::new();
                    false
                }
            };
            if !progressed {
                return Ok(());
            }
        }
    }

    fn notify_end_of_file(&mut self) -> Result<()> {
        match self.state {
            State::Done => {}
            State::Metadata | State::ZeroMetadata if self.buffer.is_empty() => {}
            _ => return Err(TokenizeError::PrematureEof("tar")),
        }
        let entries = std::mem::take(&mut self.entries);
        parse_entries(&self.ctx, entries)
    }
}
