//! Reader for zip archives.
//!
//! Zip archives are indexed by a central directory at the end of the file,
//! so the whole archive is buffered and only read at end of file.

use std::io::{Cursor, Read};
use std::sync::Arc;

use bytes::Bytes;

use crate::archive::entry::{parse_entries, ArchiveEntry};
use crate::blob_queue::BlobQueue;
use crate::context::TraceContext;
use crate::error::{Result, TokenizeError};
use crate::reader::ChunkedTraceReader;

/// First bytes of the main text file of an Android bug report.
const BUGREPORT_BANNER: &[u8] =
    b"========================================================\n== dumpstate: ";

pub struct ZipReader {
    ctx: Arc<TraceContext>,
    buffer: BlobQueue,
}

impl ZipReader {
    pub fn new(ctx: Arc<TraceContext>) -> Self {
        ZipReader {
            ctx,
            buffer: BlobQueue::new(),
        }
    }
}

/// Decompresses every file of the archive in `data`, in archive order.
///
/// Declared entry sizes only serve as an allocation hint and are capped by the
/// archive size; the decompressed content may grow past it.
pub fn read_entries(data: Bytes) -> Result<Vec<ArchiveEntry>> {
    let archive_len = data.len();
    let mut archive = ::zip::ZipArchive::new(Cursor::new(data))?;
    let mut entries = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let mut file = archive.by_index(index)?;
        if file.is_dir() {
            continue;
        }
        let hint = usize::try_from(file.size()).unwrap_or(usize::MAX).min(archive_len);
        let mut content = Vec::with_capacity(hint);
        file.read_to_end(&mut content)?;
        entries.push(ArchiveEntry::new(file.name(), index, Bytes::from(content)));
    }
    Ok(entries)
}

fn is_bugreport_name(name: &str) -> bool {
    !name.contains('/') && name.starts_with("bugreport-") && name.ends_with(".txt")
}

/// Reports whether `entries` form an Android bug report.
pub fn is_android_bugreport(entries: &[ArchiveEntry]) -> bool {
    entries
        .iter()
        .any(|e| is_bugreport_name(&e.name) && e.data.starts_with(BUGREPORT_BANNER))
}

impl ChunkedTraceReader for ZipReader {
    fn parse(&mut self, chunk: Bytes) -> Result<()> {
        self.buffer.push_back(chunk);
        Ok(())
    }

    fn notify_end_of_file(&mut self) -> Result<()> {
        let entries = read_entries(self.buffer.take_all())?;

        if is_android_bugreport(&entries) {
            log::debug!("zip archive is an android bug report");
            let parser = self
                .ctx
                .bugreport_parser()
                .cloned()
                .ok_or(TokenizeError::MissingBugreportParser)?;
            return parser.parse(&self.ctx, entries);
        }

        parse_entries(&self.ctx, entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, data: &'static [u8]) -> ArchiveEntry {
        ArchiveEntry::new(name, 0, Bytes::from_static(data))
    }

    #[test]
    fn test_bugreport_detection() {
        let banner = b"========================================================\n== dumpstate: 2024-01-01\n";
        assert!(is_android_bugreport(&[
            entry("FS/data/misc", b"x"),
            entry("bugreport-device-2024.txt", banner),
        ]));
        assert!(!is_android_bugreport(&[entry("bugreport-device.txt", b"hello")]));
        assert!(!is_android_bugreport(&[entry("dir/bugreport-x.txt", banner)]));
        assert!(!is_android_bugreport(&[entry("bugreport-x.log", banner)]));
    }

    fn stored_zip(name: &str, data: &[u8]) -> Vec<u8> {
        use std::io::Write;

        let mut writer = ::zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = ::zip::write::FileOptions::default()
            .compression_method(::zip::CompressionMethod::Stored);
        writer.start_file(name, options).unwrap();
        writer.write_all(data).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_declared_size_is_not_trusted() {
        let mut data = stored_zip("a.json", b"{}");
        // Uncompressed size field of the central directory header.
        let central = data
            .windows(4)
            .position(|w| w == b"PK\x01\x02")
            .unwrap();
        data[central + 24..central + 28].copy_from_slice(&0xFFFF_FFF0u32.to_le_bytes());

        let entries = read_entries(Bytes::from(data)).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "a.json");
        assert_eq!(&entries[0].data[..], b"{}");
        assert!(entries[0].data.len() < 0xFFFF_FFF0);
    }

    #[test]
    fn test_invalid_archive_is_error() {
        assert!(read_entries(Bytes::from_static(b"PK\x03\x04 not really")).is_err());
    }
}
