//! Streaming tokenizers for binary trace formats and trace archives.
//!
//! Every reader consumes a byte stream delivered in arbitrary chunks,
//! reassembles the records of its format across chunk boundaries and hands
//! complete, self-contained records downstream: timestamped events to a
//! [`Sorter`], scheduling and kernel object records to an [`ImmediateSink`],
//! and archive members to nested readers.
//!
//! # Formats
//!
//! | Format  | Reader               | Framing                                   |
//! |---------|----------------------|-------------------------------------------|
//! | Fuchsia | [`FuchsiaTokenizer`] | 8-byte header word, length in words       |
//! | tar     | [`TarReader`]        | 512-byte header blocks, padded content    |
//! | zip     | [`ZipReader`]        | central directory at the end of the file  |
//! | gzip    | [`GzipReader`]       | deflate stream around any other format    |
//!
//! A [`ForwardingReader`] sniffs the first bytes of a stream and picks the
//! reader.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use bytes::Bytes;
//! use tracetok::{ChunkedTraceReader, ForwardingReader, TraceContext, TraceSorter};
//!
//! let sorter = Arc::new(TraceSorter::new());
//! let ctx = TraceContext::builder().sorter(sorter.clone()).build();
//! let mut reader = ForwardingReader::new(ctx.clone());
//!
//! let data: &[u8] = &[/* trace bytes */];
//! for chunk in data.chunks(4096) {
//!     reader.parse(Bytes::copy_from_slice(chunk))?;
//! }
//! reader.notify_end_of_file()?;
//!
//! for record in sorter.extract_sorted() {
//!     println!("{}", record.ts);
//! }
//! # Ok::<(), tracetok::TokenizeError>(())
//! ```

pub mod archive;
mod blob_queue;
pub mod context;
pub mod cursor;
pub mod error;
pub mod forwarding;
pub mod framer;
pub mod fuchsia;
pub mod gzip;
pub mod reader;
pub mod sink;
pub mod sorter;
pub mod stats;
pub mod string_pool;
pub mod trace_type;

pub use archive::{ArchiveEntry, TarReader, ZipReader};
pub use context::{BugreportParser, TraceContext, TraceContextBuilder};
pub use cursor::{RecordCursor, ThreadInfo};
pub use error::{Result, TokenizeError};
pub use forwarding::ForwardingReader;
pub use framer::RecordFramer;
pub use fuchsia::{FuchsiaEvent, FuchsiaRecord, FuchsiaTokenizer};
pub use gzip::GzipReader;
pub use reader::ChunkedTraceReader;
pub use sink::{ImmediateSink, KernelObject, RecordingSink, SchedEvent};
pub use sorter::{SortedRecord, Sorter, TracePayload, TraceSorter};
pub use stats::{Stat, Stats};
pub use string_pool::{StringId, StringPool};
pub use trace_type::{guess_trace_type, TraceType};
