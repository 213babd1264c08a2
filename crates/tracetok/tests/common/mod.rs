#![allow(dead_code)]

use std::io::Write;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tracetok::{
    ChunkedTraceReader, FuchsiaEvent, RecordingSink, Result, TraceContext, TraceContextBuilder,
    TracePayload, TraceSorter, TraceType,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A context wired to an in-memory sorter and sink.
pub struct Session {
    pub ctx: Arc<TraceContext>,
    pub sorter: Arc<TraceSorter>,
    pub sink: Arc<RecordingSink>,
}

impl Session {
    pub fn new() -> Self {
        Self::with(|b| b)
    }

    pub fn with(configure: impl FnOnce(TraceContextBuilder) -> TraceContextBuilder) -> Self {
        init_logging();
        let sorter = Arc::new(TraceSorter::new());
        let sink = Arc::new(RecordingSink::new());
        let builder = TraceContext::builder()
            .sorter(sorter.clone())
            .sink(sink.clone());
        let ctx = configure(builder).build();
        Session { ctx, sorter, sink }
    }

    /// Drains the sorter and decodes every Fuchsia event in it.
    pub fn events(&self) -> Vec<FuchsiaEvent> {
        self.sorter
            .extract_sorted()
            .into_iter()
            .filter_map(|r| match r.payload {
                TracePayload::Fuchsia(rec) => rec.decode_event(&self.ctx.strings),
                _ => None,
            })
            .collect()
    }

    pub fn string(&self, id: tracetok::StringId) -> String {
        self.ctx.strings.get(id).to_string()
    }
}

/// Feeds `data` split into chunks of the given sizes. The sizes must add up
/// to the length of `data`.
pub fn feed_split(reader: &mut dyn ChunkedTraceReader, data: &[u8], sizes: &[usize]) -> Result<()> {
    let mut pos = 0;
    for &size in sizes {
        reader.parse(Bytes::copy_from_slice(&data[pos..pos + size]))?;
        pos += size;
    }
    assert_eq!(pos, data.len(), "split sizes do not cover the input");
    Ok(())
}

/// Splits `len` bytes into random chunk sizes, empty chunks included.
pub fn random_split(rng: &mut StdRng, len: usize) -> Vec<usize> {
    let mut sizes = Vec::new();
    let mut left = len;
    while left > 0 {
        let size = rng.gen_range(0..=left.min(64));
        sizes.push(size);
        left -= size;
    }
    sizes
}

pub fn rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Everything a [`CollectingReader`] received, per reader instance.
pub type Collected = Arc<Mutex<Vec<(TraceType, Vec<u8>)>>>;

/// A reader that stores its whole input and records it at end of file.
pub struct CollectingReader {
    trace_type: TraceType,
    data: Vec<u8>,
    out: Collected,
}

impl CollectingReader {
    pub fn new(trace_type: TraceType, out: Collected) -> Self {
        CollectingReader {
            trace_type,
            data: Vec::new(),
            out,
        }
    }
}

impl ChunkedTraceReader for CollectingReader {
    fn parse(&mut self, chunk: Bytes) -> Result<()> {
        self.data.extend_from_slice(&chunk);
        Ok(())
    }

    fn notify_end_of_file(&mut self) -> Result<()> {
        let data = std::mem::take(&mut self.data);
        self.out.lock().unwrap().push((self.trace_type, data));
        Ok(())
    }
}

/// Registers a [`CollectingReader`] for each of `types`.
pub fn collect_types(mut builder: TraceContextBuilder, types: &[TraceType], out: &Collected) -> TraceContextBuilder {
    for &ty in types {
        let out = out.clone();
        builder = builder.reader(ty, move |_| Box::new(CollectingReader::new(ty, out.clone())));
    }
    builder
}

/// A minimal proto trace: one packet with a timestamp field.
pub const PROTO_TRACE: &[u8] = &[0x0a, 0x02, 0x40, 0x01];

/// A proto trace whose first packet carries module symbols.
pub const SYMBOLS_TRACE: &[u8] = &[0x0a, 0x03, 0xEA, 0x03, 0x00];

pub const TAR_BLOCK: usize = 512;

pub fn tar_header(name: &str, size: usize, type_flag: u8) -> Vec<u8> {
    let mut block = vec![0u8; TAR_BLOCK];
    block[..name.len()].copy_from_slice(name.as_bytes());
    block[100..108].copy_from_slice(b"0000644\0");
    let size = format!("{:011o}\0", size);
    block[124..136].copy_from_slice(size.as_bytes());
    block[156] = type_flag;
    block[257..263].copy_from_slice(b"ustar\0");
    block[263..265].copy_from_slice(b"00");
    block
}

/// A header plus padded content.
pub fn tar_member(name: &str, type_flag: u8, data: &[u8]) -> Vec<u8> {
    let mut out = tar_header(name, data.len(), type_flag);
    out.extend_from_slice(data);
    let padded = data.len().div_ceil(TAR_BLOCK) * TAR_BLOCK;
    out.resize(TAR_BLOCK + padded, 0);
    out
}

pub fn tar_file(name: &str, data: &[u8]) -> Vec<u8> {
    tar_member(name, b'0', data)
}

pub fn tar_end() -> Vec<u8> {
    vec![0u8; 2 * TAR_BLOCK]
}

pub fn zip_archive(files: &[(&str, &[u8], zip::CompressionMethod)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, data, method) in files {
        let options = zip::write::FileOptions::default().compression_method(*method);
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut enc = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}
