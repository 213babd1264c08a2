use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use bytes::Bytes;
use zip::CompressionMethod;

use tracetok::fuchsia::layout::event_type;
use tracetok::fuchsia::writer::{EventSpec, RecordWriter, StringRef, ThreadRef};
use tracetok::{
    ArchiveEntry, BugreportParser, ChunkedTraceReader, ForwardingReader, Stat, TarReader,
    TokenizeError, TraceContext, TraceType, ZipReader,
};

use crate::common::{
    collect_types, feed_split, random_split, rng, tar_end, tar_file, tar_header, tar_member,
    zip_archive, Collected, Session, PROTO_TRACE, SYMBOLS_TRACE, TAR_BLOCK,
};

mod common;

fn fuchsia_trace(name: &str) -> Vec<u8> {
    let mut w = RecordWriter::new();
    w.magic().event(&EventSpec {
        event_type: event_type::INSTANT,
        ticks: 42,
        thread: ThreadRef::Index(1),
        category: StringRef::Empty,
        name: StringRef::Inline(name),
        args: &[],
        trailing: None,
    });
    w.freeze().to_vec()
}

fn collecting_session(collected: &Collected) -> Session {
    Session::with(|b| {
        collect_types(
            b,
            &[TraceType::Proto, TraceType::Symbols, TraceType::Json],
            collected,
        )
    })
}

#[test]
fn test_tar_two_zero_blocks() {
    let session = Session::new();
    let mut reader = TarReader::new(session.ctx.clone());
    reader.parse(Bytes::from(tar_end())).unwrap();
    assert!(reader.entries().is_empty());
    reader.notify_end_of_file().unwrap();
    assert!(session.sorter.is_empty());
}

#[test]
fn test_tar_zero_block_then_data() {
    let session = Session::new();
    let mut data = vec![0u8; TAR_BLOCK];
    data.extend(tar_file("trace.fxt", &fuchsia_trace("after zero")));
    data.extend(tar_end());

    let mut reader = TarReader::new(session.ctx.clone());
    for chunk in data.chunks(100) {
        reader.parse(Bytes::copy_from_slice(chunk)).unwrap();
    }
    assert_eq!(reader.entries().len(), 1);
    reader.notify_end_of_file().unwrap();

    let events = session.events();
    assert_eq!(events.len(), 1);
    assert_eq!(session.string(events[0].name), "after zero");
}

#[test]
fn test_tar_eof_without_end_marker() {
    let session = Session::new();
    let mut reader = TarReader::new(session.ctx.clone());
    reader
        .parse(Bytes::from(tar_file("trace.fxt", &fuchsia_trace("x"))))
        .unwrap();
    reader.notify_end_of_file().unwrap();
    assert_eq!(session.events().len(), 1);
}

#[test]
fn test_tar_premature_eof() {
    let member = tar_file("trace.json", b"{\"traceEvents\": []}");

    // Inside the content.
    let mut reader = TarReader::new(Session::new().ctx);
    reader
        .parse(Bytes::copy_from_slice(&member[..TAR_BLOCK + 5]))
        .unwrap();
    assert_matches!(reader.notify_end_of_file(), Err(TokenizeError::PrematureEof("tar")));

    // Inside a header.
    let mut reader = TarReader::new(Session::new().ctx);
    reader.parse(Bytes::copy_from_slice(&member[..300])).unwrap();
    assert_matches!(reader.notify_end_of_file(), Err(TokenizeError::PrematureEof(_)));

    // Inside the padding.
    let mut reader = TarReader::new(Session::new().ctx);
    reader
        .parse(Bytes::copy_from_slice(&member[..member.len() - 1]))
        .unwrap();
    assert_matches!(reader.notify_end_of_file(), Err(TokenizeError::PrematureEof(_)));
}

#[test]
fn test_tar_bad_header() {
    let mut header = tar_header("trace.json", 0, b'0');
    header[124..136].copy_from_slice(b"0000000009\0\0");
    let mut reader = TarReader::new(Session::new().ctx);
    assert_matches!(
        reader.parse(Bytes::from(header)),
        Err(TokenizeError::InvalidTarField { field: "size", .. })
    );

    let mut header = tar_header("trace.json", 0, b'0');
    header[263..265].copy_from_slice(b"01");
    let mut reader = TarReader::new(Session::new().ctx);
    assert_matches!(
        reader.parse(Bytes::from(header)),
        Err(TokenizeError::InvalidTarMagic(_))
    );
}

#[test]
fn test_tar_gnu_long_name() {
    let long_name = format!("{}/trace.json", "d".repeat(150));
    let mut name_data = long_name.clone().into_bytes();
    name_data.push(0);

    let mut data = tar_member("././@LongLink", b'L', &name_data);
    data.extend(tar_file("short.json", b"{}"));
    data.extend(tar_file("next.json", b"[]"));
    data.extend(tar_end());

    let collected: Collected = Arc::new(Mutex::new(Vec::new()));
    let session = collecting_session(&collected);
    let mut reader = TarReader::new(session.ctx.clone());
    reader.parse(Bytes::from(data)).unwrap();

    let names: Vec<&str> = reader.entries().iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec![long_name.as_str(), "next.json"]);
    reader.notify_end_of_file().unwrap();
    assert_eq!(collected.lock().unwrap().len(), 2);
}

#[test]
fn test_tar_skips_non_regular_entries() {
    let mut data = tar_header("dir/", 0, b'5');
    data.extend(tar_member("link", b'2', b""));
    data.extend(tar_file("dir/a.json", b"{}"));
    data.extend(tar_end());

    let collected: Collected = Arc::new(Mutex::new(Vec::new()));
    let session = collecting_session(&collected);
    let mut reader = TarReader::new(session.ctx.clone());
    reader.parse(Bytes::from(data)).unwrap();
    reader.notify_end_of_file().unwrap();

    assert_eq!(session.ctx.stats.get(Stat::TarEntrySkipped), 2);
    assert_eq!(collected.lock().unwrap().clone(), vec![(TraceType::Json, b"{}".to_vec())]);
}

#[test]
fn test_tar_ignores_bytes_after_end() {
    let mut data = tar_file("a.json", b"{}");
    data.extend(tar_end());
    data.extend(vec![0xAB; 3000]);

    let collected: Collected = Arc::new(Mutex::new(Vec::new()));
    let session = collecting_session(&collected);
    let mut reader = TarReader::new(session.ctx.clone());
    feed_split(&mut reader, &data, &[1000, 1000, data.len() - 2000]).unwrap();
    reader.notify_end_of_file().unwrap();
    assert_eq!(collected.lock().unwrap().len(), 1);
}

#[test]
fn test_tar_entry_order() {
    let mut data = Vec::new();
    data.extend(tar_file("b.json", b"{\"b\": 1}"));
    data.extend(tar_file("z.symbols", SYMBOLS_TRACE));
    data.extend(tar_file("y.pb", PROTO_TRACE));
    data.extend(tar_file("a.json", b"{\"a\": 1}"));
    data.extend(tar_file("x.pb", &[0x0a, 0x00]));
    data.extend(tar_file("notes.txt", b"plain text"));
    data.extend(tar_end());

    let collected: Collected = Arc::new(Mutex::new(Vec::new()));
    let session = collecting_session(&collected);
    let mut reader = TarReader::new(session.ctx.clone());
    reader.parse(Bytes::from(data)).unwrap();
    reader.notify_end_of_file().unwrap();

    let order: Vec<(TraceType, Vec<u8>)> = collected.lock().unwrap().clone();
    assert_eq!(
        order,
        vec![
            (TraceType::Proto, PROTO_TRACE.to_vec()),
            (TraceType::Proto, vec![0x0a, 0x00]),
            (TraceType::Json, b"{\"a\": 1}".to_vec()),
            (TraceType::Json, b"{\"b\": 1}".to_vec()),
            (TraceType::Symbols, SYMBOLS_TRACE.to_vec()),
        ]
    );
    assert_eq!(session.ctx.stats.get(Stat::ArchiveEntryUnsupported), 1);
}

#[test]
fn test_tar_random_splits() {
    let mut data = Vec::new();
    data.extend(tar_file("one.fxt", &fuchsia_trace("one")));
    data.extend(tar_file("two.fxt", &fuchsia_trace("two")));
    data.extend(tar_end());

    let mut rng = rng(7);
    for _ in 0..50 {
        let session = Session::new();
        let mut reader = TarReader::new(session.ctx.clone());
        let sizes = random_split(&mut rng, data.len());
        feed_split(&mut reader, &data, &sizes).unwrap();
        reader.notify_end_of_file().unwrap();
        let names: Vec<String> = session
            .events()
            .iter()
            .map(|e| session.string(e.name))
            .collect();
        assert_eq!(names, vec!["one", "two"], "split {:?}", sizes);
    }
}

#[test]
fn test_forwarding_detects_tar() {
    let mut data = tar_file("trace.fxt", &fuchsia_trace("in tar"));
    data.extend(tar_end());
    let session = Session::new();
    let mut reader = ForwardingReader::new(session.ctx.clone());
    reader.parse(Bytes::from(data)).unwrap();
    reader.notify_end_of_file().unwrap();
    assert_eq!(reader.trace_type(), Some(TraceType::Tar));
    assert_eq!(session.events().len(), 1);
}

#[test]
fn test_zip_entries_in_order() {
    let fxt = fuchsia_trace("zipped");
    let data = zip_archive(&[
        ("syms", SYMBOLS_TRACE, CompressionMethod::Stored),
        ("b.json", b"{}", CompressionMethod::Deflated),
        ("trace.fxt", &fxt, CompressionMethod::Deflated),
        ("trace.pb", PROTO_TRACE, CompressionMethod::Stored),
    ]);

    let collected: Collected = Arc::new(Mutex::new(Vec::new()));
    let session = collecting_session(&collected);
    let mut reader = ZipReader::new(session.ctx.clone());
    for chunk in data.chunks(33) {
        reader.parse(Bytes::copy_from_slice(chunk)).unwrap();
    }
    reader.notify_end_of_file().unwrap();

    let types: Vec<TraceType> = collected.lock().unwrap().iter().map(|(t, _)| *t).collect();
    assert_eq!(types, vec![TraceType::Proto, TraceType::Json, TraceType::Symbols]);
    let events = session.events();
    assert_eq!(events.len(), 1);
    assert_eq!(session.string(events[0].name), "zipped");
}

#[test]
fn test_zip_via_forwarding() {
    let data = zip_archive(&[("a.json", b"{}", CompressionMethod::Deflated)]);
    let collected: Collected = Arc::new(Mutex::new(Vec::new()));
    let session = collecting_session(&collected);
    let mut reader = ForwardingReader::new(session.ctx.clone());
    reader.parse(Bytes::from(data)).unwrap();
    reader.notify_end_of_file().unwrap();
    assert_eq!(reader.trace_type(), Some(TraceType::Zip));
    assert_eq!(collected.lock().unwrap().clone(), vec![(TraceType::Json, b"{}".to_vec())]);
}

#[test]
fn test_corrupt_zip() {
    let mut data = zip_archive(&[("a.json", b"{}", CompressionMethod::Stored)]);
    data.truncate(data.len() - 10);
    let mut reader = ZipReader::new(Session::new().ctx);
    reader.parse(Bytes::from(data)).unwrap();
    assert_matches!(reader.notify_end_of_file(), Err(TokenizeError::Zip(_)));
}

const BUGREPORT_TEXT: &[u8] =
    b"========================================================\n== dumpstate: 2024-05-01 10:00:00\n";

struct RecordingBugreportParser {
    seen: Mutex<Vec<String>>,
}

impl BugreportParser for RecordingBugreportParser {
    fn parse(&self, _ctx: &Arc<TraceContext>, entries: Vec<ArchiveEntry>) -> tracetok::Result<()> {
        let mut seen = self.seen.lock().unwrap();
        seen.extend(entries.into_iter().map(|e| e.name));
        Ok(())
    }
}

#[test]
fn test_zip_bugreport_redirect() {
    let data = zip_archive(&[
        ("version.txt", b"2.0", CompressionMethod::Stored),
        ("bugreport-device-2024.txt", BUGREPORT_TEXT, CompressionMethod::Deflated),
        ("trace.pb", PROTO_TRACE, CompressionMethod::Stored),
    ]);

    let parser = Arc::new(RecordingBugreportParser {
        seen: Mutex::new(Vec::new()),
    });
    let collected: Collected = Arc::new(Mutex::new(Vec::new()));
    let session = Session::with(|b| {
        collect_types(b, &[TraceType::Proto], &collected).bugreport_parser(parser.clone())
    });
    let mut reader = ZipReader::new(session.ctx.clone());
    reader.parse(Bytes::from(data)).unwrap();
    reader.notify_end_of_file().unwrap();

    assert_eq!(
        parser.seen.lock().unwrap().clone(),
        vec!["version.txt", "bugreport-device-2024.txt", "trace.pb"]
    );
    assert!(collected.lock().unwrap().is_empty());
}

#[test]
fn test_zip_bugreport_without_parser() {
    let data = zip_archive(&[(
        "bugreport-device-2024.txt",
        BUGREPORT_TEXT,
        CompressionMethod::Deflated,
    )]);
    let mut reader = ZipReader::new(Session::new().ctx);
    reader.parse(Bytes::from(data)).unwrap();
    assert_matches!(
        reader.notify_end_of_file(),
        Err(TokenizeError::MissingBugreportParser)
    );
}
