use std::fmt;

use serde::Serialize;

/// How many leading bytes are inspected when sniffing a trace.
pub const GUESS_LOOKAHEAD: usize = 1024;

/// First word of every Fuchsia trace (a magic number record).
pub const FUCHSIA_MAGIC: u64 = 0x0016_5478_4604_0010;

/// Tag of field 1 (`packet`, length-delimited) of the perfetto `Trace` proto.
const TRACE_PACKET_TAG: u8 = 0x0a;

/// Field number of `TracePacket.module_symbols`.
const MODULE_SYMBOLS_FIELD: u64 = 61;

const TAR_MAGIC_OFFSET: usize = 257;

/// Trace formats that can be recognised from their leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceType {
    Unknown,
    Proto,
    /// A proto trace carrying only symbolization data.
    Symbols,
    Fuchsia,
    Json,
    Systrace,
    Ctrace,
    Ninja,
    Perf,
    Gzip,
    Zip,
    Tar,
}

impl TraceType {
    pub fn name(self) -> &'static str {
        match self {
            TraceType::Unknown => "unknown",
            TraceType::Proto => "proto",
            TraceType::Symbols => "symbols",
            TraceType::Fuchsia => "fuchsia",
            TraceType::Json => "json",
            TraceType::Systrace => "systrace",
            TraceType::Ctrace => "ctrace",
            TraceType::Ninja => "ninja",
            TraceType::Perf => "perf",
            TraceType::Gzip => "gzip",
            TraceType::Zip => "zip",
            TraceType::Tar => "tar",
        }
    }
}

impl fmt::Display for TraceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Infers the format of a trace from its first bytes.
pub fn guess_trace_type(data: &[u8]) -> TraceType {
    if data.is_empty() {
        return TraceType::Unknown;
    }
    let start = &data[..data.len().min(GUESS_LOOKAHEAD)];

    if let Some(word) = start.get(..8) {
        let mut magic = [0u8; 8];
        magic.copy_from_slice(word);
        if u64::from_le_bytes(magic) == FUCHSIA_MAGIC {
            return TraceType::Fuchsia;
        }
    }

    if start.starts_with(b"PERFILE2") {
        return TraceType::Perf;
    }

    if start
        .get(TAR_MAGIC_OFFSET..TAR_MAGIC_OFFSET + 5)
        .is_some_and(|m| m == b"ustar")
    {
        return TraceType::Tar;
    }

    if start.starts_with(&[0x1f, 0x8b]) {
        return TraceType::Gzip;
    }

    if start.starts_with(b"PK\x03\x04") {
        return TraceType::Zip;
    }

    let trimmed = skip_whitespace(start);
    if trimmed.starts_with(b"{") || trimmed.starts_with(b"[") {
        return TraceType::Json;
    }

    if start.starts_with(b"# tracer")
        || contains(start, b"<html>")
        || contains(start, b"<!DOCTYPE html>")
    {
        return TraceType::Systrace;
    }

    if start.starts_with(b"TRACE:\n") {
        return TraceType::Ctrace;
    }

    if start.starts_with(b"# ninja log") {
        return TraceType::Ninja;
    }

    if start[0] == TRACE_PACKET_TAG {
        if first_packet_has_field(start, MODULE_SYMBOLS_FIELD) {
            return TraceType::Symbols;
        }
        return TraceType::Proto;
    }

    TraceType::Unknown
}

fn skip_whitespace(data: &[u8]) -> &[u8] {
    let n = data
        .iter()
        .take_while(|b| b.is_ascii_whitespace())
        .count();
    &data[n..]
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Reads a protobuf base-128 varint, returning the value and its encoded length.
fn read_varint(data: &[u8]) -> Option<(u64, usize)> {
    let mut result: u64 = 0;
    for (i, b) in data.iter().enumerate().take(10) {
        result |= ((b & 0x7F) as u64) << (7 * i as u32);
        if b & 0x80 == 0 {
            return Some((result, i + 1));
        }
    }
    None
}

/// Walks the top-level fields of the first packet of a proto trace (as far as
/// the lookahead allows) looking for `field`.
fn first_packet_has_field(data: &[u8], field: u64) -> bool {
    let Some((packet_len, n)) = read_varint(&data[1..]) else {
        return false;
    };
    let start = 1 + n;
    let end = start.saturating_add(packet_len as usize).min(data.len());
    let mut packet = &data[start..end];

    while let Some((tag, n)) = read_varint(packet) {
        if tag >> 3 == field {
            return true;
        }
        packet = &packet[n..];
        let skip = match tag & 0x7 {
            0 => match read_varint(packet) {
                Some((_, n)) => n,
                None => return false,
            },
            1 => 8,
            2 => match read_varint(packet) {
                Some((len, n)) => n.saturating_add(len as usize),
                None => return false,
            },
            5 => 4,
            _ => return false,
        };
        if skip > packet.len() {
            return false;
        }
        packet = &packet[skip..];
    }
    false
}
