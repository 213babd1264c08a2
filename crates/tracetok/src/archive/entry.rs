use std::cmp::Ordering;
use std::sync::Arc;

use bytes::Bytes;

use crate::context::TraceContext;
use crate::error::Result;
use crate::reader::parse_whole;
use crate::stats::Stat;
use crate::trace_type::{guess_trace_type, TraceType};

/// One file extracted from an archive.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub name: String,
    /// Position of the entry within its archive.
    pub index: usize,
    pub data: Bytes,
    pub trace_type: TraceType,
}

impl ArchiveEntry {
    /// Creates an entry, sniffing its type from `data`.
    pub fn new(name: impl Into<String>, index: usize, data: Bytes) -> Self {
        let trace_type = guess_trace_type(&data);
        ArchiveEntry {
            name: name.into(),
            index,
            data,
            trace_type,
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Order in which archive entries are parsed.
///
/// Symbol files go last so the traces they symbolize have been seen. Proto
/// traces go first. Everything else is ordered by name, then by archive
/// position. Two proto entries, or two symbol entries, compare equal, so a
/// stable sort keeps them in archive order.
pub fn compare_entries(a: &ArchiveEntry, b: &ArchiveEntry) -> Ordering {
    let a_symbols = a.trace_type == TraceType::Symbols;
    let b_symbols = b.trace_type == TraceType::Symbols;
    if a_symbols || b_symbols {
        return a_symbols.cmp(&b_symbols);
    }

    let a_proto = a.trace_type == TraceType::Proto;
    let b_proto = b.trace_type == TraceType::Proto;
    if a_proto || b_proto {
        return b_proto.cmp(&a_proto);
    }

    (&a.name, a.index).cmp(&(&b.name, b.index))
}

/// Sorts `entries` and feeds each one, whole, to a fresh reader of its type.
///
/// Entries with no reader are skipped. Empty entries are ignored.
pub fn parse_entries(ctx: &Arc<TraceContext>, mut entries: Vec<ArchiveEntry>) -> Result<()> {
    entries.sort_by(compare_entries);
    for entry in entries {
        if entry.data.is_empty() {
            log::debug!("skipping empty archive entry {}", entry.name);
            continue;
        }
        if !ctx.has_reader(entry.trace_type) {
            log::warn!(
                "skipping archive entry {}: unsupported type {}",
                entry.name,
                entry.trace_type
            );
            ctx.stats.increment(Stat::ArchiveEntryUnsupported);
            continue;
        }
        let mut reader = ctx.create_reader(entry.trace_type)?;
        log::debug!("parsing archive entry {} as {}", entry.name, entry.trace_type);
        parse_whole(reader.as_mut(), entry.data)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, index: usize, trace_type: TraceType) -> ArchiveEntry {
        ArchiveEntry {
            name: name.to_string(),
            index,
            data: Bytes::new(),
            trace_type,
        }
    }

    fn order(mut entries: Vec<ArchiveEntry>) -> Vec<(String, usize)> {
        entries.sort_by(compare_entries);
        entries.into_iter().map(|e| (e.name, e.index)).collect()
    }

    #[test]
    fn test_symbols_last_proto_first() {
        let sorted = order(vec![
            entry("z.sym", 0, TraceType::Symbols),
            entry("b.json", 1, TraceType::Json),
            entry("y.pb", 2, TraceType::Proto),
            entry("a.fxt", 3, TraceType::Fuchsia),
            entry("x.pb", 4, TraceType::Proto),
            entry("a.sym", 5, TraceType::Symbols),
        ]);
        assert_eq!(
            sorted,
            vec![
                ("y.pb".to_string(), 2),
                ("x.pb".to_string(), 4),
                ("a.fxt".to_string(), 3),
                ("b.json".to_string(), 1),
                ("z.sym".to_string(), 0),
                ("a.sym".to_string(), 5),
            ]
        );
    }

    #[test]
    fn test_same_name_orders_by_index() {
        let sorted = order(vec![
            entry("t", 3, TraceType::Json),
            entry("t", 1, TraceType::Json),
        ]);
        assert_eq!(sorted, vec![("t".to_string(), 1), ("t".to_string(), 3)]);
    }

    #[test]
    fn test_unsupported_entries_are_counted() {
        let ctx = TraceContext::builder().build();
        let entries = vec![
            ArchiveEntry::new("notes.txt", 0, Bytes::from_static(b"plain text")),
            ArchiveEntry::new("trace.json", 1, Bytes::from_static(b"{}")),
            ArchiveEntry::new("empty.json", 2, Bytes::new()),
        ];
        parse_entries(&ctx, entries).unwrap();
        assert_eq!(ctx.stats.get(Stat::ArchiveEntryUnsupported), 2);
    }

    #[test]
    fn test_entry_sniffs_type() {
        let e = ArchiveEntry::new("trace.json", 0, Bytes::from_static(b"{}"));
        assert_eq!(e.trace_type, TraceType::Json);
        assert_eq!(e.size(), 2);
    }
}
