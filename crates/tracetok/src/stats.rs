use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Named counters describing how much of a trace was dropped or skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(usize)]
pub enum Stat {
    /// A Fuchsia record could not be decoded and was dropped.
    FuchsiaInvalidEvent,
    /// A tick count did not fit into a signed nanosecond timestamp.
    FuchsiaTimestampOverflow,
    /// A Fuchsia record (or scheduler subtype) of unknown type was skipped.
    FuchsiaUnknownRecord,
    /// A provider event record (e.g. buffer full) was seen.
    FuchsiaProviderEvent,
    /// An embedded proto blob was discarded because no proto reader exists.
    FuchsiaBlobDropped,
    /// Bytes of an incomplete record were left over at end of file.
    FuchsiaTrailingBytes,
    /// An archive entry had no reader for its sniffed type.
    ArchiveEntryUnsupported,
    /// A tar entry which is neither a regular file nor a long name was skipped.
    TarEntrySkipped,
}

impl Stat {
    pub const ALL: [Stat; 8] = [
        Stat::FuchsiaInvalidEvent,
        Stat::FuchsiaTimestampOverflow,
        Stat::FuchsiaUnknownRecord,
        Stat::FuchsiaProviderEvent,
        Stat::FuchsiaBlobDropped,
        Stat::FuchsiaTrailingBytes,
        Stat::ArchiveEntryUnsupported,
        Stat::TarEntrySkipped,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stat::FuchsiaInvalidEvent => "fuchsia_invalid_event",
            Stat::FuchsiaTimestampOverflow => "fuchsia_timestamp_overflow",
            Stat::FuchsiaUnknownRecord => "fuchsia_unknown_record",
            Stat::FuchsiaProviderEvent => "fuchsia_provider_event",
            Stat::FuchsiaBlobDropped => "fuchsia_blob_dropped",
            Stat::FuchsiaTrailingBytes => "fuchsia_trailing_bytes",
            Stat::ArchiveEntryUnsupported => "archive_entry_unsupported",
            Stat::TarEntrySkipped => "tar_entry_skipped",
        }
    }
}

/// Lock-free counter table shared by every reader of a session.
#[derive(Debug, Default)]
pub struct Stats {
    counters: [AtomicU64; Stat::ALL.len()],
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self, stat: Stat) {
        self.add(stat, 1);
    }

    pub fn add(&self, stat: Stat, value: u64) {
        self.counters[stat as usize].fetch_add(value, Ordering::Release);
    }

    pub fn get(&self, stat: Stat) -> u64 {
        self.counters[stat as usize].load(Ordering::Acquire)
    }

    /// Returns every counter by name, including the ones still at zero.
    pub fn snapshot(&self) -> BTreeMap<&'static str, u64> {
        Stat::ALL
            .iter()
            .map(|stat| (stat.name(), self.get(*stat)))
            .collect()
    }
}
