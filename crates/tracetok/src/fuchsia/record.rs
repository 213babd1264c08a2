use bytes::Bytes;
use serde::Serialize;

use crate::cursor::{RecordCursor, ThreadInfo};
use crate::fuchsia::args::{parse_args, read_string_ref, read_thread_ref, Arg, SymbolLookup};
use crate::fuchsia::layout::{event_type, record_type, EventHeader, RECORD_TYPE};
use crate::string_pool::{StringId, StringPool};

/// A complete event record together with every symbol it references.
///
/// The provider tables may change after the record was read, so the string
/// and thread references the record uses are copied out at tokenization time.
/// This makes the record decodable on its own, in any order.
#[derive(Debug, Clone)]
pub struct FuchsiaRecord {
    blob: Bytes,
    ticks_per_second: u64,
    strings: Vec<(u32, StringId)>,
    threads: Vec<(u32, ThreadInfo)>,
}

impl FuchsiaRecord {
    pub fn new(blob: Bytes, ticks_per_second: u64) -> Self {
        FuchsiaRecord {
            blob,
            ticks_per_second,
            strings: Vec::new(),
            threads: Vec::new(),
        }
    }

    pub fn blob(&self) -> &Bytes {
        &self.blob
    }

    pub fn ticks_per_second(&self) -> u64 {
        self.ticks_per_second
    }

    pub fn insert_string(&mut self, index: u32, id: StringId) {
        if !self.strings.iter().any(|(i, _)| *i == index) {
            self.strings.push((index, id));
        }
    }

    pub fn insert_thread(&mut self, index: u32, info: ThreadInfo) {
        if !self.threads.iter().any(|(i, _)| *i == index) {
            self.threads.push((index, info));
        }
    }

    pub fn get_string(&self, index: u32) -> StringId {
        self.strings
            .iter()
            .find(|(i, _)| *i == index)
            .map(|(_, id)| *id)
            .unwrap_or(StringId::NULL)
    }

    pub fn get_thread(&self, index: u32) -> ThreadInfo {
        self.threads
            .iter()
            .find(|(i, _)| *i == index)
            .map(|(_, t)| *t)
            .unwrap_or_default()
    }

    /// Decodes the event held by this record.
    ///
    /// Returns `None` if the blob is not a well-formed event record.
    pub fn decode_event(&self, pool: &StringPool) -> Option<FuchsiaEvent> {
        let mut cursor = RecordCursor::new(&self.blob);
        let header = cursor.read_u64()?;
        if RECORD_TYPE.get_u32(header) != record_type::EVENT {
            return None;
        }
        let h = EventHeader::decode(header);

        let ts = cursor.read_timestamp(self.ticks_per_second)?;
        let thread = read_thread_ref(&mut cursor, h.thread_ref, self)?;
        let category = read_string_ref(&mut cursor, h.category_ref, self, pool)?;
        let name = read_string_ref(&mut cursor, h.name_ref, self, pool)?;
        let args = parse_args(&mut cursor, h.arg_count, self, pool)?;

        let kind = match h.event_type {
            event_type::INSTANT => EventKind::Instant,
            event_type::COUNTER => EventKind::Counter {
                id: cursor.read_u64()?,
            },
            event_type::DURATION_BEGIN => EventKind::DurationBegin,
            event_type::DURATION_END => EventKind::DurationEnd,
            event_type::DURATION_COMPLETE => EventKind::DurationComplete {
                end_ts: cursor.read_timestamp(self.ticks_per_second)?,
            },
            event_type::ASYNC_BEGIN => EventKind::AsyncBegin {
                correlation_id: cursor.read_u64()?,
            },
            event_type::ASYNC_INSTANT => EventKind::AsyncInstant {
                correlation_id: cursor.read_u64()?,
            },
            event_type::ASYNC_END => EventKind::AsyncEnd {
                correlation_id: cursor.read_u64()?,
            },
            event_type::FLOW_BEGIN => EventKind::FlowBegin {
                flow_id: cursor.read_u64()?,
            },
            event_type::FLOW_STEP => EventKind::FlowStep {
                flow_id: cursor.read_u64()?,
            },
            event_type::FLOW_END => EventKind::FlowEnd {
                flow_id: cursor.read_u64()?,
            },
            other => EventKind::Unknown { event_type: other },
        };

        Some(FuchsiaEvent {
            ts,
            thread,
            category,
            name,
            args,
            kind,
        })
    }
}

impl SymbolLookup for FuchsiaRecord {
    fn lookup_string(&self, index: u32) -> StringId {
        self.get_string(index)
    }

    fn lookup_thread(&self, index: u32) -> ThreadInfo {
        self.get_thread(index)
    }
}

/// The type of an event, with the field that follows its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    Instant,
    Counter { id: u64 },
    DurationBegin,
    DurationEnd,
    DurationComplete { end_ts: i64 },
    AsyncBegin { correlation_id: u64 },
    AsyncInstant { correlation_id: u64 },
    AsyncEnd { correlation_id: u64 },
    FlowBegin { flow_id: u64 },
    FlowStep { flow_id: u64 },
    FlowEnd { flow_id: u64 },
    Unknown { event_type: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FuchsiaEvent {
    pub ts: i64,
    pub thread: ThreadInfo,
    pub category: StringId,
    pub name: StringId,
    pub args: Vec<Arg>,
    #[serde(flatten)]
    pub kind: EventKind,
}
