//! Encoder for Fuchsia trace records.
//!
//! Used to synthesize traces for tests and tools. The writer performs no
//! validation beyond what is needed to produce well-formed headers.

use bytes::{BufMut, Bytes, BytesMut};

use crate::cursor::{ThreadInfo, WORD_SIZE};
use crate::fuchsia::layout::{
    arg_type, metadata_type, record_type, sched_type, ArgHeader, BlobHeader, EventHeader,
    KernelObjectHeader, LegacyContextSwitchHeader, MetadataHeader, SchedHeader, StringHeader,
    ThreadHeader, RECORD_LEN, RECORD_TYPE, SCHED_EVENT_TYPE,
};
use crate::trace_type::FUCHSIA_MAGIC;

/// A string as it appears in a record: inline or by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringRef<'a> {
    Empty,
    Inline(&'a str),
    Index(u16),
}

impl StringRef<'_> {
    fn encode(&self) -> u64 {
        match self {
            StringRef::Empty => 0,
            StringRef::Inline(s) => 0x8000 | (s.len() as u64 & 0x7FFF),
            StringRef::Index(i) => (*i & 0x7FFF) as u64,
        }
    }
}

/// A thread as it appears in a record: inline or by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadRef {
    Inline(ThreadInfo),
    Index(u8),
}

impl ThreadRef {
    fn encode(&self) -> u64 {
        match self {
            ThreadRef::Inline(_) => 0,
            ThreadRef::Index(i) => *i as u64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArgData<'a> {
    Null,
    Int32(i32),
    Uint32(u32),
    Int64(i64),
    Uint64(u64),
    Double(f64),
    String(StringRef<'a>),
    Pointer(u64),
    Koid(u64),
    Bool(bool),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WriteArg<'a> {
    pub name: StringRef<'a>,
    pub value: ArgData<'a>,
}

impl<'a> WriteArg<'a> {
    pub fn new(name: &'a str, value: ArgData<'a>) -> Self {
        WriteArg {
            name: StringRef::Inline(name),
            value,
        }
    }
}

/// Everything needed to encode an event record.
#[derive(Debug, Clone, Copy)]
pub struct EventSpec<'a> {
    pub event_type: u32,
    pub ticks: u64,
    pub thread: ThreadRef,
    pub category: StringRef<'a>,
    pub name: StringRef<'a>,
    pub args: &'a [WriteArg<'a>],
    /// Counter id, end time, correlation id or flow id, depending on the type.
    pub trailing: Option<u64>,
}

/// Fields of a legacy (type 0) context switch record.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacySwitchSpec {
    pub ticks: u64,
    pub cpu: u32,
    pub outgoing_state: u32,
    pub outgoing: ThreadInfo,
    pub incoming: ThreadInfo,
    pub outgoing_priority: u8,
    pub incoming_priority: u8,
}

/// Body words of a record under construction.
#[derive(Default)]
struct Body {
    words: Vec<u64>,
}

impl Body {
    fn word(&mut self, w: u64) {
        self.words.push(w);
    }

    fn padded(&mut self, bytes: &[u8]) {
        for chunk in bytes.chunks(WORD_SIZE) {
            let mut word = [0u8; WORD_SIZE];
            word[..chunk.len()].copy_from_slice(chunk);
            self.words.push(u64::from_le_bytes(word));
        }
    }

    fn string(&mut self, r: &StringRef<'_>) {
        if let StringRef::Inline(s) = r {
            self.padded(s.as_bytes());
        }
    }

    fn thread(&mut self, r: &ThreadRef) {
        if let ThreadRef::Inline(info) = r {
            self.word(info.pid);
            self.word(info.tid);
        }
    }

    fn args(&mut self, args: &[WriteArg<'_>]) {
        for arg in args {
            let mut arg_body = Body::default();
            arg_body.string(&arg.name);
            let (ty, value_bits) = match arg.value {
                ArgData::Null => (arg_type::NULL, 0),
                ArgData::Int32(v) => (arg_type::INT32, v as u32 as u64),
                ArgData::Uint32(v) => (arg_type::UINT32, v as u64),
                ArgData::Int64(v) => {
                    arg_body.word(v as u64);
                    (arg_type::INT64, 0)
                }
                ArgData::Uint64(v) => {
                    arg_body.word(v);
                    (arg_type::UINT64, 0)
                }
                ArgData::Double(v) => {
                    arg_body.word(v.to_bits());
                    (arg_type::DOUBLE, 0)
                }
                ArgData::String(s) => {
                    arg_body.string(&s);
                    (arg_type::STRING, s.encode())
                }
                ArgData::Pointer(v) => {
                    arg_body.word(v);
                    (arg_type::POINTER, 0)
                }
                ArgData::Koid(v) => {
                    arg_body.word(v);
                    (arg_type::KOID, 0)
                }
                ArgData::Bool(v) => (arg_type::BOOL, v as u64),
            };
            let mut header = ArgHeader::TYPE.set(0, ty as u64);
            header = ArgHeader::SIZE.set(header, 1 + arg_body.words.len() as u64);
            header = ArgHeader::NAME_REF.set(header, arg.name.encode());
            header = ArgHeader::VALUE.set(header, value_bits);
            self.word(header);
            self.words.extend(arg_body.words);
        }
    }
}

/// A buffer of encoded Fuchsia records.
#[derive(Debug, Default)]
pub struct RecordWriter {
    buf: BytesMut,
}

impl AsRef<[u8]> for RecordWriter {
    fn as_ref(&self) -> &[u8] {
        &self.buf
    }
}

impl RecordWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }

    /// Appends bytes verbatim, e.g. to produce malformed streams.
    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.put_slice(bytes);
        self
    }

    fn record(&mut self, header: u64, body: Body) -> &mut Self {
        let len_words = 1 + body.words.len() as u64;
        debug_assert!(len_words <= RECORD_LEN.get(u64::MAX), "record too long");
        let header = RECORD_LEN.set(header, len_words);
        self.buf.reserve(len_words as usize * WORD_SIZE);
        self.buf.put_u64_le(header);
        for w in body.words {
            self.buf.put_u64_le(w);
        }
        self
    }

    /// Writes the magic number record that starts every trace.
    pub fn magic(&mut self) -> &mut Self {
        self.buf.put_u64_le(FUCHSIA_MAGIC);
        self
    }

    pub fn provider_info(&mut self, id: u32, name: &str) -> &mut Self {
        let mut header = RECORD_TYPE.set(0, record_type::METADATA as u64);
        header = MetadataHeader::TYPE.set(header, metadata_type::PROVIDER_INFO as u64);
        header = MetadataHeader::PROVIDER_ID.set(header, id as u64);
        header = MetadataHeader::NAME_LEN.set(header, name.len() as u64);
        let mut body = Body::default();
        body.padded(name.as_bytes());
        self.record(header, body)
    }

    pub fn provider_section(&mut self, id: u32) -> &mut Self {
        let mut header = RECORD_TYPE.set(0, record_type::METADATA as u64);
        header = MetadataHeader::TYPE.set(header, metadata_type::PROVIDER_SECTION as u64);
        header = MetadataHeader::PROVIDER_ID.set(header, id as u64);
        self.record(header, Body::default())
    }

    pub fn provider_event(&mut self, id: u32) -> &mut Self {
        let mut header = RECORD_TYPE.set(0, record_type::METADATA as u64);
        header = MetadataHeader::TYPE.set(header, metadata_type::PROVIDER_EVENT as u64);
        header = MetadataHeader::PROVIDER_ID.set(header, id as u64);
        self.record(header, Body::default())
    }

    pub fn initialization(&mut self, ticks_per_second: u64) -> &mut Self {
        let header = RECORD_TYPE.set(0, record_type::INITIALIZATION as u64);
        let mut body = Body::default();
        body.word(ticks_per_second);
        self.record(header, body)
    }

    pub fn string(&mut self, index: u16, value: &str) -> &mut Self {
        let mut header = RECORD_TYPE.set(0, record_type::STRING as u64);
        header = StringHeader::INDEX.set(header, index as u64);
        header = StringHeader::LEN.set(header, value.len() as u64);
        let mut body = Body::default();
        body.padded(value.as_bytes());
        self.record(header, body)
    }

    pub fn thread(&mut self, index: u8, info: ThreadInfo) -> &mut Self {
        let mut header = RECORD_TYPE.set(0, record_type::THREAD as u64);
        header = ThreadHeader::INDEX.set(header, index as u64);
        let mut body = Body::default();
        body.word(info.pid);
        body.word(info.tid);
        self.record(header, body)
    }

    pub fn event(&mut self, event: &EventSpec<'_>) -> &mut Self {
        let mut header = RECORD_TYPE.set(0, record_type::EVENT as u64);
        header = EventHeader::EVENT_TYPE.set(header, event.event_type as u64);
        header = EventHeader::ARG_COUNT.set(header, event.args.len() as u64);
        header = EventHeader::THREAD_REF.set(header, event.thread.encode());
        header = EventHeader::CATEGORY_REF.set(header, event.category.encode());
        header = EventHeader::NAME_REF.set(header, event.name.encode());

        let mut body = Body::default();
        body.word(event.ticks);
        body.thread(&event.thread);
        body.string(&event.category);
        body.string(&event.name);
        body.args(event.args);
        if let Some(trailing) = event.trailing {
            body.word(trailing);
        }
        self.record(header, body)
    }

    pub fn kernel_object(
        &mut self,
        object_type: u32,
        koid: u64,
        name: StringRef<'_>,
        args: &[WriteArg<'_>],
    ) -> &mut Self {
        let mut header = RECORD_TYPE.set(0, record_type::KERNEL_OBJECT as u64);
        header = KernelObjectHeader::OBJECT_TYPE.set(header, object_type as u64);
        header = KernelObjectHeader::NAME_REF.set(header, name.encode());
        header = KernelObjectHeader::ARG_COUNT.set(header, args.len() as u64);
        let mut body = Body::default();
        body.word(koid);
        body.string(&name);
        body.args(args);
        self.record(header, body)
    }

    pub fn legacy_context_switch(&mut self, switch: &LegacySwitchSpec) -> &mut Self {
        let mut header = RECORD_TYPE.set(0, record_type::SCHEDULER as u64);
        header = SCHED_EVENT_TYPE.set(header, sched_type::LEGACY_CONTEXT_SWITCH as u64);
        header = LegacyContextSwitchHeader::CPU.set(header, switch.cpu as u64);
        header = LegacyContextSwitchHeader::OUTGOING_STATE.set(header, switch.outgoing_state as u64);
        // Both threads inline.
        header = LegacyContextSwitchHeader::OUTGOING_PRIORITY
            .set(header, switch.outgoing_priority as u64);
        header = LegacyContextSwitchHeader::INCOMING_PRIORITY
            .set(header, switch.incoming_priority as u64);
        let mut body = Body::default();
        body.word(switch.ticks);
        body.thread(&ThreadRef::Inline(switch.outgoing));
        body.thread(&ThreadRef::Inline(switch.incoming));
        self.record(header, body)
    }

    pub fn context_switch(
        &mut self,
        ticks: u64,
        cpu: u32,
        outgoing_state: u32,
        outgoing_tid: u64,
        incoming_tid: u64,
        args: &[WriteArg<'_>],
    ) -> &mut Self {
        let mut header = RECORD_TYPE.set(0, record_type::SCHEDULER as u64);
        header = SCHED_EVENT_TYPE.set(header, sched_type::CONTEXT_SWITCH as u64);
        header = SchedHeader::ARG_COUNT.set(header, args.len() as u64);
        header = SchedHeader::CPU.set(header, cpu as u64);
        header = SchedHeader::OUTGOING_STATE.set(header, outgoing_state as u64);
        let mut body = Body::default();
        body.word(ticks);
        body.word(outgoing_tid);
        body.word(incoming_tid);
        body.args(args);
        self.record(header, body)
    }

    pub fn thread_wakeup(
        &mut self,
        ticks: u64,
        cpu: u32,
        waking_tid: u64,
        args: &[WriteArg<'_>],
    ) -> &mut Self {
        let mut header = RECORD_TYPE.set(0, record_type::SCHEDULER as u64);
        header = SCHED_EVENT_TYPE.set(header, sched_type::THREAD_WAKEUP as u64);
        header = SchedHeader::ARG_COUNT.set(header, args.len() as u64);
        header = SchedHeader::CPU.set(header, cpu as u64);
        let mut body = Body::default();
        body.word(ticks);
        body.word(waking_tid);
        body.args(args);
        self.record(header, body)
    }

    pub fn blob(&mut self, blob_type: u32, name: StringRef<'_>, data: &[u8]) -> &mut Self {
        let mut header = RECORD_TYPE.set(0, record_type::BLOB as u64);
        header = BlobHeader::NAME_REF.set(header, name.encode());
        header = BlobHeader::SIZE.set(header, data.len() as u64);
        header = BlobHeader::BLOB_TYPE.set(header, blob_type as u64);
        let mut body = Body::default();
        body.string(&name);
        body.padded(data);
        self.record(header, body)
    }
}
