use std::collections::HashMap;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};

use crate::context::TraceContext;
use crate::cursor::{ticks_to_ns, RecordCursor, ThreadInfo};
use crate::error::Result;
use crate::framer::RecordFramer;
use crate::fuchsia::args::{find_arg, parse_args, read_string_ref, read_thread_ref, Arg, ArgValue};
use crate::fuchsia::layout::{
    self, inline_string_len, is_inline_string, is_inline_thread, metadata_type, object_type,
    record_type, sched_type, ArgHeader, BlobHeader, EventHeader, KernelObjectHeader,
    LegacyContextSwitchHeader, MetadataHeader, SchedHeader, StringHeader, ThreadHeader,
    PERFETTO_BLOB, RECORD_TYPE, SCHED_EVENT_TYPE,
};
use crate::fuchsia::provider::{Provider, ProviderTable};
use crate::fuchsia::record::FuchsiaRecord;
use crate::reader::ChunkedTraceReader;
use crate::sink::{
    ContextSwitch, KernelObject, SchedEvent, ThreadState, ThreadWakeup, IDLE_WEIGHT,
};
use crate::sorter::TracePayload;
use crate::stats::Stat;
use crate::string_pool::StringId;
use crate::trace_type::TraceType;

/// Tokenizes a Fuchsia trace stream.
///
/// Metadata, string and thread records update the provider tables. Events are
/// snapshotted into [`FuchsiaRecord`]s and pushed to the sorter. Scheduler and
/// kernel object records go straight to the immediate sink. Embedded perfetto
/// blobs are forwarded to a nested proto reader.
pub struct FuchsiaTokenizer {
    framer: RecordFramer,
    decoder: RecordDecoder,
}

impl FuchsiaTokenizer {
    pub fn new(ctx: Arc<TraceContext>) -> Self {
        FuchsiaTokenizer {
            framer: RecordFramer::new(layout::record_len_bytes),
            decoder: RecordDecoder::new(ctx),
        }
    }

    pub fn providers(&self) -> &ProviderTable {
        &self.decoder.providers
    }
}

impl ChunkedTraceReader for FuchsiaTokenizer {
    fn parse(&mut self, chunk: Bytes) -> Result<()> {
        let decoder = &mut self.decoder;
        self.framer.feed(chunk, |record| decoder.parse_record(record))?;
        decoder.flush_proto()
    }

    fn notify_end_of_file(&mut self) -> Result<()> {
        let trailing = self.framer.leftover().len();
        if trailing > 0 {
            log::debug!("fuchsia trace ends with {} bytes of an incomplete record", trailing);
            self.decoder
                .ctx
                .stats
                .add(Stat::FuchsiaTrailingBytes, trailing as u64);
        }
        self.decoder.flush_proto()?;
        if let Some(reader) = self.decoder.proto_reader.as_mut() {
            reader.notify_end_of_file()?;
        }
        Ok(())
    }
}

/// Interned names of arguments the decoder looks for.
struct ArgNames {
    process: StringId,
    incoming_weight: StringId,
    outgoing_weight: StringId,
    weight: StringId,
}

struct RecordDecoder {
    ctx: Arc<TraceContext>,
    providers: ProviderTable,
    /// Thread koid to process koid, learned from kernel object records.
    pids: HashMap<u64, u64>,
    proto_data: BytesMut,
    proto_reader: Option<Box<dyn ChunkedTraceReader>>,
    names: ArgNames,
}

impl RecordDecoder {
    fn new(ctx: Arc<TraceContext>) -> Self {
        let names = ArgNames {
            process: ctx.strings.intern("process"),
            incoming_weight: ctx.strings.intern("incoming_weight"),
            outgoing_weight: ctx.strings.intern("outgoing_weight"),
            weight: ctx.strings.intern("weight"),
        };
        RecordDecoder {
            ctx,
            providers: ProviderTable::new(),
            pids: HashMap::new(),
            proto_data: BytesMut::new(),
            proto_reader: None,
            names,
        }
    }

    fn parse_record(&mut self, record: Bytes) {
        if self.decode(record).is_none() {
            self.ctx.stats.increment(Stat::FuchsiaInvalidEvent);
        }
    }

    /// Decodes one complete record. `None` means the record was malformed;
    /// records dropped for other reasons are counted where they are dropped.
    fn decode(&mut self, record: Bytes) -> Option<()> {
        let mut cursor = RecordCursor::new(&record);
        let header = cursor.read_u64()?;

        match RECORD_TYPE.get_u32(header) {
            record_type::METADATA => self.decode_metadata(header, &mut cursor),
            record_type::INITIALIZATION => {
                let ticks_per_second = cursor.read_u64()?;
                self.providers.set_ticks_per_second(ticks_per_second);
                Some(())
            }
            record_type::STRING => {
                let h = StringHeader::decode(header);
                if h.index != 0 {
                    let bytes = cursor.read_inline_string(h.len)?;
                    let id = self.ctx.strings.intern_bytes(bytes);
                    self.providers.set_string(h.index, id);
                }
                Some(())
            }
            record_type::THREAD => {
                let h = ThreadHeader::decode(header);
                if h.index != 0 {
                    let info = cursor.read_inline_thread()?;
                    self.providers.set_thread(h.index, info);
                }
                Some(())
            }
            record_type::EVENT => self.decode_event(header, &mut cursor, &record),
            record_type::BLOB => self.decode_blob(header, &mut cursor),
            record_type::KERNEL_OBJECT => self.decode_kernel_object(header, &mut cursor),
            record_type::SCHEDULER => self.decode_scheduler(header, &mut cursor),
            other => {
                log::debug!("skipping fuchsia record of unknown type {}", other);
                self.ctx.stats.increment(Stat::FuchsiaUnknownRecord);
                Some(())
            }
        }
    }

    fn decode_metadata(&mut self, header: u64, cursor: &mut RecordCursor<'_>) -> Option<()> {
        let h = MetadataHeader::decode(header);
        match h.metadata_type {
            metadata_type::PROVIDER_INFO => {
                let name = cursor.read_inline_string(h.name_len)?;
                let name = String::from_utf8_lossy(name).into_owned();
                self.providers.register_provider(h.provider_id, name);
            }
            metadata_type::PROVIDER_SECTION => {
                self.providers.select_provider(h.provider_id);
            }
            metadata_type::PROVIDER_EVENT => {
                // The only provider event is "buffer full".
                log::debug!(
                    "fuchsia provider {} dropped events, the trace may be incomplete",
                    h.provider_id
                );
                self.ctx.stats.increment(Stat::FuchsiaProviderEvent);
            }
            metadata_type::TRACE_INFO => {}
            other => log::debug!("ignoring fuchsia metadata record of type {}", other),
        }
        Some(())
    }

    fn decode_event(
        &mut self,
        header: u64,
        cursor: &mut RecordCursor<'_>,
        record: &Bytes,
    ) -> Option<()> {
        let h = EventHeader::decode(header);
        let provider = self.providers.current();
        let ticks_per_second = provider.ticks_per_second();

        let ticks = cursor.read_u64()?;
        let Some(ts) = ticks_to_ns(ticks, ticks_per_second) else {
            log::debug!("fuchsia event timestamp {} overflows", ticks);
            self.ctx.stats.increment(Stat::FuchsiaTimestampOverflow);
            return Some(());
        };

        let mut snapshot = FuchsiaRecord::new(record.clone(), ticks_per_second);
        if is_inline_thread(h.thread_ref) {
            cursor.read_inline_thread()?;
        } else {
            snapshot.insert_thread(h.thread_ref, provider.get_thread(h.thread_ref));
        }
        snapshot_string(cursor, provider, &mut snapshot, h.category_ref)?;
        snapshot_string(cursor, provider, &mut snapshot, h.name_ref)?;

        for _ in 0..h.arg_count {
            let base = cursor.word_index();
            let arg = ArgHeader::decode(cursor.read_u64()?);
            if arg.size_words == 0 {
                return None;
            }
            snapshot_string(cursor, provider, &mut snapshot, arg.name_ref)?;
            if arg.arg_type == layout::arg_type::STRING {
                snapshot_string(cursor, provider, &mut snapshot, arg.string_value_ref())?;
            }
            cursor.set_word_index(base.checked_add(arg.size_words)?)?;
        }

        self.ctx.sorter().push(ts, TracePayload::Fuchsia(snapshot));
        Some(())
    }

    fn decode_blob(&mut self, header: u64, cursor: &mut RecordCursor<'_>) -> Option<()> {
        let h = BlobHeader::decode(header);
        if h.blob_type != PERFETTO_BLOB {
            log::debug!("ignoring fuchsia blob of type {}", h.blob_type);
            return Some(());
        }
        if is_inline_string(h.name_ref) {
            cursor.read_inline_string(inline_string_len(h.name_ref))?;
        }
        let data = cursor.read_blob(h.size as u64)?;
        if self.proto_reader.is_none() && !self.ctx.has_reader(TraceType::Proto) {
            log::debug!(
                "dropping {} bytes of embedded proto data: no proto reader",
                data.len()
            );
            self.ctx.stats.increment(Stat::FuchsiaBlobDropped);
            return Some(());
        }
        self.proto_data.extend_from_slice(data);
        Some(())
    }

    fn decode_kernel_object(&mut self, header: u64, cursor: &mut RecordCursor<'_>) -> Option<()> {
        let h = KernelObjectHeader::decode(header);
        let koid = cursor.read_u64()?;
        let provider = self.providers.current();
        let pool = &self.ctx.strings;
        let name = read_string_ref(cursor, h.name_ref, provider, pool)?;

        match h.object_type {
            object_type::PROCESS => {
                self.ctx
                    .sink()
                    .on_kernel_object(KernelObject::Process { pid: koid, name });
            }
            object_type::THREAD => {
                let args = parse_args(cursor, h.arg_count, provider, pool)?;
                let pid = match find_arg(&args, self.names.process) {
                    Some(ArgValue::Koid(pid)) => pid,
                    Some(_) => return None,
                    None => 0,
                };
                self.pids.insert(koid, pid);
                self.ctx.sink().on_kernel_object(KernelObject::Thread {
                    tid: koid,
                    pid,
                    name,
                });
            }
            other => log::debug!("ignoring fuchsia kernel object of type {}", other),
        }
        Some(())
    }

    fn decode_scheduler(&mut self, header: u64, cursor: &mut RecordCursor<'_>) -> Option<()> {
        let ticks_per_second = self.providers.current().ticks_per_second();
        let event = match SCHED_EVENT_TYPE.get_u32(header) {
            sched_type::LEGACY_CONTEXT_SWITCH => {
                let h = LegacyContextSwitchHeader::decode(header);
                let ts = cursor.read_timestamp(ticks_per_second)?;
                let outgoing = self.read_thread(cursor, h.outgoing_thread_ref)?;
                let incoming = self.read_thread(cursor, h.incoming_thread_ref)?;
                // Idleness only trusts process koids learned from kernel objects.
                let outgoing_pid = self.known_thread(outgoing.tid).pid;
                let incoming_pid = self.known_thread(incoming.tid).pid;
                SchedEvent::ContextSwitch(ContextSwitch {
                    ts,
                    cpu: h.cpu,
                    outgoing_state: ThreadState::from_raw(h.outgoing_state),
                    outgoing_is_idle: outgoing_pid == 0 && h.outgoing_priority == 0,
                    incoming_is_idle: incoming_pid == 0 && h.incoming_priority == 0,
                    outgoing,
                    incoming,
                })
            }
            sched_type::CONTEXT_SWITCH => {
                let h = SchedHeader::decode(header);
                let ts = cursor.read_timestamp(ticks_per_second)?;
                let outgoing = self.known_thread(cursor.read_u64()?);
                let incoming = self.known_thread(cursor.read_u64()?);
                let args = self.parse_sched_args(cursor, h.arg_count)?;
                let outgoing_weight = int32_arg(&args, self.names.outgoing_weight)?;
                let incoming_weight = int32_arg(&args, self.names.incoming_weight)?;
                SchedEvent::ContextSwitch(ContextSwitch {
                    ts,
                    cpu: h.cpu,
                    outgoing_state: ThreadState::from_raw(h.outgoing_state),
                    outgoing,
                    incoming,
                    outgoing_is_idle: outgoing_weight == Some(IDLE_WEIGHT),
                    incoming_is_idle: incoming_weight == Some(IDLE_WEIGHT),
                })
            }
            sched_type::THREAD_WAKEUP => {
                let h = SchedHeader::decode(header);
                let ts = cursor.read_timestamp(ticks_per_second)?;
                let waking = self.known_thread(cursor.read_u64()?);
                let args = self.parse_sched_args(cursor, h.arg_count)?;
                let weight = int32_arg(&args, self.names.weight)?;
                SchedEvent::Wakeup(ThreadWakeup {
                    ts,
                    cpu: h.cpu,
                    waking,
                    is_idle: weight == Some(IDLE_WEIGHT),
                })
            }
            other => {
                log::debug!("skipping fuchsia scheduler record of unknown type {}", other);
                self.ctx.stats.increment(Stat::FuchsiaUnknownRecord);
                return Some(());
            }
        };
        self.ctx.sink().on_sched_event(event);
        Some(())
    }

    fn parse_sched_args(
        &self,
        cursor: &mut RecordCursor<'_>,
        count: u32,
    ) -> Option<Vec<Arg>> {
        parse_args(cursor, count, self.providers.current(), &self.ctx.strings)
    }

    /// Reads an inline or indexed thread, preferring the process koid learned
    /// from kernel object records.
    fn read_thread(&self, cursor: &mut RecordCursor<'_>, thread_ref: u32) -> Option<ThreadInfo> {
        let info = read_thread_ref(cursor, thread_ref, self.providers.current())?;
        match self.pids.get(&info.tid) {
            Some(&pid) => Some(ThreadInfo { pid, tid: info.tid }),
            None => Some(info),
        }
    }

    /// A thread known only by its koid.
    fn known_thread(&self, tid: u64) -> ThreadInfo {
        ThreadInfo {
            pid: self.pids.get(&tid).copied().unwrap_or(0),
            tid,
        }
    }

    /// Hands accumulated proto bytes to the nested proto reader.
    fn flush_proto(&mut self) -> Result<()> {
        if self.proto_data.is_empty() {
            return Ok(());
        }
        let data = self.proto_data.split().freeze();
        if self.proto_reader.is_none() {
            self.proto_reader = Some(self.ctx.create_reader(TraceType::Proto)?);
        }
        match self.proto_reader.as_mut() {
            Some(reader) => reader.parse(data),
            None => Ok(()),
        }
    }
}

/// Resolves a by-index string into `snapshot`, or skips over an inline one.
fn snapshot_string(
    cursor: &mut RecordCursor<'_>,
    provider: &Provider,
    snapshot: &mut FuchsiaRecord,
    string_ref: u32,
) -> Option<()> {
    if is_inline_string(string_ref) {
        cursor.read_inline_string(inline_string_len(string_ref))?;
    } else {
        snapshot.insert_string(string_ref, provider.get_string(string_ref));
    }
    Some(())
}

/// Looks up an int32 argument. The outer `None` means the argument has the
/// wrong type; the inner one that it is absent.
fn int32_arg(args: &[Arg], name: StringId) -> Option<Option<i32>> {
    match find_arg(args, name) {
        Some(ArgValue::Int32(v)) => Some(Some(v)),
        Some(_) => None,
        None => Some(None),
    }
}
