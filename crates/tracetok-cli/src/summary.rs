use std::collections::BTreeMap;
use std::io::Read;
use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use serde::Serialize;

use tracetok::fuchsia::args::ArgValue;
use tracetok::fuchsia::EventKind;
use tracetok::{
    ChunkedTraceReader, ForwardingReader, FuchsiaEvent, RecordingSink, StringPool, ThreadInfo,
    TraceContext, TracePayload, TraceSorter, TraceType,
};

use crate::config::CliConfig;

#[derive(Debug, Serialize)]
pub struct Summary {
    pub trace_type: Option<TraceType>,
    pub events: usize,
    pub sched_events: usize,
    pub kernel_objects: usize,
    pub stats: BTreeMap<&'static str, u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub printed_events: Vec<EventView>,
}

/// An event with its interned strings resolved.
#[derive(Debug, Serialize)]
pub struct EventView {
    pub ts: i64,
    pub thread: ThreadInfo,
    pub category: String,
    pub name: String,
    pub args: BTreeMap<String, ArgView>,
    #[serde(flatten)]
    pub kind: EventKind,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ArgView {
    Value(ArgValue),
    String(String),
}

impl EventView {
    fn new(event: &FuchsiaEvent, strings: &StringPool) -> Self {
        let args = event
            .args
            .iter()
            .map(|arg| {
                let value = match arg.value {
                    ArgValue::String(id) => ArgView::String(strings.get(id).to_string()),
                    other => ArgView::Value(other),
                };
                (strings.get(arg.name).to_string(), value)
            })
            .collect();
        EventView {
            ts: event.ts,
            thread: event.thread,
            category: strings.get(event.category).to_string(),
            name: strings.get(event.name).to_string(),
            args,
            kind: event.kind,
        }
    }
}

/// Tokenizes everything `input` yields and summarizes the result.
pub fn summarize<R: Read>(mut input: R, config: &CliConfig) -> Result<Summary> {
    let sorter = Arc::new(TraceSorter::new());
    let sink = Arc::new(RecordingSink::new());
    let ctx = TraceContext::builder()
        .sorter(sorter.clone())
        .sink(sink.clone())
        .build();
    let mut reader = ForwardingReader::new(ctx.clone());

    let mut buf = vec![0u8; config.chunk_size];
    let mut total = 0;
    loop {
        let n = input.read(&mut buf).context("failed to read trace")?;
        if n == 0 {
            break;
        }
        total += n;
        reader
            .parse(Bytes::copy_from_slice(&buf[..n]))
            .with_context(|| format!("failed to tokenize trace at offset {}", total))?;
    }
    reader
        .notify_end_of_file()
        .context("failed to finish trace")?;
    log::debug!("read {} bytes", total);

    let mut events = 0;
    let mut printed_events = Vec::new();
    for record in sorter.extract_sorted() {
        events += 1;
        let TracePayload::Fuchsia(record) = record.payload else {
            continue;
        };
        if !config.print_events || printed_events.len() >= config.max_events {
            continue;
        }
        match record.decode_event(&ctx.strings) {
            Some(event) => printed_events.push(EventView::new(&event, &ctx.strings)),
            None => log::warn!("could not decode sorted event"),
        }
    }

    Ok(Summary {
        trace_type: reader.trace_type(),
        events,
        sched_events: sink.sched_events().len(),
        kernel_objects: sink.kernel_objects().len(),
        stats: ctx.stats.snapshot(),
        printed_events,
    })
}
