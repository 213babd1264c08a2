use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::archive::{ArchiveEntry, TarReader, ZipReader};
use crate::error::{Result, TokenizeError};
use crate::fuchsia::FuchsiaTokenizer;
use crate::gzip::GzipReader;
use crate::reader::ChunkedTraceReader;
use crate::sink::{ImmediateSink, NullSink};
use crate::sorter::{Sorter, TraceSorter};
use crate::stats::Stats;
use crate::string_pool::StringPool;
use crate::trace_type::TraceType;

/// Builds a reader for one trace type.
pub type ReaderFactory =
    Box<dyn Fn(&Arc<TraceContext>) -> Box<dyn ChunkedTraceReader> + Send + Sync>;

/// Handles zip archives recognised as Android bug reports.
pub trait BugreportParser: Send + Sync {
    fn parse(&self, ctx: &Arc<TraceContext>, entries: Vec<ArchiveEntry>) -> Result<()>;
}

/// State shared by every reader of one tracing session.
pub struct TraceContext {
    pub stats: Stats,
    pub strings: StringPool,
    sorter: Arc<dyn Sorter>,
    sink: Arc<dyn ImmediateSink>,
    factories: HashMap<TraceType, ReaderFactory>,
    bugreport_parser: Option<Arc<dyn BugreportParser>>,
}

impl fmt::Debug for TraceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceContext")
            .field("stats", &self.stats)
            .field("strings", &self.strings.len())
            .field("factories", &self.factories.keys().collect::<Vec<_>>())
            .field("bugreport_parser", &self.bugreport_parser.is_some())
            .finish()
    }
}

impl TraceContext {
    pub fn builder() -> TraceContextBuilder {
        TraceContextBuilder::default()
    }

    pub fn sorter(&self) -> &dyn Sorter {
        self.sorter.as_ref()
    }

    pub fn sink(&self) -> &dyn ImmediateSink {
        self.sink.as_ref()
    }

    pub fn bugreport_parser(&self) -> Option<&Arc<dyn BugreportParser>> {
        self.bugreport_parser.as_ref()
    }

    /// Reports whether [`TraceContext::create_reader`] can handle `trace_type`.
    pub fn has_reader(&self, trace_type: TraceType) -> bool {
        self.factories.contains_key(&trace_type)
            || matches!(
                trace_type,
                TraceType::Fuchsia | TraceType::Tar | TraceType::Zip | TraceType::Gzip
            )
    }

    /// Creates a fresh reader for `trace_type`.
    ///
    /// Registered factories take precedence over the built-in readers.
    pub fn create_reader(self: &Arc<Self>, trace_type: TraceType) -> Result<Box<dyn ChunkedTraceReader>> {
        if let Some(factory) = self.factories.get(&trace_type) {
            return Ok(factory(self));
        }
        let reader: Box<dyn ChunkedTraceReader> = match trace_type {
            TraceType::Fuchsia => Box::new(FuchsiaTokenizer::new(self.clone())),
            TraceType::Tar => Box::new(TarReader::new(self.clone())),
            TraceType::Zip => Box::new(ZipReader::new(self.clone())),
            TraceType::Gzip => Box::new(GzipReader::new(self.clone())),
            other => return Err(TokenizeError::UnsupportedTraceType(other)),
        };
        Ok(reader)
    }
}

pub struct TraceContextBuilder {
    sorter: Option<Arc<dyn Sorter>>,
    sink: Option<Arc<dyn ImmediateSink>>,
    factories: HashMap<TraceType, ReaderFactory>,
    bugreport_parser: Option<Arc<dyn BugreportParser>>,
}

impl Default for TraceContextBuilder {
    fn default() -> Self {
        TraceContextBuilder {
            sorter: None,
            sink: None,
            factories: HashMap::new(),
            bugreport_parser: None,
        }
    }
}

impl TraceContextBuilder {
    pub fn sorter(mut self, sorter: Arc<dyn Sorter>) -> Self {
        self.sorter = Some(sorter);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn ImmediateSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Registers a reader for `trace_type`, replacing any earlier one.
    pub fn reader<F>(mut self, trace_type: TraceType, factory: F) -> Self
    where
        F: Fn(&Arc<TraceContext>) -> Box<dyn ChunkedTraceReader> + Send + Sync + 'static,
    {
        self.factories.insert(trace_type, Box::new(factory));
        self
    }

    pub fn bugreport_parser(mut self, parser: Arc<dyn BugreportParser>) -> Self {
        self.bugreport_parser = Some(parser);
        self
    }

    pub fn build(self) -> Arc<TraceContext> {
        Arc::new(TraceContext {
            stats: Stats::new(),
            strings: StringPool::new(),
            sorter: self
                .sorter
                .unwrap_or_else(|| Arc::new(TraceSorter::new())),
            sink: self.sink.unwrap_or_else(|| Arc::new(NullSink)),
            factories: self.factories,
            bugreport_parser: self.bugreport_parser,
        })
    }
}
