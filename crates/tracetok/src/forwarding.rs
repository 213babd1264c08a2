use std::sync::Arc;

use bytes::Bytes;

use crate::blob_queue::BlobQueue;
use crate::context::TraceContext;
use crate::error::{Result, TokenizeError};
use crate::reader::ChunkedTraceReader;
use crate::trace_type::{guess_trace_type, TraceType, GUESS_LOOKAHEAD};

/// A reader for a stream of unknown format.
///
/// Buffers the start of the stream until its type can be guessed, then
/// creates the matching reader and hands it everything received so far.
pub struct ForwardingReader {
    ctx: Arc<TraceContext>,
    pending: Vec<Bytes>,
    pending_len: usize,
    inner: Option<Box<dyn ChunkedTraceReader>>,
    trace_type: Option<TraceType>,
}

impl ForwardingReader {
    pub fn new(ctx: Arc<TraceContext>) -> Self {
        ForwardingReader {
            ctx,
            pending: Vec::new(),
            pending_len: 0,
            inner: None,
            trace_type: None,
        }
    }

    /// The detected type, once enough of the stream has been seen.
    pub fn trace_type(&self) -> Option<TraceType> {
        self.trace_type
    }

    fn start_inner(&mut self) -> Result<()> {
        let mut head = BlobQueue::new();
        for chunk in &self.pending {
            head.push_back(chunk.clone());
        }
        let head = head
            .peek(self.pending_len.min(GUESS_LOOKAHEAD))
            .unwrap_or_default();

        let trace_type = guess_trace_type(&head);
        if trace_type == TraceType::Unknown {
            return Err(TokenizeError::UnsupportedTraceType(trace_type));
        }
        log::debug!("detected {} trace", trace_type);

        let mut inner = self.ctx.create_reader(trace_type)?;
        self.pending_len = 0;
        for chunk in self.pending.drain(..) {
            inner.parse(chunk)?;
        }
        self.trace_type = Some(trace_type);
        self.inner = Some(inner);
        Ok(())
    }
}

impl ChunkedTraceReader for ForwardingReader {
    fn parse(&mut self, chunk: Bytes) -> Result<()> {
        if let Some(inner) = self.inner.as_mut() {
            return inner.parse(chunk);
        }
        if chunk.is_empty() {
            return Ok(());
        }
        self.pending_len += chunk.len();
        self.pending.push(chunk);
        if self.pending_len >= GUESS_LOOKAHEAD {
            self.start_inner()?;
        }
        Ok(())
    }

    fn notify_end_of_file(&mut self) -> Result<()> {
        if self.inner.is_none() {
            if self.pending_len == 0 {
                return Ok(());
            }
            self.start_inner()?;
        }
        match self.inner.as_mut() {
            Some(inner) => inner.notify_end_of_file(),
            None => Ok(()),
        }
    }
}
