use std::io::Write;
use std::sync::Arc;

use bytes::Bytes;
use flate2::write::GzDecoder;

use crate::context::TraceContext;
use crate::error::Result;
use crate::forwarding::ForwardingReader;
use crate::reader::ChunkedTraceReader;

/// Decompresses a gzip stream and parses the result as a trace of any
/// supported type, including another compressed or archived one.
pub struct GzipReader {
    decoder: GzDecoder<Vec<u8>>,
    inner: ForwardingReader,
}

impl GzipReader {
    pub fn new(ctx: Arc<TraceContext>) -> Self {
        GzipReader {
            decoder: GzDecoder::new(Vec::new()),
            inner: ForwardingReader::new(ctx),
        }
    }

    /// Forwards whatever the decoder has produced so far.
    fn drain(&mut self) -> Result<()> {
        let out = std::mem::take(self.decoder.get_mut());
        if out.is_empty() {
            return Ok(());
        }
        self.inner.parse(Bytes::from(out))
    }
}

impl ChunkedTraceReader for GzipReader {
    fn parse(&mut self, chunk: Bytes) -> Result<()> {
        self.decoder.write_all(&chunk)?;
        self.decoder.flush()?;
        self.drain()
    }

    fn notify_end_of_file(&mut self) -> Result<()> {
        self.decoder.try_finish()?;
        self.drain()?;
        self.inner.notify_end_of_file()
    }
}
