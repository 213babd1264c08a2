use bytes::Bytes;

use crate::error::Result;

/// A consumer of a chunked byte stream.
///
/// Chunk boundaries carry no meaning: feeding the same bytes split differently
/// must produce the same records. After `notify_end_of_file` returns, or after
/// any call returns an error, the reader must not be used again.
pub trait ChunkedTraceReader: Send {
    fn parse(&mut self, chunk: Bytes) -> Result<()>;

    fn notify_end_of_file(&mut self) -> Result<()>;
}

impl<R: ChunkedTraceReader + ?Sized> ChunkedTraceReader for Box<R> {
    fn parse(&mut self, chunk: Bytes) -> Result<()> {
        (**self).parse(chunk)
    }

    fn notify_end_of_file(&mut self) -> Result<()> {
        (**self).notify_end_of_file()
    }
}

/// Feeds `data` to `reader` as one chunk and signals end of file.
pub fn parse_whole(reader: &mut dyn ChunkedTraceReader, data: Bytes) -> Result<()> {
    reader.parse(data)?;
    reader.notify_end_of_file()
}
