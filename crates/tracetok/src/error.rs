use crate::trace_type::TraceType;

/// Result type for stream-level operations.
pub type Result<T> = std::result::Result<T, TokenizeError>;

/// Errors that are fatal to a byte stream.
///
/// Problems confined to a single record are never reported through this type;
/// they increment a [`crate::stats::Stat`] counter and the record is dropped.
#[derive(Debug, thiserror::Error)]
pub enum TokenizeError {
    /// A record header declared a length of zero words.
    #[error("unexpected record of size 0")]
    ZeroLengthRecord,

    #[error("invalid tar magic: {0:?}")]
    InvalidTarMagic(String),

    #[error("invalid tar header field {field}: {value:?}")]
    InvalidTarField { field: &'static str, value: String },

    /// The stream ended before the format's terminating condition.
    #[error("premature end of {0} stream")]
    PrematureEof(&'static str),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported trace type: {0}")]
    UnsupportedTraceType(TraceType),

    #[error("archive looks like an Android bug report but no bug report parser is registered")]
    MissingBugreportParser,

    #[error("{0}")]
    Nested(String),
}
