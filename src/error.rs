//! Error types shared across the analyzer, probe, and store.

pub type Result<T> = std::result::Result<T, Error>;

/// Reason a frame was rejected by the wire codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed BER structure")]
    Malformed,

    #[error("frame truncated")]
    Truncated,

    #[error("unsupported SNMP version {0}")]
    UnsupportedVersion(i64),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("timeout")]
    Timeout,

    #[error("SNMP error status {0}")]
    Snmp(i64),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("cancelled")]
    Cancelled,
}

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// True for errors that abort the process; everything else is
    /// converted to a log event and a counter bump by the pipeline.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
