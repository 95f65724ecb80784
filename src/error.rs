use thiserror::Error;

/// Why a wire record could not become an observation record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("record is missing field `{0}`")]
    MissingField(&'static str),
    #[error("record time `{0}` is not a recognised timestamp")]
    BadTime(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("invalid record: {0}")]
    InvalidRecord(#[from] RecordError),
}

/// Failures talking to the capture backend. All of them are recoverable:
/// the engine keeps serving the last good buffer.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("record source unavailable: {0}")]
    Unavailable(#[from] reqwest::Error),
    #[error("record source answered {status} for {path}")]
    Status { path: String, status: u16 },
    #[error("could not decode source payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("push channel error: {0}")]
    Push(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("push channel closed by peer")]
    PushClosed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value `{value}` for {key}")]
    InvalidValue { key: String, value: String },
    #[error("color palette must contain at least one entry")]
    EmptyPalette,
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
