use thiserror::Error;

pub type MsqhResult<T> = Result<T, MsqhError>;

#[derive(Debug, Error)]
pub enum MsqhError {
    #[error("unsupported container format: {0}")]
    UnsupportedFormat(String),

    #[error("malformed container: {0}")]
    Malformed(String),

    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("could not decrypt: the answers do not unlock this file")]
    CouldNotDecrypt,

    #[error("partially could not decrypt: decrypted data does not match the reference")]
    PartialIntegrity,

    #[error("cannot tell which answers are correct: the payload is empty")]
    CorrectnessUnknown,

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MsqhError {
    /// True for errors raised while reading a container envelope.
    pub fn is_format_error(&self) -> bool {
        matches!(self, Self::UnsupportedFormat(_) | Self::Malformed(_))
    }
}
