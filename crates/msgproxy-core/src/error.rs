/// Errors that can occur while building or running a pipeline.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// The source has no more data. Normal termination signal.
    #[error("end of transport")]
    EndOfTransport,

    /// A codec could not frame or parse the stream.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// A stage token or its options could not be understood.
    #[error("invalid option: {0}")]
    InvalidOption(String),

    /// An I/O error occurred inside a transport stage.
    #[error("stage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StageError {
    /// Shorthand for an invalid-data error.
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        StageError::InvalidData(msg.into())
    }

    /// Shorthand for an invalid-option error.
    pub fn invalid_option(msg: impl Into<String>) -> Self {
        StageError::InvalidOption(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, StageError>;
