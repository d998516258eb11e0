use thiserror::Error;

/// Errors raised while ingesting attachments or talking to the generation service.
///
/// Every variant is caught at the orchestrator boundary and surfaced to the
/// user as a bot turn; none of them escape to the presentation layer.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Failed to read file {file}: {source}")]
    FileRead {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse file {file}: {message}")]
    Parse { file: String, message: String },

    #[error("Service error ({status}): {message}")]
    Service { status: u16, message: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Nothing to send: message text and attachment list are both empty")]
    EmptyTurn,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ChatError {
    pub fn parse(file: impl Into<String>, err: &anyhow::Error) -> Self {
        Self::Parse {
            file: file.into(),
            // {:#} keeps the context chain on one line
            message: format!("{err:#}"),
        }
    }

    /// Text carried by the synthetic bot turn that reports this failure.
    pub fn turn_text(&self) -> String {
        format!("Error: {self}")
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;
