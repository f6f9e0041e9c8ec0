use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("unsupported config format: .{extension}")]
    UnsupportedFormat { extension: String },

    /// One or more required values are absent. Fatal at startup.
    #[error("missing required configuration: {}", names.join(", "))]
    ConfigurationMissing { names: Vec<String> },

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn parse(path: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

impl courier_common::FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

courier_common::impl_context!();

pub type Result<T> = std::result::Result<T, Error>;
