use {courier_common::ConversationIdentity, thiserror::Error};

/// Failure kinds of one inbound event, plus the fatal startup error.
#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed input: {message}")]
    MalformedInput { message: String },

    #[error("session create failed for {identity}: {source}")]
    SessionCreateFailed {
        identity: ConversationIdentity,
        #[source]
        source: courier_sessions::Error,
    },

    #[error("reasoning failed: {cause}")]
    ReasoningFailed { cause: String },

    #[error("transport error: {0}")]
    Transport(#[source] courier_telegram::Error),

    #[error("missing required configuration: {}", names.join(", "))]
    ConfigurationMissing { names: Vec<String> },

    #[error(transparent)]
    Config(courier_config::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the process must not continue after this error.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ConfigurationMissing { .. } | Self::Config(_))
    }
}

impl From<courier_telegram::Error> for Error {
    fn from(err: courier_telegram::Error) -> Self {
        match err {
            courier_telegram::Error::MalformedInput { message } => Self::MalformedInput { message },
            other => Self::Transport(other),
        }
    }
}

impl From<courier_agents::Error> for Error {
    fn from(err: courier_agents::Error) -> Self {
        match err {
            courier_agents::Error::ReasoningFailed { cause } => Self::ReasoningFailed { cause },
            other => Self::ReasoningFailed {
                cause: other.to_string(),
            },
        }
    }
}

impl From<courier_config::Error> for Error {
    fn from(err: courier_config::Error) -> Self {
        match err {
            courier_config::Error::ConfigurationMissing { names } => {
                Self::ConfigurationMissing { names }
            },
            other => Self::Config(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn telegram_malformed_maps_to_malformed_input() {
        let err: Error = courier_telegram::Error::malformed("no variant").into();
        assert!(matches!(err, Error::MalformedInput { .. }));
    }

    #[test]
    fn agent_failure_keeps_cause() {
        let err: Error = courier_agents::Error::no_final_response().into();
        assert_eq!(err.to_string(), "reasoning failed: no final response");
    }

    #[test]
    fn missing_configuration_is_fatal() {
        let err: Error = courier_config::Error::ConfigurationMissing {
            names: vec!["GOOGLE_API_KEY (agent.api_key)".into()],
        }
        .into();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("GOOGLE_API_KEY"));
    }
}
