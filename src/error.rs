//! Error types for the bridge.
//!
//! None of these ever reach the host's frame loop as a panic; the session
//! coordinator logs them and degrades to "hold last state" or "reset session".

/// Failure to turn an inbound payload into a [`CommandMessage`].
///
/// [`CommandMessage`]: crate::decoder::CommandMessage
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Malformed JSON: {0}")]
    Syntax(#[source] serde_json::Error),

    #[error("Payload does not match the command schema: {0}")]
    Schema(#[source] serde_json::Error),

    #[error("Field `{field}` expects {expected} components, got {actual}")]
    Arity {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Failure to spawn an entity from the template catalog.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SpawnError {
    #[error("Unknown template: {0}")]
    UnknownTemplate(String),
}

/// The action table failed startup validation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Action name must not be empty")]
    EmptyName,

    #[error("Action name contains whitespace: {0:?}")]
    InvalidName(String),

    #[error("Action registered twice: {0}")]
    Duplicate(String),
}

/// Transport-level faults. Fatal to the transport thread only.
#[cfg(feature = "server")]
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to bind {endpoint}: {source}")]
    Bind {
        endpoint: String,
        #[source]
        source: zeromq::ZmqError,
    },

    #[error("Socket error: {0}")]
    Socket(#[from] zeromq::ZmqError),

    #[error("Failed to start transport runtime: {0}")]
    Runtime(#[from] std::io::Error),
}
