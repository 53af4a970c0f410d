use thiserror::Error;

/// Failure to turn a frame into an [`Envelope`](crate::Envelope).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("Unknown message kind {0}")]
    UnknownKind(u16),
}

/// Invalid or unparseable bus configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Errors returned while setting up bus components.
///
/// Once a component is running, failures are logged and never returned.
#[derive(Error, Debug)]
pub enum BusError {
    #[error(transparent)]
    Fabric(#[from] pushbus_fabric::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("No tokio runtime available")]
    NoRuntime,
}

pub type Result<T> = std::result::Result<T, BusError>;

/// Outcome of a receiver handling one envelope.
pub type HandlerResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;
