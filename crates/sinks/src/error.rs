use std::{error::Error as StdError, time::Duration};

use kvnts_config::SinkType;

/// Crate-wide result type for sink operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed sink errors shared by every sink implementation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bad or missing credentials, or a configuration that does not match
    /// its sink type. Fatal for that sink only.
    #[error("invalid sink configuration: {message}")]
    Config { message: String },

    /// The configured channel type is not implemented.
    #[error("sink {sink_type} not implemented")]
    UnsupportedType { sink_type: String },

    /// The channel API rejected or failed a delivery.
    #[error("{sink} delivery failed: {context}: {source}")]
    Delivery {
        sink: SinkType,
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// The completion service failed while answering an interactive request.
    /// Reported back to the channel, never propagated out of a listener.
    #[error("{message}")]
    Completion { message: String },

    /// No live client is cached under this identity.
    #[error("no cached sink for {identity}")]
    NotFound { identity: String },

    /// One or more sinks failed during a dispatch.
    #[error("{failed} sink(s) failed, retry after {}s", retry_after.as_secs())]
    Dispatch { failed: usize, retry_after: Duration },
}

impl Error {
    #[must_use]
    pub fn config(message: impl std::fmt::Display) -> Self {
        Self::Config {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn unsupported(sink_type: impl Into<String>) -> Self {
        Self::UnsupportedType {
            sink_type: sink_type.into(),
        }
    }

    #[must_use]
    pub fn delivery(
        sink: SinkType,
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Delivery {
            sink,
            context: context.into(),
            source: Box::new(source),
        }
    }

    #[must_use]
    pub fn completion(message: impl std::fmt::Display) -> Self {
        Self::Completion {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn not_found(identity: impl std::fmt::Display) -> Self {
        Self::NotFound {
            identity: identity.to_string(),
        }
    }
}

impl From<kvnts_config::Error> for Error {
    fn from(e: kvnts_config::Error) -> Self {
        match e {
            kvnts_config::Error::UnsupportedSinkType { sink_type } => {
                Self::UnsupportedType { sink_type }
            },
            other => Self::config(other),
        }
    }
}
