use std::path::PathBuf;

use thiserror::Error;

use crate::sink::SinkType;

#[derive(Debug, Error)]
pub enum Error {
    #[error("sink type {sink_type} not implemented")]
    UnsupportedSinkType { sink_type: String },

    #[error("no [{section}] section for a {sink_type} sink")]
    MissingSection {
        sink_type: SinkType,
        section: &'static str,
    },

    #[error("invalid {field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },

    #[error("unsupported config format: .{extension}")]
    UnsupportedFormat { extension: String },

    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    #[must_use]
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn unsupported(sink_type: impl Into<String>) -> Self {
        Self::UnsupportedSinkType {
            sink_type: sink_type.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
