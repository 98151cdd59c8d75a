use {kvnts_config::SinkType, tokio_tungstenite::tungstenite};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Slack answered `ok: false` or a non-2xx status.
    #[error("{method} returned {error}")]
    Api { method: String, error: String },

    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("socket mode connection is closed")]
    Closed,
}

impl Error {
    #[must_use]
    pub fn api(method: impl Into<String>, error: impl Into<String>) -> Self {
        Self::Api {
            method: method.into(),
            error: error.into(),
        }
    }
}

impl From<Error> for kvnts_sinks::Error {
    fn from(e: Error) -> Self {
        let context = match &e {
            Error::WebSocket(_) | Error::Closed => "socket mode",
            Error::Http(_) | Error::Api { .. } | Error::Json(_) => "web api",
        };
        Self::delivery(SinkType::Slack, context, e)
    }
}
