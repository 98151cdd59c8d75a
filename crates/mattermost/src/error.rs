use kvnts_config::SinkType;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{endpoint} failed ({status}): {body}")]
    Api {
        endpoint: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("{endpoint} returned an unexpected body: {message}")]
    UnexpectedResponse {
        endpoint: &'static str,
        message: String,
    },
}

impl From<Error> for kvnts_sinks::Error {
    fn from(e: Error) -> Self {
        Self::delivery(SinkType::Mattermost, "rest api", e)
    }
}
