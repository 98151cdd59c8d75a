use kvnts_config::SinkType;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook rejected the card ({status}): {body}")]
    Rejected {
        status: reqwest::StatusCode,
        body: String,
    },
}

impl From<Error> for kvnts_sinks::Error {
    fn from(e: Error) -> Self {
        Self::delivery(SinkType::MicrosoftTeams, "incoming webhook", e)
    }
}
