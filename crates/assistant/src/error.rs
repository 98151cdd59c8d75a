use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unable to find env variable {name}")]
    MissingApiKey { name: &'static str },

    #[error(transparent)]
    OpenAi(#[from] async_openai::error::OpenAIError),

    #[error("completion returned no content")]
    EmptyResponse,
}

pub type Result<T> = std::result::Result<T, Error>;
