use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Limiter actor unavailable: {0}")]
    Unavailable(String),

    #[error("Server returned status {0}")]
    Status(u16),

    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
