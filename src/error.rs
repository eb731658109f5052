use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("configuration error: {0}")]
    Config(String),

    /// The service accepted the call but reported a failure of its own.
    #[error("ecmwf.API error: {0}")]
    Service(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("http status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// A reply that does not follow the Web API's shape.
    #[error("unexpected reply: {0}")]
    Protocol(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("transfer incomplete: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },
}

impl Error {
    /// True when the remote service itself rejected or failed the request.
    pub fn is_service(&self) -> bool {
        matches!(self, Error::Service(_))
    }
}
