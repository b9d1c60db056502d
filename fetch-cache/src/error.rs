use crate::key::RequestKey;

/// Misuse of the registry/cache contracts or invalid setup.
/// These are fatal to the call path and never describe network conditions.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("A request is already in flight for key {0}")]
    AlreadyInFlight(RequestKey),
    #[error("No request is in flight for key {0}")]
    NotInFlight(RequestKey),
    #[error("No cached response exists for key {0}")]
    NoCachedResponse(RequestKey),
    #[error("Invalid value '{value}' for option '{option}'")]
    InvalidOption { option: &'static str, value: String },
    #[error("Member {index} is out of range for a composition of {len} requests")]
    MemberOutOfRange { index: usize, len: usize },
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

/// Failure of a network attempt. Cloned to every subscriber of the attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("Network request failed: {0}")]
    Network(String),
    #[error("Request was aborted")]
    Aborted,
    #[error("Request timed out")]
    Timeout,
    #[error("Response body could not be read: {0}")]
    Body(String),
}

impl FetchError {
    /// Deliberate aborts should usually not surface as user-facing errors.
    pub fn is_abort(&self) -> bool {
        matches!(self, FetchError::Aborted)
    }
}
