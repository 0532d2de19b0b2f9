/// Errors surfaced by the live-update engine.
///
/// Every variant carries owned strings so the error is `Clone` and can ride
/// inside UI messages.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("Invalid address: {0}")]
    Address(String),

    #[error("Connection error: {0}")]
    Transport(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Server returned {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Message not found: {0}")]
    NotFound(String),

    #[error("No mailbox selected")]
    NoMailbox,

    #[error("Config error: {0}")]
    Config(String),

    #[error("File error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::Address(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Decode(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Error::Decode(e.to_string())
        } else {
            Error::Http(e.to_string())
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::Transport(e.to_string())
    }
}
