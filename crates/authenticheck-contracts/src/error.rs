use thiserror::Error;

/// Failures on the verification path. Each one aborts the submission and
/// surfaces as a single user-visible message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    #[error("could not read image: {0}")]
    Encoding(String),

    #[error("remote model request failed: {0}")]
    Request(String),

    #[error("malformed model response: {0}")]
    MalformedResponse(String),
}

impl VerificationError {
    pub fn is_encoding(&self) -> bool {
        matches!(self, Self::Encoding(_))
    }

    pub fn is_request(&self) -> bool {
        matches!(self, Self::Request(_))
    }

    pub fn is_malformed_response(&self) -> bool {
        matches!(self, Self::MalformedResponse(_))
    }
}

/// History storage failures. Logged by the history store, never shown.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    #[error("history read failed: {0}")]
    Read(String),

    #[error("history write failed: {0}")]
    Write(String),

    #[error("history payload could not be decoded: {0}")]
    Decode(String),
}

/// A chat turn failed while its reply was streaming.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("chat stream failed: {0}")]
pub struct StreamError(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("a reply is still streaming")]
    Busy,

    #[error("message is empty")]
    EmptyMessage,
}
