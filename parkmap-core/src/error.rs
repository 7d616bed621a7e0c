use thiserror::Error;

/// HTTP code reported when a bounding-box string does not have exactly four
/// comma-separated components.
pub const INVALID_BOUNDING_BOX_CODE: u16 = 400;
pub const INVALID_BOUNDING_BOX_MESSAGE: &str = "Invalid bounding box format";

/// Failure of a single places fetch attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The places endpoint answered with a non-success status, or the
    /// request was rejected before it was issued.
    #[error("places request failed with status {code}: {message}")]
    Remote { code: u16, message: String },

    /// Network or body-level fault before a status could be interpreted.
    #[error("transport failure: {0}")]
    Transport(String),
}

impl FetchError {
    pub fn invalid_bounding_box() -> Self {
        FetchError::Remote {
            code: INVALID_BOUNDING_BOX_CODE,
            message: INVALID_BOUNDING_BOX_MESSAGE.to_string(),
        }
    }
}

/// User-facing error notification published by the map session.
///
/// The generic variants cover responses that carried no usable message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorNotice {
    #[error("could not obtain a location fix")]
    LocationFailed,

    #[error("server rejected the request ({code}): {message}")]
    Remote { code: u16, message: String },

    #[error("server rejected the request")]
    RemoteGeneric,

    #[error("network failure: {0}")]
    Transport(String),

    #[error("network failure")]
    TransportGeneric,
}

impl From<FetchError> for ErrorNotice {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Remote { code, message } => {
                if message.trim().is_empty() {
                    ErrorNotice::RemoteGeneric
                } else {
                    ErrorNotice::Remote { code, message }
                }
            }
            FetchError::Transport(message) => {
                if message.trim().is_empty() {
                    ErrorNotice::TransportGeneric
                } else {
                    ErrorNotice::Transport(message)
                }
            }
        }
    }
}
