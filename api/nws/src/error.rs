use thiserror::Error;

/// A whole fetch failed; the caller keeps whatever it showed before.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level failure (DNS, TLS, timeout, body read)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-2xx status
    #[error("HTTP {status}: {url}")]
    Status { status: reqwest::StatusCode, url: String },

    /// The body was not a feature collection
    #[error("Unreadable alert collection: {0}")]
    Parse(String),
}

/// One feature of an otherwise valid collection could not be used.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureParseError {
    #[error("feature {id:?} is missing required property '{property}'")]
    MissingProperty { id: Option<String>, property: &'static str },

    #[error("feature {id} has invalid geometry: {reason}")]
    InvalidGeometry { id: String, reason: String },

    #[error("feature {id:?} is malformed: {reason}")]
    Malformed { id: Option<String>, reason: String },

    #[error("duplicate alert id {0}")]
    DuplicateId(String),
}

impl FeatureParseError {
    /// Identity of the offending feature, when it could be read
    pub fn id(&self) -> Option<&str> {
        match self {
            FeatureParseError::MissingProperty { id, .. } | FeatureParseError::Malformed { id, .. } => id.as_deref(),
            FeatureParseError::InvalidGeometry { id, .. } => Some(id),
            FeatureParseError::DuplicateId(id) => Some(id),
        }
    }
}
