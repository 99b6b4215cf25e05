//! Errors raised by the external collaborators (Notion, OpenAI) and by
//! classifier output validation.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Transport failure: connection, timeout, TLS.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("{service} returned {status}: {body}")]
    Api {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// The service answered 2xx but the payload was not what we expected.
    #[error("Unexpected {service} response: {message}")]
    InvalidResponse {
        service: &'static str,
        message: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The classifier returned a tag that is not part of the vocabulary.
    #[error("Classifier returned tag outside the vocabulary: {tag:?}")]
    UnknownTag { tag: String },

    /// The model declined to answer.
    #[error("Classifier refused: {0}")]
    Refusal(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
