use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// A question-answering request that did not produce an answer.
///
/// Callers treat every variant the same way; the variants only exist so the
/// cause can be logged.
#[derive(Debug, Error)]
pub enum RequestFailed {
    #[error("could not reach the question-answering service: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("question-answering service returned status {0}")]
    Status(StatusCode),

    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("malformed response body: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("request task ended without a result: {0}")]
    Aborted(String),
}
