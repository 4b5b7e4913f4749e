use thiserror::Error;

/// Failure outcome of a read, write or compute call against the API.
///
/// Cloneable so a single failure can be handed verbatim to every subscriber
/// of the key it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
  /// Transport-level failure, including timeouts and unexpected status codes
  #[error("Network error: {0}")]
  Network(String),

  /// Request payload rejected, locally before sending or by the server
  #[error("Invalid request: {0}")]
  Validation(String),

  /// Entity deleted or never existed
  #[error("Not found: {0}")]
  NotFound(String),

  /// Match computation failed on the server
  #[error("Match computation failed: {0}")]
  Compute(String),

  /// Success status, but the payload did not have the expected shape
  #[error("Malformed response: {0}")]
  MalformedResponse(String),
}

impl ApiError {
  pub fn is_not_found(&self) -> bool {
    matches!(self, ApiError::NotFound(_))
  }
}

impl From<reqwest::Error> for ApiError {
  fn from(err: reqwest::Error) -> Self {
    if err.is_decode() {
      ApiError::MalformedResponse(err.to_string())
    } else {
      ApiError::Network(err.to_string())
    }
  }
}

impl From<serde_json::Error> for ApiError {
  fn from(err: serde_json::Error) -> Self {
    ApiError::MalformedResponse(err.to_string())
  }
}
