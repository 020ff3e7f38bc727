use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures raised by a [`crate::PublishApi`] implementation.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The configured base URL is not a valid HTTP URL.
    #[error("invalid publish base URL '{url}': {message}")]
    InvalidBaseUrl {
        /// Configured value.
        url: String,
        /// Parser or validation message.
        message: String,
    },

    /// No token and no handle/password pair was configured.
    #[error("missing publish credentials: set a token or a handle and password")]
    MissingCredentials,

    /// A call was made before authentication succeeded.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The request could not be sent or the response could not be read.
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        /// Endpoint path.
        endpoint: String,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with a non-success status.
    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status {
        /// Endpoint path.
        endpoint: String,
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// The response body did not have the expected shape.
    #[error("unexpected response from {endpoint}: {message}")]
    UnexpectedResponse {
        /// Endpoint path.
        endpoint: String,
        /// What was wrong with it.
        message: String,
    },

    /// The service has no boards to publish to.
    #[error("no boards available")]
    NoBoards,

    /// The archive to upload could not be opened.
    #[error("failed to read archive '{path}': {source}")]
    Archive {
        /// Archive path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}
