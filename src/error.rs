//! Error types for extract definition, codebook parsing and API calls.
//!
//! Every failure the library surfaces is an [`IpumsError`]. The first four
//! variants form the user-facing taxonomy of the extract API; the rest carry
//! transport, filesystem and parsing context.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Fixed message for id-dependent operations on an unsubmitted extract.
pub const NOT_SUBMITTED_MESSAGE: &str =
    "Extract has not been submitted and so has no json response";

/// Fixed message used when the server answers 404 for an extract record.
pub const PAGE_NOT_FOUND_MESSAGE: &str =
    "Page not found. Perhaps you passed the wrong extract id?";

/// Errors returned by the IPUMS extract library.
#[derive(Debug, Error)]
pub enum IpumsError {
    /// The server rejected a submitted definition (HTTP 400).
    ///
    /// The message is the server's own text, unmodified.
    #[error("{message}")]
    BadApiRequest {
        /// Server-supplied validation message.
        message: String,
    },

    /// The extract id / collection pair does not resolve on the server.
    #[error("{message}")]
    NotFound {
        /// Fixed or constructed description of what was missing.
        message: String,
    },

    /// An id-dependent operation was called before submission.
    #[error("{}", NOT_SUBMITTED_MESSAGE)]
    ExtractNotSubmitted,

    /// Any other non-2xx response, malformed response, or failed extract.
    #[error("{message}")]
    Api {
        /// HTTP status, when the failure came from a response.
        status: Option<u16>,
        /// Server message or generic description.
        message: String,
    },

    /// The wait loop gave up before the extract reached a terminal state.
    #[error(
        "timed out after {elapsed:?} ({polls} status checks) waiting for extract {extract_id} in collection {collection}"
    )]
    WaitTimeout {
        /// Collection of the extract being waited on.
        collection: String,
        /// Extract number being waited on.
        extract_id: u64,
        /// Time spent waiting.
        elapsed: Duration,
        /// Number of status checks performed.
        polls: u32,
    },

    /// The extract exists but its files cannot be downloaded.
    #[error("extract {extract_id} in collection {collection} is not ready for download: {reason}")]
    ExtractNotReady {
        /// Collection of the extract.
        collection: String,
        /// Extract number.
        extract_id: u64,
        /// Why the files are unavailable.
        reason: String,
    },

    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout requesting {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// File system error while reading or writing.
    #[error("IO error at {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// An extract definition document could not be interpreted.
    #[error("invalid extract definition: {message}")]
    Definition {
        /// What was wrong with the document.
        message: String,
    },

    /// A DDI codebook could not be parsed or lacks required sections.
    #[error("invalid DDI codebook: {message}")]
    Codebook {
        /// What was wrong with the codebook.
        message: String,
    },

    /// The client configuration is unusable.
    #[error("invalid client configuration: {message}")]
    Config {
        /// What was wrong with the configuration.
        message: String,
    },
}

impl IpumsError {
    /// Creates a bad-request error carrying the server message verbatim.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadApiRequest {
            message: message.into(),
        }
    }

    /// Creates a not-found error with the given message.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates the not-found error raised when downloading an unknown extract.
    #[must_use]
    pub fn extract_not_found(collection: &str, extract_id: u64) -> Self {
        Self::not_found(format!(
            "There is no IPUMS extract with extract number {extract_id} in collection {collection}. \
             Be sure to submit your extract before trying to download it!"
        ))
    }

    /// Creates a generic API error.
    pub fn api(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Maps a reqwest error to `Timeout` or `Network`.
    pub fn transport(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::timeout(url)
        } else {
            Self::network(url, source)
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an extract-definition error.
    pub fn definition(message: impl Into<String>) -> Self {
        Self::Definition {
            message: message.into(),
        }
    }

    /// Creates a codebook error.
    pub fn codebook(message: impl Into<String>) -> Self {
        Self::Codebook {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a not-ready error.
    pub fn not_ready(collection: &str, extract_id: u64, reason: impl Into<String>) -> Self {
        Self::ExtractNotReady {
            collection: collection.to_string(),
            extract_id,
            reason: reason.into(),
        }
    }
}

// No From<reqwest::Error> / From<std::io::Error>: every variant needs the url
// or path that the source error lacks.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_submitted_message_is_fixed() {
        let error = IpumsError::ExtractNotSubmitted;
        assert_eq!(
            error.to_string(),
            "Extract has not been submitted and so has no json response"
        );
    }

    #[test]
    fn test_bad_request_displays_server_message_verbatim() {
        let error = IpumsError::bad_request("Invalid variable name: AG");
        assert_eq!(error.to_string(), "Invalid variable name: AG");
    }

    #[test]
    fn test_extract_not_found_names_collection_and_number() {
        let error = IpumsError::extract_not_found("usa", 0);
        assert_eq!(
            error.to_string(),
            "There is no IPUMS extract with extract number 0 in collection usa. \
             Be sure to submit your extract before trying to download it!"
        );
    }

    #[test]
    fn test_wait_timeout_is_distinct_from_api_error() {
        let error = IpumsError::WaitTimeout {
            collection: "cps".to_string(),
            extract_id: 12,
            elapsed: Duration::from_secs(5),
            polls: 3,
        };
        let msg = error.to_string();
        assert!(msg.contains("timed out"), "Expected timeout wording in: {msg}");
        assert!(msg.contains("extract 12"), "Expected extract id in: {msg}");
        assert!(!matches!(error, IpumsError::Api { .. }));
    }

    #[test]
    fn test_io_error_display_includes_path() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let error = IpumsError::io(PathBuf::from("/tmp/usa_00001.xml"), io_error);
        let msg = error.to_string();
        assert!(msg.contains("/tmp/usa_00001.xml"), "Expected path in: {msg}");
    }

    #[test]
    fn test_not_ready_display() {
        let error = IpumsError::not_ready("usa", 7, "files have been purged");
        let msg = error.to_string();
        assert!(msg.contains("extract 7"));
        assert!(msg.contains("purged"));
    }
}
