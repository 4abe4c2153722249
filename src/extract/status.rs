//! Extract lifecycle status.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Server-side status of an extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractStatus {
    /// Not yet sent to the server. The only legal status without an id.
    #[default]
    NotSubmitted,
    /// Accepted and waiting to be processed.
    Queued,
    /// Being produced.
    Started,
    /// Files are ready for download.
    Completed,
    /// Production failed.
    Failed,
    /// Canceled before completion.
    Canceled,
    /// Completed, but the files have expired from the server.
    Purged,
}

impl ExtractStatus {
    /// Returns the wire string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotSubmitted => "not_submitted",
            Self::Queued => "queued",
            Self::Started => "started",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
            Self::Purged => "purged",
        }
    }

    /// Whether the server will not move the extract out of this status on its own
    /// (apart from an eventual purge).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Canceled | Self::Purged
        )
    }
}

impl fmt::Display for ExtractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ExtractStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_submitted" => Ok(Self::NotSubmitted),
            "queued" => Ok(Self::Queued),
            "started" => Ok(Self::Started),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            // the service has used both spellings
            "canceled" | "cancelled" => Ok(Self::Canceled),
            "purged" => Ok(Self::Purged),
            _ => Err(format!("invalid extract status: {s}")),
        }
    }
}

/// Outcome of a status check.
///
/// A missing extract is an ordinary outcome here, not an error, so callers can
/// poll an id without handling 404s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLookup {
    /// The extract exists and has this status.
    Found(ExtractStatus),
    /// The server does not know this extract.
    NotFound,
}

impl StatusLookup {
    /// Returns the status string, or `"not found"`.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Found(status) => status.as_str(),
            Self::NotFound => "not found",
        }
    }

    /// Returns the status if the extract was found.
    #[must_use]
    pub fn status(&self) -> Option<ExtractStatus> {
        match self {
            Self::Found(status) => Some(*status),
            Self::NotFound => None,
        }
    }
}

impl fmt::Display for StatusLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            ExtractStatus::NotSubmitted,
            ExtractStatus::Queued,
            ExtractStatus::Started,
            ExtractStatus::Completed,
            ExtractStatus::Failed,
            ExtractStatus::Canceled,
            ExtractStatus::Purged,
        ] {
            assert_eq!(status.as_str().parse::<ExtractStatus>(), Ok(status));
        }
    }

    #[test]
    fn test_status_accepts_british_cancelled() {
        assert_eq!("cancelled".parse(), Ok(ExtractStatus::Canceled));
    }

    #[test]
    fn test_status_rejects_unknown() {
        let err = "exploded".parse::<ExtractStatus>().unwrap_err();
        assert!(err.contains("exploded"));
    }

    #[test]
    fn test_terminal_set() {
        assert!(!ExtractStatus::Queued.is_terminal());
        assert!(!ExtractStatus::Started.is_terminal());
        assert!(ExtractStatus::Completed.is_terminal());
        assert!(ExtractStatus::Failed.is_terminal());
    }

    #[test]
    fn test_status_lookup_not_found_sentinel() {
        assert_eq!(StatusLookup::NotFound.to_string(), "not found");
        assert_eq!(
            StatusLookup::Found(ExtractStatus::Completed).to_string(),
            "completed"
        );
        assert_eq!(StatusLookup::NotFound.status(), None);
    }

    #[test]
    fn test_status_serde_snake_case() {
        let json = serde_json::to_string(&ExtractStatus::NotSubmitted).unwrap();
        assert_eq!(json, "\"not_submitted\"");
    }
}
