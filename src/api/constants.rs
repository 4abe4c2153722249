//! Defaults for the extract API client (endpoint, timeouts, polling).

use std::time::Duration;

/// Default extract API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.ipums.org/extracts";

/// Default value of the `version` query parameter.
pub const DEFAULT_API_VERSION: &str = "beta";

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes for large data files).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// First delay of the wait loop.
pub const INITIAL_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Upper bound on the delay between two status checks (5 minutes).
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(300);

/// Total time the wait loop spends before giving up (3 hours).
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(3 * 60 * 60);

/// Default number of extracts returned by a history request.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;
