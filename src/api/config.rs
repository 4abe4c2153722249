//! Client configuration.

use std::fmt;
use std::time::Duration;

use super::constants::{CONNECT_TIMEOUT_SECS, DEFAULT_API_VERSION, DEFAULT_BASE_URL, READ_TIMEOUT_SECS};
use super::wait::WaitPolicy;

/// Settings for [`IpumsApiClient`](super::IpumsApiClient).
///
/// ```
/// use std::time::Duration;
/// use ipums_extract::api::ClientConfig;
///
/// let config = ClientConfig::new("my-key")
///     .with_base_url("http://localhost:8080/extracts")
///     .with_timeouts(Duration::from_secs(5), Duration::from_secs(60));
/// assert_eq!(config.api_version(), "beta");
/// assert!(!format!("{config:?}").contains("my-key"));
/// ```
#[derive(Clone)]
pub struct ClientConfig {
    api_key: String,
    base_url: String,
    api_version: String,
    connect_timeout: Duration,
    read_timeout: Duration,
    wait_policy: WaitPolicy,
}

impl ClientConfig {
    /// Creates a configuration with default endpoint, version and timeouts.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(READ_TIMEOUT_SECS),
            wait_policy: WaitPolicy::default(),
        }
    }

    /// Overrides the API endpoint.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the `version` query parameter.
    #[must_use]
    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// Overrides the connect and read timeouts.
    #[must_use]
    pub fn with_timeouts(mut self, connect_timeout: Duration, read_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self.read_timeout = read_timeout;
        self
    }

    /// Overrides the policy used by `wait_for_extract`.
    #[must_use]
    pub fn with_wait_policy(mut self, wait_policy: WaitPolicy) -> Self {
        self.wait_policy = wait_policy;
        self
    }

    /// API key sent in the `Authorization` header.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// API endpoint.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Value of the `version` query parameter.
    #[must_use]
    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// HTTP connect timeout.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// HTTP read timeout.
    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// Default wait policy.
    #[must_use]
    pub fn wait_policy(&self) -> &WaitPolicy {
        &self.wait_policy
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("api_version", &self.api_version)
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("wait_policy", &self.wait_policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::new("key");
        assert_eq!(config.base_url(), "https://api.ipums.org/extracts");
        assert_eq!(config.api_version(), "beta");
        assert_eq!(config.connect_timeout(), Duration::from_secs(30));
        assert_eq!(config.read_timeout(), Duration::from_secs(300));
        assert_eq!(config.wait_policy(), &WaitPolicy::default());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = ClientConfig::new("super-secret-key");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret-key"));
        assert!(rendered.contains("<redacted>"));
    }
}
