//! HTTP client for the IPUMS extract API.
//!
//! [`IpumsApiClient`] owns the whole conversation with the service: submitting
//! definitions, checking status, waiting, listing history, and downloading
//! result files. Extracts are never mutated; operations that learn something
//! new about an extract return a new [`Extract`].

use std::fmt;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::{Map, Value};
use tokio::time::{Instant, sleep};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::config::ClientConfig;
use super::files::{self, DownloadOptions};
use super::wait::{WaitDecision, WaitPolicy};
use crate::error::{IpumsError, PAGE_NOT_FOUND_MESSAGE};
use crate::extract::dict::{extract_from_record, recorded_definition};
use crate::extract::{Extract, ExtractStatus, StatusLookup};
use crate::user_agent;

/// Server-side address of an extract: collection plus extract number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExtractRef {
    /// Collection identifier, e.g. `usa`.
    pub collection: String,
    /// Server-assigned extract number.
    pub extract_id: u64,
}

impl ExtractRef {
    /// Creates a reference to extract `extract_id` in `collection`.
    pub fn new(collection: impl Into<String>, extract_id: u64) -> Self {
        Self {
            collection: collection.into(),
            extract_id,
        }
    }
}

impl fmt::Display for ExtractRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} extract {}", self.collection, self.extract_id)
    }
}

/// Anything that identifies an extract on the server.
pub trait ExtractLocator {
    /// Resolves the server-side address.
    ///
    /// # Errors
    ///
    /// Returns [`IpumsError::ExtractNotSubmitted`] when there is no extract
    /// number yet.
    fn locate(&self) -> Result<ExtractRef, IpumsError>;
}

impl ExtractLocator for ExtractRef {
    fn locate(&self) -> Result<ExtractRef, IpumsError> {
        Ok(self.clone())
    }
}

impl ExtractLocator for Extract {
    fn locate(&self) -> Result<ExtractRef, IpumsError> {
        self.extract_id()
            .map(|id| ExtractRef::new(self.collection(), id))
            .ok_or(IpumsError::ExtractNotSubmitted)
    }
}

/// Client for the extract API.
///
/// Cheap to clone; clones share the connection pool.
///
/// # Example
///
/// ```no_run
/// use ipums_extract::Extract;
/// use ipums_extract::api::{ClientConfig, DownloadOptions, IpumsApiClient};
///
/// # async fn example() -> Result<(), ipums_extract::IpumsError> {
/// let client = IpumsApiClient::new(&ClientConfig::new("my-api-key"))?;
/// let extract = client
///     .submit_extract(&Extract::usa(["us2012b"], ["AGE", "SEX"]))
///     .await?;
/// let extract = client.wait_for_extract(&extract).await?;
/// let files = client
///     .download_extract(&extract, "downloads", &DownloadOptions::default())
///     .await?;
/// println!("{} files", files.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct IpumsApiClient {
    client: Client,
    authorization: HeaderValue,
    base_url: Url,
    api_version: String,
    wait_policy: WaitPolicy,
}

impl IpumsApiClient {
    /// Builds a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`IpumsError::Config`] if the base URL is not an http(s) URL,
    /// the API key is empty or not a valid header value, or the HTTP client
    /// cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, IpumsError> {
        let base_url = parse_base_url(config.base_url())?;
        let authorization = authorization_header(config.api_key())?;
        let client = build_client(config)?;
        debug!(base_url = %base_url, api_version = config.api_version(), "built API client");
        Ok(Self {
            client,
            authorization,
            base_url,
            api_version: config.api_version().to_string(),
            wait_policy: config.wait_policy().clone(),
        })
    }

    /// Builds a client with default settings for `api_key`.
    ///
    /// # Errors
    ///
    /// See [`IpumsApiClient::new`].
    pub fn from_api_key(api_key: impl Into<String>) -> Result<Self, IpumsError> {
        Self::new(&ClientConfig::new(api_key))
    }

    /// Policy used by [`IpumsApiClient::wait_for_extract`].
    #[must_use]
    pub fn wait_policy(&self) -> &WaitPolicy {
        &self.wait_policy
    }

    /// Submits an extract definition and returns the submitted extract.
    ///
    /// The input is left untouched; resubmitting the same value creates a
    /// second extract on the server.
    ///
    /// # Errors
    ///
    /// - [`IpumsError::BadApiRequest`] with the server's message on HTTP 400
    /// - [`IpumsError::Api`] on other failures or a response without a number
    /// - [`IpumsError::Network`] / [`IpumsError::Timeout`] on transport failures
    #[instrument(skip_all, fields(collection = extract.collection()))]
    pub async fn submit_extract(&self, extract: &Extract) -> Result<Extract, IpumsError> {
        let url = self.endpoint(extract.collection(), None, &[]);
        let payload = Value::Object(extract.build());
        let response = self.send(self.client.post(url.clone()).json(&payload), &url).await?;
        let record = read_record(response, &url).await?;

        let extract_id = record
            .get("number")
            .and_then(Value::as_u64)
            .ok_or_else(|| {
                IpumsError::api(None, format!("submit response from {url} has no extract number"))
            })?;
        let status = match record.get("status") {
            Some(_) => record_status(&record, &url)?,
            None => ExtractStatus::Queued,
        };

        info!(extract_id, status = %status, "submitted extract");
        Ok(extract
            .clone()
            .into_submitted(extract_id, status, recorded_definition(&record)))
    }

    /// Looks up the current status of an extract.
    ///
    /// A 404 is reported as [`StatusLookup::NotFound`], not as an error.
    ///
    /// # Errors
    ///
    /// Returns [`IpumsError::ExtractNotSubmitted`] for an unsubmitted
    /// extract, and transport or [`IpumsError::Api`] errors otherwise.
    #[instrument(skip_all)]
    pub async fn extract_status<L>(&self, locator: &L) -> Result<StatusLookup, IpumsError>
    where
        L: ExtractLocator + ?Sized,
    {
        let target = locator.locate()?;
        let url = self.endpoint(&target.collection, Some(target.extract_id), &[]);
        let response = self.send(self.client.get(url.clone()), &url).await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(%target, "extract not found");
            return Ok(StatusLookup::NotFound);
        }

        let record = read_record(response, &url).await?;
        let status = record_status(&record, &url)?;
        debug!(%target, status = %status, "checked extract status");
        Ok(StatusLookup::Found(status))
    }

    /// Fetches the server's record of an extract and rebuilds it.
    ///
    /// # Errors
    ///
    /// Returns [`IpumsError::NotFound`] on 404, [`IpumsError::Definition`] if
    /// the recorded definition cannot be interpreted, plus the usual API and
    /// transport errors.
    #[instrument(skip_all)]
    pub async fn get_extract<L>(&self, locator: &L) -> Result<Extract, IpumsError>
    where
        L: ExtractLocator + ?Sized,
    {
        let target = locator.locate()?;
        let (record, url) = self.get_record(&target).await?;
        let extract = extract_from_record(&record, Some(&target.collection))?;
        if extract.is_submitted() {
            return Ok(extract);
        }
        let status = record_status(&record, &url).unwrap_or(ExtractStatus::Queued);
        debug!(%target, status = %status, "record has no number; using requested id");
        Ok(extract.into_submitted(target.extract_id, status, recorded_definition(&record)))
    }

    /// Returns `extract` with its status replaced by the server's current one.
    ///
    /// # Errors
    ///
    /// Returns [`IpumsError::NotFound`] if the server no longer knows the
    /// extract, plus the errors of [`IpumsApiClient::extract_status`].
    pub async fn refresh_extract(&self, extract: &Extract) -> Result<Extract, IpumsError> {
        match self.extract_status(extract).await? {
            StatusLookup::Found(status) => Ok(extract.with_status(status)),
            StatusLookup::NotFound => Err(IpumsError::not_found(PAGE_NOT_FOUND_MESSAGE)),
        }
    }

    /// Waits for an extract to complete using the client's default policy.
    ///
    /// # Errors
    ///
    /// See [`IpumsApiClient::wait_for_extract_with`].
    pub async fn wait_for_extract(&self, extract: &Extract) -> Result<Extract, IpumsError> {
        self.wait_for_extract_with(extract, &self.wait_policy).await
    }

    /// Sleeps and polls until the extract reaches a terminal status.
    ///
    /// Dropping the returned future stops waiting.
    ///
    /// # Errors
    ///
    /// - [`IpumsError::ExtractNotSubmitted`] before any request for an unsubmitted extract
    /// - [`IpumsError::Api`] if the extract failed, was canceled, or was purged
    /// - [`IpumsError::NotFound`] if the extract disappears from the server
    /// - [`IpumsError::WaitTimeout`] when the policy's time or poll budget runs out
    /// - transport errors as soon as they occur
    #[instrument(skip_all, fields(timeout = ?policy.timeout()))]
    pub async fn wait_for_extract_with(
        &self,
        extract: &Extract,
        policy: &WaitPolicy,
    ) -> Result<Extract, IpumsError> {
        let target = extract.locate()?;
        let started = Instant::now();
        let mut polls: u32 = 0;

        loop {
            let delay = match policy.next(polls, started.elapsed()) {
                WaitDecision::Poll { delay, .. } => delay,
                WaitDecision::GiveUp { reason } => {
                    warn!(%target, polls, %reason, "stopped waiting for extract");
                    return Err(IpumsError::WaitTimeout {
                        collection: target.collection,
                        extract_id: target.extract_id,
                        elapsed: started.elapsed(),
                        polls,
                    });
                }
            };
            sleep(delay).await;
            polls += 1;

            let status = match self.extract_status(&target).await? {
                StatusLookup::Found(status) => status,
                StatusLookup::NotFound => {
                    return Err(IpumsError::not_found(PAGE_NOT_FOUND_MESSAGE));
                }
            };
            debug!(%target, polls, status = %status, "polled extract");

            match status {
                ExtractStatus::Completed => {
                    info!(%target, polls, elapsed = ?started.elapsed(), "extract completed");
                    return Ok(extract.with_status(status));
                }
                ExtractStatus::Failed | ExtractStatus::Canceled | ExtractStatus::Purged => {
                    return Err(IpumsError::api(
                        None,
                        format!(
                            "extract {} in collection {} ended with status {status}",
                            target.extract_id, target.collection
                        ),
                    ));
                }
                ExtractStatus::NotSubmitted | ExtractStatus::Queued | ExtractStatus::Started => {}
            }
        }
    }

    /// Lists the most recent extracts of a collection, newest first.
    ///
    /// Returns a single `collection → extracts` entry holding at most
    /// `limit` submitted extracts.
    ///
    /// # Errors
    ///
    /// Returns [`IpumsError::Api`] if the response is not a list of extract
    /// records, plus transport errors. Individual entries that cannot be read
    /// are skipped with a warning.
    #[instrument(skip(self))]
    pub async fn retrieve_previous_extracts(
        &self,
        collection: &str,
        limit: usize,
    ) -> Result<IndexMap<String, Vec<Extract>>, IpumsError> {
        let url = self.endpoint(collection, None, &[("limit", limit.to_string())]);
        let response = self.send(self.client.get(url.clone()), &url).await?;
        let records = match read_json(response, &url).await? {
            Value::Array(records) => records,
            Value::Object(mut page) => match page.remove("data") {
                Some(Value::Array(records)) => records,
                _ => {
                    return Err(IpumsError::api(
                        None,
                        format!("history response from {url} has no `data` list"),
                    ));
                }
            },
            other => {
                return Err(IpumsError::api(
                    None,
                    format!("expected a list of extracts from {url}, got {other}"),
                ));
            }
        };

        let mut extracts: Vec<Extract> = records
            .iter()
            .filter_map(|record| {
                let Some(record) = record.as_object() else {
                    warn!(%record, "skipping history entry that is not an object");
                    return None;
                };
                match extract_from_record(record, Some(collection)) {
                    Ok(extract) => Some(extract),
                    Err(error) => {
                        warn!(
                            number = ?record.get("number"),
                            %error,
                            "skipping unreadable history entry"
                        );
                        None
                    }
                }
            })
            .filter(Extract::is_submitted)
            .collect();
        extracts.sort_by(|a, b| b.extract_id().cmp(&a.extract_id()));
        extracts.truncate(limit);
        debug!(count = extracts.len(), "retrieved previous extracts");

        let mut history = IndexMap::new();
        history.insert(collection.to_string(), extracts);
        Ok(history)
    }

    /// Whether the extract's files have expired from the server.
    ///
    /// True when the status is `purged`, or the extract is `completed` but
    /// its download links no longer include the data file.
    ///
    /// # Errors
    ///
    /// Returns [`IpumsError::NotFound`] on 404, plus the usual API and
    /// transport errors.
    #[instrument(skip_all)]
    pub async fn extract_was_purged<L>(&self, locator: &L) -> Result<bool, IpumsError>
    where
        L: ExtractLocator + ?Sized,
    {
        let target = locator.locate()?;
        let (record, url) = self.get_record(&target).await?;
        let purged = match record_status(&record, &url)? {
            ExtractStatus::Purged => true,
            ExtractStatus::Completed => {
                files::link_url(download_links(&record), "data").is_none()
            }
            _ => false,
        };
        debug!(%target, purged, "checked purge state");
        Ok(purged)
    }

    /// Submits a fresh copy of an extract's server-recorded definition.
    ///
    /// # Errors
    ///
    /// Returns [`IpumsError::NotFound`] with
    /// `"Page not found. Perhaps you passed the wrong extract id?"` on 404,
    /// plus the errors of [`IpumsApiClient::submit_extract`].
    #[instrument(skip_all)]
    pub async fn resubmit_purged_extract<L>(&self, locator: &L) -> Result<Extract, IpumsError>
    where
        L: ExtractLocator + ?Sized,
    {
        let target = locator.locate()?;
        let definition = self.get_extract(&target).await?.unsubmitted();
        info!(%target, "resubmitting extract");
        self.submit_extract(&definition).await
    }

    /// Downloads the data file, codebook and requested command files into
    /// `download_dir`, returning the written paths in download order.
    ///
    /// Files are named `{collection}_{id:05}.{ext}`. Each is streamed to a
    /// `.part` file and renamed once complete.
    ///
    /// # Errors
    ///
    /// - [`IpumsError::NotFound`] naming the collection and number on 404
    /// - [`IpumsError::ExtractNotReady`] if the data link or a requested
    ///   command file link is missing
    /// - [`IpumsError::Io`] on filesystem failures
    #[instrument(skip_all, fields(dir = %download_dir.as_ref().display()))]
    pub async fn download_extract<L>(
        &self,
        locator: &L,
        download_dir: impl AsRef<Path>,
        options: &DownloadOptions,
    ) -> Result<Vec<PathBuf>, IpumsError>
    where
        L: ExtractLocator + ?Sized,
    {
        let target = locator.locate()?;
        let download_dir = download_dir.as_ref();
        let (record, _) = match self.get_record(&target).await {
            Err(IpumsError::NotFound { .. }) => {
                return Err(IpumsError::extract_not_found(
                    &target.collection,
                    target.extract_id,
                ));
            }
            other => other?,
        };

        let links = download_links(&record);
        if files::link_url(links, "data").is_none() {
            return Err(IpumsError::not_ready(
                &target.collection,
                target.extract_id,
                missing_data_reason(&record),
            ));
        }

        let mut planned = Vec::new();
        for file in options.files() {
            let link = files::link_url(links, file.link_key()).ok_or_else(|| {
                IpumsError::not_ready(
                    &target.collection,
                    target.extract_id,
                    format!("download links have no `{}`", file.link_key()),
                )
            })?;
            let name = file.file_name(&target.collection, target.extract_id, link);
            planned.push((link, download_dir.join(name)));
        }

        tokio::fs::create_dir_all(download_dir)
            .await
            .map_err(|e| IpumsError::io(download_dir, e))?;

        let mut written = Vec::with_capacity(planned.len());
        for (link, path) in planned {
            let bytes = self.download_file(link, &path).await?;
            info!(%target, path = %path.display(), bytes, "downloaded file");
            written.push(path);
        }
        Ok(written)
    }

    async fn download_file(&self, link: &str, path: &Path) -> Result<u64, IpumsError> {
        let mut request = self.client.get(link);
        if self.is_api_origin(link) {
            request = request.header(AUTHORIZATION, self.authorization.clone());
        } else {
            debug!(link, "download link is on another host; not sending API key");
        }
        let response = request
            .send()
            .await
            .map_err(|e| IpumsError::transport(link, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(IpumsError::api(
                Some(status.as_u16()),
                format!("HTTP {} downloading {link}", status.as_u16()),
            ));
        }
        files::stream_to_file(response, link, path).await
    }

    async fn get_record(
        &self,
        target: &ExtractRef,
    ) -> Result<(Map<String, Value>, Url), IpumsError> {
        let url = self.endpoint(&target.collection, Some(target.extract_id), &[]);
        let response = self.send(self.client.get(url.clone()), &url).await?;
        let record = read_record(response, &url).await?;
        Ok((record, url))
    }

    /// `{base_url}[/{id}]?collection=..&version=..[&extra..]`
    fn endpoint(&self, collection: &str, extract_id: Option<u64>, extra: &[(&str, String)]) -> Url {
        let mut url = self.base_url.clone();
        if let Some(extract_id) = extract_id
            && let Ok(mut segments) = url.path_segments_mut()
        {
            segments.pop_if_empty().push(&extract_id.to_string());
        }
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("collection", collection)
                .append_pair("version", &self.api_version);
            for (key, value) in extra {
                query.append_pair(key, value);
            }
        }
        url
    }

    /// Whether `link` shares the API's scheme, host and port.
    fn is_api_origin(&self, link: &str) -> bool {
        Url::parse(link).is_ok_and(|link| link.origin() == self.base_url.origin())
    }

    async fn send(&self, request: RequestBuilder, url: &Url) -> Result<Response, IpumsError> {
        request
            .header(AUTHORIZATION, self.authorization.clone())
            .send()
            .await
            .map_err(|e| IpumsError::transport(url.as_str(), e))
    }
}

fn parse_base_url(base_url: &str) -> Result<Url, IpumsError> {
    let url = Url::parse(base_url)
        .map_err(|e| IpumsError::config(format!("invalid base URL {base_url}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(IpumsError::config(format!(
            "base URL must be an http(s) URL, got {base_url}"
        )));
    }
    Ok(url)
}

fn authorization_header(api_key: &str) -> Result<HeaderValue, IpumsError> {
    if api_key.trim().is_empty() {
        return Err(IpumsError::config("API key is empty"));
    }
    let mut authorization = HeaderValue::from_str(api_key).map_err(|_| {
        IpumsError::config("API key contains characters that are not valid in an HTTP header")
    })?;
    authorization.set_sensitive(true);
    Ok(authorization)
}

fn build_client(config: &ClientConfig) -> Result<Client, IpumsError> {
    Client::builder()
        .connect_timeout(config.connect_timeout())
        .timeout(config.read_timeout())
        .gzip(true)
        .user_agent(user_agent::default_user_agent())
        .build()
        .map_err(|e| IpumsError::config(format!("failed to build HTTP client: {e}")))
}

async fn read_json(response: Response, url: &Url) -> Result<Value, IpumsError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| IpumsError::transport(url.as_str(), e))?;
    if !status.is_success() {
        return Err(error_for_status(status, &body, url));
    }
    serde_json::from_str(&body).map_err(|e| {
        IpumsError::api(
            Some(status.as_u16()),
            format!("malformed JSON response from {url}: {e}"),
        )
    })
}

async fn read_record(response: Response, url: &Url) -> Result<Map<String, Value>, IpumsError> {
    match read_json(response, url).await? {
        Value::Object(record) => Ok(record),
        other => Err(IpumsError::api(
            None,
            format!("expected an extract record from {url}, got {other}"),
        )),
    }
}

/// Maps a non-2xx response to the error taxonomy.
fn error_for_status(status: StatusCode, body: &str, url: &Url) -> IpumsError {
    let detail = error_detail(body);
    match status.as_u16() {
        400 => {
            let body = body.trim();
            IpumsError::bad_request(detail.unwrap_or_else(|| {
                if body.is_empty() {
                    "HTTP 400".to_string()
                } else {
                    body.to_string()
                }
            }))
        }
        404 => IpumsError::not_found(PAGE_NOT_FOUND_MESSAGE),
        code => IpumsError::api(
            Some(code),
            detail.unwrap_or_else(|| format!("HTTP {code} from {url}")),
        ),
    }
}

/// `detail` of an error body: a string, or a list joined by newlines.
fn error_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        Value::String(detail) => Some(detail.clone()),
        Value::Array(items) => Some(
            items
                .iter()
                .map(|item| match item {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn record_status(record: &Map<String, Value>, url: &Url) -> Result<ExtractStatus, IpumsError> {
    match record.get("status") {
        Some(Value::String(status)) => status
            .parse()
            .map_err(|e: String| IpumsError::api(None, format!("{e} in response from {url}"))),
        _ => Err(IpumsError::api(
            None,
            format!("response from {url} has no extract status"),
        )),
    }
}

fn download_links(record: &Map<String, Value>) -> Option<&Map<String, Value>> {
    record.get("download_links").and_then(Value::as_object)
}

fn missing_data_reason(record: &Map<String, Value>) -> String {
    let status = record
        .get("status")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<ExtractStatus>().ok());
    match status {
        Some(ExtractStatus::Completed | ExtractStatus::Purged) => {
            "its files have been purged from the server; resubmit it to regenerate them"
                .to_string()
        }
        Some(status) => format!("extract status is {status}"),
        None => "the extract record has no download links".to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn client(base_url: &str) -> IpumsApiClient {
        IpumsApiClient::new(&ClientConfig::new("test-key").with_base_url(base_url)).unwrap()
    }

    #[test]
    fn test_endpoint_appends_id_and_query() {
        let client = client("https://api.ipums.org/extracts");
        let url = client.endpoint("usa", Some(136), &[]);
        assert_eq!(
            url.as_str(),
            "https://api.ipums.org/extracts/136?collection=usa&version=beta"
        );
    }

    #[test]
    fn test_endpoint_handles_trailing_slash_and_extra_params() {
        let client = client("http://localhost:8989/extracts/");
        let url = client.endpoint("cps", None, &[("limit", "10".to_string())]);
        assert_eq!(
            url.as_str(),
            "http://localhost:8989/extracts/?collection=cps&version=beta&limit=10"
        );
        let url = client.endpoint("cps", Some(3), &[]);
        assert_eq!(url.path(), "/extracts/3");
    }

    #[test]
    fn test_new_rejects_bad_configuration() {
        let bad_url = IpumsApiClient::new(&ClientConfig::new("key").with_base_url("not a url"));
        assert!(matches!(bad_url, Err(IpumsError::Config { .. })));

        let bad_scheme =
            IpumsApiClient::new(&ClientConfig::new("key").with_base_url("ftp://example.com/x"));
        assert!(matches!(bad_scheme, Err(IpumsError::Config { .. })));

        let empty_key = IpumsApiClient::new(&ClientConfig::new("  "));
        assert!(matches!(empty_key, Err(IpumsError::Config { .. })));

        let bad_key = IpumsApiClient::new(&ClientConfig::new("line\nbreak"));
        assert!(matches!(bad_key, Err(IpumsError::Config { .. })));
    }

    #[test]
    fn test_api_key_only_sent_to_api_origin() {
        let client = client("https://api.ipums.org/extracts");
        assert!(client.is_api_origin("https://api.ipums.org/downloads/usa_00001.dat.gz"));
        assert!(!client.is_api_origin("https://cdn.example.com/usa_00001.dat.gz"));
        assert!(!client.is_api_origin("http://api.ipums.org/downloads/usa_00001.dat.gz"));
        assert!(!client.is_api_origin("https://api.ipums.org:8443/usa_00001.dat.gz"));
        assert!(!client.is_api_origin("not a url"));
    }

    #[test]
    fn test_debug_hides_api_key() {
        let client = client("https://api.ipums.org/extracts");
        assert!(!format!("{client:?}").contains("test-key"));
    }

    #[test]
    fn test_extract_locator_requires_submission() {
        let extract = Extract::usa(["us2012b"], ["AGE"]);
        assert!(matches!(
            extract.locate(),
            Err(IpumsError::ExtractNotSubmitted)
        ));

        let submitted = extract.into_submitted(10, ExtractStatus::Queued, None);
        assert_eq!(submitted.locate().unwrap(), ExtractRef::new("usa", 10));
    }

    #[test]
    fn test_error_detail_shapes() {
        assert_eq!(
            error_detail(r#"{"detail": "Invalid sample name: us2012x"}"#).as_deref(),
            Some("Invalid sample name: us2012x")
        );
        assert_eq!(
            error_detail(r#"{"detail": ["first", "second"]}"#).as_deref(),
            Some("first\nsecond")
        );
        assert_eq!(error_detail("<html>oops</html>"), None);
        assert_eq!(error_detail(r#"{"error": "x"}"#), None);
    }

    #[test]
    fn test_error_for_status_mapping() {
        let url = Url::parse("https://api.ipums.org/extracts").unwrap();

        let err = error_for_status(StatusCode::BAD_REQUEST, "plain text reason", &url);
        assert!(matches!(err, IpumsError::BadApiRequest { .. }));
        assert_eq!(err.to_string(), "plain text reason");

        let err = error_for_status(StatusCode::NOT_FOUND, "", &url);
        assert_eq!(err.to_string(), PAGE_NOT_FOUND_MESSAGE);

        let err = error_for_status(StatusCode::INTERNAL_SERVER_ERROR, "", &url);
        assert!(matches!(err, IpumsError::Api { status: Some(500), .. }));
        assert!(err.to_string().contains("HTTP 500"));
    }

    #[test]
    fn test_missing_data_reason_mentions_purge_for_completed() {
        let record = json!({"status": "completed", "download_links": {}});
        let reason = missing_data_reason(record.as_object().unwrap());
        assert!(reason.contains("purged"));

        let record = json!({"status": "started"});
        let reason = missing_data_reason(record.as_object().unwrap());
        assert!(reason.contains("started"));
    }
}
