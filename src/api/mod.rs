//! Client for the IPUMS extract API.
//!
//! # Features
//!
//! - Submit, status, wait, history, purge check, resubmit and download calls
//! - API key sent in a sensitive `Authorization` header
//! - Configurable timeouts (30s connect, 5min read by default)
//! - Wait loop with exponential backoff and a time/poll budget
//! - Streaming downloads to `.part` files, renamed when complete
//!
//! # Example
//!
//! ```no_run
//! use ipums_extract::api::{ExtractRef, IpumsApiClient};
//!
//! # async fn example() -> Result<(), ipums_extract::IpumsError> {
//! let client = IpumsApiClient::from_api_key("my-api-key")?;
//! let status = client.extract_status(&ExtractRef::new("usa", 136)).await?;
//! println!("usa 136: {status}");
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
pub mod constants;
mod files;
mod wait;

pub use client::{ExtractLocator, ExtractRef, IpumsApiClient};
pub use config::ClientConfig;
pub use files::{DownloadOptions, ExtractFile};
pub use wait::{WaitDecision, WaitPolicy};
