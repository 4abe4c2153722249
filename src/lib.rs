//! IPUMS Extract Library
//!
//! This library defines IPUMS microdata extract requests, submits them to the
//! IPUMS extract API, tracks them through their server-side lifecycle, and
//! downloads the resulting files.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`extract`] - The extract data model and its JSON/YAML serialization
//! - [`ddi`] - DDI codebook parsing and extract reconstruction
//! - [`api`] - HTTP client for submit, status, wait, history and download
//! - [`error`] - The error taxonomy shared by all of the above

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod ddi;
pub mod error;
pub mod extract;
mod user_agent;

// Re-export commonly used types
pub use api::{
    ClientConfig, DownloadOptions, ExtractLocator, ExtractRef, IpumsApiClient, WaitPolicy,
};
pub use ddi::{Codebook, define_extract_from_ddi, read_ipums_ddi};
pub use error::IpumsError;
pub use extract::dict::{
    define_extract_from_file, define_extract_from_json, define_extract_from_yaml,
    extract_from_dict, extract_to_dict, save_extract_as_json, save_extracts_as_json,
};
pub use extract::{
    Extract, ExtractDefinition, ExtractStatus, StatusLookup, Variable, VariableOptions,
};
