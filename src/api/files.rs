//! Result files of a completed extract and streaming them to disk.

use std::path::Path;

use futures_util::StreamExt;
use serde_json::{Map, Value};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

use crate::error::IpumsError;
use crate::extract::dict::partial_path;

/// Which optional command files to fetch alongside the data and codebook.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadOptions {
    /// Stata `.do` file.
    pub stata: bool,
    /// SPSS `.sps` file.
    pub spss: bool,
    /// SAS `.sas` file.
    pub sas: bool,
    /// R `.R` file.
    pub r: bool,
}

impl DownloadOptions {
    /// Files to fetch, data and codebook first.
    #[must_use]
    pub fn files(&self) -> Vec<ExtractFile> {
        let mut files = vec![ExtractFile::Data, ExtractFile::Codebook];
        for (wanted, file) in [
            (self.stata, ExtractFile::Stata),
            (self.spss, ExtractFile::Spss),
            (self.sas, ExtractFile::Sas),
            (self.r, ExtractFile::R),
        ] {
            if wanted {
                files.push(file);
            }
        }
        files
    }
}

/// One downloadable artifact of an extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractFile {
    /// Compressed data file.
    Data,
    /// DDI codebook.
    Codebook,
    /// Stata command file.
    Stata,
    /// SPSS command file.
    Spss,
    /// SAS command file.
    Sas,
    /// R command file.
    R,
}

impl ExtractFile {
    /// Key of this file in the record's `download_links`.
    #[must_use]
    pub fn link_key(self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::Codebook => "ddi_codebook",
            Self::Stata => "stata_command_file",
            Self::Spss => "spss_command_file",
            Self::Sas => "sas_command_file",
            Self::R => "r_command_file",
        }
    }

    /// Canonical file extension. The data extension follows the link when
    /// the link names a file, since it varies with the data format.
    #[must_use]
    pub fn extension(self, link: &str) -> String {
        match self {
            Self::Data => data_extension(link).unwrap_or_else(|| "dat.gz".to_string()),
            Self::Codebook => "xml".to_string(),
            Self::Stata => "do".to_string(),
            Self::Spss => "sps".to_string(),
            Self::Sas => "sas".to_string(),
            Self::R => "R".to_string(),
        }
    }

    /// `{collection}_{id:05}.{ext}`, e.g. `usa_00136.dat.gz`.
    #[must_use]
    pub fn file_name(self, collection: &str, extract_id: u64, link: &str) -> String {
        format!("{collection}_{extract_id:05}.{}", self.extension(link))
    }
}

/// Extension of the link's last path segment, everything after its first dot.
fn data_extension(link: &str) -> Option<String> {
    let path = link.split(['?', '#']).next().unwrap_or(link);
    let name = path.rsplit('/').next()?;
    let (_, extension) = name.split_once('.')?;
    (!extension.is_empty()).then(|| extension.to_string())
}

/// URL of `key` in a record's `download_links`. Links are either plain
/// strings or objects with a `url` field.
pub(crate) fn link_url<'a>(links: Option<&'a Map<String, Value>>, key: &str) -> Option<&'a str> {
    let url = match links?.get(key)? {
        Value::String(url) => Some(url.as_str()),
        Value::Object(link) => link.get("url").and_then(Value::as_str),
        _ => None,
    };
    url.filter(|url| !url.is_empty())
}

/// Streams a response body to `path` via `<path>.part`, returning bytes written.
///
/// The partial file is removed on any failure.
pub(crate) async fn stream_to_file(
    response: reqwest::Response,
    url: &str,
    path: &Path,
) -> Result<u64, IpumsError> {
    let temp_path = partial_path(path);
    let file = File::create(&temp_path)
        .await
        .map_err(|e| IpumsError::io(temp_path.clone(), e))?;

    let result = match write_body(file, response, url, &temp_path).await {
        Ok(written) => tokio::fs::rename(&temp_path, path)
            .await
            .map(|()| written)
            .map_err(|e| IpumsError::io(path, e)),
        Err(error) => Err(error),
    };

    match result {
        Ok(written) => {
            debug!(path = %path.display(), bytes = written, "file written");
            Ok(written)
        }
        Err(error) => {
            let _ = tokio::fs::remove_file(&temp_path).await;
            debug!(path = %temp_path.display(), %error, "removed partial file");
            Err(error)
        }
    }
}

async fn write_body(
    file: File,
    response: reqwest::Response,
    url: &str,
    temp_path: &Path,
) -> Result<u64, IpumsError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| IpumsError::transport(url, e))?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| IpumsError::io(temp_path, e))?;
        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| IpumsError::io(temp_path, e))?;
    Ok(bytes_written)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_default_options_fetch_data_and_codebook() {
        assert_eq!(
            DownloadOptions::default().files(),
            [ExtractFile::Data, ExtractFile::Codebook]
        );
    }

    #[test]
    fn test_command_files_follow_flags() {
        let options = DownloadOptions {
            stata: true,
            r: true,
            ..DownloadOptions::default()
        };
        assert_eq!(
            options.files(),
            [
                ExtractFile::Data,
                ExtractFile::Codebook,
                ExtractFile::Stata,
                ExtractFile::R
            ]
        );
    }

    #[test]
    fn test_canonical_file_names() {
        let link = "https://api.ipums.org/downloads/usa/api/v1/extracts/136/usa_00136.dat.gz";
        assert_eq!(ExtractFile::Data.file_name("usa", 136, link), "usa_00136.dat.gz");
        assert_eq!(ExtractFile::Codebook.file_name("usa", 136, link), "usa_00136.xml");
        assert_eq!(ExtractFile::Stata.file_name("usa", 136, link), "usa_00136.do");
        assert_eq!(ExtractFile::Spss.file_name("usa", 136, link), "usa_00136.sps");
        assert_eq!(ExtractFile::Sas.file_name("usa", 136, link), "usa_00136.sas");
        assert_eq!(ExtractFile::R.file_name("usa", 136, link), "usa_00136.R");
    }

    #[test]
    fn test_data_extension_follows_link() {
        assert_eq!(
            ExtractFile::Data.file_name("cps", 7, "https://x/cps_00007.csv.gz?token=1"),
            "cps_00007.csv.gz"
        );
        assert_eq!(
            ExtractFile::Data.file_name("cps", 7, "https://x/download"),
            "cps_00007.dat.gz"
        );
    }

    #[test]
    fn test_link_url_accepts_strings_and_objects() {
        let links = json!({
            "data": {"url": "https://x/usa_00001.dat.gz", "bytes": 10},
            "ddi_codebook": "https://x/usa_00001.xml",
            "r_command_file": {"url": ""},
        });
        let links = links.as_object();
        assert_eq!(link_url(links, "data"), Some("https://x/usa_00001.dat.gz"));
        assert_eq!(link_url(links, "ddi_codebook"), Some("https://x/usa_00001.xml"));
        assert_eq!(link_url(links, "r_command_file"), None);
        assert_eq!(link_url(links, "stata_command_file"), None);
        assert_eq!(link_url(None, "data"), None);
    }
}
