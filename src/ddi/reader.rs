//! DDI 2.5 XML reader for IPUMS codebooks.
//!
//! Only the elements needed to rebuild an extract are read:
//!
//! | Codebook field | Element |
//! |---|---|
//! | collection | `stdyDscr/citation/serStmt/serName` (else `fileName` prefix) |
//! | samples | `stdyDscr/method/dataColl/sampProc` (`ID` attribute, else text) |
//! | data format | `fileDscr/fileTxt/format` |
//! | file structure | `fileDscr/fileTxt/fileStrc@type` |
//! | variables | `dataDscr/var@name`, `var/labl`, `var/location@StartPos,width` |

use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use tracing::{debug, instrument};

use super::{Codebook, FileStructure, VariableDescription};
use crate::error::IpumsError;

/// Reads and parses a DDI codebook file.
///
/// # Errors
///
/// Returns [`IpumsError::Io`] if the file cannot be read and
/// [`IpumsError::Codebook`] if it is not well-formed XML.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn read_ipums_ddi(path: impl AsRef<Path>) -> Result<Codebook, IpumsError> {
    let path = path.as_ref();
    let xml = std::fs::read_to_string(path).map_err(|e| IpumsError::io(path, e))?;
    parse_codebook(&xml)
}

pub(super) fn parse_codebook(xml: &str) -> Result<Codebook, IpumsError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut state = CodebookState::default();
    let mut path: Vec<String> = Vec::new();

    loop {
        let event = reader.read_event().map_err(|e| {
            IpumsError::codebook(format!("XML error at byte {}: {e}", reader.buffer_position()))
        })?;
        match event {
            Event::Start(element) => {
                let name = local_name(&element);
                state.open(&path, &name, &element)?;
                path.push(name);
            }
            Event::Empty(element) => {
                let name = local_name(&element);
                state.open(&path, &name, &element)?;
            }
            Event::End(_) => {
                path.pop();
            }
            Event::Text(text) => {
                let text = text
                    .unescape()
                    .map_err(|e| IpumsError::codebook(e.to_string()))?;
                state.text(&path, text.trim());
            }
            Event::CData(data) => {
                let text = String::from_utf8_lossy(&data).into_owned();
                state.text(&path, text.trim());
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let codebook = state.finish();
    debug!(
        collection = %codebook.collection,
        samples = codebook.samples.len(),
        variables = codebook.variables.len(),
        "parsed DDI codebook"
    );
    Ok(codebook)
}

#[derive(Default)]
struct CodebookState {
    series_name: Option<String>,
    file_name: Option<String>,
    format: Option<String>,
    file_structure: Option<FileStructure>,
    samples: Vec<String>,
    variables: Vec<VariableDescription>,
    /// A `sampProc` without an `ID` takes its sample id from its text.
    sample_from_text: bool,
}

impl CodebookState {
    fn open(&mut self, path: &[String], name: &str, element: &BytesStart<'_>) -> Result<(), IpumsError> {
        match name {
            "var" if parent_is(path, "dataDscr") => {
                let Some(var_name) = attribute(element, b"name")? else {
                    return Err(IpumsError::codebook("`var` element without a `name` attribute"));
                };
                self.variables.push(VariableDescription {
                    name: var_name,
                    ..VariableDescription::default()
                });
            }
            "location" if parent_is(path, "var") => {
                if let Some(variable) = self.variables.last_mut() {
                    variable.start = attribute(element, b"StartPos")?.and_then(|v| v.parse().ok());
                    variable.width = attribute(element, b"width")?.and_then(|v| v.parse().ok());
                }
            }
            "sampProc" if within(path, "stdyDscr") => match attribute(element, b"ID")? {
                Some(id) => {
                    self.samples.push(id);
                    self.sample_from_text = false;
                }
                None => self.sample_from_text = true,
            },
            "fileStrc" if parent_is(path, "fileTxt") => {
                self.file_structure = match attribute(element, b"type")?.as_deref() {
                    Some("rectangular") => Some(FileStructure::Rectangular),
                    Some("hierarchical") => Some(FileStructure::Hierarchical),
                    _ => None,
                };
            }
            _ => {}
        }
        Ok(())
    }

    fn text(&mut self, path: &[String], text: &str) {
        if text.is_empty() {
            return;
        }
        let Some(current) = path.last().map(String::as_str) else {
            return;
        };
        let parent = path.len().checked_sub(2).map(|i| path[i].as_str());

        match (parent, current) {
            (Some("serStmt"), "serName") => self.series_name = Some(text.to_string()),
            (Some("fileTxt"), "fileName") => self.file_name = Some(text.to_string()),
            (Some("fileTxt"), "format") => self.format = Some(text.to_string()),
            (Some("var"), "labl") => {
                if let Some(variable) = self.variables.last_mut() {
                    variable.label = Some(text.to_string());
                }
            }
            (_, "sampProc") if self.sample_from_text => {
                self.samples.push(text.to_string());
                self.sample_from_text = false;
            }
            _ => {}
        }
    }

    fn finish(self) -> Codebook {
        let collection = self
            .series_name
            .as_deref()
            .and_then(collection_from_series)
            .or_else(|| self.file_name.as_deref().and_then(collection_from_file_name))
            .unwrap_or_default();
        Codebook {
            collection,
            samples: self.samples,
            variables: self.variables,
            data_format: self.format.as_deref().map(normalize_format),
            file_structure: self.file_structure,
            file_name: self.file_name,
        }
    }
}

/// `"IPUMS USA"` → `usa`, `"IPUMS International"` → `ipumsi`.
fn collection_from_series(series: &str) -> Option<String> {
    let product = series.trim().strip_prefix("IPUMS")?.trim().trim_start_matches('-').trim();
    if product.is_empty() {
        return None;
    }
    let collection = match product.to_ascii_lowercase().as_str() {
        "international" => "ipumsi".to_string(),
        "time use" => "atus".to_string(),
        other => other.replace([' ', '-'], "_"),
    };
    Some(collection)
}

/// `usa_00136.dat` → `usa`.
fn collection_from_file_name(file_name: &str) -> Option<String> {
    let (prefix, _) = file_name.split_once('_')?;
    (!prefix.is_empty()).then(|| prefix.to_ascii_lowercase())
}

fn normalize_format(format: &str) -> String {
    let lower = format.to_ascii_lowercase();
    if lower.contains("fixed") {
        "fixed_width".to_string()
    } else if lower.contains("comma") || lower.contains("csv") {
        "csv".to_string()
    } else if lower.contains("stata") {
        "stata".to_string()
    } else if lower.contains("spss") {
        "spss".to_string()
    } else if lower.contains("sas") {
        "sas9".to_string()
    } else {
        lower.replace(' ', "_")
    }
}

fn local_name(element: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(element.local_name().as_ref()).into_owned()
}

fn parent_is(path: &[String], name: &str) -> bool {
    path.last().is_some_and(|parent| parent == name)
}

fn within(path: &[String], name: &str) -> bool {
    path.iter().any(|segment| segment == name)
}

fn attribute(element: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, IpumsError> {
    let Some(attr) = element
        .try_get_attribute(key)
        .map_err(|e| IpumsError::codebook(e.to_string()))?
    else {
        return Ok(None);
    };
    let value = attr
        .unescape_value()
        .map_err(|e| IpumsError::codebook(e.to_string()))?;
    Ok(Some(value.into_owned()))
}
