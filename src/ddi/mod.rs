//! DDI codebooks and reconstruction of extracts from them.
//!
//! A [`Codebook`] describes an already-produced extract: its collection, the
//! samples it covers and its variables in file order. [`define_extract_from_ddi`]
//! turns it back into an [`Extract`] that requests the same data.
//!
//! # Example
//!
//! ```no_run
//! use ipums_extract::ddi::{define_extract_from_ddi, read_ipums_ddi};
//!
//! # fn example() -> Result<(), ipums_extract::IpumsError> {
//! let codebook = read_ipums_ddi("usa_00136.xml")?;
//! let extract = define_extract_from_ddi(&codebook)?;
//! println!("{} variables", extract.variables().len());
//! # Ok(())
//! # }
//! ```

mod reader;

use serde_json::{Map, Value, json};
use tracing::debug;

use crate::error::IpumsError;
use crate::extract::{DEFAULT_DATA_FORMAT, Extract, ExtractDefinition};

pub use reader::read_ipums_ddi;

/// Physical layout of the data file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStructure {
    /// One record type per file.
    Rectangular,
    /// Household and person records interleaved.
    Hierarchical,
}

/// One variable as described by a codebook.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VariableDescription {
    /// Variable mnemonic.
    pub name: String,
    /// Human-readable label.
    pub label: Option<String>,
    /// 1-based start column in fixed-width files.
    pub start: Option<u32>,
    /// Column width in fixed-width files.
    pub width: Option<u32>,
}

/// Parsed metadata of a completed extract.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Codebook {
    /// Collection identifier, e.g. `usa`.
    pub collection: String,
    /// Sample ids in codebook order.
    pub samples: Vec<String>,
    /// Variables in codebook order.
    pub variables: Vec<VariableDescription>,
    /// Normalized data format (`fixed_width`, `csv`, ...), when stated.
    pub data_format: Option<String>,
    /// File layout, when stated.
    pub file_structure: Option<FileStructure>,
    /// Data file name, when stated.
    pub file_name: Option<String>,
}

impl Codebook {
    /// Parses a DDI XML document.
    ///
    /// # Errors
    ///
    /// Returns [`IpumsError::Codebook`] if the XML is malformed.
    pub fn from_xml(xml: &str) -> Result<Self, IpumsError> {
        reader::parse_codebook(xml)
    }

    /// Variable names in codebook order.
    #[must_use]
    pub fn variable_names(&self) -> Vec<&str> {
        self.variables.iter().map(|v| v.name.as_str()).collect()
    }
}

/// Builds an extract that requests the same samples and variables as the
/// codebook. Every variable is marked preselected.
///
/// # Errors
///
/// Returns [`IpumsError::Codebook`] if the codebook has no collection, no
/// samples or no variables.
pub fn define_extract_from_ddi(codebook: &Codebook) -> Result<Extract, IpumsError> {
    if codebook.collection.is_empty() {
        return Err(IpumsError::codebook("codebook does not name a collection"));
    }
    if codebook.samples.is_empty() {
        return Err(IpumsError::codebook("codebook does not list any samples"));
    }
    if codebook.variables.is_empty() {
        return Err(IpumsError::codebook("codebook does not describe any variables"));
    }

    let data_format = codebook
        .data_format
        .clone()
        .unwrap_or_else(|| DEFAULT_DATA_FORMAT.to_string());

    let extract = match ExtractDefinition::for_collection(&codebook.collection) {
        ExtractDefinition::Other(_) => opaque_extract(codebook, data_format),
        structured => {
            let mut extract = Extract::new(structured).with_data_format(data_format);
            extract.add_samples(codebook.samples.iter().cloned());
            extract.add_preselected_variables(codebook.variables.iter().map(|v| v.name.clone()));
            if codebook.file_structure == Some(FileStructure::Hierarchical) {
                extract = extract.with_data_structure(json!({ "hierarchical": {} }));
            }
            extract
        }
    };

    debug!(
        collection = %codebook.collection,
        samples = codebook.samples.len(),
        variables = codebook.variables.len(),
        "defined extract from codebook"
    );
    Ok(extract)
}

fn opaque_extract(codebook: &Codebook, data_format: String) -> Extract {
    let samples: Map<String, Value> = codebook
        .samples
        .iter()
        .map(|sample| (sample.clone(), json!({})))
        .collect();
    let variables: Map<String, Value> = codebook
        .variables
        .iter()
        .map(|v| (v.name.clone(), json!({ "preselected": true })))
        .collect();

    let mut details = Map::new();
    details.insert(
        "collection".to_string(),
        Value::String(codebook.collection.clone()),
    );
    details.insert("data_format".to_string(), Value::String(data_format));
    details.insert("samples".to_string(), Value::Object(samples));
    details.insert("variables".to_string(), Value::Object(variables));
    Extract::other(codebook.collection.as_str(), details)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn codebook(collection: &str, variables: &[&str]) -> Codebook {
        Codebook {
            collection: collection.to_string(),
            samples: vec!["us2012b".to_string()],
            variables: variables
                .iter()
                .map(|name| VariableDescription {
                    name: (*name).to_string(),
                    ..VariableDescription::default()
                })
                .collect(),
            ..Codebook::default()
        }
    }

    #[test]
    fn test_variables_keep_codebook_order_and_are_preselected() {
        let names = [
            "YEAR", "SAMPLE", "SERIAL", "CBSERIAL", "HHWT", "GQ", "PERNUM", "PERWT", "SEX", "AGE",
        ];
        let extract = define_extract_from_ddi(&codebook("usa", &names)).unwrap();
        assert_eq!(extract.collection(), "usa");
        assert_eq!(extract.samples(), ["us2012b"]);
        assert_eq!(extract.variable_names(), names);
        assert!(extract.variables().iter().all(|v| v.is_preselected()));
        assert_eq!(extract.data_format(), Some("fixed_width"));
        assert!(!extract.is_submitted());
    }

    #[test]
    fn test_user_variables_follow_codebook_variables() {
        let mut extract = define_extract_from_ddi(&codebook("usa", &["YEAR", "SEX"])).unwrap();
        extract.add_variables(["RACE"]);
        assert_eq!(extract.variable_names(), ["YEAR", "SEX", "RACE"]);
    }

    #[test]
    fn test_hierarchical_codebook_sets_structure() {
        let mut cb = codebook("cps", &["AGE"]);
        cb.file_structure = Some(FileStructure::Hierarchical);
        let extract = define_extract_from_ddi(&cb).unwrap();
        assert_eq!(extract.data_structure(), Some(&json!({"hierarchical": {}})));
    }

    #[test]
    fn test_codebook_data_format_is_used() {
        let mut cb = codebook("usa", &["AGE"]);
        cb.data_format = Some("csv".to_string());
        let extract = define_extract_from_ddi(&cb).unwrap();
        assert_eq!(extract.data_format(), Some("csv"));
    }

    #[test]
    fn test_unknown_collection_yields_opaque_extract() {
        let extract = define_extract_from_ddi(&codebook("atus", &["AGE"])).unwrap();
        assert_eq!(extract.collection(), "atus");
        let body = extract.build();
        assert_eq!(body["variables"]["AGE"], json!({"preselected": true}));
        assert_eq!(body["samples"], json!({"us2012b": {}}));
    }

    #[test]
    fn test_missing_sections_are_codebook_errors() {
        let mut cb = codebook("usa", &["AGE"]);
        cb.samples.clear();
        assert!(matches!(
            define_extract_from_ddi(&cb),
            Err(IpumsError::Codebook { .. })
        ));

        let cb = codebook("usa", &[]);
        assert!(matches!(
            define_extract_from_ddi(&cb),
            Err(IpumsError::Codebook { .. })
        ));

        let cb = codebook("", &["AGE"]);
        assert!(matches!(
            define_extract_from_ddi(&cb),
            Err(IpumsError::Codebook { .. })
        ));
    }
}
