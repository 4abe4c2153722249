//! Conversion between extracts and plain JSON/YAML mappings.
//!
//! Definition documents come in three shapes, all accepted by
//! [`extract_from_dict`]:
//!
//! - a single definition: `{"collection": "usa", "samples": [...], ...}`
//! - a list: `{"extracts": [definition, ...]}`
//! - a collection map: `{"usa": [definition, ...], "cps": [...]}`
//!
//! `samples` may be a list of codes or a `{code: {}}` mapping, and
//! `variables` a list of names or a `{name: options}` mapping, so the output
//! of [`Extract::build`] reads back unchanged.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use super::{Extract, ExtractDefinition, ExtractStatus, Variable, VariableOptions};
use crate::error::IpumsError;

/// Keys describing a server record rather than the definition itself.
const RECORD_KEYS: &[&str] = &["number", "status", "download_links", "extract_definition"];

/// Keys that mark a mapping as an actual extract definition.
const DEFINITION_KEYS: &[&str] = &["collection", "samples", "variables"];

/// Reads one or more extracts from a definition document.
///
/// Always returns a sequence; a single definition yields one extract. Unknown
/// collections produce opaque extracts whose details are the definition
/// verbatim. Definitions that carry a server `number` come back submitted.
///
/// # Errors
///
/// Returns [`IpumsError::Definition`] if the document matches none of the
/// accepted shapes or a field has the wrong type.
pub fn extract_from_dict(value: &Value) -> Result<Vec<Extract>, IpumsError> {
    let Value::Object(map) = value else {
        return Err(IpumsError::definition(
            "expected a mapping at the top level of the extract definition",
        ));
    };

    if let Some(extracts) = map.get("extracts") {
        let Value::Array(items) = extracts else {
            return Err(IpumsError::definition("`extracts` must be a list"));
        };
        return items
            .iter()
            .map(|item| definition_object(item).and_then(|def| extract_from_record(def, None)))
            .collect();
    }

    if map.contains_key("collection") {
        return Ok(vec![extract_from_record(map, None)?]);
    }

    if map.is_empty() {
        return Err(IpumsError::definition("no extract definitions found"));
    }

    let mut extracts = Vec::new();
    for (collection, items) in map {
        let Value::Array(items) = items else {
            return Err(IpumsError::definition(format!(
                "expected a `collection` field or a list of definitions under `{collection}`"
            )));
        };
        for item in items {
            extracts.push(extract_from_record(
                definition_object(item)?,
                Some(collection.as_str()),
            )?);
        }
    }
    Ok(extracts)
}

/// Returns the server's recorded definition of a submitted extract.
///
/// The result has the same shape as [`Extract::build`].
///
/// # Errors
///
/// Returns [`IpumsError::ExtractNotSubmitted`] if the extract has no id.
pub fn extract_to_dict(extract: &Extract) -> Result<Map<String, Value>, IpumsError> {
    if !extract.is_submitted() {
        return Err(IpumsError::ExtractNotSubmitted);
    }
    Ok(extract.info().cloned().unwrap_or_else(|| extract.build()))
}

/// Writes an extract definition to `path` as pretty-printed JSON.
///
/// Submitted extracts are written as [`extract_to_dict`] returns them,
/// unsubmitted ones as [`Extract::build`] returns them. Parent directories are
/// created and an existing file is replaced.
///
/// # Errors
///
/// Returns [`IpumsError::Io`] if the file cannot be written.
#[instrument(skip_all, fields(collection = extract.collection(), path = %path.as_ref().display()))]
pub fn save_extract_as_json(extract: &Extract, path: impl AsRef<Path>) -> Result<(), IpumsError> {
    let value = Value::Object(saved_definition(extract));
    write_json(path.as_ref(), &value)
}

/// Writes several extracts to `path` as a `{collection: [definition, ...]}` document.
///
/// # Errors
///
/// Returns [`IpumsError::Io`] if the file cannot be written.
#[instrument(skip_all, fields(count = extracts.len(), path = %path.as_ref().display()))]
pub fn save_extracts_as_json(extracts: &[Extract], path: impl AsRef<Path>) -> Result<(), IpumsError> {
    let mut grouped: IndexMap<String, Vec<Value>> = IndexMap::new();
    for extract in extracts {
        grouped
            .entry(extract.collection().to_string())
            .or_default()
            .push(Value::Object(saved_definition(extract)));
    }
    let value = serde_json::to_value(grouped)
        .map_err(|e| IpumsError::definition(format!("cannot serialize extracts: {e}")))?;
    write_json(path.as_ref(), &value)
}

/// Reads extracts from a JSON definition file.
///
/// # Errors
///
/// Returns [`IpumsError::Io`] if the file cannot be read and
/// [`IpumsError::Definition`] if it is not a valid definition document.
pub fn define_extract_from_json(path: impl AsRef<Path>) -> Result<Vec<Extract>, IpumsError> {
    let path = path.as_ref();
    let raw = read_to_string(path)?;
    let value: Value = serde_json::from_str(&raw)
        .map_err(|e| IpumsError::definition(format!("{}: {e}", path.display())))?;
    extract_from_dict(&value)
}

/// Reads extracts from a YAML definition file.
///
/// # Errors
///
/// Returns [`IpumsError::Io`] if the file cannot be read and
/// [`IpumsError::Definition`] if it is not a valid definition document.
pub fn define_extract_from_yaml(path: impl AsRef<Path>) -> Result<Vec<Extract>, IpumsError> {
    let path = path.as_ref();
    let raw = read_to_string(path)?;
    let value = parse_yaml(&raw)
        .map_err(|e| IpumsError::definition(format!("{}: {e}", path.display())))?;
    extract_from_dict(&value)
}

/// Reads extracts from a `.json`, `.yml` or `.yaml` definition file.
///
/// # Errors
///
/// Returns [`IpumsError::Definition`] for any other extension, otherwise the
/// errors of the format-specific reader.
pub fn define_extract_from_file(path: impl AsRef<Path>) -> Result<Vec<Extract>, IpumsError> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("json") => define_extract_from_json(path),
        Some("yml" | "yaml") => define_extract_from_yaml(path),
        _ => Err(IpumsError::definition(format!(
            "{}: unsupported definition file type (expected .json, .yml or .yaml)",
            path.display()
        ))),
    }
}

/// Builds an extract from a definition or a server record.
///
/// A record's definition may be nested under `extract_definition` or flattened
/// alongside `number` / `status` / `download_links`.
pub(crate) fn extract_from_record(
    record: &Map<String, Value>,
    collection_hint: Option<&str>,
) -> Result<Extract, IpumsError> {
    let recorded = recorded_definition(record);
    let mut definition = recorded.clone().unwrap_or_default();
    let collection = match definition.get("collection").or_else(|| record.get("collection")) {
        Some(Value::String(collection)) => collection.clone(),
        Some(other) => {
            return Err(IpumsError::definition(format!(
                "`collection` must be a string, got {other}"
            )));
        }
        None => collection_hint
            .ok_or_else(|| IpumsError::definition("definition is missing `collection`"))?
            .to_string(),
    };
    if !definition.contains_key("collection") {
        definition.insert("collection".to_string(), Value::String(collection.clone()));
    }

    let extract = match ExtractDefinition::for_collection(&collection) {
        ExtractDefinition::Other(_) => Extract::other(collection.as_str(), definition.clone()),
        structured => microdata_from_definition(Extract::new(structured), &definition)?,
    };

    let Some(number) = record.get("number") else {
        return Ok(extract);
    };
    let extract_id = number
        .as_u64()
        .ok_or_else(|| IpumsError::definition(format!("`number` must be an integer, got {number}")))?;
    let status = match record.get("status") {
        Some(Value::String(status)) => status.parse().map_err(IpumsError::definition)?,
        _ => ExtractStatus::Queued,
    };
    if status == ExtractStatus::NotSubmitted {
        return Err(IpumsError::definition(format!(
            "record for extract {extract_id} has status {status}"
        )));
    }
    debug!(collection = %collection, extract_id, status = %status, "reconstructed submitted extract");
    Ok(extract.into_submitted(extract_id, status, recorded.map(|_| definition)))
}

/// The definition a server record carries, or `None` when the record holds
/// only submission state (`number`, `status`, links).
pub(crate) fn recorded_definition(record: &Map<String, Value>) -> Option<Map<String, Value>> {
    let definition = definition_from_record(record);
    DEFINITION_KEYS
        .iter()
        .any(|key| definition.contains_key(*key))
        .then_some(definition)
}

/// Strips record-only keys, or unwraps a nested `extract_definition`.
fn definition_from_record(record: &Map<String, Value>) -> Map<String, Value> {
    if let Some(Value::Object(nested)) = record.get("extract_definition") {
        return nested.clone();
    }
    record
        .iter()
        .filter(|(key, _)| !RECORD_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

fn microdata_from_definition(
    mut extract: Extract,
    definition: &Map<String, Value>,
) -> Result<Extract, IpumsError> {
    if let Some(samples) = definition.get("samples") {
        extract.add_samples(parse_samples(samples)?);
    }
    if let Some(variables) = definition.get("variables") {
        extract.add_variables(parse_variables(variables)?);
    }
    if let Some(description) = definition.get("description") {
        extract = extract.with_description(string_field("description", description)?);
    }
    if let Some(data_format) = definition.get("data_format") {
        extract = extract.with_data_format(string_field("data_format", data_format)?);
    }
    if let Some(data_structure) = definition.get("data_structure") {
        extract = extract.with_data_structure(data_structure.clone());
    }
    Ok(extract)
}

fn parse_samples(value: &Value) -> Result<Vec<String>, IpumsError> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| string_field("samples", item).map(str::to_string))
            .collect(),
        Value::Object(map) => Ok(map.keys().cloned().collect()),
        Value::Null => Ok(Vec::new()),
        other => Err(IpumsError::definition(format!(
            "`samples` must be a list or mapping, got {other}"
        ))),
    }
}

fn parse_variables(value: &Value) -> Result<Vec<Variable>, IpumsError> {
    match value {
        Value::Array(items) => items.iter().map(parse_variable_entry).collect(),
        Value::Object(map) => map
            .iter()
            .map(|(name, options)| {
                Ok(Variable {
                    name: name.clone(),
                    options: parse_options(name, options)?,
                })
            })
            .collect(),
        Value::Null => Ok(Vec::new()),
        other => Err(IpumsError::definition(format!(
            "`variables` must be a list or mapping, got {other}"
        ))),
    }
}

/// A list entry is a bare name or `{"name": ..., "preselected": ...}`.
fn parse_variable_entry(item: &Value) -> Result<Variable, IpumsError> {
    match item {
        Value::String(name) => Ok(Variable::new(name.as_str())),
        Value::Object(entry) => {
            let name = entry
                .get("name")
                .ok_or_else(|| IpumsError::definition("variable entry is missing `name`"))
                .and_then(|name| string_field("name", name))?;
            Ok(Variable {
                name: name.to_string(),
                options: parse_options(name, item)?,
            })
        }
        other => Err(IpumsError::definition(format!(
            "variable entries must be names or mappings, got {other}"
        ))),
    }
}

fn parse_options(name: &str, options: &Value) -> Result<VariableOptions, IpumsError> {
    if options.is_null() {
        return Ok(VariableOptions::default());
    }
    serde_json::from_value(options.clone())
        .map_err(|e| IpumsError::definition(format!("invalid options for variable {name}: {e}")))
}

fn string_field<'a>(field: &str, value: &'a Value) -> Result<&'a str, IpumsError> {
    value
        .as_str()
        .ok_or_else(|| IpumsError::definition(format!("`{field}` must be a string, got {value}")))
}

fn definition_object(value: &Value) -> Result<&Map<String, Value>, IpumsError> {
    value
        .as_object()
        .ok_or_else(|| IpumsError::definition(format!("expected an extract definition mapping, got {value}")))
}

fn saved_definition(extract: &Extract) -> Map<String, Value> {
    extract_to_dict(extract).unwrap_or_else(|_| extract.build())
}

fn parse_yaml(raw: &str) -> Result<Value, serde_yaml::Error> {
    serde_yaml::from_str(raw)
}

fn read_to_string(path: &Path) -> Result<String, IpumsError> {
    fs::read_to_string(path).map_err(|e| IpumsError::io(path, e))
}

fn write_json(path: &Path, value: &Value) -> Result<(), IpumsError> {
    let mut bytes = serde_json::to_vec_pretty(value)
        .map_err(|e| IpumsError::definition(format!("cannot serialize extract: {e}")))?;
    bytes.push(b'\n');
    write_atomic(path, &bytes)
}

/// Writes to a sibling temp file, then renames over `path`.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), IpumsError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| IpumsError::io(parent, e))?;
    }
    let temp_path = partial_path(path);
    if let Err(e) = fs::write(&temp_path, bytes) {
        let _ = fs::remove_file(&temp_path);
        return Err(IpumsError::io(temp_path, e));
    }
    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        IpumsError::io(path, e)
    })?;
    debug!(path = %path.display(), bytes = bytes.len(), "wrote extract definition");
    Ok(())
}

/// `<name>.part` next to `path`.
pub(crate) fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(std::ffi::OsStr::to_os_string).unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}
