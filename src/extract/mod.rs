//! Extract data model.
//!
//! An [`Extract`] is a value: a collection-specific [`ExtractDefinition`]
//! plus the submission state the server assigns (`extract_id`, `status`, and
//! the server's recorded definition). The API client never mutates an extract
//! in place; submitting or polling returns a new value for the caller to keep.
//!
//! # Example
//!
//! ```
//! use ipums_extract::Extract;
//!
//! let extract = Extract::usa(["us2012b"], ["AGE", "SEX"]);
//! assert_eq!(extract.collection(), "usa");
//! assert!(extract.extract_id().is_none());
//!
//! let payload = extract.build();
//! assert_eq!(payload["data_format"], "fixed_width");
//! ```

pub mod dict;
mod status;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

pub use status::{ExtractStatus, StatusLookup};

/// Collection identifier for IPUMS USA.
pub const USA: &str = "usa";

/// Collection identifier for IPUMS CPS.
pub const CPS: &str = "cps";

/// Default data format for microdata collections.
pub const DEFAULT_DATA_FORMAT: &str = "fixed_width";

/// Per-variable request options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VariableOptions {
    /// Included automatically by the service or a codebook rather than
    /// requested explicitly.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub preselected: bool,
}

impl VariableOptions {
    /// Wire form: `{}` or `{"preselected": true}`.
    #[must_use]
    pub fn to_json(&self) -> Value {
        if self.preselected {
            json!({ "preselected": true })
        } else {
            json!({})
        }
    }
}

/// A requested variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    /// Variable mnemonic, e.g. `AGE`.
    pub name: String,
    /// Request options.
    pub options: VariableOptions,
}

impl Variable {
    /// A user-requested variable.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: VariableOptions::default(),
        }
    }

    /// A preselected variable.
    pub fn preselected(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: VariableOptions { preselected: true },
        }
    }

    /// Whether this variable is preselected.
    #[must_use]
    pub fn is_preselected(&self) -> bool {
        self.options.preselected
    }
}

impl From<&str> for Variable {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Variable {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// Definition shared by the structured microdata collections (USA, CPS).
#[derive(Debug, Clone, PartialEq)]
pub struct MicrodataDefinition {
    samples: Vec<String>,
    variables: Vec<Variable>,
    description: String,
    data_format: String,
    data_structure: Value,
}

impl MicrodataDefinition {
    fn with_defaults(description: &str) -> Self {
        Self {
            samples: Vec::new(),
            variables: Vec::new(),
            description: description.to_string(),
            data_format: DEFAULT_DATA_FORMAT.to_string(),
            data_structure: default_data_structure(),
        }
    }

    fn push_sample(&mut self, sample: String) {
        if !self.samples.contains(&sample) {
            self.samples.push(sample);
        }
    }

    /// Inserts a variable, keeping preselected variables ahead of user-added
    /// ones. A repeated name is ignored unless it upgrades a user-added
    /// variable to preselected, in which case it moves into the preselected block.
    fn push_variable(&mut self, variable: Variable) {
        if let Some(index) = self.variables.iter().position(|v| v.name == variable.name) {
            if !variable.is_preselected() || self.variables[index].is_preselected() {
                return;
            }
            self.variables.remove(index);
        }

        if variable.is_preselected() {
            let boundary = self
                .variables
                .iter()
                .take_while(|v| v.is_preselected())
                .count();
            self.variables.insert(boundary, variable);
        } else {
            self.variables.push(variable);
        }
    }

    /// Sample codes in request order.
    #[must_use]
    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    /// Variables in request order.
    #[must_use]
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// Free-text description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Output data format, e.g. `fixed_width`.
    #[must_use]
    pub fn data_format(&self) -> &str {
        &self.data_format
    }

    /// Output data structure, e.g. `{"rectangular": {"on": "P"}}`.
    #[must_use]
    pub fn data_structure(&self) -> &Value {
        &self.data_structure
    }
}

/// Definition for collections this crate does not model; passed through verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct OtherDefinition {
    collection: String,
    details: Map<String, Value>,
}

impl OtherDefinition {
    /// Opaque request body.
    #[must_use]
    pub fn details(&self) -> &Map<String, Value> {
        &self.details
    }
}

/// Collection-specific extract definition.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractDefinition {
    /// IPUMS USA.
    Usa(MicrodataDefinition),
    /// IPUMS CPS.
    Cps(MicrodataDefinition),
    /// Any other collection.
    Other(OtherDefinition),
}

impl ExtractDefinition {
    /// Empty definition with collection defaults. Unknown collections get an
    /// empty opaque definition.
    #[must_use]
    pub fn for_collection(collection: &str) -> Self {
        match collection {
            USA => Self::Usa(MicrodataDefinition::with_defaults("My IPUMS USA extract")),
            CPS => Self::Cps(MicrodataDefinition::with_defaults("My IPUMS CPS extract")),
            other => Self::Other(OtherDefinition {
                collection: other.to_string(),
                details: Map::new(),
            }),
        }
    }

    /// Collection identifier.
    #[must_use]
    pub fn collection(&self) -> &str {
        match self {
            Self::Usa(_) => USA,
            Self::Cps(_) => CPS,
            Self::Other(other) => &other.collection,
        }
    }

    fn microdata(&self) -> Option<&MicrodataDefinition> {
        match self {
            Self::Usa(def) | Self::Cps(def) => Some(def),
            Self::Other(_) => None,
        }
    }

    fn microdata_mut(&mut self) -> Option<&mut MicrodataDefinition> {
        match self {
            Self::Usa(def) | Self::Cps(def) => Some(def),
            Self::Other(_) => None,
        }
    }
}

/// A microdata extract request and its submission state.
#[derive(Debug, Clone, PartialEq)]
pub struct Extract {
    definition: ExtractDefinition,
    extract_id: Option<u64>,
    status: ExtractStatus,
    info: Option<Map<String, Value>>,
}

impl Extract {
    /// Creates an unsubmitted extract from a definition.
    #[must_use]
    pub fn new(definition: ExtractDefinition) -> Self {
        Self {
            definition,
            extract_id: None,
            status: ExtractStatus::NotSubmitted,
            info: None,
        }
    }

    /// Creates an IPUMS USA extract.
    pub fn usa<I, S, J, V>(samples: I, variables: J) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        J: IntoIterator<Item = V>,
        V: Into<Variable>,
    {
        Self::microdata(USA, samples, variables)
    }

    /// Creates an IPUMS CPS extract.
    pub fn cps<I, S, J, V>(samples: I, variables: J) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        J: IntoIterator<Item = V>,
        V: Into<Variable>,
    {
        Self::microdata(CPS, samples, variables)
    }

    fn microdata<I, S, J, V>(collection: &str, samples: I, variables: J) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        J: IntoIterator<Item = V>,
        V: Into<Variable>,
    {
        let mut extract = Self::new(ExtractDefinition::for_collection(collection));
        extract.add_samples(samples);
        extract.add_variables(variables);
        extract
    }

    /// Creates an extract for a collection without a structured model. The
    /// `details` are sent to the server as-is.
    pub fn other(collection: impl Into<String>, details: Map<String, Value>) -> Self {
        Self::new(ExtractDefinition::Other(OtherDefinition {
            collection: collection.into(),
            details,
        }))
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        match &mut self.definition {
            ExtractDefinition::Usa(def) | ExtractDefinition::Cps(def) => {
                def.description = description;
            }
            ExtractDefinition::Other(other) => {
                other
                    .details
                    .insert("description".to_string(), Value::String(description));
            }
        }
        self
    }

    /// Sets the output data format.
    #[must_use]
    pub fn with_data_format(mut self, data_format: impl Into<String>) -> Self {
        let data_format = data_format.into();
        match &mut self.definition {
            ExtractDefinition::Usa(def) | ExtractDefinition::Cps(def) => {
                def.data_format = data_format;
            }
            ExtractDefinition::Other(other) => {
                other
                    .details
                    .insert("data_format".to_string(), Value::String(data_format));
            }
        }
        self
    }

    /// Sets the output data structure.
    #[must_use]
    pub fn with_data_structure(mut self, data_structure: Value) -> Self {
        match &mut self.definition {
            ExtractDefinition::Usa(def) | ExtractDefinition::Cps(def) => {
                def.data_structure = data_structure;
            }
            ExtractDefinition::Other(other) => {
                other
                    .details
                    .insert("data_structure".to_string(), data_structure);
            }
        }
        self
    }

    /// Appends samples, skipping codes already present. No-op for opaque extracts.
    pub fn add_samples<I, S>(&mut self, samples: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Some(def) = self.definition.microdata_mut() {
            for sample in samples {
                def.push_sample(sample.into());
            }
        }
    }

    /// Adds variables. Preselected entries join the preselected block; others
    /// are appended. No-op for opaque extracts.
    pub fn add_variables<J, V>(&mut self, variables: J)
    where
        J: IntoIterator<Item = V>,
        V: Into<Variable>,
    {
        if let Some(def) = self.definition.microdata_mut() {
            for variable in variables {
                def.push_variable(variable.into());
            }
        }
    }

    /// Adds variables marked as preselected.
    pub fn add_preselected_variables<J, S>(&mut self, names: J)
    where
        J: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_variables(names.into_iter().map(Variable::preselected));
    }

    /// Collection identifier.
    #[must_use]
    pub fn collection(&self) -> &str {
        self.definition.collection()
    }

    /// The collection-specific definition.
    #[must_use]
    pub fn definition(&self) -> &ExtractDefinition {
        &self.definition
    }

    /// Sample codes in request order (empty for opaque extracts).
    #[must_use]
    pub fn samples(&self) -> &[String] {
        self.definition
            .microdata()
            .map(MicrodataDefinition::samples)
            .unwrap_or_default()
    }

    /// Variables in request order (empty for opaque extracts).
    #[must_use]
    pub fn variables(&self) -> &[Variable] {
        self.definition
            .microdata()
            .map(MicrodataDefinition::variables)
            .unwrap_or_default()
    }

    /// Variable names in request order.
    #[must_use]
    pub fn variable_names(&self) -> Vec<&str> {
        self.variables().iter().map(|v| v.name.as_str()).collect()
    }

    /// Description, when the collection models one.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.definition
            .microdata()
            .map(MicrodataDefinition::description)
    }

    /// Output data format, when the collection models one.
    #[must_use]
    pub fn data_format(&self) -> Option<&str> {
        self.definition
            .microdata()
            .map(MicrodataDefinition::data_format)
    }

    /// Output data structure, when the collection models one.
    #[must_use]
    pub fn data_structure(&self) -> Option<&Value> {
        self.definition
            .microdata()
            .map(MicrodataDefinition::data_structure)
    }

    /// Server-assigned extract number; `None` until submitted.
    #[must_use]
    pub fn extract_id(&self) -> Option<u64> {
        self.extract_id
    }

    /// Last known status.
    #[must_use]
    pub fn status(&self) -> ExtractStatus {
        self.status
    }

    /// Whether the server has assigned an extract number.
    #[must_use]
    pub fn is_submitted(&self) -> bool {
        self.extract_id.is_some()
    }

    /// The server's recorded definition, once submitted.
    #[must_use]
    pub fn info(&self) -> Option<&Map<String, Value>> {
        self.info.as_ref()
    }

    /// Builds the wire request body.
    ///
    /// Samples and variables become mappings whose iteration order follows
    /// the request order. Opaque extracts return their details unchanged.
    #[must_use]
    pub fn build(&self) -> Map<String, Value> {
        let def = match &self.definition {
            ExtractDefinition::Usa(def) | ExtractDefinition::Cps(def) => def,
            ExtractDefinition::Other(other) => return other.details.clone(),
        };

        let samples: Map<String, Value> = def
            .samples
            .iter()
            .map(|sample| (sample.clone(), json!({})))
            .collect();
        let variables: Map<String, Value> = def
            .variables
            .iter()
            .map(|variable| (variable.name.clone(), variable.options.to_json()))
            .collect();

        let mut payload = Map::new();
        payload.insert(
            "collection".to_string(),
            Value::String(self.collection().to_string()),
        );
        payload.insert(
            "description".to_string(),
            Value::String(def.description.clone()),
        );
        payload.insert(
            "data_format".to_string(),
            Value::String(def.data_format.clone()),
        );
        payload.insert("data_structure".to_string(), def.data_structure.clone());
        payload.insert("samples".to_string(), Value::Object(samples));
        payload.insert("variables".to_string(), Value::Object(variables));
        payload
    }

    /// Returns this definition as submitted: id, status and server record set.
    pub(crate) fn into_submitted(
        self,
        extract_id: u64,
        status: ExtractStatus,
        info: Option<Map<String, Value>>,
    ) -> Self {
        Self {
            definition: self.definition,
            extract_id: Some(extract_id),
            status,
            info,
        }
    }

    /// Returns a copy with only the status replaced.
    pub(crate) fn with_status(&self, status: ExtractStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }

    /// Returns a fresh, unsubmitted copy of the definition.
    #[must_use]
    pub fn unsubmitted(&self) -> Self {
        Self::new(self.definition.clone())
    }
}

fn default_data_structure() -> Value {
    json!({ "rectangular": { "on": "P" } })
}
