use std::collections::BTreeMap;
use derive_more::with_trait::Display;
use serde::{Deserialize, Serialize};
use crate::modules::errors::AdminError;

const BUILTIN_RESOURCES: &str = include_str!("../../resources.toml");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    #[display("list")]
    List,
    #[display("create")]
    Create,
    #[display("update")]
    Update,
    #[display("delete")]
    Delete,
}

impl Operation {
    pub fn all() -> Vec<Operation> {
        vec![Operation::List, Operation::Create, Operation::Update, Operation::Delete]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default, Display)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    #[default]
    #[display("text")]
    Text,
    #[display("number")]
    Number,
    #[display("list")]
    List,
    #[display("file")]
    File,
    #[display("files")]
    Files,
    /// Id of another record. Lists return the record itself.
    #[display("reference")]
    Reference,
}

impl FieldKind {
    pub fn is_file(self) -> bool {
        matches!(self, FieldKind::File | FieldKind::Files)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub kind: FieldKind,
    #[serde(default = "required_by_default")]
    pub required: bool,
    /// Input filter: edits that would exceed this many words are refused.
    #[serde(default)]
    pub max_words: Option<usize>,
    /// Key shown in tables for a referenced record.
    #[serde(default)]
    pub display: Option<String>,
}

fn required_by_default() -> bool {
    true
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            label: None,
            kind,
            required: true,
            max_words: None,
            display: None,
        }
    }

    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }
}

/// Where the list of rows sits in a GET response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Envelope {
    #[default]
    Bare,
    Field { key: String },
}

/// How a record's fields are laid out on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BodyShape {
    #[default]
    Flat,
    /// `{ <key>: [ { ...fields } ] }`
    Wrapped { key: String },
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct NestedSpec {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub min_entries: usize,
    #[serde(default)]
    pub max_entries: Option<usize>,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    /// Multipart key template per file field, `{index}` is the entry position.
    #[serde(default)]
    pub file_keys: BTreeMap<String, String>,
}

impl NestedSpec {
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn file_key(&self, field: &str, index: usize) -> String {
        match self.file_keys.get(field) {
            Some(template) => template.replace("{index}", &index.to_string()),
            None => format!("{field}_{index}"),
        }
    }

    pub fn has_files(&self) -> bool {
        self.fields.iter().any(|f| f.kind.is_file())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Display)]
#[display("{name:<18} {label:<24} {endpoint}")]
pub struct ResourceSchema {
    pub name: String,
    pub label: String,
    pub endpoint: String,
    #[serde(default)]
    pub create_path: Option<String>,
    #[serde(default = "default_id_field")]
    pub id_field: String,
    #[serde(default)]
    pub envelope: Envelope,
    #[serde(default)]
    pub shape: BodyShape,
    #[serde(default = "Operation::all")]
    pub operations: Vec<Operation>,
    #[serde(default)]
    pub singleton: bool,
    #[serde(default)]
    pub sort_by: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub nested: Vec<NestedSpec>,
}

fn default_id_field() -> String {
    "_id".to_string()
}

impl ResourceSchema {
    pub fn new(name: impl Into<String>, label: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            endpoint: endpoint.into(),
            create_path: None,
            id_field: default_id_field(),
            envelope: Envelope::default(),
            shape: BodyShape::default(),
            operations: Operation::all(),
            singleton: false,
            sort_by: None,
            fields: Vec::new(),
            nested: Vec::new(),
        }
    }

    pub fn supports(&self, operation: Operation) -> bool {
        self.operations.contains(&operation)
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn nested_spec(&self, name: &str) -> Option<&NestedSpec> {
        self.nested.iter().find(|n| n.name == name)
    }

    /// Resources with any file field are sent as multipart form data.
    pub fn has_files(&self) -> bool {
        self.fields.iter().any(|f| f.kind.is_file()) || self.nested.iter().any(NestedSpec::has_files)
    }

    pub fn create_endpoint(&self) -> String {
        match &self.create_path {
            Some(sub) => format!("{}/{}", self.endpoint.trim_end_matches('/'), sub.trim_start_matches('/')),
            None => self.endpoint.clone(),
        }
    }
}

/// A boolean site setting that is read and written as `{ <key>: bool }`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Display)]
#[display("{name:<18} {label:<24} {path}")]
pub struct FlagSpec {
    pub name: String,
    pub label: String,
    pub path: String,
    #[serde(default = "default_flag_key")]
    pub key: String,
}

fn default_flag_key() -> String {
    "isVisible".to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
pub struct Registry {
    #[serde(default)]
    pub resources: Vec<ResourceSchema>,
    #[serde(default)]
    pub flags: Vec<FlagSpec>,
}

impl Registry {
    pub fn builtin() -> Result<Self, AdminError> {
        Ok(toml::from_str(BUILTIN_RESOURCES)?)
    }

    pub fn resource(&self, name: &str) -> Result<&ResourceSchema, AdminError> {
        self.resources
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| AdminError::UnknownResource { name: name.to_string() })
    }

    pub fn flag(&self, name: &str) -> Result<&FlagSpec, AdminError> {
        self.flags
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| AdminError::UnknownResource { name: name.to_string() })
    }
}
