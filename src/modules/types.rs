use std::collections::BTreeMap;
use std::path::PathBuf;
use derive_more::with_trait::Display;
use serde_json::{Map, Value};

/// Form values keyed by field name.
pub type Fields = BTreeMap<String, FieldValue>;

/// A file field is either a file picked on this machine (not uploaded yet) or
/// the URL the backend returned for an earlier upload.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum FileRef {
    #[display("{}", _0.display())]
    Local(PathBuf),
    #[display("{_0}")]
    Remote(String),
}

impl FileRef {
    pub fn is_local(&self) -> bool {
        matches!(self, FileRef::Local(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
    Files(Vec<FileRef>),
}

impl FieldValue {
    pub fn text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn items(&self) -> &[String] {
        match self {
            FieldValue::List(items) => items,
            _ => &[],
        }
    }

    pub fn files(&self) -> &[FileRef] {
        match self {
            FieldValue::Files(files) => files,
            _ => &[],
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Text(text) => text.trim().is_empty(),
            FieldValue::List(items) => items.iter().all(|item| item.trim().is_empty()),
            FieldValue::Files(files) => files.is_empty(),
        }
    }
}

/// One element of a parent's sub-collection (a recipe, a subproduct...).
/// Entries live inside the parent draft and are saved with it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NestedEntry {
    pub fields: Fields,
}

impl NestedEntry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), FieldValue::Text(value.into()));
        self
    }

    pub fn with_list<I, S>(mut self, name: impl Into<String>, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let items = items.into_iter().map(Into::into).collect();
        self.fields.insert(name.into(), FieldValue::List(items));
        self
    }

    pub fn with_file(mut self, name: impl Into<String>, file: FileRef) -> Self {
        match self.fields.entry(name.into()).or_insert_with(|| FieldValue::Files(Vec::new())) {
            FieldValue::Files(files) => files.push(file),
            other => *other = FieldValue::Files(vec![file]),
        }
        self
    }

    pub fn text(&self, name: &str) -> &str {
        self.fields.get(name).and_then(FieldValue::text).unwrap_or("")
    }

    /// Appends an empty item to a list field unless one of the current items
    /// is still blank. Returns whether the item was added.
    pub fn push_list_item(&mut self, name: &str) -> bool {
        let slot = self
            .fields
            .entry(name.to_string())
            .or_insert_with(|| FieldValue::List(Vec::new()));
        match slot {
            FieldValue::List(items) if crate::modules::validator::can_add_entry(items) => {
                items.push(String::new());
                true
            }
            _ => false,
        }
    }
}

/// In-memory form state for a create or an edit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Draft {
    pub fields: Fields,
    pub nested: BTreeMap<String, Vec<NestedEntry>>,
}

impl Draft {
    pub fn text(&self, name: &str) -> &str {
        self.fields.get(name).and_then(FieldValue::text).unwrap_or("")
    }

    pub fn entries(&self, collection: &str) -> &[NestedEntry] {
        self.nested.get(collection).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.fields.values().all(FieldValue::is_blank) && self.nested.values().all(Vec::is_empty)
    }
}

/// A row as returned by the backend, with its identifier split off.
#[derive(Debug, Clone, PartialEq, Display)]
#[display("{id}")]
pub struct Record {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Scalar value rendered as text; strings come back unquoted.
    pub fn text(&self, name: &str) -> Option<String> {
        match self.fields.get(name)? {
            Value::Null => None,
            Value::String(text) => Some(text.clone()),
            other => Some(other.to_string()),
        }
    }
}
