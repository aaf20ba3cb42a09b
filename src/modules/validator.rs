//! Field checks run before anything is sent to the backend.
//!
//! Everything here is a pure function of the schema and the draft. Word
//! bounds are an input filter (see [`accepts_words`]) and never show up as a
//! submit-time violation.

use std::fmt;
use derive_more::with_trait::Display;
use crate::modules::schema::{FieldKind, FieldSpec, NestedSpec, ResourceSchema};
use crate::modules::types::{Draft, FieldValue, Fields, NestedEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Create,
    /// Editing an existing record: missing files mean "keep what is stored".
    Update,
}

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum Problem {
    #[display("is required")]
    Missing,
    #[display("must be a number")]
    NotANumber,
    #[display("needs at least {_0} entries")]
    TooFewEntries(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[display("{field} {problem}")]
pub struct Violation {
    pub field: String,
    pub problem: Problem,
}

impl Violation {
    fn new(field: impl Into<String>, problem: Problem) -> Self {
        Self {
            field: field.into(),
            problem,
        }
    }
}

/// Every violation found in one pass, reported together.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationReport {
    violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn fields(&self) -> Vec<&str> {
        self.violations.iter().map(|v| v.field.as_str()).collect()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.violations.iter().map(ToString::to_string).collect();
        write!(f, "{}", parts.join(", "))
    }
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Whether an edit producing `proposed` may be stored under a word bound.
pub fn accepts_words(proposed: &str, bound: Option<usize>) -> bool {
    match bound {
        Some(bound) => word_count(proposed) <= bound,
        None => true,
    }
}

/// A new list item may only be added once every existing item has content.
pub fn can_add_entry(items: &[String]) -> bool {
    items.iter().all(|item| !item.trim().is_empty())
}

/// Creation is blocked for a singleton resource that already holds a row.
pub fn singleton_blocked(schema: &ResourceSchema, rows: usize, editing: bool) -> bool {
    schema.singleton && rows > 0 && !editing
}

pub fn validate(schema: &ResourceSchema, draft: &Draft, mode: Mode) -> ValidationReport {
    let mut violations = check_fields(&schema.fields, &draft.fields, mode, None);
    for nested in &schema.nested {
        let entries = draft.entries(&nested.name);
        // Entry files were checked when the entry was added.
        for entry in entries {
            violations.extend(validate_entry(nested, entry, Mode::Update).violations);
        }
        if entries.len() < nested.min_entries {
            violations.push(Violation::new(
                nested.name.clone(),
                Problem::TooFewEntries(nested.min_entries),
            ));
        }
    }
    ValidationReport { violations }
}

pub fn validate_entry(spec: &NestedSpec, entry: &NestedEntry, mode: Mode) -> ValidationReport {
    ValidationReport {
        violations: check_fields(&spec.fields, &entry.fields, mode, Some(&spec.name)),
    }
}

fn check_fields(specs: &[FieldSpec], fields: &Fields, mode: Mode, prefix: Option<&str>) -> Vec<Violation> {
    specs
        .iter()
        .filter_map(|spec| {
            check_field(spec, fields.get(&spec.name), mode).map(|problem| {
                let name = match prefix {
                    Some(prefix) => format!("{prefix}.{}", spec.name),
                    None => spec.name.clone(),
                };
                Violation::new(name, problem)
            })
        })
        .collect()
}

fn check_field(spec: &FieldSpec, value: Option<&FieldValue>, mode: Mode) -> Option<Problem> {
    let blank = value.is_none_or(FieldValue::is_blank);
    match spec.kind {
        FieldKind::File | FieldKind::Files => {
            (spec.required && mode == Mode::Create && blank).then_some(Problem::Missing)
        }
        FieldKind::Number if !blank => {
            let text = value.and_then(FieldValue::text).unwrap_or("").trim();
            text.parse::<f64>().is_err().then_some(Problem::NotANumber)
        }
        _ => (spec.required && blank).then_some(Problem::Missing),
    }
}
