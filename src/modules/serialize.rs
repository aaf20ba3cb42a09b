use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use crate::modules::errors::AdminError;
use crate::modules::schema::Registry;
use crate::modules::session::Credentials;
use crate::modules::types::{Draft, FieldValue, FileRef, Fields, NestedEntry};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub base_url: String,
    #[serde(default = "default_session_file")]
    pub session_file: String,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Registry file replacing the built-in one.
    #[serde(default)]
    pub resources: Option<String>,
    pub login: Credentials,
}

fn default_session_file() -> String {
    "./.siteadmin-session.toml".to_string()
}

impl Settings {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

pub fn load_settings(path: &str) -> Result<Settings, AdminError> {
    let text = fs::read_to_string(path)?;
    let settings: Settings = toml::from_str(&text)?;
    Ok(settings)
}

pub fn load_registry(path: &str) -> Result<Registry, AdminError> {
    let text = fs::read_to_string(path)?;
    let registry: Registry = toml::from_str(&text)?;
    Ok(registry)
}

pub fn save_registry(path: &str, registry: &Registry) -> Result<(), AdminError> {
    let toml_str = toml::to_string_pretty(registry)?;
    fs::write(path, toml_str)?;
    Ok(())
}

pub fn load_registry_or_builtin(settings: &Settings) -> Result<Registry, AdminError> {
    match &settings.resources {
        Some(path) => load_registry(path),
        None => Registry::builtin(),
    }
}

/// One value in a draft file.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DraftValue {
    Text(String),
    Integer(i64),
    Float(f64),
    List(Vec<String>),
    File { file: PathBuf },
    Files { files: Vec<PathBuf> },
}

impl From<DraftValue> for FieldValue {
    fn from(value: DraftValue) -> Self {
        match value {
            DraftValue::Text(text) => FieldValue::Text(text),
            DraftValue::Integer(n) => FieldValue::Text(n.to_string()),
            DraftValue::Float(n) => FieldValue::Text(n.to_string()),
            DraftValue::List(items) => FieldValue::List(items),
            DraftValue::File { file } => FieldValue::Files(vec![FileRef::Local(file)]),
            DraftValue::Files { files } => FieldValue::Files(files.into_iter().map(FileRef::Local).collect()),
        }
    }
}

pub fn load_draft(path: &str) -> Result<Draft, AdminError> {
    let text = fs::read_to_string(path)?;
    parse_draft(&text)
}

/// Top-level keys are fields; `[[nested.<collection>]]` tables are entries.
pub fn parse_draft(text: &str) -> Result<Draft, AdminError> {
    let table: toml::Table = toml::from_str(text)?;
    let mut draft = Draft::default();
    for (key, value) in table {
        if key == "nested" {
            let collections: BTreeMap<String, Vec<toml::Table>> = value.try_into()?;
            for (collection, entries) in collections {
                let entries = entries
                    .into_iter()
                    .map(|entry| table_fields(entry).map(|fields| NestedEntry { fields }))
                    .collect::<Result<Vec<_>, _>>()?;
                draft.nested.insert(collection, entries);
            }
        } else {
            let value: DraftValue = value.try_into()?;
            draft.fields.insert(key, value.into());
        }
    }
    Ok(draft)
}

fn table_fields(table: toml::Table) -> Result<Fields, AdminError> {
    let mut fields = Fields::new();
    for (key, value) in table {
        let value: DraftValue = value.try_into()?;
        fields.insert(key, value.into());
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn settings_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
base_url = "https://backend.example.com"

[login]
email = "admin@example.com"
password = "secret"
"#
        )
        .unwrap();
        let settings = load_settings(file.path().to_str().unwrap()).unwrap();
        assert_eq!(settings.session_file, "./.siteadmin-session.toml");
        assert_eq!(settings.timeout(), None);
        assert_eq!(settings.login.email, "admin@example.com");
        assert!(load_registry_or_builtin(&settings).unwrap().resource("faq").is_ok());
    }

    #[test]
    fn registry_survives_a_save() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();
        let builtin = Registry::builtin().unwrap();
        save_registry(path, &builtin).unwrap();
        assert_eq!(load_registry(path).unwrap(), builtin);
    }

    #[test]
    fn draft_file_values() {
        let draft = parse_draft(
            r#"
title = "Mango pickle"
serving = 4
productSizes = ["250g", "500g"]
blogBanner = { file = "banner.png" }
productImages = { files = ["a.png", "b.png"] }

[[nested.recipes]]
recipeName = "Mango"
ingredients = ["Mango", "Salt"]
image = { file = "mango.png" }
"#,
        )
        .unwrap();
        assert_eq!(draft.text("title"), "Mango pickle");
        assert_eq!(draft.text("serving"), "4");
        assert_eq!(draft.fields["productSizes"].items().len(), 2);
        assert_eq!(draft.fields["blogBanner"].files(), &[FileRef::Local("banner.png".into())]);
        assert_eq!(draft.fields["productImages"].files().len(), 2);
        let recipe = &draft.entries("recipes")[0];
        assert_eq!(recipe.text("recipeName"), "Mango");
        assert!(recipe.fields["image"].files()[0].is_local());
    }

    #[test]
    fn unsupported_draft_values_are_rejected() {
        assert!(parse_draft("published = true").is_err());
    }
}
