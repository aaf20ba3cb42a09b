//! One generic engine for every resource page.
//!
//! A [`CrudController`] owns the rows of one resource, the draft being edited
//! and the "currently editing" id. Every mutation is validated first, sent
//! through the [`RemoteClient`], reported through the [`Notifier`] and then
//! followed by a full re-fetch of the collection.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use log::{debug, error, info, warn};
use serde_json::{Map, Value};
use crate::modules::client::{build_payload, Payload, RemoteClient};
use crate::modules::errors::AdminError;
use crate::modules::notify::{Notice, Notifier};
use crate::modules::schema::{FieldKind, FieldSpec, FlagSpec, NestedSpec, Operation, ResourceSchema};
use crate::modules::table::Table;
use crate::modules::types::{Draft, FieldValue, Fields, FileRef, NestedEntry, Record};
use crate::modules::validator::{accepts_words, can_add_entry, singleton_blocked, validate, validate_entry, Mode};

/// Shared "still mounted" flag. Clones may be handed to other threads; once
/// any of them calls [`MountHandle::unmount`], late list results are dropped.
#[derive(Debug, Clone)]
pub struct MountHandle(Arc<AtomicBool>);

impl MountHandle {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn unmount(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_mounted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Saved {
    Created,
    Updated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Deleted,
    Declined,
}

pub struct CrudController<C: RemoteClient, N: Notifier> {
    schema: ResourceSchema,
    client: C,
    notifier: N,
    rows: Vec<Record>,
    fetching: bool,
    draft: Draft,
    editing: Option<String>,
    mount: MountHandle,
}

impl<C: RemoteClient, N: Notifier> CrudController<C, N> {
    pub fn new(schema: ResourceSchema, client: C, notifier: N) -> Self {
        Self {
            schema,
            client,
            notifier,
            rows: Vec::new(),
            fetching: false,
            draft: Draft::default(),
            editing: None,
            mount: MountHandle::new(),
        }
    }

    pub fn schema(&self) -> &ResourceSchema {
        &self.schema
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn is_fetching(&self) -> bool {
        self.fetching
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub fn editing(&self) -> Option<&str> {
        self.editing.as_deref()
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn mount_handle(&self) -> MountHandle {
        self.mount.clone()
    }

    pub fn unmount(&self) {
        self.mount.unmount();
    }

    pub fn table(&self) -> Table<'_> {
        Table::new(&self.schema, &self.rows, self.fetching)
    }

    /// Singleton pages disable their inputs once a row exists, until Edit.
    pub fn inputs_locked(&self) -> bool {
        singleton_blocked(&self.schema, self.rows.len(), self.editing.is_some())
    }

    pub fn list(&mut self) -> Result<(), AdminError> {
        self.ensure(Operation::List)?;
        self.fetching = true;
        let result = self.client.list(&self.schema);
        self.fetching = false;

        if !self.mount.is_mounted() {
            debug!("{} is unmounted, dropping list result", self.schema.name);
            return Ok(());
        }
        match result {
            Ok(rows) => {
                info!("Fetched {} {} rows", rows.len(), self.schema.name);
                self.rows = rows;
                Ok(())
            }
            Err(e) => self.fail(e),
        }
    }

    /// Stores a text or number value. Returns `false` when the word filter
    /// refuses the edit, leaving the previous value in place.
    pub fn set_field(&mut self, name: &str, value: &str) -> Result<bool, AdminError> {
        self.ensure_unlocked()?;
        let spec = self.field_spec(name)?;
        if !matches!(spec.kind, FieldKind::Text | FieldKind::Number | FieldKind::Reference) {
            return self.fail(AdminError::WrongKind { field: spec.name, kind: spec.kind });
        }
        if !accepts_words(value, spec.max_words) {
            debug!("Refused edit of {name}: over {:?} words", spec.max_words);
            return Ok(false);
        }
        self.draft.fields.insert(spec.name, FieldValue::Text(value.to_string()));
        Ok(true)
    }

    pub fn set_list(&mut self, name: &str, items: Vec<String>) -> Result<(), AdminError> {
        self.ensure_unlocked()?;
        let spec = self.list_spec(name)?;
        if let Some(max) = spec.max_words {
            if !items.iter().all(|item| accepts_words(item, Some(max))) {
                return self.fail(AdminError::TooManyWords { field: spec.name, max });
            }
        }
        self.draft.fields.insert(spec.name, FieldValue::List(items));
        Ok(())
    }

    pub fn set_list_item(&mut self, name: &str, index: usize, value: &str) -> Result<bool, AdminError> {
        self.ensure_unlocked()?;
        let spec = self.list_spec(name)?;
        let mut items = self.list_items(name);
        if index >= items.len() {
            return self.fail(AdminError::NoSuchEntry { collection: spec.name, index });
        }
        if !accepts_words(value, spec.max_words) {
            return Ok(false);
        }
        items[index] = value.to_string();
        self.draft.fields.insert(spec.name, FieldValue::List(items));
        Ok(true)
    }

    /// Appends an empty item, refused while any existing item is blank.
    pub fn add_list_item(&mut self, name: &str) -> Result<usize, AdminError> {
        self.ensure_unlocked()?;
        let spec = self.list_spec(name)?;
        let mut items = self.list_items(name);
        if !can_add_entry(&items) {
            return self.fail(AdminError::IncompleteEntry { field: spec.label().to_string() });
        }
        items.push(String::new());
        let index = items.len() - 1;
        self.draft.fields.insert(spec.name, FieldValue::List(items));
        Ok(index)
    }

    /// Picks a local file. Single-file fields are replaced, multi-file fields
    /// append.
    pub fn attach_file(&mut self, name: &str, path: impl Into<PathBuf>) -> Result<(), AdminError> {
        self.ensure_unlocked()?;
        let spec = self.field_spec(name)?;
        let file = FileRef::Local(path.into());
        match spec.kind {
            FieldKind::File => {
                self.draft.fields.insert(spec.name, FieldValue::Files(vec![file]));
            }
            FieldKind::Files => {
                let mut files = self.draft.fields.get(name).map(|v| v.files().to_vec()).unwrap_or_default();
                files.push(file);
                self.draft.fields.insert(spec.name, FieldValue::Files(files));
            }
            kind => return self.fail(AdminError::WrongKind { field: spec.name, kind }),
        }
        Ok(())
    }

    /// Command-line style input: text and numbers are set, list values are
    /// appended, file fields take a path.
    pub fn set_input(&mut self, name: &str, value: &str) -> Result<(), AdminError> {
        let spec = self.field_spec(name)?;
        match spec.kind {
            FieldKind::Text | FieldKind::Number | FieldKind::Reference => {
                if !self.set_field(name, value)? {
                    let max = spec.max_words.unwrap_or_default();
                    return self.fail(AdminError::TooManyWords { field: spec.name, max });
                }
                Ok(())
            }
            FieldKind::List => {
                let mut items = self.list_items(name);
                match items.last_mut() {
                    Some(last) if last.trim().is_empty() => *last = value.to_string(),
                    _ => items.push(value.to_string()),
                }
                self.set_list(name, items)
            }
            FieldKind::File | FieldKind::Files => self.attach_file(name, value),
        }
    }

    pub fn add_nested(&mut self, collection: &str, entry: NestedEntry) -> Result<usize, AdminError> {
        let spec = self.nested_spec(collection)?;
        let count = self.draft.entries(collection).len();
        if let Some(max) = spec.max_entries {
            if count >= max {
                return self.fail(AdminError::TooManyEntries { collection: spec.name, max });
            }
        }
        self.check_entry(&spec, &entry, Mode::Create)?;
        self.draft.nested.entry(spec.name).or_default().push(entry);
        Ok(count)
    }

    /// Replaces an entry in place. File fields left empty keep the files of
    /// the entry being replaced.
    pub fn replace_nested(&mut self, collection: &str, index: usize, mut entry: NestedEntry) -> Result<(), AdminError> {
        let spec = self.nested_spec(collection)?;
        let Some(current) = self.draft.entries(collection).get(index).cloned() else {
            return self.fail(AdminError::NoSuchEntry { collection: spec.name, index });
        };
        for field in spec.fields.iter().filter(|f| f.kind.is_file()) {
            let empty = entry.fields.get(&field.name).is_none_or(FieldValue::is_blank);
            if let (true, Some(previous)) = (empty, current.fields.get(&field.name)) {
                entry.fields.insert(field.name.clone(), previous.clone());
            }
        }
        self.check_entry(&spec, &entry, Mode::Update)?;
        if let Some(slot) = self.draft.nested.get_mut(collection).and_then(|e| e.get_mut(index)) {
            *slot = entry;
        }
        Ok(())
    }

    pub fn remove_nested(&mut self, collection: &str, index: usize) -> Result<Removal, AdminError> {
        let spec = self.nested_spec(collection)?;
        if index >= self.draft.entries(collection).len() {
            return self.fail(AdminError::NoSuchEntry { collection: spec.name, index });
        }
        if !self.notifier.confirm_destructive(&format!("Remove this {}?", spec.label())) {
            return Ok(Removal::Declined);
        }
        if let Some(entries) = self.draft.nested.get_mut(collection) {
            entries.remove(index);
        }
        Ok(Removal::Deleted)
    }

    pub fn add_nested_list_item(&mut self, collection: &str, index: usize, field: &str) -> Result<(), AdminError> {
        let spec = self.nested_spec(collection)?;
        match spec.field(field).map(|f| f.kind) {
            Some(FieldKind::List) => {}
            Some(kind) => return self.fail(AdminError::WrongKind { field: field.to_string(), kind }),
            None => {
                return self.fail(AdminError::UnknownField {
                    resource: self.schema.name.clone(),
                    field: format!("{collection}.{field}"),
                });
            }
        }
        let added = match self.draft.nested.get_mut(collection).and_then(|e| e.get_mut(index)) {
            Some(entry) => entry.push_list_item(field),
            None => return self.fail(AdminError::NoSuchEntry { collection: spec.name, index }),
        };
        if !added {
            return self.fail(AdminError::IncompleteEntry { field: field.to_string() });
        }
        Ok(())
    }

    pub fn begin_edit(&mut self, record: &Record) -> Result<(), AdminError> {
        self.ensure(Operation::Update)?;
        info!("Editing {} {}", self.schema.name, record.id);
        self.draft = draft_from_record(&self.schema, record);
        self.editing = Some(record.id.clone());
        Ok(())
    }

    pub fn begin_edit_by_id(&mut self, id: &str) -> Result<(), AdminError> {
        match self.rows.iter().find(|r| r.id == id).cloned() {
            Some(record) => self.begin_edit(&record),
            None => self.fail(AdminError::NoSuchRecord {
                resource: self.schema.name.clone(),
                id: id.to_string(),
            }),
        }
    }

    pub fn cancel_edit(&mut self) {
        self.editing = None;
        self.draft = Draft::default();
    }

    /// Merges a prepared draft (e.g. read from a file) into the current one.
    /// Nested collections given in `draft` replace the current ones.
    pub fn apply_draft(&mut self, draft: Draft) -> Result<(), AdminError> {
        for (name, value) in draft.fields {
            match value {
                FieldValue::Text(text) => self.set_input(&name, &text)?,
                FieldValue::List(items) => self.set_list(&name, items)?,
                FieldValue::Files(files) => {
                    for file in files {
                        match file {
                            FileRef::Local(path) => self.attach_file(&name, path)?,
                            FileRef::Remote(url) => warn!("Ignoring stored file {url} for {name}"),
                        }
                    }
                }
            }
        }

        for (collection, entries) in draft.nested {
            self.nested_spec(&collection)?;
            let keep = if self.editing.is_some() {
                entries.len().min(self.draft.entries(&collection).len())
            } else {
                0
            };
            if let Some(current) = self.draft.nested.get_mut(&collection) {
                current.truncate(keep);
            }
            for (index, entry) in entries.into_iter().enumerate() {
                if index < keep {
                    self.replace_nested(&collection, index, entry)?;
                } else {
                    self.add_nested(&collection, entry)?;
                }
            }
        }
        Ok(())
    }

    pub fn submit(&mut self) -> Result<Saved, AdminError> {
        if self.editing.is_some() {
            self.submit_update()
        } else {
            self.submit_create()
        }
    }

    pub fn submit_create(&mut self) -> Result<Saved, AdminError> {
        self.ensure(Operation::Create)?;
        if let Some(id) = self.editing.clone() {
            return self.fail(AdminError::StillEditing { id });
        }
        if singleton_blocked(&self.schema, self.rows.len(), false) {
            return self.fail(AdminError::AlreadyExists { resource: self.schema.label.clone() });
        }
        self.check(Mode::Create)?;

        let label = self.schema.label.clone();
        self.send(format!("Uploading {label}..."), |client, schema, payload| {
            client.create(schema, payload)
        })?;
        info!("Created {}", self.schema.name);
        self.notifier.notify(Notice::success("Success!", format!("{label} added successfully.")));
        self.draft = Draft::default();
        self.refresh();
        Ok(Saved::Created)
    }

    pub fn submit_update(&mut self) -> Result<Saved, AdminError> {
        self.ensure(Operation::Update)?;
        let Some(id) = self.editing.clone() else {
            return self.fail(AdminError::NotEditing);
        };
        self.check(Mode::Update)?;

        let label = self.schema.label.clone();
        self.send(format!("Updating {label}..."), |client, schema, payload| {
            client.update(schema, &id, payload)
        })?;
        info!("Updated {} {id}", self.schema.name);
        self.notifier.notify(Notice::success("Updated!", format!("{label} updated successfully.")));
        self.cancel_edit();
        self.refresh();
        Ok(Saved::Updated)
    }

    /// Deletes after an explicit confirmation; declining sends nothing.
    pub fn remove(&mut self, id: &str) -> Result<Removal, AdminError> {
        self.ensure(Operation::Delete)?;
        let label = self.schema.label.clone();
        if !self.notifier.confirm_destructive(&format!("Delete {label} {id}?")) {
            info!("Delete of {} {id} declined", self.schema.name);
            self.notifier.notify(Notice::info("Cancelled", format!("Your {label} is safe.")));
            return Ok(Removal::Declined);
        }
        if let Err(e) = self.client.delete(&self.schema, id) {
            return self.fail(e);
        }
        info!("Deleted {} {id}", self.schema.name);
        if self.editing.as_deref() == Some(id) {
            self.cancel_edit();
        }
        self.notifier.notify(Notice::success("Deleted!", format!("{label} has been deleted.")));
        self.refresh();
        Ok(Removal::Deleted)
    }

    fn send<F>(&mut self, busy: String, request: F) -> Result<(), AdminError>
    where
        F: FnOnce(&C, &ResourceSchema, &Payload) -> Result<(), AdminError>,
    {
        let payload = build_payload(&self.schema, &self.draft);
        let multipart = payload.is_multipart();
        if multipart {
            self.notifier.show_busy(&busy);
        }
        let result = request(&self.client, &self.schema, &payload);
        if multipart {
            self.notifier.hide_busy();
        }
        result.or_else(|e| self.fail(e))
    }

    fn refresh(&mut self) {
        if !self.schema.supports(Operation::List) {
            return;
        }
        if let Err(e) = self.list() {
            warn!("Refresh of {} failed: {e}", self.schema.name);
        }
    }

    fn check(&mut self, mode: Mode) -> Result<(), AdminError> {
        let report = validate(&self.schema, &self.draft, mode);
        if report.is_empty() {
            Ok(())
        } else {
            self.fail(AdminError::Validation { report })
        }
    }

    fn check_entry(&mut self, spec: &NestedSpec, entry: &NestedEntry, mode: Mode) -> Result<(), AdminError> {
        let report = validate_entry(spec, entry, mode);
        if report.is_empty() {
            Ok(())
        } else {
            self.fail(AdminError::Validation { report })
        }
    }

    fn ensure(&mut self, operation: Operation) -> Result<(), AdminError> {
        if self.schema.supports(operation) {
            Ok(())
        } else {
            self.fail(AdminError::Unsupported { resource: self.schema.name.clone(), operation })
        }
    }

    fn ensure_unlocked(&mut self) -> Result<(), AdminError> {
        if self.inputs_locked() {
            return self.fail(AdminError::AlreadyExists { resource: self.schema.label.clone() });
        }
        Ok(())
    }

    fn field_spec(&mut self, name: &str) -> Result<FieldSpec, AdminError> {
        match self.schema.field(name).cloned() {
            Some(spec) => Ok(spec),
            None => self.fail(AdminError::UnknownField {
                resource: self.schema.name.clone(),
                field: name.to_string(),
            }),
        }
    }

    fn list_spec(&mut self, name: &str) -> Result<FieldSpec, AdminError> {
        let spec = self.field_spec(name)?;
        if spec.kind != FieldKind::List {
            return self.fail(AdminError::WrongKind { field: spec.name, kind: spec.kind });
        }
        Ok(spec)
    }

    fn list_items(&self, name: &str) -> Vec<String> {
        self.draft.fields.get(name).map(|v| v.items().to_vec()).unwrap_or_default()
    }

    fn nested_spec(&mut self, collection: &str) -> Result<NestedSpec, AdminError> {
        match self.schema.nested_spec(collection).cloned() {
            Some(spec) => Ok(spec),
            None => self.fail(AdminError::UnknownField {
                resource: self.schema.name.clone(),
                field: collection.to_string(),
            }),
        }
    }

    /// Logs and shows the failure, then hands it back to the caller. The
    /// draft is left untouched so the user can retry.
    fn fail<T>(&mut self, err: AdminError) -> Result<T, AdminError> {
        match &err {
            AdminError::Transport(_) | AdminError::Server { .. } | AdminError::Duplicate { .. } | AdminError::Decode(_) => {
                error!("{}: {err}", self.schema.name)
            }
            _ => warn!("{}: {err}", self.schema.name),
        }
        self.notifier.notify(Notice::from(&err));
        Err(err)
    }
}

/// Copies a stored record into a draft. File fields keep their URLs, which
/// are shown as previews and never re-uploaded.
pub fn draft_from_record(schema: &ResourceSchema, record: &Record) -> Draft {
    let mut nested = BTreeMap::new();
    for spec in &schema.nested {
        let entries = match record.get(&spec.name) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_object)
                .map(|object| NestedEntry { fields: fields_from_json(&spec.fields, object) })
                .collect(),
            _ => Vec::new(),
        };
        nested.insert(spec.name.clone(), entries);
    }
    Draft {
        fields: fields_from_json(&schema.fields, &record.fields),
        nested,
    }
}

fn fields_from_json(specs: &[FieldSpec], object: &Map<String, Value>) -> Fields {
    specs
        .iter()
        .filter_map(|spec| {
            let value = object.get(&spec.name)?;
            let field = match spec.kind {
                FieldKind::Text | FieldKind::Number => FieldValue::Text(scalar_text(value)?),
                FieldKind::Reference => FieldValue::Text(reference_id(value)?),
                FieldKind::List => FieldValue::List(strings(value)),
                FieldKind::File | FieldKind::Files => {
                    FieldValue::Files(strings(value).into_iter().map(FileRef::Remote).collect())
                }
            };
            Some((spec.name.clone(), field))
        })
        .collect()
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(_) | Value::Bool(_) => Some(value.to_string()),
        _ => None,
    }
}

/// A reference comes back either as the bare id or as the populated record.
fn reference_id(value: &Value) -> Option<String> {
    match value {
        Value::Object(object) => object.get("_id").and_then(scalar_text),
        other => scalar_text(other),
    }
}

fn strings(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(scalar_text).collect(),
        other => scalar_text(other).into_iter().collect(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagChange {
    Show,
    Flip,
    Set(bool),
}

/// Reads or writes a site flag and reports the resulting value.
pub fn toggle_flag<C, N>(client: &C, notifier: &mut N, flag: &FlagSpec, change: FlagChange) -> Result<bool, AdminError>
where
    C: RemoteClient + ?Sized,
    N: Notifier + ?Sized,
{
    let result = match change {
        FlagChange::Show => client.read_flag(flag),
        FlagChange::Flip => client.read_flag(flag).and_then(|current| {
            client.write_flag(flag, !current)?;
            Ok(!current)
        }),
        FlagChange::Set(value) => client.write_flag(flag, value).map(|_| value),
    };
    match result {
        Ok(value) => {
            let state = if value { "on" } else { "off" };
            info!("{} is {state}", flag.name);
            let notice = match change {
                FlagChange::Show => Notice::info(flag.label.clone(), format!("currently {state}")),
                _ => Notice::success("Updated!", format!("{} turned {state}.", flag.label)),
            };
            notifier.notify(notice);
            Ok(value)
        }
        Err(e) => {
            error!("{}: {e}", flag.name);
            notifier.notify(Notice::from(&e));
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::schema::Registry;
    use serde_json::json;

    /// Backend that is never reached in these tests.
    struct Offline;

    impl RemoteClient for Offline {
        fn list(&self, _: &ResourceSchema) -> Result<Vec<Record>, AdminError> {
            Ok(Vec::new())
        }
        fn create(&self, _: &ResourceSchema, _: &Payload) -> Result<(), AdminError> {
            Err(AdminError::Server { status: 503, message: None })
        }
        fn update(&self, _: &ResourceSchema, _: &str, _: &Payload) -> Result<(), AdminError> {
            Err(AdminError::Server { status: 503, message: None })
        }
        fn delete(&self, _: &ResourceSchema, _: &str) -> Result<(), AdminError> {
            Err(AdminError::Server { status: 503, message: None })
        }
        fn read_flag(&self, _: &FlagSpec) -> Result<bool, AdminError> {
            Ok(false)
        }
        fn write_flag(&self, _: &FlagSpec, _: bool) -> Result<(), AdminError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct Silent {
        notices: Vec<Notice>,
    }

    impl Notifier for Silent {
        fn confirm_destructive(&mut self, _: &str) -> bool {
            true
        }
        fn notify(&mut self, notice: Notice) {
            self.notices.push(notice);
        }
        fn show_busy(&mut self, _: &str) {}
        fn hide_busy(&mut self) {}
    }

    fn controller(name: &str) -> CrudController<Offline, Silent> {
        let registry = Registry::builtin().expect("registry");
        let schema = registry.resource(name).expect("resource").clone();
        CrudController::new(schema, Offline, Silent::default())
    }

    fn record(id: &str, fields: Value) -> Record {
        Record::new(id, fields.as_object().cloned().unwrap_or_default())
    }

    #[test]
    fn edit_copies_fields_and_keeps_file_urls() {
        let registry = Registry::builtin().unwrap();
        let blogs = registry.resource("blogs").unwrap();
        let stored = record("b1", json!({
            "title": "Pickles",
            "blogImage": "https://cdn/blog.png",
            "recipes": [{"recipeName": "Mango", "ingredients": ["Mango", "Salt"], "image": "https://cdn/r.png"}]
        }));
        let draft = draft_from_record(blogs, &stored);
        assert_eq!(draft.text("title"), "Pickles");
        assert_eq!(draft.fields["blogImage"].files(), &[FileRef::Remote("https://cdn/blog.png".into())]);
        let recipe = &draft.entries("recipes")[0];
        assert_eq!(recipe.fields["ingredients"].items(), &["Mango".to_string(), "Salt".to_string()]);
        assert!(!recipe.fields["image"].files()[0].is_local());
    }

    #[test]
    fn failed_create_keeps_the_draft() {
        let mut faq = controller("faq");
        assert!(faq.set_field("que", "What is this?").unwrap());
        assert!(faq.set_field("ans", "An agro product site.").unwrap());
        assert!(faq.submit_create().is_err());
        assert_eq!(faq.draft().text("que"), "What is this?");
        assert_eq!(faq.notifier().notices.last().map(|n| n.message.as_str()), Some("Something went wrong. Please try again."));
    }

    #[test]
    fn wrong_kinds_and_unknown_fields_are_refused() {
        let mut products = controller("products");
        assert!(matches!(products.set_field("productSizes", "250g"), Err(AdminError::WrongKind { .. })));
        assert!(matches!(products.attach_file("productName", "a.png"), Err(AdminError::WrongKind { .. })));
        assert!(matches!(products.set_field("price", "10"), Err(AdminError::UnknownField { .. })));
    }

    #[test]
    fn list_items_and_inputs() {
        let mut products = controller("products");
        assert_eq!(products.add_list_item("productSizes").unwrap(), 0);
        assert!(products.add_list_item("productSizes").is_err());
        products.set_input("productSizes", "250g").unwrap();
        products.set_input("productSizes", "500g").unwrap();
        assert_eq!(products.draft().fields["productSizes"].items(), &["250g".to_string(), "500g".to_string()]);

        products.set_input("productImages", "one.png").unwrap();
        products.set_input("productImages", "two.png").unwrap();
        assert_eq!(products.draft().fields["productImages"].files().len(), 2);
    }

    #[test]
    fn nested_entries_are_capped_and_merged() {
        let mut extras = controller("extrasubproducts");
        let entry = NestedEntry::new()
            .with_text("subproductName", "Lemon")
            .with_text("description", "Sour")
            .with_text("weight", "200g")
            .with_file("subproductImg", FileRef::Local("lemon.png".into()));
        assert_eq!(extras.add_nested("extrasubproducts", entry.clone()).unwrap(), 0);
        assert!(matches!(
            extras.add_nested("extrasubproducts", entry),
            Err(AdminError::TooManyEntries { max: 1, .. })
        ));

        let renamed = NestedEntry::new()
            .with_text("subproductName", "Lime")
            .with_text("description", "Sour")
            .with_text("weight", "200g");
        extras.replace_nested("extrasubproducts", 0, renamed).unwrap();
        let stored = &extras.draft().entries("extrasubproducts")[0];
        assert_eq!(stored.text("subproductName"), "Lime");
        assert_eq!(stored.fields["subproductImg"].files(), &[FileRef::Local("lemon.png".into())]);

        assert_eq!(extras.remove_nested("extrasubproducts", 0).unwrap(), Removal::Deleted);
        assert!(extras.draft().entries("extrasubproducts").is_empty());
    }

    #[test]
    fn nested_list_items_wait_for_blanks() {
        let mut products = controller("products");
        products.add_nested("recipes", NestedEntry::new()
            .with_text("recipeName", "Chutney")
            .with_list("steps", ["Chop"])
            .with_file("recipeMainImg", FileRef::Local("main.png".into()))
            .with_file("recipeSubImg", FileRef::Local("sub.png".into())))
            .unwrap();
        products.add_nested_list_item("recipes", 0, "steps").unwrap();
        assert!(matches!(
            products.add_nested_list_item("recipes", 0, "steps"),
            Err(AdminError::IncompleteEntry { .. })
        ));
    }

    #[test]
    fn unsupported_operations_fail_early() {
        let mut heading = controller("heading");
        assert!(matches!(heading.list(), Err(AdminError::Unsupported { operation: Operation::List, .. })));
        let mut counter = controller("counter");
        assert!(matches!(counter.remove("c1"), Err(AdminError::Unsupported { .. })));
    }

    #[test]
    fn flags_flip_and_set() {
        let registry = Registry::builtin().unwrap();
        let flag = registry.flag("view-more").unwrap();
        let mut notifier = Silent::default();
        assert!(toggle_flag(&Offline, &mut notifier, flag, FlagChange::Flip).unwrap());
        assert!(!toggle_flag(&Offline, &mut notifier, flag, FlagChange::Set(false)).unwrap());
        assert!(!toggle_flag(&Offline, &mut notifier, flag, FlagChange::Show).unwrap());
        assert_eq!(notifier.notices.len(), 3);
    }
}
