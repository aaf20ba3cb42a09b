use std::path::PathBuf;
use std::time::Duration;
use log::{debug, error, info, warn};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::blocking::multipart::Form;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::{Map, Value};
use url::Url;
use crate::modules::errors::AdminError;
use crate::modules::schema::{BodyShape, Envelope, FieldKind, FieldSpec, FlagSpec, NestedSpec, ResourceSchema};
use crate::modules::types::{Draft, FieldValue, FileRef, Fields, NestedEntry, Record};

/// Error texts the backend uses for unique-key clashes.
const DUPLICATE_MARKERS: [&str; 2] = ["already exists", "duplicate key"];

#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text { name: String, value: String },
    File { name: String, path: PathBuf },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Multipart(Vec<Part>),
}

impl Payload {
    pub fn is_multipart(&self) -> bool {
        matches!(self, Payload::Multipart(_))
    }
}

pub trait RemoteClient {
    fn list(&self, schema: &ResourceSchema) -> Result<Vec<Record>, AdminError>;
    fn create(&self, schema: &ResourceSchema, payload: &Payload) -> Result<(), AdminError>;
    fn update(&self, schema: &ResourceSchema, id: &str, payload: &Payload) -> Result<(), AdminError>;
    fn delete(&self, schema: &ResourceSchema, id: &str) -> Result<(), AdminError>;
    fn read_flag(&self, flag: &FlagSpec) -> Result<bool, AdminError>;
    fn write_flag(&self, flag: &FlagSpec, value: bool) -> Result<(), AdminError>;
}

impl<T: RemoteClient + ?Sized> RemoteClient for &T {
    fn list(&self, schema: &ResourceSchema) -> Result<Vec<Record>, AdminError> {
        (**self).list(schema)
    }

    fn create(&self, schema: &ResourceSchema, payload: &Payload) -> Result<(), AdminError> {
        (**self).create(schema, payload)
    }

    fn update(&self, schema: &ResourceSchema, id: &str, payload: &Payload) -> Result<(), AdminError> {
        (**self).update(schema, id, payload)
    }

    fn delete(&self, schema: &ResourceSchema, id: &str) -> Result<(), AdminError> {
        (**self).delete(schema, id)
    }

    fn read_flag(&self, flag: &FlagSpec) -> Result<bool, AdminError> {
        (**self).read_flag(flag)
    }

    fn write_flag(&self, flag: &FlagSpec, value: bool) -> Result<(), AdminError> {
        (**self).write_flag(flag, value)
    }
}

/// Single-attempt blocking client against one backend origin.
pub struct HttpClient {
    base: Url,
    client: Client,
}

impl HttpClient {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, AdminError> {
        let base = Url::parse(base_url)?;
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(concat!("siteadmin/", env!("CARGO_PKG_VERSION"))));
        let mut builder = Client::builder()
            .cookie_store(true)
            .default_headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            base,
            client: builder.build()?,
        })
    }

    fn url(&self, path: &str, id: Option<&str>) -> Result<Url, AdminError> {
        endpoint_url(&self.base, path, id)
    }

    fn send(&self, request: RequestBuilder) -> Result<String, AdminError> {
        let response = request.send().map_err(|e| {
            error!("Request failed: {e}");
            AdminError::from(e)
        })?;
        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            error!("Backend answered {status}: {body}");
            return Err(server_error(status.as_u16(), &body));
        }
        debug!("Backend answered {status}");
        Ok(body)
    }
}

impl RemoteClient for HttpClient {
    fn list(&self, schema: &ResourceSchema) -> Result<Vec<Record>, AdminError> {
        let url = self.url(&schema.endpoint, None)?;
        info!("GET {url}");
        let body = self.send(self.client.get(url))?;
        decode_records(schema, serde_json::from_str(&body)?)
    }

    fn create(&self, schema: &ResourceSchema, payload: &Payload) -> Result<(), AdminError> {
        let url = self.url(&schema.create_endpoint(), None)?;
        info!("POST {url}");
        self.send(attach(self.client.post(url), payload)?)?;
        Ok(())
    }

    fn update(&self, schema: &ResourceSchema, id: &str, payload: &Payload) -> Result<(), AdminError> {
        let url = self.url(&schema.endpoint, Some(id))?;
        info!("PUT {url}");
        self.send(attach(self.client.put(url), payload)?)?;
        Ok(())
    }

    fn delete(&self, schema: &ResourceSchema, id: &str) -> Result<(), AdminError> {
        let url = self.url(&schema.endpoint, Some(id))?;
        info!("DELETE {url}");
        self.send(self.client.delete(url))?;
        Ok(())
    }

    fn read_flag(&self, flag: &FlagSpec) -> Result<bool, AdminError> {
        let url = self.url(&flag.path, None)?;
        info!("GET {url}");
        let body: Value = serde_json::from_str(&self.send(self.client.get(url))?)?;
        body.get(&flag.key)
            .and_then(Value::as_bool)
            .ok_or_else(|| AdminError::Envelope { resource: flag.name.clone() })
    }

    fn write_flag(&self, flag: &FlagSpec, value: bool) -> Result<(), AdminError> {
        let url = self.url(&flag.path, None)?;
        info!("POST {url} {}={value}", flag.key);
        let mut body = Map::new();
        body.insert(flag.key.clone(), Value::Bool(value));
        self.send(self.client.post(url).json(&body))?;
        Ok(())
    }
}

fn attach(request: RequestBuilder, payload: &Payload) -> Result<RequestBuilder, AdminError> {
    match payload {
        Payload::Json(body) => Ok(request.json(body)),
        Payload::Multipart(parts) => {
            let mut form = Form::new();
            for part in parts {
                form = match part {
                    Part::Text { name, value } => form.text(name.clone(), value.clone()),
                    Part::File { name, path } => form.file(name.clone(), path)?,
                };
            }
            Ok(request.multipart(form))
        }
    }
}

/// Appends `path` (and `id`) as segments below the base URL's own path.
pub fn endpoint_url(base: &Url, path: &str, id: Option<&str>) -> Result<Url, AdminError> {
    let mut url = base.clone();
    {
        let mut segments = url.path_segments_mut().map_err(|_| AdminError::Config {
            message: format!("{base} cannot be used as a base URL"),
        })?;
        segments.pop_if_empty();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            segments.push(segment);
        }
        if let Some(id) = id {
            segments.push(id);
        }
    }
    Ok(url)
}

/// Maps a failed response body onto the error taxonomy.
pub fn server_error(status: u16, body: &str) -> AdminError {
    let message = serde_json::from_str::<Value>(body).ok().and_then(|value| {
        ["message", "error"]
            .iter()
            .find_map(|key| value.get(key).and_then(Value::as_str).map(str::to_string))
    });
    match message {
        Some(message) if DUPLICATE_MARKERS.iter().any(|marker| message.contains(marker)) => {
            AdminError::Duplicate { message }
        }
        message => AdminError::Server { status, message },
    }
}

/// Unwraps the resource's envelope and shape into records.
pub fn decode_records(schema: &ResourceSchema, body: Value) -> Result<Vec<Record>, AdminError> {
    let shape_error = || AdminError::Envelope { resource: schema.name.clone() };
    let items = match &schema.envelope {
        Envelope::Bare => body,
        Envelope::Field { key } => body.get(key).cloned().unwrap_or(Value::Null),
    };
    let Value::Array(items) = items else {
        return Err(shape_error());
    };

    let mut records: Vec<Record> = items
        .into_iter()
        .enumerate()
        .filter_map(|(position, item)| {
            let record = match item {
                Value::Object(map) => record_from_map(schema, map),
                _ => None,
            };
            if record.is_none() {
                warn!("Skipping {} row {position}: no usable {}", schema.name, schema.id_field);
            }
            record
        })
        .collect();

    if let Some(key) = &schema.sort_by {
        records.sort_by(|a, b| a.text(key).cmp(&b.text(key)));
    }
    Ok(records)
}

fn record_from_map(schema: &ResourceSchema, mut map: Map<String, Value>) -> Option<Record> {
    let id = match map.remove(&schema.id_field)? {
        Value::String(id) => id,
        Value::Number(id) => id.to_string(),
        _ => return None,
    };
    let fields = match &schema.shape {
        BodyShape::Flat => map,
        BodyShape::Wrapped { key } => {
            let mut fields = match map.remove(key) {
                Some(Value::Array(values)) => match values.into_iter().next() {
                    Some(Value::Object(inner)) => inner,
                    _ => Map::new(),
                },
                _ => Map::new(),
            };
            for (name, value) in map {
                fields.entry(name).or_insert(value);
            }
            fields
        }
    };
    Some(Record::new(id, fields))
}

/// JSON for resources without files, multipart otherwise. Stored files
/// (remote references) are never re-sent as parts.
pub fn build_payload(schema: &ResourceSchema, draft: &Draft) -> Payload {
    if schema.has_files() {
        Payload::Multipart(multipart_parts(schema, draft))
    } else {
        let body = json_fields(&schema.fields, &draft.fields);
        let body = nest_collections(schema, draft, body);
        Payload::Json(match &schema.shape {
            BodyShape::Flat => Value::Object(body),
            BodyShape::Wrapped { key } => {
                let mut wrapper = Map::new();
                wrapper.insert(key.clone(), Value::Array(vec![Value::Object(body)]));
                Value::Object(wrapper)
            }
        })
    }
}

fn multipart_parts(schema: &ResourceSchema, draft: &Draft) -> Vec<Part> {
    let mut parts = Vec::new();
    for spec in &schema.fields {
        let Some(value) = draft.fields.get(&spec.name) else {
            continue;
        };
        if spec.kind.is_file() {
            parts.extend(local_files(value).map(|path| Part::File {
                name: spec.name.clone(),
                path,
            }));
        } else if let Some(json) = field_json(spec, value) {
            let text = match json {
                Value::String(text) => text,
                other => other.to_string(),
            };
            parts.push(Part::Text {
                name: spec.name.clone(),
                value: text,
            });
        }
    }

    for nested in &schema.nested {
        let entries = draft.entries(&nested.name);
        let array: Vec<Value> = entries.iter().map(|e| entry_json(nested, e)).collect();
        parts.push(Part::Text {
            name: nested.name.clone(),
            value: Value::Array(array).to_string(),
        });
        for (index, entry) in entries.iter().enumerate() {
            for spec in nested.fields.iter().filter(|f| f.kind.is_file()) {
                let Some(value) = entry.fields.get(&spec.name) else {
                    continue;
                };
                parts.extend(local_files(value).map(|path| Part::File {
                    name: nested.file_key(&spec.name, index),
                    path,
                }));
            }
        }
    }
    parts
}

fn local_files(value: &FieldValue) -> impl Iterator<Item = PathBuf> + '_ {
    value.files().iter().filter_map(|file| match file {
        FileRef::Local(path) => Some(path.clone()),
        FileRef::Remote(_) => None,
    })
}

fn json_fields(specs: &[FieldSpec], fields: &Fields) -> Map<String, Value> {
    specs
        .iter()
        .filter(|spec| !spec.kind.is_file())
        .filter_map(|spec| {
            let value = fields.get(&spec.name)?;
            field_json(spec, value).map(|json| (spec.name.clone(), json))
        })
        .collect()
}

fn nest_collections(schema: &ResourceSchema, draft: &Draft, mut body: Map<String, Value>) -> Map<String, Value> {
    for nested in &schema.nested {
        let array = draft.entries(&nested.name).iter().map(|e| entry_json(nested, e)).collect();
        body.insert(nested.name.clone(), Value::Array(array));
    }
    body
}

/// Entry as it appears inside the parent's JSON. Already-stored files keep
/// their URL so the backend can tell them apart from fresh uploads.
fn entry_json(spec: &NestedSpec, entry: &NestedEntry) -> Value {
    let mut object = json_fields(&spec.fields, &entry.fields);
    for file_spec in spec.fields.iter().filter(|f| f.kind.is_file()) {
        let Some(value) = entry.fields.get(&file_spec.name) else {
            continue;
        };
        let urls: Vec<Value> = value
            .files()
            .iter()
            .filter_map(|file| match file {
                FileRef::Remote(url) => Some(Value::String(url.clone())),
                FileRef::Local(_) => None,
            })
            .collect();
        match (file_spec.kind, urls.len()) {
            (_, 0) => {}
            (FieldKind::File, _) => {
                object.insert(file_spec.name.clone(), urls[0].clone());
            }
            _ => {
                object.insert(file_spec.name.clone(), Value::Array(urls));
            }
        }
    }
    Value::Object(object)
}

/// Text, numbers and references go out exactly as entered.
fn field_json(spec: &FieldSpec, value: &FieldValue) -> Option<Value> {
    match (spec.kind, value) {
        (FieldKind::List, FieldValue::List(items)) => Some(Value::Array(
            items
                .iter()
                .filter(|item| !item.trim().is_empty())
                .map(|item| Value::String(item.clone()))
                .collect(),
        )),
        (FieldKind::Text | FieldKind::Number | FieldKind::Reference, FieldValue::Text(text)) => {
            Some(Value::String(text.clone()))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::schema::Registry;
    use serde_json::json;

    fn registry() -> Registry {
        Registry::builtin().expect("registry")
    }

    fn text(value: &str) -> FieldValue {
        FieldValue::Text(value.to_string())
    }

    #[test]
    fn endpoint_url_keeps_base_path_and_escapes_ids() {
        let base = Url::parse("https://backend.example.com/v1").unwrap();
        let url = endpoint_url(&base, "/api/products", Some("a b")).unwrap();
        assert_eq!(url.as_str(), "https://backend.example.com/v1/api/products/a%20b");

        let root = Url::parse("https://backend.example.com").unwrap();
        assert_eq!(
            endpoint_url(&root, "/faq", None).unwrap().as_str(),
            "https://backend.example.com/faq"
        );
    }

    #[test]
    fn data_envelope_is_unwrapped() {
        let registry = registry();
        let faq = registry.resource("faq").unwrap();
        let body = json!({"data": [{"_id": "f1", "que": "Why?", "ans": "Because."}]});
        let records = decode_records(faq, body).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "f1");
        assert_eq!(records[0].text("ans").as_deref(), Some("Because."));

        let err = decode_records(faq, json!([{"_id": "f1"}])).unwrap_err();
        assert!(matches!(err, AdminError::Envelope { .. }));
    }

    #[test]
    fn rows_without_ids_are_skipped() {
        let registry = registry();
        let faq = registry.resource("faq").unwrap();
        let body = json!({"data": [
            {"que": "Lost?", "ans": "No id."},
            "not a row",
            {"_id": "f2", "que": "Kept?", "ans": "Yes."}
        ]});
        let records = decode_records(faq, body).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "f2");
    }

    #[test]
    fn wrapped_rows_are_flattened() {
        let registry = registry();
        let counter = registry.resource("counter").unwrap();
        let body = json!([{"_id": "c1", "value": [{"customers": 10, "products": 5, "countries": 2}]}]);
        let records = decode_records(counter, body).unwrap();
        assert_eq!(records[0].id, "c1");
        assert_eq!(records[0].text("countries").as_deref(), Some("2"));
        assert!(records[0].get("value").is_none());
    }

    #[test]
    fn sorted_resources_come_back_oldest_first() {
        let registry = registry();
        let stories = registry.resource("ourstory").unwrap();
        let body = json!({"data": [
            {"_id": "b", "storypera": "later", "createdAt": "2024-05-02T10:00:00Z"},
            {"_id": "a", "storypera": "first", "createdAt": "2024-01-09T10:00:00Z"}
        ]});
        let ids: Vec<String> = decode_records(stories, body).unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn wrapped_json_body() {
        let registry = registry();
        let counter = registry.resource("counter").unwrap();
        let mut draft = Draft::default();
        draft.fields.insert("customers".into(), text("10"));
        draft.fields.insert("products".into(), text("1.50"));
        draft.fields.insert("countries".into(), text("2"));
        assert_eq!(
            build_payload(counter, &draft),
            Payload::Json(json!({"value": [{"customers": "10", "products": "1.50", "countries": "2"}]}))
        );
    }

    #[test]
    fn references_are_sent_as_ids() {
        let registry = registry();
        let heading = registry.resource("heading").unwrap();
        let mut draft = Draft::default();
        draft.fields.insert("productId".into(), text("p1"));
        draft.fields.insert("subproductTitle".into(), text("Pickles"));
        assert_eq!(
            build_payload(heading, &draft),
            Payload::Json(json!({"productId": "p1", "subproductTitle": "Pickles"}))
        );
    }

    #[test]
    fn multipart_keys_follow_entry_positions() {
        let registry = registry();
        let blogs = registry.resource("blogs").unwrap();
        let mut draft = Draft::default();
        draft.fields.insert("title".into(), text("Pickles"));
        draft.fields.insert(
            "blogImage".into(),
            FieldValue::Files(vec![FileRef::Remote("https://cdn/blog.png".into())]),
        );
        draft.fields.insert(
            "blogBanner".into(),
            FieldValue::Files(vec![FileRef::Local("banner.png".into())]),
        );
        draft.nested.insert(
            "recipes".into(),
            vec![
                NestedEntry::new()
                    .with_text("recipeName", "Old")
                    .with_file("image", FileRef::Remote("https://cdn/old.png".into())),
                NestedEntry::new()
                    .with_text("recipeName", "New")
                    .with_file("image", FileRef::Local("new.png".into())),
            ],
        );

        let Payload::Multipart(parts) = build_payload(blogs, &draft) else {
            panic!("blogs carry files");
        };
        assert!(parts.contains(&Part::Text { name: "title".into(), value: "Pickles".into() }));
        assert!(parts.contains(&Part::File { name: "blogBanner".into(), path: "banner.png".into() }));
        assert!(parts.contains(&Part::File { name: "recipeImage_1".into(), path: "new.png".into() }));
        assert!(!parts.iter().any(|p| matches!(p, Part::File { name, .. } if name == "blogImage" || name == "recipeImage_0")));

        let recipes = parts
            .iter()
            .find_map(|p| match p {
                Part::Text { name, value } if name == "recipes" => Some(value.clone()),
                _ => None,
            })
            .expect("recipes part");
        let recipes: Value = serde_json::from_str(&recipes).unwrap();
        assert_eq!(recipes[0]["image"], json!("https://cdn/old.png"));
        assert!(recipes[1].get("image").is_none());
    }

    #[test]
    fn error_bodies_map_to_taxonomy() {
        assert!(matches!(
            server_error(400, r#"{"error":"E11000 duplicate key error"}"#),
            AdminError::Duplicate { .. }
        ));
        let err = server_error(422, r#"{"message":"Question too long"}"#);
        assert_eq!(err.server_message(), Some("Question too long"));
        assert!(matches!(server_error(502, "<html>bad gateway</html>"), AdminError::Server { status: 502, message: None }));
    }
}
