use derive_more::{Display, Error, From};
use crate::modules::schema::{FieldKind, Operation};
use crate::modules::validator::ValidationReport;

#[derive(Debug, Display, Error, From)]
pub enum AdminError {
    #[display("{report}")]
    Validation { report: ValidationReport },

    #[display("{resource} already exists, edit the existing entry instead")]
    AlreadyExists { resource: String },

    #[display("complete the current {field} entry before adding another")]
    IncompleteEntry { field: String },

    #[display("{field} accepts at most {max} words")]
    TooManyWords { field: String, max: usize },

    #[display("{collection} holds at most {max} entries")]
    TooManyEntries { collection: String, max: usize },

    #[display("no {collection} entry at position {index}")]
    NoSuchEntry { collection: String, index: usize },

    #[display("no {resource} record with id {id}")]
    NoSuchRecord { resource: String, id: String },

    #[display("duplicate entry: {message}")]
    Duplicate { message: String },

    #[display("server answered with status {status}")]
    Server { status: u16, message: Option<String> },

    #[display("unexpected response shape from {resource}")]
    Envelope { resource: String },

    #[display("transport error: {_0}")]
    #[from]
    Transport(reqwest::Error),

    #[display("invalid JSON: {_0}")]
    #[from]
    Decode(serde_json::Error),

    #[display("io error: {_0}")]
    #[from]
    Io(std::io::Error),

    #[display("invalid TOML: {_0}")]
    #[from]
    TomlDe(toml::de::Error),

    #[display("cannot write TOML: {_0}")]
    #[from]
    TomlSer(toml::ser::Error),

    #[display("invalid URL: {_0}")]
    #[from]
    Url(url::ParseError),

    #[display("unknown resource `{name}`")]
    UnknownResource { name: String },

    #[display("{resource} has no field `{field}`")]
    UnknownField { resource: String, field: String },

    #[display("`{field}` is a {kind} field")]
    WrongKind { field: String, kind: FieldKind },

    #[display("{resource} does not support {operation}")]
    Unsupported { resource: String, operation: Operation },

    #[display("no record is being edited")]
    NotEditing,

    #[display("record {id} is being edited, update it or cancel the edit first")]
    StillEditing { id: String },

    #[display("not logged in, run `siteadmin login` first")]
    NotLoggedIn,

    #[display("Invalid E-mail Or Password.")]
    InvalidCredentials,

    #[display("configuration error: {message}")]
    Config { message: String },
}

impl AdminError {
    /// Message the backend put in its error body, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            AdminError::Server { message, .. } => message.as_deref(),
            AdminError::Duplicate { message } => Some(message),
            _ => None,
        }
    }
}
