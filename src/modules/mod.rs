pub mod client;
pub mod controller;
pub mod errors;
pub mod notify;
pub mod schema;
pub mod serialize;
pub mod session;
pub mod table;
pub mod types;
pub mod validator;
