//! tsdash Core Library
//!
//! Shared pieces of the Typesense dashboard:
//! - Connection parameters and their validation
//! - Connection persistence backends
//! - Dashboard configuration
//! - Typesense REST wire models
//! - The `{ok, data | error}` result envelope

pub mod config;
pub mod connection;
pub mod models;
pub mod result;
pub mod store;

// Re-export commonly used types
pub use config::Config;
pub use connection::{
    ConnectionConfig, ConnectionField, ConnectionForm, FieldError, PortInput, Protocol,
    ValidationErrors,
};
pub use models::*;
pub use result::RequestResult;
pub use store::{ConnectionStore, FileStore, MemoryStore, StoreError};
