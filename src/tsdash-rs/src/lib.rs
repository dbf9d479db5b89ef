//! tsdash Client Library
//!
//! HTTP client for the Typesense REST API as used by the dashboard.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tsdash_core::{MemoryStore, SearchParams};
//! use tsdash_rs::ClientProvider;
//!
//! # async fn run() -> tsdash_rs::Result<()> {
//! let provider = ClientProvider::new(Arc::new(MemoryStore::new()));
//! let client = provider.get_client().await?;
//! let result = client.search("books", &SearchParams::new("dune", "title")).await?;
//! println!("{} hits", result.found);
//! # Ok(())
//! # }
//! ```

mod client;
mod jsonl;
mod provider;
mod request;

pub use client::{test_connection, TypesenseClient, API_KEY_HEADER, CONNECTION_TEST_TIMEOUT};
pub use jsonl::{parse_jsonl, to_jsonl};
pub use provider::ClientProvider;
pub use request::{ApiRequest, RequestBody, RequestOptions};
pub use tsdash_core::{ConnectionConfig, RequestResult};

use tsdash_core::{StoreError, ValidationErrors};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("not connected: no Typesense server configured")]
    NotConnected,

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status}: {message}")]
    Server { status: u16, message: String },

    #[error("invalid JSON in response: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid JSON on line {line}: {source}")]
    Jsonl {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid URL: {0}")]
    Url(String),

    #[error("{0}")]
    Logic(String),

    #[error("connection store failed: {0}")]
    Store(#[from] StoreError),
}

/// Coarse classification used at the HTTP boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotConnected,
    Transport,
    Status(u16),
    Parse,
    Logic,
    Internal,
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Validation(_) | ClientError::Url(_) => ErrorKind::Validation,
            ClientError::NotConnected => ErrorKind::NotConnected,
            ClientError::Request(_) => ErrorKind::Transport,
            ClientError::Server { status, .. } => ErrorKind::Status(*status),
            ClientError::Serialization(_) | ClientError::Jsonl { .. } => ErrorKind::Parse,
            ClientError::Logic(_) => ErrorKind::Logic,
            ClientError::Store(_) => ErrorKind::Internal,
        }
    }

    /// HTTP status reported by the search server, if it answered
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
