//! Client-side view of the hosted table service.
//!
//! Everything that talks to the remote backend goes through the traits in
//! this module so callers can be handed either the HTTP client or the
//! in-memory fake.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use utoipa::ToSchema;

pub mod listen;
pub mod memory;
pub mod query;
pub mod rest;

pub use query::{Filter, JoinExpr, OrderBy, SelectQuery, TableOptions};

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Could not decode row: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Row not found")]
    NotFound,

    #[error("Invalid identifier {0:?}")]
    InvalidIdentifier(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl RemoteError {
    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteError::Status { status, .. } => Some(*status),
            RemoteError::NotFound => Some(404),
            _ => None,
        }
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Table names, column names and embed targets end up in URLs and SQL, so
/// only plain identifiers are accepted.
pub fn ensure_identifier(name: &str) -> RemoteResult<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(RemoteError::InvalidIdentifier(name.to_string()))
    }
}

/// Row-level access to named remote tables.
///
/// Rows travel as JSON objects; typing happens in the hooks.
#[async_trait]
pub trait TableService: Send + Sync {
    async fn select(&self, query: &SelectQuery) -> RemoteResult<Vec<Value>>;

    async fn select_by_id(&self, table: &str, id: &str) -> RemoteResult<Option<Value>>;

    /// Inserts every row in a single request and returns the stored rows,
    /// server-generated columns included.
    async fn insert(&self, table: &str, rows: Vec<Value>) -> RemoteResult<Vec<Value>>;

    /// Applies a partial update. Columns missing from `patch` are untouched.
    async fn update(&self, table: &str, id: &str, patch: Value) -> RemoteResult<Value>;

    async fn delete(&self, table: &str, id: &str) -> RemoteResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChangeEvent {
    pub table: String,
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub record_id: Option<String>,
}

/// Events for one table. Dropping the stream unsubscribes.
pub struct ChangeStream {
    rx: mpsc::UnboundedReceiver<ChangeEvent>,
    pump: Option<JoinHandle<()>>,
}

impl ChangeStream {
    pub fn new(rx: mpsc::UnboundedReceiver<ChangeEvent>, pump: Option<JoinHandle<()>>) -> Self {
        Self { rx, pump }
    }

    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.rx.recv().await
    }
}

impl Drop for ChangeStream {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn subscribe(&self, table: &str) -> RemoteResult<ChangeStream>;
}
