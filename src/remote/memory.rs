//! In-process stand-in for the hosted service. Used by the test-suite and
//! for running the server without a backend project.

use std::{
    cmp::Ordering,
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering as AtomicOrdering},
    },
};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use super::{
    ChangeEvent, ChangeFeed, ChangeKind, ChangeStream, RemoteError, RemoteResult, SelectQuery,
    TableService, ensure_identifier,
    query::{JoinExpr, Projection, parse_projection},
};
use crate::auth::{Actor, Session, SessionProvider};

type Tables = HashMap<String, Vec<Value>>;

struct Subscriber {
    table: String,
    tx: mpsc::UnboundedSender<ChangeEvent>,
}

struct Store {
    tables: Mutex<Tables>,
    selects: Mutex<HashMap<String, usize>>,
    unavailable: AtomicBool,
    subscribers: Mutex<Vec<Subscriber>>,
}

#[derive(Clone)]
pub struct MemoryService {
    store: Arc<Store>,
}

impl Default for MemoryService {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn row_id(row: &Value) -> Option<&str> {
    row.get("id").and_then(Value::as_str)
}

fn as_object(value: Value) -> RemoteResult<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(RemoteError::InvalidPayload(format!(
            "expected an object, got {other}"
        ))),
    }
}

/// Postgres ordering: nulls sort after everything else when ascending.
fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Bool(_) => 0,
            Value::Number(_) => 1,
            Value::String(_) => 2,
            Value::Array(_) | Value::Object(_) => 3,
            Value::Null => 4,
        }
    }
    let a = a.unwrap_or(&Value::Null);
    let b = b.unwrap_or(&Value::Null);
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

impl MemoryService {
    pub fn new() -> Self {
        Self {
            store: Arc::new(Store {
                tables: Mutex::new(HashMap::new()),
                selects: Mutex::new(HashMap::new()),
                unavailable: AtomicBool::new(false),
                subscribers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Loads rows as-is, without change notifications.
    pub fn seed(&self, table: &str, rows: Vec<Value>) {
        lock(&self.store.tables)
            .entry(table.to_string())
            .or_default()
            .extend(rows);
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        lock(&self.store.tables)
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of select queries served for `table`.
    pub fn select_count(&self, table: &str) -> usize {
        lock(&self.store.selects).get(table).copied().unwrap_or(0)
    }

    /// Makes every call fail as if the service were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.store
            .unavailable
            .store(unavailable, AtomicOrdering::SeqCst);
    }

    fn available(&self) -> RemoteResult<()> {
        if self.store.unavailable.load(AtomicOrdering::SeqCst) {
            return Err(RemoteError::Status {
                status: 503,
                message: "service unavailable".to_string(),
            });
        }
        Ok(())
    }

    /// Delivers one event to every subscriber of `table`. Subscribers whose
    /// stream was dropped are pruned here.
    fn notify(&self, table: &str, kind: ChangeKind, record_id: Option<String>) {
        let event = ChangeEvent {
            table: table.to_string(),
            kind,
            record_id,
        };
        lock(&self.store.subscribers)
            .retain(|sub| sub.table != table || sub.tx.send(event.clone()).is_ok());
    }

    fn embed(tables: &Tables, source: &str, row: &Value, join: &JoinExpr) -> Value {
        let key = join.foreign_key(source);
        let Some(target) = row.get(&key).filter(|v| !v.is_null()) else {
            return Value::Null;
        };
        let related = tables
            .get(&join.table)
            .and_then(|rows| rows.iter().find(|r| r.get("id") == Some(target)));
        match related {
            Some(related) => project_columns(related, &join.columns),
            None => Value::Null,
        }
    }

    fn project(
        tables: &Tables,
        source: &str,
        row: &Value,
        projection: &[Projection],
    ) -> Value {
        let mut out = Map::new();
        for item in projection {
            match item {
                Projection::All => {
                    if let Value::Object(fields) = row {
                        out.extend(fields.clone());
                    }
                }
                Projection::Column(column) => {
                    out.insert(
                        column.clone(),
                        row.get(column).cloned().unwrap_or(Value::Null),
                    );
                }
                Projection::Embed(join) => {
                    out.insert(
                        join.key().to_string(),
                        Self::embed(tables, source, row, join),
                    );
                }
            }
        }
        Value::Object(out)
    }
}

fn project_columns(row: &Value, columns: &[String]) -> Value {
    if columns.is_empty() || columns.iter().any(|c| c == "*") {
        return row.clone();
    }
    let fields = columns
        .iter()
        .map(|c| (c.clone(), row.get(c).cloned().unwrap_or(Value::Null)))
        .collect::<Map<_, _>>();
    Value::Object(fields)
}

#[async_trait]
impl TableService for MemoryService {
    async fn select(&self, query: &SelectQuery) -> RemoteResult<Vec<Value>> {
        self.available()?;
        *lock(&self.store.selects)
            .entry(query.table.clone())
            .or_default() += 1;

        let projection = parse_projection(&query.columns)?;
        let tables = lock(&self.store.tables);
        let mut rows = tables
            .get(&query.table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| query.filters.iter().all(|f| f.matches(row)))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let ordering = compare(a.get(&order.column), b.get(&order.column));
                if order.ascending {
                    ordering
                } else {
                    ordering.reverse()
                }
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }

        Ok(rows
            .iter()
            .map(|row| Self::project(&tables, &query.table, row, &projection))
            .collect())
    }

    async fn select_by_id(&self, table: &str, id: &str) -> RemoteResult<Option<Value>> {
        self.available()?;
        ensure_identifier(table)?;
        Ok(lock(&self.store.tables)
            .get(table)
            .and_then(|rows| rows.iter().find(|row| row_id(row) == Some(id)))
            .cloned())
    }

    async fn insert(&self, table: &str, rows: Vec<Value>) -> RemoteResult<Vec<Value>> {
        self.available()?;
        ensure_identifier(table)?;
        let now = Value::String(Utc::now().to_rfc3339());
        let mut stored = Vec::with_capacity(rows.len());
        for row in rows {
            let mut fields = as_object(row)?;
            fields
                .entry("id")
                .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
            fields
                .entry("created_at")
                .or_insert_with(|| now.clone());
            fields
                .entry("updated_at")
                .or_insert_with(|| now.clone());
            stored.push(Value::Object(fields));
        }

        lock(&self.store.tables)
            .entry(table.to_string())
            .or_default()
            .extend(stored.iter().cloned());
        for row in &stored {
            self.notify(table, ChangeKind::Insert, row_id(row).map(str::to_string));
        }
        Ok(stored)
    }

    async fn update(&self, table: &str, id: &str, patch: Value) -> RemoteResult<Value> {
        self.available()?;
        ensure_identifier(table)?;
        let patch = as_object(patch)?;
        let updated = {
            let mut tables = lock(&self.store.tables);
            let row = tables
                .get_mut(table)
                .and_then(|rows| rows.iter_mut().find(|row| row_id(row) == Some(id)))
                .ok_or(RemoteError::NotFound)?;
            if let Value::Object(fields) = row {
                let touched = patch.contains_key("updated_at");
                fields.extend(patch);
                if !touched {
                    fields.insert(
                        "updated_at".to_string(),
                        Value::String(Utc::now().to_rfc3339()),
                    );
                }
            }
            row.clone()
        };
        self.notify(table, ChangeKind::Update, Some(id.to_string()));
        Ok(updated)
    }

    async fn delete(&self, table: &str, id: &str) -> RemoteResult<()> {
        self.available()?;
        ensure_identifier(table)?;
        let removed = {
            let mut tables = lock(&self.store.tables);
            match tables.get_mut(table) {
                Some(rows) => {
                    let before = rows.len();
                    rows.retain(|row| row_id(row) != Some(id));
                    before != rows.len()
                }
                None => false,
            }
        };
        if removed {
            self.notify(table, ChangeKind::Delete, Some(id.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ChangeFeed for MemoryService {
    async fn subscribe(&self, table: &str) -> RemoteResult<ChangeStream> {
        ensure_identifier(table)?;
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.store.subscribers).push(Subscriber {
            table: table.to_string(),
            tx,
        });
        Ok(ChangeStream::new(rx, None))
    }
}

struct Account {
    email: String,
    password: String,
    actor: Actor,
}

struct Directory {
    accounts: Mutex<Vec<Account>>,
    tokens: Mutex<HashMap<String, Actor>>,
}

/// Session provider backed by a fixed account list. Tokens are random and
/// only valid within the process.
pub struct MemorySession {
    directory: Arc<Directory>,
    token: Mutex<Option<String>>,
    actor: watch::Sender<Option<Actor>>,
}

impl Default for MemorySession {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySession {
    pub fn new() -> Self {
        Self::with_directory(
            Arc::new(Directory {
                accounts: Mutex::new(Vec::new()),
                tokens: Mutex::new(HashMap::new()),
            }),
            None,
        )
    }

    fn with_directory(directory: Arc<Directory>, token: Option<String>) -> Self {
        let actor = token
            .as_ref()
            .and_then(|token| lock(&directory.tokens).get(token).cloned());
        let (sender, _) = watch::channel(actor);
        Self {
            directory,
            token: Mutex::new(token),
            actor: sender,
        }
    }

    pub fn add_account(&self, email: &str, password: &str, actor: Actor) {
        lock(&self.directory.accounts).push(Account {
            email: email.to_string(),
            password: password.to_string(),
            actor,
        });
    }

    /// Session sharing this directory, acting as the holder of `token`.
    pub fn scoped(&self, token: Option<&str>) -> Self {
        Self::with_directory(self.directory.clone(), token.map(str::to_string))
    }

    /// Session already signed in as `actor`, without credentials.
    pub fn signed_in_as(&self, actor: Actor) -> Self {
        let token = Uuid::new_v4().to_string();
        lock(&self.directory.tokens).insert(token.clone(), actor);
        self.scoped(Some(&token))
    }

    pub fn token(&self) -> Option<String> {
        lock(&self.token).clone()
    }
}

#[async_trait]
impl SessionProvider for MemorySession {
    async fn current_actor(&self) -> RemoteResult<Option<Actor>> {
        let actor = self
            .token()
            .and_then(|token| lock(&self.directory.tokens).get(&token).cloned());
        self.actor.send_if_modified(|current| {
            let changed = *current != actor;
            *current = actor.clone();
            changed
        });
        Ok(actor)
    }

    async fn sign_in(&self, email: &str, password: &str) -> RemoteResult<Session> {
        let actor = lock(&self.directory.accounts)
            .iter()
            .find(|account| account.email == email && account.password == password)
            .map(|account| account.actor.clone())
            .ok_or_else(|| RemoteError::Status {
                status: 400,
                message: "Invalid login credentials".to_string(),
            })?;
        let token = Uuid::new_v4().to_string();
        lock(&self.directory.tokens).insert(token.clone(), actor.clone());
        *lock(&self.token) = Some(token.clone());
        self.actor.send_replace(Some(actor.clone()));
        Ok(Session {
            access_token: token,
            actor,
        })
    }

    async fn sign_out(&self) -> RemoteResult<()> {
        if let Some(token) = lock(&self.token).take() {
            lock(&self.directory.tokens).remove(&token);
        }
        self.actor.send_replace(None);
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<Option<Actor>> {
        self.actor.subscribe()
    }
}
