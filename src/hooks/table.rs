use std::{marker::PhantomData, sync::Arc};

use futures::future::try_join_all;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use tokio::{sync::watch, task::JoinHandle};

use crate::{
    audit::{AuditAction, AuditLogger},
    models::Record,
    remote::{ChangeFeed, RemoteError, RemoteResult, TableOptions, TableService},
};

/// Error recorded when a live view's change subscription stops.
pub const CHANGE_STREAM_ENDED: &str = "change stream ended";

/// What a consumer of a table hook renders from.
#[derive(Debug, Clone)]
pub struct TableState<T> {
    pub rows: Vec<T>,
    pub loading: bool,
    pub error: Option<String>,
}

impl<T> Default for TableState<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            loading: true,
            error: None,
        }
    }
}

/// One `(id, partial row)` pair for [`RemoteTable::bulk_update`].
#[derive(Debug, Clone)]
pub struct RowUpdate<P> {
    pub id: String,
    pub data: P,
}

struct Inner<T> {
    tables: Arc<dyn TableService>,
    table: String,
    options: TableOptions,
    audit: Option<AuditLogger>,
    state: watch::Sender<TableState<T>>,
}

fn decode<T: DeserializeOwned>(row: Value) -> RemoteResult<T> {
    Ok(serde_json::from_value(row)?)
}

fn encode<P: Serialize + ?Sized>(payload: &P) -> RemoteResult<Value> {
    match serde_json::to_value(payload)? {
        row @ Value::Object(_) => Ok(row),
        other => Err(RemoteError::InvalidPayload(format!(
            "rows must be objects, got {other}"
        ))),
    }
}

impl<T> Inner<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    async fn fetch(&self) -> RemoteResult<()> {
        self.state.send_modify(|state| state.loading = true);

        let result = async {
            let query = self.options.to_query(&self.table)?;
            self.tables
                .select(&query)
                .await?
                .into_iter()
                .map(decode::<T>)
                .collect::<RemoteResult<Vec<_>>>()
        }
        .await;

        match result {
            Ok(rows) => {
                tracing::debug!(table = %self.table, rows = rows.len(), "fetched");
                self.state.send_modify(|state| {
                    state.rows = rows;
                    state.loading = false;
                    state.error = None;
                });
                Ok(())
            }
            Err(err) => {
                tracing::error!(table = %self.table, error = %err, "fetch failed");
                // Rows from the last good fetch stay visible.
                self.state.send_modify(|state| {
                    state.loading = false;
                    state.error = Some(err.to_string());
                });
                Err(err)
            }
        }
    }

    /// Pre-mutation snapshot for the audit trail. Failure here never blocks
    /// the mutation.
    async fn snapshot(&self, id: &str) -> Option<Value> {
        self.audit.as_ref()?;
        match self.tables.select_by_id(&self.table, id).await {
            Ok(row) => row,
            Err(err) => {
                tracing::warn!(table = %self.table, id, error = %err, "could not read row before mutation");
                None
            }
        }
    }

    async fn audit(
        &self,
        action: AuditAction,
        record_id: Option<&str>,
        old_values: Option<Value>,
        new_values: Option<Value>,
    ) {
        if let Some(audit) = &self.audit {
            audit
                .record(action, &self.table, record_id, old_values, new_values)
                .await;
        }
    }
}

/// Live view over a remote table plus the mutations an admin screen needs.
///
/// The list is only ever replaced by a full fetch; mutations return the
/// server's row and leave reconciling to the caller (`refetch`) or to the
/// change subscription when `realtime` is on.
pub struct RemoteTable<T> {
    inner: Arc<Inner<T>>,
    subscription: Option<JoinHandle<()>>,
}

pub struct RemoteTableBuilder<T> {
    tables: Arc<dyn TableService>,
    table: String,
    options: TableOptions,
    feed: Option<Arc<dyn ChangeFeed>>,
    audit: Option<AuditLogger>,
    _rows: PhantomData<fn() -> T>,
}

impl<T> RemoteTableBuilder<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn options(mut self, options: TableOptions) -> Self {
        self.options = options;
        self
    }

    pub fn feed(mut self, feed: Arc<dyn ChangeFeed>) -> Self {
        self.feed = Some(feed);
        self
    }

    pub fn audit(mut self, audit: AuditLogger) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Builds the hook without touching the network.
    pub fn build(self) -> RemoteTable<T> {
        let (state, _) = watch::channel(TableState::default());
        RemoteTable {
            inner: Arc::new(Inner {
                tables: self.tables,
                table: self.table,
                options: self.options,
                audit: self.audit,
                state,
            }),
            subscription: None,
        }
    }

    /// Subscribes to changes when `realtime` is set, then runs the initial
    /// fetch. A failed initial fetch is reported through the state, not as
    /// an error.
    pub async fn open(self) -> RemoteResult<RemoteTable<T>> {
        let feed = self.feed.clone();
        let mut table = self.build();

        if table.inner.options.realtime {
            let feed = feed.ok_or_else(|| {
                RemoteError::Unsupported("realtime requested without a change feed".into())
            })?;
            let mut changes = feed.subscribe(&table.inner.table).await?;
            let inner = table.inner.clone();
            table.subscription = Some(tokio::spawn(async move {
                while let Some(event) = changes.next().await {
                    tracing::debug!(
                        table = %inner.table,
                        kind = ?event.kind,
                        record_id = ?event.record_id,
                        "change notification"
                    );
                    // Errors are already in the state.
                    let _ = inner.fetch().await;
                }
                tracing::warn!(table = %inner.table, "change stream ended");
                inner.state.send_modify(|state| {
                    state.error = Some(CHANGE_STREAM_ENDED.to_string());
                });
            }));
        }

        let _ = table.inner.fetch().await;
        Ok(table)
    }
}

impl<T> RemoteTable<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn builder(tables: Arc<dyn TableService>, table: impl Into<String>) -> RemoteTableBuilder<T> {
        RemoteTableBuilder {
            tables,
            table: table.into(),
            options: TableOptions::default(),
            feed: None,
            audit: None,
            _rows: PhantomData,
        }
    }

    pub fn table(&self) -> &str {
        &self.inner.table
    }

    pub fn options(&self) -> &TableOptions {
        &self.inner.options
    }

    /// True while the change subscription is still delivering events.
    pub fn is_live(&self) -> bool {
        self.subscription
            .as_ref()
            .is_some_and(|subscription| !subscription.is_finished())
    }

    pub fn state(&self) -> TableState<T> {
        self.inner.state.borrow().clone()
    }

    pub fn rows(&self) -> Vec<T> {
        self.inner.state.borrow().rows.clone()
    }

    pub fn loading(&self) -> bool {
        self.inner.state.borrow().loading
    }

    pub fn error(&self) -> Option<String> {
        self.inner.state.borrow().error.clone()
    }

    /// Receives every state transition, the way a view re-renders.
    pub fn subscribe_state(&self) -> watch::Receiver<TableState<T>> {
        self.inner.state.subscribe()
    }

    /// Runs the configured query once and replaces the list with the result.
    /// On failure the previous rows stay and `error` is set.
    pub async fn refetch(&self) -> RemoteResult<()> {
        self.inner.fetch().await
    }

    pub async fn insert<P: Serialize + ?Sized>(&self, row: &P) -> RemoteResult<T> {
        let inner = &self.inner;
        let payload = encode(row)?;
        let inserted = inner
            .tables
            .insert(&inner.table, vec![payload])
            .await
            .inspect_err(|err| tracing::error!(table = %inner.table, error = %err, "insert failed"))?
            .into_iter()
            .next()
            .ok_or(RemoteError::NotFound)?;

        let id = inserted.get("id").and_then(Value::as_str).map(str::to_string);
        inner
            .audit(AuditAction::Insert, id.as_deref(), None, Some(inserted.clone()))
            .await;
        decode(inserted)
    }

    /// Partial update: only the columns present in `data` change.
    pub async fn update<P: Serialize + ?Sized>(&self, id: &str, data: &P) -> RemoteResult<T> {
        let inner = &self.inner;
        let patch = encode(data)?;
        let old = inner.snapshot(id).await;
        let updated = inner
            .tables
            .update(&inner.table, id, patch)
            .await
            .inspect_err(|err| tracing::error!(table = %inner.table, id, error = %err, "update failed"))?;

        inner
            .audit(AuditAction::Update, Some(id), old, Some(updated.clone()))
            .await;
        decode(updated)
    }

    pub async fn remove(&self, id: &str) -> RemoteResult<()> {
        let inner = &self.inner;
        let old = inner.snapshot(id).await;
        inner
            .tables
            .delete(&inner.table, id)
            .await
            .inspect_err(|err| tracing::error!(table = %inner.table, id, error = %err, "delete failed"))?;

        inner.audit(AuditAction::Delete, Some(id), old, None).await;
        Ok(())
    }

    /// Inserts all rows in one request. The audit entry carries the count
    /// only.
    pub async fn bulk_insert<P: Serialize>(&self, rows: &[P]) -> RemoteResult<Vec<T>> {
        let inner = &self.inner;
        let payload = rows.iter().map(encode).collect::<RemoteResult<Vec<_>>>()?;
        let inserted = inner
            .tables
            .insert(&inner.table, payload)
            .await
            .inspect_err(|err| tracing::error!(table = %inner.table, error = %err, "bulk insert failed"))?;

        inner
            .audit(
                AuditAction::BulkInsert,
                None,
                None,
                Some(json!({ "count": rows.len() })),
            )
            .await;
        inserted.into_iter().map(decode).collect()
    }

    /// Runs every update concurrently. Not atomic: the first failure is
    /// returned and rows already updated stay updated.
    pub async fn bulk_update<P: Serialize + Sync>(
        &self,
        items: &[RowUpdate<P>],
    ) -> RemoteResult<Vec<T>> {
        try_join_all(items.iter().map(|item| self.update(&item.id, &item.data)))
            .await
            .inspect_err(|err| tracing::error!(table = %self.inner.table, error = %err, "bulk update failed"))
    }
}

impl<T: Record> RemoteTable<T> {
    pub fn for_record(tables: Arc<dyn TableService>) -> RemoteTableBuilder<T> {
        RemoteTable::builder(tables, T::TABLE)
    }
}

impl<T> Drop for RemoteTable<T> {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.abort();
        }
    }
}
