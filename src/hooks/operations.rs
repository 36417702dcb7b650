use std::{
    future::Future,
    marker::PhantomData,
    sync::{Arc, Mutex},
};

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
    models::Record,
    remote::{RemoteError, RemoteResult, SelectQuery, TableService},
};

/// Result of the last call that succeeded.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationResult<T> {
    Many(Vec<T>),
    One(Option<T>),
    Removed(String),
}

#[derive(Debug)]
struct OpsState<T> {
    loading: bool,
    error: Option<String>,
    last_result: Option<OperationResult<T>>,
}

/// Plain single-table calls for admin screens: no audit trail, no change
/// subscription. Failures are both returned and parked in `error` until
/// the caller clears them.
pub struct TableOperations<T> {
    tables: Arc<dyn TableService>,
    table: String,
    state: Mutex<OpsState<T>>,
    _rows: PhantomData<fn() -> T>,
}

impl<T> TableOperations<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn new(tables: Arc<dyn TableService>, table: impl Into<String>) -> Self {
        Self {
            tables,
            table: table.into(),
            state: Mutex::new(OpsState {
                loading: false,
                error: None,
                last_result: None,
            }),
            _rows: PhantomData,
        }
    }

    pub fn loading(&self) -> bool {
        self.with_state(|state| state.loading)
    }

    pub fn error(&self) -> Option<String> {
        self.with_state(|state| state.error.clone())
    }

    pub fn clear_error(&self) {
        self.with_state(|state| state.error = None);
    }

    pub fn last_result(&self) -> Option<OperationResult<T>> {
        self.with_state(|state| state.last_result.clone())
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut OpsState<T>) -> R) -> R {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut state)
    }

    async fn run<R, F>(
        &self,
        operation: &str,
        call: F,
        keep: impl FnOnce(&R) -> OperationResult<T>,
    ) -> RemoteResult<R>
    where
        F: Future<Output = RemoteResult<R>>,
    {
        self.with_state(|state| state.loading = true);
        let result = call.await;
        self.with_state(|state| {
            state.loading = false;
            match &result {
                Ok(value) => state.last_result = Some(keep(value)),
                Err(err) => {
                    tracing::error!(table = %self.table, operation, error = %err, "operation failed");
                    state.error = Some(err.to_string());
                }
            }
        });
        result
    }

    pub async fn fetch_all(&self) -> RemoteResult<Vec<T>> {
        let call = async {
            let query = SelectQuery::new(&self.table)?;
            self.tables
                .select(&query)
                .await?
                .into_iter()
                .map(|row| serde_json::from_value(row).map_err(RemoteError::from))
                .collect::<RemoteResult<Vec<T>>>()
        };
        self.run("fetch_all", call, |rows: &Vec<T>| {
            OperationResult::Many(rows.clone())
        })
        .await
    }

    pub async fn fetch_by_id(&self, id: &str) -> RemoteResult<Option<T>> {
        let call = async {
            let row = self.tables.select_by_id(&self.table, id).await?;
            row.map(serde_json::from_value::<T>)
                .transpose()
                .map_err(RemoteError::from)
        };
        self.run("fetch_by_id", call, |row: &Option<T>| {
            OperationResult::One(row.clone())
        })
        .await
    }

    pub async fn create<P: Serialize + ?Sized>(&self, data: &P) -> RemoteResult<T> {
        let call = async {
            let row = serde_json::to_value(data)?;
            let created = self
                .tables
                .insert(&self.table, vec![row])
                .await?
                .into_iter()
                .next()
                .ok_or(RemoteError::NotFound)?;
            serde_json::from_value::<T>(created).map_err(RemoteError::from)
        };
        self.run("create", call, |row: &T| OperationResult::One(Some(row.clone())))
            .await
    }

    pub async fn update<P: Serialize + ?Sized>(&self, id: &str, data: &P) -> RemoteResult<T> {
        let call = async {
            let patch = serde_json::to_value(data)?;
            let updated: Value = self.tables.update(&self.table, id, patch).await?;
            serde_json::from_value::<T>(updated).map_err(RemoteError::from)
        };
        self.run("update", call, |row: &T| OperationResult::One(Some(row.clone())))
            .await
    }

    pub async fn remove(&self, id: &str) -> RemoteResult<()> {
        let call = async { self.tables.delete(&self.table, id).await };
        self.run("remove", call, |_: &()| OperationResult::Removed(id.to_string()))
            .await
    }
}

impl<T: Record> TableOperations<T> {
    pub fn for_record(tables: Arc<dyn TableService>) -> Self {
        Self::new(tables, T::TABLE)
    }
}
