use async_trait::async_trait;
use serde::Deserialize;
use sqlx::{PgPool, postgres::PgListener};
use tokio::sync::mpsc;

use super::{ChangeEvent, ChangeFeed, ChangeKind, ChangeStream, RemoteResult, ensure_identifier};

/// Channel the `notify_table_change` trigger publishes on.
pub const CHANGE_CHANNEL: &str = "table_changes";

#[derive(Debug, Deserialize)]
struct Notification {
    table: String,
    #[serde(rename = "type")]
    op: String,
    id: Option<String>,
}

impl Notification {
    fn into_event(self) -> Option<ChangeEvent> {
        let kind = match self.op.as_str() {
            "INSERT" => ChangeKind::Insert,
            "UPDATE" => ChangeKind::Update,
            "DELETE" => ChangeKind::Delete,
            _ => return None,
        };
        Some(ChangeEvent {
            table: self.table,
            kind,
            record_id: self.id,
        })
    }
}

/// Change feed backed by Postgres `LISTEN/NOTIFY`.
///
/// Each subscription holds its own listener connection so dropping it
/// releases the connection.
#[derive(Clone)]
pub struct PgChangeFeed {
    pool: PgPool,
}

impl PgChangeFeed {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChangeFeed for PgChangeFeed {
    async fn subscribe(&self, table: &str) -> RemoteResult<ChangeStream> {
        ensure_identifier(table)?;
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(CHANGE_CHANNEL).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let table = table.to_string();
        let pump = tokio::spawn(async move {
            loop {
                let notification = match listener.recv().await {
                    Ok(notification) => notification,
                    Err(err) => {
                        tracing::error!(table = %table, error = %err, "change listener stopped");
                        break;
                    }
                };
                let event = match serde_json::from_str::<Notification>(notification.payload()) {
                    Ok(parsed) => parsed.into_event(),
                    Err(err) => {
                        tracing::warn!(error = %err, "unreadable change notification");
                        continue;
                    }
                };
                let Some(event) = event.filter(|event| event.table == table) else {
                    continue;
                };
                if tx.send(event).is_err() {
                    break;
                }
            }
        });

        tracing::debug!(channel = CHANGE_CHANNEL, "change subscription opened");
        Ok(ChangeStream::new(rx, Some(pump)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_payload_maps_to_event() {
        let parsed: Notification =
            serde_json::from_str(r#"{"table":"products","type":"DELETE","id":"p-1"}"#).unwrap();
        let event = parsed.into_event().unwrap();
        assert_eq!(event.kind, ChangeKind::Delete);
        assert_eq!(event.record_id.as_deref(), Some("p-1"));

        let truncate: Notification =
            serde_json::from_str(r#"{"table":"products","type":"TRUNCATE","id":null}"#).unwrap();
        assert!(truncate.into_event().is_none());
    }
}
