use std::{fmt, sync::Arc};

use serde::Serialize;
use serde_json::Value;

use crate::{
    auth::SessionProvider,
    models::{ActivityLog, Record},
    remote::{TableService, rest::user_agent},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Insert,
    Update,
    Delete,
    BulkInsert,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Insert => "INSERT",
            AuditAction::Update => "UPDATE",
            AuditAction::Delete => "DELETE",
            AuditAction::BulkInsert => "BULK_INSERT",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Writes `admin_activity_logs` rows for mutations made by privileged
/// actors. Logging never blocks or fails the mutation itself.
#[derive(Clone)]
pub struct AuditLogger {
    tables: Arc<dyn TableService>,
    session: Arc<dyn SessionProvider>,
    privileged_roles: Arc<[String]>,
}

impl AuditLogger {
    pub fn new(
        tables: Arc<dyn TableService>,
        session: Arc<dyn SessionProvider>,
        privileged_roles: &[String],
    ) -> Self {
        Self {
            tables,
            session,
            privileged_roles: privileged_roles.into(),
        }
    }

    pub async fn record(
        &self,
        action: AuditAction,
        table: &str,
        record_id: Option<&str>,
        old_values: Option<Value>,
        new_values: Option<Value>,
    ) {
        let actor = match self.session.current_actor().await {
            Ok(Some(actor)) => actor,
            Ok(None) => {
                tracing::debug!(%action, table, "no signed-in actor, audit skipped");
                return;
            }
            Err(err) => {
                tracing::warn!(error = %err, "could not resolve actor for audit");
                return;
            }
        };
        if !actor.has_role(&self.privileged_roles) {
            tracing::debug!(%action, table, actor = %actor.email, "actor not privileged, audit skipped");
            return;
        }

        let entry = ActivityLog {
            id: None,
            user_id: actor.id,
            user_email: Some(actor.email),
            action: action.to_string(),
            table_name: table.to_string(),
            record_id: record_id.map(str::to_string),
            old_values,
            new_values,
            ip_address: None,
            user_agent: Some(user_agent()),
            created_at: None,
        };
        let row = match serde_json::to_value(&entry) {
            Ok(Value::Object(mut fields)) => {
                // Let the service assign these.
                fields.remove("id");
                fields.remove("created_at");
                Value::Object(fields)
            }
            Ok(_) => return,
            Err(err) => {
                tracing::warn!(error = %err, "audit entry not serializable");
                return;
            }
        };

        if let Err(err) = self.tables.insert(ActivityLog::TABLE, vec![row]).await {
            tracing::warn!(error = %err, %action, table, "audit log failed");
        }
    }
}
