use futures::future::join_all;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    config::AppConfig,
    error::AppResult,
    middleware::auth::AuthUser,
    remote::{SelectQuery, TableService},
    response::{ApiResponse, Meta},
    state::AppState,
};

const PROBED_TABLES: &[&str] = &["categories", "brands", "products", "customers", "orders"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Success,
    Error,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
}

impl CheckResult {
    fn new(name: &str, ok: bool, message: String) -> Self {
        Self {
            name: name.to_string(),
            status: if ok {
                CheckStatus::Success
            } else {
                CheckStatus::Error
            },
            message,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DiagnosticsReport {
    pub healthy: bool,
    pub checks: Vec<CheckResult>,
}

fn prefix(value: &str, chars: usize) -> String {
    value.chars().take(chars).collect()
}

fn environment(config: &AppConfig) -> CheckResult {
    CheckResult::new(
        "Environment Variables",
        true,
        format!(
            "URL: {}... | Key: {}...",
            prefix(&config.supabase_url, 30),
            prefix(&config.supabase_anon_key, 20)
        ),
    )
}

async fn probe(tables: &dyn TableService, table: &str) -> Result<usize, String> {
    let query = SelectQuery::new(table)
        .map_err(|err| err.to_string())?
        .columns("id")
        .limit(1);
    tables
        .select(&query)
        .await
        .map(|rows| rows.len())
        .map_err(|err| err.to_string())
}

async fn database(tables: &dyn TableService) -> CheckResult {
    match probe(tables, "categories").await {
        Ok(_) => CheckResult::new(
            "Database Connection",
            true,
            "Successfully connected to the database".to_string(),
        ),
        Err(err) => CheckResult::new(
            "Database Connection",
            false,
            format!("Connection failed: {err}"),
        ),
    }
}

async fn authentication(user: &AuthUser) -> CheckResult {
    match user.scope.session.current_actor().await {
        Ok(Some(actor)) => CheckResult::new(
            "Authentication",
            true,
            format!("Authenticated as: {}", actor.email),
        ),
        Ok(None) => CheckResult::new(
            "Authentication",
            true,
            "Auth service available (not logged in)".to_string(),
        ),
        Err(err) => CheckResult::new("Authentication", false, format!("Auth test failed: {err}")),
    }
}

async fn table_access(tables: &dyn TableService) -> CheckResult {
    let results = join_all(PROBED_TABLES.iter().map(|table| probe(tables, table))).await;
    let mut failed = Vec::new();
    for (table, result) in PROBED_TABLES.iter().zip(results) {
        if let Err(err) = result {
            tracing::warn!(table, error = %err, "table probe failed");
            failed.push(*table);
        }
    }

    let accessible = PROBED_TABLES.len() - failed.len();
    if failed.is_empty() {
        CheckResult::new(
            "Table Access",
            true,
            format!("All {} tables accessible", PROBED_TABLES.len()),
        )
    } else {
        CheckResult::new(
            "Table Access",
            false,
            format!(
                "{accessible}/{} tables accessible, {} failed ({})",
                PROBED_TABLES.len(),
                failed.len(),
                failed.join(", ")
            ),
        )
    }
}

/// Connection test run with the caller's credentials.
pub async fn run(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<DiagnosticsReport>> {
    let tables = user.scope.tables.as_ref();
    let checks = vec![
        environment(&state.config),
        database(tables).await,
        authentication(user).await,
        table_access(tables).await,
    ];
    let healthy = checks
        .iter()
        .all(|check| check.status == CheckStatus::Success);
    if !healthy {
        tracing::warn!("diagnostics reported failures");
    }

    let meta = Meta::count(checks.len());
    Ok(ApiResponse::success(
        "Diagnostics",
        DiagnosticsReport { healthy, checks },
        Some(meta),
    ))
}
