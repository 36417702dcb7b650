use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use serde_json::Value;

use crate::{
    dto::admin::{BulkUpdateItem, Deleted, ListQuery},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    routes::diagnostics,
    services::admin_service::{self, DashboardSummary},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/summary", get(summary))
        .route("/diagnostics", get(diagnostics::run_diagnostics))
        .route("/{table}", get(list_rows).post(create_row))
        .route("/{table}/bulk", post(bulk_create))
        .route("/{table}/bulk-update", post(bulk_update))
        .route(
            "/{table}/{id}",
            get(get_row).patch(update_row).delete(delete_row),
        )
}

#[utoipa::path(
    get,
    path = "/api/admin/summary",
    responses(
        (status = 200, description = "Back-office counters", body = ApiResponse<DashboardSummary>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn summary(user: AuthUser) -> AppResult<Json<ApiResponse<DashboardSummary>>> {
    let resp = admin_service::summary(&user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/{table}",
    params(
        ("table" = String, Path, description = "categories, brands, products, banners, orders or navigation_items"),
        ("order_by" = Option<String>, Query, description = "Column to sort by"),
        ("ascending" = Option<bool>, Query, description = "Sort direction, default true"),
    ),
    responses(
        (status = 200, description = "Rows with their admin relations; other query keys filter by column", body = ApiResponse<Vec<Object>>),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Unknown table"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_rows(
    State(state): State<AppState>,
    user: AuthUser,
    Path(table): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Json<ApiResponse<Vec<Value>>>> {
    let query = ListQuery::from_params(params)?;
    let resp = admin_service::list_rows(&state, &user, &table, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/admin/{table}",
    params(
        ("table" = String, Path, description = "Managed table")
    ),
    request_body = serde_json::Value,
    responses(
        (status = 200, description = "Created row", body = ApiResponse<serde_json::Value>),
        (status = 400, description = "Invalid row"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn create_row(
    State(state): State<AppState>,
    user: AuthUser,
    Path(table): Path<String>,
    Json(payload): Json<Value>,
) -> AppResult<Json<ApiResponse<Value>>> {
    let resp = admin_service::create_row(&state, &user, &table, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/admin/{table}/bulk",
    params(
        ("table" = String, Path, description = "Managed table")
    ),
    request_body = Vec<serde_json::Value>,
    responses(
        (status = 200, description = "Created rows", body = ApiResponse<Vec<Object>>),
        (status = 400, description = "Invalid rows"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn bulk_create(
    State(state): State<AppState>,
    user: AuthUser,
    Path(table): Path<String>,
    Json(rows): Json<Vec<Value>>,
) -> AppResult<Json<ApiResponse<Vec<Value>>>> {
    let resp = admin_service::bulk_create(&state, &user, &table, rows).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/admin/{table}/bulk-update",
    params(
        ("table" = String, Path, description = "Managed table")
    ),
    request_body = Vec<BulkUpdateItem>,
    responses(
        (status = 200, description = "Updated rows. Not atomic: rows updated before a failure stay updated", body = ApiResponse<Vec<Object>>),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "A row was not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn bulk_update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(table): Path<String>,
    Json(items): Json<Vec<BulkUpdateItem>>,
) -> AppResult<Json<ApiResponse<Vec<Value>>>> {
    let resp = admin_service::bulk_update(&state, &user, &table, items).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/{table}/{id}",
    params(
        ("table" = String, Path, description = "Managed table"),
        ("id" = String, Path, description = "Row id")
    ),
    responses(
        (status = 200, description = "Row", body = ApiResponse<serde_json::Value>),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn get_row(
    user: AuthUser,
    Path((table, id)): Path<(String, String)>,
) -> AppResult<Json<ApiResponse<Value>>> {
    let resp = admin_service::get_row(&user, &table, &id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/admin/{table}/{id}",
    params(
        ("table" = String, Path, description = "Managed table"),
        ("id" = String, Path, description = "Row id")
    ),
    request_body = serde_json::Value,
    responses(
        (status = 200, description = "Updated row; columns absent from the body are unchanged", body = ApiResponse<serde_json::Value>),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_row(
    State(state): State<AppState>,
    user: AuthUser,
    Path((table, id)): Path<(String, String)>,
    Json(patch): Json<Value>,
) -> AppResult<Json<ApiResponse<Value>>> {
    let resp = admin_service::update_row(&state, &user, &table, &id, patch).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/admin/{table}/{id}",
    params(
        ("table" = String, Path, description = "Managed table"),
        ("id" = String, Path, description = "Row id")
    ),
    responses(
        (status = 200, description = "Deleted", body = ApiResponse<Deleted>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn delete_row(
    State(state): State<AppState>,
    user: AuthUser,
    Path((table, id)): Path<(String, String)>,
) -> AppResult<Json<ApiResponse<Deleted>>> {
    let resp = admin_service::delete_row(&state, &user, &table, &id).await?;
    Ok(Json(resp))
}
