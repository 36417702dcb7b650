use axum::{Json, extract::State};

use crate::{
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::diagnostics_service::{self, DiagnosticsReport},
    state::AppState,
};

#[utoipa::path(
    get,
    path = "/api/admin/diagnostics",
    responses(
        (status = 200, description = "Environment, database, auth and table access checks", body = ApiResponse<DiagnosticsReport>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn run_diagnostics(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<DiagnosticsReport>>> {
    let resp = diagnostics_service::run(&state, &user).await?;
    Ok(Json(resp))
}
