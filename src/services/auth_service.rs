use crate::{
    auth::Actor,
    dto::auth::{LoginRequest, LoginResponse},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    response::{ApiResponse, Meta},
    state::AppState,
};

pub async fn login(state: &AppState, payload: LoginRequest) -> AppResult<ApiResponse<LoginResponse>> {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(AppError::BadRequest("email and password are required".into()));
    }

    let scope = state.backend.anonymous();
    let session = scope
        .session
        .sign_in(payload.email.trim(), &payload.password)
        .await?;

    let data = LoginResponse {
        token: session.access_token,
        actor: session.actor,
    };
    Ok(ApiResponse::success("Signed in", data, Some(Meta::empty())))
}

pub async fn logout(user: AuthUser) -> AppResult<ApiResponse<serde_json::Value>> {
    user.scope.session.sign_out().await?;
    tracing::info!(actor = %user.actor.email, "signed out");
    Ok(ApiResponse::success(
        "Signed out",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub fn me(user: AuthUser) -> ApiResponse<Actor> {
    ApiResponse::success("Current user", user.actor, Some(Meta::empty()))
}
