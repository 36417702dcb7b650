use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};

use crate::{auth::Actor, backend::Scope, error::AppError, state::AppState};

/// Caller resolved from the bearer token, with table and session handles
/// acting on their behalf.
#[derive(Clone)]
pub struct AuthUser {
    pub actor: Actor,
    pub scope: Scope,
}

pub fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let auth_header = parts
        .headers
        .get(header::AUTHORIZATION)
        .ok_or(AppError::Unauthorized)?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| AppError::BadRequest("Invalid Authorization header".into()))?;

    let token = auth_str
        .strip_prefix("Bearer ")
        .map(str::trim)
        .ok_or_else(|| AppError::BadRequest("Invalid Authorization scheme".into()))?;
    if token.is_empty() {
        return Err(AppError::Unauthorized);
    }
    Ok(token)
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let scope = state.backend.scoped(token);
        let actor = scope
            .session
            .current_actor()
            .await?
            .ok_or(AppError::Unauthorized)?;
        Ok(AuthUser { actor, scope })
    }
}
