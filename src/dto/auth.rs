use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::Actor;

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    /// Access token to send back as `Authorization: Bearer <token>`.
    pub token: String,
    pub actor: Actor,
}
