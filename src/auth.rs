use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::watch;
use utoipa::ToSchema;

use crate::remote::{RemoteError, RemoteResult, rest::RestClient};

/// Whoever is signed in. `role` comes from the auth service's app metadata
/// and is trusted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Actor {
    pub id: String,
    pub email: String,
    pub full_name: Option<String>,
    pub role: Option<String>,
}

impl Actor {
    pub fn has_role(&self, roles: &[String]) -> bool {
        self.role
            .as_ref()
            .is_some_and(|role| roles.iter().any(|r| r == role))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Session {
    pub access_token: String,
    pub actor: Actor,
}

/// The one source of truth for "who is signed in".
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn current_actor(&self) -> RemoteResult<Option<Actor>>;

    async fn sign_in(&self, email: &str, password: &str) -> RemoteResult<Session>;

    async fn sign_out(&self) -> RemoteResult<()>;

    /// Receives the actor every time it changes.
    fn subscribe(&self) -> watch::Receiver<Option<Actor>>;
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
    email: Option<String>,
    #[serde(default)]
    app_metadata: Value,
    #[serde(default)]
    user_metadata: Value,
}

impl From<AuthUser> for Actor {
    fn from(user: AuthUser) -> Self {
        let text = |value: &Value, key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        Actor {
            full_name: text(&user.user_metadata, "full_name"),
            role: text(&user.app_metadata, "role"),
            email: user.email.unwrap_or_default(),
            id: user.id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    user: AuthUser,
}

/// Session provider over the hosted auth endpoints.
///
/// Signing in stores the access token in the shared client so table
/// requests made through the same handle run as that user.
pub struct GoTrueSession {
    client: RestClient,
    actor: watch::Sender<Option<Actor>>,
}

impl GoTrueSession {
    pub fn new(client: RestClient) -> Self {
        let (actor, _) = watch::channel(None);
        Self { client, actor }
    }

    fn publish(&self, actor: Option<Actor>) {
        self.actor.send_if_modified(|current| {
            if *current == actor {
                false
            } else {
                *current = actor;
                true
            }
        });
    }
}

#[async_trait]
impl SessionProvider for GoTrueSession {
    async fn current_actor(&self) -> RemoteResult<Option<Actor>> {
        if self.client.access_token().is_none() {
            self.publish(None);
            return Ok(None);
        }
        let url = self.client.url("auth/v1/user")?;
        let response = self.client.request(Method::GET, url).send().await?;
        let actor = match RestClient::check(response).await {
            Ok(response) => Some(Actor::from(response.json::<AuthUser>().await?)),
            Err(RemoteError::Status { status: 401 | 403, .. }) => None,
            Err(err) => return Err(err),
        };
        self.publish(actor.clone());
        Ok(actor)
    }

    async fn sign_in(&self, email: &str, password: &str) -> RemoteResult<Session> {
        let mut url = self.client.url("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");
        let response = self
            .client
            .request(Method::POST, url)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let token: TokenResponse = RestClient::check(response).await?.json().await?;

        let session = Session {
            access_token: token.access_token,
            actor: token.user.into(),
        };
        self.client
            .set_access_token(Some(session.access_token.clone()));
        self.publish(Some(session.actor.clone()));
        tracing::info!(actor = %session.actor.email, "signed in");
        Ok(session)
    }

    async fn sign_out(&self) -> RemoteResult<()> {
        if self.client.access_token().is_some() {
            let url = self.client.url("auth/v1/logout")?;
            let response = self.client.request(Method::POST, url).send().await?;
            RestClient::check(response).await?;
        }
        self.client.set_access_token(None);
        self.publish(None);
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<Option<Actor>> {
        self.actor.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actor_reads_role_from_app_metadata() {
        let user: AuthUser = serde_json::from_value(json!({
            "id": "u-1",
            "email": "admin@shop.test",
            "app_metadata": { "role": "admin", "provider": "email" },
            "user_metadata": { "full_name": "Shop Admin" }
        }))
        .unwrap();
        let actor = Actor::from(user);
        assert_eq!(actor.role.as_deref(), Some("admin"));
        assert_eq!(actor.full_name.as_deref(), Some("Shop Admin"));
        assert!(actor.has_role(&["admin".to_string()]));
        assert!(!actor.has_role(&["super_admin".to_string()]));
    }

    #[test]
    fn missing_metadata_leaves_role_empty() {
        let user: AuthUser = serde_json::from_value(json!({ "id": "u-2" })).unwrap();
        let actor = Actor::from(user);
        assert_eq!(actor.email, "");
        assert!(actor.role.is_none());
        assert!(!actor.has_role(&["admin".to_string()]));
    }
}
