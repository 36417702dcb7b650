use std::sync::Arc;

use crate::{
    auth::{GoTrueSession, SessionProvider},
    config::AppConfig,
    db::create_pool,
    remote::{
        ChangeFeed, TableService,
        listen::PgChangeFeed,
        memory::{MemoryService, MemorySession},
        rest::RestClient,
    },
};

/// Table and session handles acting on behalf of one caller.
#[derive(Clone)]
pub struct Scope {
    pub tables: Arc<dyn TableService>,
    pub session: Arc<dyn SessionProvider>,
}

/// Factory for remote handles. Injected into the application state instead
/// of a process-wide client.
pub trait Backend: Send + Sync {
    /// Anonymous table access, used by the storefront.
    fn tables(&self) -> Arc<dyn TableService>;

    fn changes(&self) -> Option<Arc<dyn ChangeFeed>>;

    /// Fresh, signed-out scope.
    fn anonymous(&self) -> Scope;

    /// Scope acting as the holder of `access_token`.
    fn scoped(&self, access_token: &str) -> Scope;
}

pub struct HostedBackend {
    rest: RestClient,
    feed: Option<PgChangeFeed>,
}

impl HostedBackend {
    pub fn new(rest: RestClient, feed: Option<PgChangeFeed>) -> Self {
        Self { rest, feed }
    }

    pub async fn connect(config: &AppConfig) -> anyhow::Result<Self> {
        let rest = RestClient::new(
            &config.supabase_url,
            &config.supabase_anon_key,
            config.request_timeout,
        )?;
        let feed = match &config.database_url {
            Some(url) => Some(PgChangeFeed::new(create_pool(url).await?)),
            None => {
                tracing::warn!("DATABASE_URL not set, catalog views will refetch on every read");
                None
            }
        };
        Ok(Self::new(rest, feed))
    }

    fn scope_for(rest: RestClient) -> Scope {
        Scope {
            tables: Arc::new(rest.clone()),
            session: Arc::new(GoTrueSession::new(rest)),
        }
    }
}

impl Backend for HostedBackend {
    fn tables(&self) -> Arc<dyn TableService> {
        Arc::new(self.rest.clone())
    }

    fn changes(&self) -> Option<Arc<dyn ChangeFeed>> {
        self.feed
            .clone()
            .map(|feed| Arc::new(feed) as Arc<dyn ChangeFeed>)
    }

    fn anonymous(&self) -> Scope {
        // Own token slot so a sign-in never leaks into shared handles.
        Self::scope_for(self.rest.detached())
    }

    fn scoped(&self, access_token: &str) -> Scope {
        Self::scope_for(self.rest.with_access_token(access_token))
    }
}

#[derive(Clone)]
pub struct MemoryBackend {
    pub service: MemoryService,
    pub sessions: Arc<MemorySession>,
}

impl MemoryBackend {
    pub fn new(service: MemoryService, sessions: MemorySession) -> Self {
        Self {
            service,
            sessions: Arc::new(sessions),
        }
    }
}

impl Backend for MemoryBackend {
    fn tables(&self) -> Arc<dyn TableService> {
        Arc::new(self.service.clone())
    }

    fn changes(&self) -> Option<Arc<dyn ChangeFeed>> {
        Some(Arc::new(self.service.clone()))
    }

    fn anonymous(&self) -> Scope {
        Scope {
            tables: self.tables(),
            session: Arc::new(self.sessions.scoped(None)),
        }
    }

    fn scoped(&self, access_token: &str) -> Scope {
        Scope {
            tables: self.tables(),
            session: Arc::new(self.sessions.scoped(Some(access_token))),
        }
    }
}
