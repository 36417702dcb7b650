#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use storefront::{
    auth::Actor,
    backend::{Backend, MemoryBackend},
    catalog::Catalog,
    config::AppConfig,
    order_link::OrderLink,
    remote::memory::{MemoryService, MemorySession},
    state::AppState,
};

pub fn actor(id: &str, role: Option<&str>) -> Actor {
    Actor {
        id: id.to_string(),
        email: format!("{id}@shop.test"),
        full_name: None,
        role: role.map(str::to_string),
    }
}

pub fn admin_roles() -> Vec<String> {
    vec!["admin".to_string(), "super_admin".to_string()]
}

pub fn config() -> AppConfig {
    AppConfig {
        supabase_url: "https://project.supabase.co".to_string(),
        supabase_anon_key: "anon-key-for-tests-0123456789".to_string(),
        database_url: None,
        host: "127.0.0.1".to_string(),
        port: 0,
        whatsapp_phone: "254722240558".to_string(),
        admin_roles: admin_roles(),
        request_timeout: Duration::from_secs(5),
    }
}

pub async fn app_state(service: MemoryService, sessions: MemorySession) -> AppState {
    let backend: Arc<dyn Backend> = Arc::new(MemoryBackend::new(service, sessions));
    let catalog = Catalog::open(backend.tables(), backend.changes())
        .await
        .expect("catalog opens");
    let config = config();
    AppState {
        order_link: OrderLink::new(&config.whatsapp_phone),
        backend,
        catalog,
        config: Arc::new(config),
    }
}

/// Polls `check` until it holds or a second has passed.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
