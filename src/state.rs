use std::sync::Arc;

use crate::{backend::Backend, catalog::Catalog, config::AppConfig, order_link::OrderLink};

#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn Backend>,
    pub catalog: Catalog,
    pub order_link: OrderLink,
    pub config: Arc<AppConfig>,
}
