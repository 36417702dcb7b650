use std::sync::Arc;

use chrono::Utc;
use serde::de::DeserializeOwned;

use crate::{
    hooks::{BANNER_CATEGORY_JOIN, PRODUCT_BRAND_JOIN, PRODUCT_CATEGORY_JOIN, RemoteTable, TableState},
    models::{Banner, Brand, Category, Product, Record},
    remote::{ChangeFeed, RemoteResult, TableOptions, TableService},
};

struct Views {
    categories: RemoteTable<Category>,
    brands: RemoteTable<Brand>,
    products: RemoteTable<Product>,
    banners: RemoteTable<Banner>,
}

/// Storefront views of the active catalog. With a change feed the views
/// follow the remote tables. Without one, or once a view's change stream
/// has ended, every read refetches.
#[derive(Clone)]
pub struct Catalog {
    views: Arc<Views>,
}

async fn open_view<T: Record>(
    tables: &Arc<dyn TableService>,
    feed: &Option<Arc<dyn ChangeFeed>>,
    options: TableOptions,
) -> RemoteResult<RemoteTable<T>> {
    let builder = RemoteTable::for_record(tables.clone()).options(options.realtime(feed.is_some()));
    match feed {
        Some(feed) => builder.feed(feed.clone()).open().await,
        None => Ok(builder.build()),
    }
}

async fn current<T>(view: &RemoteTable<T>) -> TableState<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    if !view.is_live() {
        // Failure is recorded in the state.
        let _ = view.refetch().await;
    }
    view.state()
}

impl Catalog {
    pub async fn open(
        tables: Arc<dyn TableService>,
        feed: Option<Arc<dyn ChangeFeed>>,
    ) -> RemoteResult<Self> {
        let active_sorted = || {
            TableOptions::new()
                .filter("active", true)
                .order_by("sort_order", true)
        };
        let views = Views {
            categories: open_view(&tables, &feed, active_sorted()).await?,
            brands: open_view(&tables, &feed, active_sorted()).await?,
            products: open_view(
                &tables,
                &feed,
                TableOptions::new()
                    .filter("active", true)
                    .order_by("created_at", false)
                    .join(PRODUCT_CATEGORY_JOIN)
                    .join(PRODUCT_BRAND_JOIN),
            )
            .await?,
            banners: open_view(&tables, &feed, active_sorted().join(BANNER_CATEGORY_JOIN)).await?,
        };
        tracing::info!(live = feed.is_some(), "catalog views opened");
        Ok(Self {
            views: Arc::new(views),
        })
    }

    pub async fn categories(&self) -> TableState<Category> {
        current(&self.views.categories).await
    }

    pub async fn brands(&self) -> TableState<Brand> {
        current(&self.views.brands).await
    }

    pub async fn products(&self) -> TableState<Product> {
        current(&self.views.products).await
    }

    /// Banners inside their scheduling window.
    pub async fn banners(&self) -> TableState<Banner> {
        let mut state = current(&self.views.banners).await;
        let now = Utc::now();
        state.rows.retain(|banner| banner.is_live(now));
        state
    }

    pub async fn product(&self, id_or_slug: &str) -> Option<Product> {
        self.products()
            .await
            .rows
            .into_iter()
            .find(|p| p.id == id_or_slug || p.slug.as_deref() == Some(id_or_slug))
    }

    /// Other products in the same category, as shown under a product page.
    pub async fn related(&self, product: &Product, limit: usize) -> Vec<Product> {
        self.products()
            .await
            .rows
            .into_iter()
            .filter(|p| p.id != product.id && p.category_id == product.category_id)
            .take(limit)
            .collect()
    }
}
