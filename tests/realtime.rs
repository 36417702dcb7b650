mod common;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde_json::json;
use storefront::{
    catalog::Catalog,
    hooks::{self, CHANGE_STREAM_ENDED, RemoteTable},
    models::{Category, Product},
    remote::{
        ChangeFeed, ChangeStream, RemoteError, RemoteResult, TableOptions, TableService,
        memory::MemoryService,
    },
};
use tokio::sync::mpsc;

use common::eventually;

fn handles(service: &MemoryService) -> (Arc<dyn TableService>, Arc<dyn ChangeFeed>) {
    (Arc::new(service.clone()), Arc::new(service.clone()))
}

async fn live_products(service: &MemoryService) -> RemoteTable<Product> {
    let (tables, feed) = handles(service);
    RemoteTable::for_record(tables)
        .options(TableOptions::new().realtime(true))
        .feed(feed)
        .open()
        .await
        .unwrap()
}

async fn insert_product(service: &MemoryService, name: &str) -> String {
    let rows = service
        .insert("products", vec![json!({ "name": name, "price": 100 })])
        .await
        .unwrap();
    rows[0]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn one_refetch_per_notification() {
    let service = MemoryService::new();
    let hook = live_products(&service).await;
    assert!(hook.is_live());
    assert_eq!(service.select_count("products"), 1);

    insert_product(&service, "First").await;
    assert!(eventually(|| service.select_count("products") == 2).await);
    assert!(eventually(|| hook.rows().len() == 1).await);

    let id = insert_product(&service, "Second").await;
    service
        .update("products", &id, json!({ "price": 150 }))
        .await
        .unwrap();
    service.delete("products", &id).await.unwrap();
    assert!(eventually(|| service.select_count("products") == 5).await);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(service.select_count("products"), 5);
    assert_eq!(hook.rows().len(), 1);
}

#[tokio::test]
async fn other_tables_do_not_trigger_refetch() {
    let service = MemoryService::new();
    let _hook = live_products(&service).await;

    service
        .insert("categories", vec![json!({ "name": "Hair" })])
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(service.select_count("products"), 1);
}

#[tokio::test]
async fn deleting_a_missing_row_sends_nothing() {
    let service = MemoryService::new();
    let _hook = live_products(&service).await;

    service.delete("products", "missing").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(service.select_count("products"), 1);
}

#[tokio::test]
async fn dropping_the_hook_unsubscribes() {
    let service = MemoryService::new();
    let hook = live_products(&service).await;
    drop(hook);
    tokio::task::yield_now().await;

    insert_product(&service, "Unseen").await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(service.select_count("products"), 1);
}

#[tokio::test]
async fn realtime_without_feed_is_unsupported() {
    let service = MemoryService::new();
    let result = RemoteTable::<Product>::for_record(Arc::new(service.clone()))
        .options(TableOptions::new().realtime(true))
        .open()
        .await;
    assert!(matches!(result, Err(RemoteError::Unsupported(_))));
    assert_eq!(service.select_count("products"), 0);
}

#[tokio::test]
async fn state_subscribers_see_each_refetch() {
    let service = MemoryService::new();
    let hook = live_products(&service).await;
    let mut states = hook.subscribe_state();
    states.mark_unchanged();

    insert_product(&service, "Watched").await;
    tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            states.changed().await.unwrap();
            let state = states.borrow_and_update().clone();
            if !state.loading && state.rows.len() == 1 {
                break;
            }
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn presets_follow_their_tables() {
    let service = MemoryService::new();
    service.seed(
        "categories",
        vec![json!({ "id": "c-1", "name": "Hair", "slug": "hair" })],
    );
    let (tables, feed) = handles(&service);

    let products = hooks::products_with_relations(tables.clone(), feed.clone())
        .await
        .unwrap();
    let categories = hooks::live::<Category>(tables.clone(), feed.clone())
        .await
        .unwrap();
    assert_eq!(categories.rows().len(), 1);

    service
        .insert(
            "products",
            vec![json!({ "name": "Serum", "price": 2500, "category_id": "c-1" })],
        )
        .await
        .unwrap();
    assert!(eventually(|| products.rows().len() == 1).await);
    assert_eq!(
        products.rows()[0].categories,
        Some(json!({ "name": "Hair", "slug": "hair" }))
    );

    let orders = hooks::orders_with_customers(tables.clone(), feed.clone())
        .await
        .unwrap();
    assert!(orders.rows().is_empty());
    assert!(orders.error().is_none());

    let banners = hooks::banners_with_categories(tables, feed).await.unwrap();
    assert_eq!(banners.options().order_by.as_ref().map(|o| o.column.as_str()), Some("sort_order"));
}

#[tokio::test]
async fn bursts_larger_than_any_buffer_refetch_for_every_row() {
    let service = MemoryService::new();
    let hook = live_products(&service).await;

    let rows = (0..1100)
        .map(|i| json!({ "name": format!("Sample {i}"), "price": 10 }))
        .collect::<Vec<_>>();
    hook.bulk_insert(&rows).await.unwrap();

    let settled = tokio::time::timeout(Duration::from_secs(60), async {
        while service.select_count("products") < 1101 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(settled.is_ok(), "refetches: {}", service.select_count("products"));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(service.select_count("products"), 1101);
    assert_eq!(hook.rows().len(), 1100);
}

/// Feed whose streams end straight away, like a listener that lost its
/// connection.
struct ClosedFeed;

#[async_trait]
impl ChangeFeed for ClosedFeed {
    async fn subscribe(&self, _table: &str) -> RemoteResult<ChangeStream> {
        let (_tx, rx) = mpsc::unbounded_channel();
        Ok(ChangeStream::new(rx, None))
    }
}

#[tokio::test]
async fn ended_stream_is_no_longer_live() {
    let service = MemoryService::new();
    let hook = RemoteTable::<Product>::for_record(Arc::new(service.clone()))
        .options(TableOptions::new().realtime(true))
        .feed(Arc::new(ClosedFeed))
        .open()
        .await
        .unwrap();

    assert!(eventually(|| !hook.is_live()).await);
    assert_eq!(hook.error().as_deref(), Some(CHANGE_STREAM_ENDED));

    insert_product(&service, "Later").await;
    hook.refetch().await.unwrap();
    assert_eq!(hook.rows().len(), 1);
    assert!(hook.error().is_none());
}

#[tokio::test]
async fn catalog_falls_back_to_refetching_when_stream_ends() {
    let service = MemoryService::new();
    let feed: Arc<dyn ChangeFeed> = Arc::new(ClosedFeed);
    let catalog = Catalog::open(Arc::new(service.clone()), Some(feed))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    service
        .insert(
            "products",
            vec![json!({ "name": "Late arrival", "price": 4200, "active": true })],
        )
        .await
        .unwrap();

    let products = catalog.products().await;
    assert_eq!(products.rows.len(), 1);
    assert_eq!(products.rows[0].name, "Late arrival");
    assert!(products.error.is_none());
}
