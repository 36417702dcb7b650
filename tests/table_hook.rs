use std::sync::Arc;

use serde_json::{Value, json};
use storefront::{
    hooks::{RemoteTable, TableOperations, OperationResult},
    models::{Category, Product},
    remote::{TableOptions, TableService, memory::MemoryService},
};

fn products_service() -> MemoryService {
    let service = MemoryService::new();
    service.seed(
        "products",
        vec![
            json!({ "id": "p-1", "name": "Serum", "price": 2500, "stock": 5, "active": true, "sort_order": 2 }),
            json!({ "id": "p-2", "name": "Oil", "price": 1800, "stock": 0, "active": false, "sort_order": 1 }),
            json!({ "id": "p-3", "name": "Cream", "price": 3200, "stock": 9, "active": true, "sort_order": 3 }),
        ],
    );
    service
}

fn tables(service: &MemoryService) -> Arc<dyn TableService> {
    Arc::new(service.clone())
}

#[tokio::test]
async fn active_products_ordered_by_sort_order() {
    let service = products_service();
    let hook = RemoteTable::<Value>::builder(tables(&service), "products")
        .options(
            TableOptions::new()
                .filter("active", true)
                .order_by("sort_order", true),
        )
        .open()
        .await
        .unwrap();

    let state = hook.state();
    assert!(!state.loading);
    assert!(state.error.is_none());
    let order = state
        .rows
        .iter()
        .map(|row| row["sort_order"].as_i64().unwrap())
        .collect::<Vec<_>>();
    assert_eq!(order, vec![2, 3]);
}

#[tokio::test]
async fn sequence_filter_means_membership() {
    let service = products_service();
    let hook = RemoteTable::<Product>::for_record(tables(&service))
        .options(TableOptions::new().filter("id", json!(["p-1", "p-2"])))
        .open()
        .await
        .unwrap();

    let mut ids = hook.rows().into_iter().map(|p| p.id).collect::<Vec<_>>();
    ids.sort();
    assert_eq!(ids, vec!["p-1", "p-2"]);
}

#[tokio::test]
async fn descending_order_and_default_ascending() {
    let service = products_service();
    let desc = RemoteTable::<Product>::for_record(tables(&service))
        .options(TableOptions::new().order_by("price", false))
        .open()
        .await
        .unwrap();
    let names = desc.rows().into_iter().map(|p| p.name).collect::<Vec<_>>();
    assert_eq!(names, vec!["Cream", "Serum", "Oil"]);

    let options: storefront::remote::OrderBy =
        serde_json::from_value(json!({ "column": "price" })).unwrap();
    assert!(options.ascending);
}

#[tokio::test]
async fn build_does_not_fetch_until_asked() {
    let service = products_service();
    let hook = RemoteTable::<Product>::for_record(tables(&service)).build();
    assert!(hook.loading());
    assert!(hook.rows().is_empty());
    assert_eq!(service.select_count("products"), 0);

    hook.refetch().await.unwrap();
    assert!(!hook.loading());
    assert_eq!(hook.rows().len(), 3);
}

#[tokio::test]
async fn inserted_row_appears_after_refetch() {
    let service = products_service();
    let hook = RemoteTable::<Product>::for_record(tables(&service))
        .open()
        .await
        .unwrap();

    let created = hook
        .insert(&json!({ "name": "Midnight Oud", "price": 4500, "stock": 15 }))
        .await
        .unwrap();
    assert!(!created.id.is_empty());
    // No optimistic update.
    assert_eq!(hook.rows().len(), 3);

    hook.refetch().await.unwrap();
    assert!(hook.rows().iter().any(|p| p.id == created.id));
}

#[tokio::test]
async fn removed_row_is_gone_after_refetch() {
    let service = products_service();
    let hook = RemoteTable::<Product>::for_record(tables(&service))
        .open()
        .await
        .unwrap();

    hook.remove("p-1").await.unwrap();
    hook.refetch().await.unwrap();
    assert!(hook.rows().iter().all(|p| p.id != "p-1"));
}

#[tokio::test]
async fn update_is_partial() {
    let service = products_service();
    let hook = RemoteTable::<Product>::for_record(tables(&service))
        .open()
        .await
        .unwrap();

    let updated = hook.update("p-1", &json!({ "price": 2750 })).await.unwrap();
    assert_eq!(updated.price, 2750.0);
    assert_eq!(updated.name, "Serum");
    assert_eq!(updated.stock, 5);

    let stored = service
        .rows("products")
        .into_iter()
        .find(|row| row["id"] == "p-1")
        .unwrap();
    assert_eq!(stored["sort_order"], 2);
    assert_eq!(stored["active"], true);
}

#[tokio::test]
async fn update_of_missing_row_is_an_error() {
    let service = products_service();
    let hook = RemoteTable::<Product>::for_record(tables(&service)).build();
    assert!(hook.update("nope", &json!({ "price": 1 })).await.is_err());
}

#[tokio::test]
async fn failed_refetch_keeps_previous_rows() {
    let service = products_service();
    let hook = RemoteTable::<Product>::for_record(tables(&service))
        .open()
        .await
        .unwrap();
    assert_eq!(hook.rows().len(), 3);

    service.set_unavailable(true);
    assert!(hook.refetch().await.is_err());
    let state = hook.state();
    assert_eq!(state.rows.len(), 3);
    assert!(!state.loading);
    assert_eq!(state.error.as_deref(), Some("service unavailable"));

    service.set_unavailable(false);
    hook.refetch().await.unwrap();
    assert!(hook.error().is_none());
}

#[tokio::test]
async fn failed_initial_fetch_is_reported_in_state() {
    let service = products_service();
    service.set_unavailable(true);
    let hook = RemoteTable::<Product>::for_record(tables(&service))
        .open()
        .await
        .unwrap();
    assert!(hook.rows().is_empty());
    assert!(!hook.loading());
    assert!(hook.error().is_some());
}

#[tokio::test]
async fn mutations_rethrow() {
    let service = products_service();
    let hook = RemoteTable::<Product>::for_record(tables(&service))
        .open()
        .await
        .unwrap();
    service.set_unavailable(true);
    assert!(hook.insert(&json!({ "name": "x" })).await.is_err());
    assert!(hook.remove("p-1").await.is_err());
    assert!(hook.bulk_insert(&[json!({ "name": "y" })]).await.is_err());
}

#[tokio::test]
async fn non_object_payload_is_rejected() {
    let service = products_service();
    let hook = RemoteTable::<Product>::for_record(tables(&service)).build();
    assert!(hook.insert(&json!(["not", "a", "row"])).await.is_err());
    assert_eq!(service.rows("products").len(), 3);
}

#[tokio::test]
async fn joins_embed_related_rows() {
    let service = products_service();
    service.seed(
        "categories",
        vec![json!({ "id": "c-1", "name": "Hair", "slug": "hair" })],
    );
    service.seed(
        "products",
        vec![json!({ "id": "p-4", "name": "Shampoo", "category_id": "c-1", "price": 900 })],
    );
    let hook = RemoteTable::<Product>::for_record(tables(&service))
        .options(
            TableOptions::new()
                .filter("id", "p-4")
                .join(storefront::hooks::PRODUCT_CATEGORY_JOIN),
        )
        .open()
        .await
        .unwrap();

    let product = hook.rows().pop().unwrap();
    assert_eq!(product.categories, Some(json!({ "name": "Hair", "slug": "hair" })));
}

#[tokio::test]
async fn operations_keep_error_until_cleared() {
    let service = MemoryService::new();
    service.seed(
        "categories",
        vec![json!({ "id": "c-1", "name": "Hair", "sort_order": 1 })],
    );
    let ops = TableOperations::<Category>::for_record(tables(&service));
    assert!(!ops.loading());

    let rows = ops.fetch_all().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert!(matches!(ops.last_result(), Some(OperationResult::Many(ref rows)) if rows.len() == 1));

    service.set_unavailable(true);
    assert!(ops.fetch_by_id("c-1").await.is_err());
    assert!(ops.error().is_some());
    assert!(!ops.loading());
    // Last good result survives the failure.
    assert!(matches!(ops.last_result(), Some(OperationResult::Many(_))));

    service.set_unavailable(false);
    let found = ops.fetch_by_id("c-1").await.unwrap();
    assert_eq!(found.map(|c| c.name).as_deref(), Some("Hair"));
    assert!(ops.error().is_some());
    ops.clear_error();
    assert!(ops.error().is_none());
}

#[tokio::test]
async fn operations_crud_round() {
    let service = MemoryService::new();
    let ops = TableOperations::<Category>::for_record(tables(&service));

    let created = ops.create(&json!({ "name": "Beard" })).await.unwrap();
    let updated = ops
        .update(&created.id, &json!({ "description": "Grooming" }))
        .await
        .unwrap();
    assert_eq!(updated.name, "Beard");
    assert_eq!(updated.description.as_deref(), Some("Grooming"));

    ops.remove(&created.id).await.unwrap();
    assert_eq!(
        ops.last_result(),
        Some(OperationResult::Removed(created.id.clone()))
    );
    assert_eq!(ops.fetch_by_id(&created.id).await.unwrap(), None);
}
