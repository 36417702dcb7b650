pub mod operations;
pub mod table;

use std::sync::Arc;

pub use operations::{OperationResult, TableOperations};
pub use table::{CHANGE_STREAM_ENDED, RemoteTable, RemoteTableBuilder, RowUpdate, TableState};

use crate::{
    models::{Banner, Order, Product, Record},
    remote::{ChangeFeed, RemoteResult, TableOptions, TableService},
};

pub const PRODUCT_CATEGORY_JOIN: &str = "categories!products_category_id_fkey(name, slug)";
pub const PRODUCT_BRAND_JOIN: &str = "brands!products_brand_id_fkey(name, slug)";
pub const ORDER_CUSTOMER_JOIN: &str = "customers!orders_customer_id_fkey(full_name, email, phone)";
pub const BANNER_CATEGORY_JOIN: &str = "categories!banners_category_id_fkey(name, slug)";

/// Embeds shown alongside each table in the back-office.
pub fn admin_options(table: &str) -> TableOptions {
    match table {
        "products" => TableOptions::new()
            .join(PRODUCT_CATEGORY_JOIN)
            .join(PRODUCT_BRAND_JOIN),
        "orders" => TableOptions::new()
            .join(ORDER_CUSTOMER_JOIN)
            .order_by("created_at", false),
        "banners" => TableOptions::new()
            .join(BANNER_CATEGORY_JOIN)
            .order_by("sort_order", true),
        _ => TableOptions::new(),
    }
}

pub async fn products_with_relations(
    tables: Arc<dyn TableService>,
    feed: Arc<dyn ChangeFeed>,
) -> RemoteResult<RemoteTable<Product>> {
    RemoteTable::for_record(tables)
        .options(admin_options(Product::TABLE).realtime(true))
        .feed(feed)
        .open()
        .await
}

pub async fn orders_with_customers(
    tables: Arc<dyn TableService>,
    feed: Arc<dyn ChangeFeed>,
) -> RemoteResult<RemoteTable<Order>> {
    RemoteTable::for_record(tables)
        .options(admin_options(Order::TABLE).realtime(true))
        .feed(feed)
        .open()
        .await
}

pub async fn banners_with_categories(
    tables: Arc<dyn TableService>,
    feed: Arc<dyn ChangeFeed>,
) -> RemoteResult<RemoteTable<Banner>> {
    RemoteTable::for_record(tables)
        .options(admin_options(Banner::TABLE).realtime(true))
        .feed(feed)
        .open()
        .await
}

/// Unfiltered realtime view of a whole table.
pub async fn live<T: Record>(
    tables: Arc<dyn TableService>,
    feed: Arc<dyn ChangeFeed>,
) -> RemoteResult<RemoteTable<T>> {
    RemoteTable::for_record(tables)
        .options(TableOptions::new().realtime(true))
        .feed(feed)
        .open()
        .await
}
