use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

use crate::{
    audit::AuditLogger,
    dto::admin::{BulkUpdateItem, Deleted, ListQuery},
    error::{AppError, AppResult},
    hooks::{RemoteTable, RowUpdate, TableOperations, admin_options},
    middleware::auth::AuthUser,
    models::{Banner, Brand, Order, Product, Record},
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Tables the back-office may touch through the generic endpoints.
pub const MANAGED_TABLES: &[&str] = &[
    "categories",
    "brands",
    "products",
    "banners",
    "orders",
    "navigation_items",
];

pub fn managed_table(name: &str) -> AppResult<&'static str> {
    MANAGED_TABLES
        .iter()
        .copied()
        .find(|table| *table == name)
        .ok_or(AppError::NotFound)
}

fn audit_logger(state: &AppState, user: &AuthUser) -> AuditLogger {
    AuditLogger::new(
        user.scope.tables.clone(),
        user.scope.session.clone(),
        &state.config.admin_roles,
    )
}

/// Audited hook over `table`, acting as the caller.
fn table_hook(
    state: &AppState,
    user: &AuthUser,
    table: &str,
    query: Option<ListQuery>,
) -> AppResult<RemoteTable<Value>> {
    let table = managed_table(table)?;
    let mut options = admin_options(table);
    if let Some(query) = query {
        for (column, value) in query.filters {
            options = options.filter(column, value);
        }
        if let Some(column) = query.order_by {
            options = options.order_by(column, query.ascending);
        }
    }
    Ok(RemoteTable::builder(user.scope.tables.clone(), table)
        .options(options)
        .audit(audit_logger(state, user))
        .build())
}

pub async fn list_rows(
    state: &AppState,
    user: &AuthUser,
    table: &str,
    query: ListQuery,
) -> AppResult<ApiResponse<Vec<Value>>> {
    let hook = table_hook(state, user, table, Some(query))?;
    hook.refetch().await?;
    let rows = hook.rows();
    let meta = Meta::count(rows.len());
    Ok(ApiResponse::success(table, rows, Some(meta)))
}

pub async fn get_row(
    user: &AuthUser,
    table: &str,
    id: &str,
) -> AppResult<ApiResponse<Value>> {
    let table = managed_table(table)?;
    let ops = TableOperations::<Value>::new(user.scope.tables.clone(), table);
    let row = ops.fetch_by_id(id).await?.ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success(table, row, Some(Meta::empty())))
}

pub async fn create_row(
    state: &AppState,
    user: &AuthUser,
    table: &str,
    payload: Value,
) -> AppResult<ApiResponse<Value>> {
    let hook = table_hook(state, user, table, None)?;
    let row = hook.insert(&payload).await?;
    tracing::info!(table, actor = %user.actor.email, "row created");
    Ok(ApiResponse::success("Created", row, Some(Meta::empty())))
}

pub async fn bulk_create(
    state: &AppState,
    user: &AuthUser,
    table: &str,
    rows: Vec<Value>,
) -> AppResult<ApiResponse<Vec<Value>>> {
    if rows.is_empty() {
        return Err(AppError::BadRequest("no rows to insert".into()));
    }
    let hook = table_hook(state, user, table, None)?;
    let inserted = hook.bulk_insert(&rows).await?;
    tracing::info!(table, count = inserted.len(), actor = %user.actor.email, "rows created");
    let meta = Meta::count(inserted.len());
    Ok(ApiResponse::success("Created", inserted, Some(meta)))
}

pub async fn update_row(
    state: &AppState,
    user: &AuthUser,
    table: &str,
    id: &str,
    patch: Value,
) -> AppResult<ApiResponse<Value>> {
    let hook = table_hook(state, user, table, None)?;
    let row = hook.update(id, &patch).await?;
    Ok(ApiResponse::success("Updated", row, Some(Meta::empty())))
}

pub async fn bulk_update(
    state: &AppState,
    user: &AuthUser,
    table: &str,
    items: Vec<BulkUpdateItem>,
) -> AppResult<ApiResponse<Vec<Value>>> {
    let hook = table_hook(state, user, table, None)?;
    let items = items.into_iter().map(RowUpdate::from).collect::<Vec<_>>();
    let rows = hook.bulk_update(&items).await?;
    let meta = Meta::count(rows.len());
    Ok(ApiResponse::success("Updated", rows, Some(meta)))
}

pub async fn delete_row(
    state: &AppState,
    user: &AuthUser,
    table: &str,
    id: &str,
) -> AppResult<ApiResponse<Deleted>> {
    let hook = table_hook(state, user, table, None)?;
    hook.remove(id).await?;
    tracing::info!(table, id, actor = %user.actor.email, "row deleted");
    Ok(ApiResponse::success(
        "Deleted",
        Deleted { id: id.to_string() },
        Some(Meta::empty()),
    ))
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct ProductStats {
    pub total: usize,
    pub in_stock: usize,
    pub out_of_stock: usize,
    pub low_stock: usize,
    pub featured: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardSummary {
    pub products: ProductStats,
    pub brands: usize,
    pub banners: usize,
    pub orders: usize,
    pub orders_by_status: BTreeMap<String, usize>,
}

async fn load<T: Record>(user: &AuthUser) -> AppResult<Vec<T>> {
    let hook = RemoteTable::<T>::for_record(user.scope.tables.clone())
        .options(admin_options(T::TABLE))
        .build();
    hook.refetch().await?;
    Ok(hook.rows())
}

/// Counters shown on the back-office landing page.
pub async fn summary(user: &AuthUser) -> AppResult<ApiResponse<DashboardSummary>> {
    let (products, brands, banners, orders) = tokio::try_join!(
        load::<Product>(user),
        load::<Brand>(user),
        load::<Banner>(user),
        load::<Order>(user),
    )?;

    let products_stats = ProductStats {
        total: products.len(),
        in_stock: products.iter().filter(|p| p.in_stock()).count(),
        out_of_stock: products.iter().filter(|p| !p.in_stock()).count(),
        low_stock: products.iter().filter(|p| p.low_stock()).count(),
        featured: products.iter().filter(|p| p.featured).count(),
    };
    let mut orders_by_status = BTreeMap::new();
    for order in &orders {
        *orders_by_status
            .entry(order.status.as_str().to_string())
            .or_insert(0) += 1;
    }

    let data = DashboardSummary {
        products: products_stats,
        brands: brands.len(),
        banners: banners.len(),
        orders: orders.len(),
        orders_by_status,
    };
    Ok(ApiResponse::success("Dashboard", data, Some(Meta::empty())))
}
