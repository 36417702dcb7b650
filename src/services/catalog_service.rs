use serde::Serialize;
use serde_json::Value;

use crate::{
    dto::catalog::{ContactLink, OrderLinkQuery, ProductDetail, ProductListQuery},
    error::{AppError, AppResult},
    hooks::TableState,
    models::{Banner, Brand, Category, Product},
    order_link::ProductOrderLink,
    response::{ApiResponse, Meta},
    state::AppState,
};

const RELATED_LIMIT: usize = 4;

fn listing<T: Serialize>(message: &str, state: TableState<T>) -> ApiResponse<Vec<T>> {
    let meta = Meta::count(state.rows.len()).with_error(state.error);
    ApiResponse::success(message, state.rows, Some(meta))
}

pub async fn list_categories(state: &AppState) -> ApiResponse<Vec<Category>> {
    listing("Categories", state.catalog.categories().await)
}

pub async fn list_brands(state: &AppState) -> ApiResponse<Vec<Brand>> {
    listing("Brands", state.catalog.brands().await)
}

pub async fn list_banners(state: &AppState) -> ApiResponse<Vec<Banner>> {
    listing("Banners", state.catalog.banners().await)
}

/// Matches a product's foreign key or the slug of the embedded relation.
fn related_to(key: Option<&str>, embedded: Option<&Value>, wanted: &str) -> bool {
    key == Some(wanted)
        || embedded
            .and_then(|row| row.get("slug"))
            .and_then(Value::as_str)
            == Some(wanted)
}

pub async fn list_products(
    state: &AppState,
    query: ProductListQuery,
) -> ApiResponse<Vec<Product>> {
    let mut products = state.catalog.products().await;
    products.rows.retain(|product| {
        query.category.as_deref().is_none_or(|wanted| {
            related_to(product.category_id.as_deref(), product.categories.as_ref(), wanted)
        }) && query.brand.as_deref().is_none_or(|wanted| {
            related_to(product.brand_id.as_deref(), product.brands.as_ref(), wanted)
        }) && query.featured.is_none_or(|featured| product.featured == featured)
    });
    listing("Products", products)
}

pub async fn get_product(state: &AppState, id_or_slug: &str) -> AppResult<ApiResponse<ProductDetail>> {
    let product = state
        .catalog
        .product(id_or_slug)
        .await
        .ok_or(AppError::NotFound)?;
    let related = state.catalog.related(&product, RELATED_LIMIT).await;
    Ok(ApiResponse::success(
        "Product",
        ProductDetail { product, related },
        Some(Meta::empty()),
    ))
}

pub async fn order_link(
    state: &AppState,
    id_or_slug: &str,
    query: OrderLinkQuery,
) -> AppResult<ApiResponse<ProductOrderLink>> {
    if query.quantity == 0 {
        return Err(AppError::BadRequest("quantity must be at least 1".into()));
    }
    let product = state
        .catalog
        .product(id_or_slug)
        .await
        .ok_or(AppError::NotFound)?;
    if i64::from(query.quantity) > i64::from(product.stock) {
        return Err(AppError::BadRequest(format!(
            "only {} of {} in stock",
            product.stock.max(0),
            product.name
        )));
    }
    let link = state.order_link.for_product(&product, query.quantity);
    Ok(ApiResponse::success("Order link", link, Some(Meta::empty())))
}

pub fn contact_link(state: &AppState) -> ApiResponse<ContactLink> {
    let data = ContactLink {
        phone: state.order_link.phone().to_string(),
        url: state.order_link.contact_url(),
    };
    ApiResponse::success("Contact link", data, Some(Meta::empty()))
}
