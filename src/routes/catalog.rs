use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};

use crate::{
    dto::catalog::{ContactLink, OrderLinkQuery, ProductDetail, ProductListQuery},
    error::AppResult,
    models::{Banner, Brand, Category, Product},
    order_link::ProductOrderLink,
    response::ApiResponse,
    services::catalog_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories))
        .route("/brands", get(list_brands))
        .route("/banners", get(list_banners))
        .route("/products", get(list_products))
        .route("/products/{id}", get(get_product))
        .route("/products/{id}/order-link", get(order_link))
        .route("/contact-link", get(contact_link))
}

#[utoipa::path(
    get,
    path = "/api/catalog/categories",
    responses(
        (status = 200, description = "Active categories by sort order", body = ApiResponse<Vec<Category>>)
    ),
    tag = "Catalog"
)]
pub async fn list_categories(State(state): State<AppState>) -> Json<ApiResponse<Vec<Category>>> {
    Json(catalog_service::list_categories(&state).await)
}

#[utoipa::path(
    get,
    path = "/api/catalog/brands",
    responses(
        (status = 200, description = "Active brands by sort order", body = ApiResponse<Vec<Brand>>)
    ),
    tag = "Catalog"
)]
pub async fn list_brands(State(state): State<AppState>) -> Json<ApiResponse<Vec<Brand>>> {
    Json(catalog_service::list_brands(&state).await)
}

#[utoipa::path(
    get,
    path = "/api/catalog/banners",
    responses(
        (status = 200, description = "Banners currently scheduled", body = ApiResponse<Vec<Banner>>)
    ),
    tag = "Catalog"
)]
pub async fn list_banners(State(state): State<AppState>) -> Json<ApiResponse<Vec<Banner>>> {
    Json(catalog_service::list_banners(&state).await)
}

#[utoipa::path(
    get,
    path = "/api/catalog/products",
    params(ProductListQuery),
    responses(
        (status = 200, description = "Active products, newest first", body = ApiResponse<Vec<Product>>)
    ),
    tag = "Catalog"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> Json<ApiResponse<Vec<Product>>> {
    Json(catalog_service::list_products(&state, query).await)
}

#[utoipa::path(
    get,
    path = "/api/catalog/products/{id}",
    params(
        ("id" = String, Path, description = "Product id or slug")
    ),
    responses(
        (status = 200, description = "Product with related products", body = ApiResponse<ProductDetail>),
        (status = 404, description = "Product not found"),
    ),
    tag = "Catalog"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<ProductDetail>>> {
    let resp = catalog_service::get_product(&state, &id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/catalog/products/{id}/order-link",
    params(
        ("id" = String, Path, description = "Product id or slug"),
        OrderLinkQuery
    ),
    responses(
        (status = 200, description = "WhatsApp link pre-filled with the order", body = ApiResponse<ProductOrderLink>),
        (status = 400, description = "Invalid quantity"),
        (status = 404, description = "Product not found"),
    ),
    tag = "Catalog"
)]
pub async fn order_link(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<OrderLinkQuery>,
) -> AppResult<Json<ApiResponse<ProductOrderLink>>> {
    let resp = catalog_service::order_link(&state, &id, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/catalog/contact-link",
    responses(
        (status = 200, description = "Generic WhatsApp contact link", body = ApiResponse<ContactLink>)
    ),
    tag = "Catalog"
)]
pub async fn contact_link(State(state): State<AppState>) -> Json<ApiResponse<ContactLink>> {
    Json(catalog_service::contact_link(&state))
}
