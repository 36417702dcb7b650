use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    auth::Actor,
    dto::{
        admin::{BulkUpdateItem, Deleted},
        auth::{LoginRequest, LoginResponse},
        catalog::{ContactLink, ProductDetail},
    },
    models::{
        ActivityLog, AdminRole, AdminUser, Banner, BannerPosition, Brand, Category, InventoryLog, Order,
        OrderStatus, PaymentStatus, Product,
    },
    order_link::ProductOrderLink,
    response::{ApiResponse, Meta},
    routes::{admin, auth, catalog, diagnostics, health},
    services::{
        admin_service::{DashboardSummary, ProductStats},
        diagnostics_service::{CheckResult, CheckStatus, DiagnosticsReport},
    },
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::login,
        auth::logout,
        auth::me,
        catalog::list_categories,
        catalog::list_brands,
        catalog::list_banners,
        catalog::list_products,
        catalog::get_product,
        catalog::order_link,
        catalog::contact_link,
        admin::summary,
        admin::list_rows,
        admin::create_row,
        admin::bulk_create,
        admin::bulk_update,
        admin::get_row,
        admin::update_row,
        admin::delete_row,
        diagnostics::run_diagnostics
    ),
    components(
        schemas(
            Actor,
            Category,
            Brand,
            Product,
            Order,
            OrderStatus,
            PaymentStatus,
            Banner,
            BannerPosition,
            AdminRole,
            AdminUser,
            ActivityLog,
            InventoryLog,
            LoginRequest,
            LoginResponse,
            ProductDetail,
            ProductOrderLink,
            ContactLink,
            BulkUpdateItem,
            Deleted,
            DashboardSummary,
            ProductStats,
            DiagnosticsReport,
            CheckResult,
            CheckStatus,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductDetail>,
            ApiResponse<LoginResponse>,
            ApiResponse<DiagnosticsReport>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Catalog", description = "Storefront reads and WhatsApp order links"),
        (name = "Auth", description = "Sign in against the hosted auth service"),
        (name = "Admin", description = "Back-office table management"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
