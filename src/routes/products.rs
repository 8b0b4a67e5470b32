use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    core::{
        error::{AppError, StdResponse},
        state::AppState,
    },
    models::{MedicineEntity, PaymentMethod},
    services::catalog::{self, ProductQuery},
};

/// Public, unauthenticated catalog surface.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/product/user/list",
            routing::get(list_products).post(list_products_post),
        )
        .route("/api/product/{id}/", routing::get(product_detail))
        .route("/api/pharmacy/{id}/products/", routing::get(pharmacy_products))
        .route("/api/order/settings", routing::get(order_settings))
}

async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<impl IntoResponse, AppError> {
    let listing = catalog::list_visible(&state.store, &query).await;
    Ok(StdResponse::ok(listing, "Products retrieved successfully"))
}

/// Same listing, filters in the body. Kept alongside the GET variant for
/// clients whose filter sets outgrow a query string.
async fn list_products_post(
    State(state): State<AppState>,
    Json(query): Json<ProductQuery>,
) -> Result<impl IntoResponse, AppError> {
    let listing = catalog::list_visible(&state.store, &query).await;
    Ok(StdResponse::ok(listing, "Products retrieved successfully"))
}

async fn product_detail(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let product = catalog::product_detail(&state.store, id).await?;
    Ok(StdResponse::ok(product, "Product retrieved successfully"))
}

#[derive(Serialize, ToSchema)]
struct PharmacyProductsRes {
    products: Vec<MedicineEntity>,
    count: usize,
}

async fn pharmacy_products(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let products = catalog::pharmacy_products(&state.store, id).await?;
    let count = products.len();
    Ok(StdResponse::ok(
        PharmacyProductsRes { products, count },
        "Pharmacy products retrieved successfully",
    ))
}

#[derive(Serialize, ToSchema)]
struct OrderSettingsRes {
    min_order_amount: f64,
    delivery_fee: f64,
    max_cart_size: usize,
    payment_methods: Vec<PaymentMethod>,
}

async fn order_settings(State(state): State<AppState>) -> impl IntoResponse {
    StdResponse::ok(
        OrderSettingsRes {
            min_order_amount: state.config.min_order_amount,
            delivery_fee: state.config.delivery_fee,
            max_cart_size: state.config.max_cart_size,
            payment_methods: vec![
                PaymentMethod::MobileMoney,
                PaymentMethod::Paypal,
                PaymentMethod::CreditCard,
                PaymentMethod::CashOnDelivery,
            ],
        },
        "Order settings retrieved successfully",
    )
}
