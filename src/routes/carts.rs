use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing,
};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    core::{
        auth::{self, AuthUser},
        error::{AppError, StdResponse},
        state::AppState,
    },
    services::cart::{self, AddToCart},
};

/// Cart routes, any authenticated user.
pub fn routes(state: AppState) -> Router<AppState> {
    Router::new().nest(
        "/api/cart",
        Router::new()
            .route("/", routing::get(get_cart))
            .route("/add", routing::post(add_item))
            .route("/item/{id}", routing::put(update_item))
            .route("/item/{id}", routing::delete(remove_item))
            .route("/clear", routing::delete(clear_cart))
            .route("/summary", routing::get(cart_summary))
            .route_layer(axum::middleware::from_fn_with_state(
                state,
                auth::users_authorization,
            )),
    )
}

async fn get_cart(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> impl IntoResponse {
    let view = cart::get_cart(&state.store, auth.id).await;
    StdResponse::ok(view, "Cart retrieved successfully")
}

async fn add_item(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<AddToCart>,
) -> Result<impl IntoResponse, AppError> {
    let (view, _line) = cart::add_item(&state.store, &state.config, auth.id, body).await?;
    Ok(StdResponse::ok(view, "Item added to cart"))
}

#[derive(Deserialize, ToSchema)]
struct UpdateCartItemReq {
    quantity: u32,
}

async fn update_item(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<UpdateCartItemReq>,
) -> Result<impl IntoResponse, AppError> {
    let view = cart::update_item(&state.store, auth.id, id, body.quantity).await?;
    Ok(StdResponse::ok(view, "Cart item updated"))
}

async fn remove_item(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> impl IntoResponse {
    let view = cart::remove_item(&state.store, auth.id, id).await;
    StdResponse::ok(view, "Cart item removed")
}

async fn clear_cart(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> impl IntoResponse {
    let view = cart::clear(&state.store, auth.id).await;
    StdResponse::ok(view, "Cart cleared")
}

async fn cart_summary(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> impl IntoResponse {
    let summary = cart::summary(&state.store, auth.id).await;
    StdResponse::ok(summary, "Cart summary retrieved successfully")
}
