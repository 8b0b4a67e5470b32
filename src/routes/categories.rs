use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing,
};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    core::{
        auth,
        error::{AppError, StdResponse},
        state::AppState,
    },
    services::catalog,
};

/// Public category lookups plus the admin-only seeding endpoints.
pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/categories", routing::get(list_categories))
        .route(
            "/api/categories/{id}/subcategories",
            routing::get(list_subcategories),
        )
        .merge(
            Router::new()
                .route("/api/admin/categories", routing::post(create_category))
                .route(
                    "/api/admin/categories/{id}/subcategories",
                    routing::post(create_subcategory),
                )
                .route_layer(axum::middleware::from_fn_with_state(
                    state,
                    auth::admins_authorization,
                )),
        )
}

async fn list_categories(State(state): State<AppState>) -> impl IntoResponse {
    let categories = catalog::list_categories(&state.store).await;
    StdResponse::ok(categories, "Categories retrieved successfully")
}

async fn list_subcategories(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let subcategories = catalog::list_subcategories(&state.store, id).await?;
    Ok(StdResponse::ok(
        subcategories,
        "Subcategories retrieved successfully",
    ))
}

#[derive(Deserialize, ToSchema)]
struct CreateCategoryReq {
    name: String,
    #[serde(default)]
    description: Option<String>,
}

async fn create_category(
    State(state): State<AppState>,
    Json(body): Json<CreateCategoryReq>,
) -> Result<impl IntoResponse, AppError> {
    let category = catalog::create_category(&state.store, &body.name, body.description).await?;
    Ok(StdResponse::ok(category, "Category created successfully"))
}

async fn create_subcategory(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Json(body): Json<CreateCategoryReq>,
) -> Result<impl IntoResponse, AppError> {
    let subcategory =
        catalog::create_subcategory(&state.store, id, &body.name, body.description).await?;
    Ok(StdResponse::ok(
        subcategory,
        "Subcategory created successfully",
    ))
}
