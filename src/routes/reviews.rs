use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    core::{
        auth::{self, AuthUser},
        error::{AppError, StdResponse},
        state::AppState,
    },
    models::{PharmacyEntity, PharmacyReviewEntity},
    services::reviews::{self, SubmitReview},
};

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/api/pharmacy/{id}/reviews",
            routing::get(pharmacy_reviews).post(submit_review),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            auth::users_authorization,
        ))
}

#[derive(Serialize, ToSchema)]
struct PharmacyReviewsRes {
    pharmacy: PharmacyEntity,
    reviews: Vec<PharmacyReviewEntity>,
}

async fn pharmacy_reviews(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let (pharmacy, reviews) = reviews::pharmacy_reviews(&state.store, id).await?;
    Ok(StdResponse::ok(
        PharmacyReviewsRes { pharmacy, reviews },
        "Reviews retrieved successfully",
    ))
}

async fn submit_review(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<SubmitReview>,
) -> Result<impl IntoResponse, AppError> {
    let review = reviews::submit(&state.store, auth.id, id, body).await?;
    Ok(StdResponse::ok(review, "Review submitted successfully"))
}
