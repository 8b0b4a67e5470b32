use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use utoipa_axum::router::OpenApiRouter;

use crate::{
    core::{
        auth::{self, AuthUser},
        error::{AppError, StdResponse},
        state::AppState,
    },
    services::payments::{self, UpdatePaymentStatus},
};

pub fn routes_with_openapi(state: AppState) -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/api/payments",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(update_payment_status))
            .layer(axum::middleware::from_fn_with_state(
                state,
                auth::users_authorization,
            )),
    )
}

/// Drive a payment through its state machine. Refunds are admin-only.
#[utoipa::path(
    patch,
    path = "/{id}/status",
    tags = ["Payments"],
    params(
        ("id" = i32, Path, description = "Payment ID")
    ),
    responses(
        (status = 200, description = "Payment updated", body = StdResponse<crate::models::PaymentEntity, String>)
    )
)]
async fn update_payment_status(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<UpdatePaymentStatus>,
) -> Result<impl IntoResponse, AppError> {
    let payment = payments::update_status(&state.store, auth, id, body).await?;
    Ok(StdResponse::ok(payment, "Payment updated successfully"))
}
