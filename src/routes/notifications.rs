use axum::{
    Extension, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing,
};

use crate::{
    core::{
        auth::{self, AuthUser},
        error::{AppError, StdResponse},
        state::AppState,
    },
    services::notifications,
};

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new().nest(
        "/api/notifications",
        Router::new()
            .route("/", routing::get(list))
            .route("/{id}/read", routing::post(mark_read))
            .route_layer(axum::middleware::from_fn_with_state(
                state,
                auth::users_authorization,
            )),
    )
}

async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> impl IntoResponse {
    let notifications = notifications::list(&state.store, auth.id).await;
    StdResponse::ok(notifications, "Notifications retrieved successfully")
}

async fn mark_read(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let notification = notifications::mark_read(&state.store, auth.id, id).await?;
    Ok(StdResponse::ok(notification, "Notification marked as read"))
}
