use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::{core::error::AppError, core::state::AppState, models::Role};

/// Authenticated caller, resolved from the bearer token by the middleware
/// below and made available to handlers via `Extension<AuthUser>`.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: i32,
    pub role: Role,
}

async fn authorize(
    state: &AppState,
    request: &mut Request,
    required_role: Option<Role>,
) -> Result<(), AppError> {
    let token = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthorized)?;

    let tables = state.store.read().await;
    let user = tables
        .user_by_token(token)
        .ok_or(AppError::Unauthorized)?;

    if let Some(role) = required_role
        && user.role != role
    {
        return Err(AppError::Forbidden(format!(
            "Access denied. {role:?} privileges required."
        )));
    }

    let auth = AuthUser {
        id: user.id,
        role: user.role,
    };
    drop(tables);
    request.extensions_mut().insert(auth);
    Ok(())
}

/// Any authenticated user (cart, checkout, reviews, notifications).
pub async fn users_authorization(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    authorize(&state, &mut request, None).await?;
    Ok(next.run(request).await)
}

pub async fn pharmacists_authorization(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    authorize(&state, &mut request, Some(Role::Pharmacist)).await?;
    Ok(next.run(request).await)
}

pub async fn admins_authorization(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    authorize(&state, &mut request, Some(Role::Admin)).await?;
    Ok(next.run(request).await)
}

pub async fn delivery_authorization(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    authorize(&state, &mut request, Some(Role::Delivery)).await?;
    Ok(next.run(request).await)
}
