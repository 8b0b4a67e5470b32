use anyhow::{Context, Result};
use axum::{Json, Router, routing};
use medex_marketplace::{
    core::{bootstrap, config::Config, state::AppState},
    routes,
};
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> Result<()> {
    bootstrap::init_env();
    bootstrap::init_tracing();

    let config = Config::from_env();
    let state = AppState::new(config.clone());

    let documented = routes::orders::routes_with_openapi(state.clone())
        .merge(routes::payments::routes_with_openapi(state.clone()));

    let mut openapi = documented.get_openapi().clone();
    openapi.info = utoipa::openapi::InfoBuilder::new()
        .title("MedEx Marketplace API")
        .version("1.0.0")
        .build();

    let app = Router::new()
        .merge(documented)
        .merge(routes::products::routes())
        .merge(routes::categories::routes(state.clone()))
        .merge(routes::carts::routes(state.clone()))
        .merge(routes::pharmacy::routes(state.clone()))
        .merge(routes::admin::routes(state.clone()))
        .merge(routes::deliveries::routes(state.clone()))
        .merge(routes::reviews::routes(state.clone()))
        .merge(routes::notifications::routes(state.clone()))
        .route(
            "/api-docs/openapi.json",
            routing::get(move || {
                let openapi = openapi.clone();
                async move { Json(openapi) }
            }),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("MedEx marketplace listening on {addr}");
    axum::serve(listener, app)
        .await
        .context("Server terminated unexpectedly")?;
    Ok(())
}
