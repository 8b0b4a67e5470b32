use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber, honoring `RUST_LOG`.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
}

/// Loads `.env` if present; missing files are fine.
pub fn init_env() {
    dotenvy::dotenv().ok();
}
