use foodcourt_backend::error::AppError;
use foodcourt_backend::run_server;
use foodcourt_config::get_config;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_LEVEL: &str = "info,foodcourt_backend=debug,foodcourt_entitlement=debug,\
                                 foodcourt_database=debug,tower_http=debug,hyper=info";

fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_LEVEL.into()),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // avoid putting more code here as this is outside of all spans
    setup_tracing();

    let config = get_config()?;
    run_server(config).await?.await
}
