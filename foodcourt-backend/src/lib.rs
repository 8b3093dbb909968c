pub mod auth;
pub mod error;
pub mod routes;

use core::future::Future;
use std::sync::Arc;

use axum::extract::FromRef;
use axum::http::Request;
use axum::routing::{get, post, put};
use axum::Router;
use error::AppError;
use foodcourt_config::Config;
use foodcourt_database::{get_database_connection, run_migrations, PgEntitlementStore};
use foodcourt_entitlement::{
    AdminCredentialStore, AdminGateway, EntitlementService, EntitlementStore, InMemoryStore,
    EVENT_MEAL_SCHEMA,
};
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo};
use tokio::net::TcpListener;
use tokio::select;
use tokio::sync::watch;
use tower::ServiceExt as _;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, info_span, warn, Instrument as _};

use crate::routes::admin::login;
use crate::routes::health::health;
use crate::routes::meals::{mark_meal, reset_all_meals, reset_meal, stats};
use crate::routes::mobile::{get_mobile_participant, mark_mobile_meal, mobile_check};
use crate::routes::not_found;
use crate::routes::participants::{get_participant, list_participants, register_participant};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub service: EntitlementService,
    pub gateway: AdminGateway,
}

fn shared<S>(store: S) -> (Arc<dyn EntitlementStore>, Arc<dyn AdminCredentialStore>)
where
    S: EntitlementStore + AdminCredentialStore + 'static,
{
    let store = Arc::new(store);
    (store.clone(), store)
}

pub fn app(state: AppState, cors_allow_any_origin: bool) -> Router {
    let router = Router::new()
        .route("/api/health", get(health))
        .route("/api/participant", post(register_participant))
        .route("/api/participant/:email", get(get_participant))
        .route("/api/participant/:email/meal", put(mark_meal))
        .route("/api/participant/:email/reset-meal", put(reset_meal))
        .route("/api/participants", get(list_participants))
        .route("/api/reset-meals", put(reset_all_meals))
        .route("/api/stats", get(stats))
        .route("/api/admin/login", post(login))
        .route("/api/mobile-check", get(mobile_check))
        .route("/api/mobile/participant/:email", get(get_mobile_participant))
        .route("/api/mobile/participant/:email/meal", put(mark_mobile_meal))
        .fallback(not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new());
    if cors_allow_any_origin {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

pub async fn setup_server(config: &Config) -> Result<Router, AppError> {
    info!("starting up server...");

    let (entitlements, admins) = if let Some(database_url) = &config.database_url {
        let pool = get_database_connection(database_url)?;
        run_migrations(&pool).await?;
        shared(PgEntitlementStore::new(pool, EVENT_MEAL_SCHEMA))
    } else {
        warn!("no database_url configured, participants are only kept in memory");
        shared(InMemoryStore::new())
    };

    let service =
        EntitlementService::new(entitlements).with_store_timeout(config.store_timeout());
    let gateway = AdminGateway::new(admins, config.store_timeout());

    match &config.admin.password {
        Some(password) => {
            gateway.bootstrap(&config.admin.username, password).await?;
        }
        None => info!("no admin password configured, not creating an admin credential"),
    }

    Ok(app(
        AppState { service, gateway },
        config.cors_allow_any_origin,
    ))
}

/// Binds the listener and returns the accept loop. The loop ends after
/// ctrl-c or SIGTERM once every open connection has finished.
pub async fn run_server(
    config: Config,
) -> Result<impl Future<Output = Result<(), AppError>>, AppError> {
    let app = setup_server(&config).await?;
    let listener = TcpListener::bind(config.listen_address).await?;

    // tell the connections to shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let shutdown_tx = Arc::new(shutdown_tx);

    // wait for the connections to finish shutdown
    let (closed_tx, closed_rx) = watch::channel(());

    info!(address = %config.listen_address, "started up server...");

    Ok(async move {
        #[allow(clippy::redundant_pub_crate)]
        loop {
            select! {
                accept = listener.accept() => {
                    let (socket, remote_addr) = match accept {
                        Ok(accepted) => accepted,
                        Err(err) => {
                            error!("failed to accept connection: {err}");
                            continue;
                        }
                    };
                    let connection = serve_connection(
                        app.clone(),
                        socket,
                        Arc::clone(&shutdown_tx),
                        closed_rx.clone(),
                    );
                    tokio::spawn(connection.instrument(info_span!("connection", %remote_addr)));
                }
                () = shutdown_signal() => {
                    warn!("shutting down, waiting for open connections");
                    drop(shutdown_rx);
                    drop(closed_rx);
                    closed_tx.closed().await;
                    break;
                }
            }
        }

        info!("server stopped");
        Ok(())
    })
}

async fn serve_connection(
    app: Router,
    socket: tokio::net::TcpStream,
    shutdown_tx: Arc<watch::Sender<()>>,
    closed_rx: watch::Receiver<()>,
) {
    let socket = TokioIo::new(socket);
    let hyper_service = hyper::service::service_fn(move |request: Request<Incoming>| {
        app.clone().oneshot(request)
    });

    let builder = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new());
    let connection = builder.serve_connection_with_upgrades(socket, hyper_service);
    tokio::pin!(connection);

    #[allow(clippy::redundant_pub_crate)]
    let result = select! {
        result = connection.as_mut() => result,
        () = shutdown_tx.closed() => {
            connection.as_mut().graceful_shutdown();
            connection.as_mut().await
        }
    };
    if let Err(err) = result {
        error!("failed to serve connection: {err:#}");
    }

    drop(closed_rx);
}

#[allow(clippy::redundant_pub_crate)]
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {err}");
            core::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!("failed to install SIGTERM handler: {err}");
                core::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
