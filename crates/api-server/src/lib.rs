//! HTTP/JSON edge (§6) over the replay-training core: session lifecycle,
//! trading, account/report queries, and the user/config surface.

pub mod config;
pub mod error;
pub mod request_id;
pub mod state;
pub mod training_routes;
pub mod users_routes;

pub use error::AppError;
pub use state::AppState;

use axum::middleware;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use config::ServerConfig;

/// Builds the full `Router<AppState>`, one route module per §6 component.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(training_routes::training_routes())
        .merge(users_routes::users_routes())
        .layer(middleware::from_fn(request_id::request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Process entry point: load configuration, initialise tracing, bind and
/// serve. `main.rs`'s Python-multiprocessing guard runs before this.
pub async fn run_server() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if json_logging {
        tracing_subscriber::fmt().json().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = ServerConfig::from_env()?;
    tracing::info!(bind_addr = %config.bind_addr, data_dir = %config.data_dir, "starting replay-training api-server");

    let state = AppState::new(&config);
    let app = app(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
