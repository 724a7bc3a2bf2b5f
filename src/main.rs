use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use studyhall::{api, auth, state::AppState, store::Store, ws};

/// Fixed grace period for the startup probe; the only timeout this layer owns
const STARTUP_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "studyhall=debug,tower_http=debug,axum=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting studyhall...");

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8642);

    if companion_already_running(port).await {
        tracing::warn!(
            "Another instance is already answering on port {}, exiting",
            port
        );
        return;
    }

    let auth_config = Arc::new(auth::AuthConfig::from_env());

    let db_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite:studyhall.db?mode=rwc".to_string());
    let store = match Store::connect(&db_url).await {
        Ok(store) => store,
        Err(e) => {
            tracing::error!("Failed to open database {}: {}", db_url, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = store.migrate().await {
        tracing::error!("Migration failed: {}", e);
        std::process::exit(1);
    }

    let state = Arc::new(AppState::new(store));

    // Staff provisioning routes (with HTTP Basic Auth)
    let staff_routes = Router::new()
        .route(
            "/api/admin/users",
            post(api::create_user).get(api::list_users),
        )
        .layer(middleware::from_fn_with_state(
            auth_config.clone(),
            auth::staff_auth_middleware,
        ));

    let app = Router::new()
        .route("/healthz", get(api::health))
        .route("/ws", get(ws::ws_handler))
        .route("/api/quizzes", post(api::create_quiz))
        .route("/api/quizzes/{id}/rooms", get(api::quiz_rooms))
        .route("/api/attempts", post(api::start_attempt))
        .route("/api/attempts/{id}/complete", post(api::complete_attempt))
        .route("/api/announcements", post(api::create_announcement))
        .route(
            "/api/presence",
            get(api::presence_roster).post(api::presence_ping),
        )
        .route("/api/rooms/{id}/messages", get(api::room_messages))
        .merge(staff_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

/// Probe whether a companion process already answers on our port, so a
/// double start exits cleanly instead of dying on the bind call later.
async fn companion_already_running(port: u16) -> bool {
    let client = match reqwest::Client::builder()
        .timeout(STARTUP_PROBE_TIMEOUT)
        .build()
    {
        Ok(client) => client,
        Err(_) => return false,
    };

    match client
        .get(format!("http://127.0.0.1:{port}/healthz"))
        .send()
        .await
    {
        Ok(resp) => resp.status().is_success(),
        Err(_) => false,
    }
}
