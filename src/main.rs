use axum::{middleware, Router};
use secrecy::ExposeSecret;
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clubhouse::api::middleware::{auth::require_auth, session::create_session_layer};
use clubhouse::api::middleware::session::AppState;
use clubhouse::config::Config;
use clubhouse::models::User;
use clubhouse::services::access_token;
use clubhouse::{api, db, jobs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clubhouse=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Clubhouse server...");

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    // Create database pool
    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    // Run migrations
    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    // Actor recorded on automated status transitions
    let system_user = User::ensure_system_user(&pool, &config.system_user_email).await?;
    tracing::info!(user_id = %system_user.id, "System user ready");

    if let (Some(email), Some(token)) = (
        &config.bootstrap_admin_email,
        &config.bootstrap_admin_token,
    ) {
        let admin =
            User::upsert_super_admin(&pool, email, &access_token::hash(token.expose_secret()))
                .await?;
        tracing::info!(user_id = %admin.id, "Bootstrap super admin ready");
    }

    // Create session layer
    let session_layer = create_session_layer(pool.clone(), config.secure_cookies()).await?;
    tracing::info!("Session layer initialized");

    // Scheduled status transitions, plus one catch-up run for downtime
    let _scheduler =
        jobs::start_scheduler(pool.clone(), system_user.id, &config.auto_transition_cron).await?;
    if config.auto_transition_on_startup {
        jobs::spawn_startup_catch_up(pool.clone(), system_user.id);
    }

    let state = AppState::new(pool.clone(), config.clone());

    let protected = Router::new()
        .merge(api::users::router())
        .merge(api::clubs::router())
        .merge(api::club_users::router())
        .merge(api::membership_types::router())
        .merge(api::households::router())
        .merge(api::members::router())
        .route_layer(middleware::from_fn(require_auth));

    // Build router
    let app = Router::new()
        .merge(api::health::router())
        .merge(api::auth::router())
        .merge(protected)
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Listening on {}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install CTRL+C signal handler: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, cleaning up...");
}
