use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use parley::{
    api::{create_router, AppState, RateLimiter},
    config::Config,
    db,
    error::AppError,
};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,parley=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("🚀 Starting Parley server v{}...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("✅ Configuration loaded");

    // Setup database with proper connection pooling
    let pool = db::connect(&config).await?;
    tracing::info!("✅ Database connected: {}", config.database_url);

    // Run migrations
    db::migrate(&pool).await?;
    tracing::info!("✅ Database migrations completed");

    let rate_limiter = Arc::new(RateLimiter::new(
        config.rate_limit_max_requests,
        config.rate_limit_window_secs,
    ));
    tracing::info!(
        "✅ Rate limiter configured ({} req/{}s per IP)",
        config.rate_limit_max_requests,
        config.rate_limit_window_secs
    );

    let addr = config.server_address();
    let state = AppState::new(pool, config);

    // Spawn background task for rate limiter cleanup
    {
        let limiter = rate_limiter.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(300)); // Every 5 minutes
            loop {
                interval.tick().await;
                limiter.cleanup().await;
                tracing::debug!("🧹 Rate limiter cache cleaned up");
            }
        });
        tracing::info!("✅ Rate limiter cleanup task started");
    }

    // Build router
    let app = create_router(state, rate_limiter);

    tracing::info!("🌐 Server listening on http://{}", addr);
    tracing::info!("🏥 Health check: http://{}/api/health", addr);
    tracing::info!("");
    tracing::info!("📚 API Endpoints:");
    tracing::info!("  POST /api/auth/signup                 - Register new user");
    tracing::info!("  POST /api/auth/signin                 - Sign in with email and password");
    tracing::info!("  POST /api/auth/signout                - Sign out");
    tracing::info!("  GET  /api/auth/me                     - Current user (requires auth)");
    tracing::info!("  GET  /api/profile, PUT /api/profile   - Own profile (requires auth)");
    tracing::info!("  GET  /api/users/all | search | :id/profile (requires auth)");
    tracing::info!("  GET  /api/conversations, POST /api/conversations (requires auth)");
    tracing::info!("  GET  /api/conversations/:id/details   (requires auth)");
    tracing::info!("  GET  /api/conversations/:id/messages, POST ... (requires auth)");
    tracing::info!("  POST /api/conversations/:id/read      (requires auth)");
    tracing::info!("  GET  /api/contacts, POST /api/contacts (requires auth)");
    tracing::info!("");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .map_err(|e| AppError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}
