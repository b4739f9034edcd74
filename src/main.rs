use mpesa_stk_backend::api::{router, AppState};
use mpesa_stk_backend::config::AppConfig;
use mpesa_stk_backend::database::callback_repository::{CallbackStore, PgCallbackRepository};
use mpesa_stk_backend::database::memory::{InMemoryCallbackStore, InMemorySubscriptionStore};
use mpesa_stk_backend::database::subscription_repository::{
    PgSubscriptionRepository, SubscriptionStore,
};
use mpesa_stk_backend::database::{init_pool_from_config, run_migrations};
use mpesa_stk_backend::health::HealthChecker;
use mpesa_stk_backend::logging::init_tracing;
use mpesa_stk_backend::payments::providers::MpesaProvider;
use mpesa_stk_backend::services::{
    CallbackService, EmailNotifier, LogNotifier, PaymentIssuer, PaymentNotifier,
    SubscriptionService,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    init_tracing(&config.logging);
    config.validate()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        mpesa = ?config.mpesa,
        "🚀 Starting M-Pesa STK push backend"
    );

    // Storage: Postgres unless SKIP_EXTERNALS=true
    let (db_pool, store, subscription_store): (
        _,
        Arc<dyn CallbackStore>,
        Arc<dyn SubscriptionStore>,
    ) = if config.skip_externals {
        warn!("⏭️  SKIP_EXTERNALS=true, callbacks are kept in memory and lost on restart");
        (
            None,
            Arc::new(InMemoryCallbackStore::new()),
            Arc::new(InMemorySubscriptionStore::new()),
        )
    } else {
        info!("📊 Initializing database connection pool...");
        let pool = init_pool_from_config(&config.database).await.map_err(|e| {
            error!("Failed to initialize database pool: {}", e);
            e
        })?;
        run_migrations(&pool).await?;
        info!(
            max_connections = pool.options().get_max_connections(),
            "✅ Database ready"
        );
        (
            Some(pool.clone()),
            Arc::new(PgCallbackRepository::new(pool.clone())),
            Arc::new(PgSubscriptionRepository::new(pool)),
        )
    };

    let notifier: Arc<dyn PaymentNotifier> = match &config.email {
        Some(email) => {
            info!(host = %email.smtp_host, "📧 Payment alerts will be emailed");
            Arc::new(EmailNotifier::new(email)?)
        }
        None => {
            info!("EMAIL_HOST not set, payment alerts go to the log");
            Arc::new(LogNotifier)
        }
    };

    let gateway = Arc::new(MpesaProvider::new(config.mpesa.clone())?);
    let issuer = Arc::new(PaymentIssuer::new(gateway, config.mpesa.clone()));
    let subscriptions = Arc::new(SubscriptionService::new(
        subscription_store,
        config.subscription.clone(),
    ));
    let callbacks = Arc::new(CallbackService::new(
        store.clone(),
        notifier,
        subscriptions.clone(),
    ));

    let state = AppState {
        issuer,
        callbacks,
        store,
        subscriptions,
        health_checker: HealthChecker::new(db_pool, config.email.is_some()),
    };
    let app = router(state, &config.mpesa.callback_path);
    info!(callback_path = %config.mpesa.callback_path, "✅ Routes configured");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("❌ Failed to bind to address {}: {}", addr, e);
        e
    })?;
    info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Server shutdown complete");
    Ok(())
}
