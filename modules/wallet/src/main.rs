use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use wallet_rs::{
    build_router,
    config::Config,
    db,
    repos::{
        InMemoryUserStore, InMemoryWalletCache, InMemoryWalletStore, PgUserStore, PgWalletStore,
        RedisWalletCache, UserStore, WalletCache, WalletRepository, WalletStore,
    },
    seed::seed_demo_data,
    services::{UserService, WalletService},
    AppState,
};

fn init_tracing(development: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,wallet_rs=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    if development {
        registry.with(tracing_subscriber::fmt::layer().pretty()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    init_tracing(config.is_development());

    tracing::info!(
        host = %config.host,
        port = config.port,
        environment = %config.environment,
        "Starting wallet service..."
    );

    // Store
    let (wallet_store, user_store): (Arc<dyn WalletStore>, Arc<dyn UserStore>) =
        match &config.database_url {
            Some(database_url) => {
                tracing::info!("Connecting to database...");
                let pool = db::init_pool(
                    database_url,
                    config.db_max_connections,
                    config.db_acquire_timeout,
                    config.statement_timeout,
                )
                .await?;

                tracing::info!("Running migrations...");
                db::run_migrations(&pool).await?;

                let wallets: Arc<dyn WalletStore> = Arc::new(
                    PgWalletStore::new(pool.clone(), config.lock_timeout)
                        .with_statement_timeout(config.statement_timeout),
                );
                let users: Arc<dyn UserStore> = Arc::new(PgUserStore::new(pool));
                (wallets, users)
            }
            None => {
                tracing::warn!("DATABASE_URL not set, using in-memory store (data is not durable)");
                let wallets: Arc<dyn WalletStore> =
                    Arc::new(InMemoryWalletStore::with_lock_timeout(config.lock_timeout));
                let users: Arc<dyn UserStore> = Arc::new(InMemoryUserStore::new());
                (wallets, users)
            }
        };

    // Cache
    let cache: Option<Arc<dyn WalletCache>> = if config.cache_disabled {
        tracing::info!("Wallet cache disabled");
        None
    } else {
        match &config.redis_url {
            Some(redis_url) => {
                match RedisWalletCache::connect(redis_url, config.cache_op_timeout, config.cache_ttl)
                    .await
                {
                    Ok(cache) => {
                        tracing::info!("Connected to Redis wallet cache");
                        Some(Arc::new(cache))
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Redis unavailable, running without cache");
                        None
                    }
                }
            }
            None => {
                tracing::info!("REDIS_URL not set, using in-memory wallet cache");
                Some(Arc::new(InMemoryWalletCache::new()))
            }
        }
    };

    let repo = WalletRepository::new(wallet_store, cache);
    let users = UserService::new(user_store, config.password_policy());

    if config.seed_demo_data {
        seed_demo_data(&users, &repo).await?;
    }

    let app = build_router(AppState {
        wallets: WalletService::with_max_conflict_retries(repo, config.max_conflict_retries),
        users,
    });

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Wallet service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
