use std::sync::Arc;

use anyhow::{Context, Result};
use cohort_community::{Community, IdentityProvider, SessionTableIdentity, SqliteCohortRegistry};
use cohort_config::AppConfig;
use cohort_database::initialize_database;
use sqlx::SqlitePool;
use tracing::info;

pub mod telemetry {
    use anyhow::Result;
    use tracing::Level;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    pub fn init_tracing() -> Result<()> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = SubscriberBuilder::default()
            .with_max_level(Level::INFO)
            .with_env_filter(env_filter)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

/// Everything the server binary wires into the gateway
#[derive(Clone)]
pub struct BackendServices {
    pub db_pool: SqlitePool,
    pub community: Arc<Community>,
    pub identity: Arc<dyn IdentityProvider>,
}

impl BackendServices {
    pub async fn initialise(config: &AppConfig) -> Result<Self> {
        let db_pool = initialize_database(&config.database)
            .await
            .context("failed to initialise database")?;

        let registry = Arc::new(SqliteCohortRegistry::new(db_pool.clone()));
        let identity: Arc<dyn IdentityProvider> = Arc::new(SessionTableIdentity::new(db_pool.clone()));
        let community = Arc::new(Community::new(db_pool.clone(), registry, config.community.clone()));

        let channels = community
            .store()
            .list_channels()
            .await
            .context("failed to read existing channels")?;
        info!(channels = channels.len(), "community services ready");

        Ok(Self {
            db_pool,
            community,
            identity,
        })
    }
}

pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
