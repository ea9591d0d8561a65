use std::sync::Arc;

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{info, warn};

use crate::config::{AppConfig, StoreKind};
use crate::users::{
    fallback::FallbackUserStore, memory::MemoryUserStore, pg::PgUserStore, UserStore,
};

fn pool_options(config: &AppConfig) -> PgPoolOptions {
    // Acquire must give up before the request budget does, or degraded
    // requests time out instead of falling back.
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(config.request_timeout() / 2)
}

async fn connect(config: &AppConfig, url: &str) -> anyhow::Result<PgPool> {
    let db = pool_options(config)
        .connect(url)
        .await
        .context("connect to database")?;

    // Run migrations if present
    if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
        warn!(error = %e, "migration failed; continuing");
    }
    Ok(db)
}

/// Pick the user store for this process.
pub async fn user_store(config: &AppConfig) -> anyhow::Result<Arc<dyn UserStore>> {
    let url = match (config.store, config.database_url.as_deref()) {
        (StoreKind::Memory, _) => {
            warn!("using in-memory user store; accounts do not survive a restart");
            return Ok(Arc::new(MemoryUserStore::new()));
        }
        (StoreKind::Postgres, Some(url)) => url,
        (StoreKind::Postgres, None) => anyhow::bail!("DATABASE_URL is not set"),
    };

    if !config.store_fallback {
        let db = connect(config, url).await?;
        info!("user store: postgres");
        return Ok(Arc::new(PgUserStore::new(db)));
    }

    let db = match connect(config, url).await {
        Ok(db) => db,
        Err(e) => {
            warn!(error = %e, "database unreachable at startup; starting degraded");
            pool_options(config)
                .connect_lazy(url)
                .context("parse DATABASE_URL")?
        }
    };
    info!("user store: postgres with in-memory fallback");
    Ok(Arc::new(FallbackUserStore::new(Arc::new(PgUserStore::new(db)))))
}
