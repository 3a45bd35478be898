//! Connection pool for the history backend.

use std::time::Duration;

use sqlx_core::pool::PoolOptions;
use sqlx_postgres::{PgPool, Postgres};
use tracing::{debug, instrument};

use crate::config::PostgresConfig;
use crate::error::{PostgresError, Result};

/// Lifetime applied when `max_lifetime_secs` is unset.
const DEFAULT_MAX_LIFETIME: Duration = Duration::from_secs(30 * 60);

/// Pool limits derived from a [`PostgresConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PoolLimits {
    max: u32,
    min: u32,
    acquire_timeout: Duration,
    idle_timeout: Option<Duration>,
    max_lifetime: Duration,
}

impl PoolLimits {
    fn from_config(config: &PostgresConfig) -> Result<Self> {
        let max = config.pool_size;
        if max == 0 {
            return Err(PostgresError::config("pool_size must be at least 1"));
        }
        // Keep a quarter of the pool warm unless told otherwise.
        let min = config.min_connections.unwrap_or(max / 4).clamp(1, max);
        Ok(Self {
            max,
            min,
            acquire_timeout: Duration::from_millis(config.connect_timeout_ms),
            idle_timeout: config.idle_timeout_ms.map(Duration::from_millis),
            max_lifetime: config
                .max_lifetime_secs
                .map_or(DEFAULT_MAX_LIFETIME, Duration::from_secs),
        })
    }

    fn options(self) -> PoolOptions<Postgres> {
        PoolOptions::<Postgres>::new()
            .max_connections(self.max)
            .min_connections(self.min)
            .acquire_timeout(self.acquire_timeout)
            .idle_timeout(self.idle_timeout)
            .max_lifetime(self.max_lifetime)
    }
}

/// Opens a pool for `config.url`.
///
/// # Errors
///
/// Returns `PostgresError::Config` for an empty pool and the driver error if
/// the first connection cannot be established.
#[instrument(skip(config), fields(url = %mask_password(&config.url)))]
pub async fn create_pool(config: &PostgresConfig) -> Result<PgPool> {
    let limits = PoolLimits::from_config(config)?;
    let pool = limits.options().connect(&config.url).await?;
    debug!(max = limits.max, min = limits.min, "pool connected");
    Ok(pool)
}

/// Replaces the password of a connection URL with `****`.
pub(crate) fn mask_password(url: &str) -> String {
    let authority_start = url.find("://").map_or(0, |p| p + 3);
    let Some(at) = url[authority_start..].find('@').map(|p| p + authority_start) else {
        return url.to_string();
    };
    match url[authority_start..at].find(':') {
        Some(colon) => {
            let colon = colon + authority_start;
            format!("{}:****{}", &url[..colon], &url[at..])
        }
        None => url.to_string(),
    }
}
