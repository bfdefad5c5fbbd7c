//! Connection pool for the pgvector store.

use std::time::{Duration, Instant};

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info, warn};

use mmsearch_core::{Error, Result};

/// Default maximum number of connections in the pool.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Default time to wait for a free connection, in seconds.
///
/// Kept below the search stage timeout so a saturated pool surfaces as a
/// pool error rather than a stage timeout.
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 3;

/// Default idle timeout in seconds.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;

/// Pool sizing and timeouts, read from `DB_*` variables.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolConfig {
    pub max_connections: u32,
    /// Connections kept open while idle. Clamped to `max_connections`.
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS),
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
        }
    }
}

fn positive_or<T>(name: &str, raw: Option<String>, default: T) -> T
where
    T: std::str::FromStr + PartialOrd + Default + std::fmt::Display + Copy,
{
    let Some(raw) = raw else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(n) if n > T::default() => n,
        _ => {
            warn!(
                subsystem = "database",
                component = "pool",
                variable = name,
                value = %raw,
                default = %default,
                "Invalid pool setting, using default"
            );
            default
        }
    }
}

impl PoolConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup. Zero and unparsable values
    /// fall back to the default with a warning; `DB_MIN_CONNECTIONS` may be 0.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let secs = |name: &str, default: Duration| {
            Duration::from_secs(positive_or(name, lookup(name), default.as_secs()))
        };

        let min_connections = match lookup("DB_MIN_CONNECTIONS") {
            Some(raw) => raw.trim().parse::<u32>().unwrap_or_else(|_| {
                warn!(
                    subsystem = "database",
                    component = "pool",
                    variable = "DB_MIN_CONNECTIONS",
                    value = %raw,
                    default = defaults.min_connections,
                    "Invalid pool setting, using default"
                );
                defaults.min_connections
            }),
            None => defaults.min_connections,
        };

        Self {
            max_connections: positive_or(
                "DB_MAX_CONNECTIONS",
                lookup("DB_MAX_CONNECTIONS"),
                defaults.max_connections,
            ),
            min_connections,
            acquire_timeout: secs("DB_ACQUIRE_TIMEOUT_SECS", defaults.acquire_timeout),
            idle_timeout: secs("DB_IDLE_TIMEOUT_SECS", defaults.idle_timeout),
        }
    }

    fn options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections.min(self.max_connections))
            .acquire_timeout(self.acquire_timeout)
            .idle_timeout(self.idle_timeout)
    }
}

/// Open a pool and wait for the first connection.
pub async fn create_pool(database_url: &str, config: &PoolConfig) -> Result<PgPool> {
    let start = Instant::now();

    info!(
        subsystem = "database",
        component = "pool",
        op = "create",
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        acquire_timeout_secs = config.acquire_timeout.as_secs(),
        "Creating database connection pool"
    );

    let pool = config
        .options()
        .connect(database_url)
        .await
        .map_err(Error::Database)?;

    info!(
        subsystem = "database",
        component = "pool",
        op = "established",
        pool_size = pool.size(),
        pool_idle = pool.num_idle(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Database connection pool established"
    );
    Ok(pool)
}

/// Point-in-time pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolMetrics {
    pub size: u32,
    pub idle: usize,
}

impl PoolMetrics {
    pub fn of(pool: &PgPool) -> Self {
        Self {
            size: pool.size(),
            idle: pool.num_idle(),
        }
    }

    /// Every open connection is checked out.
    pub fn is_saturated(&self) -> bool {
        self.size > 0 && self.idle == 0
    }
}

/// Log pool occupancy; warns when no idle connections remain.
pub fn log_pool_metrics(pool: &PgPool) -> PoolMetrics {
    let metrics = PoolMetrics::of(pool);

    debug!(
        subsystem = "database",
        component = "pool",
        op = "metrics",
        pool_size = metrics.size,
        pool_idle = metrics.idle,
        "Pool health check"
    );

    if metrics.is_saturated() {
        warn!(
            subsystem = "database",
            component = "pool",
            pool_size = metrics.size,
            "Connection pool has no idle connections"
        );
    }
    metrics
}
