//! Server configuration from environment variables.

use std::path::PathBuf;

use tracing::warn;

use mmsearch_core::defaults;

/// Which vector store backs the search endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreKind {
    /// pgvector over `DATABASE_URL`.
    Postgres,
    /// Brute-force store loaded from `MEMORY_STORE_PATH`.
    Memory,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// SPA bundle served for every unmatched GET.
    pub static_dir: PathBuf,
    pub max_body_bytes: usize,
    pub store: StoreKind,
    pub database_url: String,
    pub memory_store_path: Option<PathBuf>,
    /// Apply pending migrations at startup (Postgres only).
    pub run_migrations: bool,
    /// CORS whitelist; empty allows any origin.
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: defaults::SERVER_HOST.to_string(),
            port: defaults::SERVER_PORT,
            static_dir: PathBuf::from(defaults::STATIC_DIR),
            max_body_bytes: defaults::MAX_BODY_BYTES,
            store: StoreKind::Postgres,
            database_url: defaults::DATABASE_URL.to_string(),
            memory_store_path: None,
            run_migrations: false,
            allowed_origins: Vec::new(),
        }
    }
}

fn parse_or<T: std::str::FromStr>(name: &str, raw: Option<String>, default: T) -> T {
    match raw {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(variable = name, value = %raw, "Invalid value, using default");
            default
        }),
        None => default,
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let store = match lookup("VECTOR_STORE").map(|s| s.trim().to_lowercase()) {
            None => StoreKind::Postgres,
            Some(s) if s == "postgres" || s == "pgvector" => StoreKind::Postgres,
            Some(s) if s == "memory" => StoreKind::Memory,
            Some(other) => {
                warn!(value = %other, "Unknown VECTOR_STORE, using postgres");
                StoreKind::Postgres
            }
        };

        let allowed_origins = lookup("ALLOWED_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_or("PORT", lookup("PORT"), defaults.port),
            static_dir: lookup("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.static_dir),
            max_body_bytes: parse_or(
                "MAX_BODY_BYTES",
                lookup("MAX_BODY_BYTES"),
                defaults.max_body_bytes,
            ),
            store,
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            memory_store_path: lookup("MEMORY_STORE_PATH").map(PathBuf::from),
            run_migrations: lookup("RUN_MIGRATIONS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            allowed_origins,
        }
    }
}
