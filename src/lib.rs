//! Book of Thoughts
//!
//! Topic hierarchy service with:
//! - Neo4j knowledge graph as the source of truth for topics
//! - Record normalization and hierarchy materialization
//! - Moka-backed TTL cache for the expensive aggregates
//! - SQLite shadow store kept in sync for graph-outage fallback
//! - HTTP API (axum) and a small CLI

pub mod api;
pub mod cache;
pub mod neo4j;
pub mod shadow;
pub mod topics;

#[cfg(test)]
pub(crate) mod test_helpers;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// YAML config structs (deserialization targets)
// ============================================================================

/// Top-level YAML configuration file structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: ServerYamlConfig,
    pub neo4j: Neo4jYamlConfig,
    pub cache: CacheYamlConfig,
    pub shadow: ShadowYamlConfig,
    pub sync: SyncYamlConfig,
}

/// Server configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerYamlConfig {
    pub port: u16,
}

impl Default for ServerYamlConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

/// Neo4j configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Neo4jYamlConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
}

impl Default for Neo4jYamlConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".into(),
            user: "neo4j".into(),
            password: "thoughts123".into(),
        }
    }
}

/// Cache configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheYamlConfig {
    /// TTL of listings, hierarchy and details; search uses half
    pub ttl_secs: u64,
    pub max_capacity: u64,
}

impl Default for CacheYamlConfig {
    fn default() -> Self {
        Self {
            ttl_secs: cache::DEFAULT_TTL.as_secs(),
            max_capacity: 10_000,
        }
    }
}

/// Shadow store configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ShadowYamlConfig {
    pub database_path: String,
}

impl Default for ShadowYamlConfig {
    fn default() -> Self {
        Self {
            database_path: "thoughts.db".into(),
        }
    }
}

/// Sync configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncYamlConfig {
    /// Minimum spacing between unforced full syncs
    pub debounce_secs: u64,
}

impl Default for SyncYamlConfig {
    fn default() -> Self {
        Self {
            debounce_secs: shadow::DEFAULT_DEBOUNCE.as_secs(),
        }
    }
}

// ============================================================================
// Runtime config (what the application actually uses)
// ============================================================================

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,
    pub server_port: u16,
    pub shadow_db_path: String,
    pub cache_ttl: Duration,
    pub cache_max_capacity: u64,
    pub sync_debounce: Duration,
}

impl Config {
    /// Equivalent to from_yaml_and_env(None).
    pub fn from_env() -> Result<Self> {
        Self::from_yaml_and_env(None)
    }

    /// Load configuration from an optional YAML file, then override with env vars.
    ///
    /// Priority: env var > YAML > default
    ///
    /// If `yaml_path` is None, tries "config.yaml" in CWD. If the file doesn't
    /// exist, falls back to pure env var / defaults.
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> Result<Self> {
        let yaml = Self::load_yaml(yaml_path);

        Ok(Self {
            neo4j_uri: std::env::var("NEO4J_URI").unwrap_or(yaml.neo4j.uri),
            neo4j_user: std::env::var("NEO4J_USER").unwrap_or(yaml.neo4j.user),
            neo4j_password: std::env::var("NEO4J_PASSWORD").unwrap_or(yaml.neo4j.password),
            server_port: env_parse("SERVER_PORT").unwrap_or(yaml.server.port),
            shadow_db_path: std::env::var("SHADOW_DB_PATH").unwrap_or(yaml.shadow.database_path),
            cache_ttl: Duration::from_secs(
                env_parse("CACHE_TTL_SECS").unwrap_or(yaml.cache.ttl_secs),
            ),
            cache_max_capacity: yaml.cache.max_capacity,
            sync_debounce: Duration::from_secs(
                env_parse("SYNC_DEBOUNCE_SECS").unwrap_or(yaml.sync.debounce_secs),
            ),
        })
    }

    /// Address the HTTP server listens on (all interfaces)
    pub fn bind_addr(&self) -> std::net::SocketAddr {
        std::net::SocketAddr::from(([0, 0, 0, 0], self.server_port))
    }

    /// Try to load and parse a YAML config file. Returns defaults on any failure.
    fn load_yaml(yaml_path: Option<&Path>) -> YamlConfig {
        let default_path = Path::new("config.yaml");
        let path = yaml_path.unwrap_or(default_path);

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    YamlConfig::default()
                }
            },
            Err(_) => {
                tracing::debug!(
                    "No config file at {}, using env vars / defaults",
                    path.display()
                );
                YamlConfig::default()
            }
        }
    }
}

/// Parse an env var, ignoring it when unset or malformed
fn env_parse<T: std::str::FromStr>(var: &str) -> Option<T> {
    std::env::var(var).ok().and_then(|s| s.trim().parse().ok())
}

// ============================================================================
// Application state
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub topics: Arc<topics::TopicsService>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Connect to Neo4j, open the shadow store and wire the service
    pub async fn new(config: Config) -> Result<Self> {
        let graph = Arc::new(
            neo4j::Neo4jClient::new(&config.neo4j_uri, &config.neo4j_user, &config.neo4j_password)
                .await
                .with_context(|| format!("Failed to connect to Neo4j at {}", config.neo4j_uri))?,
        );

        let shadow = Arc::new(
            shadow::SqliteShadowStore::open(&config.shadow_db_path).with_context(|| {
                format!("Failed to open shadow store at {}", config.shadow_db_path)
            })?,
        );

        let cache = cache::TopicCache::new(
            Arc::new(cache::MokaCacheStore::new(config.cache_max_capacity)),
            config.cache_ttl,
        );

        let topics = Arc::new(topics::TopicsService::new(
            graph,
            cache,
            shadow,
            config.sync_debounce,
        ));

        Ok(Self {
            topics,
            config: Arc::new(config),
        })
    }
}

/// Serve the HTTP API until Ctrl-C
pub async fn start_server(config: Config) -> Result<()> {
    let state = AppState::new(config).await?;
    tracing::info!("Connected to Neo4j and shadow store");

    let router = api::create_router(Arc::new(api::handlers::ServerState {
        topics: state.topics.clone(),
    }));

    let addr = state.config.bind_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutting down");
        })
        .await
        .context("Server error")?;

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
