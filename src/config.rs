use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub body_limit_mb: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub driver: String,
    pub source: String,
    pub max_connections: u32,
    pub migrate: bool,
    pub drop_columns: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Redis,
    Memory,
    None,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    pub addr: String,
    pub password: String,
    pub db: i64,
    pub dial_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub write_timeout_ms: u64,
    pub ttl_secs: u64,
    pub max_entries: usize,
}

impl CacheConfig {
    pub fn dial_timeout(&self) -> Duration {
        Duration::from_millis(self.dial_timeout_ms)
    }

    /// The redis client has a single response timeout covering both directions.
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms.max(self.write_timeout_ms))
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    pub dir: String,
    pub level: String,
    pub split_by_level: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub save_path: String,
    pub server_url: String,
    pub max_size_mb: u64,
    pub allowed_exts: Vec<String>,
}

impl UploadConfig {
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_mb * 1024 * 1024
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SecurityConfig {
    pub enable_hsts: Option<bool>,
    pub hsts_max_age: Option<u64>,
    pub hsts_include_subdomains: Option<bool>,
    pub csp: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub log: LogConfig,
    pub upload: UploadConfig,
    pub security: Option<SecurityConfig>,
}

const DEFAULTS: &str = include_str!("../config/default.toml");

impl Default for AppConfig {
    fn default() -> Self {
        // The embedded defaults are part of the binary; failing to parse them is a build defect.
        match ::config::Config::builder()
            .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
            .build()
            .and_then(|cfg| cfg.try_deserialize())
        {
            Ok(app_cfg) => app_cfg,
            Err(e) => panic!("Failed to load embedded default config: {}", e),
        }
    }
}

/// Loads configuration: embedded defaults -> `blog.toml` (CWD) -> explicit file -> `BLOG__*` env.
///
/// `explicit` takes precedence over `$BLOG_CONFIG` when both are given.
pub fn load(explicit: Option<&str>) -> anyhow::Result<AppConfig> {
    let _ = dotenvy::dotenv();

    let mut builder = ::config::Config::builder()
        .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
        .add_source(::config::File::with_name("blog").required(false));

    let custom = explicit.map(str::to_owned).or_else(|| std::env::var("BLOG_CONFIG").ok());
    if let Some(custom_path) = custom {
        builder = builder.add_source(::config::File::with_name(&custom_path).required(true));
    }
    builder = builder.add_source(::config::Environment::with_prefix("BLOG").separator("__"));

    let cfg = builder.build()?;
    let app_cfg: AppConfig = cfg.try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

pub fn validate(cfg: &AppConfig) -> anyhow::Result<()> {
    if cfg.server.port == 0 {
        return Err(anyhow::anyhow!("invalid server.port: {}", cfg.server.port));
    }
    #[cfg(unix)]
    if cfg.server.port < 1024 {
        tracing::warn!("Using privileged port {} - may require elevated permissions", cfg.server.port);
    }
    if cfg.server.body_limit_mb == 0 {
        return Err(anyhow::anyhow!("server.body_limit_mb must be > 0"));
    }

    if cfg.database.driver != "sqlite" {
        return Err(anyhow::anyhow!("unsupported database.driver: {} (expected sqlite)", cfg.database.driver));
    }
    if cfg.database.source.trim().is_empty() {
        return Err(anyhow::anyhow!("database.source must not be empty"));
    }
    if cfg.database.max_connections == 0 {
        return Err(anyhow::anyhow!("database.max_connections must be > 0"));
    }
    if cfg.database.drop_columns && !cfg.database.migrate {
        return Err(anyhow::anyhow!("database.drop_columns requires database.migrate"));
    }

    match cfg.cache.backend {
        CacheBackend::Redis => {
            if cfg.cache.addr.trim().is_empty() {
                return Err(anyhow::anyhow!("cache.addr must not be empty for the redis backend"));
            }
            if !(0..=15).contains(&cfg.cache.db) {
                return Err(anyhow::anyhow!("cache.db must be in 0..=15, got {}", cfg.cache.db));
            }
            if cfg.cache.dial_timeout_ms == 0 || cfg.cache.read_timeout_ms == 0 || cfg.cache.write_timeout_ms == 0 {
                return Err(anyhow::anyhow!("cache timeouts must be > 0"));
            }
        }
        CacheBackend::Memory => {
            if cfg.cache.max_entries == 0 {
                return Err(anyhow::anyhow!("cache.max_entries must be > 0 for the memory backend"));
            }
        }
        CacheBackend::None => {}
    }

    if cfg.upload.max_size_mb == 0 {
        return Err(anyhow::anyhow!("upload.max_size_mb must be > 0"));
    }
    if cfg.upload.max_size_mb as usize > cfg.server.body_limit_mb {
        return Err(anyhow::anyhow!("upload.max_size_mb must not exceed server.body_limit_mb"));
    }
    if let Some(bad) = cfg.upload.allowed_exts.iter().find(|e| !e.starts_with('.')) {
        return Err(anyhow::anyhow!("upload.allowed_exts entries must start with '.', got {}", bad));
    }

    Ok(())
}

pub fn ensure_sqlite_parent_dir(url: &str) -> anyhow::Result<()> {
    let path = url.strip_prefix("sqlite://").or_else(|| url.strip_prefix("sqlite:"));
    if let Some(path) = path {
        if path.is_empty() || path.starts_with(":memory:") {
            return Ok(());
        }
        let path = path.split('?').next().unwrap_or(path);
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }
    Ok(())
}
