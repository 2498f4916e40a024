use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgConnectOptions;
use std::{fs, path::Path, path::PathBuf, time::Duration};

use crate::error::{EtlError, Result};
use crate::model::GeoPoint;

/// PostgreSQL caps a statement at 65535 bind parameters; curated rows bind 12 each.
pub const MAX_CHUNK_SIZE: usize = 65535 / 12;

/// Where the forecast is requested for and how it is labelled in both tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    pub label: String,
    pub lat: f64,
    pub lon: f64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self { label: "Huntsville, AL".to_string(), lat: 34.73, lon: -86.59 }
    }
}

impl LocationConfig {
    pub fn point(&self) -> GeoPoint {
        GeoPoint { lat: self.lat, lon: self.lon }
    }
}

/// Upstream API settings. api.weather.gov rejects requests without an
/// identifying User-Agent that carries contact details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub user_agent: String,
    pub accept: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.weather.gov".to_string(),
            user_agent: "nws-hourly-etl/0.1 (ops@example.com)".to_string(),
            accept: "application/geo+json".to_string(),
            timeout_secs: 30,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Connection coordinates of the destination store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "fraud_analysis".to_string(),
            user: "postgres".to_string(),
            password: None,
            max_connections: 2,
        }
    }
}

impl DatabaseConfig {
    pub fn connect_options(&self) -> PgConnectOptions {
        let options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.dbname)
            .username(&self.user);

        match &self.password {
            Some(password) => options.password(password),
            None => options,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Schema both destination tables live in.
    pub schema: String,
    /// Curated rows per INSERT statement.
    pub chunk_size: usize,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self { schema: "public".to_string(), chunk_size: 2000 }
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// [location]
/// label = "Huntsville, AL"
/// lat = 34.73
/// lon = -86.59
///
/// [database]
/// host = "db.internal"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub location: LocationConfig,
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub load: LoadConfig,
}

impl Config {
    /// Load config from disk (or defaults if there is no file yet), then
    /// apply the `PG*` environment overrides and validate.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        let mut cfg = Self::load_from(&path)?;
        cfg.apply_env_with(|key| std::env::var(key).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read a config file without touching the environment.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            EtlError::config(format!("failed to read config file {}: {e}", path.display()))
        })?;

        toml::from_str(&contents).map_err(|e| {
            EtlError::config(format!("failed to parse config file {}: {e}", path.display()))
        })
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_file_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                EtlError::config(format!(
                    "failed to create config directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let toml = toml::to_string_pretty(self)
            .map_err(|e| EtlError::config(format!("failed to serialize configuration: {e}")))?;

        fs::write(path, toml).map_err(|e| {
            EtlError::config(format!("failed to write config file {}: {e}", path.display()))
        })
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "nws-etl", "nws-etl")
            .ok_or_else(|| EtlError::config("could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Override database coordinates from `PGHOST`, `PGPORT`, `PGDATABASE`,
    /// `PGUSER` and `PGPASSWORD`.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db = &mut self.database;

        if let Some(host) = lookup("PGHOST") {
            db.host = host;
        }
        if let Some(port) = lookup("PGPORT") {
            db.port = port
                .trim()
                .parse()
                .map_err(|_| EtlError::config(format!("PGPORT is not a valid port: {port:?}")))?;
        }
        if let Some(dbname) = lookup("PGDATABASE") {
            db.dbname = dbname;
        }
        if let Some(user) = lookup("PGUSER") {
            db.user = user;
        }
        if let Some(password) = lookup("PGPASSWORD") {
            db.password = Some(password);
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let loc = &self.location;
        if !(-90.0..=90.0).contains(&loc.lat) {
            return Err(EtlError::config(format!("latitude {} is out of range", loc.lat)));
        }
        if !(-180.0..=180.0).contains(&loc.lon) {
            return Err(EtlError::config(format!("longitude {} is out of range", loc.lon)));
        }
        if self.api.user_agent.trim().is_empty() {
            return Err(EtlError::config("api.user_agent must identify the application"));
        }
        if self.api.timeout_secs == 0 {
            return Err(EtlError::config("api.timeout_secs must be greater than zero"));
        }
        if !(1..=MAX_CHUNK_SIZE).contains(&self.load.chunk_size) {
            return Err(EtlError::config(format!(
                "load.chunk_size must be between 1 and {MAX_CHUNK_SIZE}, got {}",
                self.load.chunk_size
            )));
        }
        if !is_identifier(&self.load.schema) {
            return Err(EtlError::config(format!(
                "load.schema {:?} is not a plain SQL identifier",
                self.load.schema
            )));
        }
        Ok(())
    }
}

/// Schema names are interpolated into SQL, so only `[A-Za-z_][A-Za-z0-9_]*` is accepted.
pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
