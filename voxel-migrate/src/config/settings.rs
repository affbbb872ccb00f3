use crate::errors::ConfigError;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use voxel_migrate_shared::types::ClinicLocationId;

const DEFAULT_MYSQL_PORT: u16 = 3306;
const DEFAULT_POSTGRES_PORT: u16 = 5432;
const DEFAULT_COMMIT_EVERY: usize = 100;
const DEFAULT_PROGRESS_EVERY: u64 = 100;
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_LOG_ROOT: &str = ".";

/// Connection parameters of one store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl StoreSettings {
    /// Reads `<PREFIX>_HOST`, `<PREFIX>_PORT`, `<PREFIX>_USER`,
    /// `<PREFIX>_PASSWORD` and `<PREFIX>_DATABASE`.
    fn from_env(prefix: &str, default_port: u16) -> Result<Self, ConfigError> {
        Ok(Self {
            host: required(&format!("{prefix}_HOST"))?,
            port: parsed(&format!("{prefix}_PORT"))?.unwrap_or(default_port),
            user: required(&format!("{prefix}_USER"))?,
            password: env::var(format!("{prefix}_PASSWORD")).unwrap_or_default(),
            database: required(&format!("{prefix}_DATABASE"))?,
        })
    }
}

/// Run tunables. None of them require a database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tunables {
    pub commit_every: usize,
    pub progress_every: u64,
    pub max_connections: u32,
    pub log_root: PathBuf,
    /// Location used for rows whose clinic location cannot be resolved.
    pub default_clinic_location_id: Option<ClinicLocationId>,
}

impl Tunables {
    /// Initialize the tunables from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `MIGRATE_COMMIT_EVERY`: Rows per committed batch (default: 100)
    /// - `MIGRATE_PROGRESS_EVERY`: Rows between progress lines (default: 100)
    /// - `MIGRATE_MAX_CONNECTIONS`: Pool size of each store (default: 5)
    /// - `LOG_ROOT`: Directory receiving the per-domain log directories (default: .)
    /// - `DEFAULT_CLINIC_LOCATION_ID`: Fallback clinic location (default: unset)
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            commit_every: parsed("MIGRATE_COMMIT_EVERY")?.unwrap_or(DEFAULT_COMMIT_EVERY),
            progress_every: parsed("MIGRATE_PROGRESS_EVERY")?.unwrap_or(DEFAULT_PROGRESS_EVERY),
            max_connections: parsed("MIGRATE_MAX_CONNECTIONS")?.unwrap_or(DEFAULT_MAX_CONNECTIONS),
            log_root: env::var("LOG_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_LOG_ROOT)),
            default_clinic_location_id: parsed("DEFAULT_CLINIC_LOCATION_ID")?.map(ClinicLocationId),
        })
    }
}

/// Everything a command that touches both stores needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub mysql: StoreSettings,
    pub postgres: StoreSettings,
    pub tunables: Tunables,
}

impl Settings {
    /// Reads both stores' connection parameters. `MYSQL_PORT` defaults to
    /// 3306 and `POSTGRES_PORT` to 5432; passwords default to empty.
    pub fn from_env(tunables: Tunables) -> Result<Self, ConfigError> {
        Ok(Self {
            mysql: StoreSettings::from_env("MYSQL", DEFAULT_MYSQL_PORT)?,
            postgres: StoreSettings::from_env("POSTGRES", DEFAULT_POSTGRES_PORT)?,
            tunables,
        })
    }
}

fn required(name: &str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingVar(name.to_string()))
}

fn parsed<T: FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidVar {
                name: name.to_string(),
                value,
            }),
        _ => Ok(None),
    }
}
