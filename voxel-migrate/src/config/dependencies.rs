//! Dependency initialization and wiring for voxel-migrate.
use anyhow::Context;
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use std::sync::Arc;
use tracing::info;
use voxel_migrate_repository::{
    MySqlSourceRepository, PostgresTargetRepository, SourceRepository, TargetRepository,
};

use crate::config::{Settings, StoreSettings};
use crate::errors::MigrationError;

/// Container for the connected repositories.
pub struct Dependencies {
    pub source: Arc<dyn SourceRepository>,
    pub target: Arc<dyn TargetRepository>,
}

fn mysql_options(store: &StoreSettings) -> MySqlConnectOptions {
    MySqlConnectOptions::new()
        .host(&store.host)
        .port(store.port)
        .username(&store.user)
        .password(&store.password)
        .database(&store.database)
}

fn postgres_options(store: &StoreSettings) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&store.host)
        .port(store.port)
        .username(&store.user)
        .password(&store.password)
        .database(&store.database)
}

impl Dependencies {
    /// Connects to both stores.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Both pools are connected
    /// * `Err(MigrationError)` - A connection could not be established
    pub async fn new(settings: &Settings) -> Result<Self, MigrationError> {
        let max_connections = settings.tunables.max_connections;
        info!(
            mysql_host = %settings.mysql.host,
            mysql_database = %settings.mysql.database,
            postgres_host = %settings.postgres.host,
            postgres_database = %settings.postgres.database,
            max_connections,
            "Initializing dependencies"
        );

        let mysql = MySqlPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(mysql_options(&settings.mysql))
            .await
            .context("Failed to connect to MySQL")?;
        info!("✓ Connected to MySQL");

        let postgres = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(postgres_options(&settings.postgres))
            .await
            .context("Failed to connect to PostgreSQL")?;
        info!("✓ Connected to PostgreSQL");

        Ok(Self {
            source: Arc::new(MySqlSourceRepository::new(mysql)),
            target: Arc::new(PostgresTargetRepository::new(postgres).await?),
        })
    }
}
