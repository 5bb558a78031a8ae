// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::ops::{Deref, DerefMut};
use std::time::Duration;

use anyhow::anyhow;
use diesel::migration::{MigrationSource, MigrationVersion};
use diesel::pg::Pg;
use diesel_async::async_connection_wrapper::AsyncConnectionWrapper;
use diesel_async::{
    pooled_connection::{
        bb8::{Pool, PooledConnection},
        AsyncDieselConnectionManager,
    },
    AsyncPgConnection,
};
use diesel_migrations::EmbeddedMigrations;
use tracing::info;
use url::Url;

#[derive(clap::Args, Debug, Clone)]
pub struct DbArgs {
    // Number of connections to keep in the pool.
    #[arg(long, default_value_t = Self::default().db_connection_pool_size)]
    pub db_connection_pool_size: u32,

    // Time spent waiting for a connection from the pool to become available, in milliseconds.
    #[arg(long, default_value_t = Self::default().db_connection_timeout_ms)]
    pub db_connection_timeout_ms: u64,
}

#[derive(Clone)]
pub struct Db {
    pool: Pool<AsyncPgConnection>,
    database_url: String,
}

// Wrapper struct over the remote `PooledConnection` type.
pub struct Connection<'a>(PooledConnection<'a, AsyncPgConnection>);

impl DbArgs {
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.db_connection_timeout_ms)
    }
}

impl Default for DbArgs {
    fn default() -> Self {
        Self {
            db_connection_pool_size: 10,
            db_connection_timeout_ms: 30_000,
        }
    }
}

impl std::fmt::Debug for Db {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db")
            .field("state", &self.pool.state())
            .field("database_url", &"<redacted>")
            .finish()
    }
}

impl Db {
    // Construct a new DB connection pool talking to the database at `database_url`. Instances of
    // [Db] can be cloned to share access to the same pool.
    pub async fn connect_pool(database_url: Url, config: DbArgs) -> anyhow::Result<Self> {
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url.as_str());
        let pool = Pool::builder()
            .max_size(config.db_connection_pool_size)
            .connection_timeout(config.connection_timeout())
            .build(manager)
            .await?;
        Ok(Self {
            pool,
            database_url: database_url.to_string(),
        })
    }

    // Retrieves a connection from the pool. Can fail with a timeout if a connection cannot be
    // established before the [DbArgs::connection_timeout] has elapsed.
    pub async fn connect(&self) -> anyhow::Result<Connection<'_>> {
        Ok(Connection(self.pool.get().await?))
    }

    // Statistics about the connection pool
    pub fn state(&self) -> bb8::State {
        self.pool.state()
    }

    // Run the embedded migrations on a dedicated connection.
    pub async fn run_migrations(
        &self,
        migrations: &'static EmbeddedMigrations,
    ) -> anyhow::Result<Vec<MigrationVersion<'static>>> {
        use diesel::Connection as _;
        use diesel_migrations::MigrationHarness;

        info!("Running migrations ...");
        let database_url = self.database_url.clone();
        let finished_migrations = tokio::task::spawn_blocking(move || {
            let mut wrapper =
                AsyncConnectionWrapper::<AsyncPgConnection>::establish(&database_url)
                    .map_err(|e| anyhow!("Failed to connect for migrations: {}", e))?;
            wrapper
                .run_pending_migrations(Migrations(migrations))
                .map(|versions| versions.iter().map(MigrationVersion::as_owned).collect())
                .map_err(|e| anyhow!("Failed to run migrations: {:?}", e))
        })
        .await??;

        info!("Migrations complete.");
        Ok(finished_migrations)
    }
}

struct Migrations(&'static EmbeddedMigrations);

impl MigrationSource<Pg> for Migrations {
    fn migrations(
        &self,
    ) -> diesel::migration::Result<Vec<Box<dyn diesel::migration::Migration<Pg>>>> {
        self.0.migrations()
    }
}

impl<'a> Deref for Connection<'a> {
    type Target = PooledConnection<'a, AsyncPgConnection>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Connection<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}
