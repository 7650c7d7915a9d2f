pub mod errors;
pub mod models;
pub mod trigger_store;

use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database as SeaDatabase, DatabaseConnection};

#[derive(Clone)]
pub struct Database {
    pub orm: DatabaseConnection,
}

impl Database {
    pub async fn connect(conn_string: &str) -> Result<Self, sea_orm::DbErr> {
        let opts = ConnectOptions::new(conn_string.to_owned());
        let orm = SeaDatabase::connect(opts).await?;
        Ok(Self { orm })
    }

    /// Connects to an in-memory sqlite database and applies all migrations.
    /// Used by tests and by local/dev runs.
    pub async fn in_memory() -> Result<Self, sea_orm::DbErr> {
        let db = Self::connect("sqlite::memory:").await?;
        Migrator::up(&db.orm, None).await?;
        Ok(db)
    }
}
