pub use sea_orm_migration::prelude::*;

mod m20240101_000001_create_triggers;
mod m20240101_000002_create_vehicle_subscriptions;
mod m20240101_000003_create_trigger_logs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_triggers::Migration),
            Box::new(m20240101_000002_create_vehicle_subscriptions::Migration),
            Box::new(m20240101_000003_create_trigger_logs::Migration),
        ]
    }
}
