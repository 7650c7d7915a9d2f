pub mod subscriptions;
pub mod trigger_logs;
pub mod triggers;

pub mod prelude {
    pub use super::subscriptions::Entity as Subscriptions;
    pub use super::trigger_logs::Entity as TriggerLogs;
    pub use super::triggers::Entity as Triggers;
}
