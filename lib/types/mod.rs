pub mod asset;
pub mod ids;

pub use asset::*;
pub use ids::*;

// Re-export the database models from this lib as well to reduce the amount
// of changes in the same PR.
pub use crate::database::models::subscriptions::Model as VehicleSubscription;
pub use crate::database::models::trigger_logs::Model as TriggerLog;
pub use crate::database::models::triggers::{Model as Trigger, Service, Status};
