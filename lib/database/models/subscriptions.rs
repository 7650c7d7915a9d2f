//! `SeaORM` entity for the `vehicle_subscriptions` table: the
//! `(triggerId, assetDID)` edge.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::types::{AssetDid, TriggerId};

#[derive(
    Clone, Debug, Serialize, Deserialize, PartialEq, Eq, DeriveEntityModel,
)]
#[sea_orm(table_name = "vehicle_subscriptions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub trigger_id: TriggerId,
    #[sea_orm(primary_key, auto_increment = false)]
    pub asset_did: AssetDid,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::triggers::Entity",
        from = "Column::TriggerId",
        to = "super::triggers::Column::Id"
    )]
    Trigger,
}

impl Related<super::triggers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Trigger.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
