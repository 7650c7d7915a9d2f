//! `SeaORM` entity for the `trigger_logs` table: the most recent successful
//! delivery outcome per (trigger, asset), used for cooldown enforcement and
//! as the `previousValue` source for condition evaluation.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::database::models::triggers;
use crate::types::{AssetDid, TriggerId, TriggerLogId};

#[derive(
    Clone, Debug, Serialize, Deserialize, PartialEq, Eq, DeriveEntityModel,
)]
#[sea_orm(table_name = "trigger_logs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: TriggerLogId,
    pub trigger_id: TriggerId,
    pub asset_did: AssetDid,
    pub snapshot_data: String,
    pub last_triggered_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "triggers::Entity",
        from = "Column::TriggerId",
        to = "triggers::Column::Id"
    )]
    Trigger,
}

impl Related<triggers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Trigger.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
