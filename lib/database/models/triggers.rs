//! `SeaORM` entity for the `triggers` table.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::types::{DevLicense, TriggerId};

#[derive(
    Clone, Debug, Serialize, Deserialize, PartialEq, Eq, DeriveEntityModel,
)]
#[sea_orm(table_name = "triggers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: TriggerId,
    pub display_name: String,
    pub owner_dev_license: DevLicense,
    pub service: Service,
    pub metric_name: String,
    pub condition: String,
    pub target_uri: String,
    pub cooldown_seconds: i64,
    pub status: Status,
    pub description: Option<String>,
    pub failure_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    pub fn alive(&self) -> bool {
        self.status != Status::Deleted
    }

    pub fn enabled(&self) -> bool {
        self.status == Status::Enabled
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::subscriptions::Entity")]
    Subscriptions,
    #[sea_orm(has_many = "super::trigger_logs::Entity")]
    TriggerLogs,
}

impl Related<super::subscriptions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subscriptions.def()
    }
}

impl Related<super::trigger_logs::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TriggerLogs.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(
    Debug,
    Clone,
    Copy,
    Hash,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(None)")]
#[serde(rename_all = "snake_case")]
pub enum Service {
    #[sea_orm(string_value = "telemetry.signals")]
    #[serde(rename = "telemetry.signals")]
    Signals,
    #[sea_orm(string_value = "telemetry.events")]
    #[serde(rename = "telemetry.events")]
    Events,
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(None)")]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    #[sea_orm(string_value = "enabled")]
    Enabled,
    #[sea_orm(string_value = "disabled")]
    Disabled,
    #[sea_orm(string_value = "failed")]
    Failed,
    #[sea_orm(string_value = "deleted")]
    Deleted,
}
