use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait,
    ActiveValue::Set,
    ColumnTrait,
    DatabaseTransaction,
    EntityTrait,
    QueryFilter,
    QueryOrder,
    TransactionTrait,
};

use super::errors::DatabaseError;
use super::models::prelude::{Subscriptions, TriggerLogs, Triggers};
use super::models::triggers::{self, Service, Status};
use super::models::{subscriptions, trigger_logs};
use super::Database;
use crate::types::{
    AssetDid,
    DevLicense,
    Trigger,
    TriggerId,
    TriggerLog,
    TriggerLogId,
    VehicleSubscription,
};

pub type TriggerStoreError = DatabaseError;

/// Fields a caller supplies when registering a new trigger; the store fills
/// in `id`, `status`, `failureCount`, and the timestamps.
pub struct NewTrigger {
    pub display_name: String,
    pub owner_dev_license: DevLicense,
    pub service: Service,
    pub metric_name: String,
    pub condition: String,
    pub target_uri: String,
    pub cooldown_seconds: i64,
    pub description: Option<String>,
}

/// A delivery outcome to record for a (trigger, asset) pair; the store
/// mints the row id and `createdAt`.
pub struct NewTriggerLog {
    pub trigger_id: TriggerId,
    pub asset_did: AssetDid,
    pub snapshot_data: String,
    pub last_triggered_at: chrono::DateTime<Utc>,
}

#[async_trait]
pub trait TriggerStore {
    async fn create_trigger(
        &self,
        req: NewTrigger,
    ) -> Result<Trigger, TriggerStoreError>;

    async fn get_triggers_by_owner(
        &self,
        owner: &DevLicense,
    ) -> Result<Vec<Trigger>, TriggerStoreError>;

    async fn get_trigger_by_id_and_owner(
        &self,
        id: &TriggerId,
        owner: &DevLicense,
    ) -> Result<Trigger, TriggerStoreError>;

    async fn get_trigger_for_update(
        &self,
        id: &TriggerId,
        owner: &DevLicense,
    ) -> Result<(Trigger, DatabaseTransaction), TriggerStoreError>;

    /// Internal, unauthorized fetch by id, used by the subscription index
    /// when rebuilding a snapshot from `GetAllActiveSubscriptions`.
    async fn get_trigger_by_id(
        &self,
        id: &TriggerId,
    ) -> Result<Trigger, TriggerStoreError>;

    async fn update_trigger(
        &self,
        trigger: Trigger,
    ) -> Result<(), TriggerStoreError>;

    async fn delete_trigger(
        &self,
        id: &TriggerId,
        owner: &DevLicense,
    ) -> Result<(), TriggerStoreError>;

    async fn create_subscription(
        &self,
        trigger_id: &TriggerId,
        asset_did: &AssetDid,
    ) -> Result<VehicleSubscription, TriggerStoreError>;

    async fn get_subscriptions_by_trigger(
        &self,
        trigger_id: &TriggerId,
    ) -> Result<Vec<VehicleSubscription>, TriggerStoreError>;

    async fn get_subscriptions_for_asset_and_owner(
        &self,
        asset_did: &AssetDid,
        owner: &DevLicense,
    ) -> Result<Vec<VehicleSubscription>, TriggerStoreError>;

    async fn delete_subscription(
        &self,
        trigger_id: &TriggerId,
        asset_did: &AssetDid,
    ) -> Result<u64, TriggerStoreError>;

    async fn delete_all_subscriptions(
        &self,
        trigger_id: &TriggerId,
    ) -> Result<u64, TriggerStoreError>;

    /// All subscriptions belonging to a non-deleted trigger. Used by the
    /// subscription index to rebuild its snapshot; callers filter out
    /// triggers that are not `enabled` themselves.
    async fn get_all_active_subscriptions(
        &self,
    ) -> Result<Vec<VehicleSubscription>, TriggerStoreError>;

    async fn get_last_log(
        &self,
        trigger_id: &TriggerId,
        asset_did: &AssetDid,
    ) -> Result<Option<TriggerLog>, TriggerStoreError>;

    async fn append_log(
        &self,
        log: NewTriggerLog,
    ) -> Result<TriggerLog, TriggerStoreError>;

    async fn increment_failure(
        &self,
        trigger_id: &TriggerId,
        max_count: i32,
    ) -> Result<(), TriggerStoreError>;

    async fn reset_failure(
        &self,
        trigger_id: &TriggerId,
    ) -> Result<(), TriggerStoreError>;
}

pub struct SqlTriggerStore {
    db: Database,
}

impl SqlTriggerStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TriggerStore for SqlTriggerStore {
    async fn create_trigger(
        &self,
        req: NewTrigger,
    ) -> Result<Trigger, TriggerStoreError> {
        let now = Utc::now();
        let id = TriggerId::generate();
        let display_name = if req.display_name.is_empty() {
            id.to_string()
        } else {
            req.display_name
        };

        let txn = self.db.orm.begin().await?;
        let collision = Triggers::find()
            .filter(triggers::Column::OwnerDevLicense.eq(req.owner_dev_license.clone()))
            .filter(triggers::Column::DisplayName.eq(display_name.clone()))
            .filter(triggers::Column::Status.ne(Status::Deleted))
            .one(&txn)
            .await?;
        if collision.is_some() {
            txn.rollback().await?;
            return Err(DatabaseError::DuplicateRecord);
        }

        let active = triggers::ActiveModel {
            id: Set(id),
            display_name: Set(display_name),
            owner_dev_license: Set(req.owner_dev_license),
            service: Set(req.service),
            metric_name: Set(req.metric_name),
            condition: Set(req.condition),
            target_uri: Set(req.target_uri),
            cooldown_seconds: Set(req.cooldown_seconds),
            status: Set(Status::Enabled),
            description: Set(req.description),
            failure_count: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let model = active.insert(&txn).await?;
        txn.commit().await?;
        Ok(model)
    }

    async fn get_triggers_by_owner(
        &self,
        owner: &DevLicense,
    ) -> Result<Vec<Trigger>, TriggerStoreError> {
        let res = Triggers::find()
            .filter(triggers::Column::OwnerDevLicense.eq(owner.clone()))
            .filter(triggers::Column::Status.ne(Status::Deleted))
            .order_by_asc(triggers::Column::Id)
            .all(&self.db.orm)
            .await?;
        Ok(res)
    }

    async fn get_trigger_by_id_and_owner(
        &self,
        id: &TriggerId,
        owner: &DevLicense,
    ) -> Result<Trigger, TriggerStoreError> {
        let res = Triggers::find_by_id(id.clone())
            .filter(triggers::Column::OwnerDevLicense.eq(owner.clone()))
            .filter(triggers::Column::Status.ne(Status::Deleted))
            .one(&self.db.orm)
            .await?;
        res.ok_or(DatabaseError::NotFound)
    }

    async fn get_trigger_for_update(
        &self,
        id: &TriggerId,
        owner: &DevLicense,
    ) -> Result<(Trigger, DatabaseTransaction), TriggerStoreError> {
        let txn = self.db.orm.begin().await?;
        let res = Triggers::find_by_id(id.clone())
            .filter(triggers::Column::OwnerDevLicense.eq(owner.clone()))
            .filter(triggers::Column::Status.ne(Status::Deleted))
            .one(&txn)
            .await?;
        match res {
            | Some(trigger) => Ok((trigger, txn)),
            | None => {
                txn.rollback().await?;
                Err(DatabaseError::NotFound)
            }
        }
    }

    async fn get_trigger_by_id(
        &self,
        id: &TriggerId,
    ) -> Result<Trigger, TriggerStoreError> {
        Triggers::find_by_id(id.clone())
            .one(&self.db.orm)
            .await?
            .ok_or(DatabaseError::NotFound)
    }

    async fn update_trigger(
        &self,
        trigger: Trigger,
    ) -> Result<(), TriggerStoreError> {
        let id = trigger.id.clone();
        let owner = trigger.owner_dev_license.clone();
        let display_name = trigger.display_name.clone();

        let txn = self.db.orm.begin().await?;
        let collision = Triggers::find()
            .filter(triggers::Column::OwnerDevLicense.eq(owner.clone()))
            .filter(triggers::Column::DisplayName.eq(display_name))
            .filter(triggers::Column::Status.ne(Status::Deleted))
            .filter(triggers::Column::Id.ne(id.clone()))
            .one(&txn)
            .await?;
        if collision.is_some() {
            txn.rollback().await?;
            return Err(DatabaseError::DuplicateRecord);
        }

        let mut active: triggers::ActiveModel = trigger.into();
        active.updated_at = Set(Utc::now());
        // These columns are immutable; never write them back.
        active.id = sea_orm::ActiveValue::NotSet;
        active.owner_dev_license = sea_orm::ActiveValue::NotSet;
        active.service = sea_orm::ActiveValue::NotSet;
        active.created_at = sea_orm::ActiveValue::NotSet;

        let result = Triggers::update_many()
            .set(active)
            .filter(triggers::Column::Id.eq(id))
            .filter(triggers::Column::OwnerDevLicense.eq(owner))
            .filter(triggers::Column::Status.ne(Status::Deleted))
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            txn.rollback().await?;
            return Err(DatabaseError::NotFound);
        }
        txn.commit().await?;
        Ok(())
    }

    async fn delete_trigger(
        &self,
        id: &TriggerId,
        owner: &DevLicense,
    ) -> Result<(), TriggerStoreError> {
        let txn = self.db.orm.begin().await?;

        let result = Triggers::update_many()
            .col_expr(
                triggers::Column::Status,
                sea_orm::sea_query::Expr::value(Status::Deleted),
            )
            .col_expr(
                triggers::Column::UpdatedAt,
                sea_orm::sea_query::Expr::value(Utc::now()),
            )
            .filter(triggers::Column::Id.eq(id.clone()))
            .filter(triggers::Column::OwnerDevLicense.eq(owner.clone()))
            .filter(triggers::Column::Status.ne(Status::Deleted))
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            txn.rollback().await?;
            return Err(DatabaseError::NotFound);
        }

        Subscriptions::delete_many()
            .filter(subscriptions::Column::TriggerId.eq(id.clone()))
            .exec(&txn)
            .await?;

        txn.commit().await?;
        Ok(())
    }

    async fn create_subscription(
        &self,
        trigger_id: &TriggerId,
        asset_did: &AssetDid,
    ) -> Result<VehicleSubscription, TriggerStoreError> {
        let active = subscriptions::ActiveModel {
            trigger_id: Set(trigger_id.clone()),
            asset_did: Set(asset_did.clone()),
            created_at: Set(Utc::now()),
        };
        let model = active.insert(&self.db.orm).await?;
        Ok(model)
    }

    async fn get_subscriptions_by_trigger(
        &self,
        trigger_id: &TriggerId,
    ) -> Result<Vec<VehicleSubscription>, TriggerStoreError> {
        let res = Subscriptions::find()
            .filter(subscriptions::Column::TriggerId.eq(trigger_id.clone()))
            .all(&self.db.orm)
            .await?;
        Ok(res)
    }

    async fn get_subscriptions_for_asset_and_owner(
        &self,
        asset_did: &AssetDid,
        owner: &DevLicense,
    ) -> Result<Vec<VehicleSubscription>, TriggerStoreError> {
        let res = Subscriptions::find()
            .inner_join(Triggers)
            .filter(subscriptions::Column::AssetDid.eq(asset_did.clone()))
            .filter(triggers::Column::OwnerDevLicense.eq(owner.clone()))
            .filter(triggers::Column::Status.ne(Status::Deleted))
            .all(&self.db.orm)
            .await?;
        Ok(res)
    }

    async fn delete_subscription(
        &self,
        trigger_id: &TriggerId,
        asset_did: &AssetDid,
    ) -> Result<u64, TriggerStoreError> {
        let result = Subscriptions::delete_many()
            .filter(subscriptions::Column::TriggerId.eq(trigger_id.clone()))
            .filter(subscriptions::Column::AssetDid.eq(asset_did.clone()))
            .exec(&self.db.orm)
            .await?;
        Ok(result.rows_affected)
    }

    async fn delete_all_subscriptions(
        &self,
        trigger_id: &TriggerId,
    ) -> Result<u64, TriggerStoreError> {
        let result = Subscriptions::delete_many()
            .filter(subscriptions::Column::TriggerId.eq(trigger_id.clone()))
            .exec(&self.db.orm)
            .await?;
        Ok(result.rows_affected)
    }

    async fn get_all_active_subscriptions(
        &self,
    ) -> Result<Vec<VehicleSubscription>, TriggerStoreError> {
        let res = Subscriptions::find()
            .inner_join(Triggers)
            .filter(triggers::Column::Status.ne(Status::Deleted))
            .all(&self.db.orm)
            .await?;
        Ok(res)
    }

    async fn get_last_log(
        &self,
        trigger_id: &TriggerId,
        asset_did: &AssetDid,
    ) -> Result<Option<TriggerLog>, TriggerStoreError> {
        let res = TriggerLogs::find()
            .filter(trigger_logs::Column::TriggerId.eq(trigger_id.clone()))
            .filter(trigger_logs::Column::AssetDid.eq(asset_did.clone()))
            .order_by_desc(trigger_logs::Column::LastTriggeredAt)
            .one(&self.db.orm)
            .await?;
        Ok(res)
    }

    async fn append_log(
        &self,
        log: NewTriggerLog,
    ) -> Result<TriggerLog, TriggerStoreError> {
        let active = trigger_logs::ActiveModel {
            id: Set(TriggerLogId::generate()),
            trigger_id: Set(log.trigger_id),
            asset_did: Set(log.asset_did),
            snapshot_data: Set(log.snapshot_data),
            last_triggered_at: Set(log.last_triggered_at),
            created_at: Set(Utc::now()),
        };
        let model = active.insert(&self.db.orm).await?;
        Ok(model)
    }

    async fn increment_failure(
        &self,
        trigger_id: &TriggerId,
        max_count: i32,
    ) -> Result<(), TriggerStoreError> {
        let txn = self.db.orm.begin().await?;
        let Some(trigger) = Triggers::find_by_id(trigger_id.clone())
            .one(&txn)
            .await?
        else {
            txn.rollback().await?;
            return Err(DatabaseError::NotFound);
        };

        let new_count = trigger.failure_count + 1;
        let mut active: triggers::ActiveModel = trigger.into();
        active.failure_count = Set(new_count);
        if new_count >= max_count {
            active.status = Set(Status::Failed);
        }
        active.update(&txn).await?;
        txn.commit().await?;
        Ok(())
    }

    async fn reset_failure(
        &self,
        trigger_id: &TriggerId,
    ) -> Result<(), TriggerStoreError> {
        let txn = self.db.orm.begin().await?;
        let Some(trigger) = Triggers::find_by_id(trigger_id.clone())
            .one(&txn)
            .await?
        else {
            txn.rollback().await?;
            return Err(DatabaseError::NotFound);
        };

        if trigger.failure_count == 0 {
            txn.commit().await?;
            return Ok(());
        }

        let was_failed = trigger.status == Status::Failed;
        let mut active: triggers::ActiveModel = trigger.into();
        active.failure_count = Set(0);
        if was_failed {
            active.status = Set(Status::Enabled);
        }
        active.update(&txn).await?;
        txn.commit().await?;
        Ok(())
    }
}
