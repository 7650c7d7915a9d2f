use crate::model::define_model_id;

define_model_id! {
    #[prefix = "trig"]
    pub struct TriggerId;
}

define_model_id! {
    #[prefix = "tlog"]
    pub struct TriggerLogId;
}
