//! Component D: the two Kafka-backed ingestion pipelines (one per
//! telemetry topic) that drive trigger evaluation and webhook delivery.

pub mod pipeline;
pub mod record;

pub use lib::access::{AccessClient, AccessError, HttpAccessClient};
pub use pipeline::{deliver_event, deliver_signal, IngestionPipeline, PipelineConfig};
