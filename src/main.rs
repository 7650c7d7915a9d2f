mod cli;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use control::ControlPlane;
use dispatch::sender::WebhookSender;
use index::SubscriptionIndex;
use ingest::{HttpAccessClient, IngestionPipeline, PipelineConfig};
use lib::config::{Config, ConfigLoader, LogFormat};
use lib::database::trigger_store::SqlTriggerStore;
use lib::database::Database;
use lib::identity::HttpIdentityClient;
use lib::service::Shutdown;
use metrics_exporter_prometheus::PrometheusBuilder;
use migration::{Migrator, MigratorTrait};
use tokio::task::JoinSet;
use tokio::time;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

fn setup_logging(format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "triggersd=info,ingest=info,control=info,index=info".into());
    let fmt_layer = tracing_subscriber::fmt::layer().with_thread_names(true);
    match format {
        | LogFormat::Human => {
            tracing_subscriber::registry().with(fmt_layer.with_filter(env_filter)).init()
        }
        | LogFormat::Json => {
            tracing_subscriber::registry().with(fmt_layer.json().with_filter(env_filter)).init()
        }
    }
}

fn pipeline_config(config: &Config, topic: String) -> PipelineConfig {
    PipelineConfig {
        brokers: config.log_brokers.clone(),
        group_id: config.group_id.clone(),
        topic,
        max_in_flight: config.max_in_flight,
        chain_id: config.chain_id,
        vehicle_nft_address: config.vehicle_nft_address.clone(),
        max_webhook_failure_count: config.max_webhook_failure_count(),
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    match dotenvy::dotenv() {
        | Ok(_) => {}
        | Err(e) if e.not_found() => {}
        | Err(e) => bail!("failed to load .env file: {e}"),
    };

    let opts = cli::CliOpts::parse();
    let config_loader = ConfigLoader::from_path(&opts.config);
    let config = config_loader.load()?;

    setup_logging(config.log_format);
    info!("starting vehicle-triggers-api webhook daemon");

    let prometheus_addr: SocketAddr =
        format!("{}:{}", config.prometheus_address, config.prometheus_port).parse()?;
    PrometheusBuilder::new()
        .with_http_listener(prometheus_addr)
        .install()
        .expect("failed to install Prometheus recorder");
    info!(address = %prometheus_addr, "Prometheus metrics listener installed");

    let db = Database::connect(&config.db_dsn).await?;
    Migrator::up(&db.orm, None).await?;
    let store = Arc::new(SqlTriggerStore::new(db));

    let index = SubscriptionIndex::new(
        store.clone(),
        Duration::from_secs(config.index_refresh_interval_s),
        Duration::from_millis(config.index_refresh_deferral_ms),
    );

    let access = Arc::new(HttpAccessClient::new(config.access_grpc_addr.clone()));
    let identity = Arc::new(HttpIdentityClient::new(config.identity_url.clone()));
    let sender = WebhookSender::new();

    // Wired up for the (out-of-scope) HTTP layer to call into; this binary
    // never serves it directly.
    let _control_plane =
        ControlPlane::new(store.clone(), index.clone(), access.clone(), identity.clone());

    let mut shutdown = Shutdown::default();
    let mut tasks = JoinSet::new();

    tasks.spawn({
        let index = index.clone();
        let shutdown = shutdown.clone();
        async move {
            index.run_periodic_refresh(shutdown).await;
        }
    });

    for topic in [config.signals_topic.clone(), config.events_topic.clone()] {
        let pipeline = Arc::new(IngestionPipeline::new(
            pipeline_config(&config, topic),
            index.clone(),
            store.clone(),
            access.clone(),
            sender.clone(),
        )?);
        let shutdown = shutdown.clone();
        tasks.spawn(async move {
            pipeline.run(shutdown).await;
        });
    }

    tokio::select! {
        _ = shutdown.recv() => {
            warn!("received shutdown signal from a downstream task");
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("received interrupt signal, shutting down");
            shutdown.broadcast_shutdown();
        }
    }

    info!("waiting (10s) for tasks to shut down cleanly...");
    if time::timeout(Duration::from_secs(10), async {
        while tasks.join_next().await.is_some() {}
    })
    .await
    .is_err()
    {
        tasks.shutdown().await;
        bail!("some tasks did not terminate cleanly");
    }
    info!("bye!");
    Ok(())
}
