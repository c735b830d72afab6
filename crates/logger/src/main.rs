//! `envio-logger` binary entry point.
//!
//! # Environment variables
//!
//! | Variable         | Required | Default                 | Description           |
//! |------------------|----------|-------------------------|-----------------------|
//! | `AMQP_URL`       | yes      | --                      | Broker connection URL |
//! | `AUDIT_LOG_PATH` | no       | `relatorio_envios.txt`  | Audit record file     |

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use envio_broker::{BrokerConfig, RetryPolicy};
use envio_core::store::AuditStore;
use envio_logger::consumer;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "envio_logger=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let broker_config = BrokerConfig::from_env().unwrap_or_else(|| {
        tracing::error!("AMQP_URL environment variable is required");
        std::process::exit(1);
    });

    let store = AuditStore::from_env();
    tracing::info!(path = %store.path().display(), "Starting envio-logger");

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received SIGINT, shutting down");
            signal_cancel.cancel();
        }
    });

    consumer::run(broker_config, store, RetryPolicy::default(), cancel).await;

    tracing::info!("Logger stopped");
}
