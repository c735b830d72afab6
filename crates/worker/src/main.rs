//! `envio-worker` binary entry point.
//!
//! # Environment variables
//!
//! | Variable           | Required | Default | Description                      |
//! |--------------------|----------|---------|----------------------------------|
//! | `AMQP_URL`         | yes      | --      | Broker connection URL            |
//! | `EMAIL_HOST`       | yes      | --      | SMTP server hostname             |
//! | `EMAIL_PORT`       | no       | `465`   | SMTP server port (implicit TLS)  |
//! | `EMAIL_USER`       | yes      | --      | SMTP username / sender address   |
//! | `EMAIL_PASS`       | yes      | --      | SMTP password                    |
//! | `RETRY_DELAY_SECS` | no       | `10`    | Delay before a failed task retry |
//! | `RETRY_LIMIT`      | no       | --      | Attempt ceiling (unlimited if unset) |

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use envio_broker::{BrokerConfig, RetryPolicy};
use envio_worker::mailer::{SmtpConfig, SmtpMailer};
use envio_worker::processor::{self, RetrySettings};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "envio_worker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let broker_config = BrokerConfig::from_env().unwrap_or_else(|| {
        tracing::error!("AMQP_URL environment variable is required");
        std::process::exit(1);
    });

    let smtp_config = SmtpConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "SMTP configuration incomplete");
        std::process::exit(1);
    });

    let mailer = SmtpMailer::new(smtp_config).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to build SMTP transport");
        std::process::exit(1);
    });

    let settings = RetrySettings::from_env();
    tracing::info!(
        retry_delay_secs = settings.retry_delay.as_secs(),
        retry_limit = ?settings.retry_limit,
        "Starting envio-worker",
    );

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received SIGINT, shutting down");
            signal_cancel.cancel();
        }
    });

    processor::run(
        broker_config,
        Arc::new(mailer),
        settings,
        RetryPolicy::default(),
        cancel,
    )
    .await;

    tracing::info!("Worker stopped");
}
