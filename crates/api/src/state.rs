use std::sync::Arc;

use envio_broker::ConnectBroker;
use envio_core::store::AuditStore;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Broker connector; `None` when `AMQP_URL` is not configured, in
    /// which case submissions fail with a server error.
    pub connector: Option<Arc<dyn ConnectBroker>>,
    /// Read-only view over the audit record file.
    pub store: Arc<AuditStore>,
}
