//! Domain error type shared across the pipeline crates.

/// Errors surfaced by submission validation and the audit store.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The submission cannot be published (e.g. the résumé attachment is
    /// missing). Nothing was enqueued.
    #[error("Invalid submission: {0}")]
    InvalidSubmission(String),

    /// A mandatory configuration value is absent.
    #[error("Missing configuration: {0}")]
    ConfigurationMissing(&'static str),

    /// Audit store I/O failure.
    #[error("Audit store I/O error: {0}")]
    Store(#[from] std::io::Error),
}
