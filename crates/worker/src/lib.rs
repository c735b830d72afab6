//! `envio-worker` — résumé delivery worker.
//!
//! Consumes submission tasks from the durable `fila_envios` queue, sends
//! each résumé by SMTP, reports the outcome to `fila_logs`, and removes
//! the attachment file after a successful send.
//!
//! The worker processes exactly one task at a time (prefetch = 1) and,
//! by default, retries rejected sends indefinitely — a permanently
//! failing task keeps being redelivered until an operator intervenes or
//! a retry limit is configured. Multiple worker processes may run
//! against the same queue; the broker hands each message to exactly one
//! of them at a time.

pub mod mailer;
pub mod processor;
