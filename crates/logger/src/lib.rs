//! `envio-logger` — audit event logger.
//!
//! Consumes audit events from the durable `fila_logs` queue and appends
//! one human-readable line per event to the audit record file the
//! dashboard reads. Events are processed one at a time (prefetch = 1) so
//! appends to the shared file are serialized.
//!
//! Only one logger instance should run against a given record file;
//! nothing enforces this — it is an operational constraint, not a
//! guarded invariant.

pub mod consumer;
