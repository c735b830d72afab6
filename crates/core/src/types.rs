//! Wire types shared by the producer, worker, and logger processes.
//!
//! The JSON field names are part of the cross-process contract and are
//! fixed by the submission form's Portuguese field names; the Rust structs
//! use idiomatic names and map via serde renames.

use chrono::Local;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Queue names
// ---------------------------------------------------------------------------

/// Durable queue names shared by every process in the pipeline.
///
/// These must match exactly between producer, worker, and logger — a
/// mismatch silently splits the pipeline into disconnected halves.
pub mod queues {
    /// Résumé submission tasks (producer → worker).
    pub const SUBMISSIONS: &str = "fila_envios";
    /// Delivery audit events (worker → logger).
    pub const AUDIT: &str = "fila_logs";
}

/// Status tag recorded on a successful delivery.
pub const STATUS_SENT: &str = "ENVIADO ✅";

/// Display name used when the form does not provide a candidate name.
pub const DEFAULT_CANDIDATE: &str = "Candidato";

/// `dd/mm/yyyy, HH:MM:SS` — the pt-BR timestamp format the dashboard expects.
pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y, %H:%M:%S";

// ---------------------------------------------------------------------------
// SubmissionTask
// ---------------------------------------------------------------------------

/// One résumé-delivery request, published by the intake producer and
/// consumed exactly once by a delivery worker.
///
/// Immutable once published; the worker never re-publishes it. The
/// attachment file at [`attachment_path`](Self::attachment_path) is owned
/// by whichever process currently holds the task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionTask {
    /// Company the résumé is addressed to (form field `nome`).
    #[serde(rename = "nome")]
    pub company: String,

    /// Candidate display name; defaults to `"Candidato"` when absent
    /// from the wire message.
    #[serde(rename = "candidato", default = "default_candidate")]
    pub candidate: String,

    /// Recipient email address.
    pub email: String,

    /// Job title the candidate is applying for (form field `vaga`).
    #[serde(rename = "vaga")]
    pub job_title: String,

    /// Absolute path of the materialized attachment on shared storage.
    #[serde(rename = "caminhoAnexo")]
    pub attachment_path: String,

    /// Original filename of the uploaded attachment.
    #[serde(rename = "nomeAnexo")]
    pub attachment_name: String,
}

fn default_candidate() -> String {
    DEFAULT_CANDIDATE.to_string()
}

impl SubmissionTask {
    /// Attachment filename used on the outgoing email:
    /// `Curriculo_<candidate>.pdf` with whitespace collapsed to underscores.
    pub fn email_attachment_name(&self) -> String {
        let name: Vec<&str> = self.candidate.split_whitespace().collect();
        format!("Curriculo_{}.pdf", name.join("_"))
    }
}

// ---------------------------------------------------------------------------
// AuditEvent
// ---------------------------------------------------------------------------

/// Outcome record of a completed delivery attempt.
///
/// Created by the worker on a successful send, consumed by the audit
/// logger, and never mutated or deleted once appended to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Company the résumé was sent to.
    #[serde(rename = "empresa")]
    pub company: String,

    /// Job title, when the task carried one.
    #[serde(rename = "vaga", default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,

    /// Status tag, e.g. [`STATUS_SENT`].
    pub status: String,

    /// Pre-formatted local timestamp ([`TIMESTAMP_FORMAT`]).
    #[serde(rename = "data")]
    pub timestamp: String,
}

impl AuditEvent {
    /// Build a success event for a delivered task, stamped with the local
    /// wall clock at this instant.
    pub fn sent(task: &SubmissionTask) -> Self {
        Self {
            company: task.company.clone(),
            job_title: Some(task.job_title.clone()),
            status: STATUS_SENT.to_string(),
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
        }
    }

    /// One-line human-readable record appended to the audit store.
    pub fn log_line(&self) -> String {
        format!(
            "[{}] EMPRESA: {} | VAGA: {} | {}",
            self.timestamp,
            self.company,
            self.job_title.as_deref().unwrap_or("-"),
            self.status,
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_task() -> SubmissionTask {
        SubmissionTask {
            company: "Acme".to_string(),
            candidate: "Maria Silva".to_string(),
            email: "a@a.com".to_string(),
            job_title: "Dev".to_string(),
            attachment_path: "/tmp/uploads/abc123".to_string(),
            attachment_name: "cv.txt".to_string(),
        }
    }

    #[test]
    fn task_serializes_with_wire_field_names() {
        let json = serde_json::to_value(sample_task()).unwrap();
        assert_eq!(json["nome"], "Acme");
        assert_eq!(json["candidato"], "Maria Silva");
        assert_eq!(json["email"], "a@a.com");
        assert_eq!(json["vaga"], "Dev");
        assert_eq!(json["caminhoAnexo"], "/tmp/uploads/abc123");
        assert_eq!(json["nomeAnexo"], "cv.txt");
    }

    #[test]
    fn task_round_trips_losslessly() {
        let task = sample_task();
        let bytes = serde_json::to_vec(&task).unwrap();
        let back: SubmissionTask = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, task);
    }

    #[test]
    fn missing_candidate_defaults() {
        let json = r#"{
            "nome": "Acme",
            "email": "a@a.com",
            "vaga": "Dev",
            "caminhoAnexo": "/tmp/x",
            "nomeAnexo": "cv.pdf"
        }"#;
        let task: SubmissionTask = serde_json::from_str(json).unwrap();
        assert_eq!(task.candidate, DEFAULT_CANDIDATE);
    }

    #[test]
    fn email_attachment_name_collapses_whitespace() {
        let mut task = sample_task();
        task.candidate = "Maria  da\tSilva".to_string();
        assert_eq!(task.email_attachment_name(), "Curriculo_Maria_da_Silva.pdf");
    }

    #[test]
    fn sent_event_carries_task_fields() {
        let event = AuditEvent::sent(&sample_task());
        assert_eq!(event.company, "Acme");
        assert_eq!(event.job_title.as_deref(), Some("Dev"));
        assert_eq!(event.status, STATUS_SENT);
        assert!(!event.timestamp.is_empty());
    }

    #[test]
    fn event_round_trips_on_the_wire() {
        let event = AuditEvent {
            company: "Acme".to_string(),
            job_title: Some("Dev".to_string()),
            status: STATUS_SENT.to_string(),
            timestamp: "05/08/2026, 14:30:00".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["empresa"], "Acme");
        assert_eq!(json["vaga"], "Dev");
        assert_eq!(json["data"], "05/08/2026, 14:30:00");

        let back: AuditEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn log_line_format() {
        let event = AuditEvent {
            company: "Acme".to_string(),
            job_title: Some("Dev".to_string()),
            status: STATUS_SENT.to_string(),
            timestamp: "05/08/2026, 14:30:00".to_string(),
        };
        assert_eq!(
            event.log_line(),
            format!("[05/08/2026, 14:30:00] EMPRESA: Acme | VAGA: Dev | {STATUS_SENT}")
        );
    }

    #[test]
    fn log_line_without_job_title() {
        let event = AuditEvent {
            company: "Acme".to_string(),
            job_title: None,
            status: STATUS_SENT.to_string(),
            timestamp: "05/08/2026, 14:30:00".to_string(),
        };
        assert!(event.log_line().contains("VAGA: - |"));
    }
}
