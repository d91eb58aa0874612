//! Per-tenant synchronization report
//!
//! Non-fatal problems are collected as plain messages while the run walks
//! companies and invoices. At the end the messages are posted to Recras as
//! a note on the current staff member.

use chrono::{DateTime, Utc};
use koppeling_domain::constants::{NOTE_FOLLOW_UP_REMARK, NOTE_KIND, NOTE_SUBJECT};
use koppeling_domain::types::recras::{Note, Staff, User};
use tracing::info;

const LINE_BREAK: &str = "<br>\n";

/// Counters kept for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncCounters {
    pub companies_processed: usize,
    pub companies_skipped: usize,
    pub products_created: usize,
    pub invoices_created: usize,
    pub invoices_existing: usize,
    pub invoices_without_lines: usize,
    pub invoices_failed: usize,
}

/// Messages and counters of one tenant run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    messages: Vec<String>,
    pub counters: SyncCounters,
}

impl SyncReport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message for the note.
    pub fn push(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!(message = %message, "Sync report");
        self.messages.push(message);
    }

    #[must_use]
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Note body: every message followed by an HTML line break.
    #[must_use]
    pub fn to_note_message(&self) -> String {
        self.messages.iter().map(|message| format!("{message}{LINE_BREAK}")).collect()
    }
}

/// Build the report note addressed to `staff` and the first role of `user`.
#[must_use]
pub fn build_report_note(staff: &Staff, user: &User, message: String, now: DateTime<Utc>) -> Note {
    Note {
        id: None,
        kind: NOTE_KIND.to_string(),
        contact_id: staff.id,
        contact_person_id: staff.contact_person_id,
        subject: NOTE_SUBJECT.to_string(),
        message,
        signature: String::new(),
        sticky: false,
        follow_up_at: Some(now),
        follow_up_group: user.first_role_id(),
        follow_up_remark: NOTE_FOLLOW_UP_REMARK.to_string(),
    }
}
