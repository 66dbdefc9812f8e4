//! Send, schedule and reminder actions over the stored profiles and templates.
//!
//! Schedules and reminders are inert records: nothing here or elsewhere in the
//! crate reads them back to deliver mail later.

use chrono::{Duration, NaiveDateTime};
use send_emails_module::{Mailer, OutgoingEmail};
use tracing::{debug, error, info};

use crate::database::DatabaseManager;
use crate::records::{Document, Profile, Reminder, SentEmail, ValidationError};
use crate::store::{DocId, StoreError};

pub const DEFAULT_REMINDER_DAYS: u32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum OutreachError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ValidationError> for OutreachError {
    fn from(err: ValidationError) -> Self {
        OutreachError::Validation(err.to_string())
    }
}

/// Recipients and template picked for one compose action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComposeRequest {
    pub recipient_ids: Vec<DocId>,
    pub template_id: Option<DocId>,
    pub add_signature: bool,
    /// Replaces the template body when set.
    pub body_override: Option<String>,
}

impl ComposeRequest {
    pub fn new(recipient_ids: Vec<DocId>, template_id: DocId) -> Self {
        Self {
            recipient_ids,
            template_id: Some(template_id),
            ..Self::default()
        }
    }

    pub fn with_signature(mut self) -> Self {
        self.add_signature = true;
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body_override = Some(body.into());
        self
    }
}

/// A resolved compose action: recipients in selection order plus the final body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub recipients: Vec<Document<Profile>>,
    pub body: String,
}

/// History written for one recipient. `linked_id` is the Schedule or Reminder id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEmail {
    pub recipient: String,
    pub email_id: DocId,
    pub linked_id: DocId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendReport {
    pub sent: Vec<RecordedEmail>,
    pub failed: Vec<String>,
}

impl SendReport {
    pub fn all_sent(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledBatch {
    pub at: NaiveDateTime,
    pub recorded: Vec<RecordedEmail>,
}

/// A reminder joined with the email it follows up on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReminder {
    pub reminder: Document<Reminder>,
    pub email: Document<SentEmail>,
}

pub fn subject_for(profile: &Profile) -> String {
    format!("Email to {}", profile.name)
}

/// Validate the request and build the body every recipient receives.
pub fn prepare_draft(db: &DatabaseManager, request: &ComposeRequest) -> Result<Draft, OutreachError> {
    let template_id = match request.template_id {
        Some(id) if !request.recipient_ids.is_empty() => id,
        _ => {
            return Err(OutreachError::Validation(
                "please select at least one recipient and a template".to_string(),
            ))
        }
    };
    let template = db
        .get_template(template_id)
        .ok_or_else(|| OutreachError::Validation(format!("template {} not found", template_id)))?;

    let mut recipients: Vec<Document<Profile>> = Vec::with_capacity(request.recipient_ids.len());
    for id in &request.recipient_ids {
        if recipients.iter().any(|profile| profile.id == *id) {
            continue;
        }
        let profile = db
            .get_profile(*id)
            .ok_or_else(|| OutreachError::Validation(format!("profile {} not found", id)))?;
        recipients.push(profile);
    }

    let mut body = request
        .body_override
        .clone()
        .unwrap_or_else(|| template.record.body.clone());
    if request.add_signature {
        let signature = db
            .get_user_profile()
            .map(|profile| profile.signature)
            .unwrap_or_default();
        body.push_str("\n\n");
        body.push_str(&signature);
    }

    Ok(Draft { recipients, body })
}

/// Dispatch one email per recipient and record the ones that went out.
///
/// History (a SentEmail plus a Schedule stamped `now`) is only written for
/// recipients whose dispatch succeeded; failures are listed in the report.
pub fn send_now<M: Mailer + ?Sized>(
    db: &mut DatabaseManager,
    mailer: &M,
    request: &ComposeRequest,
    now: NaiveDateTime,
) -> Result<SendReport, OutreachError> {
    let draft = prepare_draft(db, request)?;
    let mut report = SendReport::default();

    for profile in &draft.recipients {
        let subject = subject_for(profile);
        let email = OutgoingEmail::new(vec![profile.email.clone()], subject.clone(), draft.body.clone());
        if !mailer.send(&email) {
            error!("failed to send email to {}", profile.email);
            report.failed.push(profile.email.clone());
            continue;
        }
        let email_id = db.add_sent_email(vec![profile.email.clone()], subject, draft.body.clone(), now)?;
        let schedule_id = db.add_schedule(email_id, now)?;
        report.sent.push(RecordedEmail {
            recipient: profile.email.clone(),
            email_id,
            linked_id: schedule_id,
        });
    }

    info!(
        "send finished: {} sent, {} failed",
        report.sent.len(),
        report.failed.len()
    );
    Ok(report)
}

/// Record emails for later delivery at `at` without dispatching anything.
pub fn schedule(
    db: &mut DatabaseManager,
    request: &ComposeRequest,
    at: NaiveDateTime,
    now: NaiveDateTime,
) -> Result<ScheduledBatch, OutreachError> {
    if at.date() < now.date() {
        return Err(OutreachError::Validation(format!(
            "schedule date {} is in the past",
            at.date()
        )));
    }
    let draft = prepare_draft(db, request)?;

    let mut recorded = Vec::with_capacity(draft.recipients.len());
    for profile in &draft.recipients {
        let email_id = db.add_sent_email(
            vec![profile.email.clone()],
            subject_for(profile),
            draft.body.clone(),
            at,
        )?;
        let schedule_id = db.add_schedule(email_id, at)?;
        recorded.push(RecordedEmail {
            recipient: profile.email.clone(),
            email_id,
            linked_id: schedule_id,
        });
    }

    info!("scheduled {} emails for {}", recorded.len(), at);
    Ok(ScheduledBatch { at, recorded })
}

/// Record emails stamped `now` with a follow-up reminder `days` later.
pub fn add_reminder(
    db: &mut DatabaseManager,
    request: &ComposeRequest,
    days: u32,
    now: NaiveDateTime,
) -> Result<ScheduledBatch, OutreachError> {
    if days == 0 {
        return Err(OutreachError::Validation(
            "reminder must be at least one day out".to_string(),
        ));
    }
    let reminder_date = now
        .checked_add_signed(Duration::days(i64::from(days)))
        .ok_or_else(|| OutreachError::Validation("reminder date out of range".to_string()))?;
    let draft = prepare_draft(db, request)?;

    let mut recorded = Vec::with_capacity(draft.recipients.len());
    for profile in &draft.recipients {
        let email_id = db.add_sent_email(
            vec![profile.email.clone()],
            subject_for(profile),
            draft.body.clone(),
            now,
        )?;
        let reminder_id = db.add_reminder(email_id, reminder_date)?;
        recorded.push(RecordedEmail {
            recipient: profile.email.clone(),
            email_id,
            linked_id: reminder_id,
        });
    }

    info!("reminders set for {}", reminder_date);
    Ok(ScheduledBatch {
        at: reminder_date,
        recorded,
    })
}

/// Reminders whose email still exists, in creation order.
pub fn pending_reminders(db: &DatabaseManager) -> Vec<PendingReminder> {
    db.get_all_reminders()
        .into_iter()
        .filter_map(|reminder| match db.get_sent_email(reminder.email_id) {
            Some(email) => Some(PendingReminder { reminder, email }),
            None => {
                debug!(
                    "reminder {} points at missing email {}",
                    reminder.id, reminder.email_id
                );
                None
            }
        })
        .collect()
}

/// Dismiss a reminder; done and deleted reminders are both removed.
pub fn complete_reminder(db: &mut DatabaseManager, id: DocId) -> Result<bool, OutreachError> {
    Ok(db.delete_reminder(id)?)
}
