pub mod cli;
pub mod config;
pub mod database;
pub mod outreach;
pub mod records;
pub mod store;

pub use database::DatabaseManager;
pub use outreach::{
    add_reminder, complete_reminder, pending_reminders, prepare_draft, schedule, send_now,
    ComposeRequest, OutreachError, PendingReminder, SendReport,
};
pub use records::{Document, Profile, Reminder, Schedule, SentEmail, Template, UserProfile};
pub use store::{DocId, DocumentStore, StoreError};
