//! Typed access to the outreach collections.
//!
//! Lookups by id never fail for a missing record: `get_*` returns `None`
//! and `update_*` / `delete_*` report `false`.

use std::path::PathBuf;

use chrono::NaiveDateTime;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::records::{
    Document, Profile, Reminder, Schedule, SentEmail, Template, UserProfile, PROFILES_TABLE,
    REMINDERS_TABLE, SCHEDULES_TABLE, SENT_EMAILS_TABLE, TEMPLATES_TABLE, USER_PROFILE_TABLE,
};
use crate::store::{to_fields, DocId, DocumentStore, Fields, StoreError};

pub const DEFAULT_DB_PATH: &str = "email_manager.json";

#[derive(Debug)]
pub struct DatabaseManager {
    store: DocumentStore,
}

impl DatabaseManager {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Ok(Self {
            store: DocumentStore::open(path)?,
        })
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    // Profiles

    pub fn add_profile(&mut self, profile: &Profile) -> Result<DocId, StoreError> {
        let id = self.insert(PROFILES_TABLE, profile)?;
        info!("added profile {} ({})", id, profile.email);
        Ok(id)
    }

    pub fn get_profile(&self, id: DocId) -> Option<Document<Profile>> {
        self.get(PROFILES_TABLE, id)
    }

    pub fn update_profile(&mut self, id: DocId, profile: &Profile) -> Result<bool, StoreError> {
        self.update(PROFILES_TABLE, id, profile)
    }

    pub fn delete_profile(&mut self, id: DocId) -> Result<bool, StoreError> {
        self.store.remove(PROFILES_TABLE, id)
    }

    pub fn get_all_profiles(&self) -> Vec<Document<Profile>> {
        self.all(PROFILES_TABLE)
    }

    // Templates

    pub fn add_template(&mut self, template: &Template) -> Result<DocId, StoreError> {
        let id = self.insert(TEMPLATES_TABLE, template)?;
        info!("added template {} ({})", id, template.name);
        Ok(id)
    }

    pub fn get_template(&self, id: DocId) -> Option<Document<Template>> {
        self.get(TEMPLATES_TABLE, id)
    }

    pub fn update_template(&mut self, id: DocId, template: &Template) -> Result<bool, StoreError> {
        self.update(TEMPLATES_TABLE, id, template)
    }

    pub fn delete_template(&mut self, id: DocId) -> Result<bool, StoreError> {
        self.store.remove(TEMPLATES_TABLE, id)
    }

    pub fn get_all_templates(&self) -> Vec<Document<Template>> {
        self.all(TEMPLATES_TABLE)
    }

    // Sent emails

    pub fn add_sent_email(
        &mut self,
        recipients: Vec<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
        sent_date: NaiveDateTime,
    ) -> Result<DocId, StoreError> {
        let email = SentEmail {
            recipients,
            subject: subject.into(),
            body: body.into(),
            sent_date,
        };
        self.insert(SENT_EMAILS_TABLE, &email)
    }

    pub fn get_sent_email(&self, id: DocId) -> Option<Document<SentEmail>> {
        self.get(SENT_EMAILS_TABLE, id)
    }

    pub fn get_all_sent_emails(&self) -> Vec<Document<SentEmail>> {
        self.all(SENT_EMAILS_TABLE)
    }

    /// Sent emails whose subject, body or any recipient matches `query`.
    ///
    /// `query` is an unanchored, case-sensitive regular expression; if it does
    /// not compile it is matched as a literal substring instead.
    pub fn search_sent_emails(&self, query: &str) -> Vec<Document<SentEmail>> {
        let Some(pattern) = compile_query(query) else {
            return Vec::new();
        };
        let hits = self.store.search(SENT_EMAILS_TABLE, |fields| {
            text_field(fields, "subject").is_some_and(|value| pattern.is_match(value))
                || text_field(fields, "body").is_some_and(|value| pattern.is_match(value))
                || fields
                    .get("recipients")
                    .and_then(Value::as_array)
                    .is_some_and(|recipients| {
                        recipients
                            .iter()
                            .filter_map(Value::as_str)
                            .any(|address| pattern.is_match(address))
                    })
        });
        hits.into_iter()
            .filter_map(|(id, fields)| decode(SENT_EMAILS_TABLE, id, fields))
            .collect()
    }

    // Reminders

    pub fn add_reminder(
        &mut self,
        email_id: DocId,
        reminder_date: NaiveDateTime,
    ) -> Result<DocId, StoreError> {
        self.insert(
            REMINDERS_TABLE,
            &Reminder {
                email_id,
                reminder_date,
            },
        )
    }

    pub fn get_reminder(&self, id: DocId) -> Option<Document<Reminder>> {
        self.get(REMINDERS_TABLE, id)
    }

    pub fn update_reminder(
        &mut self,
        id: DocId,
        reminder_date: NaiveDateTime,
    ) -> Result<bool, StoreError> {
        self.update_date(REMINDERS_TABLE, id, "reminder_date", reminder_date)
    }

    pub fn delete_reminder(&mut self, id: DocId) -> Result<bool, StoreError> {
        self.store.remove(REMINDERS_TABLE, id)
    }

    pub fn get_all_reminders(&self) -> Vec<Document<Reminder>> {
        self.all(REMINDERS_TABLE)
    }

    // Schedules

    pub fn add_schedule(
        &mut self,
        email_id: DocId,
        schedule_date: NaiveDateTime,
    ) -> Result<DocId, StoreError> {
        self.insert(
            SCHEDULES_TABLE,
            &Schedule {
                email_id,
                schedule_date,
            },
        )
    }

    pub fn get_schedule(&self, id: DocId) -> Option<Document<Schedule>> {
        self.get(SCHEDULES_TABLE, id)
    }

    pub fn update_schedule(
        &mut self,
        id: DocId,
        schedule_date: NaiveDateTime,
    ) -> Result<bool, StoreError> {
        self.update_date(SCHEDULES_TABLE, id, "schedule_date", schedule_date)
    }

    pub fn delete_schedule(&mut self, id: DocId) -> Result<bool, StoreError> {
        self.store.remove(SCHEDULES_TABLE, id)
    }

    pub fn get_all_schedules(&self) -> Vec<Document<Schedule>> {
        self.all(SCHEDULES_TABLE)
    }

    // User profile

    /// Replace the singleton user profile.
    pub fn set_user_profile(&mut self, profile: &UserProfile) -> Result<DocId, StoreError> {
        let fields = to_fields(USER_PROFILE_TABLE, profile)?;
        let id = self.store.replace(USER_PROFILE_TABLE, fields)?;
        info!("user profile saved");
        Ok(id)
    }

    pub fn get_user_profile(&self) -> Option<UserProfile> {
        self.all::<UserProfile>(USER_PROFILE_TABLE)
            .into_iter()
            .next()
            .map(|doc| doc.record)
    }

    /// Update the existing user profile in place, or set it when there is none.
    pub fn update_user_profile(&mut self, profile: &UserProfile) -> Result<DocId, StoreError> {
        let existing = self
            .store
            .all(USER_PROFILE_TABLE)
            .first()
            .map(|(id, _)| *id);
        match existing {
            Some(id) => {
                self.update(USER_PROFILE_TABLE, id, profile)?;
                info!("user profile updated");
                Ok(id)
            }
            None => self.set_user_profile(profile),
        }
    }

    pub fn delete_user_profile(&mut self) -> Result<(), StoreError> {
        self.store.truncate(USER_PROFILE_TABLE)
    }

    fn insert<T: Serialize>(&mut self, table: &str, record: &T) -> Result<DocId, StoreError> {
        let fields = to_fields(table, record)?;
        self.store.insert(table, fields)
    }

    fn update<T: Serialize>(
        &mut self,
        table: &str,
        id: DocId,
        record: &T,
    ) -> Result<bool, StoreError> {
        let fields = to_fields(table, record)?;
        self.store.update(table, id, fields)
    }

    fn update_date(
        &mut self,
        table: &str,
        id: DocId,
        field: &str,
        value: NaiveDateTime,
    ) -> Result<bool, StoreError> {
        let encoded = serde_json::to_value(value).map_err(StoreError::Encode)?;
        let mut fields = Map::new();
        fields.insert(field.to_string(), encoded);
        self.store.update(table, id, fields)
    }

    fn get<T: DeserializeOwned>(&self, table: &str, id: DocId) -> Option<Document<T>> {
        let fields = self.store.get(table, id)?;
        decode(table, id, fields)
    }

    fn all<T: DeserializeOwned>(&self, table: &str) -> Vec<Document<T>> {
        self.store
            .all(table)
            .into_iter()
            .filter_map(|(id, fields)| decode(table, id, fields))
            .collect()
    }
}

fn decode<T: DeserializeOwned>(table: &str, id: DocId, fields: &Fields) -> Option<Document<T>> {
    match serde_json::from_value::<T>(Value::Object(fields.clone())) {
        Ok(record) => Some(Document { id, record }),
        Err(err) => {
            warn!("skipping undecodable {} document {}: {}", table, id, err);
            None
        }
    }
}

fn compile_query(query: &str) -> Option<Regex> {
    match Regex::new(query) {
        Ok(pattern) => Some(pattern),
        Err(_) => match Regex::new(&regex::escape(query)) {
            Ok(pattern) => Some(pattern),
            Err(err) => {
                warn!("search query rejected: {}", err);
                None
            }
        },
    }
}

fn text_field<'a>(fields: &'a Fields, key: &str) -> Option<&'a str> {
    fields.get(key).and_then(Value::as_str)
}

/// Social media entries in a stable order for display.
pub fn social_media_entries(profile: &UserProfile) -> Vec<(&str, &str)> {
    profile
        .social_media
        .iter()
        .filter(|(_, value)| !value.trim().is_empty())
        .map(|(key, value)| (key.as_str(), value.as_str()))
        .collect()
}
