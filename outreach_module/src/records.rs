use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::store::DocId;

pub const PROFILES_TABLE: &str = "profiles";
pub const TEMPLATES_TABLE: &str = "templates";
pub const SENT_EMAILS_TABLE: &str = "sent_emails";
pub const REMINDERS_TABLE: &str = "reminders";
pub const SCHEDULES_TABLE: &str = "schedules";
pub const USER_PROFILE_TABLE: &str = "user_profile";

/// Keys offered by the user profile form; any other key is kept as-is.
pub const SOCIAL_MEDIA_KEYS: [&str; 4] = ["linkedin", "x", "github", "personal website"];

/// A stored record together with the id the store assigned to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document<T> {
    pub id: DocId,
    pub record: T,
}

impl<T> std::ops::Deref for Document<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.record
    }
}

/// An address-book entry usable as a recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub email: String,
    pub title: String,
    pub profession: String,
}

impl Profile {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        title: impl Into<String>,
        profession: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            title: title.into(),
            profession: profession.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require("name", &self.name)?;
        require("email", &self.email)?;
        require("title", &self.title)?;
        require("profession", &self.profession)
    }
}

/// A reusable body. Placeholders such as `{{name}}` are stored and sent verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    pub body: String,
}

impl Template {
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require("name", &self.name)?;
        require("body", &self.body)
    }
}

/// History entry written by send, schedule and reminder actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentEmail {
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
    pub sent_date: NaiveDateTime,
}

// `email_id` in Reminder and Schedule is a plain reference; the SentEmail may be gone.

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub email_id: DocId,
    pub reminder_date: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub email_id: DocId,
    pub schedule_date: NaiveDateTime,
}

/// The local user's own identity and signature. At most one exists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub degree: String,
    #[serde(default)]
    pub university: String,
    #[serde(default)]
    pub profession: String,
    #[serde(default)]
    pub social_media: BTreeMap<String, String>,
    #[serde(default)]
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
}

fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::EmptyField(field))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn profile_requires_every_field() {
        let profile = Profile::new("Ada", "ada@example.com", "Lead", "Engineer");
        assert!(profile.validate().is_ok());

        let missing_title = Profile::new("Ada", "ada@example.com", "  ", "Engineer");
        assert_eq!(
            missing_title.validate(),
            Err(ValidationError::EmptyField("title"))
        );
    }

    #[test]
    fn template_requires_name_and_body() {
        assert!(Template::new("Intro", "Hi {{name}}").validate().is_ok());
        assert_eq!(
            Template::new("Intro", "").validate(),
            Err(ValidationError::EmptyField("body"))
        );
    }

    #[test]
    fn sent_email_dates_use_iso_format() {
        let email = SentEmail {
            recipients: vec!["a@x.com".to_string()],
            subject: "Meeting tomorrow".to_string(),
            body: "...".to_string(),
            sent_date: NaiveDate::from_ymd_opt(2026, 1, 15)
                .unwrap()
                .and_hms_micro_opt(9, 30, 0, 250_000)
                .unwrap(),
        };
        let value = serde_json::to_value(&email).unwrap();
        assert_eq!(value["sent_date"], "2026-01-15T09:30:00.250");

        let parsed: SentEmail = serde_json::from_value(serde_json::json!({
            "recipients": ["a@x.com"],
            "subject": "Meeting tomorrow",
            "body": "...",
            "sent_date": "2026-01-15T09:30:00.250000",
        }))
        .unwrap();
        assert_eq!(parsed, email);
    }

    #[test]
    fn user_profile_tolerates_missing_fields() {
        let parsed: UserProfile =
            serde_json::from_value(serde_json::json!({"name": "Me"})).unwrap();
        assert_eq!(parsed.name, "Me");
        assert!(parsed.social_media.is_empty());
        assert!(parsed.signature.is_empty());
    }
}
