//! SMTP delivery for outreach emails.
//!
//! Sender credentials come from `EMAIL_SENDER` / `EMAIL_PASSWORD` and are read
//! on every call. Each call opens one authenticated session, sends a single
//! message to every listed recipient, and closes the session again.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::{error, info};

pub const SENDER_ENV: &str = "EMAIL_SENDER";
pub const PASSWORD_ENV: &str = "EMAIL_PASSWORD";
pub const SMTP_HOST_ENV: &str = "EMAIL_SMTP_HOST";
pub const SMTP_PORT_ENV: &str = "EMAIL_SMTP_PORT";

const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
const DEFAULT_SMTP_PORT: u16 = 465;

#[derive(Debug, thiserror::Error)]
pub enum SendEmailError {
    #[error("missing environment variable: {0}")]
    MissingEnv(&'static str),
    #[error("no recipients provided")]
    NoRecipients,
    #[error("invalid address '{address}': {source}")]
    InvalidAddress {
        address: String,
        source: lettre::address::AddressError,
    },
    #[error("failed to read attachment {}: {source}", path.display())]
    Attachment { path: PathBuf, source: io::Error },
    #[error("invalid attachment content type: {0}")]
    ContentType(#[from] lettre::message::header::ContentTypeErr),
    #[error("failed to build message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("smtp error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

#[derive(Clone)]
pub struct SmtpCredentials {
    pub sender: String,
    pub password: String,
}

impl std::fmt::Debug for SmtpCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpCredentials")
            .field("sender", &self.sender)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl SmtpCredentials {
    pub fn from_env() -> Result<Self, SendEmailError> {
        dotenvy::dotenv().ok();
        Ok(Self {
            sender: read_env(SENDER_ENV).ok_or(SendEmailError::MissingEnv(SENDER_ENV))?,
            password: read_env(PASSWORD_ENV).ok_or(SendEmailError::MissingEnv(PASSWORD_ENV))?,
        })
    }
}

/// Mail relay endpoint. Port 465 uses implicit TLS, anything else STARTTLS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
}

impl Default for SmtpSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_SMTP_HOST.to_string(),
            port: DEFAULT_SMTP_PORT,
        }
    }
}

impl SmtpSettings {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: read_env(SMTP_HOST_ENV).unwrap_or(defaults.host),
            port: read_env(SMTP_PORT_ENV)
                .and_then(|value| value.parse::<u16>().ok())
                .filter(|port| *port > 0)
                .unwrap_or(defaults.port),
        }
    }

    fn transport(&self, credentials: &SmtpCredentials) -> Result<SmtpTransport, SendEmailError> {
        let builder = if self.port == DEFAULT_SMTP_PORT {
            SmtpTransport::relay(&self.host)?
        } else {
            SmtpTransport::starttls_relay(&self.host)?
        };
        Ok(builder
            .port(self.port)
            .credentials(Credentials::new(
                credentials.sender.clone(),
                credentials.password.clone(),
            ))
            .build())
    }
}

/// A composed message ready for dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: Vec<String>,
    pub subject: String,
    pub contents: String,
    pub attachments: Vec<PathBuf>,
}

impl OutgoingEmail {
    pub fn new(to: Vec<String>, subject: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            to,
            subject: subject.into(),
            contents: contents.into(),
            attachments: Vec::new(),
        }
    }
}

/// Delivery seam used by callers; one call is one outcome for all recipients.
pub trait Mailer {
    fn send(&self, email: &OutgoingEmail) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SmtpMailer;

impl Mailer for SmtpMailer {
    fn send(&self, email: &OutgoingEmail) -> bool {
        send_email(&email.to, &email.subject, &email.contents, &email.attachments)
    }
}

/// Send one message and report only whether it went out.
pub fn send_email<S: AsRef<str>, P: AsRef<Path>>(
    to: &[S],
    subject: &str,
    contents: &str,
    attachments: &[P],
) -> bool {
    match try_send_email(to, subject, contents, attachments) {
        Ok(()) => {
            info!("email sent successfully");
            true
        }
        Err(SendEmailError::MissingEnv(key)) => {
            error!("sender email or password not found in environment ({})", key);
            false
        }
        Err(err) => {
            error!("an error occurred while sending the email: {}", err);
            false
        }
    }
}

pub fn try_send_email<S: AsRef<str>, P: AsRef<Path>>(
    to: &[S],
    subject: &str,
    contents: &str,
    attachments: &[P],
) -> Result<(), SendEmailError> {
    let credentials = SmtpCredentials::from_env()?;
    let message = build_message(&credentials.sender, to, subject, contents, attachments)?;
    let transport = SmtpSettings::from_env().transport(&credentials)?;
    transport.send(&message)?;
    Ok(())
}

pub fn build_message<S: AsRef<str>, P: AsRef<Path>>(
    from: &str,
    to: &[S],
    subject: &str,
    contents: &str,
    attachments: &[P],
) -> Result<Message, SendEmailError> {
    if to.is_empty() {
        return Err(SendEmailError::NoRecipients);
    }
    let mut builder = Message::builder()
        .from(parse_mailbox(from)?)
        .subject(subject);
    for address in to {
        builder = builder.to(parse_mailbox(address.as_ref())?);
    }

    if attachments.is_empty() {
        return Ok(builder
            .header(ContentType::TEXT_PLAIN)
            .body(contents.to_string())?);
    }

    let mut multipart = MultiPart::mixed().singlepart(SinglePart::plain(contents.to_string()));
    for path in attachments {
        multipart = multipart.singlepart(attachment_part(path.as_ref())?);
    }
    Ok(builder.multipart(multipart)?)
}

fn attachment_part(path: &Path) -> Result<SinglePart, SendEmailError> {
    let bytes = fs::read(path).map_err(|source| SendEmailError::Attachment {
        path: path.to_path_buf(),
        source,
    })?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment".to_string());
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    let content_type = ContentType::parse(mime.as_ref())?;
    Ok(Attachment::new(filename).body(bytes, content_type))
}

fn parse_mailbox(raw: &str) -> Result<Mailbox, SendEmailError> {
    raw.trim()
        .parse::<Mailbox>()
        .map_err(|source| SendEmailError::InvalidAddress {
            address: raw.to_string(),
            source,
        })
}

fn read_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    // Blank values count as unset and keep dotenvy from loading a local `.env` over them.
    struct EnvGuard {
        key: &'static str,
        previous: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &'static str, value: &str) -> Self {
            let previous = env::var(key).ok();
            env::set_var(key, value);
            Self { key, previous }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.previous {
                Some(value) => env::set_var(self.key, value),
                None => env::remove_var(self.key),
            }
        }
    }

    const NO_ATTACHMENTS: &[&str] = &[];

    #[test]
    #[serial]
    fn send_email_fails_without_sender() {
        let _sender = EnvGuard::set(SENDER_ENV, "");
        let _password = EnvGuard::set(PASSWORD_ENV, "secret");
        // Unroutable relay: reaching the network would not fail fast.
        let _host = EnvGuard::set(SMTP_HOST_ENV, "smtp.invalid");

        assert!(!send_email(&["ada@example.com"], "Hi", "Body", NO_ATTACHMENTS));
        assert!(matches!(
            try_send_email(&["ada@example.com"], "Hi", "Body", NO_ATTACHMENTS),
            Err(SendEmailError::MissingEnv(SENDER_ENV))
        ));
    }

    #[test]
    #[serial]
    fn send_email_fails_without_password() {
        let _sender = EnvGuard::set(SENDER_ENV, "me@example.com");
        let _password = EnvGuard::set(PASSWORD_ENV, "");

        assert!(matches!(
            try_send_email(&["ada@example.com"], "Hi", "Body", NO_ATTACHMENTS),
            Err(SendEmailError::MissingEnv(PASSWORD_ENV))
        ));
    }

    #[test]
    #[serial]
    fn blank_credentials_count_as_missing() {
        let _sender = EnvGuard::set(SENDER_ENV, "   ");
        let _password = EnvGuard::set(PASSWORD_ENV, "secret");

        assert!(matches!(
            SmtpCredentials::from_env(),
            Err(SendEmailError::MissingEnv(SENDER_ENV))
        ));
    }

    #[test]
    #[serial]
    fn local_dotenv_does_not_override_blank_credentials() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(".env"),
            "EMAIL_SENDER=dotenv@example.com\nEMAIL_PASSWORD=dotenv-secret\n",
        )
        .unwrap();
        let previous_dir = env::current_dir().unwrap();
        env::set_current_dir(temp.path()).unwrap();
        let _sender = EnvGuard::set(SENDER_ENV, "");
        let _password = EnvGuard::set(PASSWORD_ENV, "");

        let result = SmtpCredentials::from_env();
        env::set_current_dir(previous_dir).unwrap();

        assert!(matches!(result, Err(SendEmailError::MissingEnv(SENDER_ENV))));
    }

    #[test]
    #[serial]
    fn invalid_recipient_is_rejected_before_connecting() {
        let _sender = EnvGuard::set(SENDER_ENV, "me@example.com");
        let _password = EnvGuard::set(PASSWORD_ENV, "secret");
        let _host = EnvGuard::set(SMTP_HOST_ENV, "smtp.invalid");

        let result = try_send_email(&["not-an-address"], "Hi", "Body", NO_ATTACHMENTS);
        match result {
            Err(SendEmailError::InvalidAddress { address, .. }) => {
                assert_eq!(address, "not-an-address")
            }
            other => panic!("expected invalid address, got {:?}", other),
        }
        assert!(!send_email(&["not-an-address"], "Hi", "Body", NO_ATTACHMENTS));
    }

    #[test]
    #[serial]
    fn smtp_settings_fall_back_to_defaults() {
        let _host = EnvGuard::set(SMTP_HOST_ENV, "");
        let _port = EnvGuard::set(SMTP_PORT_ENV, "not-a-port");

        assert_eq!(SmtpSettings::from_env(), SmtpSettings::default());
    }

    #[test]
    #[serial]
    fn smtp_settings_read_overrides() {
        let _host = EnvGuard::set(SMTP_HOST_ENV, "mail.example.com");
        let _port = EnvGuard::set(SMTP_PORT_ENV, "587");

        let settings = SmtpSettings::from_env();
        assert_eq!(settings.host, "mail.example.com");
        assert_eq!(settings.port, 587);
    }

    #[test]
    fn build_message_requires_recipients() {
        let to: &[&str] = &[];
        assert!(matches!(
            build_message("me@example.com", to, "Hi", "Body", NO_ATTACHMENTS),
            Err(SendEmailError::NoRecipients)
        ));
    }

    #[test]
    fn build_message_addresses_every_recipient() {
        let message = build_message(
            "me@example.com",
            &["ada@example.com", "grace@example.com"],
            "Meeting tomorrow",
            "Hi {{name}}",
            NO_ATTACHMENTS,
        )
        .unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("ada@example.com"));
        assert!(raw.contains("grace@example.com"));
        assert!(raw.contains("Subject: Meeting tomorrow"));
        assert!(raw.contains("Hi {{name}}"));
    }

    #[test]
    fn build_message_attaches_files() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("notes.txt");
        fs::write(&path, "attached notes").unwrap();

        let message = build_message(
            "me@example.com",
            &["ada@example.com"],
            "Notes",
            "See attached",
            &[&path],
        )
        .unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("notes.txt"));
        assert!(raw.contains("See attached"));
    }

    #[test]
    fn build_message_reports_missing_attachment() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("missing.pdf");

        let result = build_message(
            "me@example.com",
            &["ada@example.com"],
            "Notes",
            "See attached",
            &[&path],
        );
        assert!(matches!(result, Err(SendEmailError::Attachment { .. })));
    }
}
