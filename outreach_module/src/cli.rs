//! Command-line front end for the outreach manager.

use std::collections::{BTreeMap, HashSet};
use std::io::{self, Write};

use chrono::{NaiveDate, NaiveDateTime};
use send_emails_module::Mailer;

use crate::config::AppConfig;
use crate::database::{social_media_entries, DatabaseManager};
use crate::outreach::{
    add_reminder, complete_reminder, pending_reminders, schedule, send_now, ComposeRequest,
    OutreachError, ScheduledBatch,
};
use crate::records::{Document, Profile, SentEmail, Template, UserProfile};
use crate::store::{DocId, StoreError};

pub const USAGE: &str = r##"Usage: outreach <command> [arguments]

Profiles:
  profiles list
  profiles add --name=<name> --email=<email> --title=<title> --profession=<profession>
  profiles update <id> [--name=..] [--email=..] [--title=..] [--profession=..]
  profiles delete <id>

Templates:
  templates list
  templates add --name=<name> --body=<text>
  templates update <id> [--name=..] [--body=..]
  templates delete <id>

Sending (recipient ids are comma separated):
  send     --to=<ids> --template=<id> [--sign] [--body=<text>]
  schedule --to=<ids> --template=<id> --at=<YYYY-MM-DD[THH:MM[:SS]]> [--sign] [--body=<text>]
  remind   --to=<ids> --template=<id> [--days=<n>] [--sign] [--body=<text>]

History:
  reminders list | reminders done <id> | reminders delete <id>
  schedules list
  sent list | sent search <query>

User profile:
  me show
  me set [--name=..] [--title=..] [--degree=..] [--university=..] [--profession=..]
         [--linkedin=..] [--x=..] [--github=..] [--website=..] [--signature=..]
  me delete

Environment Variables:
  OUTREACH_DB_PATH        - Store file (default: email_manager.json)
  OUTREACH_REMINDER_DAYS  - Default reminder offset in days (default: 3)
  EMAIL_SENDER            - Sender address used for SMTP login
  EMAIL_PASSWORD          - SMTP password or app password
  EMAIL_SMTP_HOST         - Relay host (default: smtp.gmail.com)
  EMAIL_SMTP_PORT         - Relay port (default: 465)

Text values accept \n and \t escapes. Use --flag=<value> for values starting with "--".
"##;

const SWITCHES: [&str; 1] = ["--sign"];

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Outreach(#[from] OutreachError),
    #[error("{0}")]
    Store(#[from] StoreError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to send to: {}", .0.join(", "))]
    DeliveryFailed(Vec<String>),
}

impl CliError {
    pub fn is_usage(&self) -> bool {
        matches!(self, CliError::Usage(_))
    }
}

fn usage(message: impl Into<String>) -> CliError {
    CliError::Usage(message.into())
}

/// Parsed command line: positional words, `--flag=value` pairs and bare switches.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ParsedArgs {
    pub positional: Vec<String>,
    flags: BTreeMap<String, String>,
    switches: HashSet<String>,
}

impl ParsedArgs {
    pub fn parse(args: &[String]) -> Result<Self, CliError> {
        let mut parsed = Self::default();
        let mut iter = args.iter().peekable();
        while let Some(arg) = iter.next() {
            if !arg.starts_with("--") {
                parsed.positional.push(arg.clone());
                continue;
            }
            if let Some((flag, value)) = arg.split_once('=') {
                if SWITCHES.contains(&flag) {
                    return Err(usage(format!("{} does not take a value", flag)));
                }
                parsed
                    .flags
                    .insert(flag.to_string(), unescape_string(value));
                continue;
            }
            if SWITCHES.contains(&arg.as_str()) {
                parsed.switches.insert(arg.clone());
                continue;
            }
            match iter.next_if(|next| !next.starts_with("--")) {
                Some(value) => {
                    parsed.flags.insert(arg.clone(), unescape_string(value));
                }
                None => return Err(usage(format!("missing value for {}", arg))),
            }
        }
        Ok(parsed)
    }

    pub fn flag(&self, name: &str) -> Option<&str> {
        self.flags.get(name).map(String::as_str)
    }

    pub fn switch(&self, name: &str) -> bool {
        self.switches.contains(name)
    }

    fn required(&self, name: &str) -> Result<&str, CliError> {
        self.flag(name)
            .ok_or_else(|| usage(format!("missing required flag {}", name)))
    }

    fn id_at(&self, index: usize, what: &str) -> Result<DocId, CliError> {
        let raw = self
            .positional
            .get(index)
            .ok_or_else(|| usage(format!("missing {} id", what)))?;
        parse_id(raw)
    }
}

/// Process escape sequences in a string (e.g., \n -> newline, \t -> tab)
fn unescape_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.peek() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('\\') => result.push('\\'),
            _ => {
                result.push(c);
                continue;
            }
        }
        chars.next();
    }
    result
}

fn parse_id(raw: &str) -> Result<DocId, CliError> {
    raw.trim()
        .parse::<DocId>()
        .map_err(|_| usage(format!("invalid id '{}'", raw)))
}

fn parse_ids(raw: &str) -> Result<Vec<DocId>, CliError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(parse_id)
        .collect()
}

/// Accepts `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM[:SS]` or the same with a space.
pub fn parse_datetime(raw: &str) -> Result<NaiveDateTime, CliError> {
    let raw = raw.trim();
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    for format in FORMATS {
        if let Ok(value) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(value);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| usage(format!("invalid date/time '{}'", raw)))
}

fn format_datetime(value: NaiveDateTime) -> String {
    value.format("%Y-%m-%d %H:%M").to_string()
}

/// Everything a command needs besides its arguments.
pub struct Context<'a> {
    pub db: &'a mut DatabaseManager,
    pub mailer: &'a dyn Mailer,
    pub config: &'a AppConfig,
    pub now: NaiveDateTime,
}

pub fn run(args: &[String], ctx: &mut Context<'_>, out: &mut dyn Write) -> Result<(), CliError> {
    let parsed = ParsedArgs::parse(args)?;
    let command = parsed
        .positional
        .first()
        .ok_or_else(|| usage("missing command"))?
        .clone();
    let action = parsed.positional.get(1).map(String::as_str);

    match (command.as_str(), action) {
        ("profiles", Some("list")) | ("profiles", None) => list_profiles(ctx, out),
        ("profiles", Some("add")) => add_profile(ctx, &parsed, out),
        ("profiles", Some("update")) => update_profile(ctx, &parsed, out),
        ("profiles", Some("delete")) => {
            let id = parsed.id_at(2, "profile")?;
            if ctx.db.delete_profile(id)? {
                writeln!(out, "Profile deleted")?;
            } else {
                writeln!(out, "Profile {} not found", id)?;
            }
            Ok(())
        }
        ("templates", Some("list")) | ("templates", None) => list_templates(ctx, out),
        ("templates", Some("add")) => add_template(ctx, &parsed, out),
        ("templates", Some("update")) => update_template(ctx, &parsed, out),
        ("templates", Some("delete")) => {
            let id = parsed.id_at(2, "template")?;
            if ctx.db.delete_template(id)? {
                writeln!(out, "Template deleted")?;
            } else {
                writeln!(out, "Template {} not found", id)?;
            }
            Ok(())
        }
        ("send", _) => send(ctx, &parsed, out),
        ("schedule", _) => {
            let request = compose_request(&parsed)?;
            let at = parse_datetime(parsed.required("--at")?)?;
            let batch = schedule(ctx.db, &request, at, ctx.now)?;
            report_batch(out, "Emails scheduled for", &batch)
        }
        ("remind", _) => {
            let request = compose_request(&parsed)?;
            let days = match parsed.flag("--days") {
                Some(raw) => raw
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| usage(format!("invalid day count '{}'", raw)))?,
                None => ctx.config.reminder_days,
            };
            let batch = add_reminder(ctx.db, &request, days, ctx.now)?;
            report_batch(out, "Reminders set for", &batch)
        }
        ("reminders", Some("list")) | ("reminders", None) => list_reminders(ctx, out),
        ("reminders", Some(verb @ ("done" | "delete"))) => {
            let id = parsed.id_at(2, "reminder")?;
            if !complete_reminder(ctx.db, id)? {
                writeln!(out, "Reminder {} not found", id)?;
            } else if verb == "done" {
                writeln!(out, "Reminder marked as done!")?;
            } else {
                writeln!(out, "Reminder deleted!")?;
            }
            Ok(())
        }
        ("schedules", Some("list")) | ("schedules", None) => list_schedules(ctx, out),
        ("sent", Some("list")) | ("sent", None) => {
            let emails = ctx.db.get_all_sent_emails();
            print_sent(out, &emails)
        }
        ("sent", Some("search")) => {
            let query = parsed
                .positional
                .get(2)
                .ok_or_else(|| usage("missing search query"))?;
            let emails = ctx.db.search_sent_emails(query);
            print_sent(out, &emails)
        }
        ("me", Some("show")) | ("me", None) => show_user_profile(ctx, out),
        ("me", Some("set")) => set_user_profile(ctx, &parsed, out),
        ("me", Some("delete")) => {
            ctx.db.delete_user_profile()?;
            writeln!(out, "Profile deleted")?;
            Ok(())
        }
        (command, action) => Err(usage(format!(
            "unknown command: {} {}",
            command,
            action.unwrap_or("")
        ))),
    }
}

fn list_profiles(ctx: &Context<'_>, out: &mut dyn Write) -> Result<(), CliError> {
    let profiles = ctx.db.get_all_profiles();
    if profiles.is_empty() {
        writeln!(out, "No profiles yet. Add a profile to get started.")?;
        return Ok(());
    }
    for profile in profiles {
        writeln!(
            out,
            "[{}] {} <{}> {} · {}",
            profile.id, profile.name, profile.email, profile.title, profile.profession
        )?;
    }
    Ok(())
}

fn add_profile(ctx: &mut Context<'_>, parsed: &ParsedArgs, out: &mut dyn Write) -> Result<(), CliError> {
    let profile = Profile::new(
        parsed.flag("--name").unwrap_or_default(),
        parsed.flag("--email").unwrap_or_default(),
        parsed.flag("--title").unwrap_or_default(),
        parsed.flag("--profession").unwrap_or_default(),
    );
    profile
        .validate()
        .map_err(|_| usage("please fill in all fields"))?;
    let id = ctx.db.add_profile(&profile)?;
    writeln!(out, "Profile added successfully (id {})", id)?;
    Ok(())
}

fn update_profile(
    ctx: &mut Context<'_>,
    parsed: &ParsedArgs,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    let id = parsed.id_at(2, "profile")?;
    let Some(existing) = ctx.db.get_profile(id) else {
        writeln!(out, "Profile {} not found", id)?;
        return Ok(());
    };
    let current = existing.record;
    let profile = Profile {
        name: pick(parsed, "--name", current.name),
        email: pick(parsed, "--email", current.email),
        title: pick(parsed, "--title", current.title),
        profession: pick(parsed, "--profession", current.profession),
    };
    profile
        .validate()
        .map_err(|_| usage("please fill in all fields"))?;
    ctx.db.update_profile(id, &profile)?;
    writeln!(out, "Profile updated")?;
    Ok(())
}

fn list_templates(ctx: &Context<'_>, out: &mut dyn Write) -> Result<(), CliError> {
    let templates = ctx.db.get_all_templates();
    if templates.is_empty() {
        writeln!(out, "No templates yet. Add one to get started.")?;
        return Ok(());
    }
    for template in templates {
        writeln!(out, "[{}] {}", template.id, template.name)?;
        for line in template.body.lines() {
            writeln!(out, "    {}", line)?;
        }
    }
    Ok(())
}

fn add_template(ctx: &mut Context<'_>, parsed: &ParsedArgs, out: &mut dyn Write) -> Result<(), CliError> {
    let template = Template::new(
        parsed.flag("--name").unwrap_or_default(),
        parsed.flag("--body").unwrap_or_default(),
    );
    template
        .validate()
        .map_err(|_| usage("please fill in both the template name and body"))?;
    let id = ctx.db.add_template(&template)?;
    writeln!(out, "Template added successfully (id {})", id)?;
    Ok(())
}

fn update_template(
    ctx: &mut Context<'_>,
    parsed: &ParsedArgs,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    let id = parsed.id_at(2, "template")?;
    let Some(existing) = ctx.db.get_template(id) else {
        writeln!(out, "Template {} not found", id)?;
        return Ok(());
    };
    let current = existing.record;
    let template = Template {
        name: pick(parsed, "--name", current.name),
        body: pick(parsed, "--body", current.body),
    };
    template
        .validate()
        .map_err(|_| usage("please fill in both the template name and body"))?;
    ctx.db.update_template(id, &template)?;
    writeln!(out, "Template updated")?;
    Ok(())
}

fn compose_request(parsed: &ParsedArgs) -> Result<ComposeRequest, CliError> {
    let recipient_ids = match parsed.flag("--to") {
        Some(raw) => parse_ids(raw)?,
        None => Vec::new(),
    };
    let template_id = parsed.flag("--template").map(parse_id).transpose()?;
    Ok(ComposeRequest {
        recipient_ids,
        template_id,
        add_signature: parsed.switch("--sign"),
        body_override: parsed.flag("--body").map(str::to_string),
    })
}

fn send(ctx: &mut Context<'_>, parsed: &ParsedArgs, out: &mut dyn Write) -> Result<(), CliError> {
    let request = compose_request(parsed)?;
    let report = send_now(ctx.db, ctx.mailer, &request, ctx.now)?;
    for recorded in &report.sent {
        writeln!(out, "Sent to {} (email {})", recorded.recipient, recorded.email_id)?;
    }
    if report.all_sent() {
        writeln!(out, "Emails sent successfully")?;
        Ok(())
    } else {
        Err(CliError::DeliveryFailed(report.failed))
    }
}

fn report_batch(out: &mut dyn Write, label: &str, batch: &ScheduledBatch) -> Result<(), CliError> {
    for recorded in &batch.recorded {
        writeln!(out, "Recorded email {} for {}", recorded.email_id, recorded.recipient)?;
    }
    writeln!(out, "{} {}", label, format_datetime(batch.at))?;
    Ok(())
}

fn list_reminders(ctx: &Context<'_>, out: &mut dyn Write) -> Result<(), CliError> {
    let pending = pending_reminders(ctx.db);
    if pending.is_empty() {
        writeln!(out, "No reminders set yet. Add some with `outreach remind`.")?;
        return Ok(());
    }
    for entry in pending {
        writeln!(
            out,
            "[{}] {} | due {} | recipients: {}",
            entry.reminder.id,
            entry.email.subject,
            format_datetime(entry.reminder.reminder_date),
            entry.email.recipients.join(", ")
        )?;
    }
    Ok(())
}

fn list_schedules(ctx: &Context<'_>, out: &mut dyn Write) -> Result<(), CliError> {
    let schedules = ctx.db.get_all_schedules();
    if schedules.is_empty() {
        writeln!(out, "No scheduled emails.")?;
        return Ok(());
    }
    for entry in schedules {
        let subject = ctx
            .db
            .get_sent_email(entry.email_id)
            .map(|email| email.record.subject)
            .unwrap_or_else(|| "(missing email)".to_string());
        writeln!(
            out,
            "[{}] {} | email {} | {}",
            entry.id,
            format_datetime(entry.schedule_date),
            entry.email_id,
            subject
        )?;
    }
    Ok(())
}

fn print_sent(out: &mut dyn Write, emails: &[Document<SentEmail>]) -> Result<(), CliError> {
    if emails.is_empty() {
        writeln!(out, "No emails found.")?;
        return Ok(());
    }
    for email in emails {
        writeln!(
            out,
            "[{}] {} | {} | to: {}",
            email.id,
            format_datetime(email.sent_date),
            email.subject,
            email.recipients.join(", ")
        )?;
    }
    Ok(())
}

fn show_user_profile(ctx: &Context<'_>, out: &mut dyn Write) -> Result<(), CliError> {
    let Some(profile) = ctx.db.get_user_profile() else {
        writeln!(out, "No user profile yet. Create one with `outreach me set`.")?;
        return Ok(());
    };
    writeln!(out, "Name:       {}", profile.name)?;
    writeln!(out, "Title:      {}", profile.title)?;
    writeln!(out, "Degree:     {}", profile.degree)?;
    writeln!(out, "University: {}", profile.university)?;
    writeln!(out, "Profession: {}", profile.profession)?;
    for (network, link) in social_media_entries(&profile) {
        writeln!(out, "{}: {}", network, link)?;
    }
    if !profile.signature.is_empty() {
        writeln!(out, "Signature:\n{}", profile.signature)?;
    }
    Ok(())
}

fn set_user_profile(
    ctx: &mut Context<'_>,
    parsed: &ParsedArgs,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    let current = ctx.db.get_user_profile().unwrap_or_default();
    let mut social_media = current.social_media;
    for (flag, key) in [
        ("--linkedin", "linkedin"),
        ("--x", "x"),
        ("--github", "github"),
        ("--website", "personal website"),
    ] {
        if let Some(value) = parsed.flag(flag) {
            social_media.insert(key.to_string(), value.to_string());
        }
    }
    let profile = UserProfile {
        name: pick(parsed, "--name", current.name),
        title: pick(parsed, "--title", current.title),
        degree: pick(parsed, "--degree", current.degree),
        university: pick(parsed, "--university", current.university),
        profession: pick(parsed, "--profession", current.profession),
        social_media,
        signature: pick(parsed, "--signature", current.signature),
    };
    ctx.db.update_user_profile(&profile)?;
    writeln!(out, "Profile updated successfully")?;
    Ok(())
}

fn pick(parsed: &ParsedArgs, flag: &str, current: String) -> String {
    parsed.flag(flag).map(str::to_string).unwrap_or(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use send_emails_module::OutgoingEmail;
    use std::cell::Cell;
    use tempfile::TempDir;

    struct CountingMailer {
        calls: Cell<usize>,
        succeed: bool,
    }

    impl Mailer for CountingMailer {
        fn send(&self, _email: &OutgoingEmail) -> bool {
            self.calls.set(self.calls.get() + 1);
            self.succeed
        }
    }

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|value| value.to_string()).collect()
    }

    fn now() -> NaiveDateTime {
        parse_datetime("2026-10-18T09:00").unwrap()
    }

    fn run_with(
        db: &mut DatabaseManager,
        mailer: &CountingMailer,
        raw: &[&str],
    ) -> (Result<(), CliError>, String) {
        let config = AppConfig {
            db_path: db.store().path().to_path_buf(),
            reminder_days: 3,
        };
        let mut ctx = Context {
            db,
            mailer,
            config: &config,
            now: now(),
        };
        let mut out = Vec::new();
        let result = run(&args(raw), &mut ctx, &mut out);
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn parse_handles_equals_spaced_and_switch_flags() {
        let parsed = ParsedArgs::parse(&args(&[
            "send",
            "--to=1,2",
            "--template",
            "3",
            "--sign",
            "--body",
            "Hi\\nthere",
        ]))
        .unwrap();
        assert_eq!(parsed.positional, vec!["send".to_string()]);
        assert_eq!(parsed.flag("--to"), Some("1,2"));
        assert_eq!(parsed.flag("--template"), Some("3"));
        assert!(parsed.switch("--sign"));
        assert_eq!(parsed.flag("--body"), Some("Hi\nthere"));
    }

    #[test]
    fn value_flags_without_values_are_rejected() {
        let err = ParsedArgs::parse(&args(&["send", "--to=1", "--body", "--sign"])).unwrap_err();
        assert!(err.is_usage());
        assert!(err.to_string().contains("missing value for --body"));

        let err = ParsedArgs::parse(&args(&["send", "--body"])).unwrap_err();
        assert!(err.is_usage());

        let parsed = ParsedArgs::parse(&args(&["send", "--body=-- dashes first"])).unwrap();
        assert_eq!(parsed.flag("--body"), Some("-- dashes first"));
    }

    #[test]
    fn sign_switch_rejects_a_value() {
        let err = ParsedArgs::parse(&args(&["send", "--sign=yes"])).unwrap_err();
        assert!(err.is_usage());
        assert!(err.to_string().contains("--sign does not take a value"));
    }

    #[test]
    fn parse_ids_skips_blanks_and_rejects_garbage() {
        assert_eq!(parse_ids("1, 2,,3").unwrap(), vec![1, 2, 3]);
        assert!(parse_ids("1,a").unwrap_err().is_usage());
    }

    #[test]
    fn parse_datetime_accepts_common_forms() {
        let expected = NaiveDate::from_ymd_opt(2026, 10, 20)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        assert_eq!(parse_datetime("2026-10-20T09:30").unwrap(), expected);
        assert_eq!(parse_datetime("2026-10-20 09:30:00").unwrap(), expected);
        assert_eq!(
            parse_datetime("2026-10-20").unwrap(),
            expected.date().and_hms_opt(0, 0, 0).unwrap()
        );
        assert!(parse_datetime("next tuesday").is_err());
    }

    #[test]
    fn profile_add_requires_all_fields() {
        let temp = TempDir::new().unwrap();
        let mut db = DatabaseManager::open(temp.path().join("store.json")).unwrap();
        let mailer = CountingMailer {
            calls: Cell::new(0),
            succeed: true,
        };

        let (result, _) = run_with(&mut db, &mailer, &["profiles", "add", "--name=Ada"]);
        assert!(result.unwrap_err().is_usage());
        assert!(db.get_all_profiles().is_empty());
    }

    #[test]
    fn schedule_flow_records_without_sending() {
        let temp = TempDir::new().unwrap();
        let mut db = DatabaseManager::open(temp.path().join("store.json")).unwrap();
        let mailer = CountingMailer {
            calls: Cell::new(0),
            succeed: true,
        };

        let (result, _) = run_with(
            &mut db,
            &mailer,
            &[
                "profiles",
                "add",
                "--name=Ada",
                "--email=ada@example.com",
                "--title=Lead",
                "--profession=Engineer",
            ],
        );
        result.unwrap();
        let (result, _) = run_with(
            &mut db,
            &mailer,
            &["templates", "add", "--name=Intro", "--body=Hi {{name}}"],
        );
        result.unwrap();

        let (result, output) = run_with(
            &mut db,
            &mailer,
            &["schedule", "--to=1", "--template=1", "--at=2026-10-25T10:00"],
        );
        result.unwrap();

        assert!(output.contains("Emails scheduled for 2026-10-25 10:00"));
        assert_eq!(mailer.calls.get(), 0);
        assert_eq!(db.get_all_sent_emails().len(), 1);
        assert_eq!(db.get_all_schedules().len(), 1);
    }

    #[test]
    fn failed_send_is_reported_as_error() {
        let temp = TempDir::new().unwrap();
        let mut db = DatabaseManager::open(temp.path().join("store.json")).unwrap();
        db.add_profile(&Profile::new("Ada", "ada@example.com", "Lead", "Engineer"))
            .unwrap();
        db.add_template(&Template::new("Intro", "Hi")).unwrap();
        let mailer = CountingMailer {
            calls: Cell::new(0),
            succeed: false,
        };

        let (result, _) = run_with(&mut db, &mailer, &["send", "--to=1", "--template=1"]);

        match result {
            Err(CliError::DeliveryFailed(failed)) => {
                assert_eq!(failed, vec!["ada@example.com".to_string()])
            }
            other => panic!("expected delivery failure, got {:?}", other),
        }
        assert_eq!(mailer.calls.get(), 1);
        assert!(db.get_all_sent_emails().is_empty());
    }

    #[test]
    fn me_set_merges_with_existing_profile() {
        let temp = TempDir::new().unwrap();
        let mut db = DatabaseManager::open(temp.path().join("store.json")).unwrap();
        let mailer = CountingMailer {
            calls: Cell::new(0),
            succeed: true,
        };

        run_with(&mut db, &mailer, &["me", "set", "--name=Me", "--github=me-gh"])
            .0
            .unwrap();
        run_with(&mut db, &mailer, &["me", "set", "--signature=-- Me"])
            .0
            .unwrap();

        let profile = db.get_user_profile().unwrap();
        assert_eq!(profile.name, "Me");
        assert_eq!(profile.signature, "-- Me");
        assert_eq!(profile.social_media.get("github").map(String::as_str), Some("me-gh"));

        let (_, output) = run_with(&mut db, &mailer, &["me", "show"]);
        assert!(output.contains("github: me-gh"));
    }

    #[test]
    fn signature_value_and_sign_switch_are_distinct() {
        let temp = TempDir::new().unwrap();
        let mut db = DatabaseManager::open(temp.path().join("store.json")).unwrap();
        db.add_profile(&Profile::new("Ada", "ada@example.com", "Lead", "Engineer"))
            .unwrap();
        db.add_template(&Template::new("Intro", "Hi")).unwrap();
        let mailer = CountingMailer {
            calls: Cell::new(0),
            succeed: true,
        };

        let (result, _) = run_with(&mut db, &mailer, &["me", "set", "--signature", "-- Me"]);
        assert!(result.unwrap_err().is_usage());
        assert!(db.get_user_profile().is_none());

        run_with(&mut db, &mailer, &["me", "set", "--signature=-- Me"])
            .0
            .unwrap();
        run_with(
            &mut db,
            &mailer,
            &["schedule", "--to=1", "--template=1", "--at=2026-10-20", "--sign"],
        )
        .0
        .unwrap();

        let emails = db.get_all_sent_emails();
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0].body, "Hi\n\n-- Me");
    }

    #[test]
    fn unknown_command_is_a_usage_error() {
        let temp = TempDir::new().unwrap();
        let mut db = DatabaseManager::open(temp.path().join("store.json")).unwrap();
        let mailer = CountingMailer {
            calls: Cell::new(0),
            succeed: true,
        };

        let (result, _) = run_with(&mut db, &mailer, &["chatbot"]);
        assert!(result.unwrap_err().is_usage());
    }
}
