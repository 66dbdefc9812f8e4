//! `outreach` CLI: manage recipients, templates and outreach history.

use std::env;
use std::io;
use std::process::exit;

use chrono::Local;
use outreach_module::cli::{self, CliError, Context, USAGE};
use outreach_module::config::AppConfig;
use outreach_module::DatabaseManager;
use send_emails_module::SmtpMailer;
use tracing::error;

fn main() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() || matches!(args[0].as_str(), "-h" | "--help" | "help") {
        eprintln!("{}", USAGE);
        exit(if args.is_empty() { 1 } else { 0 });
    }

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("failed to load configuration: {}", err);
            exit(1);
        }
    };
    let mut db = match DatabaseManager::open(config.db_path.clone()) {
        Ok(db) => db,
        Err(err) => {
            error!("failed to open {}: {}", config.db_path.display(), err);
            exit(1);
        }
    };

    let mailer = SmtpMailer;
    let mut ctx = Context {
        db: &mut db,
        mailer: &mailer,
        config: &config,
        now: Local::now().naive_local(),
    };
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match cli::run(&args, &mut ctx, &mut out) {
        Ok(()) => {}
        Err(err @ CliError::Usage(_)) => {
            eprintln!("Error: {}\n\n{}", err, USAGE);
            exit(2);
        }
        Err(err) => {
            eprintln!("Error: {}", err);
            exit(1);
        }
    }
}
