use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, FixedOffset, Local};
use clap::{Args, Parser, Subcommand};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use campaign_throttle::clock::SystemClock;
use campaign_throttle::config::ThrottleConfig;
use campaign_throttle::ratelimit::{
    validate_contact_count, CounterStore, LimiterKey, LoginGuard, LOGIN_KEY,
};
use campaign_throttle::sending::{compute_rate_limit_status, project_schedule, SendProfile};
use campaign_throttle::store::{FileStore, MemoryStore};

/// Inspect campaign sending policy and advisory rate limiters.
#[derive(Debug, Parser)]
#[command(name = "campaign-throttle", version, about)]
struct Cli {
    /// Configuration file (YAML)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the sending profiles
    Profiles,
    /// Project when a queue of messages would finish
    Preview {
        /// Messages in the queue
        #[arg(long)]
        messages: u32,
        /// Apply a profile on top of the configured values
        #[arg(long)]
        profile: Option<SendProfile>,
        /// Start time (RFC 3339); defaults to now
        #[arg(long)]
        start: Option<String>,
    },
    /// Show hourly/daily quota for given sent counts
    Status {
        /// Messages sent this hour
        #[arg(long)]
        hourly: u32,
        /// Messages sent today
        #[arg(long)]
        daily: u32,
        /// Apply a profile on top of the configured values
        #[arg(long)]
        profile: Option<SendProfile>,
    },
    /// Check a contact file size against the upload cap
    ValidateContacts {
        /// Contacts in the file
        #[arg(long)]
        count: u64,
    },
    /// Record or inspect login attempts
    Login(LoginArgs),
}

#[derive(Debug, Args)]
struct LoginArgs {
    /// Record a failed attempt
    #[arg(long, conflicts_with_all = ["success", "reset"])]
    fail: bool,
    /// Record a successful attempt
    #[arg(long, conflicts_with = "reset")]
    success: bool,
    /// Clear the record
    #[arg(long)]
    reset: bool,
    /// Partition the limiter, e.g. by user
    #[arg(long)]
    scope: Option<String>,
    /// Follow the block countdown until it ends
    #[arg(long)]
    watch: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let config = match &cli.config {
        Some(path) => ThrottleConfig::load(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => ThrottleConfig::default(),
    };
    info!(version = env!("CARGO_PKG_VERSION"), "Configuration loaded");

    match cli.command {
        Command::Profiles => {
            for profile in SendProfile::ALL {
                let preset = profile.preset();
                println!(
                    "{:<13} {:>3}s  {:>3}/hour  {:>4}/day  {}",
                    profile.to_string(),
                    preset.interval_seconds,
                    preset.max_per_hour,
                    preset.max_per_day,
                    profile.description()
                );
            }
        }
        Command::Preview {
            messages,
            profile,
            start,
        } => {
            let mut sending = config.sending.clone();
            if let Some(profile) = profile {
                sending.apply_profile(profile);
            }
            sending.validate()?;

            let now = match start {
                Some(raw) => DateTime::parse_from_rfc3339(&raw)
                    .with_context(|| format!("invalid start time: {}", raw))?,
                None => local_now(),
            };
            let preview = project_schedule(messages, &sending, now);
            println!("{}", serde_json::to_string_pretty(&preview)?);
        }
        Command::Status {
            hourly,
            daily,
            profile,
        } => {
            let mut sending = config.sending.clone();
            if let Some(profile) = profile {
                sending.apply_profile(profile);
            }
            let status = compute_rate_limit_status(hourly, daily, &sending);
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Command::ValidateContacts { count } => {
            let validation = validate_contact_count(
                count,
                config.limits.upload.max_contacts_per_file,
            );
            println!("{}", serde_json::to_string_pretty(&validation)?);
        }
        Command::Login(args) => run_login(&config, args).await?,
    }

    Ok(())
}

async fn run_login(config: &ThrottleConfig, args: LoginArgs) -> anyhow::Result<()> {
    let store: Arc<dyn CounterStore> = match &config.storage.state_dir {
        Some(dir) => Arc::new(FileStore::open(dir)?),
        None => {
            warn!("No storage.state_dir configured, login state will not persist");
            Arc::new(MemoryStore::new())
        }
    };

    let key = match &args.scope {
        Some(scope) => LimiterKey::scoped(LOGIN_KEY, scope),
        None => LimiterKey::new(LOGIN_KEY),
    };
    let guard = Arc::new(LoginGuard::with_key(
        key,
        config.limits.login,
        store,
        Arc::new(SystemClock),
    ));

    let snapshot = if args.reset {
        guard.reset();
        guard.status()
    } else if args.fail || args.success {
        guard.record_attempt(args.success)
    } else {
        guard.status()
    };

    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    if snapshot.is_blocked() {
        println!("Blocked, try again in {}", snapshot.remaining_display());
    }

    if args.watch && snapshot.is_blocked() {
        let mut countdown = guard.countdown();
        loop {
            tokio::select! {
                next = countdown.changed() => match next {
                    Some(0) | None => break,
                    Some(_) => println!("{}", countdown.remaining_display()),
                },
                _ = signal::ctrl_c() => {
                    info!("Received Ctrl+C, stopping countdown");
                    break;
                }
            }
        }
        countdown.cancel();
    }

    Ok(())
}

fn local_now() -> DateTime<FixedOffset> {
    let now = Local::now();
    now.with_timezone(now.offset())
}
