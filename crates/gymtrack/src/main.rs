//! gymtrack - gym check-in client
//!
//! This is the main entry point for the gymtrack command-line client.
//! It wires together:
//! - Configuration loading
//! - SQLite document store and local cache
//! - Check-in engine and member services

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local, Timelike};
use clap::{Parser, Subcommand};
use gymtrack_api::{CheckInRecord, IssueType, PaymentMethod, TimeSlot, collections, from_document};
use gymtrack_config::{Settings, load_config_or_default};
use gymtrack_core::{
    AccountService, CheckInEngine, CoreEvent, FeedbackService, MembershipService, SignUpForm,
    StreakCalculator, unread_count,
};
use gymtrack_remote::{AuthProvider, DocumentStore, FieldFilter, LocalCache};
use gymtrack_store::SqliteStore;
use gymtrack_util::{
    CountryCode, DATABASE_FILENAME, DocumentId, GymId, MonotonicInstant, UserId,
    default_config_path, format_relative, format_seconds, greeting,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// gymtrack - check in, track streaks and manage your gym membership
#[derive(Parser, Debug)]
#[command(name = "gymtrack")]
#[command(about = "Gym check-in and streak tracker", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/gymtrack/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Data directory override (or set GYMTRACK_DATA_DIR env var)
    #[arg(short, long, env = "GYMTRACK_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    /// Signed-in user id (or set GYMTRACK_USER env var)
    #[arg(short, long, env = "GYMTRACK_USER")]
    user: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account
    Signup {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        /// Dialing prefix, e.g. +977 or +91
        #[arg(long, default_value = "+977")]
        country: String,
        #[arg(long)]
        phone: String,
        #[arg(long, env = "GYMTRACK_PASSWORD", hide_env_values = true)]
        password: String,
        /// Repeat the password (defaults to --password)
        #[arg(long)]
        confirm: Option<String>,
    },
    /// Sign in and print your user id
    Signin {
        #[arg(long)]
        email: String,
        #[arg(long, env = "GYMTRACK_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Change your password
    Passwd {
        #[arg(long)]
        current: String,
        #[arg(long)]
        new: String,
        #[arg(long)]
        confirm: String,
    },
    /// Set your phone number
    SetPhone {
        phone: String,
        #[arg(long, default_value = "+977")]
        country: String,
    },
    /// Change your display name
    SetName { name: String },
    /// Show the current session, stats and gym
    Status,
    /// Check in at your gym
    CheckIn,
    /// Check out and record the session
    CheckOut,
    /// Leave your gym (resets streak and total time)
    Leave {
        /// Confirm leaving
        #[arg(long)]
        yes: bool,
        /// Leave without rating the gym first
        #[arg(long)]
        skip_review: bool,
    },
    /// Show your streak
    Streak {
        /// Reset the streak to 0
        #[arg(long)]
        reset: bool,
    },
    /// List past check-ins, newest first
    History {
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
    /// List active gyms
    Gyms,
    /// Show crowd levels per time slot at your gym
    Slots,
    /// Choose your preferred time slot
    SetSlot { slot: TimeSlot },
    /// Request to join a gym
    Join {
        gym_id: String,
        /// online, offline, Quarterly or 6-Month
        #[arg(long)]
        payment: PaymentMethod,
        #[arg(long)]
        transaction_id: Option<String>,
    },
    /// Report a problem at your gym
    Report {
        #[arg(long = "issue", required = true)]
        issues: Vec<IssueType>,
        #[arg(long)]
        description: String,
    },
    /// Rate your gym
    Review {
        #[arg(long)]
        rating: u8,
        #[arg(long, default_value = "")]
        comment: String,
    },
    /// Show updates on your reports
    Notifications {
        /// Mark every update as read
        #[arg(long)]
        mark_read: bool,
        /// Mark one report's update as read
        #[arg(long, value_name = "REPORT_ID", conflicts_with = "mark_read")]
        read: Option<String>,
    },
}

/// Wired-up client state
struct App {
    settings: Settings,
    store: Arc<dyn DocumentStore>,
    cache: Arc<dyn LocalCache>,
    auth: Arc<dyn AuthProvider>,
    user_id: Option<UserId>,
}

fn country(code: &str) -> Result<CountryCode> {
    match CountryCode::find(code) {
        Some(country) => Ok(country),
        None => bail!("Unsupported country code {}", code),
    }
}

impl App {
    fn new(args: &Args) -> Result<Self> {
        let mut settings = load_config_or_default(&args.config)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?;

        if let Some(dir) = &args.data_dir {
            settings.data_dir = dir.clone();
        }

        let db_path = settings.data_dir.join(DATABASE_FILENAME);
        let store = Arc::new(
            SqliteStore::open(&db_path)
                .with_context(|| format!("Failed to open database {:?}", db_path))?,
        );
        info!(db_path = %db_path.display(), "Store initialized");

        Ok(Self {
            settings,
            store: store.clone(),
            cache: store.clone(),
            auth: store,
            user_id: args.user.clone().map(UserId::new),
        })
    }

    fn user(&self) -> Result<&UserId> {
        match &self.user_id {
            Some(user_id) => Ok(user_id),
            None => bail!("No user given; pass --user or set GYMTRACK_USER (see `gymtrack signin`)"),
        }
    }

    fn engine(&self) -> Result<CheckInEngine> {
        Ok(CheckInEngine::new(
            self.store.clone(),
            &self.settings,
            self.user()?.clone(),
        ))
    }

    fn accounts(&self) -> AccountService {
        AccountService::new(self.store.clone(), self.auth.clone())
    }

    fn membership(&self) -> MembershipService {
        MembershipService::new(
            self.store.clone(),
            self.cache.clone(),
            self.settings.slots,
            self.settings.crowd,
        )
    }

    fn feedback(&self) -> FeedbackService {
        FeedbackService::new(self.store.clone())
    }

    async fn run(&self, command: Command) -> Result<()> {
        let now = gymtrack_util::now();
        debug!(command = ?command, now = %now, "Running command");

        match command {
            Command::Signup {
                name,
                email,
                country: code,
                phone,
                password,
                confirm,
            } => {
                let form = SignUpForm {
                    name,
                    email,
                    country: country(&code)?,
                    phone,
                    confirm_password: confirm.unwrap_or_else(|| password.clone()),
                    password,
                };
                let user_id = self.accounts().sign_up(&form, now).await?;
                println!("Account created. Your user id is {}", user_id);
                Ok(())
            }
            Command::Signin { email, password } => {
                let signed_in = self.accounts().sign_in(&email, &password).await?;
                println!("Signed in as {}", signed_in.user_id);
                if signed_in.needs_phone {
                    println!("Add a phone number with `gymtrack set-phone`");
                }
                Ok(())
            }
            Command::Passwd {
                current,
                new,
                confirm,
            } => {
                self.accounts()
                    .change_password(self.user()?, &current, &new, &confirm)
                    .await?;
                println!("Password changed");
                Ok(())
            }
            Command::SetPhone { phone, country: code } => {
                let country = country(&code)?;
                self.accounts()
                    .update_phone(self.user()?, &country, &phone, now)
                    .await?;
                println!("Phone set to {}", country.full_number(&phone));
                Ok(())
            }
            Command::SetName { name } => {
                self.accounts()
                    .update_display_name(self.user()?, &name, now)
                    .await?;
                println!("Display name set to {}", name.trim());
                Ok(())
            }
            Command::Status => self.status(now).await,
            Command::CheckIn => self.toggle(now, false).await,
            Command::CheckOut => self.toggle(now, true).await,
            Command::Leave { yes, skip_review } => {
                let mut engine = self.engine()?;
                engine.load(now).await?;
                show(engine.leave_gym(yes, skip_review, now).await)
            }
            Command::Streak { reset } => self.streak(now, reset).await,
            Command::History { limit } => self.history(now, limit).await,
            Command::Gyms => {
                for (id, gym) in self.membership().list_gyms().await? {
                    println!("{}  {}  {}", id, gym.name_or_default(), gym.address);
                }
                Ok(())
            }
            Command::Slots => self.slots(now).await,
            Command::SetSlot { slot } => {
                self.membership().change_slot(self.user()?, slot, now).await?;
                println!("Time slot set to {}", slot.display_range(&self.settings.slots));
                Ok(())
            }
            Command::Join {
                gym_id,
                payment,
                transaction_id,
            } => {
                let gym_id = GymId::new(gym_id);
                self.membership()
                    .request_join(self.user()?, &gym_id, payment, transaction_id.as_deref(), now)
                    .await?;
                println!(
                    "Join request sent to {} ({}). Waiting for approval.",
                    gym_id,
                    payment.plan_name()
                );
                Ok(())
            }
            Command::Report {
                issues,
                description,
            } => {
                let id = self
                    .feedback()
                    .submit_report(self.user()?, &issues, &description, now)
                    .await?;
                println!("Report {} submitted", id);
                Ok(())
            }
            Command::Review { rating, comment } => {
                self.feedback()
                    .submit_review(self.user()?, rating, &comment, now)
                    .await?;
                println!("Thanks for your review!");
                Ok(())
            }
            Command::Notifications { mark_read, read } => {
                if let Some(report_id) = read {
                    self.feedback().mark_read(&DocumentId::new(report_id.clone())).await?;
                    println!("Marked {} as read", report_id);
                    return Ok(());
                }
                self.notifications(now, mark_read).await
            }
        }
    }

    async fn status(&self, now: DateTime<Local>) -> Result<()> {
        let mut engine = self.engine()?;
        let event = engine.load(now).await?;

        let name = engine
            .profile()
            .map(|p| p.name_or_default().to_string())
            .unwrap_or_default();
        println!("{}, {}", greeting(now.hour()), name);

        match engine.gym_id() {
            Some(_) => println!(
                "Gym: {} ({} checked in)",
                engine.gym_name(),
                engine.active_members()
            ),
            None => println!("Gym: none"),
        }

        if engine.is_checked_in() {
            println!(
                "Checked in for {} ({} slot)",
                format_seconds(engine.timer_seconds()),
                engine.current_slot(&now)
            );
        } else {
            println!("Not checked in");
        }

        let stats = engine.stats();
        println!(
            "Streak: {}  Total time: {}",
            stats.streak,
            format_seconds(stats.total_duration)
        );

        if matches!(event, CoreEvent::SessionCleared) {
            println!("{}", event.message());
        }
        Ok(())
    }

    /// Arm and confirm the check-in button in one go
    async fn toggle(&self, now: DateTime<Local>, checking_out: bool) -> Result<()> {
        let mut engine = self.engine()?;
        engine.load(now).await?;

        if engine.is_checked_in() != checking_out {
            if checking_out {
                bail!("Not checked in");
            }
            bail!("Already checked in");
        }

        let mono = MonotonicInstant::now();
        let armed = engine.press(now, mono).await;
        debug!(event = ?armed, "Confirmation armed");
        show(engine.press(now, mono).await)
    }

    async fn streak(&self, now: DateTime<Local>, reset: bool) -> Result<()> {
        let mut engine = self.engine()?;
        engine.load(now).await?;

        if reset {
            engine.reset_streak(now).await?;
            println!("Streak reset to 0");
            return Ok(());
        }

        let stats = engine.stats();
        println!(
            "{} {} streak",
            stats.streak,
            if stats.streak == 1 { "day" } else { "days" }
        );

        let dates = StreakCalculator::new(self.store.clone())
            .load_dates(self.user()?)
            .await?;
        match dates.last() {
            Some(last) => println!("Last check-in: {}", last),
            None => println!("No check-ins yet"),
        }
        Ok(())
    }

    async fn history(&self, now: DateTime<Local>, limit: usize) -> Result<()> {
        let records = load_history(self.store.as_ref(), self.user()?).await?;
        if records.is_empty() {
            println!("No check-ins yet");
            return Ok(());
        }

        for record in records.iter().take(limit) {
            println!(
                "{}  {:<8} {:>10}  {} ({})",
                record.date,
                record.time_slot.name(),
                format_seconds(record.duration),
                record.gym_name,
                format_relative(&record.check_out_time, &now)
            );
        }
        Ok(())
    }

    async fn slots(&self, now: DateTime<Local>) -> Result<()> {
        let membership = self.membership();
        let profile = membership.profile(self.user()?).await?;
        let Some(gym_id) = profile.gym_id else {
            bail!("Join a gym to see time slots");
        };

        let current = membership.slot_at(&now);
        let preferred = membership.preferred_slot(self.user()?).await?;

        for count in membership.member_counts(&gym_id).await? {
            let mut marks = Vec::new();
            if count.slot == current {
                marks.push("now");
            }
            if Some(count.slot) == preferred {
                marks.push("yours");
            }
            println!(
                "{:<26} {:>3} members  {:<6} {}",
                count.slot.display_range(membership.slot_boundaries()),
                count.members,
                count.level.label(),
                marks.join(", ")
            );
        }
        Ok(())
    }

    async fn notifications(&self, now: DateTime<Local>, mark_read: bool) -> Result<()> {
        let feedback = self.feedback();
        let user_id = self.user()?;
        let list = feedback.notifications(user_id, now).await?;
        println!("{} unread", unread_count(&list));

        for n in &list {
            println!(
                "{} {} {} ({})\n  {}",
                if n.read { " " } else { "*" },
                n.report_id,
                n.title,
                format_relative(&n.date, &now),
                n.message
            );
        }

        if mark_read {
            let updated = feedback.mark_all_read(user_id, now).await?;
            println!("Marked {} as read", updated);
        }
        Ok(())
    }
}

/// Check-in history for a user, newest first. Unreadable rows are skipped.
async fn load_history(
    store: &dyn DocumentStore,
    user_id: &UserId,
) -> gymtrack_util::Result<Vec<CheckInRecord>> {
    let rows = store
        .query(
            collections::CHECK_IN_HISTORY,
            &[FieldFilter::eq("userId", user_id.as_str())],
        )
        .await?;

    let mut records: Vec<CheckInRecord> = rows
        .into_iter()
        .filter_map(|(id, doc)| match from_document::<CheckInRecord>(doc) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(record_id = %id, error = %e, "Skipping unreadable history record");
                None
            }
        })
        .collect();
    records.sort_by(|a, b| b.check_out_time.cmp(&a.check_out_time));
    Ok(records)
}

/// Print an outcome; failures become the process error
fn show(event: CoreEvent) -> Result<()> {
    if event.is_failure() {
        bail!(event.message());
    }
    println!("{}", event.message());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "gymtrack starting");

    let app = App::new(&args)?;
    app.run(args.command).await
}
