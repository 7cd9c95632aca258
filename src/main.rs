//! `ledger` command-line interface.
//!
//! Thin adapter over the library: parse arguments, open the database, call
//! one operation, print the result as JSON.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};

use ledger::alerts;
use ledger::claims::MeetingClaims;
use ledger::config::{load_config, Config};
use ledger::db::{AckOutcome, LedgerDb, NewMeeting};
use ledger::error::ProcessError;
use ledger::identity::{add_meeting_participant, resolve_owner};
use ledger::intelligence::ChatCompletionsGenerator;
use ledger::notification::build_notifier;
use ledger::processor::TranscriptProcessor;

#[derive(Debug, Parser)]
#[command(
    name = "ledger",
    about = "Extract decisions, action items and risks from meeting transcripts",
    version
)]
struct Cli {
    /// Config file. Defaults to `~/.ledger/config.json`.
    #[arg(long, global = true, value_name = "path")]
    config: Option<PathBuf>,

    /// SQLite database. Overrides `databasePath` and `LEDGER_DB`.
    #[arg(long, global = true, value_name = "path")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Manage meetings
    #[command(subcommand)]
    Meeting(MeetingCommand),

    /// Manage transcripts
    #[command(subcommand)]
    Transcript(TranscriptCommand),

    /// Run extraction for a transcript and rebuild the meeting's alerts
    Process {
        transcript_id: String,
    },

    /// List a meeting's alerts
    Alerts {
        meeting_id: String,
        /// Re-evaluate the rules (and notify) before listing
        #[arg(long)]
        refresh: bool,
    },

    /// Show productivity metrics for a meeting
    Metrics {
        meeting_id: String,
    },

    /// Update an action item
    #[command(subcommand)]
    Action(ActionCommand),

    /// Send due-date reminders for open action items
    Remind {
        /// Print the reminders without sending them
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Debug, Subcommand)]
enum MeetingCommand {
    /// Create a meeting
    Add {
        #[arg(long)]
        title: String,
        /// Owner name, resolved to an identity
        #[arg(long)]
        owner: Option<String>,
        #[arg(long)]
        platform: Option<String>,
        /// Participant email; repeat for several
        #[arg(long = "participant", value_name = "email")]
        participants: Vec<String>,
    },
    /// List meetings, newest first
    List,
}

#[derive(Debug, Subcommand)]
enum TranscriptCommand {
    /// Store (or replace) a meeting's transcript. Reads stdin when the path is `-`.
    Upload {
        meeting_id: String,
        path: PathBuf,
    },
}

#[derive(Debug, Subcommand)]
enum ActionCommand {
    /// Acknowledge an assigned action item
    Ack { id: String },
    /// Mark an action item done
    Done { id: String },
    /// Reopen a done action item
    Reopen { id: String },
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref()).context("Failed to load config")?;
    if let Some(db) = cli.db {
        config.database_path = Some(db);
    }

    let db = LedgerDb::open_configured(config.database_path.as_deref())
        .context("Failed to open database")?;

    match cli.command {
        Command::Meeting(cmd) => run_meeting(&db, cmd),
        Command::Transcript(TranscriptCommand::Upload { meeting_id, path }) => {
            let content = read_input(&path)?;
            let transcript = db.upsert_transcript(&meeting_id, &content)?;
            print_json(&transcript)
        }
        Command::Process { transcript_id } => run_process(&db, &config, &transcript_id),
        Command::Alerts {
            meeting_id,
            refresh,
        } => {
            if refresh {
                let claims = MeetingClaims::new();
                let _claim = claims.claim(&db, &meeting_id)?;
                let routed = alerts::refresh(&db, &meeting_id, Utc::now(), &config.alerts)?;
                alerts::dispatch(build_notifier(&config).as_ref(), &routed);
            }
            print_json(&db.get_meeting_alerts(&meeting_id)?)
        }
        Command::Metrics { meeting_id } => print_json(&alerts::meeting_metrics(&db, &meeting_id)?),
        Command::Action(cmd) => run_action(&db, cmd),
        Command::Remind { dry_run } => {
            if dry_run {
                let reminders = alerts::collect_due_reminders(&db, Utc::now(), &config.alerts)?;
                return print_json(&reminders);
            }
            let notifier = build_notifier(&config);
            let sent = alerts::send_due_reminders(&db, notifier.as_ref(), Utc::now(), &config.alerts)?;
            println!("{sent} reminder(s) sent");
            Ok(())
        }
    }
}

fn run_meeting(db: &LedgerDb, cmd: MeetingCommand) -> anyhow::Result<()> {
    match cmd {
        MeetingCommand::Add {
            title,
            owner,
            platform,
            participants,
        } => {
            let meeting = db.with_transaction(|tx| {
                let owner_id = resolve_owner(tx, owner.as_deref())?;
                let meeting = tx.create_meeting(&NewMeeting {
                    title: &title,
                    owner_id: owner_id.as_deref(),
                    platform: platform.as_deref(),
                    ..NewMeeting::default()
                })?;
                if let Some(ref owner_id) = owner_id {
                    tx.add_participant(&meeting.id, owner_id, Some("owner"))?;
                }
                for email in &participants {
                    add_meeting_participant(tx, &meeting.id, None, Some(email.as_str()), None)?;
                }
                Ok::<_, ledger::db::DbError>(meeting)
            })?;
            print_json(&meeting)
        }
        MeetingCommand::List => print_json(&db.list_meetings()?),
    }
}

fn run_process(db: &LedgerDb, config: &Config, transcript_id: &str) -> anyhow::Result<()> {
    let result = ChatCompletionsGenerator::from_config(&config.generation)
        .map_err(ProcessError::from)
        .and_then(|generator| {
            let notifier = build_notifier(config);
            let claims = MeetingClaims::new();
            TranscriptProcessor::new(db, &generator, notifier.as_ref(), &claims)
                .with_settings(config.alerts.clone())
                .process_by_id(transcript_id)
        });

    match result {
        Ok(summary) => print_json(&summary),
        Err(e) => {
            log::error!("Processing failed: {}", e);
            eprintln!("{}", e.recovery_suggestion());
            Err(e.into())
        }
    }
}

fn run_action(db: &LedgerDb, cmd: ActionCommand) -> anyhow::Result<()> {
    match cmd {
        ActionCommand::Ack { id } => {
            let outcome = db.acknowledge_action_item(&id, Utc::now())?;
            let label = match outcome {
                AckOutcome::Acknowledged => "acknowledged",
                AckOutcome::AlreadyAcknowledged => "already_acknowledged",
                AckOutcome::AlreadyDone => "already_done",
            };
            println!("{label}");
            Ok(())
        }
        ActionCommand::Done { id } => print_json(&db.mark_action_item_done(&id)?),
        ActionCommand::Reopen { id } => print_json(&db.reopen_action_item(&id)?),
    }
}

fn read_input(path: &Path) -> anyhow::Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
