use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "studysync")]
#[command(about = "Offline-first sync queue for the study planner")]
#[command(long_about = "studysync - Offline-first sync queue for the study planner

Mutations made while offline are queued locally and replayed against the
planner API once a connection is available. Failed attempts are retried
with exponential backoff; repeated failures open a circuit breaker that
pauses remote calls for a while.

QUICK START:
  studysync add create assignment --payload '{\"title\": \"Essay\"}'
  studysync add update assignment --id temp_... --payload '{\"title\": \"Essay v2\"}'
  studysync status            Show queue counters
  studysync run               Replay due actions now

OUTPUT FORMATS:
  --output pretty    Human-readable colored output (default)
  --output json      Machine-readable JSON for scripting

Data lives in ~/.studysync/ (override with STUDYSYNC_HOME).")]
#[command(version, propagate_version = true)]
pub struct Cli {
    /// Output format for command results
    ///
    /// Use 'pretty' for human-readable colored output (default),
    /// or 'json' for machine-readable output suitable for scripting.
    #[arg(short, long, value_enum, default_value = "pretty", global = true)]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for command results.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable colored output.
    #[default]
    Pretty,
    /// Machine-readable JSON output.
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show queue status
    ///
    /// Displays pending, in-flight and failed counts, the age of the oldest
    /// action, and the circuit breaker state.
    #[command(alias = "s")]
    Status,

    /// List queued actions
    ///
    /// Actions are shown in the order the next pass would try them.
    ///
    /// # Examples
    ///
    ///   studysync list
    ///   studysync list --status failed
    ///   studysync list -o json
    #[command(alias = "ls")]
    List {
        /// Only show actions with this status (pending, syncing, failed)
        #[arg(long, short = 's')]
        status: Option<String>,
    },

    /// Queue a mutation
    ///
    /// # Examples
    ///
    ///   studysync add create course --payload '{"title": "Physics"}' --temp-id T1
    ///   studysync add update course --id T1 --payload '{"title": "Physics II"}'
    ///   studysync add complete assignment --id A42
    ///   studysync add batch-delete lecture --payload '{"items": [{"id": "L1", "type": "lecture"}]}'
    Add {
        /// Operation (create, update, delete, restore, complete,
        /// batch-delete, batch-restore)
        operation: String,

        /// Record kind (assignment, lecture, study-session, course)
        resource: String,

        /// Target record id (update, delete, restore, complete)
        #[arg(long, short = 'i')]
        id: Option<String>,

        /// Payload as JSON: the record for create, the changed fields for
        /// update, `{"items": [...]}` for batches
        #[arg(long, short = 'p')]
        payload: Option<String>,

        /// Owner of the mutation
        #[arg(long, short = 'u', env = "STUDYSYNC_USER", default_value = "local")]
        user: String,

        /// Attempts before the action is marked failed
        #[arg(long)]
        max_retries: Option<u32>,

        /// Temp id for a created record, generated when omitted
        #[arg(long)]
        temp_id: Option<String>,
    },

    /// Replay due actions now
    ///
    /// Runs one processing pass against the configured endpoint.
    Run,

    /// Resolve a temp id to its server id
    Resolve {
        /// Temp id (or any id; unknown ids are echoed back)
        id: String,
    },

    /// Give failed actions a fresh retry budget
    Retry,

    /// Remove one action from the queue
    #[command(alias = "rm")]
    Remove {
        /// Action id
        id: String,
    },

    /// Clear actions from the queue
    ///
    /// Without flags only failed actions are removed.
    Clear {
        /// Remove every action, including pending ones
        #[arg(long)]
        all: bool,

        /// Required with --all
        #[arg(long, short = 'f')]
        force: bool,
    },

    /// Show or change sync settings
    ///
    /// # Examples
    ///
    ///   studysync settings
    ///   studysync settings --retry-delay 2000 --max-size 200
    ///   studysync settings --auto-sync false
    Settings {
        /// Base retry delay in milliseconds
        #[arg(long)]
        retry_delay: Option<u64>,

        /// Queue capacity
        #[arg(long)]
        max_size: Option<usize>,

        /// Sync automatically when connectivity returns
        #[arg(long)]
        auto_sync: Option<bool>,

        /// Days before queued actions become eviction candidates
        #[arg(long)]
        retention_days: Option<u32>,
    },
}
