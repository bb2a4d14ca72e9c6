use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "requeue")]
#[command(about = "An offline replay queue for side-effecting HTTP requests")]
#[command(long_about = "requeue - an offline replay queue for HTTP requests

Queues requests that failed due to connectivity loss and replays them
later, once and in order, with live per-attempt status. A background
worker owns the durable queues; every other command talks to it.

QUICK START:
  requeue worker run                          Start the worker
  requeue send post /api/todos -b '{...}'     Send now, queue if offline
  requeue status                              Show the queue backlog
  requeue sync                                Replay queued requests now
  requeue watch                               Follow replay progress live

OUTPUT FORMATS:
  --output pretty    Human-readable colored output (default)
  --output json      Machine-readable JSON for scripting

For more information on a specific command, run:
  requeue <command> --help")]
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
    /// Send a request now, queueing it if the network is down
    ///
    /// Attempts the request immediately through the worker. If the
    /// attempt fails in a retryable way (connection refused, timeout),
    /// the request is queued durably and replayed by a later cycle.
    /// Non-retryable failures are reported and nothing is queued.
    ///
    /// # Examples
    ///
    ///   requeue send post http://localhost:3001/api/todos -b '{"text":"buy milk"}'
    ///   requeue send delete 'http://localhost:3001/api/todos?ids=3'
    #[command(alias = "s")]
    Send(RequestArgs),

    /// Queue a request without attempting it
    ///
    /// Persists the request immediately and returns its generated id.
    /// Performs no network I/O; the request is replayed by the next
    /// cycle, manual or automatic.
    ///
    /// # Examples
    ///
    ///   requeue add post http://localhost:3001/api/todos -b '{"text":"walk dog"}'
    #[command(alias = "a")]
    Add(RequestArgs),

    /// List queued requests
    ///
    /// Shows the live entries of a queue in enqueue order, with each
    /// entry's id, method, target, and replay status.
    ///
    /// # Examples
    ///
    ///   requeue list
    ///   requeue list --queue todo-post-queue -o json
    #[command(alias = "ls")]
    List {
        /// Queue to inspect
        #[arg(short, long, default_value = "default")]
        queue: String,
    },

    /// Show a queue's backlog summary
    ///
    /// Displays how many requests are waiting, how many are currently
    /// being attempted, and the age of the oldest entry.
    Status {
        /// Queue to summarize
        #[arg(short, long, default_value = "default")]
        queue: String,
    },

    /// Replay queued requests now
    ///
    /// Triggers one replay cycle on the worker and waits for it to
    /// complete. Successful requests leave the queue; failed ones stay
    /// queued for the next cycle.
    ///
    /// # Examples
    ///
    ///   requeue sync
    ///   requeue sync --queue todo-post-queue
    Sync {
        /// Queue to replay
        #[arg(short, long, default_value = "default")]
        queue: String,
    },

    /// Follow a queue's replay progress live
    ///
    /// Subscribes to the worker's broadcast stream and prints each
    /// status change as it happens: requests being queued, attempts
    /// starting, successes, failures, and cycle completion.
    ///
    /// # Examples
    ///
    ///   requeue watch
    ///   requeue watch --once     Exit after the next completed cycle
    #[command(alias = "w")]
    Watch {
        /// Queue to watch
        #[arg(short, long, default_value = "default")]
        queue: String,

        /// Exit after the next completed replay cycle
        #[arg(long)]
        once: bool,
    },

    /// Manage the background worker process
    Worker(WorkerArgs),

    /// Generate shell completions
    ///
    /// # Examples
    ///
    ///   requeue completions bash > /etc/bash_completion.d/requeue
    ///   source <(requeue completions zsh)
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// A request description shared by `send` and `add`.
#[derive(Args)]
pub struct RequestArgs {
    /// HTTP method (get, post, put, patch, delete)
    pub method: String,

    /// Target URL
    pub target: String,

    /// JSON request body
    #[arg(short, long)]
    pub body: Option<String>,

    /// Queue to use
    #[arg(short, long, default_value = "default")]
    pub queue: String,
}

#[derive(Args)]
pub struct WorkerArgs {
    #[command(subcommand)]
    pub command: WorkerCommands,
}

#[derive(Subcommand)]
pub enum WorkerCommands {
    /// Run the worker in the foreground
    ///
    /// Registers every queue from the configuration, binds the control
    /// socket, and prints READY once accepting connections. Replays
    /// non-empty queues automatically on the configured interval.
    Run,

    /// Stop a running worker
    Stop,

    /// Check whether the worker is running
    Status,
}
