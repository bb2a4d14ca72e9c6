use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use requeue::cli::args::{Cli, Commands, WorkerCommands};
use requeue::cli::commands;
use requeue::error::RequeueError;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), RequeueError> {
    let cli = Cli::parse();
    let format = cli.output;

    let output = match cli.command {
        Commands::Send(args) => commands::send(args, format)?,
        Commands::Add(args) => commands::add(args, format)?,
        Commands::List { queue } => commands::list(&queue, format)?,
        Commands::Status { queue } => commands::status(&queue, format)?,
        Commands::Sync { queue } => commands::sync(&queue, format)?,
        Commands::Watch { queue, once } => commands::watch(&queue, once, format)?,
        Commands::Worker(args) => match args.command {
            WorkerCommands::Run => commands::worker_run()?,
            WorkerCommands::Stop => commands::worker_stop(format)?,
            WorkerCommands::Status => commands::worker_status(format)?,
        },
        Commands::Completions { shell } => commands::completions(shell)?,
    };

    if !output.is_empty() {
        println!("{output}");
    }

    Ok(())
}
