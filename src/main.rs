use clap::{Parser, Subcommand};
use cli_common::{LogLevel, init_tracing};
use leadflow::{
    AppContext, Config, LeadCandidate, Resolution, SessionEvent, ToastCenter, ToastId,
    shutdown_requested,
};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

/// Terminal front end for the lead outreach client core.
#[derive(Parser, Debug)]
#[command(name = "leadflow", version, about = "Notification watcher and lead import curator")]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, env = "LEADFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Base URL of the REST API (overrides the config file)
    #[arg(long, env = "LEADFLOW_API_URL")]
    base_url: Option<String>,

    /// Logging verbosity level
    #[arg(long, default_value = "info")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll for notifications and print them until interrupted
    Watch,
    /// Curate leads from a JSON array file, then import them
    Import {
        /// File holding a JSON array of lead objects
        file: PathBuf,

        /// Seconds before the batch is imported automatically
        #[arg(long)]
        countdown: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level);

    let mut config = match &cli.config {
        Some(path) => Config::load(path).await?,
        None => Config::default(),
    };
    if let Some(url) = cli.base_url {
        config.base_url = url;
    }

    match cli.command {
        Command::Watch => watch(config).await,
        Command::Import { file, countdown } => {
            if let Some(seconds) = countdown {
                config.countdown_seconds = seconds;
            }
            import(config, file).await
        }
    }
}

/// Print each toast once, when it first appears.
fn print_new_toasts(toasts: &ToastCenter) -> leadflow::Subscription {
    let printed: Mutex<HashSet<ToastId>> = Mutex::new(HashSet::new());
    toasts.subscribe(move |list| {
        let mut printed = printed.lock().unwrap_or_else(|e| e.into_inner());
        for toast in list.iter().rev() {
            if printed.insert(toast.id) {
                println!("[{}] {}", toast.kind, toast.message);
            }
        }
        printed.retain(|id| list.iter().any(|t| t.id == *id));
    })
}

async fn watch(config: Config) -> anyhow::Result<()> {
    let mut ctx = AppContext::new(config)?;
    let _printer = print_new_toasts(ctx.toasts());
    ctx.start_polling();
    shutdown_requested().await?;
    ctx.shutdown().await;
    Ok(())
}

async fn import(config: Config, file: PathBuf) -> anyhow::Result<()> {
    let text = tokio::fs::read_to_string(&file).await?;
    let candidates: Vec<LeadCandidate> = serde_json::from_str(&text)?;
    if candidates.is_empty() {
        println!("No candidates in {}", file.display());
        return Ok(());
    }

    let mut ctx = AppContext::new(config)?;
    let _printer = print_new_toasts(ctx.toasts());
    let confirmer = ctx.lead_confirmer();
    let mut events = confirmer.subscribe();

    for (i, lead) in candidates.iter().enumerate() {
        println!("{:>3}. {}", i + 1, lead.label());
    }
    println!(
        "Type a number to toggle it, 'y' to import the selection, 'c' to cancel. \
         With nothing selected everything is imported in {}s.",
        ctx.config().countdown_seconds
    );
    confirmer.start(candidates);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut confirming_cancel = false;
    let result = loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    debug!("stdin closed, waiting for the countdown");
                    break wait_for_resolution(&mut events).await;
                };
                let input = line.trim();
                if confirming_cancel {
                    confirming_cancel = false;
                    if matches!(input, "y" | "Y" | "yes") {
                        let resolution = confirmer.confirm_manually().await?;
                        break settle_manual(resolution, &mut events).await;
                    }
                    continue;
                }
                match input {
                    "y" | "yes" => {
                        if confirmer.snapshot().selected.is_empty() {
                            println!("Nothing selected. Cancel the whole import? [y/N]");
                            confirming_cancel = true;
                            continue;
                        }
                        let resolution = confirmer.confirm_manually().await?;
                        break settle_manual(resolution, &mut events).await;
                    }
                    "c" | "cancel" => {
                        let resolution = confirmer.cancel().then_some(Resolution::Cancelled);
                        break settle_manual(resolution, &mut events).await;
                    }
                    other => match other.parse::<usize>() {
                        Ok(n) if n >= 1 && confirmer.toggle(n - 1) => {
                            let selected = confirmer.snapshot().selected;
                            let marks: Vec<String> =
                                selected.iter().map(|i| (i + 1).to_string()).collect();
                            println!("Selected: [{}]", marks.join(", "));
                        }
                        _ => println!("Unrecognized input {other:?}"),
                    },
                }
            }
            event = events.recv() => {
                if let Some(done) = report_event(event) {
                    break done;
                }
            }
            res = shutdown_requested() => {
                res?;
                break Ok(());
            }
        }
    };
    ctx.shutdown().await;
    result
}

/// Finish after a manual confirm or cancel. `None` means the countdown got
/// there first and its commit may still be running, so wait for its outcome.
async fn settle_manual(
    resolution: Option<Resolution>,
    events: &mut tokio::sync::broadcast::Receiver<SessionEvent>,
) -> anyhow::Result<()> {
    match resolution {
        Some(Resolution::Cancelled) => {
            println!("Import cancelled");
            Ok(())
        }
        Some(_) => Ok(()),
        None => {
            debug!("session already resolved by the countdown");
            wait_for_resolution(events).await
        }
    }
}

async fn wait_for_resolution(
    events: &mut tokio::sync::broadcast::Receiver<SessionEvent>,
) -> anyhow::Result<()> {
    loop {
        if let Some(done) = report_event(events.recv().await) {
            return done;
        }
    }
}

/// Returns `Some` once the session has resolved.
fn report_event(event: Result<SessionEvent, RecvError>) -> Option<anyhow::Result<()>> {
    match event {
        Ok(SessionEvent::Tick {
            remaining_seconds, ..
        }) if remaining_seconds <= 5 || remaining_seconds % 10 == 0 => {
            println!("{remaining_seconds}s left");
            None
        }
        Ok(SessionEvent::Committed { .. }) => Some(Ok(())),
        Ok(SessionEvent::CommitFailed { error, .. }) => Some(Err(anyhow::anyhow!(error))),
        Ok(SessionEvent::Cancelled { .. }) => {
            println!("Import cancelled");
            Some(Ok(()))
        }
        Ok(_) | Err(RecvError::Lagged(_)) => None,
        Err(RecvError::Closed) => Some(Ok(())),
    }
}
