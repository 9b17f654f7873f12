//! duet - two AI agents discussing a topic, live

mod config;
mod groq;
mod sinks;
mod ui;

use anyhow::Context;
use clap::{Parser, Subcommand};
use duet_stream::{BoxedSink, SettingsUpdate, StreamManager};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::groq::GroqSource;
use crate::sinks::{PacedPlayback, SinkChain, TranscriptSink};
use crate::ui::FeedPrinter;

/// duet - a live two-agent discussion stream
#[derive(Parser, Debug)]
#[command(name = "duet")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (default: ~/.config/duet/config.toml or DUET_CONFIG_PATH)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one discussion and print it as it happens
    Run(RunArgs),

    /// Show the stream settings, optionally updating them
    Settings {
        /// New default number of turns per run
        #[arg(long)]
        max_turns: Option<u32>,

        /// New pause between turns, in seconds
        #[arg(long)]
        pause: Option<f64>,

        /// Replace the topic list (repeat for several topics)
        #[arg(long = "topic")]
        topics: Vec<String>,
    },

    /// Create the config file if it does not exist
    InitConfig,
}

#[derive(clap::Args, Debug, Default)]
struct RunArgs {
    /// Number of turns (default from settings)
    #[arg(short = 'n', long)]
    turns: Option<u32>,

    /// Pause between turns in seconds, for this run only
    #[arg(long)]
    pause: Option<f64>,

    /// Transcript file (overrides the config file)
    #[arg(short, long)]
    transcript: Option<PathBuf>,

    /// Print events as JSON lines
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr so the feed on stdout stays clean
    let filter = if args.verbose {
        EnvFilter::new("duet=debug,duet_stream=debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("duet=info,duet_stream=info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config_path = args.config.as_deref();
    match args.command.unwrap_or_else(|| Command::Run(RunArgs::default())) {
        Command::Run(run_args) => run_stream(Config::load(config_path), run_args).await,
        Command::Settings {
            max_turns,
            pause,
            topics,
        } => {
            let update = SettingsUpdate {
                default_max_turns: max_turns,
                pause_between_turns: pause,
                topics: if topics.is_empty() { None } else { Some(topics) },
            };
            show_settings(config_path, update)
        }
        Command::InitConfig => {
            let path = Config::init(config_path).context("Error creating config")?;
            println!("Config file at: {}", path.display());
            println!("\nExample config:\n{}", config::example_config());
            Ok(())
        }
    }
}

async fn run_stream(config: Config, args: RunArgs) -> anyhow::Result<()> {
    let api_key = config
        .get_api_key()
        .context("No Groq API key: set GROQ_API_KEY or groq.api_key in the config file")?;
    let source = GroqSource::new(api_key, &config.groq);
    tracing::info!("Using model {}", source.model());

    let mut sinks: Vec<BoxedSink> = Vec::new();
    if let Some(path) = args.transcript.or(config.transcript.map(PathBuf::from)) {
        let transcript = TranscriptSink::create(&path)
            .await
            .with_context(|| format!("Failed to create transcript {}", path.display()))?;
        tracing::info!("Writing transcript to {}", transcript.path().display());
        sinks.push(Arc::new(transcript));
    }
    let chars_per_second = config
        .chars_per_second
        .unwrap_or(sinks::DEFAULT_CHARS_PER_SECOND);
    sinks.push(Arc::new(PacedPlayback::new(chars_per_second)));

    let manager = StreamManager::new(
        config.stream,
        Arc::new(source),
        Arc::new(SinkChain::new(sinks)),
    )?;
    if let Some(pause) = args.pause {
        manager.update_settings(SettingsUpdate {
            pause_between_turns: Some(pause),
            ..Default::default()
        })?;
    }

    let mut feed = manager.subscribe();
    let mut printer = FeedPrinter::new(args.json);
    match args.turns {
        Some(turns) => manager.start(turns)?,
        None => manager.start_default()?,
    };

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            event = feed.recv() => match event {
                Some(event) => {
                    printer.print(&event);
                    if event.is_terminal() {
                        break;
                    }
                }
                None => {
                    tracing::warn!("Feed disconnected, waiting for the run to finish");
                    manager.wait_for_idle().await;
                    break;
                }
            },
            _ = &mut ctrl_c => {
                eprintln!("Stopping...");
                match manager.stop().await {
                    Ok(_) | Err(duet_stream::Error::NotRunning) => {}
                    Err(e) => return Err(e.into()),
                }
                while let Ok(event) = feed.try_recv() {
                    printer.print(&event);
                }
                break;
            }
        }
    }

    manager.unsubscribe(feed.id());
    let state = manager.status();
    if !args.json {
        eprintln!(
            "Finished: {}/{} turns, {} recent errors",
            state.current_turn,
            state.max_turns,
            state.recent_errors.len()
        );
    }
    Ok(())
}

fn show_settings(config_path: Option<&Path>, update: SettingsUpdate) -> anyhow::Result<()> {
    let mut config = Config::load(config_path);

    if !update.is_empty() {
        let updated = config.stream.apply(update)?;
        let path = Config::config_path(config_path);
        config
            .save(&path)
            .with_context(|| format!("Failed to save config {}", path.display()))?;
        println!("Updated {} in {}", updated.join(", "), path.display());
    }

    println!("{}", serde_json::to_string_pretty(&config.stream)?);
    Ok(())
}
