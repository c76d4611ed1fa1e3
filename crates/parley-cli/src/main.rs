use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::broadcast;
use tracing::{info, warn};

use parley_channels::console::ConsoleChannel;
use parley_channels::webhook::WebhookChannel;
use parley_channels::{ChannelCitationPoster, ChatChannel};
use parley_core::config::{CitationsConfig, Config};
use parley_core::ports::CitationPoster;
use parley_voice::wake::WakeWordGate;
use parley_voice::{SessionEvent, VoicePorts, VoiceSession};

mod console;
mod logging;

#[derive(Parser)]
#[command(
    name = "parley",
    about = "Turn-taking voice assistant that answers questions addressed to it and yields when talked over",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a voice session on the terminal (stdin is the microphone, stdout the speaker)
    Run {
        /// Delay between spoken words in ms
        #[arg(long, default_value_t = 250)]
        word_delay_ms: u64,

        /// Do not post citation links anywhere
        #[arg(long)]
        no_citations: bool,
    },

    /// Show whether a phrase is addressed to the bot and what question it carries
    CheckWake { text: String },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Get a specific config value (dotted path, e.g. voice.silence_ticks)
    Get { key: String },
    /// Check the configuration for errors
    Validate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(Config::config_path);
    let config = Config::load(&config_path)?;

    logging::init(&config.logging.clone().unwrap_or_default(), cli.verbose)?;

    match cli.command {
        Commands::Run {
            word_delay_ms,
            no_citations,
        } => run_session(&config, Duration::from_millis(word_delay_ms), no_citations).await?,
        Commands::CheckWake { text } => {
            let gate = WakeWordGate::new(&config.voice().wake_phrases);
            let (addressed, question) = gate.check(&text);
            let json = serde_json::json!({ "addressed": addressed, "question": question });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let json = serde_json::to_string_pretty(&config)?;
                println!("{json}");
            }
            ConfigAction::Get { key } => match config.get_path(&key) {
                Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                None => anyhow::bail!("Key not found: {key}"),
            },
            ConfigAction::Validate => {
                let (warnings, errors) = config.validate();
                for w in &warnings {
                    println!("warning: {w}");
                }
                for e in &errors {
                    println!("error: {e}");
                }
                if !errors.is_empty() {
                    anyhow::bail!("{} error(s) in {}", errors.len(), config_path.display());
                }
                println!("Config OK ({} warning(s))", warnings.len());
            }
        },
    }

    Ok(())
}

async fn run_session(config: &Config, word_delay: Duration, no_citations: bool) -> anyhow::Result<()> {
    let voice = config.voice();
    let (warnings, errors) = config.validate();
    for w in &warnings {
        warn!("{w}");
    }
    if !errors.is_empty() {
        anyhow::bail!("invalid config: {}", errors.join("; "));
    }

    let citations = if no_citations {
        None
    } else {
        citation_poster(&config.citations())
    };
    let ports = VoicePorts {
        recognizer: console::StdinRecognizer::spawn(),
        synthesizer: Arc::new(console::ConsoleSynthesizer::new(word_delay)),
        generator: parley_providers::from_config(config.generator.as_ref())?,
        citations,
    };

    let session = VoiceSession::new(&voice, ports);
    tokio::spawn(log_events(session.subscribe()));
    let handle = session.start();
    let cancel = handle.cancel.clone();

    println!(
        "Listening. Start a line with \"{}\" to ask; Ctrl-D to quit.",
        voice.wake_phrases.first().map(String::as_str).unwrap_or("okay assistant")
    );

    tokio::select! {
        r = tokio::signal::ctrl_c() => {
            r?;
            info!("Interrupted, shutting down");
            cancel.cancel();
        }
        _ = cancel.cancelled() => {}
    }
    handle.wait().await;
    Ok(())
}

fn citation_poster(config: &CitationsConfig) -> Option<Arc<dyn CitationPoster>> {
    if !config.enabled {
        return None;
    }
    let channel: Arc<dyn ChatChannel> = match WebhookChannel::from_config(config) {
        Some(webhook) => Arc::new(webhook),
        None => Arc::new(ConsoleChannel::stdout()),
    };
    info!(channel = channel.id(), "Citation links enabled");
    Some(Arc::new(ChannelCitationPoster::new(channel)))
}

async fn log_events(mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => info!(event = event.kind(), %json, "Session event"),
                Err(e) => warn!(error = %e, "Failed to encode session event"),
            },
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "Event log fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
