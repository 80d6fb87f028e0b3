//! Chew Gate CLI
//!
//! Replays recorded measurements through the gate and manages the
//! persisted configuration.

use anyhow::{bail, Context};
use chew_gate::{
    ChewEngine, ChewState, Config, ReplaySession, SampleIntake, SignalKind, GATING_DECLARATION,
    VERSION,
};
use chrono::Local;
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chew-gate")]
#[command(version = VERSION)]
#[command(about = "Keep media playing only while you keep chewing", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay recorded measurements (JSON Lines) through the gate
    Run {
        /// Measurement file; reads stdin when omitted
        #[arg(long, short)]
        input: Option<PathBuf>,

        /// Delay between replayed frames in milliseconds
        #[arg(long, default_value = "250")]
        frame_ms: u64,

        /// Report playback as inactive whenever a reward expires
        #[arg(long)]
        playback_inactive: bool,
    },

    /// Show the persisted configuration and derived limits
    Status,

    /// Inspect or change the persisted configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },

    /// Describe what the gate observes
    Declaration,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the configuration as JSON
    Show,
    /// Chews required per window
    SetThreshold { value: u32 },
    /// Window length in seconds (1-30)
    SetWindow { secs: u64 },
    /// Reward length in seconds (5-45)
    SetReward { secs: u64 },
    /// Sensitivity for the threshold signal
    SetSensitivity { value: f64 },
    /// Signal strategy: threshold or area-ratio
    SetSignal { kind: String },
    /// Step the threshold by a signed amount
    StepThreshold {
        #[arg(allow_hyphen_values = true)]
        by: i64,
    },
    /// Step the window length by a signed number of seconds
    StepWindow {
        #[arg(allow_hyphen_values = true)]
        by: i64,
    },
    /// Restore the default threshold and window length
    Reset,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chew_gate=info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            input,
            frame_ms,
            playback_inactive,
        } => cmd_run(input, frame_ms, playback_inactive),
        Commands::Status => cmd_status(),
        Commands::Config { action } => cmd_config(action.unwrap_or(ConfigAction::Show)),
        Commands::Declaration => {
            println!("{GATING_DECLARATION}");
            Ok(())
        }
    }
}

fn cmd_run(input: Option<PathBuf>, frame_ms: u64, playback_inactive: bool) -> anyhow::Result<()> {
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: Could not load configuration, using defaults: {e}");
        Config::default()
    });

    let reader: Box<dyn BufRead + Send> = match input {
        Some(path) => Box::new(BufReader::new(
            File::open(&path).with_context(|| format!("opening {path:?}"))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };

    println!("Chew Gate v{VERSION}");
    println!();
    println!("  Rule: {}", config.summary());
    println!("  Reward: {}s", config.reward_length().as_secs());
    println!("  Signal: {:?}", config.signal());
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building async runtime")?;

    runtime.block_on(async move {
        let intake = SampleIntake::new();
        let session = ReplaySession::new(reader, intake.sink(), Duration::from_millis(frame_ms));
        let replay_running = session.running_flag();

        let engine = ChewEngine::new(config, intake, session)
            .with_playback_probe(move || async move { !playback_inactive });

        if let Err(e) = engine.start() {
            bail!("could not start the gate: {e}");
        }
        println!("Instance ID: {}", engine.instance_id());

        let running = Arc::new(AtomicBool::new(true));
        ctrlc_handler(running.clone())?;

        let mut state = engine.subscribe_state();
        let mut progress = engine.subscribe_progress();
        let mut last_whole = -1_i64;

        while running.load(Ordering::SeqCst) && replay_running.load(Ordering::SeqCst) {
            tokio::select! {
                changed = state.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let current = *state.borrow_and_update();
                    print_state(current);
                }
                changed = progress.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let seconds = *progress.borrow_and_update();
                    let whole = seconds.floor() as i64;
                    if whole != last_whole {
                        last_whole = whole;
                        println!(
                            "[{}]   {:>5.2}s  ({})",
                            Local::now().format("%H:%M:%S"),
                            seconds,
                            engine.state()
                        );
                    }
                }
                _ = tokio::time::sleep(Duration::from_millis(200)) => {}
            }
        }

        println!();
        println!("Stopping...");
        engine.stop();
        Ok::<(), anyhow::Error>(())
    })
}

fn print_state(state: ChewState) {
    let playback = if state.allows_playback() {
        "playing"
    } else {
        "suspended"
    };
    println!(
        "[{}] state: {:<8} playback: {}",
        Local::now().format("%H:%M:%S"),
        state,
        playback
    );
}

fn cmd_status() -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;

    println!("Chew Gate Status");
    println!("================");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("  Rule: {}", config.summary());
    println!(
        "  Sampling interval: {}s",
        config.sampling_interval().as_secs_f64()
    );
    println!(
        "  Threshold ceiling: {} (window / sampling interval)",
        config.threshold_ceiling()
    );
    println!("  Reward length: {}s", config.reward_length().as_secs());
    println!("  Signal: {:?}", config.signal());
    println!("  Sensitivity: {}", config.sensitivity());
    println!("  Area ratio cutoff: {}", config.area_ratio_cutoff());
    println!("  Counting: {:?}", config.count_policy());
    Ok(())
}

fn cmd_config(action: ConfigAction) -> anyhow::Result<()> {
    let mut config = Config::load().context("loading configuration")?;

    let accepted = match action {
        ConfigAction::Show => {
            println!("Config file: {:?}", Config::config_path());
            println!();
            println!("{}", serde_json::to_string_pretty(&config)?);
            return Ok(());
        }
        ConfigAction::SetThreshold { value } => config.set_threshold(value),
        ConfigAction::SetWindow { secs } => config.set_window_length(Duration::from_secs(secs)),
        ConfigAction::SetReward { secs } => config.set_reward_length(Duration::from_secs(secs)),
        ConfigAction::SetSensitivity { value } => config.set_sensitivity(value),
        ConfigAction::SetSignal { kind } => match SignalKind::parse(&kind) {
            Some(kind) => {
                config.set_signal(kind);
                true
            }
            None => bail!("unknown signal kind {kind:?} (expected threshold or area-ratio)"),
        },
        ConfigAction::StepThreshold { by } => config.increment_threshold(by),
        ConfigAction::StepWindow { by } => config.increment_window_length(by),
        ConfigAction::Reset => {
            config.reset();
            true
        }
    };

    if !accepted {
        eprintln!("Value out of range; configuration unchanged.");
        eprintln!("Current rule: {}", config.summary());
        std::process::exit(1);
    }

    config.save().context("saving configuration")?;
    println!("Saved: {}", config.summary());
    Ok(())
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("setting Ctrl+C handler")
}
