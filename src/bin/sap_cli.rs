use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use simple_audio_player::config::{BackendKind, PlayerConfig};
use simple_audio_player::control::{compute_gains, ChannelGains};
use simple_audio_player::Player;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sap-cli", about = "Drive the simple audio player from a terminal")]
struct Cli {
    /// Player configuration JSON (defaults to assets/player_config.json)
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play a WAV file and wait for it to end
    Play {
        file: PathBuf,
        #[arg(long)]
        volume: Option<f64>,
        #[arg(long, allow_hyphen_values = true)]
        balance: Option<f64>,
        /// Direct rate (pooled) or target tempo (streaming)
        #[arg(long)]
        pitch: Option<f32>,
        /// Base tempo of the file, required for pitch on the streaming backend
        #[arg(long)]
        tempo: Option<f32>,
        #[arg(long = "loop")]
        looping: bool,
        #[arg(long, value_enum)]
        backend: Option<CliBackend>,
        /// Give up waiting after this many milliseconds
        #[arg(long, default_value_t = 30_000)]
        watch_ms: u64,
    },
    /// Print the constant-power gains for a volume/balance pair
    Gains {
        #[arg(long, default_value_t = 0.5)]
        volume: f64,
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        balance: f64,
    },
    /// Print the effective player configuration
    DumpConfig,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliBackend {
    Pooled,
    Streaming,
}

impl From<CliBackend> for BackendKind {
    fn from(backend: CliBackend) -> Self {
        match backend {
            CliBackend::Pooled => BackendKind::Pooled,
            CliBackend::Streaming => BackendKind::Streaming,
        }
    }
}

#[derive(Serialize)]
struct GainsReport {
    volume: f64,
    balance: f64,
    gains: ChannelGains,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = cli
        .config
        .map(PlayerConfig::load_from_file)
        .unwrap_or_else(PlayerConfig::load);

    match cli.command {
        Commands::Play {
            file,
            volume,
            balance,
            pitch,
            tempo,
            looping,
            backend,
            watch_ms,
        } => {
            let mut config = config;
            if let Some(backend) = backend {
                config.backend = backend.into();
            }
            let options = PlayOptions {
                volume,
                balance,
                pitch,
                tempo,
                looping,
                watch: Duration::from_millis(watch_ms),
            };
            run_play(config, &file, options)
        }
        Commands::Gains { volume, balance } => run_gains(volume, balance),
        Commands::DumpConfig => run_dump(&config),
    }
}

struct PlayOptions {
    volume: Option<f64>,
    balance: Option<f64>,
    pitch: Option<f32>,
    tempo: Option<f32>,
    looping: bool,
    watch: Duration,
}

fn run_play(config: PlayerConfig, file: &Path, options: PlayOptions) -> Result<ExitCode> {
    let player = Player::new(config).context("opening audio backend")?;
    tracing::info!("Using {} backend", player.backend_name());

    let mut ended = player.subscribe();
    let loaded = match options.tempo {
        Some(tempo) => player.load_with_tempo(file, tempo),
        None => player.try_load(file).map(|_| true)?,
    };
    if !loaded {
        anyhow::bail!("failed to load {}", file.display());
    }

    if let Some(volume) = options.volume {
        player.set_volume(volume);
    }
    if let Some(balance) = options.balance {
        player.set_balance(balance);
    }
    if let Some(pitch) = options.pitch {
        player
            .change_pitch(pitch)
            .with_context(|| format!("applying pitch {}", pitch))?;
    }
    player.set_looping(options.looping);
    player.play();

    if let Some(duration) = player.duration() {
        tracing::info!("Playing {} ({:.2}s)", file.display(), duration.as_secs_f64());
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("building runtime")?;
    let outcome = runtime.block_on(async {
        tokio::time::timeout(options.watch, async {
            loop {
                match ended.recv().await {
                    Ok(event) => return Some(event),
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => return None,
                }
            }
        })
        .await
    });

    let code = match outcome {
        Ok(Some(event)) => {
            println!("{}", serde_json::to_string(&event)?);
            ExitCode::from(0)
        }
        Ok(None) => ExitCode::from(1),
        Err(_) => {
            tracing::info!("Watch window elapsed; stopping");
            player.stop();
            if let Ok(event) = ended.try_recv() {
                println!("{}", serde_json::to_string(&event)?);
            }
            ExitCode::from(if options.looping { 0 } else { 2 })
        }
    };

    player.dispose();
    Ok(code)
}

fn run_gains(volume: f64, balance: f64) -> Result<ExitCode> {
    let report = GainsReport {
        volume,
        balance,
        gains: compute_gains(volume, balance),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(ExitCode::from(0))
}

fn run_dump(config: &PlayerConfig) -> Result<ExitCode> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(ExitCode::from(0))
}
