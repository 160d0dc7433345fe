use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use cpal::traits::{DeviceTrait, HostTrait};
use tracing_subscriber::EnvFilter;

use animatron::audio::{read_wav_file, write_stereo_wav};
use animatron::{Config, Daemon, DeviceKind, DeviceTuning, OutputDevice};

/// Animatron - conversational animatronic toy driver
#[derive(Parser)]
#[command(name = "animatron", version, about)]
struct Cli {
    /// Personality to use (e.g. "teddy")
    #[arg(short, long, env = "ANIMATRON_PERSONALITY")]
    personality: Option<String>,

    /// Path to config file (default: ~/.config/animatron/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the daemon (default)
    Run,
    /// List available audio devices
    Devices,
    /// Compose a voice WAV into device-ready stereo output (offline)
    Compose {
        /// Input mono voice WAV
        input: PathBuf,
        /// Output stereo WAV
        #[arg(short, long, default_value = "composed.wav")]
        output: PathBuf,
        /// Text the voice speaks, drives lip sync and sentiment
        #[arg(short, long, default_value = "Hello there, my friend!")]
        text: String,
        /// Target device kind
        #[arg(short, long, value_enum, default_value = "animatronic")]
        device: DeviceArg,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum DeviceArg {
    Animatronic,
    Speaker,
}

impl From<DeviceArg> for DeviceKind {
    fn from(arg: DeviceArg) -> Self {
        match arg {
            DeviceArg::Animatronic => Self::Animatronic,
            DeviceArg::Speaker => Self::Speaker,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,animatron=info",
        1 => "info,animatron=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Some(Command::Devices) => list_devices(),
        Some(Command::Compose {
            input,
            output,
            text,
            device,
        }) => compose_offline(&input, &output, &text, device.into()),
        Some(Command::Run) | None => {
            let config = Config::load(cli.config.as_ref(), cli.personality.as_deref())?;
            let daemon = Daemon::new(config)?;
            daemon.run()?;
            Ok(())
        }
    }
}

fn list_devices() -> anyhow::Result<()> {
    let host = cpal::default_host();

    println!("Input devices:");
    for device in host.input_devices()? {
        println!("  {}", device.name().unwrap_or_else(|_| "<unknown>".to_string()));
    }

    println!("Output devices:");
    for device in host.output_devices()? {
        println!("  {}", device.name().unwrap_or_else(|_| "<unknown>".to_string()));
    }

    Ok(())
}

/// Offline composition for hardware bring-up: feed the resulting WAV to
/// the toy from any audio player and watch the servos.
fn compose_offline(
    input: &PathBuf,
    output: &PathBuf,
    text: &str,
    kind: DeviceKind,
) -> anyhow::Result<()> {
    let (samples, channels, rate) = read_wav_file(input)?;
    let mono: Vec<f32> = if channels == 2 {
        samples.chunks(2).map(|c| f32::midpoint(c[0], c[1])).collect()
    } else {
        samples
    };

    let device = OutputDevice::create(kind, DeviceTuning::default());
    let composed = device.compose(&mono, rate, text)?;
    write_stereo_wav(output, &composed.samples, composed.sample_rate)?;

    tracing::info!(
        input = %input.display(),
        output = %output.display(),
        seconds = composed.duration_seconds(),
        "composition written"
    );
    Ok(())
}
