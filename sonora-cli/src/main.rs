//! Sonora command line
//!
//! ```text
//! sonora [--mock] [--host NAME] devices | hosts | tone [--device N] [--freq HZ] [--seconds S] [--callback]
//! ```

mod args;
mod tone;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use sonora_core::{AudioBackend, AudioSystem, MockBackend, Settings};

use crate::args::{Command, ToneOptions, USAGE};

fn init_logging(settings: &Settings) {
    // RUST_LOG wins over the settings file
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<()> {
    let args = args::parse(std::env::args().skip(1))?;
    if args.command == Command::Help {
        println!("{USAGE}");
        return Ok(());
    }

    let settings = Settings::load();
    init_logging(&settings);
    info!("Starting Sonora");

    if args.mock {
        run(MockBackend::new(), &args.command, &settings)
    } else {
        let backend = sonora_platform::get_backend(args.host.as_deref())?;
        run(backend, &args.command, &settings)
    }
}

fn run<B: AudioBackend>(backend: B, command: &Command, settings: &Settings) -> Result<()> {
    let system = AudioSystem::initialize(backend).context("Failed to initialize audio")?;
    info!(backend = system.backend().name(), "Audio ready");

    match command {
        Command::Devices => list_devices(&system)?,
        Command::Hosts => list_host_apis(&system)?,
        Command::Tone(options) => play_tone(&system, options, settings)?,
        Command::Help => println!("{USAGE}"),
    }

    system.terminate()?;
    Ok(())
}

fn list_devices<B: AudioBackend>(system: &AudioSystem<B>) -> Result<()> {
    let default_output = system.backend().default_output_device();
    let default_input = system.backend().default_input_device();

    for device in sonora_core::audio_devices(system)? {
        let mut marks = Vec::new();
        if device.index() == default_output {
            marks.push("default output");
        }
        if device.index() == default_input {
            marks.push("default input");
        }
        if !marks.is_empty() {
            println!("[{}]", marks.join(", "));
        }
        println!("{device}");
        println!("Default Sample Rate:         {}", device.default_sample_rate());
        println!();
    }
    Ok(())
}

fn list_host_apis<B: AudioBackend>(system: &AudioSystem<B>) -> Result<()> {
    for host_api in sonora_core::audio_host_apis(system)? {
        println!("{host_api}");
        println!();
    }
    Ok(())
}

fn play_tone<B: AudioBackend>(
    system: &AudioSystem<B>,
    options: &ToneOptions,
    settings: &Settings,
) -> Result<()> {
    let mut stream = system.stream()?;
    stream.apply_settings(settings);

    if let Some(index) = options.device {
        let device = stream
            .devices()
            .iter()
            .find(|device| device.index() == index)
            .copied()
            .with_context(|| format!("No device with index {index}"))?;
        stream
            .set_device(index)
            .set_latency(device.default_high_output_latency());
    }

    tone::play(&mut stream, options)
}
