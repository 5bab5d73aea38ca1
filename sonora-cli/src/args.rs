//! Command line parsing

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};

pub const USAGE: &str = "\
Usage: sonora [--mock] [--host NAME] <command>

Commands:
  devices                       List every audio device
  hosts                         List every host API
  tone [options]                Play a stereo sine tone

Tone options:
  --device N                    Output device index (default: settings, then system default)
  --freq HZ                     Tone frequency (default: 440)
  --seconds S                   Duration (default: 2)
  --callback                    Use a callback stream instead of blocking writes

Global options:
  --mock                        Use the in-process engine instead of audio hardware
  --host NAME                   Only use the named host API (e.g. ALSA, JACK, WASAPI)
  -h, --help                    Show this help";

#[derive(Debug, Clone, PartialEq)]
pub struct ToneOptions {
    pub device: Option<i32>,
    pub frequency: f32,
    pub seconds: f32,
    pub callback: bool,
}

impl Default for ToneOptions {
    fn default() -> Self {
        Self {
            device: None,
            frequency: 440.0,
            seconds: 2.0,
            callback: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Devices,
    Hosts,
    Tone(ToneOptions),
    Help,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Args {
    pub mock: bool,
    pub host: Option<String>,
    pub command: Command,
}

fn value<I: Iterator<Item = String>>(args: &mut I, flag: &str) -> Result<String> {
    args.next().ok_or_else(|| anyhow!("{flag} needs a value"))
}

pub fn parse<I: IntoIterator<Item = String>>(args: I) -> Result<Args> {
    let mut args = args.into_iter();
    let mut mock = false;
    let mut host = None;
    let mut command = None;
    let mut tone = ToneOptions::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => command = Some(Command::Help),
            "--mock" => mock = true,
            "--host" => host = Some(value(&mut args, "--host")?),
            "--device" => {
                let raw = value(&mut args, "--device")?;
                let index = raw
                    .parse()
                    .with_context(|| format!("Invalid device index: {raw}"))?;
                tone.device = Some(index);
            }
            "--freq" => {
                let raw = value(&mut args, "--freq")?;
                tone.frequency = raw.parse().with_context(|| format!("Invalid frequency: {raw}"))?;
                if !tone.frequency.is_finite() || tone.frequency <= 0.0 {
                    bail!("Frequency must be positive: {raw}");
                }
            }
            "--seconds" => {
                let raw = value(&mut args, "--seconds")?;
                tone.seconds = raw.parse().with_context(|| format!("Invalid duration: {raw}"))?;
                if Duration::try_from_secs_f32(tone.seconds).is_err() {
                    bail!("Duration must be a finite, non-negative number of seconds: {raw}");
                }
            }
            "--callback" => tone.callback = true,
            "devices" | "hosts" | "tone" if command.is_none() => {
                command = Some(match arg.as_str() {
                    "devices" => Command::Devices,
                    "hosts" => Command::Hosts,
                    _ => Command::Tone(ToneOptions::default()),
                });
            }
            other => bail!("Unexpected argument: {other}\n\n{USAGE}"),
        }
    }

    let command = match command {
        Some(Command::Tone(_)) => Command::Tone(tone),
        Some(command) => command,
        None => Command::Help,
    };
    Ok(Args {
        mock,
        host,
        command,
    })
}
