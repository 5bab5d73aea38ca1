//! Test tone playback
//!
//! Blocking mode writes generated frames with `put_samples`. Callback mode
//! runs the generator on its own thread and hands frames to the engine
//! thread through an `rtrb` queue, so the request handler never computes or
//! waits.

use std::f32::consts::TAU;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use rtrb::RingBuffer;
use tracing::{info, warn};

use sonora_core::{AudioBackend, AudioStream, SampleFormat, Stereo};

use crate::args::ToneOptions;

const AMPLITUDE: f32 = 0.2;

/// Frames per write when the stream uses a variable buffer size
const DEFAULT_CHUNK_FRAMES: usize = 512;

/// Stereo sine oscillator
pub struct SineWave {
    phase: f32,
    step: f32,
}

impl SineWave {
    pub fn new(frequency: f32, sample_rate: u32) -> Self {
        Self {
            phase: 0.0,
            step: TAU * frequency / sample_rate.max(1) as f32,
        }
    }

    pub fn next_frame(&mut self) -> Stereo<f32> {
        let sample = self.phase.sin() * AMPLITUDE;
        self.phase = (self.phase + self.step) % TAU;
        Stereo::new(sample, sample)
    }

    pub fn fill(&mut self, frames: &mut [Stereo<f32>]) {
        for frame in frames {
            *frame = self.next_frame();
        }
    }
}

/// Play the tone described by `options` on an already configured stream
pub fn play<B: AudioBackend>(stream: &mut AudioStream<'_, B>, options: &ToneOptions) -> Result<()> {
    stream
        .set_channel_count(2)
        .set_sample_format(SampleFormat::FLOAT32);

    info!(
        device = stream.device(),
        frequency = options.frequency,
        seconds = options.seconds,
        callback = options.callback,
        "Playing tone"
    );

    if options.callback {
        play_callback(stream, options)
    } else {
        play_blocking(stream, options)
    }
}

fn total_frames(options: &ToneOptions, sample_rate: u32) -> usize {
    (options.seconds * sample_rate as f32) as usize
}

fn play_blocking<B: AudioBackend>(stream: &mut AudioStream<'_, B>, options: &ToneOptions) -> Result<()> {
    let sample_rate = stream.sample_rate();
    let chunk_frames = match stream.frames_per_buffer() {
        0 => DEFAULT_CHUNK_FRAMES,
        frames => frames as usize,
    };

    let mut sine = SineWave::new(options.frequency, sample_rate);
    let mut chunk = vec![Stereo::default(); chunk_frames];
    let total = total_frames(options, sample_rate);
    let mut written = 0;
    let mut failed_writes = 0;

    stream.open().context("Failed to open blocking stream")?;

    while written < total {
        let frames = chunk_frames.min(total - written);
        sine.fill(&mut chunk[..frames]);
        // Write errors are logged by the stream; keep playing through them
        if stream.put_samples(&chunk[..frames])?.is_err() {
            failed_writes += 1;
        }
        written += frames;
    }

    stream.close().context("Failed to stop stream")?;
    info!(frames = written, failed_writes, "Tone finished");
    Ok(())
}

fn play_callback<B: AudioBackend>(stream: &mut AudioStream<'_, B>, options: &ToneOptions) -> Result<()> {
    let duration = Duration::try_from_secs_f32(options.seconds).context("Invalid tone duration")?;
    let sample_rate = stream.sample_rate();
    // 200 ms of headroom between generator and engine
    let capacity = (sample_rate as usize / 5).max(DEFAULT_CHUNK_FRAMES);
    let (mut producer, mut consumer) = RingBuffer::<Stereo<f32>>::new(capacity);

    let running = Arc::new(AtomicBool::new(true));
    let underruns = Arc::new(AtomicUsize::new(0));

    let generator = {
        let running = Arc::clone(&running);
        let mut sine = SineWave::new(options.frequency, sample_rate);
        thread::spawn(move || {
            while running.load(Ordering::Relaxed) {
                let n = producer.slots();
                if n == 0 {
                    thread::sleep(Duration::from_millis(2));
                    continue;
                }
                if let Ok(chunk) = producer.write_chunk_uninit(n) {
                    chunk.fill_from_iter(std::iter::repeat_with(|| sine.next_frame()));
                }
            }
        })
    };

    let handler_underruns = Arc::clone(&underruns);
    stream.when_request(move |mut buffer| {
        let frames = buffer
            .samples_mut::<f32>()
            .and_then(|samples| bytemuck::try_cast_slice_mut::<f32, Stereo<f32>>(samples).ok());
        match frames {
            Some(frames) => {
                let mut short = false;
                for frame in frames.iter_mut() {
                    *frame = consumer.pop().unwrap_or_else(|_| {
                        short = true;
                        Stereo::default()
                    });
                }
                if short {
                    handler_underruns.fetch_add(1, Ordering::Relaxed);
                }
            }
            None => buffer.fill_silence(),
        }
    });

    let opened = stream.open2().context("Failed to open callback stream");
    if opened.is_ok() {
        thread::sleep(duration);
    }

    running.store(false, Ordering::Relaxed);
    if generator.join().is_err() {
        warn!("Tone generator thread panicked");
    }
    opened?;

    stream.close().context("Failed to stop stream")?;
    info!(
        frames = total_frames(options, sample_rate),
        underruns = underruns.load(Ordering::Relaxed),
        "Tone finished"
    );
    Ok(())
}
