//! cpal Output Streams
//!
//! # Blocking write path
//!
//! ```text
//! put ──► write ──rtrb<u8>──► cpal output callback ──► device
//!          (polls until queued)   (pads with silence on underrun)
//! ```
//!
//! Only whole frames leave the queue, so a silence pad can never shift the
//! channel order. An underrun is flagged by the callback and reported by the
//! next `write` as `OutputUnderflowed`; the data is still queued.
//!
//! # Callback path
//!
//! The engine callback receives cpal's buffer directly as an
//! [`OutputBuffer`]; nothing is queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use cpal::traits::StreamTrait;
use cpal::{PauseStreamError, PlayStreamError, Stream};
use parking_lot::Mutex;
use rtrb::{Consumer, Producer};
use tracing::{debug, warn};

use sonora_core::{BackendStream, CallbackResult, ErrorCode, OutputBuffer, StreamCallback, Status};

/// Sleep between attempts to queue more audio
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Give up on a write when the device has not taken any data for this long
const WRITE_STALL_TIMEOUT: Duration = Duration::from_secs(2);

/// Flags shared between a stream handle and its cpal callback
#[derive(Default)]
pub(crate) struct StreamShared {
    running: AtomicBool,
    /// Set once the first write has queued data
    primed: AtomicBool,
    underflowed: AtomicBool,
    /// Drop queued audio on the next callback
    discard: AtomicBool,
    /// The callback returned Complete or Abort
    finished: AtomicBool,
    /// cpal reported a stream error
    failed: AtomicBool,
}

impl StreamShared {
    pub(crate) fn mark_failed(&self) {
        self.failed.store(true, Ordering::Relaxed);
    }
}

/// Consumer side of a blocking stream, owned by the cpal callback
pub(crate) struct QueueReader {
    consumer: Consumer<u8>,
    bytes_per_frame: usize,
    silence: u8,
    shared: Arc<StreamShared>,
}

impl QueueReader {
    pub(crate) fn new(
        consumer: Consumer<u8>,
        bytes_per_frame: usize,
        silence: u8,
        shared: Arc<StreamShared>,
    ) -> Self {
        Self {
            consumer,
            bytes_per_frame,
            silence,
            shared,
        }
    }

    /// Fill `out` from the queue. Real-time safe: no allocation, no locks.
    pub(crate) fn fill(&mut self, out: &mut [u8]) {
        if self.shared.discard.swap(false, Ordering::Relaxed) {
            let queued = self.consumer.slots();
            if let Ok(chunk) = self.consumer.read_chunk(queued) {
                chunk.commit_all();
            }
        }

        let available = self.consumer.slots().min(out.len());
        let to_read = available - available % self.bytes_per_frame;

        if let Ok(chunk) = self.consumer.read_chunk(to_read) {
            let (first, second) = chunk.as_slices();
            out[..first.len()].copy_from_slice(first);
            out[first.len()..first.len() + second.len()].copy_from_slice(second);
            chunk.commit_all();
        }

        if to_read < out.len() {
            out[to_read..].fill(self.silence);
            if self.shared.primed.load(Ordering::Relaxed) {
                self.shared.underflowed.store(true, Ordering::Relaxed);
            }
        }
    }
}

/// Adapts an engine callback to cpal's raw output callback
pub(crate) struct CallbackDispatch {
    callback: StreamCallback,
    channels: u16,
    format: sonora_core::SampleFormat,
    shared: Arc<StreamShared>,
}

impl CallbackDispatch {
    pub(crate) fn new(
        callback: StreamCallback,
        channels: u16,
        format: sonora_core::SampleFormat,
        shared: Arc<StreamShared>,
    ) -> Self {
        Self {
            callback,
            channels,
            format,
            shared,
        }
    }

    pub(crate) fn fill(&mut self, out: &mut [u8], samples: usize) {
        let mut buffer = OutputBuffer::new(
            out,
            samples / usize::from(self.channels.max(1)),
            self.channels,
            self.format,
        );

        if self.shared.finished.load(Ordering::Relaxed) {
            buffer.fill_silence();
            return;
        }

        match (self.callback)(buffer) {
            CallbackResult::Continue => {}
            CallbackResult::Complete | CallbackResult::Abort => {
                self.shared.finished.store(true, Ordering::Relaxed);
            }
        }
    }
}

/// Producer side of a blocking stream
struct QueueWriter {
    producer: Producer<u8>,
    capacity: usize,
}

impl QueueWriter {
    fn queued(&self) -> usize {
        self.capacity - self.producer.slots()
    }

    /// Queue all of `data`, waiting for the callback to make room.
    fn push_blocking(&mut self, mut data: &[u8], shared: &StreamShared) -> Status {
        let mut last_progress = Instant::now();

        while !data.is_empty() {
            if shared.failed.load(Ordering::Relaxed) {
                return Err(ErrorCode::UnanticipatedHostError);
            }

            let n = self.producer.slots().min(data.len());
            if n == 0 {
                if last_progress.elapsed() > WRITE_STALL_TIMEOUT {
                    return Err(ErrorCode::TimedOut);
                }
                thread::sleep(POLL_INTERVAL);
                continue;
            }

            if let Ok(chunk) = self.producer.write_chunk_uninit(n) {
                chunk.fill_from_iter(data[..n].iter().copied());
            }
            data = &data[n..];
            last_progress = Instant::now();
        }
        Ok(())
    }
}

fn play_error_code(err: &PlayStreamError) -> ErrorCode {
    match err {
        PlayStreamError::DeviceNotAvailable => ErrorCode::DeviceUnavailable,
        _ => ErrorCode::UnanticipatedHostError,
    }
}

fn pause_error_code(err: &PauseStreamError) -> ErrorCode {
    match err {
        PauseStreamError::DeviceNotAvailable => ErrorCode::DeviceUnavailable,
        _ => ErrorCode::UnanticipatedHostError,
    }
}

/// Open cpal output stream
pub struct CpalStream {
    stream: Stream,
    shared: Arc<StreamShared>,
    /// `None` for callback streams
    writer: Option<QueueWriter>,
    bytes_per_frame: usize,
    drain_timeout: Duration,
    host_error: Arc<Mutex<Option<String>>>,
}

impl CpalStream {
    pub(crate) fn new(
        stream: Stream,
        shared: Arc<StreamShared>,
        producer: Option<(Producer<u8>, usize)>,
        bytes_per_frame: usize,
        drain_timeout: Duration,
        host_error: Arc<Mutex<Option<String>>>,
    ) -> Self {
        Self {
            stream,
            shared,
            writer: producer.map(|(producer, capacity)| QueueWriter { producer, capacity }),
            bytes_per_frame,
            drain_timeout,
            host_error,
        }
    }

    fn record_host_error(&self, message: String) {
        warn!("{}", message);
        *self.host_error.lock() = Some(message);
    }

    fn pause(&mut self) -> Status {
        self.shared.running.store(false, Ordering::Relaxed);
        self.stream.pause().map_err(|e| {
            let code = pause_error_code(&e);
            self.record_host_error(format!("Failed to pause stream: {}", e));
            code
        })
    }
}

impl BackendStream for CpalStream {
    fn start(&mut self) -> Status {
        if self.shared.running.load(Ordering::Relaxed) {
            return Err(ErrorCode::StreamIsNotStopped);
        }
        self.shared.primed.store(false, Ordering::Relaxed);
        self.shared.underflowed.store(false, Ordering::Relaxed);
        self.shared.finished.store(false, Ordering::Relaxed);

        self.stream.play().map_err(|e| {
            let code = play_error_code(&e);
            self.record_host_error(format!("Failed to start stream: {}", e));
            code
        })?;
        self.shared.running.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn stop(&mut self) -> Status {
        if !self.shared.running.load(Ordering::Relaxed) {
            return Err(ErrorCode::StreamIsStopped);
        }

        if let Some(writer) = &self.writer {
            let deadline = Instant::now() + self.drain_timeout;
            while writer.queued() >= self.bytes_per_frame
                && Instant::now() < deadline
                && !self.shared.failed.load(Ordering::Relaxed)
            {
                thread::sleep(POLL_INTERVAL);
            }
            if writer.queued() >= self.bytes_per_frame {
                debug!(queued = writer.queued(), "Stopping before the queue drained");
            }
        }

        self.pause()
    }

    fn abort(&mut self) -> Status {
        if !self.shared.running.load(Ordering::Relaxed) {
            return Err(ErrorCode::StreamIsStopped);
        }
        self.shared.discard.store(true, Ordering::Relaxed);
        self.pause()
    }

    fn write(&mut self, buffer: &[u8], frames: usize) -> Status {
        let Some(writer) = self.writer.as_mut() else {
            return Err(ErrorCode::CanNotWriteToACallbackStream);
        };
        if !self.shared.running.load(Ordering::Relaxed) {
            return Err(ErrorCode::StreamIsStopped);
        }

        let data = frames
            .checked_mul(self.bytes_per_frame)
            .and_then(|len| buffer.get(..len))
            .ok_or(ErrorCode::BadBufferPtr)?;

        let underflowed = self.shared.underflowed.swap(false, Ordering::Relaxed);
        writer.push_blocking(data, &self.shared)?;
        self.shared.primed.store(true, Ordering::Relaxed);

        if underflowed {
            Err(ErrorCode::OutputUnderflowed)
        } else {
            Ok(())
        }
    }

    fn is_active(&self) -> bool {
        self.shared.running.load(Ordering::Relaxed)
            && !self.shared.finished.load(Ordering::Relaxed)
    }
}
