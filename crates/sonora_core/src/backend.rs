//! Native Engine Contract
//!
//! Defines the interface the binding expects from the native audio engine.
//! The engine owns device discovery, stream negotiation and real-time buffer
//! scheduling; the binding only builds parameter snapshots and forwards calls.
//!
//! Enumeration follows the engine's native conventions: counts are `i32` and a
//! negative count is an error code, so callers decide how to report it.

use std::any::Any;
use std::fmt;
use std::ops::BitOr;
use std::sync::Arc;

use crate::device::{DeviceIndex, DeviceRecord, HostApiIndex};
use crate::error::{ErrorCode, Status};
use crate::format::{Sample, SampleFormat};
use crate::host_api::HostApiRecord;

/// Opaque host-API-specific stream settings, passed through unexamined
pub type HostApiStreamInfo = Arc<dyn Any + Send + Sync>;

/// Immutable parameter snapshot for one direction of a stream
#[derive(Clone)]
pub struct StreamParameters {
    pub device: DeviceIndex,
    pub channel_count: i32,
    pub sample_format: SampleFormat,
    /// Suggested latency in seconds
    pub suggested_latency: f64,
    pub host_api_specific_stream_info: Option<HostApiStreamInfo>,
}

impl fmt::Debug for StreamParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamParameters")
            .field("device", &self.device)
            .field("channel_count", &self.channel_count)
            .field("sample_format", &self.sample_format)
            .field("suggested_latency", &self.suggested_latency)
            .field(
                "host_api_specific_stream_info",
                &self.host_api_specific_stream_info.is_some(),
            )
            .finish()
    }
}

impl StreamParameters {
    /// Bytes in one interleaved frame, `None` for custom formats or a
    /// non-positive channel count
    pub fn bytes_per_frame(&self) -> Option<usize> {
        let channels = usize::try_from(self.channel_count).ok().filter(|&c| c > 0)?;
        self.sample_format.sample_size()?.checked_mul(channels)
    }
}

/// Stream behaviour flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamFlags(u32);

impl StreamFlags {
    pub const NO_FLAG: Self = Self(0);
    /// Disable default clipping of out of range samples
    pub const CLIP_OFF: Self = Self(0x1);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for StreamFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Value returned from a stream callback to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackResult {
    Continue,
    Complete,
    Abort,
}

/// Output buffer handed to a stream callback
pub struct OutputBuffer<'b> {
    bytes: &'b mut [u8],
    frames: usize,
    channels: u16,
    format: SampleFormat,
}

impl<'b> OutputBuffer<'b> {
    pub fn new(bytes: &'b mut [u8], frames: usize, channels: u16, format: SampleFormat) -> Self {
        Self {
            bytes,
            frames,
            channels,
            format,
        }
    }

    /// Number of frames the engine is requesting
    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn format(&self) -> SampleFormat {
        self.format
    }

    /// Raw buffer memory in the stream's sample format
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut *self.bytes
    }

    /// Typed view over an interleaved buffer.
    ///
    /// Returns `None` when `T` does not match the stream format, the stream is
    /// non-interleaved, or the memory is not aligned for `T`.
    pub fn samples_mut<T: Sample>(&mut self) -> Option<&mut [T]> {
        if T::FORMAT != self.format.base() || !self.format.is_interleaved() {
            return None;
        }
        bytemuck::try_cast_slice_mut(&mut *self.bytes).ok()
    }

    pub fn fill_silence(&mut self) {
        let silence = self.format.silence_byte();
        self.bytes.fill(silence);
    }
}

/// Stream callback invoked by the engine on its own (real-time) thread
pub type StreamCallback = Box<dyn FnMut(OutputBuffer<'_>) -> CallbackResult + Send + 'static>;

/// An open native stream
pub trait BackendStream {
    fn start(&mut self) -> Status;

    /// Stop after queued audio has been played
    fn stop(&mut self) -> Status;

    /// Stop immediately, discarding queued audio
    fn abort(&mut self) -> Status;

    /// Blocking write of `frames` frames taken from `buffer`.
    ///
    /// Only valid on streams opened without a callback.
    fn write(&mut self, buffer: &[u8], frames: usize) -> Status;

    fn is_active(&self) -> bool;
}

/// The native audio engine.
///
/// `initialize` and `terminate` take `&mut self`: enumeration data is
/// captured by `initialize` and handed out by reference afterwards, so it can
/// only be refreshed while nothing borrows it.
pub trait AudioBackend {
    /// Get the name of this backend (e.g., "cpal", "Mock")
    fn name(&self) -> &'static str;

    fn initialize(&mut self) -> Status;

    fn terminate(&mut self) -> Status;

    /// Number of host APIs, or a negative error code
    fn host_api_count(&self) -> i32;

    /// Number of devices across all host APIs, or a negative error code
    fn device_count(&self) -> i32;

    fn default_output_device(&self) -> DeviceIndex;

    fn default_input_device(&self) -> DeviceIndex;

    fn device_info(&self, index: DeviceIndex) -> Option<&DeviceRecord>;

    fn host_api_info(&self, index: HostApiIndex) -> Option<&HostApiRecord>;

    /// Open a stream. With `callback == None` the stream is in blocking-write
    /// mode; otherwise the engine pulls buffers through the callback.
    fn open_stream(
        &self,
        input: Option<&StreamParameters>,
        output: Option<&StreamParameters>,
        sample_rate: f64,
        frames_per_buffer: u32,
        flags: StreamFlags,
        callback: Option<StreamCallback>,
    ) -> Result<Box<dyn BackendStream>, ErrorCode>;

    /// Human-readable text for an error code
    fn error_text(&self, code: ErrorCode) -> String {
        code.text().to_string()
    }
}

impl<B: AudioBackend + ?Sized> AudioBackend for Box<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn initialize(&mut self) -> Status {
        (**self).initialize()
    }

    fn terminate(&mut self) -> Status {
        (**self).terminate()
    }

    fn host_api_count(&self) -> i32 {
        (**self).host_api_count()
    }

    fn device_count(&self) -> i32 {
        (**self).device_count()
    }

    fn default_output_device(&self) -> DeviceIndex {
        (**self).default_output_device()
    }

    fn default_input_device(&self) -> DeviceIndex {
        (**self).default_input_device()
    }

    fn device_info(&self, index: DeviceIndex) -> Option<&DeviceRecord> {
        (**self).device_info(index)
    }

    fn host_api_info(&self, index: HostApiIndex) -> Option<&HostApiRecord> {
        (**self).host_api_info(index)
    }

    fn open_stream(
        &self,
        input: Option<&StreamParameters>,
        output: Option<&StreamParameters>,
        sample_rate: f64,
        frames_per_buffer: u32,
        flags: StreamFlags,
        callback: Option<StreamCallback>,
    ) -> Result<Box<dyn BackendStream>, ErrorCode> {
        (**self).open_stream(input, output, sample_rate, frames_per_buffer, flags, callback)
    }

    fn error_text(&self, code: ErrorCode) -> String {
        (**self).error_text(code)
    }
}
