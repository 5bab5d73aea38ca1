//! Stream Configuration
//!
//! [`StreamConfig`] is the pending configuration an [`AudioStream`] builds up
//! through its fluent setters. Opening a stream takes an immutable
//! [`StreamParameters`] snapshot of it, so later edits only affect the next
//! open.
//!
//! [`AudioStream`]: crate::AudioStream

use serde::{Deserialize, Serialize};

use crate::backend::{HostApiStreamInfo, StreamParameters};
use crate::device::{DeviceIndex, NO_DEVICE};
use crate::format::SampleFormat;

/// Default sample rate in Hz
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Default frames per buffer
pub const DEFAULT_FRAMES_PER_BUFFER: u32 = 65536;

/// Audio stream configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Output device index
    pub device: DeviceIndex,

    /// Number of audio channels (1 = mono, 2 = stereo)
    pub channel_count: i32,

    pub sample_format: SampleFormat,

    /// Suggested output latency in seconds
    pub suggested_latency: f64,

    /// Sample rate in Hz (e.g., 44100, 48000, 96000)
    pub sample_rate: u32,

    /// Frames per buffer, 0 lets the host choose a (possibly varying) size
    pub frames_per_buffer: u32,

    /// Backend specific settings, never persisted
    #[serde(skip)]
    pub host_api_stream_info: Option<HostApiStreamInfo>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            device: NO_DEVICE,
            channel_count: 2,
            sample_format: SampleFormat::FLOAT32,
            suggested_latency: 0.0,
            sample_rate: DEFAULT_SAMPLE_RATE,
            frames_per_buffer: DEFAULT_FRAMES_PER_BUFFER,
            host_api_stream_info: None,
        }
    }
}

impl StreamConfig {
    pub fn is_interleaved(&self) -> bool {
        self.sample_format.is_interleaved()
    }

    pub fn is_variable_frame_size(&self) -> bool {
        self.frames_per_buffer == 0
    }

    /// Snapshot of the output-direction parameters
    pub fn output_parameters(&self) -> StreamParameters {
        StreamParameters {
            device: self.device,
            channel_count: self.channel_count,
            sample_format: self.sample_format,
            suggested_latency: self.suggested_latency,
            host_api_specific_stream_info: self.host_api_stream_info.clone(),
        }
    }
}
