//! cpal Engine
//!
//! Maps cpal's hosts and devices onto the engine model:
//!
//! | Engine      | cpal                                  |
//! |-------------|---------------------------------------|
//! | host API    | one entry of `cpal::available_hosts()`|
//! | device      | one `Device` of a host (flat index)   |
//! | latencies   | buffer-size range / default rate      |
//!
//! Enumeration is captured by `initialize` and served by reference until the
//! next `initialize` or `terminate`.

use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{BufferSize, BuildStreamError, Device, HostId, SupportedBufferSize, SupportedStreamConfig};
use parking_lot::Mutex;
use rtrb::RingBuffer;
use tracing::{debug, error, info, warn};

use sonora_core::{
    AudioBackend, BackendStream, DeviceIndex, DeviceRecord, ErrorCode, HostApiIndex, HostApiRecord,
    HostApiTypeId, SampleFormat, Status, StreamCallback, StreamFlags, StreamParameters, NO_DEVICE,
};

use crate::cpal_stream::{CallbackDispatch, CpalStream, QueueReader, StreamShared};
use crate::error::PlatformError;

/// Latencies reported when a device does not describe its buffer sizes
const DEFAULT_LOW_LATENCY: f64 = 0.01;
const DEFAULT_HIGH_LATENCY: f64 = 0.1;

/// Cap on the buffer size used for the high latency; some hosts report
/// `u32::MAX` as their maximum
const HIGH_LATENCY_MAX_FRAMES: u32 = 8192;

/// Smallest blocking-write queue, in frames
const MIN_QUEUE_FRAMES: usize = 2048;

/// Longest blocking-write queue, in seconds of audio
const MAX_QUEUE_SECONDS: usize = 10;

/// Time `stop` allows on top of playing out a full queue
const DRAIN_MARGIN: Duration = Duration::from_secs(2);

struct DeviceEntry {
    device: Device,
    record: DeviceRecord,
}

/// Native engine backed by cpal
pub struct CpalBackend {
    host_filter: Option<HostId>,
    host_apis: Vec<HostApiRecord>,
    devices: Vec<DeviceEntry>,
    default_output: DeviceIndex,
    default_input: DeviceIndex,
    initialized: bool,
    host_error: Arc<Mutex<Option<String>>>,
}

impl CpalBackend {
    /// Engine over every host cpal can reach on this platform
    pub fn new() -> Self {
        Self {
            host_filter: None,
            host_apis: Vec::new(),
            devices: Vec::new(),
            default_output: NO_DEVICE,
            default_input: NO_DEVICE,
            initialized: false,
            host_error: Arc::new(Mutex::new(None)),
        }
    }

    /// Engine restricted to one host, matched case-insensitively by name
    /// (e.g. "ALSA", "JACK", "WASAPI")
    pub fn with_host(name: &str) -> Result<Self, PlatformError> {
        let id = cpal::available_hosts()
            .into_iter()
            .find(|id| id.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| PlatformError::HostNotFound(name.to_string()))?;

        cpal::host_from_id(id).map_err(|e| PlatformError::HostUnavailable {
            name: id.name().to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            host_filter: Some(id),
            ..Self::new()
        })
    }

    /// Names of the hosts available on this platform
    pub fn available_hosts() -> Vec<&'static str> {
        cpal::available_hosts().into_iter().map(|id| id.name()).collect()
    }

    fn entry(&self, index: DeviceIndex) -> Option<&DeviceEntry> {
        usize::try_from(index).ok().and_then(|i| self.devices.get(i))
    }

    fn clear(&mut self) {
        self.host_apis.clear();
        self.devices.clear();
        self.default_output = NO_DEVICE;
        self.default_input = NO_DEVICE;
    }

    fn enumerate_host(&mut self, id: HostId) {
        let host = match cpal::host_from_id(id) {
            Ok(host) => host,
            Err(e) => {
                warn!("Host {} unavailable: {}", id.name(), e);
                return;
            }
        };
        let devices = match host.devices() {
            Ok(devices) => devices,
            Err(e) => {
                warn!("Failed to enumerate {} devices: {}", id.name(), e);
                return;
            }
        };

        let host_index = self.host_apis.len() as HostApiIndex;
        let default_output_name = host.default_output_device().and_then(|d| d.name().ok());
        let default_input_name = host.default_input_device().and_then(|d| d.name().ok());

        let mut record = HostApiRecord {
            struct_version: 1,
            type_id: host_api_type_id(id.name()),
            name: id.name().to_string(),
            device_count: 0,
            default_input_device: NO_DEVICE,
            default_output_device: NO_DEVICE,
        };

        for device in devices {
            let info = describe_device(&device, host_index);
            let index = self.devices.len() as DeviceIndex;

            if record.default_output_device == NO_DEVICE
                && info.max_output_channels > 0
                && default_output_name.as_deref() == Some(info.name.as_str())
            {
                record.default_output_device = index;
            }
            if record.default_input_device == NO_DEVICE
                && info.max_input_channels > 0
                && default_input_name.as_deref() == Some(info.name.as_str())
            {
                record.default_input_device = index;
            }

            debug!(index, host = id.name(), "Found device: {}", info.name);
            record.device_count += 1;
            self.devices.push(DeviceEntry {
                device,
                record: info,
            });
        }

        self.host_apis.push(record);
    }

    /// Default devices come from cpal's default host when it was enumerated,
    /// otherwise from the first host that has one.
    fn resolve_defaults(&mut self) {
        let preferred = cpal::default_host().id().name();
        let mut ordered: Vec<&HostApiRecord> = self.host_apis.iter().collect();
        ordered.sort_by_key(|api| api.name != preferred);

        self.default_output = ordered
            .iter()
            .map(|api| api.default_output_device)
            .find(|&index| index != NO_DEVICE)
            .unwrap_or(NO_DEVICE);
        self.default_input = ordered
            .iter()
            .map(|api| api.default_input_device)
            .find(|&index| index != NO_DEVICE)
            .unwrap_or(NO_DEVICE);
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for CpalBackend {
    fn name(&self) -> &'static str {
        "cpal"
    }

    fn initialize(&mut self) -> Status {
        self.clear();

        let hosts = match self.host_filter {
            Some(id) => vec![id],
            None => cpal::available_hosts(),
        };
        for id in hosts {
            self.enumerate_host(id);
        }
        self.resolve_defaults();
        self.initialized = true;

        info!(
            host_apis = self.host_apis.len(),
            devices = self.devices.len(),
            default_output = self.default_output,
            "cpal engine initialized"
        );
        Ok(())
    }

    fn terminate(&mut self) -> Status {
        if !self.initialized {
            return Err(ErrorCode::NotInitialized);
        }
        self.clear();
        self.initialized = false;
        Ok(())
    }

    fn host_api_count(&self) -> i32 {
        if !self.initialized {
            return ErrorCode::NotInitialized.code();
        }
        self.host_apis.len() as i32
    }

    fn device_count(&self) -> i32 {
        if !self.initialized {
            return ErrorCode::NotInitialized.code();
        }
        self.devices.len() as i32
    }

    fn default_output_device(&self) -> DeviceIndex {
        self.default_output
    }

    fn default_input_device(&self) -> DeviceIndex {
        self.default_input
    }

    fn device_info(&self, index: DeviceIndex) -> Option<&DeviceRecord> {
        self.entry(index).map(|entry| &entry.record)
    }

    fn host_api_info(&self, index: HostApiIndex) -> Option<&HostApiRecord> {
        usize::try_from(index).ok().and_then(|i| self.host_apis.get(i))
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
        if !self.initialized {
            return Err(ErrorCode::NotInitialized);
        }
        if input.is_some() {
            return Err(ErrorCode::BadIoDeviceCombination);
        }
        let output = output.ok_or(ErrorCode::InvalidDevice)?;
        let entry = self.entry(output.device).ok_or(ErrorCode::InvalidDevice)?;

        if output.channel_count <= 0 || output.channel_count > entry.record.max_output_channels {
            return Err(ErrorCode::InvalidChannelCount);
        }
        if !(sample_rate > 0.0 && sample_rate <= f64::from(u32::MAX)) {
            return Err(ErrorCode::InvalidSampleRate);
        }
        let format = cpal_sample_format(output.sample_format)?;
        let channels = output.channel_count as u16;
        let rate = sample_rate.round() as u32;
        let supported_buffer = check_output_support(&entry.device, channels, rate, format)?;

        let bytes_per_frame = output
            .bytes_per_frame()
            .ok_or(ErrorCode::SampleFormatNotSupported)?;

        if output.host_api_specific_stream_info.is_some() {
            debug!("Ignoring host API specific stream info");
        }
        debug!(?flags, "Stream flags");

        let config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(rate),
            buffer_size: host_buffer_size(frames_per_buffer, &supported_buffer),
        };

        let shared = Arc::new(StreamShared::default());
        let err_shared = Arc::clone(&shared);
        let err_host_error = Arc::clone(&self.host_error);
        let err_fn = move |err: cpal::StreamError| {
            error!("Audio output error: {}", err);
            *err_host_error.lock() = Some(err.to_string());
            err_shared.mark_failed();
        };

        let callback_mode = callback.is_some();
        let (stream, producer) = match callback {
            Some(callback) => {
                let mut dispatch = CallbackDispatch::new(
                    callback,
                    channels,
                    output.sample_format,
                    Arc::clone(&shared),
                );
                let stream = entry
                    .device
                    .build_output_stream_raw(
                        &config,
                        format,
                        move |data: &mut cpal::Data, _: &cpal::OutputCallbackInfo| {
                            let samples = data.len();
                            dispatch.fill(data.bytes_mut(), samples);
                        },
                        err_fn,
                        None,
                    )
                    .map_err(|e| self.build_failure(&e))?;
                (stream, None)
            }
            None => {
                let capacity = queue_capacity(
                    output.suggested_latency,
                    rate,
                    frames_per_buffer,
                    bytes_per_frame,
                )?;
                let (producer, consumer) = RingBuffer::new(capacity);
                let mut reader = QueueReader::new(
                    consumer,
                    bytes_per_frame,
                    output.sample_format.silence_byte(),
                    Arc::clone(&shared),
                );
                let stream = entry
                    .device
                    .build_output_stream_raw(
                        &config,
                        format,
                        move |data: &mut cpal::Data, _: &cpal::OutputCallbackInfo| {
                            reader.fill(data.bytes_mut());
                        },
                        err_fn,
                        None,
                    )
                    .map_err(|e| self.build_failure(&e))?;
                (stream, Some((producer, capacity)))
            }
        };

        info!(
            device = %entry.record.name,
            channels,
            sample_rate = rate,
            frames_per_buffer,
            callback_mode,
            "cpal stream opened"
        );

        let queued_bytes = producer.as_ref().map_or(0, |(_, capacity)| *capacity);
        Ok(Box::new(CpalStream::new(
            stream,
            shared,
            producer,
            bytes_per_frame,
            drain_timeout(queued_bytes, bytes_per_frame, rate),
            Arc::clone(&self.host_error),
        )))
    }

    fn error_text(&self, code: ErrorCode) -> String {
        match (code, self.host_error.lock().as_deref()) {
            (ErrorCode::UnanticipatedHostError, Some(message)) => {
                format!("{}: {}", code.text(), message)
            }
            _ => code.text().to_string(),
        }
    }
}

impl CpalBackend {
    fn build_failure(&self, err: &BuildStreamError) -> ErrorCode {
        warn!("Failed to build output stream: {}", err);
        *self.host_error.lock() = Some(err.to_string());
        build_error_code(err)
    }
}

/// Capability record for one cpal device
fn describe_device(device: &Device, host_api: HostApiIndex) -> DeviceRecord {
    let name = device.name().unwrap_or_else(|_| "Unknown".to_string());

    let max_output_channels = device
        .supported_output_configs()
        .map(|configs| configs.map(|c| i32::from(c.channels())).max().unwrap_or(0))
        .unwrap_or(0);
    let max_input_channels = device
        .supported_input_configs()
        .map(|configs| configs.map(|c| i32::from(c.channels())).max().unwrap_or(0))
        .unwrap_or(0);

    let output = device.default_output_config().ok();
    let input = device.default_input_config().ok();

    let (low_out, high_out) = output.as_ref().map(config_latencies).unwrap_or((0.0, 0.0));
    let (low_in, high_in) = input.as_ref().map(config_latencies).unwrap_or((0.0, 0.0));
    let default_sample_rate = output
        .as_ref()
        .or(input.as_ref())
        .map(|c| f64::from(c.sample_rate().0))
        .unwrap_or(0.0);

    DeviceRecord {
        name,
        host_api,
        max_input_channels,
        max_output_channels,
        default_low_input_latency: low_in,
        default_low_output_latency: low_out,
        default_high_input_latency: high_in,
        default_high_output_latency: high_out,
        default_sample_rate,
    }
}

fn config_latencies(config: &SupportedStreamConfig) -> (f64, f64) {
    latencies(config.buffer_size(), config.sample_rate().0)
}

/// (low, high) latency in seconds for a buffer-size range at `sample_rate`
fn latencies(buffer_size: &SupportedBufferSize, sample_rate: u32) -> (f64, f64) {
    match buffer_size {
        SupportedBufferSize::Range { min, max } if sample_rate > 0 => {
            let rate = f64::from(sample_rate);
            let low = f64::from(*min) / rate;
            let high = f64::from((*max).min(HIGH_LATENCY_MAX_FRAMES)) / rate;
            (low, high.max(low))
        }
        _ => (DEFAULT_LOW_LATENCY, DEFAULT_HIGH_LATENCY),
    }
}

/// Blocking-write queue size in bytes: the suggested latency, but never less
/// than two buffers or `MIN_QUEUE_FRAMES` and never more than
/// `MAX_QUEUE_SECONDS` of audio
fn queue_capacity(
    suggested_latency: f64,
    sample_rate: u32,
    frames_per_buffer: u32,
    bytes_per_frame: usize,
) -> Result<usize, ErrorCode> {
    let max_frames = (sample_rate as usize)
        .saturating_mul(MAX_QUEUE_SECONDS)
        .max(MIN_QUEUE_FRAMES);
    // Float to int casts saturate, so huge latencies land on `max_frames`
    let latency_frames = (suggested_latency.max(0.0) * f64::from(sample_rate)).ceil() as usize;
    let frames = latency_frames
        .max((frames_per_buffer as usize).saturating_mul(2))
        .max(MIN_QUEUE_FRAMES)
        .min(max_frames);
    frames
        .checked_mul(bytes_per_frame)
        .ok_or(ErrorCode::InsufficientMemory)
}

/// How long `stop` waits for a queue of `capacity` bytes to play out
fn drain_timeout(capacity: usize, bytes_per_frame: usize, sample_rate: u32) -> Duration {
    let frames = capacity / bytes_per_frame.max(1);
    DRAIN_MARGIN + Duration::from_secs_f64(frames as f64 / f64::from(sample_rate.max(1)))
}

/// Host buffer size for a requested frames-per-buffer.
///
/// Sizes the device cannot honour leave the choice to the host; blocking
/// writes are queued either way and callbacks are told how many frames each
/// buffer holds.
fn host_buffer_size(frames_per_buffer: u32, supported: &SupportedBufferSize) -> BufferSize {
    match (frames_per_buffer, supported) {
        (0, _) => BufferSize::Default,
        (frames, SupportedBufferSize::Range { min, max }) if (*min..=*max).contains(&frames) => {
            BufferSize::Fixed(frames)
        }
        (frames, _) => {
            debug!(frames, "Buffer size not supported by the device, using the host default");
            BufferSize::Default
        }
    }
}

fn cpal_sample_format(format: SampleFormat) -> Result<cpal::SampleFormat, ErrorCode> {
    if !format.is_interleaved() {
        return Err(ErrorCode::SampleFormatNotSupported);
    }
    match format {
        SampleFormat::FLOAT32 => Ok(cpal::SampleFormat::F32),
        SampleFormat::INT32 => Ok(cpal::SampleFormat::I32),
        SampleFormat::INT16 => Ok(cpal::SampleFormat::I16),
        SampleFormat::INT8 => Ok(cpal::SampleFormat::I8),
        SampleFormat::UINT8 => Ok(cpal::SampleFormat::U8),
        _ => Err(ErrorCode::SampleFormatNotSupported),
    }
}

/// Reject a configuration the device cannot play, with the most specific code
fn check_output_support(
    device: &Device,
    channels: u16,
    sample_rate: u32,
    format: cpal::SampleFormat,
) -> Result<SupportedBufferSize, ErrorCode> {
    let configs: Vec<_> = device
        .supported_output_configs()
        .map_err(|_| ErrorCode::DeviceUnavailable)?
        .filter(|c| c.channels() == channels)
        .collect();
    if configs.is_empty() {
        return Err(ErrorCode::InvalidChannelCount);
    }

    let rate = cpal::SampleRate(sample_rate);
    let in_range: Vec<_> = configs
        .into_iter()
        .filter(|c| c.min_sample_rate() <= rate && rate <= c.max_sample_rate())
        .collect();
    if in_range.is_empty() {
        return Err(ErrorCode::InvalidSampleRate);
    }

    in_range
        .iter()
        .find(|c| c.sample_format() == format)
        .map(|c| c.buffer_size().clone())
        .ok_or(ErrorCode::SampleFormatNotSupported)
}

fn build_error_code(err: &BuildStreamError) -> ErrorCode {
    match err {
        BuildStreamError::DeviceNotAvailable => ErrorCode::DeviceUnavailable,
        BuildStreamError::StreamConfigNotSupported => ErrorCode::InvalidSampleRate,
        BuildStreamError::StreamIdOverflow => ErrorCode::InsufficientMemory,
        _ => ErrorCode::UnanticipatedHostError,
    }
}

/// Host API type for a cpal host name
fn host_api_type_id(name: &str) -> HostApiTypeId {
    match name {
        "ALSA" => HostApiTypeId::Alsa,
        "JACK" => HostApiTypeId::Jack,
        "WASAPI" => HostApiTypeId::Wasapi,
        "ASIO" => HostApiTypeId::Asio,
        "CoreAudio" => HostApiTypeId::CoreAudio,
        "PulseAudio" => HostApiTypeId::PulseAudio,
        _ => HostApiTypeId::InDevelopment,
    }
}
