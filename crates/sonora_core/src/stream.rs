//! Audio Stream Management
//!
//! [`AudioStream`] wraps one native output stream of an [`AudioSystem`].
//!
//! # Lifecycle
//!
//! ```text
//! new ──► configure (set_*) ──► open / open2 ──► put / when_request ──► close / abort
//!                ▲                                                          │
//!                └──────────────────────── reopen ◄─────────────────────────┘
//! ```
//!
//! Configuration is a pending snapshot. Setters only record values; the
//! snapshot is handed to the engine at the next `open`/`open2`, so editing it
//! while a stream is running never touches the live stream.
//!
//! Two error policies apply:
//! - setup (`new`, `open`, `open2`, `close`) raises an [`AudioError`]
//! - steady state (`put`, `abort`) returns the native [`Status`], so a write
//!   loop can keep going through a transient underrun

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::backend::{
    AudioBackend, BackendStream, CallbackResult, HostApiStreamInfo, OutputBuffer, StreamCallback,
    StreamFlags,
};
use crate::config::StreamConfig;
use crate::device::{DeviceIndex, DeviceInfo};
use crate::error::{AudioError, AudioResult, ErrorCode, Operation, Status};
use crate::format::{Sample, SampleFormat};
use crate::host_api::HostApiInfo;
use crate::settings::Settings;
use crate::system::{enumerate_devices, enumerate_host_apis, AudioSystem};

/// Handler invoked on the engine thread whenever a callback stream needs data
pub type RequestHandler = Box<dyn FnMut(OutputBuffer<'_>) + Send + 'static>;

type HandlerSlot = Arc<Mutex<Option<RequestHandler>>>;

/// Native handle together with the configuration it was opened with
struct ActiveStream {
    handle: Box<dyn BackendStream>,
    config: StreamConfig,
}

/// Output stream bound to an initialized [`AudioSystem`]
pub struct AudioStream<'a, B: AudioBackend> {
    system: &'a AudioSystem<B>,
    devices: Vec<DeviceInfo<'a>>,
    host_apis: Vec<HostApiInfo<'a>>,
    default_output: DeviceIndex,
    default_input: DeviceIndex,
    config: StreamConfig,
    active: Option<ActiveStream>,
    is_open: bool,
    request_handler: HandlerSlot,
}

fn stream_error(operation: Operation, code: ErrorCode) -> AudioError {
    AudioError::Stream { operation, code }
}

impl<'a, B: AudioBackend> AudioStream<'a, B> {
    /// Snapshot the engine's devices and host APIs and configure for the
    /// default output device.
    ///
    /// Fails on a negative device or host API count; nothing is kept from a
    /// failed enumeration.
    pub fn new(system: &'a AudioSystem<B>) -> AudioResult<Self> {
        let backend = system.backend();
        let default_output = backend.default_output_device();
        let default_input = backend.default_input_device();

        let devices = enumerate_devices(backend)?;
        let host_apis = enumerate_host_apis(backend)?;
        info!(
            devices = devices.len(),
            host_apis = host_apis.len(),
            default_output,
            "Audio stream created"
        );

        // No default device means no latency hint
        let suggested_latency = backend
            .device_info(default_output)
            .map(|device| device.default_high_output_latency)
            .unwrap_or(0.0);

        Ok(Self {
            system,
            devices,
            host_apis,
            default_output,
            default_input,
            config: StreamConfig {
                device: default_output,
                suggested_latency,
                ..Default::default()
            },
            active: None,
            is_open: false,
            request_handler: Arc::new(Mutex::new(None)),
        })
    }

    pub fn devices(&self) -> &[DeviceInfo<'a>] {
        &self.devices
    }

    pub fn host_apis(&self) -> &[HostApiInfo<'a>] {
        &self.host_apis
    }

    pub fn default_output_device(&self) -> DeviceIndex {
        self.default_output
    }

    pub fn default_input_device(&self) -> DeviceIndex {
        self.default_input
    }

    // === Pending configuration ===

    pub fn set_device(&mut self, device: DeviceIndex) -> &mut Self {
        self.config.device = device;
        self
    }

    pub fn set_channel_count(&mut self, channel_count: i32) -> &mut Self {
        self.config.channel_count = channel_count;
        self
    }

    pub fn set_sample_format(&mut self, sample_format: SampleFormat) -> &mut Self {
        self.config.sample_format = sample_format;
        self
    }

    /// Suggested output latency in seconds
    pub fn set_latency(&mut self, latency: f64) -> &mut Self {
        self.config.suggested_latency = latency;
        self
    }

    pub fn set_sample_rate(&mut self, sample_rate: u32) -> &mut Self {
        self.config.sample_rate = sample_rate;
        self
    }

    /// 0 lets the engine pick a (possibly varying) buffer size
    pub fn set_frames_per_buffer(&mut self, frames_per_buffer: u32) -> &mut Self {
        self.config.frames_per_buffer = frames_per_buffer;
        self
    }

    pub fn set_host_api_stream_info(&mut self, info: Option<HostApiStreamInfo>) -> &mut Self {
        self.config.host_api_stream_info = info;
        self
    }

    /// Apply persisted settings. An output device name that matches no
    /// output-capable device is logged and ignored.
    pub fn apply_settings(&mut self, settings: &Settings) -> &mut Self {
        if let Some(name) = &settings.output_device {
            let found = self
                .devices
                .iter()
                .find(|device| device.name() == name.as_str() && device.max_output_channels() > 0);
            match found {
                Some(device) => {
                    self.config.device = device.index();
                    self.config.suggested_latency = device.default_high_output_latency();
                }
                None => warn!(
                    "Output device {:?} not found, keeping device {}",
                    name, self.config.device
                ),
            }
        }

        self.config.sample_rate = settings.sample_rate;
        self.config.channel_count = settings.channel_count;
        self.config.frames_per_buffer = settings.frames_per_buffer;
        if let Some(latency) = settings.latency {
            self.config.suggested_latency = latency;
        }
        self
    }

    pub fn device(&self) -> DeviceIndex {
        self.config.device
    }

    pub fn channel_count(&self) -> i32 {
        self.config.channel_count
    }

    pub fn sample_format(&self) -> SampleFormat {
        self.config.sample_format
    }

    pub fn latency(&self) -> f64 {
        self.config.suggested_latency
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    pub fn frames_per_buffer(&self) -> u32 {
        self.config.frames_per_buffer
    }

    pub fn host_api_stream_info(&self) -> Option<&HostApiStreamInfo> {
        self.config.host_api_stream_info.as_ref()
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Configuration of the live stream, if one has been opened
    pub fn active_config(&self) -> Option<&StreamConfig> {
        self.active.as_ref().map(|active| &active.config)
    }

    pub fn is_interleaved(&self) -> bool {
        self.config.is_interleaved()
    }

    pub fn is_variable_frame_size(&self) -> bool {
        self.config.is_variable_frame_size()
    }

    // === Lifecycle ===

    /// Register the handler that fills buffers for callback streams.
    ///
    /// The handler runs on the engine's audio thread and must not block. It
    /// stays registered across re-opens.
    pub fn when_request<F>(&mut self, handler: F) -> &mut Self
    where
        F: FnMut(OutputBuffer<'_>) + Send + 'static,
    {
        *self.request_handler.lock() = Some(Box::new(handler));
        self
    }

    /// Open and start a blocking-write stream; feed it with [`put`](Self::put)
    ///
    /// Reopening releases the previous native stream first. If the new one
    /// then fails to open, the open flag stays set (as after
    /// [`close`](Self::close)) but there is no stream left to write to.
    pub fn open(&mut self) -> AudioResult<()> {
        self.open_with(None)
    }

    /// Open and start a callback stream; buffers are requested through the
    /// [`when_request`](Self::when_request) handler
    pub fn open2(&mut self) -> AudioResult<()> {
        let callback = self.request_callback();
        self.open_with(Some(callback))
    }

    fn open_with(&mut self, callback: Option<StreamCallback>) -> AudioResult<()> {
        // Release the previous native stream before negotiating a new one
        if self.active.take().is_some() {
            debug!("Releasing previous stream");
        }

        let config = self.config.clone();
        let output = config.output_parameters();
        let callback_mode = callback.is_some();

        let mut handle = self
            .system
            .backend()
            .open_stream(
                None,
                Some(&output),
                f64::from(config.sample_rate),
                config.frames_per_buffer,
                StreamFlags::CLIP_OFF,
                callback,
            )
            .map_err(|code| stream_error(Operation::Opening, code))?;

        handle
            .start()
            .map_err(|code| stream_error(Operation::Starting, code))?;

        info!(
            device = config.device,
            channels = config.channel_count,
            sample_rate = config.sample_rate,
            frames_per_buffer = config.frames_per_buffer,
            callback_mode,
            "Stream started"
        );

        self.active = Some(ActiveStream { handle, config });
        self.is_open = true;
        Ok(())
    }

    fn request_callback(&self) -> StreamCallback {
        let slot = Arc::clone(&self.request_handler);
        Box::new(move |mut buffer: OutputBuffer<'_>| {
            // Never wait for the control thread on the audio thread
            match slot.try_lock() {
                Some(mut guard) => match guard.as_mut() {
                    Some(handler) => handler(buffer),
                    None => buffer.fill_silence(),
                },
                None => buffer.fill_silence(),
            }
            CallbackResult::Continue
        })
    }

    /// Stop the stream after queued audio has played.
    ///
    /// The open flag is left set; a closed stream still reports `is_open`.
    pub fn close(&mut self) -> AudioResult<()> {
        let active = self
            .active
            .as_mut()
            .ok_or_else(|| stream_error(Operation::Stopping, ErrorCode::BadStreamPtr))?;

        active
            .handle
            .stop()
            .map_err(|code| stream_error(Operation::Stopping, code))?;
        info!("Stream stopped");
        Ok(())
    }

    /// Stop immediately, discarding queued audio. Returns the native status.
    pub fn abort(&mut self) -> Status {
        match self.active.as_mut() {
            Some(active) => {
                let status = active.handle.abort();
                debug!(?status, "Stream aborted");
                status
            }
            None => Err(ErrorCode::BadStreamPtr),
        }
    }

    /// Write `frames` interleaved frames to a blocking stream.
    ///
    /// Only a stream that was never opened raises; a native write failure is
    /// logged and returned as the inner status.
    pub fn put(&mut self, buffer: &[u8], frames: usize) -> AudioResult<Status> {
        if !self.is_open {
            return Err(AudioError::StreamNotOpen);
        }
        let Some(active) = self.active.as_mut() else {
            return Err(AudioError::StreamNotOpen);
        };

        let status = active.handle.write(buffer, frames);
        if let Err(code) = status {
            warn!(
                code = code.code(),
                "Error writing to stream: {}",
                self.system.backend().error_text(code)
            );
        }
        Ok(status)
    }

    /// Typed variant of [`put`](Self::put); the frame count is derived from
    /// the live stream's channel count
    pub fn put_samples<T: Sample>(&mut self, samples: &[T]) -> AudioResult<Status> {
        let config = self.active_config().ok_or(AudioError::StreamNotOpen)?;

        if T::FORMAT != config.sample_format.base() || !config.is_interleaved() {
            return Err(AudioError::FormatMismatch {
                expected: config.sample_format,
                got: T::FORMAT,
            });
        }

        let len = samples.len() * usize::from(T::CHANNELS);
        let frames = usize::try_from(config.channel_count)
            .ok()
            .filter(|&channels| channels > 0 && len % channels == 0)
            .map(|channels| len / channels)
            .ok_or(AudioError::PartialFrame {
                len,
                channels: config.channel_count,
            })?;

        self.put(bytemuck::cast_slice(samples), frames)
    }

    /// Whether the engine reports the stream as running
    pub fn is_playing(&self) -> bool {
        self.active
            .as_ref()
            .map_or(false, |active| active.handle.is_active())
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::device::NO_DEVICE;
    use crate::format::Stereo;
    use crate::mock::{MockBackend, MockCall, MockHandle};

    fn system() -> (AudioSystem<MockBackend>, MockHandle) {
        let backend = MockBackend::new();
        let handle = backend.handle();
        (AudioSystem::initialize(backend).unwrap(), handle)
    }

    fn as_f32(bytes: &[u8]) -> Vec<f32> {
        bytemuck::pod_collect_to_vec(bytes)
    }

    #[test]
    fn test_collections_match_counts() {
        let (system, _) = system();
        let stream = AudioStream::new(&system).unwrap();

        assert_eq!(stream.devices().len(), 2);
        assert_eq!(stream.host_apis().len(), 1);
        for (i, device) in stream.devices().iter().enumerate() {
            assert_eq!(device.index(), i as i32);
        }
        assert_eq!(stream.host_apis()[0].index(), 0);
        assert_eq!(stream.default_output_device(), 0);
        assert_eq!(stream.default_input_device(), 1);
    }

    #[test]
    fn test_negative_device_count_fails_construction() {
        let system = AudioSystem::initialize(MockBackend::new().with_device_count(-10000)).unwrap();
        let err = AudioStream::new(&system).err().unwrap();
        assert_eq!(err.to_string(), "Bad device count: -10000 devices reported");
    }

    #[test]
    fn test_negative_host_api_count_fails_construction() {
        let system = AudioSystem::initialize(MockBackend::new().with_host_api_count(-9999)).unwrap();
        let err = AudioStream::new(&system).err().unwrap();
        assert!(matches!(err, AudioError::BadHostApiCount(-9999)));
    }

    #[test]
    fn test_defaults() {
        let (system, _) = system();
        let stream = system.stream().unwrap();

        assert_eq!(stream.device(), 0);
        assert_eq!(stream.channel_count(), 2);
        assert_eq!(stream.sample_format(), SampleFormat::FLOAT32);
        assert_eq!(stream.latency(), 0.1); // high output latency of the default device
        assert_eq!(stream.sample_rate(), 44100);
        assert_eq!(stream.frames_per_buffer(), 65536);
        assert!(stream.host_api_stream_info().is_none());
        assert!(!stream.is_open());
        assert!(!stream.is_playing());
    }

    #[test]
    fn test_defaults_without_output_device() {
        let backend = MockBackend::new().with_default_output(NO_DEVICE);
        let system = AudioSystem::initialize(backend).unwrap();
        let stream = system.stream().unwrap();

        assert_eq!(stream.device(), NO_DEVICE);
        assert_eq!(stream.latency(), 0.0);
    }

    #[test]
    fn test_setter_roundtrip() {
        let (system, _) = system();
        let mut stream = system.stream().unwrap();

        stream
            .set_device(1)
            .set_channel_count(1)
            .set_sample_format(SampleFormat::INT16)
            .set_latency(0.25)
            .set_sample_rate(96000)
            .set_frames_per_buffer(128)
            .set_host_api_stream_info(Some(Arc::new(42u32)));

        assert_eq!(stream.device(), 1);
        assert_eq!(stream.channel_count(), 1);
        assert_eq!(stream.sample_format(), SampleFormat::INT16);
        assert_eq!(stream.latency(), 0.25);
        assert_eq!(stream.sample_rate(), 96000);
        assert_eq!(stream.frames_per_buffer(), 128);
        let info = stream.host_api_stream_info().unwrap();
        assert_eq!(info.downcast_ref::<u32>(), Some(&42));
    }

    #[test]
    fn test_is_interleaved_for_every_format() {
        let (system, _) = system();
        let mut stream = system.stream().unwrap();

        for format in [
            SampleFormat::FLOAT32,
            SampleFormat::INT32,
            SampleFormat::INT24,
            SampleFormat::INT16,
            SampleFormat::INT8,
            SampleFormat::UINT8,
            SampleFormat::CUSTOM,
        ] {
            stream.set_sample_format(format);
            assert!(stream.is_interleaved(), "{format:?}");

            stream.set_sample_format(format.non_interleaved());
            assert!(!stream.is_interleaved(), "{format:?}");
        }
    }

    #[test]
    fn test_is_variable_frame_size() {
        let (system, _) = system();
        let mut stream = system.stream().unwrap();

        stream.set_frames_per_buffer(0);
        assert!(stream.is_variable_frame_size());
        stream.set_frames_per_buffer(512);
        assert!(!stream.is_variable_frame_size());
        stream.set_frames_per_buffer(65536);
        assert!(!stream.is_variable_frame_size());
    }

    #[test]
    fn test_open_blocking() {
        let (system, handle) = system();
        let mut stream = system.stream().unwrap();

        stream.open().unwrap();
        assert!(stream.is_open());
        assert!(stream.is_playing());

        let open = handle.last_open().unwrap();
        assert!(!open.has_callback);
        assert_eq!(open.sample_rate, 44100.0);
        assert_eq!(open.frames_per_buffer, 65536);
        assert!(open.flags.contains(StreamFlags::CLIP_OFF));
    }

    #[test]
    fn test_open_failure_reports_operation_and_code() {
        let (system, handle) = system();
        let mut stream = system.stream().unwrap();

        handle.fail(MockCall::Open, ErrorCode::InvalidDevice);
        let msg = stream.open().unwrap_err().to_string();
        assert!(msg.contains("opening"), "{msg}");
        assert!(msg.contains("-9996"), "{msg}");
        assert!(!stream.is_open());
    }

    #[test]
    fn test_start_failure_leaves_stream_closed() {
        let (system, handle) = system();
        let mut stream = system.stream().unwrap();

        handle.fail(MockCall::Start, ErrorCode::DeviceUnavailable);
        let err = stream.open2().unwrap_err();
        assert!(matches!(
            err,
            AudioError::Stream {
                operation: Operation::Starting,
                code: ErrorCode::DeviceUnavailable
            }
        ));
        assert!(!stream.is_open());
        assert!(stream.active_config().is_none());
    }

    #[test]
    fn test_invalid_device_rejected_at_open() {
        let (system, _) = system();
        let mut stream = system.stream().unwrap();

        stream.set_device(1); // input-only
        let err = stream.open().unwrap_err();
        assert!(matches!(
            err,
            AudioError::Stream {
                operation: Operation::Opening,
                code: ErrorCode::InvalidChannelCount
            }
        ));
    }

    #[test]
    fn test_open2_request_from_engine_thread() {
        let (system, handle) = system();
        let mut stream = system.stream().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        stream.when_request(move |mut buffer| {
            counter.fetch_add(1, Ordering::Relaxed);
            if let Some(samples) = buffer.samples_mut::<f32>() {
                samples.fill(0.25);
            }
        });
        stream.open2().unwrap();
        assert!(stream.is_open());
        assert!(handle.last_open().unwrap().has_callback);

        let engine = handle.clone();
        let (result, bytes) = std::thread::spawn(move || engine.request_buffer(64))
            .join()
            .unwrap()
            .unwrap();

        assert_eq!(result, CallbackResult::Continue);
        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert_eq!(bytes.len(), 64 * 8);
        assert!(as_f32(&bytes).iter().all(|&s| s == 0.25));
    }

    #[test]
    fn test_callback_without_handler_plays_silence() {
        let (system, handle) = system();
        let mut stream = system.stream().unwrap();

        stream.open2().unwrap();
        let (result, bytes) = handle.request_buffer(32).unwrap();
        assert_eq!(result, CallbackResult::Continue);
        assert!(as_f32(&bytes).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_callback_contention_plays_silence() {
        let (system, handle) = system();
        let mut stream = system.stream().unwrap();
        stream.when_request(|mut buffer| {
            if let Some(samples) = buffer.samples_mut::<f32>() {
                samples.fill(1.0);
            }
        });
        stream.open2().unwrap();

        let guard = stream.request_handler.lock();
        let (_, bytes) = handle.request_buffer(8).unwrap();
        assert!(as_f32(&bytes).iter().all(|&s| s == 0.0));
        drop(guard);

        let (_, bytes) = handle.request_buffer(8).unwrap();
        assert!(as_f32(&bytes).iter().all(|&s| s == 1.0));
    }

    #[test]
    fn test_handler_survives_reopen() {
        let (system, handle) = system();
        let mut stream = system.stream().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        stream.when_request(move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
        });
        stream.open2().unwrap();
        handle.request_buffer(4).unwrap();

        stream.close().unwrap();
        stream.open2().unwrap();
        handle.request_buffer(4).unwrap();

        assert_eq!(calls.load(Ordering::Relaxed), 2);
        assert_eq!(handle.opens(), 2);
    }

    #[test]
    fn test_put_while_closed_never_writes() {
        let (system, handle) = system();
        let mut stream = system.stream().unwrap();

        let err = stream.put(&[0; 64], 8).unwrap_err();
        assert!(matches!(err, AudioError::StreamNotOpen));
        assert_eq!(err.to_string(), "Stream not open!");
        assert_eq!(handle.writes(), 0);
    }

    #[test]
    fn test_put_writes_frames() {
        let (system, handle) = system();
        let mut stream = system.stream().unwrap();
        stream.open().unwrap();

        assert_eq!(stream.put(&[0; 64], 8).unwrap(), Ok(()));
        assert_eq!(handle.writes(), 1);
        assert_eq!(handle.frames_written(), 8);
    }

    #[test]
    fn test_put_returns_native_failure_unchanged() {
        let (system, handle) = system();
        let mut stream = system.stream().unwrap();
        stream.open().unwrap();

        handle.fail(MockCall::Write, ErrorCode::OutputUnderflowed);
        assert_eq!(stream.put(&[0; 64], 8).unwrap(), Err(ErrorCode::OutputUnderflowed));
        assert!(stream.is_open());
    }

    #[test]
    fn test_put_to_callback_stream() {
        let (system, _) = system();
        let mut stream = system.stream().unwrap();
        stream.open2().unwrap();

        assert_eq!(
            stream.put(&[0; 8], 1).unwrap(),
            Err(ErrorCode::CanNotWriteToACallbackStream)
        );
    }

    #[test]
    fn test_put_samples() {
        let (system, handle) = system();
        let mut stream = system.stream().unwrap();

        let frames = vec![Stereo::new(0.1f32, -0.1); 32];
        assert!(matches!(stream.put_samples(&frames), Err(AudioError::StreamNotOpen)));

        stream.open().unwrap();
        assert_eq!(stream.put_samples(&frames).unwrap(), Ok(()));
        assert_eq!(handle.frames_written(), 32);

        // Plain interleaved samples count as channel_count per frame
        assert_eq!(stream.put_samples(&[0.0f32; 16]).unwrap(), Ok(()));
        assert_eq!(handle.frames_written(), 40);
    }

    #[test]
    fn test_put_samples_rejects_mismatches() {
        let (system, _) = system();
        let mut stream = system.stream().unwrap();
        stream.open().unwrap();

        let err = stream.put_samples(&[0i16; 4]).unwrap_err();
        assert!(matches!(
            err,
            AudioError::FormatMismatch {
                expected: SampleFormat::FLOAT32,
                got: SampleFormat::INT16
            }
        ));

        let err = stream.put_samples(&[0.0f32; 3]).unwrap_err();
        assert!(matches!(err, AudioError::PartialFrame { len: 3, channels: 2 }));
    }

    #[test]
    fn test_close_keeps_open_flag() {
        let (system, _) = system();
        let mut stream = system.stream().unwrap();
        stream.open().unwrap();

        stream.close().unwrap();
        assert!(stream.is_open());
        assert!(!stream.is_playing());

        // Already stopped
        let err = stream.close().unwrap_err();
        assert!(matches!(
            err,
            AudioError::Stream {
                operation: Operation::Stopping,
                code: ErrorCode::StreamIsStopped
            }
        ));
    }

    #[test]
    fn test_failed_reopen_keeps_open_flag() {
        let (system, handle) = system();
        let mut stream = system.stream().unwrap();
        stream.open().unwrap();

        handle.fail(MockCall::Open, ErrorCode::DeviceUnavailable);
        assert!(stream.open().is_err());

        // Previous stream released, flag untouched
        assert!(stream.is_open());
        assert!(!stream.is_playing());
        assert!(stream.active_config().is_none());
        assert!(matches!(
            stream.put(&[0u8; 8], 1),
            Err(AudioError::StreamNotOpen)
        ));
        assert_eq!(stream.abort(), Err(ErrorCode::BadStreamPtr));

        handle.clear_failure(MockCall::Open);
        stream.open().unwrap();
        assert!(stream.is_playing());
    }

    #[test]
    fn test_close_without_stream() {
        let (system, _) = system();
        let mut stream = system.stream().unwrap();

        let err = stream.close().unwrap_err();
        assert!(matches!(
            err,
            AudioError::Stream {
                operation: Operation::Stopping,
                code: ErrorCode::BadStreamPtr
            }
        ));
    }

    #[test]
    fn test_abort_returns_status() {
        let (system, handle) = system();
        let mut stream = system.stream().unwrap();
        assert_eq!(stream.abort(), Err(ErrorCode::BadStreamPtr));

        stream.open().unwrap();
        assert_eq!(stream.abort(), Ok(()));
        assert!(!stream.is_playing());
        assert_eq!(stream.abort(), Err(ErrorCode::StreamIsStopped));

        stream.open().unwrap();
        handle.fail(MockCall::Abort, ErrorCode::TimedOut);
        assert_eq!(stream.abort(), Err(ErrorCode::TimedOut));
    }

    #[test]
    fn test_config_changes_apply_at_next_open() {
        let (system, handle) = system();
        let mut stream = system.stream().unwrap();
        stream.open().unwrap();

        stream.set_sample_rate(96000).set_frames_per_buffer(0);
        assert_eq!(stream.active_config().unwrap().sample_rate, 44100);
        assert_eq!(handle.last_open().unwrap().sample_rate, 44100.0);
        assert!(stream.is_playing());

        stream.open().unwrap();
        let open = handle.last_open().unwrap();
        assert_eq!(open.sample_rate, 96000.0);
        assert_eq!(open.frames_per_buffer, 0);
        assert_eq!(stream.active_config().unwrap().sample_rate, 96000);
        assert_eq!(handle.opens(), 2);
    }

    #[test]
    fn test_apply_settings() {
        let (system, _) = system();
        let mut stream = system.stream().unwrap();

        let settings = Settings {
            output_device: Some("Mock Output".to_string()),
            sample_rate: 48000,
            channel_count: 1,
            frames_per_buffer: 0,
            latency: Some(0.05),
            ..Default::default()
        };
        stream.set_device(NO_DEVICE).apply_settings(&settings);

        assert_eq!(stream.device(), 0);
        assert_eq!(stream.sample_rate(), 48000);
        assert_eq!(stream.channel_count(), 1);
        assert!(stream.is_variable_frame_size());
        assert_eq!(stream.latency(), 0.05);
    }

    #[test]
    fn test_apply_settings_ignores_unknown_device() {
        let (system, _) = system();
        let mut stream = system.stream().unwrap();

        for name in ["No Such Device", "Mock Input"] {
            let settings = Settings {
                output_device: Some(name.to_string()),
                ..Default::default()
            };
            stream.apply_settings(&settings);
            assert_eq!(stream.device(), 0);
            assert_eq!(stream.latency(), 0.1);
        }
    }
}
