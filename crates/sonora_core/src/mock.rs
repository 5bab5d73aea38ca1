//! Scripted In-Process Backend
//!
//! `MockBackend` implements [`AudioBackend`] without touching audio hardware.
//! It is used by the test suite, the benchmarks and the CLI's dry-run mode.
//!
//! Failures can be injected per call, and a [`MockHandle`] lets a test play
//! the role of the engine's audio thread by requesting buffers from a
//! callback stream.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::backend::{
    AudioBackend, BackendStream, CallbackResult, OutputBuffer, StreamCallback, StreamFlags,
    StreamParameters,
};
use crate::device::{DeviceIndex, DeviceRecord, HostApiIndex, NO_DEVICE};
use crate::error::{ErrorCode, Status};
use crate::format::SampleFormat;
use crate::host_api::{HostApiRecord, HostApiTypeId};

/// Native calls that can be scripted to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockCall {
    Open,
    Start,
    Stop,
    Abort,
    Write,
}

/// Arguments of the most recent `open_stream` call
#[derive(Debug, Clone)]
pub struct MockOpen {
    pub output: StreamParameters,
    pub sample_rate: f64,
    pub frames_per_buffer: u32,
    pub flags: StreamFlags,
    pub has_callback: bool,
}

struct RegisteredCallback {
    callback: StreamCallback,
    channels: u16,
    format: SampleFormat,
    bytes_per_frame: usize,
}

#[derive(Default)]
struct MockState {
    failures: Mutex<HashMap<MockCall, ErrorCode>>,
    callback: Mutex<Option<RegisteredCallback>>,
    last_open: Mutex<Option<MockOpen>>,
    active: AtomicBool,
    opens: AtomicUsize,
    writes: AtomicUsize,
    frames_written: AtomicUsize,
    requests: AtomicUsize,
}

impl MockState {
    fn check(&self, call: MockCall) -> Status {
        match self.failures.lock().get(&call) {
            Some(code) => Err(*code),
            None => Ok(()),
        }
    }
}

/// Shareable view of a [`MockBackend`]'s state, usable from any thread
#[derive(Clone)]
pub struct MockHandle {
    state: Arc<MockState>,
}

impl MockHandle {
    /// Make every subsequent `call` report `code`
    pub fn fail(&self, call: MockCall, code: ErrorCode) {
        self.state.failures.lock().insert(call, code);
    }

    pub fn clear_failure(&self, call: MockCall) {
        self.state.failures.lock().remove(&call);
    }

    /// Number of `open_stream` calls that reached the engine
    pub fn opens(&self) -> usize {
        self.state.opens.load(Ordering::Relaxed)
    }

    /// Number of `write` calls that reached the engine
    pub fn writes(&self) -> usize {
        self.state.writes.load(Ordering::Relaxed)
    }

    pub fn frames_written(&self) -> usize {
        self.state.frames_written.load(Ordering::Relaxed)
    }

    /// Number of buffers delivered through a stream callback
    pub fn requests(&self) -> usize {
        self.state.requests.load(Ordering::Relaxed)
    }

    pub fn is_active(&self) -> bool {
        self.state.active.load(Ordering::Relaxed)
    }

    pub fn last_open(&self) -> Option<MockOpen> {
        self.state.last_open.lock().clone()
    }

    /// Act as the engine's audio thread: request `frames` frames from the
    /// running callback stream.
    ///
    /// Returns `None` when no callback stream is running.
    pub fn request_buffer(&self, frames: usize) -> Option<(CallbackResult, Vec<u8>)> {
        if !self.is_active() {
            return None;
        }
        let mut guard = self.state.callback.lock();
        let registered = guard.as_mut()?;

        let len = frames * registered.bytes_per_frame;
        // u64 backing keeps the buffer aligned for every sample type
        let mut storage = vec![0u64; (len + 7) / 8];
        let bytes = &mut bytemuck::cast_slice_mut::<u64, u8>(&mut storage)[..len];

        let result = (registered.callback)(OutputBuffer::new(
            bytes,
            frames,
            registered.channels,
            registered.format,
        ));
        self.state.requests.fetch_add(1, Ordering::Relaxed);
        Some((result, bytes.to_vec()))
    }
}

/// In-process engine with a fixed device list
pub struct MockBackend {
    devices: Vec<DeviceRecord>,
    host_apis: Vec<HostApiRecord>,
    default_output: DeviceIndex,
    default_input: DeviceIndex,
    device_count_override: Option<i32>,
    host_api_count_override: Option<i32>,
    init_error: Option<ErrorCode>,
    initialized: bool,
    state: Arc<MockState>,
}

impl MockBackend {
    /// One host API with a stereo output device (index 0) and a stereo input
    /// device (index 1)
    pub fn new() -> Self {
        let host_api = HostApiRecord {
            struct_version: 1,
            type_id: HostApiTypeId::InDevelopment,
            name: "Mock".to_string(),
            device_count: 2,
            default_input_device: 1,
            default_output_device: 0,
        };
        let output = DeviceRecord {
            name: "Mock Output".to_string(),
            host_api: 0,
            max_input_channels: 0,
            max_output_channels: 2,
            default_low_input_latency: 0.0,
            default_low_output_latency: 0.01,
            default_high_input_latency: 0.0,
            default_high_output_latency: 0.1,
            default_sample_rate: 48000.0,
        };
        let input = DeviceRecord {
            name: "Mock Input".to_string(),
            max_input_channels: 2,
            max_output_channels: 0,
            default_low_input_latency: 0.01,
            default_low_output_latency: 0.0,
            default_high_input_latency: 0.1,
            default_high_output_latency: 0.0,
            ..output.clone()
        };

        Self {
            devices: vec![output, input],
            host_apis: vec![host_api],
            default_output: 0,
            default_input: 1,
            device_count_override: None,
            host_api_count_override: None,
            init_error: None,
            initialized: false,
            state: Arc::new(MockState::default()),
        }
    }

    /// Replace the device list; defaults point at the first device
    pub fn with_devices(mut self, devices: Vec<DeviceRecord>) -> Self {
        let default = if devices.is_empty() { NO_DEVICE } else { 0 };
        self.devices = devices;
        self.default_output = default;
        self.default_input = default;
        self
    }

    pub fn with_host_apis(mut self, host_apis: Vec<HostApiRecord>) -> Self {
        self.host_apis = host_apis;
        self
    }

    pub fn with_default_output(mut self, index: DeviceIndex) -> Self {
        self.default_output = index;
        self
    }

    pub fn with_default_input(mut self, index: DeviceIndex) -> Self {
        self.default_input = index;
        self
    }

    /// Report `count` from `device_count` regardless of the device list
    pub fn with_device_count(mut self, count: i32) -> Self {
        self.device_count_override = Some(count);
        self
    }

    /// Report `count` from `host_api_count` regardless of the host API list
    pub fn with_host_api_count(mut self, count: i32) -> Self {
        self.host_api_count_override = Some(count);
        self
    }

    pub fn with_init_error(mut self, code: ErrorCode) -> Self {
        self.init_error = Some(code);
        self
    }

    pub fn handle(&self) -> MockHandle {
        MockHandle {
            state: Arc::clone(&self.state),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn validate_output(&self, output: &StreamParameters, sample_rate: f64) -> Result<usize, ErrorCode> {
        let device = self
            .device_info(output.device)
            .ok_or(ErrorCode::InvalidDevice)?;
        if output.channel_count <= 0 || output.channel_count > device.max_output_channels {
            return Err(ErrorCode::InvalidChannelCount);
        }
        if sample_rate <= 0.0 {
            return Err(ErrorCode::InvalidSampleRate);
        }
        output
            .bytes_per_frame()
            .ok_or(ErrorCode::SampleFormatNotSupported)
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for MockBackend {
    fn name(&self) -> &'static str {
        "Mock"
    }

    fn initialize(&mut self) -> Status {
        if let Some(code) = self.init_error {
            return Err(code);
        }
        self.initialized = true;
        Ok(())
    }

    fn terminate(&mut self) -> Status {
        if !self.initialized {
            return Err(ErrorCode::NotInitialized);
        }
        self.initialized = false;
        Ok(())
    }

    fn host_api_count(&self) -> i32 {
        if !self.initialized {
            return ErrorCode::NotInitialized.code();
        }
        self.host_api_count_override
            .unwrap_or(self.host_apis.len() as i32)
    }

    fn device_count(&self) -> i32 {
        if !self.initialized {
            return ErrorCode::NotInitialized.code();
        }
        self.device_count_override
            .unwrap_or(self.devices.len() as i32)
    }

    fn default_output_device(&self) -> DeviceIndex {
        self.default_output
    }

    fn default_input_device(&self) -> DeviceIndex {
        self.default_input
    }

    fn device_info(&self, index: DeviceIndex) -> Option<&DeviceRecord> {
        usize::try_from(index).ok().and_then(|i| self.devices.get(i))
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
        self.state.check(MockCall::Open)?;
        if input.is_some() {
            return Err(ErrorCode::BadIoDeviceCombination);
        }
        let output = output.ok_or(ErrorCode::InvalidDevice)?;
        let bytes_per_frame = self.validate_output(output, sample_rate)?;

        self.state.opens.fetch_add(1, Ordering::Relaxed);
        *self.state.last_open.lock() = Some(MockOpen {
            output: output.clone(),
            sample_rate,
            frames_per_buffer,
            flags,
            has_callback: callback.is_some(),
        });

        let callback_mode = callback.is_some();
        *self.state.callback.lock() = callback.map(|callback| RegisteredCallback {
            callback,
            channels: output.channel_count as u16,
            format: output.sample_format,
            bytes_per_frame,
        });
        debug!(
            device = output.device,
            callback_mode, "Mock stream opened"
        );

        Ok(Box::new(MockStream {
            state: Arc::clone(&self.state),
            callback_mode,
            bytes_per_frame,
        }))
    }
}

struct MockStream {
    state: Arc<MockState>,
    callback_mode: bool,
    bytes_per_frame: usize,
}

impl BackendStream for MockStream {
    fn start(&mut self) -> Status {
        self.state.check(MockCall::Start)?;
        if self.state.active.swap(true, Ordering::Relaxed) {
            return Err(ErrorCode::StreamIsNotStopped);
        }
        Ok(())
    }

    fn stop(&mut self) -> Status {
        self.state.check(MockCall::Stop)?;
        if !self.state.active.swap(false, Ordering::Relaxed) {
            return Err(ErrorCode::StreamIsStopped);
        }
        Ok(())
    }

    fn abort(&mut self) -> Status {
        self.state.check(MockCall::Abort)?;
        if !self.state.active.swap(false, Ordering::Relaxed) {
            return Err(ErrorCode::StreamIsStopped);
        }
        Ok(())
    }

    fn write(&mut self, buffer: &[u8], frames: usize) -> Status {
        self.state.writes.fetch_add(1, Ordering::Relaxed);
        if self.callback_mode {
            return Err(ErrorCode::CanNotWriteToACallbackStream);
        }
        self.state.check(MockCall::Write)?;
        if !self.state.active.load(Ordering::Relaxed) {
            return Err(ErrorCode::StreamIsStopped);
        }
        if buffer.len() < frames * self.bytes_per_frame {
            return Err(ErrorCode::BadBufferPtr);
        }
        self.state.frames_written.fetch_add(frames, Ordering::Relaxed);
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.state.active.load(Ordering::Relaxed)
    }
}

impl Drop for MockStream {
    fn drop(&mut self) {
        self.state.active.store(false, Ordering::Relaxed);
        if self.callback_mode {
            *self.state.callback.lock() = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output_params() -> StreamParameters {
        StreamParameters {
            device: 0,
            channel_count: 2,
            sample_format: SampleFormat::FLOAT32,
            suggested_latency: 0.1,
            host_api_specific_stream_info: None,
        }
    }

    #[test]
    fn test_counts_require_initialize() {
        let mut backend = MockBackend::new();
        assert_eq!(backend.device_count(), ErrorCode::NotInitialized.code());
        assert_eq!(backend.host_api_count(), ErrorCode::NotInitialized.code());

        backend.initialize().unwrap();
        assert_eq!(backend.device_count(), 2);
        assert_eq!(backend.host_api_count(), 1);
        assert_eq!(backend.terminate(), Ok(()));
        assert_eq!(backend.terminate(), Err(ErrorCode::NotInitialized));
    }

    #[test]
    fn test_open_validation() {
        let mut backend = MockBackend::new();
        backend.initialize().unwrap();

        let mut params = output_params();
        params.device = 1; // input-only device
        let result = backend.open_stream(None, Some(&params), 48000.0, 0, StreamFlags::NO_FLAG, None);
        assert_eq!(result.err(), Some(ErrorCode::InvalidChannelCount));

        params.device = 7;
        let result = backend.open_stream(None, Some(&params), 48000.0, 0, StreamFlags::NO_FLAG, None);
        assert_eq!(result.err(), Some(ErrorCode::InvalidDevice));

        let mut params = output_params();
        params.sample_format = SampleFormat::CUSTOM;
        let result = backend.open_stream(None, Some(&params), 48000.0, 0, StreamFlags::NO_FLAG, None);
        assert_eq!(result.err(), Some(ErrorCode::SampleFormatNotSupported));
    }

    #[test]
    fn test_blocking_write() {
        let mut backend = MockBackend::new();
        backend.initialize().unwrap();
        let handle = backend.handle();

        let mut stream = backend
            .open_stream(None, Some(&output_params()), 48000.0, 256, StreamFlags::CLIP_OFF, None)
            .unwrap();
        assert_eq!(stream.write(&[0; 64], 8), Err(ErrorCode::StreamIsStopped));

        stream.start().unwrap();
        assert_eq!(stream.write(&[0; 64], 8), Ok(()));
        assert_eq!(stream.write(&[0; 8], 8), Err(ErrorCode::BadBufferPtr));
        assert_eq!(handle.frames_written(), 8);
        assert_eq!(handle.writes(), 3);

        let open = handle.last_open().unwrap();
        assert_eq!(open.frames_per_buffer, 256);
        assert!(open.flags.contains(StreamFlags::CLIP_OFF));
        assert!(!open.has_callback);
    }

    #[test]
    fn test_request_buffer_needs_running_callback_stream() {
        let mut backend = MockBackend::new();
        backend.initialize().unwrap();
        let handle = backend.handle();
        assert!(handle.request_buffer(16).is_none());

        let callback: StreamCallback = Box::new(|mut buffer: OutputBuffer<'_>| {
            buffer.samples_mut::<f32>().unwrap().fill(0.5);
            CallbackResult::Continue
        });
        let mut stream = backend
            .open_stream(None, Some(&output_params()), 48000.0, 0, StreamFlags::NO_FLAG, Some(callback))
            .unwrap();
        assert!(handle.request_buffer(16).is_none());

        stream.start().unwrap();
        let (result, bytes) = handle.request_buffer(16).unwrap();
        assert_eq!(result, CallbackResult::Continue);
        assert_eq!(bytes.len(), 16 * 8);
        let samples: Vec<f32> = bytemuck::pod_collect_to_vec(&bytes);
        assert!(samples.iter().all(|&s| s == 0.5));

        assert_eq!(stream.write(&[0; 8], 1), Err(ErrorCode::CanNotWriteToACallbackStream));

        drop(stream);
        assert!(handle.request_buffer(16).is_none());
    }

    #[test]
    fn test_injected_failures() {
        let mut backend = MockBackend::new();
        backend.initialize().unwrap();
        let handle = backend.handle();

        handle.fail(MockCall::Open, ErrorCode::DeviceUnavailable);
        let result = backend.open_stream(None, Some(&output_params()), 48000.0, 0, StreamFlags::NO_FLAG, None);
        assert_eq!(result.err(), Some(ErrorCode::DeviceUnavailable));
        assert_eq!(handle.opens(), 0);

        handle.clear_failure(MockCall::Open);
        assert!(backend
            .open_stream(None, Some(&output_params()), 48000.0, 0, StreamFlags::NO_FLAG, None)
            .is_ok());
    }
}
