//! Sonora Core - Audio Stream Binding
//!
//! This crate provides a thin, typed binding over a native audio engine:
//! - Device and host API enumeration as borrowed, read-only views
//! - Output streams in blocking-write or callback mode
//! - Process-wide engine init/teardown as an RAII guard
//! - Persisted stream settings
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Caller Thread                         │
//! │  AudioSystem ──borrows──▶ AudioStream ──put──▶ engine       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ open2 (callback mode)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Engine Thread                          │
//! │   request ──try_lock──▶ when_request handler ──▶ buffer     │
//! │              (silence when the handler is busy)             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine itself sits behind [`AudioBackend`]; `sonora_platform` provides
//! the hardware implementation and [`MockBackend`] an in-process one.

mod backend;
mod config;
mod device;
mod error;
mod format;
mod host_api;
mod mock;
mod settings;
mod stream;
mod system;

pub use backend::{
    AudioBackend, BackendStream, CallbackResult, HostApiStreamInfo, OutputBuffer, StreamCallback,
    StreamFlags, StreamParameters,
};
pub use config::{StreamConfig, DEFAULT_FRAMES_PER_BUFFER, DEFAULT_SAMPLE_RATE};
pub use device::{DeviceIndex, DeviceInfo, DeviceRecord, HostApiIndex, NO_DEVICE};
pub use error::{AudioError, AudioResult, ErrorCode, Operation, Status};
pub use format::{Sample, SampleFormat, Stereo};
pub use host_api::{HostApiInfo, HostApiRecord, HostApiTypeId};
pub use mock::{MockBackend, MockCall, MockHandle, MockOpen};
pub use settings::{Settings, DEFAULT_LOG_FILTER};
pub use stream::{AudioStream, RequestHandler};
pub use system::{audio_devices, audio_host_apis, AudioSystem};
