//! Sonora Platform - Native Audio Engine
//!
//! This crate provides the hardware implementation of
//! [`sonora_core::AudioBackend`], built on cpal:
//! - Device and host API enumeration across every cpal host
//! - Blocking-write output streams fed through a lock-free byte queue
//! - Callback output streams that hand cpal's buffer straight to the caller
//!
//! # Platform Support
//!
//! | Platform | Host APIs                          |
//! |----------|------------------------------------|
//! | Linux    | ALSA, JACK (`jack` feature)        |
//! | Windows  | WASAPI, ASIO (`asio` feature)      |
//! | macOS    | CoreAudio                          |

mod cpal_backend;
mod cpal_stream;
mod error;

pub use cpal_backend::CpalBackend;
pub use cpal_stream::CpalStream;
pub use error::PlatformError;

/// Get the native backend for the current platform
///
/// With `host == None` every available host is enumerated; otherwise only the
/// named one.
pub fn get_backend(host: Option<&str>) -> Result<CpalBackend, PlatformError> {
    match host {
        Some(name) => CpalBackend::with_host(name),
        None => Ok(CpalBackend::new()),
    }
}
