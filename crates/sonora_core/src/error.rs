//! Error Types
//!
//! Two layers live here:
//! - [`ErrorCode`]: the raw status codes reported by the native audio engine
//! - [`AudioError`]: errors raised by setup/teardown-class operations
//!
//! Steady-state operations (`put`, `abort`) hand back a [`Status`] instead of
//! raising, so a write loop never has to unwind on a transient underrun.

use std::fmt;

use thiserror::Error;

/// Status codes reported by the native audio engine.
///
/// Success is not a variant: a successful call is `Ok(())` in a [`Status`]
/// and has the raw value `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    NotInitialized = -10000,
    UnanticipatedHostError = -9999,
    InvalidChannelCount = -9998,
    InvalidSampleRate = -9997,
    InvalidDevice = -9996,
    InvalidFlag = -9995,
    SampleFormatNotSupported = -9994,
    BadIoDeviceCombination = -9993,
    InsufficientMemory = -9992,
    BufferTooBig = -9991,
    BufferTooSmall = -9990,
    NullCallback = -9989,
    BadStreamPtr = -9988,
    TimedOut = -9987,
    InternalError = -9986,
    DeviceUnavailable = -9985,
    IncompatibleHostApiSpecificStreamInfo = -9984,
    StreamIsStopped = -9983,
    StreamIsNotStopped = -9982,
    InputOverflowed = -9981,
    OutputUnderflowed = -9980,
    HostApiNotFound = -9979,
    InvalidHostApi = -9978,
    CanNotReadFromACallbackStream = -9977,
    CanNotWriteToACallbackStream = -9976,
    CanNotReadFromAnOutputOnlyStream = -9975,
    CanNotWriteToAnInputOnlyStream = -9974,
    IncompatibleStreamHostApi = -9973,
    BadBufferPtr = -9972,
}

/// Result of a native call that either succeeds or reports an [`ErrorCode`].
pub type Status = Result<(), ErrorCode>;

impl ErrorCode {
    const ALL: [ErrorCode; 29] = [
        Self::NotInitialized,
        Self::UnanticipatedHostError,
        Self::InvalidChannelCount,
        Self::InvalidSampleRate,
        Self::InvalidDevice,
        Self::InvalidFlag,
        Self::SampleFormatNotSupported,
        Self::BadIoDeviceCombination,
        Self::InsufficientMemory,
        Self::BufferTooBig,
        Self::BufferTooSmall,
        Self::NullCallback,
        Self::BadStreamPtr,
        Self::TimedOut,
        Self::InternalError,
        Self::DeviceUnavailable,
        Self::IncompatibleHostApiSpecificStreamInfo,
        Self::StreamIsStopped,
        Self::StreamIsNotStopped,
        Self::InputOverflowed,
        Self::OutputUnderflowed,
        Self::HostApiNotFound,
        Self::InvalidHostApi,
        Self::CanNotReadFromACallbackStream,
        Self::CanNotWriteToACallbackStream,
        Self::CanNotReadFromAnOutputOnlyStream,
        Self::CanNotWriteToAnInputOnlyStream,
        Self::IncompatibleStreamHostApi,
        Self::BadBufferPtr,
    ];

    /// Raw numeric code as reported by the engine
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Human-readable description of the code
    pub fn text(self) -> &'static str {
        match self {
            Self::NotInitialized => "Audio engine not initialized",
            Self::UnanticipatedHostError => "Unanticipated host error",
            Self::InvalidChannelCount => "Invalid number of channels",
            Self::InvalidSampleRate => "Invalid sample rate",
            Self::InvalidDevice => "Invalid device",
            Self::InvalidFlag => "Invalid flag",
            Self::SampleFormatNotSupported => "Sample format not supported",
            Self::BadIoDeviceCombination => "Illegal combination of I/O devices",
            Self::InsufficientMemory => "Insufficient memory",
            Self::BufferTooBig => "Buffer too big",
            Self::BufferTooSmall => "Buffer too small",
            Self::NullCallback => "No callback routine specified",
            Self::BadStreamPtr => "Invalid stream pointer",
            Self::TimedOut => "Wait timed out",
            Self::InternalError => "Internal engine error",
            Self::DeviceUnavailable => "Device unavailable",
            Self::IncompatibleHostApiSpecificStreamInfo => {
                "Incompatible host API specific stream info"
            }
            Self::StreamIsStopped => "Stream is stopped",
            Self::StreamIsNotStopped => "Stream is not stopped",
            Self::InputOverflowed => "Input overflowed",
            Self::OutputUnderflowed => "Output underflowed",
            Self::HostApiNotFound => "Host API not found",
            Self::InvalidHostApi => "Invalid host API",
            Self::CanNotReadFromACallbackStream => "Can't read from a callback stream",
            Self::CanNotWriteToACallbackStream => "Can't write to a callback stream",
            Self::CanNotReadFromAnOutputOnlyStream => "Can't read from an output only stream",
            Self::CanNotWriteToAnInputOnlyStream => "Can't write to an input only stream",
            Self::IncompatibleStreamHostApi => "Incompatible stream host API",
            Self::BadBufferPtr => "Bad buffer pointer",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code(), self.text())
    }
}

impl TryFrom<i32> for ErrorCode {
    type Error = i32;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.code() == code)
            .ok_or(code)
    }
}

/// Stream operation that reported a native failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Opening,
    Starting,
    Stopping,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Opening => "opening",
            Self::Starting => "starting",
            Self::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// Errors raised by setup and teardown operations
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Error initializing audio subsystem code {0}")]
    Initialize(ErrorCode),

    #[error("Error terminating audio subsystem code {0}")]
    Terminate(ErrorCode),

    #[error("Bad device count: {0} devices reported")]
    BadDeviceCount(i32),

    #[error("Bad host API count: {0} apis reported")]
    BadHostApiCount(i32),

    #[error("No device info reported for device {0}")]
    MissingDeviceInfo(i32),

    #[error("No host API info reported for host API {0}")]
    MissingHostApiInfo(i32),

    #[error("Error {operation} stream! {code}")]
    Stream { operation: Operation, code: ErrorCode },

    #[error("Stream not open!")]
    StreamNotOpen,

    #[error("Buffer of {len} samples is not a whole number of {channels}-channel frames")]
    PartialFrame { len: usize, channels: i32 },

    #[error("Sample type {got:?} does not match the configured format {expected:?}")]
    FormatMismatch {
        expected: crate::format::SampleFormat,
        got: crate::format::SampleFormat,
    },

    #[error("Settings error: {0}")]
    Settings(String),
}

/// Result type alias for binding operations
pub type AudioResult<T> = Result<T, AudioError>;
