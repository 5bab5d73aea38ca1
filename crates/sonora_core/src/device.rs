//! Audio Device Capability Views

use std::fmt;

use serde::{Deserialize, Serialize};

/// Index of a device in the engine's enumeration order
pub type DeviceIndex = i32;

/// Index of a host API in the engine's enumeration order
pub type HostApiIndex = i32;

/// Sentinel for "no device" (e.g. no default output)
pub const NO_DEVICE: DeviceIndex = -1;

/// Static capability data for one device, owned by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Human-readable device name
    pub name: String,

    /// Index of the host API this device belongs to
    pub host_api: HostApiIndex,

    pub max_input_channels: i32,
    pub max_output_channels: i32,

    /// Default latencies in seconds
    pub default_low_input_latency: f64,
    pub default_low_output_latency: f64,
    pub default_high_input_latency: f64,
    pub default_high_output_latency: f64,

    /// Default sample rate in Hz
    pub default_sample_rate: f64,
}

/// Read-only view over one device's capability snapshot.
///
/// The view borrows engine-owned data, so it cannot outlive the
/// [`AudioSystem`](crate::AudioSystem) it was enumerated from.
#[derive(Debug, Clone, Copy)]
pub struct DeviceInfo<'a> {
    record: &'a DeviceRecord,
    index: DeviceIndex,
}

impl<'a> DeviceInfo<'a> {
    pub fn new(record: &'a DeviceRecord, index: DeviceIndex) -> Self {
        Self { record, index }
    }

    pub fn index(&self) -> DeviceIndex {
        self.index
    }

    pub fn name(&self) -> &'a str {
        &self.record.name
    }

    pub fn max_input_channels(&self) -> i32 {
        self.record.max_input_channels
    }

    pub fn max_output_channels(&self) -> i32 {
        self.record.max_output_channels
    }

    /// Index of the owning host API
    pub fn host_api(&self) -> HostApiIndex {
        self.record.host_api
    }

    pub fn default_low_input_latency(&self) -> f64 {
        self.record.default_low_input_latency
    }

    pub fn default_low_output_latency(&self) -> f64 {
        self.record.default_low_output_latency
    }

    pub fn default_high_input_latency(&self) -> f64 {
        self.record.default_high_input_latency
    }

    pub fn default_high_output_latency(&self) -> f64 {
        self.record.default_high_output_latency
    }

    pub fn default_sample_rate(&self) -> f64 {
        self.record.default_sample_rate
    }

    /// Underlying engine record
    pub fn record(&self) -> &'a DeviceRecord {
        self.record
    }
}

impl fmt::Display for DeviceInfo<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Name:                        {}", self.name())?;
        writeln!(f, "Index:                       {}", self.index())?;
        writeln!(f, "Max Input Channels:          {}", self.max_input_channels())?;
        writeln!(f, "Max Output Channels:         {}", self.max_output_channels())?;
        writeln!(f, "Host Api:                    {}", self.host_api())?;
        writeln!(f, "Default Low Input Latency:   {}", self.default_low_input_latency())?;
        writeln!(f, "Default Low Output Latency:  {}", self.default_low_output_latency())?;
        writeln!(f, "Default High Input Latency:  {}", self.default_high_input_latency())?;
        writeln!(f, "Default High Output Latency: {}", self.default_high_output_latency())
    }
}
