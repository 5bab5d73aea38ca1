//! Host API Metadata Views

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::device::{DeviceIndex, HostApiIndex};

/// Category of native audio backend behind a host API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum HostApiTypeId {
    InDevelopment = 0,
    DirectSound = 1,
    Mme = 2,
    Asio = 3,
    SoundManager = 4,
    CoreAudio = 5,
    Oss = 7,
    Alsa = 8,
    Al = 9,
    BeOs = 10,
    Wdmks = 11,
    Jack = 12,
    Wasapi = 13,
    AudioScienceHpi = 14,
    AudioIo = 15,
    PulseAudio = 16,
    Sndio = 17,
}

impl fmt::Display for HostApiTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InDevelopment => "In Development",
            Self::DirectSound => "DirectSound",
            Self::Mme => "MME",
            Self::Asio => "ASIO",
            Self::SoundManager => "Sound Manager",
            Self::CoreAudio => "Core Audio",
            Self::Oss => "OSS",
            Self::Alsa => "ALSA",
            Self::Al => "AL",
            Self::BeOs => "BeOS",
            Self::Wdmks => "WDM-KS",
            Self::Jack => "JACK",
            Self::Wasapi => "WASAPI",
            Self::AudioScienceHpi => "AudioScience HPI",
            Self::AudioIo => "AudioIO",
            Self::PulseAudio => "PulseAudio",
            Self::Sndio => "sndio",
        };
        f.write_str(name)
    }
}

/// Metadata for one host API, owned by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostApiRecord {
    /// Layout version of this record
    pub struct_version: i32,
    pub type_id: HostApiTypeId,
    pub name: String,
    pub device_count: i32,
    pub default_input_device: DeviceIndex,
    pub default_output_device: DeviceIndex,
}

/// Read-only view over one host API's metadata
#[derive(Debug, Clone, Copy)]
pub struct HostApiInfo<'a> {
    record: &'a HostApiRecord,
    index: HostApiIndex,
}

impl<'a> HostApiInfo<'a> {
    pub fn new(record: &'a HostApiRecord, index: HostApiIndex) -> Self {
        Self { record, index }
    }

    pub fn index(&self) -> HostApiIndex {
        self.index
    }

    pub fn version(&self) -> i32 {
        self.record.struct_version
    }

    pub fn type_id(&self) -> HostApiTypeId {
        self.record.type_id
    }

    pub fn name(&self) -> &'a str {
        &self.record.name
    }

    pub fn device_count(&self) -> i32 {
        self.record.device_count
    }

    pub fn default_input_device(&self) -> DeviceIndex {
        self.record.default_input_device
    }

    pub fn default_output_device(&self) -> DeviceIndex {
        self.record.default_output_device
    }

    pub fn record(&self) -> &'a HostApiRecord {
        self.record
    }
}

impl fmt::Display for HostApiInfo<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Version: {}", self.version())?;
        writeln!(f, "Type:    {}", self.type_id())?;
        writeln!(f, "Name:    {}", self.name())?;
        writeln!(f, "Device count {}", self.device_count())?;
        writeln!(f, "Default Input Device idx: {}", self.default_input_device())?;
        writeln!(f, "Default Output Device idx: {}", self.default_output_device())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors_and_display() {
        let record = HostApiRecord {
            struct_version: 1,
            type_id: HostApiTypeId::Alsa,
            name: "ALSA".to_string(),
            device_count: 4,
            default_input_device: 0,
            default_output_device: 2,
        };
        let info = HostApiInfo::new(&record, 0);

        assert_eq!(info.index(), 0);
        assert_eq!(info.version(), 1);
        assert_eq!(info.type_id(), HostApiTypeId::Alsa);
        assert_eq!(info.name(), "ALSA");
        assert_eq!(info.device_count(), 4);
        assert_eq!(info.default_input_device(), 0);
        assert_eq!(info.default_output_device(), 2);

        let text = info.to_string();
        assert!(text.contains("Type:    ALSA\n"));
        assert!(text.contains("Device count 4\n"));
        assert!(text.ends_with("Default Output Device idx: 2\n"));
    }

    #[test]
    fn test_type_id_values() {
        assert_eq!(HostApiTypeId::CoreAudio as i32, 5);
        assert_eq!(HostApiTypeId::Alsa as i32, 8);
        assert_eq!(HostApiTypeId::Wasapi as i32, 13);
    }
}
