//! Audio Subsystem Lifetime
//!
//! [`AudioSystem`] initializes the native engine when it is created and
//! terminates it exactly once, either through [`AudioSystem::terminate`] or on
//! drop. Device and host API views borrow the system, so they cannot outlive
//! termination.

use tracing::{debug, error, info};

use crate::backend::AudioBackend;
use crate::device::DeviceInfo;
use crate::error::{AudioError, AudioResult};
use crate::host_api::HostApiInfo;
use crate::stream::AudioStream;

/// Initialized native audio engine
pub struct AudioSystem<B: AudioBackend> {
    backend: B,
    terminated: bool,
}

impl<B: AudioBackend> AudioSystem<B> {
    /// Initialize `backend` and take ownership of it
    pub fn initialize(mut backend: B) -> AudioResult<Self> {
        backend.initialize().map_err(AudioError::Initialize)?;
        info!(backend = backend.name(), "Audio subsystem initialized");

        Ok(Self {
            backend,
            terminated: false,
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Create a stream configured for the default output device
    pub fn stream(&self) -> AudioResult<AudioStream<'_, B>> {
        AudioStream::new(self)
    }

    pub fn devices(&self) -> AudioResult<Vec<DeviceInfo<'_>>> {
        enumerate_devices(&self.backend)
    }

    pub fn host_apis(&self) -> AudioResult<Vec<HostApiInfo<'_>>> {
        enumerate_host_apis(&self.backend)
    }

    /// Terminate the engine and report the native status
    pub fn terminate(mut self) -> AudioResult<()> {
        self.terminated = true;
        self.backend.terminate().map_err(AudioError::Terminate)?;
        info!("Audio subsystem terminated");
        Ok(())
    }
}

impl<B: AudioBackend> Drop for AudioSystem<B> {
    fn drop(&mut self) {
        if self.terminated {
            return;
        }
        match self.backend.terminate() {
            Ok(()) => info!("Audio subsystem terminated"),
            Err(code) => error!("Error terminating audio subsystem: {}", code),
        }
    }
}

/// Every device the engine reports, in index order
pub fn audio_devices<B: AudioBackend>(system: &AudioSystem<B>) -> AudioResult<Vec<DeviceInfo<'_>>> {
    system.devices()
}

/// Every host API the engine reports, in index order
pub fn audio_host_apis<B: AudioBackend>(
    system: &AudioSystem<B>,
) -> AudioResult<Vec<HostApiInfo<'_>>> {
    system.host_apis()
}

pub(crate) fn enumerate_devices<B: AudioBackend + ?Sized>(
    backend: &B,
) -> AudioResult<Vec<DeviceInfo<'_>>> {
    let count = backend.device_count();
    if count < 0 {
        return Err(AudioError::BadDeviceCount(count));
    }
    debug!(count, "Enumerating devices");

    (0..count)
        .map(|index| {
            backend
                .device_info(index)
                .map(|record| DeviceInfo::new(record, index))
                .ok_or(AudioError::MissingDeviceInfo(index))
        })
        .collect()
}

pub(crate) fn enumerate_host_apis<B: AudioBackend + ?Sized>(
    backend: &B,
) -> AudioResult<Vec<HostApiInfo<'_>>> {
    let count = backend.host_api_count();
    if count < 0 {
        return Err(AudioError::BadHostApiCount(count));
    }
    debug!(count, "Enumerating host APIs");

    (0..count)
        .map(|index| {
            backend
                .host_api_info(index)
                .map(|record| HostApiInfo::new(record, index))
                .ok_or(AudioError::MissingHostApiInfo(index))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::mock::MockBackend;

    #[test]
    fn test_initialize_and_terminate() {
        let system = AudioSystem::initialize(MockBackend::new()).unwrap();
        assert!(system.backend().is_initialized());
        assert!(system.terminate().is_ok());
    }

    #[test]
    fn test_initialize_failure() {
        let backend = MockBackend::new().with_init_error(ErrorCode::DeviceUnavailable);
        let err = AudioSystem::initialize(backend).err().unwrap();
        assert!(matches!(err, AudioError::Initialize(ErrorCode::DeviceUnavailable)));
        assert!(err.to_string().starts_with("Error initializing audio subsystem code -9985"));
    }

    #[test]
    fn test_enumeration() {
        let system = AudioSystem::initialize(MockBackend::new()).unwrap();

        let devices = audio_devices(&system).unwrap();
        assert_eq!(devices.len(), 2);
        for (i, device) in devices.iter().enumerate() {
            assert_eq!(device.index(), i as i32);
        }
        assert_eq!(devices[0].name(), "Mock Output");

        let host_apis = audio_host_apis(&system).unwrap();
        assert_eq!(host_apis.len(), 1);
        assert_eq!(host_apis[0].index(), 0);
        assert_eq!(host_apis[0].name(), "Mock");
    }

    #[test]
    fn test_negative_counts() {
        let system =
            AudioSystem::initialize(MockBackend::new().with_device_count(-9999)).unwrap();
        assert!(matches!(system.devices(), Err(AudioError::BadDeviceCount(-9999))));

        let system = AudioSystem::initialize(MockBackend::new().with_host_api_count(-1)).unwrap();
        assert!(matches!(system.host_apis(), Err(AudioError::BadHostApiCount(-1))));
    }

    #[test]
    fn test_missing_records() {
        let system = AudioSystem::initialize(MockBackend::new().with_device_count(3)).unwrap();
        assert!(matches!(system.devices(), Err(AudioError::MissingDeviceInfo(2))));

        let system = AudioSystem::initialize(MockBackend::new().with_host_api_count(2)).unwrap();
        assert!(matches!(system.host_apis(), Err(AudioError::MissingHostApiInfo(1))));
    }

    #[test]
    fn test_empty_engine() {
        let backend = MockBackend::new().with_devices(Vec::new()).with_host_apis(Vec::new());
        let system = AudioSystem::initialize(backend).unwrap();
        assert!(system.devices().unwrap().is_empty());
        assert!(system.host_apis().unwrap().is_empty());
    }
}
