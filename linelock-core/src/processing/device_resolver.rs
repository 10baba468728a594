use std::sync::Arc;

use crate::models::device::Device;
use crate::models::error::HarnessError;
use crate::traits::audio_subsystem::AudioSubsystem;

/// Deterministic capture device selection.
///
/// The first capture-capable device in enumeration order is treated as the
/// platform's primary driver and skipped, so that a concrete secondary
/// device is exercised. Selection is a pure function of the enumeration
/// snapshot: an unchanged topology always yields the same device.
#[derive(Clone)]
pub struct DeviceResolver {
    audio: Arc<dyn AudioSubsystem>,
    device_override: Option<String>,
}

impl DeviceResolver {
    pub fn new(audio: Arc<dyn AudioSubsystem>) -> Self {
        Self {
            audio,
            device_override: None,
        }
    }

    /// Select by id or name fragment instead of skipping the primary device.
    pub fn with_override(mut self, selector: Option<String>) -> Self {
        self.device_override = selector;
        self
    }

    pub fn audio(&self) -> &Arc<dyn AudioSubsystem> {
        &self.audio
    }

    pub fn resolve(&self) -> Result<Device, HarnessError> {
        let devices = self.audio.enumerate()?;
        let device = match &self.device_override {
            Some(selector) => Self::select_matching(&devices, selector)?,
            None => Self::select(&devices)?,
        };
        log::debug!("Resolved capture device {} ({})", device.name, device.id);
        Ok(device)
    }

    /// Skip the first capture device and return the next one.
    pub fn select(devices: &[Device]) -> Result<Device, HarnessError> {
        let mut capture = devices.iter().filter(|d| d.supports_capture);
        let found = capture.clone().count();
        capture
            .nth(1)
            .cloned()
            .ok_or(HarnessError::NoCaptureDeviceFound { found })
    }

    pub fn select_matching(devices: &[Device], selector: &str) -> Result<Device, HarnessError> {
        let capture: Vec<&Device> = devices.iter().filter(|d| d.supports_capture).collect();
        capture
            .iter()
            .find(|d| d.id == selector)
            .or_else(|| capture.iter().find(|d| d.matches(selector)))
            .map(|d| (*d).clone())
            .ok_or(HarnessError::NoCaptureDeviceFound {
                found: capture.len(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::simulated_platform::SimulatedPlatform;

    fn resolver_for(devices: Vec<Device>) -> DeviceResolver {
        DeviceResolver::new(Arc::new(SimulatedPlatform::new(devices)))
    }

    #[test]
    fn skips_primary_capture_device() {
        let devices = vec![
            Device::render("spk", "Speakers"),
            Device::capture("primary", "Primary Sound Capture Driver").as_default(),
            Device::capture("usb", "Microphone (USB)"),
            Device::capture("line", "Line In"),
        ];

        let device = DeviceResolver::select(&devices).unwrap();
        assert_eq!(device.id, "usb");
    }

    #[test]
    fn repeated_resolution_is_stable() {
        let resolver = DeviceResolver::new(Arc::new(SimulatedPlatform::with_default_topology()));

        let first = resolver.resolve().unwrap();
        for _ in 0..10 {
            assert_eq!(resolver.resolve().unwrap().id, first.id);
        }
        assert!(!first.is_default_capture);
    }

    #[test]
    fn fails_without_secondary_capture_device() {
        let resolver = resolver_for(vec![
            Device::capture("primary", "Primary Sound Capture Driver").as_default(),
            Device::render("spk", "Speakers"),
        ]);
        assert_eq!(
            resolver.resolve(),
            Err(HarnessError::NoCaptureDeviceFound { found: 1 })
        );

        assert_eq!(
            resolver_for(Vec::new()).resolve(),
            Err(HarnessError::NoCaptureDeviceFound { found: 0 })
        );
    }

    #[test]
    fn override_matches_id_then_name() {
        let devices = vec![
            Device::capture("primary", "Primary Sound Capture Driver").as_default(),
            Device::capture("usb", "Microphone (USB)"),
            Device::render("usb-out", "USB Speakers"),
        ];

        assert_eq!(DeviceResolver::select_matching(&devices, "primary").unwrap().id, "primary");
        assert_eq!(DeviceResolver::select_matching(&devices, "microphone").unwrap().id, "usb");
        // render endpoints never match
        assert!(DeviceResolver::select_matching(&devices, "speakers").is_err());
    }
}
