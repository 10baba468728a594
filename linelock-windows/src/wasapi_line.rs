//! WASAPI capture lines.
//!
//! A record attempt activates an `IAudioClient` on the endpoint and
//! initializes it in shared mode, which is the point at which a locked-out
//! line refuses to open. No samples are read.

use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;

use linelock_core::models::config::ApartmentMode;
use linelock_core::models::device::Device;
use linelock_core::models::error::HarnessError;
use linelock_core::traits::audio_subsystem::{AudioSubsystem, NativeLine};

use crate::com::{ComError, ComScope};
use crate::device_enumerator::DeviceEnumerator;

/// Buffer duration in 100-nanosecond units (100ms).
const BUFFER_DURATION: i64 = 1_000_000;

/// Audio subsystem backed by the MMDevice API and WASAPI.
///
/// Each call enters COM on the calling thread with `apartment_mode`, or
/// joins whatever apartment the thread already has.
pub struct WasapiAudioSubsystem {
    apartment_mode: ApartmentMode,
}

impl WasapiAudioSubsystem {
    pub fn new(apartment_mode: ApartmentMode) -> Self {
        Self { apartment_mode }
    }
}

impl AudioSubsystem for WasapiAudioSubsystem {
    fn enumerate(&self) -> Result<Vec<Device>, HarnessError> {
        let _com = ComScope::enter(self.apartment_mode)?;
        let devices = DeviceEnumerator::new()?.list_devices()?;
        log::debug!("Enumerated {} audio endpoints", devices.len());
        Ok(devices)
    }

    fn open_capture_line(&self, device: &Device) -> Result<Box<dyn NativeLine>, HarnessError> {
        let com = ComScope::enter(self.apartment_mode)?;
        let endpoint = DeviceEnumerator::new()?.device(&device.id)?;

        let unavailable = |call: &str, e: windows::core::Error| HarnessError::ResourceUnavailable {
            device_id: device.id.clone(),
            message: format!("{} failed: {}", call, e),
        };

        unsafe {
            let client: IAudioClient = endpoint
                .Activate(CLSCTX_ALL, None)
                .map_err(|e| unavailable("IMMDevice::Activate", e))?;

            let format = client
                .GetMixFormat()
                .map_err(|e| unavailable("IAudioClient::GetMixFormat", e))?;
            let initialized = client.Initialize(
                AUDCLNT_SHAREMODE_SHARED,
                AUDCLNT_STREAMFLAGS_NOPERSIST,
                BUFFER_DURATION,
                0,
                format,
                None,
            );
            CoTaskMemFree(Some(format as *const _));
            initialized.map_err(|e| unavailable("IAudioClient::Initialize", e))?;

            log::debug!("Opened WASAPI capture line on {}", device.name);
            Ok(Box::new(WasapiLine {
                device_id: device.id.clone(),
                client: Some(client),
                _com: com,
            }))
        }
    }
}

/// An initialized audio client. Fields drop in order, so the client is
/// released before the apartment it lives in.
struct WasapiLine {
    device_id: String,
    client: Option<IAudioClient>,
    _com: ComScope,
}

impl NativeLine for WasapiLine {
    fn close(mut self: Box<Self>) -> Result<(), HarnessError> {
        let client = self.client.take().ok_or_else(|| {
            HarnessError::Backend(format!("line on {} already closed", self.device_id))
        })?;
        unsafe { client.Reset() }.map_err(|e| {
            HarnessError::from(ComError::Call {
                call: "IAudioClient::Reset",
                source: e,
            })
        })?;
        Ok(())
    }
}
