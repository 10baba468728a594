//! Windows audio endpoint enumeration via the MMDevice API.
//!
//! Capture endpoints come first with the default one at their head, so the
//! resolver's "skip the first capture device" rule passes over the primary
//! driver the same way it does on the simulator.

use windows::core::*;
use windows::Win32::Devices::FunctionDiscovery::PKEY_Device_FriendlyName;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;

use linelock_core::models::device::Device;

use crate::com::ComError;

/// Audio endpoint enumerator using the Windows MMDevice API.
pub struct DeviceEnumerator {
    enumerator: IMMDeviceEnumerator,
}

impl DeviceEnumerator {
    /// Requires COM to be initialized on the calling thread.
    pub fn new() -> std::result::Result<Self, ComError> {
        let enumerator: IMMDeviceEnumerator =
            unsafe { CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL) }
                .map_err(ComError::call("CoCreateInstance(MMDeviceEnumerator)"))?;
        Ok(Self { enumerator })
    }

    /// Active capture endpoints, then active render endpoints.
    pub fn list_devices(&self) -> std::result::Result<Vec<Device>, ComError> {
        let mut capture = self.list(eCapture)?;
        capture.sort_by_key(|d| !d.is_default_capture);
        capture.extend(self.list(eRender)?);
        Ok(capture)
    }

    pub fn device(&self, id: &str) -> std::result::Result<IMMDevice, ComError> {
        let wide: Vec<u16> = id.encode_utf16().chain(std::iter::once(0)).collect();
        unsafe { self.enumerator.GetDevice(PCWSTR(wide.as_ptr())) }
            .map_err(ComError::call("IMMDeviceEnumerator::GetDevice"))
    }

    fn list(&self, data_flow: EDataFlow) -> std::result::Result<Vec<Device>, ComError> {
        unsafe {
            let collection = self
                .enumerator
                .EnumAudioEndpoints(data_flow, DEVICE_STATE_ACTIVE)
                .map_err(ComError::call("EnumAudioEndpoints"))?;
            let count = collection
                .GetCount()
                .map_err(ComError::call("IMMDeviceCollection::GetCount"))?;

            let default_id = if data_flow == eCapture {
                self.enumerator
                    .GetDefaultAudioEndpoint(eCapture, eConsole)
                    .ok()
                    .and_then(|d| endpoint_id(&d))
            } else {
                None
            };

            let mut devices = Vec::new();
            for i in 0..count {
                let Ok(endpoint) = collection.Item(i) else {
                    continue;
                };
                let Some(id) = endpoint_id(&endpoint) else {
                    continue;
                };
                let name = friendly_name(&endpoint).unwrap_or_else(|| format!("Device {}", i));

                let device = if data_flow == eCapture {
                    let device = Device::capture(&id, &name);
                    if default_id.as_deref() == Some(id.as_str()) {
                        device.as_default()
                    } else {
                        device
                    }
                } else {
                    Device::render(&id, &name)
                };
                devices.push(device);
            }
            Ok(devices)
        }
    }
}

fn endpoint_id(endpoint: &IMMDevice) -> Option<String> {
    unsafe {
        let id = endpoint.GetId().ok()?;
        let text = id.to_string().ok();
        CoTaskMemFree(Some(id.0 as *const _));
        text
    }
}

fn friendly_name(endpoint: &IMMDevice) -> Option<String> {
    unsafe {
        let store = endpoint.OpenPropertyStore(STGM_READ).ok()?;
        let value = store.GetValue(&PKEY_Device_FriendlyName).ok()?;
        let name = value.to_string();
        (!name.is_empty()).then_some(name)
    }
}
