use std::fmt;
use std::sync::Arc;

use crate::models::device::Device;
use crate::models::error::HarnessError;
use crate::models::state::LineState;
use crate::traits::audio_subsystem::{AudioSubsystem, NativeLine};

/// A capture line on one device and its lifecycle state.
///
/// Owned by the step that created it. The native line inside is `!Send`, so
/// the handle stays on the thread that opened it.
pub struct LineHandle {
    device: Device,
    state: LineState,
    native: Option<Box<dyn NativeLine>>,
}

impl LineHandle {
    pub fn new(device: Device) -> Self {
        Self {
            device,
            state: LineState::Closed,
            native: None,
        }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn state(&self) -> LineState {
        self.state
    }
}

impl fmt::Debug for LineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineHandle")
            .field("device", &self.device.id)
            .field("state", &self.state)
            .finish()
    }
}

/// Acquire/release of capture lines, with failure classification.
#[derive(Clone)]
pub struct LineReservation {
    audio: Arc<dyn AudioSubsystem>,
}

impl LineReservation {
    pub fn new(audio: Arc<dyn AudioSubsystem>) -> Self {
        Self { audio }
    }

    /// Open the line. Transitions: closed → open, or closed → failed.
    ///
    /// A failed handle is terminal; the next attempt needs a fresh handle.
    pub fn acquire(&self, handle: &mut LineHandle) -> Result<(), HarnessError> {
        if handle.state != LineState::Closed {
            return Err(HarnessError::InvalidLineState {
                operation: "acquire",
                state: handle.state,
            });
        }

        match self.audio.open_capture_line(&handle.device) {
            Ok(native) => {
                handle.native = Some(native);
                handle.state = LineState::Open;
                Ok(())
            }
            Err(HarnessError::ResourceUnavailable { device_id, message }) => {
                handle.state = LineState::Failed;
                Err(HarnessError::ResourceUnavailable { device_id, message })
            }
            // Backend failures other than unavailability leave the handle
            // untouched; they abort the run anyway.
            Err(e) => Err(e),
        }
    }

    /// Close the line. Transitions: open → closed.
    pub fn release(&self, handle: &mut LineHandle) -> Result<(), HarnessError> {
        if !handle.state.is_open() {
            return Err(HarnessError::InvalidLineState {
                operation: "release",
                state: handle.state,
            });
        }

        let native = handle.native.take().ok_or(HarnessError::InvalidLineState {
            operation: "release",
            state: handle.state,
        })?;
        handle.state = LineState::Closed;
        native.close()
    }

    /// Scoped acquisition: the returned guard releases the line on every
    /// exit path.
    pub fn reserve(&self, device: &Device) -> Result<ScopedLine<'_>, HarnessError> {
        let mut handle = LineHandle::new(device.clone());
        self.acquire(&mut handle)?;
        Ok(ScopedLine {
            reservation: self,
            handle: Some(handle),
        })
    }
}

/// An open line that is released when dropped.
pub struct ScopedLine<'a> {
    reservation: &'a LineReservation,
    handle: Option<LineHandle>,
}

impl ScopedLine<'_> {
    pub fn device(&self) -> Option<&Device> {
        self.handle.as_ref().map(LineHandle::device)
    }

    /// Release now and surface the close error, if any.
    pub fn close(mut self) -> Result<LineHandle, HarnessError> {
        let mut handle = self.handle.take().ok_or(HarnessError::InvalidLineState {
            operation: "release",
            state: LineState::Closed,
        })?;
        self.reservation.release(&mut handle)?;
        Ok(handle)
    }
}

impl Drop for ScopedLine<'_> {
    fn drop(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            if let Err(e) = self.reservation.release(&mut handle) {
                log::error!("Failed to release line on {}: {}", handle.device.id, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::simulated_platform::SimulatedPlatform;

    fn setup() -> (Arc<SimulatedPlatform>, LineReservation, Device) {
        let platform = Arc::new(SimulatedPlatform::with_default_topology());
        let reservation = LineReservation::new(platform.clone());
        let device = Device::capture("mic-usb", "Microphone (USB Audio Device)");
        (platform, reservation, device)
    }

    #[test]
    fn open_then_close() {
        let (platform, reservation, device) = setup();
        let mut handle = LineHandle::new(device);
        assert_eq!(handle.state(), LineState::Closed);

        reservation.acquire(&mut handle).unwrap();
        assert!(handle.state().is_open());
        assert!(!handle.state().is_terminal());
        assert_eq!(platform.open_line_count(), 1);

        reservation.release(&mut handle).unwrap();
        assert_eq!(handle.state(), LineState::Closed);
        assert_eq!(platform.open_line_count(), 0);

        // a closed handle may be reopened
        reservation.acquire(&mut handle).unwrap();
        reservation.release(&mut handle).unwrap();
    }

    #[test]
    fn unavailable_line_fails_terminally() {
        let (platform, reservation, device) = setup();
        platform.fail_next_opens(1);

        let mut handle = LineHandle::new(device);
        let err = reservation.acquire(&mut handle).unwrap_err();
        assert!(matches!(err, HarnessError::ResourceUnavailable { ref device_id, .. } if device_id == "mic-usb"));
        assert_eq!(handle.state(), LineState::Failed);
        assert!(handle.state().is_terminal());

        // failed is terminal even though the platform would now succeed
        assert!(matches!(
            reservation.acquire(&mut handle),
            Err(HarnessError::InvalidLineState { operation: "acquire", state: LineState::Failed })
        ));
    }

    #[test]
    fn release_requires_open_line() {
        let (platform, reservation, device) = setup();

        let mut closed = LineHandle::new(device.clone());
        assert_eq!(
            reservation.release(&mut closed).unwrap_err().kind(),
            crate::models::error::ErrorKind::InvalidLineState
        );

        platform.fail_next_opens(1);
        let mut failed = LineHandle::new(device);
        let _ = reservation.acquire(&mut failed);
        assert!(matches!(
            reservation.release(&mut failed),
            Err(HarnessError::InvalidLineState { operation: "release", state: LineState::Failed })
        ));
    }

    #[test]
    fn open_twice_is_rejected() {
        let (_platform, reservation, device) = setup();
        let mut handle = LineHandle::new(device);
        reservation.acquire(&mut handle).unwrap();
        assert!(matches!(
            reservation.acquire(&mut handle),
            Err(HarnessError::InvalidLineState { operation: "acquire", state: LineState::Open })
        ));
        reservation.release(&mut handle).unwrap();
    }

    #[test]
    fn scoped_line_releases_on_drop() {
        let (platform, reservation, device) = setup();
        {
            let line = reservation.reserve(&device).unwrap();
            assert_eq!(line.device().map(|d| d.id.as_str()), Some("mic-usb"));
            assert_eq!(platform.open_line_count(), 1);
        }
        assert_eq!(platform.open_line_count(), 0);

        let handle = reservation.reserve(&device).unwrap().close().unwrap();
        assert_eq!(handle.state(), LineState::Closed);
        assert_eq!(platform.open_line_count(), 0);
    }

    #[test]
    fn scoped_line_releases_when_step_panics() {
        let (platform, reservation, device) = setup();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _line = reservation.reserve(&device).unwrap();
            panic!("step abandoned");
        }));
        assert!(result.is_err());
        assert_eq!(platform.open_line_count(), 0);
    }
}
