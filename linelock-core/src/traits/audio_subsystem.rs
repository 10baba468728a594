use crate::models::device::Device;
use crate::models::error::HarnessError;

/// An open capture line held by the native audio subsystem.
///
/// Deliberately not `Send`: a line lives and dies on the thread that opened
/// it and cannot be handed to another execution context.
pub trait NativeLine {
    /// Close the line and release the device session.
    fn close(self: Box<Self>) -> Result<(), HarnessError>;
}

/// Interface to the platform's audio device/line APIs.
///
/// Implemented by:
/// - `SimulatedPlatform` (tests, non-Windows hosts)
/// - `WasapiAudioSubsystem` (Windows)
pub trait AudioSubsystem: Send + Sync {
    /// All endpoints in the platform's enumeration order.
    fn enumerate(&self) -> Result<Vec<Device>, HarnessError>;

    /// Open a capture line on `device`.
    ///
    /// Unavailability of the device must be reported as
    /// [`HarnessError::ResourceUnavailable`]; any other error aborts the
    /// scenario.
    fn open_capture_line(&self, device: &Device) -> Result<Box<dyn NativeLine>, HarnessError>;
}
