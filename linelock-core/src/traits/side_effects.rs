use crate::models::config::ApartmentMode;
use crate::models::error::HarnessError;

/// Opaque side-effecting platform operations that precede the defect.
///
/// Both run on the calling thread, so the execution context chosen for a
/// trigger decides which thread the platform attributes it to.
pub trait SideEffects: Send + Sync {
    /// Construct (and immediately discard) a native file dialog.
    ///
    /// Returns a short description of the constructed object for the trace.
    fn construct_dialog(&self) -> Result<String, HarnessError>;

    /// Initialize the COM apartment of the calling thread.
    fn initialize_apartment(&self, mode: ApartmentMode) -> Result<(), HarnessError>;
}
