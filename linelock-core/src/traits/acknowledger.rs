use crate::models::error::HarnessError;

/// What a barrier is waiting for, shown to whoever acknowledges it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarrierPrompt {
    pub step_index: usize,
    pub message: String,
}

impl BarrierPrompt {
    pub fn lock_unlock(step_index: usize) -> Self {
        Self {
            step_index,
            message: "Please lock / unlock screen and press Enter to proceed".into(),
        }
    }
}

/// Source of environment-change acknowledgments for barrier steps.
///
/// Waits are unbounded; an operator may take as long as needed.
pub trait BarrierAcknowledger: Send + Sync {
    fn await_acknowledgment(&self, prompt: &BarrierPrompt) -> Result<(), HarnessError>;
}
