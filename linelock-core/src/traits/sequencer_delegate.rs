use crate::models::error::HarnessError;
use crate::models::outcome::Outcome;
use crate::models::scenario::ScenarioStep;
use crate::traits::acknowledger::BarrierPrompt;

/// Event delegate for scenario progress.
///
/// All methods are called from the coordinating thread, between steps,
/// never concurrently with a step.
pub trait SequencerDelegate: Send + Sync {
    /// Called right before a step is submitted to its context.
    fn on_step_started(&self, index: usize, step: &ScenarioStep);

    /// Called before the sequencer blocks on a barrier acknowledgment.
    fn on_barrier(&self, prompt: &BarrierPrompt);

    /// Called once the step's outcome has been appended to the trace.
    fn on_step_finished(&self, outcome: &Outcome);

    /// Called when a fatal error aborts the run.
    fn on_aborted(&self, index: usize, error: &HarnessError);
}
