use std::sync::Arc;
use std::thread;

use crate::models::config::{ApartmentMode, HarnessConfig};
use crate::models::device::Device;
use crate::models::error::HarnessError;
use crate::models::outcome::{Outcome, ScenarioTrace};
use crate::models::scenario::{Operation, Scenario, ScenarioStep, TriggerKind};
use crate::processing::device_resolver::DeviceResolver;
use crate::processing::line_reservation::LineReservation;
use crate::session::context::{timed, ContextPool};
use crate::traits::acknowledger::{BarrierAcknowledger, BarrierPrompt};
use crate::traits::audio_subsystem::AudioSubsystem;
use crate::traits::sequencer_delegate::SequencerDelegate;
use crate::traits::side_effects::SideEffects;

/// The external collaborators a scenario runs against.
#[derive(Clone)]
pub struct PlatformBindings {
    pub audio: Arc<dyn AudioSubsystem>,
    pub side_effects: Arc<dyn SideEffects>,
    pub acknowledger: Arc<dyn BarrierAcknowledger>,
}

/// What one operation produced on its context.
struct StepReport {
    device: Option<Device>,
    note: Option<String>,
    result: Result<(), HarnessError>,
}

/// The part of the sequencer that is moved into context threads.
#[derive(Clone)]
struct StepExecutor {
    resolver: DeviceResolver,
    reservation: LineReservation,
    side_effects: Arc<dyn SideEffects>,
    apartment_mode: ApartmentMode,
}

impl StepExecutor {
    fn execute(&self, operation: Operation) -> StepReport {
        match operation {
            Operation::RecordAttempt => self.record_attempt(),
            Operation::SideEffectTrigger(kind) => self.trigger(kind),
            Operation::EnvironmentBarrier => StepReport {
                device: None,
                note: None,
                result: Err(HarnessError::ConfigurationFailed(
                    "barriers cannot run inside a context".into(),
                )),
            },
        }
    }

    /// Resolve, open, close. The line is released on every exit path.
    fn record_attempt(&self) -> StepReport {
        let current = thread::current();
        let thread_name = current.name().unwrap_or("unnamed");

        let device = match self.resolver.resolve() {
            Ok(device) => device,
            Err(e) => {
                return StepReport {
                    device: None,
                    note: None,
                    result: Err(e),
                }
            }
        };

        log::info!("Recording on {} with {}", thread_name, device.name);
        let result = self
            .reservation
            .reserve(&device)
            .and_then(|line| line.close())
            .map(|_| ());
        if result.is_ok() {
            log::info!("Recording stopped on {}", thread_name);
        }

        StepReport {
            device: Some(device),
            note: None,
            result,
        }
    }

    fn trigger(&self, kind: TriggerKind) -> StepReport {
        let current = thread::current();
        let thread_name = current.name().unwrap_or("unnamed");

        let (note, result) = match kind {
            TriggerKind::FileDialog => match self.side_effects.construct_dialog() {
                Ok(description) => {
                    log::info!("File dialog created on {}: {}", thread_name, description);
                    (Some(description), Ok(()))
                }
                Err(e) => (None, Err(e)),
            },
            TriggerKind::ComInit => {
                log::info!("Initializing COM ({}) on {}", self.apartment_mode, thread_name);
                let result = self.side_effects.initialize_apartment(self.apartment_mode);
                (Some(format!("apartment {}", self.apartment_mode)), result)
            }
        };

        StepReport {
            device: None,
            note,
            result,
        }
    }
}

/// Runs scenario steps one at a time across execution contexts.
///
/// Step N's completion always precedes step N+1's start, whichever contexts
/// they target. A record attempt that finds its line unavailable is recorded
/// and the run continues; any other error aborts it.
pub struct ScenarioSequencer {
    executor: StepExecutor,
    acknowledger: Arc<dyn BarrierAcknowledger>,
    delegate: Option<Arc<dyn SequencerDelegate>>,
}

impl ScenarioSequencer {
    pub fn new(bindings: PlatformBindings, config: &HarnessConfig) -> Self {
        let resolver = DeviceResolver::new(Arc::clone(&bindings.audio))
            .with_override(config.device_override.clone());
        Self {
            executor: StepExecutor {
                resolver,
                reservation: LineReservation::new(bindings.audio),
                side_effects: bindings.side_effects,
                apartment_mode: config.apartment_mode,
            },
            acknowledger: bindings.acknowledger,
            delegate: None,
        }
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn SequencerDelegate>) {
        self.delegate = Some(delegate);
    }

    pub fn resolver(&self) -> &DeviceResolver {
        &self.executor.resolver
    }

    pub fn run(&self, scenario: &Scenario) -> Result<ScenarioTrace, HarnessError> {
        if scenario.steps.is_empty() {
            return Err(HarnessError::ConfigurationFailed(format!(
                "scenario {} has no steps",
                scenario.name
            )));
        }

        log::info!("Running scenario {} ({} steps)", scenario.name, scenario.steps.len());
        let pool = ContextPool::for_contexts(&scenario.contexts())?;
        let mut trace = ScenarioTrace::new(&scenario.name);

        for (index, step) in scenario.steps.iter().enumerate() {
            let outcome = self.execute_step(&pool, index, step)?;
            trace.push(outcome);
        }

        log::info!(
            "Scenario {} finished: {} passed, {} failed",
            scenario.name,
            trace.passed(),
            trace.failed()
        );
        Ok(trace)
    }

    /// Execute a single step and wait for its outcome.
    ///
    /// `pool` must already contain the step's context.
    pub fn execute_step(
        &self,
        pool: &ContextPool,
        index: usize,
        step: &ScenarioStep,
    ) -> Result<Outcome, HarnessError> {
        if let Some(delegate) = &self.delegate {
            delegate.on_step_started(index, step);
        }

        let result = if step.operation.is_barrier() {
            self.await_barrier(index, step)
        } else {
            self.submit_operation(pool, index, step)
        };

        match result {
            Ok(outcome) => {
                if let Some(delegate) = &self.delegate {
                    delegate.on_step_finished(&outcome);
                }
                Ok(outcome)
            }
            Err(e) => {
                log::error!("Step {} ({} on {}) aborted the run: {}", index + 1, step.operation, step.context, e);
                if let Some(delegate) = &self.delegate {
                    delegate.on_aborted(index, &e);
                }
                Err(e)
            }
        }
    }

    fn await_barrier(&self, index: usize, step: &ScenarioStep) -> Result<Outcome, HarnessError> {
        let prompt = BarrierPrompt::lock_unlock(index);
        if let Some(delegate) = &self.delegate {
            delegate.on_barrier(&prompt);
        }

        let waited = timed(|| self.acknowledger.await_acknowledgment(&prompt));
        waited.value?;

        Ok(Outcome::new(
            index,
            step.context,
            waited.thread_name,
            step.operation,
            waited.started,
            waited.finished,
            waited.started_at,
        ))
    }

    fn submit_operation(
        &self,
        pool: &ContextPool,
        index: usize,
        step: &ScenarioStep,
    ) -> Result<Outcome, HarnessError> {
        let executor = self.executor.clone();
        let operation = step.operation;
        let executed = pool.run(step.context, move || executor.execute(operation))?;

        let report = executed.value;
        let outcome = Outcome::new(
            index,
            step.context,
            executed.thread_name,
            step.operation,
            executed.started,
            executed.finished,
            executed.started_at,
        )
        .with_device(report.device.as_ref())
        .with_note(report.note);

        match report.result {
            Ok(()) => Ok(outcome),
            Err(e) if e.is_studied() && step.operation == Operation::RecordAttempt => {
                log::warn!(
                    "Step {} failed on {} ({}): {}",
                    index + 1,
                    outcome.thread_name,
                    outcome.device_name.as_deref().unwrap_or("no device"),
                    e
                );
                Ok(outcome.with_error(&e))
            }
            Err(e) => Err(e),
        }
    }
}
