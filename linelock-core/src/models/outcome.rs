use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::device::Device;
use super::error::{ErrorKind, HarnessError};
use super::scenario::{ContextId, Operation};

/// Result of one executed scenario step. Immutable once appended to a trace.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub step_index: usize,
    pub context: ContextId,
    /// Name of the OS thread that actually executed the step.
    pub thread_name: String,
    pub operation: Operation,
    /// Always `true` for barriers, which carry no pass/fail meaning.
    pub succeeded: bool,
    pub error_kind: Option<ErrorKind>,
    pub error_detail: Option<String>,
    pub device_name: Option<String>,
    pub device_id: Option<String>,
    /// Free-form note from the operation (e.g. the constructed dialog handle).
    pub note: Option<String>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: f64,
    #[serde(skip)]
    pub started: Instant,
    #[serde(skip)]
    pub finished: Instant,
}

impl Outcome {
    /// A passing outcome with no device columns; refine with the builders.
    pub fn new(
        step_index: usize,
        context: ContextId,
        thread_name: impl Into<String>,
        operation: Operation,
        started: Instant,
        finished: Instant,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            step_index,
            context,
            thread_name: thread_name.into(),
            operation,
            succeeded: true,
            error_kind: None,
            error_detail: None,
            device_name: None,
            device_id: None,
            note: None,
            started_at,
            duration_ms: finished.saturating_duration_since(started).as_secs_f64() * 1000.0,
            started,
            finished,
        }
    }

    pub fn is_barrier(&self) -> bool {
        self.operation.is_barrier()
    }

    pub fn failed(&self) -> bool {
        !self.succeeded
    }

    /// Applies a device snapshot to the device columns.
    pub fn with_device(mut self, device: Option<&Device>) -> Self {
        if let Some(device) = device {
            self.device_name = Some(device.name.clone());
            self.device_id = Some(device.id.clone());
        }
        self
    }

    pub fn with_note(mut self, note: Option<String>) -> Self {
        self.note = note;
        self
    }

    pub fn with_error(mut self, error: &HarnessError) -> Self {
        self.succeeded = false;
        self.error_kind = Some(error.kind());
        self.error_detail = Some(error.to_string());
        self
    }
}

/// Ordered outcomes of one scenario run.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioTrace {
    pub run_id: String,
    pub scenario: String,
    pub started_at: DateTime<Utc>,
    pub outcomes: Vec<Outcome>,
}

impl ScenarioTrace {
    pub fn new(scenario: &str) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            scenario: scenario.to_string(),
            started_at: Utc::now(),
            outcomes: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, outcome: Outcome) {
        debug_assert_eq!(outcome.step_index, self.outcomes.len());
        self.outcomes.push(outcome);
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn passed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| !o.is_barrier() && o.succeeded)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.failed()).count()
    }

    pub fn last(&self) -> Option<&Outcome> {
        self.outcomes.last()
    }
}
