use crate::models::error::HarnessError;
use crate::models::outcome::{Outcome, ScenarioTrace};

/// Renders outcome traces for manual inspection.
///
/// Pure formatting: one line per outcome, in step order.
pub struct ResultReporter;

impl ResultReporter {
    pub fn render(outcomes: &[Outcome]) -> String {
        outcomes
            .iter()
            .map(Self::render_line)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn render_line(outcome: &Outcome) -> String {
        let status = if outcome.is_barrier() {
            "PAUSE"
        } else if outcome.succeeded {
            "PASS"
        } else {
            "FAIL"
        };

        let mut line = format!(
            "#{:02} {:<11} {:<24} {:<18} {:<5} {:>8.1}ms",
            outcome.step_index + 1,
            outcome.context.to_string(),
            outcome.thread_name,
            outcome.operation.to_string(),
            status,
            outcome.duration_ms,
        );

        if let Some(name) = &outcome.device_name {
            line.push_str(&format!(" device=\"{}\"", name));
        }
        if let Some(note) = &outcome.note {
            line.push_str(&format!(" note=\"{}\"", note));
        }
        if let (Some(kind), Some(detail)) = (&outcome.error_kind, &outcome.error_detail) {
            line.push_str(&format!(" error={}: {}", kind, detail));
        }
        line
    }

    /// Header, per-step lines and pass/fail counts.
    pub fn summary(trace: &ScenarioTrace) -> String {
        format!(
            "scenario {} (run {}, started {})\n{}\n{} passed, {} failed",
            trace.scenario,
            trace.run_id,
            trace.started_at.to_rfc3339(),
            Self::render(&trace.outcomes),
            trace.passed(),
            trace.failed()
        )
    }

    pub fn to_json(trace: &ScenarioTrace) -> Result<String, HarnessError> {
        serde_json::to_string_pretty(trace)
            .map_err(|e| HarnessError::Backend(format!("failed to serialize trace: {}", e)))
    }
}
