use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::error::HarnessError;

/// Identity of the execution context a step targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContextId {
    /// A dedicated single-threaded queue. Distinct ids run on distinct threads.
    Worker(u32),
    /// The process-wide UI-affine thread.
    UiAffine,
    /// The coordinating thread itself; operations run inline.
    Coordinator,
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Worker(n) => write!(f, "worker-{}", n),
            Self::UiAffine => f.write_str("ui-affine"),
            Self::Coordinator => f.write_str("coordinator"),
        }
    }
}

impl FromStr for ContextId {
    type Err = HarnessError;

    /// Accepts `worker-N`, `wN`, `ui`, `ui-affine`, `main` and `coordinator`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        match lower.as_str() {
            "ui" | "ui-affine" => return Ok(Self::UiAffine),
            "main" | "coordinator" => return Ok(Self::Coordinator),
            _ => {}
        }

        let number = lower
            .strip_prefix("worker-")
            .or_else(|| lower.strip_prefix('w'))
            .ok_or_else(|| HarnessError::ConfigurationFailed(format!("unknown context: {}", s)))?;

        match number.parse::<u32>() {
            Ok(n) if n > 0 => Ok(Self::Worker(n)),
            _ => Err(HarnessError::ConfigurationFailed(format!(
                "worker contexts are numbered from 1: {}",
                s
            ))),
        }
    }
}

/// Side-effecting platform operation suspected of breaking capture lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TriggerKind {
    FileDialog,
    ComInit,
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FileDialog => "file-dialog",
            Self::ComInit => "com-init",
        })
    }
}

impl FromStr for TriggerKind {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "f" | "dialog" | "file-dialog" => Ok(Self::FileDialog),
            "c" | "com" | "com-init" => Ok(Self::ComInit),
            other => Err(HarnessError::ConfigurationFailed(format!("unknown trigger: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    /// Resolve the capture device, open a line on it and close it again.
    RecordAttempt,
    SideEffectTrigger(TriggerKind),
    /// Pause until the operator (or a fake) reports an environment change,
    /// typically a session lock/unlock.
    EnvironmentBarrier,
}

impl Operation {
    pub fn is_barrier(&self) -> bool {
        matches!(self, Self::EnvironmentBarrier)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RecordAttempt => f.write_str("record"),
            Self::SideEffectTrigger(kind) => write!(f, "trigger:{}", kind),
            Self::EnvironmentBarrier => f.write_str("barrier"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScenarioStep {
    pub operation: Operation,
    pub context: ContextId,
}

impl ScenarioStep {
    pub fn record(context: ContextId) -> Self {
        Self {
            operation: Operation::RecordAttempt,
            context,
        }
    }

    pub fn trigger(kind: TriggerKind, context: ContextId) -> Self {
        Self {
            operation: Operation::SideEffectTrigger(kind),
            context,
        }
    }

    /// Barriers always wait on the coordinating thread.
    pub fn barrier() -> Self {
        Self {
            operation: Operation::EnvironmentBarrier,
            context: ContextId::Coordinator,
        }
    }
}

/// Formats in the form accepted by `from_str`.
impl fmt::Display for ScenarioStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operation {
            Operation::RecordAttempt => write!(f, "record@{}", self.context),
            Operation::SideEffectTrigger(kind) => write!(f, "{}@{}", kind, self.context),
            Operation::EnvironmentBarrier => f.write_str("barrier"),
        }
    }
}

impl FromStr for ScenarioStep {
    type Err = HarnessError;

    /// Parses `op@context` (`record@worker-1`, `f@ui`, `com@w2`) or a bare
    /// `barrier` / `b`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        if matches!(token.to_lowercase().as_str(), "b" | "barrier") {
            return Ok(Self::barrier());
        }

        let (op, context) = token.split_once('@').ok_or_else(|| {
            HarnessError::ConfigurationFailed(format!("expected op@context, got: {}", token))
        })?;
        let context: ContextId = context.parse()?;

        match op.trim().to_lowercase().as_str() {
            "r" | "record" => Ok(Self::record(context)),
            other => Ok(Self::trigger(other.parse()?, context)),
        }
    }
}

/// An ordered list of steps whose completions the sequencer totally orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Scenario {
    pub name: String,
    pub description: String,
    pub steps: Vec<ScenarioStep>,
}

impl Scenario {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            steps: Vec::new(),
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn record(mut self, context: ContextId) -> Self {
        self.steps.push(ScenarioStep::record(context));
        self
    }

    pub fn trigger(mut self, kind: TriggerKind, context: ContextId) -> Self {
        self.steps.push(ScenarioStep::trigger(kind, context));
        self
    }

    pub fn barrier(mut self) -> Self {
        self.steps.push(ScenarioStep::barrier());
        self
    }

    /// Builds an ad-hoc scenario from whitespace- or comma-separated steps.
    pub fn parse_steps(name: impl Into<String>, text: &str) -> Result<Self, HarnessError> {
        let steps = text
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<ScenarioStep>, _>>()?;

        if steps.is_empty() {
            return Err(HarnessError::ConfigurationFailed("scenario has no steps".into()));
        }

        Ok(Self {
            name: name.into(),
            description: format!("ad-hoc: {}", text.trim()),
            steps,
        })
    }

    /// Distinct contexts referenced by the steps, in first-use order.
    pub fn contexts(&self) -> Vec<ContextId> {
        let mut seen = Vec::new();
        for step in &self.steps {
            if !seen.contains(&step.context) {
                seen.push(step.context);
            }
        }
        seen
    }

    pub fn record_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.operation == Operation::RecordAttempt)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_context_aliases() {
        assert_eq!("worker-3".parse::<ContextId>().unwrap(), ContextId::Worker(3));
        assert_eq!("W1".parse::<ContextId>().unwrap(), ContextId::Worker(1));
        assert_eq!("ui".parse::<ContextId>().unwrap(), ContextId::UiAffine);
        assert_eq!("main".parse::<ContextId>().unwrap(), ContextId::Coordinator);
        assert!("worker-0".parse::<ContextId>().is_err());
        assert!("gpu".parse::<ContextId>().is_err());
    }

    #[test]
    fn context_display_roundtrips_through_parse() {
        for id in [ContextId::Worker(7), ContextId::UiAffine, ContextId::Coordinator] {
            assert_eq!(id.to_string().parse::<ContextId>().unwrap(), id);
        }
    }

    #[test]
    fn parse_step_list() {
        let scenario =
            Scenario::parse_steps("adhoc", "record@w1, dialog@w1 barrier r@worker-1 com@ui").unwrap();

        assert_eq!(
            scenario.steps,
            vec![
                ScenarioStep::record(ContextId::Worker(1)),
                ScenarioStep::trigger(TriggerKind::FileDialog, ContextId::Worker(1)),
                ScenarioStep::barrier(),
                ScenarioStep::record(ContextId::Worker(1)),
                ScenarioStep::trigger(TriggerKind::ComInit, ContextId::UiAffine),
            ]
        );
        assert_eq!(scenario.record_count(), 2);
    }

    #[test]
    fn step_text_parses_back() {
        let scenario = Scenario::new("text")
            .trigger(TriggerKind::ComInit, ContextId::UiAffine)
            .record(ContextId::Worker(2))
            .barrier()
            .record(ContextId::Coordinator);
        let text: Vec<String> = scenario.steps.iter().map(ToString::to_string).collect();

        assert_eq!(text[0], "com-init@ui-affine");
        assert_eq!(Scenario::parse_steps("text", &text.join(" ")).unwrap().steps, scenario.steps);
    }

    #[test]
    fn parse_rejects_malformed_steps() {
        assert!(Scenario::parse_steps("x", "").is_err());
        assert!(Scenario::parse_steps("x", "record").is_err());
        assert!(Scenario::parse_steps("x", "paint@w1").is_err());
    }

    #[test]
    fn contexts_in_first_use_order() {
        let scenario = Scenario::new("order")
            .record(ContextId::Worker(2))
            .trigger(TriggerKind::ComInit, ContextId::Worker(1))
            .barrier()
            .record(ContextId::Worker(2));

        assert_eq!(
            scenario.contexts(),
            vec![ContextId::Worker(2), ContextId::Worker(1), ContextId::Coordinator]
        );
    }
}
