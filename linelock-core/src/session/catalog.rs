//! Built-in scenarios covering the orderings of interest.
//!
//! Every scenario is parameterized by the trigger under suspicion, so the
//! same ordering can be replayed with a file dialog or with COM
//! initialization.

use crate::models::scenario::{ContextId, Scenario, TriggerKind};

const W1: ContextId = ContextId::Worker(1);
const W2: ContextId = ContextId::Worker(2);

pub fn catalog(trigger: TriggerKind) -> Vec<Scenario> {
    vec![
        Scenario::new("record-then-trigger-same-worker")
            .describe("audio used before the trigger, both on worker-1")
            .record(W1)
            .trigger(trigger, W1)
            .barrier()
            .record(W1),
        Scenario::new("record-then-trigger-other-worker")
            .describe("audio first used on worker-2, trigger and re-check on worker-1")
            .record(W2)
            .trigger(trigger, W1)
            .barrier()
            .record(W1),
        Scenario::new("record-then-trigger-recheck-recorder")
            .describe("audio first used on worker-2, trigger on worker-1, re-check on worker-2")
            .record(W2)
            .trigger(trigger, W1)
            .barrier()
            .record(W2),
        Scenario::new("trigger-then-record-same-worker")
            .describe("trigger before any audio use, both on worker-1")
            .trigger(trigger, W1)
            .record(W1)
            .barrier()
            .record(W1),
        Scenario::new("trigger-then-record-other-worker")
            .describe("trigger on worker-1 before audio is first used on worker-2")
            .trigger(trigger, W1)
            .record(W2)
            .barrier()
            .record(W1),
        Scenario::new("trigger-on-both-workers")
            .describe("trigger on worker-1, audio on worker-2, then trigger on worker-2 too")
            .trigger(trigger, W1)
            .record(W2)
            .trigger(trigger, W2)
            .barrier()
            .record(W2)
            .record(W1),
        Scenario::new("ui-thread-record-then-trigger")
            .describe("record and trigger as separate UI-thread invocations")
            .record(ContextId::UiAffine)
            .trigger(trigger, ContextId::UiAffine)
            .barrier()
            .record(ContextId::UiAffine),
        Scenario::new("standalone-trigger-then-record")
            .describe("single-threaded: trigger, lock/unlock, then the first recording")
            .trigger(trigger, ContextId::Coordinator)
            .barrier()
            .record(ContextId::Coordinator),
        Scenario::new("standalone-record-then-trigger")
            .describe("single-threaded: record, trigger, lock/unlock, record again")
            .record(ContextId::Coordinator)
            .trigger(trigger, ContextId::Coordinator)
            .barrier()
            .record(ContextId::Coordinator),
    ]
}

pub fn find(name: &str, trigger: TriggerKind) -> Option<Scenario> {
    catalog(trigger).into_iter().find(|s| s.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::models::config::HarnessConfig;
    use crate::models::scenario::Operation;
    use crate::session::acknowledge::AutoAcknowledger;
    use crate::session::sequencer::{PlatformBindings, ScenarioSequencer};
    use crate::simulation::simulated_platform::{SimulatedLockCycle, SimulatedPlatform};

    fn record_results(scenario: &Scenario) -> Vec<bool> {
        let platform = Arc::new(SimulatedPlatform::with_default_topology());
        let bindings = PlatformBindings {
            audio: platform.clone(),
            side_effects: platform.clone(),
            acknowledger: Arc::new(SimulatedLockCycle::new(
                Arc::new(AutoAcknowledger::immediate()),
                platform.clone(),
            )),
        };
        let trace = ScenarioSequencer::new(bindings, &HarnessConfig::default())
            .run(scenario)
            .unwrap();

        assert_eq!(trace.len(), scenario.steps.len());
        trace
            .outcomes
            .iter()
            .filter(|o| o.operation == Operation::RecordAttempt)
            .map(|o| o.succeeded)
            .collect()
    }

    fn check(trigger: TriggerKind, expected: &[(&str, &[bool])]) {
        let scenarios = catalog(trigger);
        assert_eq!(scenarios.len(), expected.len());
        for (name, records) in expected {
            let scenario = find(name, trigger).unwrap();
            assert_eq!(record_results(&scenario), *records, "{} with {}", name, trigger);
        }
    }

    #[test]
    fn names_are_unique() {
        let mut names: Vec<_> = catalog(TriggerKind::FileDialog).into_iter().map(|s| s.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), catalog(TriggerKind::ComInit).len());
        assert!(find("no-such-scenario", TriggerKind::ComInit).is_none());
    }

    #[test]
    fn file_dialog_catalog_on_simulated_platform() {
        check(
            TriggerKind::FileDialog,
            &[
                ("record-then-trigger-same-worker", &[true, false]),
                ("record-then-trigger-other-worker", &[true, false]),
                ("record-then-trigger-recheck-recorder", &[true, false]),
                ("trigger-then-record-same-worker", &[true, true]),
                ("trigger-then-record-other-worker", &[true, true]),
                ("trigger-on-both-workers", &[true, true, true]),
                ("ui-thread-record-then-trigger", &[true, false]),
                ("standalone-trigger-then-record", &[true]),
                ("standalone-record-then-trigger", &[true, false]),
            ],
        );
    }

    #[test]
    fn com_catalog_on_simulated_platform() {
        check(
            TriggerKind::ComInit,
            &[
                ("record-then-trigger-same-worker", &[true, false]),
                ("record-then-trigger-other-worker", &[true, false]),
                ("record-then-trigger-recheck-recorder", &[true, true]),
                ("trigger-then-record-same-worker", &[true, true]),
                ("trigger-then-record-other-worker", &[true, false]),
                ("trigger-on-both-workers", &[true, false, false]),
                ("ui-thread-record-then-trigger", &[true, false]),
                ("standalone-trigger-then-record", &[true]),
                ("standalone-record-then-trigger", &[true, false]),
            ],
        );
    }
}
