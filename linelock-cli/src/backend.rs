//! Platform selection for the CLI.

use std::io::{self, BufRead, BufReader, Write};
use std::sync::Arc;

use anyhow::Result;
use clap::ValueEnum;

use linelock_core::{
    AcknowledgmentMode, AutoAcknowledger, BarrierAcknowledger, DefectModel, HarnessConfig,
    LineAcknowledger, PlatformBindings, SimulatedLockCycle, SimulatedPlatform,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// In-process simulation of the observed locking defects
    Simulated,
    /// WASAPI, shell dialogs and COM on the local Windows session
    Native,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Defect {
    /// Both the file dialog and the COM apartment defects
    Observed,
    /// Only the file dialog defect
    FileDialog,
    /// Only the COM apartment defect
    Com,
    /// Lock cycles never break lines
    None,
}

impl From<Defect> for DefectModel {
    fn from(defect: Defect) -> Self {
        match defect {
            Defect::Observed => DefectModel::observed(),
            Defect::FileDialog => DefectModel {
                file_dialog: true,
                com_apartment: false,
            },
            Defect::Com => DefectModel {
                file_dialog: false,
                com_apartment: true,
            },
            Defect::None => DefectModel::none(),
        }
    }
}

fn acknowledger<R, W>(config: &HarnessConfig, input: R, prompts: W) -> Arc<dyn BarrierAcknowledger>
where
    R: BufRead + Send + 'static,
    W: Write + Send + 'static,
{
    match config.acknowledgment {
        AcknowledgmentMode::Prompt => Arc::new(LineAcknowledger::new(input, prompts)),
        AcknowledgmentMode::Auto { delay } => Arc::new(AutoAcknowledger::new(delay)),
    }
}

/// Wire the selected platform to the configured acknowledgment mode.
///
/// Barrier prompts go to stderr so stdout carries only results. On the
/// simulated backend every acknowledged barrier also performs a simulated
/// session lock/unlock.
pub fn bindings(backend: Backend, defect: Defect, config: &HarnessConfig) -> Result<PlatformBindings> {
    bindings_with(backend, defect, config, BufReader::new(io::stdin()), io::stderr())
}

fn bindings_with<R, W>(
    backend: Backend,
    defect: Defect,
    config: &HarnessConfig,
    input: R,
    prompts: W,
) -> Result<PlatformBindings>
where
    R: BufRead + Send + 'static,
    W: Write + Send + 'static,
{
    let acknowledger = acknowledger(config, input, prompts);
    match backend {
        Backend::Simulated => {
            let platform =
                Arc::new(SimulatedPlatform::with_default_topology().with_defect(defect.into()));
            Ok(PlatformBindings {
                audio: platform.clone(),
                side_effects: platform.clone(),
                acknowledger: Arc::new(SimulatedLockCycle::new(acknowledger, platform)),
            })
        }
        Backend::Native => native(config, acknowledger),
    }
}

#[cfg(target_os = "windows")]
fn native(config: &HarnessConfig, acknowledger: Arc<dyn BarrierAcknowledger>) -> Result<PlatformBindings> {
    use linelock_windows::{WasapiAudioSubsystem, WindowsShell};

    Ok(PlatformBindings {
        audio: Arc::new(WasapiAudioSubsystem::new(config.apartment_mode)),
        side_effects: Arc::new(WindowsShell::new()),
        acknowledger,
    })
}

#[cfg(not(target_os = "windows"))]
fn native(_config: &HarnessConfig, _acknowledger: Arc<dyn BarrierAcknowledger>) -> Result<PlatformBindings> {
    anyhow::bail!("the native backend is only available on Windows; use --backend simulated")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use linelock_core::session::catalog;
    use linelock_core::{ResultReporter, ScenarioSequencer, TriggerKind};
    use parking_lot::Mutex;

    /// Cloneable in-memory writer standing in for stderr.
    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn prompted_barrier_keeps_json_trace_clean() {
        let config = HarnessConfig::default();
        let prompts = SharedBuffer::default();
        let bindings = bindings_with(
            Backend::Simulated,
            Defect::Observed,
            &config,
            Cursor::new("\n"),
            prompts.clone(),
        )
        .unwrap();

        let scenario =
            catalog::find("record-then-trigger-same-worker", TriggerKind::FileDialog).unwrap();
        let trace = ScenarioSequencer::new(bindings, &config).run(&scenario).unwrap();
        let json = ResultReporter::to_json(&trace).unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["outcomes"].as_array().unwrap().len(), scenario.steps.len());
        assert!(!json.contains("Please lock"));

        let prompted = String::from_utf8(prompts.0.lock().clone()).unwrap();
        assert!(prompted.contains("Please lock / unlock screen and press Enter to proceed"));
    }

    #[test]
    fn prompt_without_input_fails_the_barrier() {
        let config = HarnessConfig::default();
        let bindings = bindings_with(
            Backend::Simulated,
            Defect::Observed,
            &config,
            Cursor::new(""),
            SharedBuffer::default(),
        )
        .unwrap();

        let scenario = linelock_core::Scenario::new("barrier-only").barrier();
        assert!(matches!(
            ScenarioSequencer::new(bindings, &config).run(&scenario),
            Err(linelock_core::HarnessError::Acknowledgment(_))
        ));
    }
}
