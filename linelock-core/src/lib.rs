//! # linelock-core
//!
//! Platform-agnostic harness for reproducing capture lines that stop opening
//! after the desktop session is locked and unlocked.
//!
//! Scenarios are ordered lists of record attempts and side-effect triggers
//! placed on named execution contexts, separated by barriers at which the
//! operator locks and unlocks the session. Platform backends (the in-process
//! simulator here, WASAPI in `linelock-windows`) implement the
//! `AudioSubsystem` and `SideEffects` traits.
//!
//! ## Architecture
//!
//! ```text
//! linelock-core (this crate)
//! ├── traits/       ← AudioSubsystem, SideEffects, BarrierAcknowledger, SequencerDelegate
//! ├── models/       ← HarnessError, LineState, Device, Scenario, Outcome, HarnessConfig
//! ├── processing/   ← DeviceResolver, LineReservation
//! ├── session/      ← ExecutionContext, ScenarioSequencer, catalog, command loop
//! ├── report/       ← ResultReporter
//! └── simulation/   ← SimulatedPlatform
//! ```

pub mod models;
pub mod processing;
pub mod report;
pub mod session;
pub mod simulation;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use models::config::{AcknowledgmentMode, ApartmentMode, HarnessConfig};
pub use models::device::Device;
pub use models::error::{ErrorKind, HarnessError};
pub use models::outcome::{Outcome, ScenarioTrace};
pub use models::scenario::{ContextId, Operation, Scenario, ScenarioStep, TriggerKind};
pub use models::state::LineState;
pub use processing::device_resolver::DeviceResolver;
pub use processing::line_reservation::{LineHandle, LineReservation, ScopedLine};
pub use report::reporter::ResultReporter;
pub use session::acknowledge::{AutoAcknowledger, ChannelAcknowledger, LineAcknowledger};
pub use session::console::{Command, CommandLoop, ConsoleSettings};
pub use session::context::{ContextPool, ExecutionContext};
pub use session::sequencer::{PlatformBindings, ScenarioSequencer};
pub use simulation::simulated_platform::{DefectModel, SimulatedLockCycle, SimulatedPlatform};
pub use traits::acknowledger::{BarrierAcknowledger, BarrierPrompt};
pub use traits::audio_subsystem::{AudioSubsystem, NativeLine};
pub use traits::sequencer_delegate::SequencerDelegate;
pub use traits::side_effects::SideEffects;
