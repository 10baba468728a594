//! Interactive command loop for manual experiments.
//!
//! Reads one token per line and submits the matching operation to the
//! selected context. The operator locks and unlocks the session between
//! commands, so no barrier command exists.

use std::io::{BufRead, Write};
use std::ops::ControlFlow;

use crate::models::error::HarnessError;
use crate::models::outcome::ScenarioTrace;
use crate::models::scenario::{ContextId, Operation, ScenarioStep, TriggerKind};
use crate::report::reporter::ResultReporter;
use crate::session::context::ContextPool;
use crate::session::sequencer::ScenarioSequencer;

pub const QUIT_COMMAND: &str = "q";
pub const RECORD_COMMAND: &str = "r";
pub const FILE_DIALOG_COMMAND: &str = "f";
pub const COM_INIT_COMMAND: &str = "c";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Record,
    FileDialog,
    ComInit,
    Quit,
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        match line.trim() {
            RECORD_COMMAND => Self::Record,
            FILE_DIALOG_COMMAND => Self::FileDialog,
            COM_INIT_COMMAND => Self::ComInit,
            QUIT_COMMAND => Self::Quit,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn operation(&self) -> Option<Operation> {
        match self {
            Self::Record => Some(Operation::RecordAttempt),
            Self::FileDialog => Some(Operation::SideEffectTrigger(TriggerKind::FileDialog)),
            Self::ComInit => Some(Operation::SideEffectTrigger(TriggerKind::ComInit)),
            Self::Quit | Self::Unknown(_) => None,
        }
    }
}

/// Settings handed to every command dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsoleSettings {
    pub context: ContextId,
}

pub fn help_line() -> String {
    format!(
        "Press {} to quit, {} to record, {} to create a file dialog, {} to initialize COM.",
        QUIT_COMMAND, RECORD_COMMAND, FILE_DIALOG_COMMAND, COM_INIT_COMMAND
    )
}

fn io_error(e: std::io::Error) -> HarnessError {
    HarnessError::Backend(format!("console I/O failed: {}", e))
}

/// Command loop state: the contexts created so far and the outcomes recorded.
pub struct CommandLoop<'a> {
    sequencer: &'a ScenarioSequencer,
    pool: ContextPool,
    trace: ScenarioTrace,
}

impl<'a> CommandLoop<'a> {
    pub fn new(sequencer: &'a ScenarioSequencer) -> Self {
        Self {
            sequencer,
            pool: ContextPool::new(),
            trace: ScenarioTrace::new("console"),
        }
    }

    /// Execute one command. Fatal errors end the loop.
    pub fn dispatch<W: Write>(
        &mut self,
        command: &Command,
        settings: &ConsoleSettings,
        out: &mut W,
    ) -> Result<ControlFlow<()>, HarnessError> {
        let operation = match command {
            Command::Quit => return Ok(ControlFlow::Break(())),
            Command::Unknown(token) => {
                writeln!(out, "Unknown command: {}", token).map_err(io_error)?;
                return Ok(ControlFlow::Continue(()));
            }
            other => match other.operation() {
                Some(operation) => operation,
                None => return Ok(ControlFlow::Continue(())),
            },
        };

        self.pool.ensure(settings.context)?;
        let step = ScenarioStep {
            operation,
            context: settings.context,
        };
        let index = self.trace.len();
        let outcome = self.sequencer.execute_step(&self.pool, index, &step)?;
        writeln!(out, "{}", ResultReporter::render_line(&outcome)).map_err(io_error)?;
        self.trace.push(outcome);
        Ok(ControlFlow::Continue(()))
    }

    /// Read commands until `q` or end of input and return the recorded trace.
    pub fn run<R: BufRead, W: Write>(
        mut self,
        input: R,
        mut out: W,
        settings: &ConsoleSettings,
    ) -> Result<ScenarioTrace, HarnessError> {
        writeln!(out, "Commands run on {}", settings.context).map_err(io_error)?;
        writeln!(out, "{}", help_line()).map_err(io_error)?;

        for line in input.lines() {
            let command = Command::parse(&line.map_err(io_error)?);
            if self.dispatch(&command, settings, &mut out)?.is_break() {
                break;
            }
            writeln!(out, "{}", help_line()).map_err(io_error)?;
        }

        Ok(self.trace)
    }
}
