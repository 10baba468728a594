//! Barrier acknowledgment sources.
//!
//! - [`LineAcknowledger`]: the operator presses Enter (manual runs)
//! - [`AutoAcknowledger`]: continues on its own, optionally after a delay
//! - [`ChannelAcknowledger`]: released programmatically from another thread
//!
//! Wrap any of them in `SimulatedLockCycle` to also simulate the session
//! lock/unlock the barrier stands for.

use std::io::{BufRead, Write};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::error::HarnessError;
use crate::traits::acknowledger::{BarrierAcknowledger, BarrierPrompt};

/// Prints the prompt and waits for one line of input.
pub struct LineAcknowledger<R, W> {
    input: Mutex<R>,
    output: Mutex<W>,
}

impl<R: BufRead + Send, W: Write + Send> LineAcknowledger<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input: Mutex::new(input),
            output: Mutex::new(output),
        }
    }
}

impl<R: BufRead + Send, W: Write + Send> BarrierAcknowledger for LineAcknowledger<R, W> {
    fn await_acknowledgment(&self, prompt: &BarrierPrompt) -> Result<(), HarnessError> {
        {
            let mut output = self.output.lock();
            writeln!(output, "{}", prompt.message)
                .and_then(|_| output.flush())
                .map_err(|e| HarnessError::Acknowledgment(e.to_string()))?;
        }

        let mut line = String::new();
        let read = self
            .input
            .lock()
            .read_line(&mut line)
            .map_err(|e| HarnessError::Acknowledgment(e.to_string()))?;
        if read == 0 {
            return Err(HarnessError::Acknowledgment("input closed before acknowledgment".into()));
        }
        Ok(())
    }
}

/// Acknowledges every barrier after a fixed delay.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoAcknowledger {
    delay: Duration,
}

impl AutoAcknowledger {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn immediate() -> Self {
        Self::default()
    }
}

impl BarrierAcknowledger for AutoAcknowledger {
    fn await_acknowledgment(&self, prompt: &BarrierPrompt) -> Result<(), HarnessError> {
        log::info!("Auto-acknowledging barrier at step {}", prompt.step_index + 1);
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        Ok(())
    }
}

/// Blocks until released through the paired [`BarrierRelease`].
pub struct ChannelAcknowledger {
    receiver: Mutex<mpsc::Receiver<()>>,
}

/// Releases one pending (or future) barrier per call.
#[derive(Clone)]
pub struct BarrierRelease {
    sender: mpsc::Sender<()>,
}

impl BarrierRelease {
    pub fn release(&self) -> bool {
        self.sender.send(()).is_ok()
    }
}

impl ChannelAcknowledger {
    pub fn new() -> (Self, BarrierRelease) {
        let (sender, receiver) = mpsc::channel();
        (
            Self {
                receiver: Mutex::new(receiver),
            },
            BarrierRelease { sender },
        )
    }
}

impl BarrierAcknowledger for ChannelAcknowledger {
    fn await_acknowledgment(&self, _prompt: &BarrierPrompt) -> Result<(), HarnessError> {
        self.receiver
            .lock()
            .recv()
            .map_err(|_| HarnessError::Acknowledgment("barrier release dropped".into()))
    }
}
