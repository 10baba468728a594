//! In-process stand-in for the audio, shell and COM subsystems.
//!
//! Reproduces the locking behaviour observed on affected Windows hosts so
//! that scenarios can be exercised without hardware or a human at the
//! keyboard. Every operation is attributed to the OS thread it runs on.
//!
//! Rules applied when a session lock cycle is simulated:
//! - **File dialog**: if the first dialog was constructed after the audio
//!   subsystem was first used, every later line open fails, on any thread.
//! - **COM apartment**: a thread with an initialized apartment has its
//!   opens fail afterwards, unless the audio subsystem was first used on that
//!   very thread after its apartment was initialized.
//!
//! Breakage is permanent for the lifetime of the platform.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::config::ApartmentMode;
use crate::models::device::Device;
use crate::models::error::HarnessError;
use crate::traits::acknowledger::{BarrierAcknowledger, BarrierPrompt};
use crate::traits::audio_subsystem::{AudioSubsystem, NativeLine};
use crate::traits::side_effects::SideEffects;

/// Which of the observed defects the simulation reproduces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefectModel {
    pub file_dialog: bool,
    pub com_apartment: bool,
}

impl DefectModel {
    pub fn observed() -> Self {
        Self {
            file_dialog: true,
            com_apartment: true,
        }
    }

    pub fn none() -> Self {
        Self {
            file_dialog: false,
            com_apartment: false,
        }
    }
}

impl Default for DefectModel {
    fn default() -> Self {
        Self::observed()
    }
}

#[derive(Default)]
struct SimState {
    clock: u64,
    audio_first_use: Option<(u64, ThreadId)>,
    first_dialog: Option<u64>,
    apartments: HashMap<ThreadId, (u64, ApartmentMode)>,
    all_lines_broken: bool,
    broken_threads: HashSet<ThreadId>,
    open_lines: HashSet<String>,
    scripted_failures: usize,
    lock_cycles: u32,
    dialogs: u32,
}

impl SimState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn touch_audio(&mut self) {
        let now = self.tick();
        self.audio_first_use
            .get_or_insert((now, thread::current().id()));
    }

    fn apply_lock_cycle(&mut self, defect: DefectModel) {
        self.lock_cycles += 1;
        let Some((audio_at, audio_thread)) = self.audio_first_use else {
            return;
        };

        if defect.file_dialog {
            if let Some(dialog_at) = self.first_dialog {
                if dialog_at > audio_at && !self.all_lines_broken {
                    log::debug!("Simulated lock cycle broke all capture lines (dialog after audio)");
                    self.all_lines_broken = true;
                }
            }
        }

        if defect.com_apartment {
            for (thread, (com_at, _)) in &self.apartments {
                let bound_here = *thread == audio_thread && audio_at > *com_at;
                if !bound_here && self.broken_threads.insert(*thread) {
                    log::debug!("Simulated lock cycle broke capture lines on {:?}", thread);
                }
            }
        }
    }
}

/// Simulated audio, shell and COM subsystems sharing one timeline.
pub struct SimulatedPlatform {
    devices: Vec<Device>,
    defect: DefectModel,
    open_latency: Duration,
    trigger_latency: Duration,
    state: Arc<Mutex<SimState>>,
}

impl SimulatedPlatform {
    pub fn new(devices: Vec<Device>) -> Self {
        Self {
            devices,
            defect: DefectModel::default(),
            open_latency: Duration::ZERO,
            trigger_latency: Duration::ZERO,
            state: Arc::new(Mutex::new(SimState::default())),
        }
    }

    /// Primary driver, one render endpoint and two secondary capture devices.
    pub fn with_default_topology() -> Self {
        Self::new(vec![
            Device::capture("primary-capture", "Primary Sound Capture Driver").as_default(),
            Device::render("speakers", "Speakers (Realtek High Definition Audio)"),
            Device::capture("mic-usb", "Microphone (USB Audio Device)"),
            Device::capture("line-in", "Line In (Realtek High Definition Audio)"),
        ])
    }

    pub fn with_defect(mut self, defect: DefectModel) -> Self {
        self.defect = defect;
        self
    }

    /// Delay applied to every line open.
    pub fn with_open_latency(mut self, latency: Duration) -> Self {
        self.open_latency = latency;
        self
    }

    /// Delay applied to every side-effect trigger.
    pub fn with_trigger_latency(mut self, latency: Duration) -> Self {
        self.trigger_latency = latency;
        self
    }

    /// Make the next `count` line opens fail regardless of the defect rules.
    pub fn fail_next_opens(&self, count: usize) {
        self.state.lock().scripted_failures += count;
    }

    /// Simulate a session lock followed by an unlock.
    pub fn lock_cycle(&self) {
        self.state.lock().apply_lock_cycle(self.defect);
    }

    pub fn lock_cycles(&self) -> u32 {
        self.state.lock().lock_cycles
    }

    pub fn open_line_count(&self) -> usize {
        self.state.lock().open_lines.len()
    }

    pub fn dialogs_constructed(&self) -> u32 {
        self.state.lock().dialogs
    }
}

impl AudioSubsystem for SimulatedPlatform {
    fn enumerate(&self) -> Result<Vec<Device>, HarnessError> {
        self.state.lock().touch_audio();
        Ok(self.devices.clone())
    }

    fn open_capture_line(&self, device: &Device) -> Result<Box<dyn NativeLine>, HarnessError> {
        if !self.open_latency.is_zero() {
            thread::sleep(self.open_latency);
        }

        let mut state = self.state.lock();
        state.touch_audio();

        if !self.devices.iter().any(|d| d.id == device.id && d.supports_capture) {
            return Err(HarnessError::Backend(format!("unknown capture device: {}", device.id)));
        }

        let unavailable = |message: &str| HarnessError::ResourceUnavailable {
            device_id: device.id.clone(),
            message: message.to_string(),
        };

        if state.scripted_failures > 0 {
            state.scripted_failures -= 1;
            return Err(unavailable("scripted failure"));
        }
        if state.all_lines_broken {
            return Err(unavailable("line unavailable since session lock (shell folder)"));
        }
        if state.broken_threads.contains(&thread::current().id()) {
            return Err(unavailable("line unavailable since session lock (COM apartment)"));
        }
        if !state.open_lines.insert(device.id.clone()) {
            return Err(unavailable("device busy"));
        }

        Ok(Box::new(SimulatedLine {
            device_id: device.id.clone(),
            state: Arc::clone(&self.state),
        }))
    }
}

impl SideEffects for SimulatedPlatform {
    fn construct_dialog(&self) -> Result<String, HarnessError> {
        if !self.trigger_latency.is_zero() {
            thread::sleep(self.trigger_latency);
        }

        let mut state = self.state.lock();
        let now = state.tick();
        state.first_dialog.get_or_insert(now);
        state.dialogs += 1;
        Ok(format!("simulated file dialog #{}", state.dialogs))
    }

    fn initialize_apartment(&self, mode: ApartmentMode) -> Result<(), HarnessError> {
        if !self.trigger_latency.is_zero() {
            thread::sleep(self.trigger_latency);
        }

        let mut state = self.state.lock();
        let now = state.tick();
        let (_, existing) = *state
            .apartments
            .entry(thread::current().id())
            .or_insert((now, mode));

        if existing != mode {
            return Err(HarnessError::Backend(format!(
                "cannot change apartment of this thread from {} to {}",
                existing, mode
            )));
        }
        Ok(())
    }
}

struct SimulatedLine {
    device_id: String,
    state: Arc<Mutex<SimState>>,
}

impl NativeLine for SimulatedLine {
    fn close(self: Box<Self>) -> Result<(), HarnessError> {
        if self.state.lock().open_lines.remove(&self.device_id) {
            Ok(())
        } else {
            Err(HarnessError::Backend(format!("line on {} already closed", self.device_id)))
        }
    }
}

/// Barrier acknowledger that waits on another acknowledger, then performs a
/// simulated session lock/unlock.
pub struct SimulatedLockCycle {
    inner: Arc<dyn BarrierAcknowledger>,
    platform: Arc<SimulatedPlatform>,
}

impl SimulatedLockCycle {
    pub fn new(inner: Arc<dyn BarrierAcknowledger>, platform: Arc<SimulatedPlatform>) -> Self {
        Self { inner, platform }
    }
}

impl BarrierAcknowledger for SimulatedLockCycle {
    fn await_acknowledgment(&self, prompt: &BarrierPrompt) -> Result<(), HarnessError> {
        self.inner.await_acknowledgment(prompt)?;
        self.platform.lock_cycle();
        log::info!("Simulated session lock/unlock at step {}", prompt.step_index + 1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secondary() -> Device {
        Device::capture("mic-usb", "Microphone (USB Audio Device)")
    }

    fn open_and_close(platform: &SimulatedPlatform) -> Result<(), HarnessError> {
        platform.enumerate()?;
        platform.open_capture_line(&secondary())?.close()
    }

    #[test]
    fn dialog_after_audio_breaks_every_thread() {
        let platform = Arc::new(SimulatedPlatform::with_default_topology());
        open_and_close(&platform).unwrap();
        platform.construct_dialog().unwrap();
        platform.lock_cycle();

        assert!(open_and_close(&platform).is_err());
        let other = Arc::clone(&platform);
        let result = thread::spawn(move || open_and_close(&other)).join().unwrap();
        assert!(result.is_err());
    }

    #[test]
    fn dialog_before_audio_is_harmless() {
        let platform = SimulatedPlatform::with_default_topology();
        platform.construct_dialog().unwrap();
        open_and_close(&platform).unwrap();
        platform.construct_dialog().unwrap();
        platform.lock_cycle();

        open_and_close(&platform).unwrap();
    }

    #[test]
    fn nothing_breaks_without_lock_cycle() {
        let platform = SimulatedPlatform::with_default_topology();
        open_and_close(&platform).unwrap();
        platform.construct_dialog().unwrap();
        platform.initialize_apartment(ApartmentMode::Sta).unwrap();

        open_and_close(&platform).unwrap();
        assert_eq!(platform.lock_cycles(), 0);
    }

    #[test]
    fn com_breaks_only_the_initialized_thread() {
        let platform = Arc::new(SimulatedPlatform::with_default_topology());
        open_and_close(&platform).unwrap();

        let com_thread = Arc::clone(&platform);
        let (tx, rx) = std::sync::mpsc::channel::<()>();
        let (done_tx, done_rx) = std::sync::mpsc::channel();
        let handle = thread::spawn(move || {
            com_thread.initialize_apartment(ApartmentMode::Sta).unwrap();
            rx.recv().unwrap();
            done_tx.send(open_and_close(&com_thread)).unwrap();
        });

        // wait for the apartment before locking
        while platform.state.lock().apartments.is_empty() {
            thread::yield_now();
        }
        platform.lock_cycle();
        tx.send(()).unwrap();

        assert!(done_rx.recv().unwrap().is_err());
        handle.join().unwrap();
        open_and_close(&platform).unwrap();
    }

    #[test]
    fn com_before_first_audio_use_on_same_thread_is_harmless() {
        let platform = SimulatedPlatform::with_default_topology();
        platform.initialize_apartment(ApartmentMode::Sta).unwrap();
        open_and_close(&platform).unwrap();
        platform.lock_cycle();

        open_and_close(&platform).unwrap();
    }

    #[test]
    fn apartment_mode_cannot_change() {
        let platform = SimulatedPlatform::with_default_topology();
        platform.initialize_apartment(ApartmentMode::Sta).unwrap();
        platform.initialize_apartment(ApartmentMode::Sta).unwrap();
        assert!(matches!(
            platform.initialize_apartment(ApartmentMode::Mta),
            Err(HarnessError::Backend(_))
        ));
    }

    #[test]
    fn defect_model_none_never_breaks() {
        let platform = SimulatedPlatform::with_default_topology().with_defect(DefectModel::none());
        open_and_close(&platform).unwrap();
        platform.construct_dialog().unwrap();
        platform.initialize_apartment(ApartmentMode::Sta).unwrap();
        platform.lock_cycle();

        open_and_close(&platform).unwrap();
    }

    #[test]
    fn busy_device_is_unavailable() {
        let platform = SimulatedPlatform::with_default_topology();
        let line = platform.open_capture_line(&secondary()).unwrap();
        match platform.open_capture_line(&secondary()) {
            Err(e) => assert!(e.is_studied()),
            Ok(_) => panic!("second open of a busy device succeeded"),
        }
        line.close().unwrap();
        assert_eq!(platform.open_line_count(), 0);
    }
}
