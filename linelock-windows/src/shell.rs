//! File dialog construction and COM apartment initialization.
//!
//! Shell folder work runs on one long-lived single-threaded apartment, the
//! `shell-folder-invoker` thread, whichever context asked for the dialog.
//! Apartment initialization runs on the calling thread.

use std::sync::mpsc;
use std::thread;

use parking_lot::Mutex;
use windows::Win32::System::Com::*;
use windows::Win32::UI::Shell::*;

use linelock_core::models::config::ApartmentMode;
use linelock_core::models::error::HarnessError;
use linelock_core::traits::side_effects::SideEffects;

use crate::com::{self, ComError};

const INVOKER_THREAD: &str = "shell-folder-invoker";

type ShellJob = Box<dyn FnOnce() + Send + 'static>;

/// Shell side effects on a real Windows session.
#[derive(Default)]
pub struct WindowsShell {
    invoker: Mutex<Option<mpsc::Sender<ShellJob>>>,
}

impl WindowsShell {
    pub fn new() -> Self {
        Self::default()
    }

    fn invoker(&self) -> Result<mpsc::Sender<ShellJob>, HarnessError> {
        let mut slot = self.invoker.lock();
        if let Some(sender) = slot.as_ref() {
            return Ok(sender.clone());
        }

        let (sender, receiver) = mpsc::channel::<ShellJob>();
        thread::Builder::new()
            .name(INVOKER_THREAD.into())
            .spawn(move || {
                if let Err(e) = com::initialize_apartment(ApartmentMode::Sta) {
                    log::error!("{} could not enter an apartment: {}", INVOKER_THREAD, e);
                    return;
                }
                while let Ok(job) = receiver.recv() {
                    job();
                }
            })
            .map_err(|e| HarnessError::Backend(format!("failed to spawn {}: {}", INVOKER_THREAD, e)))?;

        *slot = Some(sender.clone());
        Ok(sender)
    }
}

fn open_dialog() -> Result<String, ComError> {
    unsafe {
        let desktop = SHGetDesktopFolder().map_err(ComError::call("SHGetDesktopFolder"))?;
        let dialog: IFileOpenDialog = CoCreateInstance(&FileOpenDialog, None, CLSCTX_INPROC_SERVER)
            .map_err(ComError::call("CoCreateInstance(FileOpenDialog)"))?;
        let options = dialog
            .GetOptions()
            .map_err(ComError::call("IFileDialog::GetOptions"))?;
        drop(desktop);
        Ok(format!("IFileOpenDialog on {} (options {:#x})", INVOKER_THREAD, options.0))
    }
}

impl SideEffects for WindowsShell {
    fn construct_dialog(&self) -> Result<String, HarnessError> {
        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
        let closed = || HarnessError::ContextClosed(INVOKER_THREAD.into());

        self.invoker()?
            .send(Box::new(move || {
                let _ = reply_tx.send(open_dialog());
            }))
            .map_err(|_| closed())?;

        Ok(reply_rx.recv().map_err(|_| closed())??)
    }

    fn initialize_apartment(&self, mode: ApartmentMode) -> Result<(), HarnessError> {
        com::initialize_apartment(mode)?;
        Ok(())
    }
}
