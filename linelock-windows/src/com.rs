//! COM apartment bookkeeping for the calling thread.

use thiserror::Error;
use windows::Win32::Foundation::RPC_E_CHANGED_MODE;
use windows::Win32::System::Com::*;

use linelock_core::models::config::ApartmentMode;
use linelock_core::models::error::HarnessError;

#[derive(Debug, Error)]
pub enum ComError {
    #[error("{call} failed: {source}")]
    Call {
        call: &'static str,
        #[source]
        source: windows::core::Error,
    },

    #[error("thread apartment is already initialized with a different model than {0}")]
    ChangedMode(ApartmentMode),
}

impl ComError {
    pub fn call(call: &'static str) -> impl FnOnce(windows::core::Error) -> Self {
        move |source| Self::Call { call, source }
    }
}

impl From<ComError> for HarnessError {
    fn from(e: ComError) -> Self {
        HarnessError::Backend(e.to_string())
    }
}

fn coinit(mode: ApartmentMode) -> COINIT {
    match mode {
        ApartmentMode::Sta => COINIT_APARTMENTTHREADED,
        ApartmentMode::Mta => COINIT_MULTITHREADED,
    }
}

/// Initialize COM on the calling thread and keep it initialized.
///
/// Repeating the call with the same mode is harmless; asking for the other
/// model fails.
pub fn initialize_apartment(mode: ApartmentMode) -> Result<(), ComError> {
    let hr = unsafe { CoInitializeEx(None, coinit(mode)) };
    if hr == RPC_E_CHANGED_MODE {
        return Err(ComError::ChangedMode(mode));
    }
    hr.ok().map_err(ComError::call("CoInitializeEx"))
}

/// COM usage scoped to one operation.
///
/// Joins the thread's existing apartment whatever its model; otherwise
/// initializes one with `mode` and uninitializes it on drop.
pub struct ComScope {
    owned: bool,
}

impl ComScope {
    pub fn enter(mode: ApartmentMode) -> Result<Self, ComError> {
        let hr = unsafe { CoInitializeEx(None, coinit(mode)) };
        if hr == RPC_E_CHANGED_MODE {
            return Ok(Self { owned: false });
        }
        hr.ok().map_err(ComError::call("CoInitializeEx"))?;
        Ok(Self { owned: true })
    }
}

impl Drop for ComScope {
    fn drop(&mut self) {
        if self.owned {
            unsafe { CoUninitialize() };
        }
    }
}
