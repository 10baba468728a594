//! # linelock-windows
//!
//! Windows backend for linelock.
//!
//! Provides:
//! - `WasapiAudioSubsystem`: endpoint enumeration and capture lines via MMDevice/WASAPI
//! - `WindowsShell`: `IFileOpenDialog` construction and `CoInitializeEx`
//! - `DeviceEnumerator`: MMDevice endpoint listing, default capture endpoint first
//!
//! ## Usage
//! ```ignore
//! use linelock_core::{ApartmentMode, PlatformBindings};
//! use linelock_windows::{WasapiAudioSubsystem, WindowsShell};
//!
//! let audio = Arc::new(WasapiAudioSubsystem::new(ApartmentMode::Sta));
//! let shell = Arc::new(WindowsShell::new());
//! ```

#[cfg(target_os = "windows")]
pub mod com;
#[cfg(target_os = "windows")]
pub mod device_enumerator;
#[cfg(target_os = "windows")]
pub mod shell;
#[cfg(target_os = "windows")]
pub mod wasapi_line;

#[cfg(target_os = "windows")]
pub use device_enumerator::DeviceEnumerator;
#[cfg(target_os = "windows")]
pub use shell::WindowsShell;
#[cfg(target_os = "windows")]
pub use wasapi_line::WasapiAudioSubsystem;
