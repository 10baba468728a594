use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

use super::error::HarnessError;
use super::scenario::ContextId;

/// COM apartment model requested by a `ComInit` trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApartmentMode {
    /// Single-threaded apartment (`COINIT_APARTMENTTHREADED`).
    Sta,
    /// Multi-threaded apartment (`COINIT_MULTITHREADED`).
    Mta,
}

impl fmt::Display for ApartmentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sta => "sta",
            Self::Mta => "mta",
        })
    }
}

impl FromStr for ApartmentMode {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sta" | "apartment" => Ok(Self::Sta),
            "mta" | "multithreaded" => Ok(Self::Mta),
            other => Err(HarnessError::ConfigurationFailed(format!(
                "unknown apartment mode: {}",
                other
            ))),
        }
    }
}

/// How environment barriers are acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcknowledgmentMode {
    /// Wait for the operator to press Enter after locking and unlocking.
    Prompt,
    /// Continue on its own after the given delay.
    Auto { delay: Duration },
}

/// Configuration for a harness run.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Apartment model used by `ComInit` triggers (default: STA).
    pub apartment_mode: ApartmentMode,

    /// Capture device id or name fragment, or None for the secondary device.
    pub device_override: Option<String>,

    /// Context targeted by interactive commands (default: UI-affine).
    pub console_context: ContextId,

    /// Barrier acknowledgment (default: operator prompt).
    pub acknowledgment: AcknowledgmentMode,
}

impl HarnessConfig {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(selector) = &self.device_override {
            if selector.trim().is_empty() {
                return Err("device override must not be blank".into());
            }
        }
        if let ContextId::Worker(0) = self.console_context {
            return Err("worker contexts are numbered from 1".into());
        }
        if let AcknowledgmentMode::Auto { delay } = self.acknowledgment {
            if delay > Duration::from_secs(600) {
                return Err(format!("auto acknowledgment delay too long: {:?}", delay));
            }
        }
        Ok(())
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            apartment_mode: ApartmentMode::Sta,
            device_override: None,
            console_context: ContextId::UiAffine,
            acknowledgment: AcknowledgmentMode::Prompt,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(HarnessConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_blank_override_and_worker_zero() {
        let config = HarnessConfig {
            device_override: Some("  ".into()),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = HarnessConfig {
            console_context: ContextId::Worker(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = HarnessConfig {
            acknowledgment: AcknowledgmentMode::Auto {
                delay: Duration::from_secs(601),
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = HarnessConfig {
            acknowledgment: AcknowledgmentMode::Auto {
                delay: Duration::from_secs(600),
            },
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_apartment_mode() {
        assert_eq!("STA".parse::<ApartmentMode>().unwrap(), ApartmentMode::Sta);
        assert_eq!("multithreaded".parse::<ApartmentMode>().unwrap(), ApartmentMode::Mta);
        assert!("neutral".parse::<ApartmentMode>().is_err());
    }
}
