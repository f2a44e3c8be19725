use std::path::PathBuf;

use thiserror::Error;

/// The pin-control subsystem or one of the ADC lines could not be claimed.
#[derive(Debug, Error)]
pub enum HardwareInitError {
    #[cfg(feature = "pi")]
    #[error("GPIO subsystem unavailable: {0}")]
    Gpio(#[from] rppal::gpio::Error),
    #[error("GPIO support not compiled in (build with the `pi` feature)")]
    Unsupported,
}

#[derive(Debug, Error, PartialEq)]
pub enum CalibrationError {
    #[error("calibration scale must be non-zero")]
    ZeroScale,
    #[error("calibration scale must be finite, got {0}")]
    NonFinite(f32),
}

/// A setup form post that cannot become a credential record.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MalformedSubmission {
    #[error("a network name is required")]
    MissingSsid,
    #[error("a password is required")]
    MissingPassword,
    #[error("{0} contains characters that cannot be stored")]
    InvalidCharacters(&'static str),
    #[error("the submission was not a readable form")]
    Unreadable,
}

#[derive(Debug, Error)]
#[error("asset not found: {0}")]
pub struct AssetNotFound(pub String);

#[derive(Debug, Error)]
pub enum NetworkCommandError {
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("`{command}` exited with {status}")]
    Failed { command: String, status: String },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("cannot move from {from:?} to {to:?}")]
pub struct ModeError {
    pub from: crate::mode::DeviceMode,
    pub to: crate::mode::DeviceMode,
}
