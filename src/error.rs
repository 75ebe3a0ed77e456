//! Error taxonomy shared by every layer of the driver.

use thiserror::Error;

/// The command whose response produced a [`SweepError::DeviceStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    DataAcquisitionStart,
    DataAcquisitionStop,
    MotorSpeedAdjust,
    MotorInformation,
    MotorReadyQuery,
    SampleRateAdjust,
    SampleRateInformation,
    Reset,
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Command::DataAcquisitionStart => "DS",
            Command::DataAcquisitionStop => "DX",
            Command::MotorSpeedAdjust => "MS",
            Command::MotorInformation => "MI",
            Command::MotorReadyQuery => "MZ",
            Command::SampleRateAdjust => "LR",
            Command::SampleRateInformation => "LI",
            Command::Reset => "RR",
        };
        write!(f, "{}", name)
    }
}

/// Tagged union of every failure the driver can surface.
#[derive(Error, Debug, Clone)]
pub enum SweepError {
    /// An unrecoverable OS-level read/write/open/configure failure.
    #[error("serial error: {0}")]
    Serial(String),

    /// A checksum mismatch, echoed-command mismatch, or malformed frame.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A response's status byte pair decoded to a known device failure.
    #[error("device rejected {command}: {reason} (code {code})")]
    DeviceStatus {
        command: Command,
        code: i32,
        reason: String,
    },

    /// A bounded wait (e.g. motor-ready polling) exceeded its ceiling.
    #[error("timed out: {0}")]
    TimedOut(String),

    /// A precondition violation the caller should see rather than panic on.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, SweepError>;
