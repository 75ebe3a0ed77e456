//! Driver core for a Sweep-class 2D rotating LiDAR scanner: binary wire
//! protocol, device state machine, and a bounded-queue scan-assembly
//! pipeline atop a blocking serial transport.

mod assembler;
mod protocol;
mod queue;
pub mod data;
pub mod device;
pub mod error;
pub mod serial;

pub mod prelude {
    pub use crate::data::{Sample, Scan, MAX_SAMPLES_PER_SCAN};
    pub use crate::device::Device;
    pub use crate::error::{Command, SweepError};
    pub use crate::serial::{SerialPort, Transport};
}

pub use device::Device;
pub use error::{Command, SweepError};
pub use serial::{SerialPort, Transport};

/// In-memory transport and wire-frame builders for exercising [`Device`]
/// without real hardware. Available under `cfg(test)` or the `test-util`
/// feature; never compiled into a normal build.
#[cfg(any(test, feature = "test-util"))]
pub mod test_support {
    pub use crate::serial::test_support::MockTransport;

    use crate::error::Command;
    use crate::protocol;

    pub fn response_header(cmd: Command, status1_digit: u8, status2_digit: u8) -> Vec<u8> {
        protocol::encode_response_header_for_tests(cmd, status1_digit, status2_digit).to_vec()
    }

    pub fn response_info(cmd: Command, value: u8) -> Vec<u8> {
        protocol::encode_response_info_for_tests(cmd, value).to_vec()
    }

    pub fn response_param(
        cmd: Command,
        echoed_value: u8,
        status1_digit: u8,
        status2_digit: u8,
    ) -> Vec<u8> {
        protocol::encode_response_param_for_tests(cmd, echoed_value, status1_digit, status2_digit)
            .to_vec()
    }

    pub fn sample(sync: bool, error: bool, angle_raw: u16, distance_cm: i32, signal_strength: u8) -> Vec<u8> {
        protocol::encode_sample_for_tests(sync, error, angle_raw, distance_cm, signal_strength).to_vec()
    }
}
