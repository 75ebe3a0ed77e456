//! Public driver API: state machine, motor-ready gating, worker lifecycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::assembler;
use crate::data::Scan;
use crate::error::{Command, SweepError};
use crate::protocol::{self, ResponseHeader, ResponseInfo, ResponseParam};
use crate::queue::BoundedScanQueue;
use crate::serial::{SerialPort, Transport};

const DEFAULT_BITRATE: u32 = 115_200;
const MOTOR_READY_POLL_ATTEMPTS: u32 = 20;
const MOTOR_READY_POLL_SPACING: Duration = Duration::from_millis(500);
const STOP_DRAIN_SLEEP: Duration = Duration::from_millis(35);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Scanning,
}

/// Driver core for a Sweep-class 2D rotating LiDAR scanner.
///
/// Generic over the byte transport so tests can substitute an in-memory
/// mock; production callers get `Device<SerialPort>` via [`Device::open`].
pub struct Device<T: Transport = SerialPort> {
    port: T,
    state: State,
    queue: Option<Arc<BoundedScanQueue>>,
    stop_flag: Option<Arc<AtomicBool>>,
    worker: Option<JoinHandle<()>>,
}

impl Device<SerialPort> {
    /// Opens `port_path` at `bitrate`, then idempotently stops any scan
    /// already in progress so the returned `Device` is always `Idle`.
    pub fn open(port_path: &str, bitrate: u32) -> Result<Self, SweepError> {
        let port = SerialPort::open(port_path, bitrate)?;
        let mut device = Device {
            port,
            state: State::Idle,
            queue: None,
            stop_flag: None,
            worker: None,
        };
        device.stop_scanning()?;
        Ok(device)
    }

    /// Opens at the default bitrate (115200).
    pub fn open_default(port_path: &str) -> Result<Self, SweepError> {
        Self::open(port_path, DEFAULT_BITRATE)
    }
}

impl<T: Transport + 'static> Device<T> {
    /// Constructs a `Device` directly over an arbitrary transport, already
    /// in `Idle`. The production path is [`Device::open`]; this is the
    /// seam tests (and alternative transports) use instead.
    pub fn from_transport(port: T) -> Self {
        Device {
            port,
            state: State::Idle,
            queue: None,
            stop_flag: None,
            worker: None,
        }
    }

    fn require_idle(&self) -> Result<(), SweepError> {
        if self.state != State::Idle {
            return Err(SweepError::InvalidArgument(
                "operation requires the device to be Idle".to_string(),
            ));
        }
        Ok(())
    }

    fn require_scanning(&self) -> Result<(), SweepError> {
        if self.state != State::Scanning {
            return Err(SweepError::InvalidArgument(
                "operation requires the device to be Scanning".to_string(),
            ));
        }
        Ok(())
    }

    fn send_cmd(&mut self, cmd: Command) -> Result<(), SweepError> {
        self.port.write_all(&protocol::encode_cmd(cmd))
    }

    fn send_cmd_param(&mut self, cmd: Command, value: u8) -> Result<(), SweepError> {
        self.port
            .write_all(&protocol::encode_cmd_param(cmd, value)?)
    }

    fn read_header(&mut self, cmd: Command) -> Result<ResponseHeader, SweepError> {
        let mut buf = [0u8; ResponseHeader::LEN];
        self.port.read_exact(&mut buf)?;
        ResponseHeader::decode(cmd, &buf)
    }

    fn read_param(&mut self, cmd: Command) -> Result<ResponseParam, SweepError> {
        let mut buf = [0u8; ResponseParam::LEN];
        self.port.read_exact(&mut buf)?;
        ResponseParam::decode(cmd, &buf)
    }

    fn read_info(&mut self, cmd: Command) -> Result<ResponseInfo, SweepError> {
        let mut buf = [0u8; ResponseInfo::LEN];
        self.port.read_exact(&mut buf)?;
        ResponseInfo::decode(cmd, &buf)
    }

    fn poll_motor_ready(&mut self) -> Result<(), SweepError> {
        for _ in 0..MOTOR_READY_POLL_ATTEMPTS {
            self.send_cmd(Command::MotorReadyQuery)?;
            let info = self.read_info(Command::MotorReadyQuery)?;
            if info.value == 0 {
                return Ok(());
            }
            thread::sleep(MOTOR_READY_POLL_SPACING);
        }
        #[cfg(feature = "log")]
        log::warn!("motor did not report ready within {} attempts", MOTOR_READY_POLL_ATTEMPTS);
        Err(SweepError::TimedOut("motor stabilize".to_string()))
    }

    /// Transitions `Idle` → `Scanning`: motor-speed sanity check,
    /// motor-ready polling, `DS`, then spawns the scan-assembly worker.
    pub fn start_scanning(&mut self) -> Result<(), SweepError> {
        self.require_idle()?;
        #[cfg(feature = "log")]
        log::debug!("start_scanning: querying motor state");

        self.send_cmd(Command::MotorInformation)?;
        let speed = self.read_info(Command::MotorInformation)?.value;
        if speed == 0 {
            self.set_motor_speed(5)?;
        }

        self.poll_motor_ready()?;

        self.send_cmd(Command::DataAcquisitionStart)?;
        let header = self.read_header(Command::DataAcquisitionStart)?;
        protocol::decode_data_acquisition_status(header.status_code()?)?;

        let queue = BoundedScanQueue::new();
        queue.clear();
        let stop_flag = Arc::new(AtomicBool::new(false));

        let worker_port = self.port.try_clone_for_worker()?;
        let worker_queue = Arc::clone(&queue);
        let worker_stop = Arc::clone(&stop_flag);
        let handle = thread::spawn(move || assembler::run(worker_port, worker_queue, worker_stop));

        self.queue = Some(queue);
        self.stop_flag = Some(stop_flag);
        self.worker = Some(handle);
        self.state = State::Scanning;
        #[cfg(feature = "log")]
        log::info!("scanning started");
        Ok(())
    }

    /// Tolerant of being called from either state; a no-op if already
    /// `Idle`. Joins the worker before performing any of its own I/O so
    /// the single-reader invariant holds at every instant.
    pub fn stop_scanning(&mut self) -> Result<(), SweepError> {
        if let Some(flag) = self.stop_flag.take() {
            #[cfg(feature = "log")]
            log::debug!("stop_scanning: signalling worker to stop");
            flag.store(true, Ordering::Relaxed);
        }
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
        self.queue = None;

        self.send_cmd(Command::DataAcquisitionStop)?;
        thread::sleep(STOP_DRAIN_SLEEP);

        // In-flight sample bytes may still be arriving; a parse failure
        // here is expected garbage, not a real error.
        let mut header_buf = [0u8; ResponseHeader::LEN];
        let _ = self.port.read_exact(&mut header_buf);

        self.port.flush()?;

        self.send_cmd(Command::DataAcquisitionStop)?;
        let _ = self.read_header(Command::DataAcquisitionStop)?;

        self.state = State::Idle;
        #[cfg(feature = "log")]
        log::info!("scanning stopped");
        Ok(())
    }

    /// Blocks until a completed scan is available, or returns the
    /// terminal error posted by the worker.
    pub fn get_scan(&mut self) -> Result<Scan, SweepError> {
        self.require_scanning()?;
        let queue = self
            .queue
            .as_ref()
            .expect("queue present while Scanning")
            .clone();
        let result = queue.dequeue();
        #[cfg(feature = "log")]
        if let Err(ref e) = result {
            log::error!("get_scan: worker terminated: {}", e);
        }
        result
    }

    pub fn get_motor_speed(&mut self) -> Result<u8, SweepError> {
        self.require_idle()?;
        self.send_cmd(Command::MotorInformation)?;
        Ok(self.read_info(Command::MotorInformation)?.value)
    }

    /// `hz ∈ [0, 10]`. Waits for motor-ready before issuing `MS`.
    pub fn set_motor_speed(&mut self, hz: u8) -> Result<(), SweepError> {
        self.require_idle()?;
        if hz > 10 {
            return Err(SweepError::InvalidArgument(format!(
                "motor speed {} Hz out of range [0, 10]",
                hz
            )));
        }
        self.poll_motor_ready()?;
        self.send_cmd_param(Command::MotorSpeedAdjust, hz)?;
        let response = self.read_param(Command::MotorSpeedAdjust)?;
        protocol::decode_motor_speed_status(response.status_code()?)
    }

    pub fn get_sample_rate(&mut self) -> Result<u32, SweepError> {
        self.require_idle()?;
        self.send_cmd(Command::SampleRateInformation)?;
        let code = self.read_info(Command::SampleRateInformation)?.value;
        protocol::sample_rate_code_to_hz(code)
    }

    /// `hz ∈ {500, 750, 1000}`.
    pub fn set_sample_rate(&mut self, hz: u32) -> Result<(), SweepError> {
        self.require_idle()?;
        let code = protocol::sample_rate_hz_to_code(hz)?;
        self.send_cmd_param(Command::SampleRateAdjust, code)?;
        let response = self.read_param(Command::SampleRateAdjust)?;
        protocol::decode_sample_rate_status(response.status_code()?)
    }

    pub fn get_motor_ready(&mut self) -> Result<bool, SweepError> {
        self.require_idle()?;
        self.send_cmd(Command::MotorReadyQuery)?;
        Ok(self.read_info(Command::MotorReadyQuery)?.value == 0)
    }

    /// Writes `RR`. No response is expected. Consumes `self`: per the
    /// device's contract, operations after a reset are undefined, so
    /// reuse is a compile-time error rather than a runtime one.
    pub fn reset(mut self) -> Result<(), SweepError> {
        self.require_idle()?;
        #[cfg(feature = "log")]
        log::warn!("resetting device; it is unusable until re-opened");
        self.send_cmd(Command::Reset)
    }
}

impl<T: Transport + 'static> Drop for Device<T> {
    fn drop(&mut self) {
        let _ = self.stop_scanning();
    }
}
