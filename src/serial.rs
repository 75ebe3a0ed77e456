//! Exact-length, blocking-on-data-available byte channel atop a
//! non-blocking OS serial handle.
//!
//! Mirrors the original device's Unix serial backend: open the TTY
//! non-blocking, configure 8N1/raw mode/no flow control, and implement
//! `read_exact`/`write_all` as reliable full-transfer-or-error loops gated
//! by `poll()` (standing in for the original's `select()`).

use std::os::unix::io::RawFd;

use nix::errno::Errno;
use nix::fcntl::{self, OFlag};
use nix::poll::{poll, PollFd, PollFlags};
use nix::sys::termios::{self, BaudRate, SetArg};
use nix::unistd;

use crate::error::SweepError;

/// Minimal byte-transport contract the rest of the driver depends on.
/// `SerialPort` is the only production implementor; tests substitute an
/// in-memory mock so the suite never touches real hardware.
pub trait Transport: Send {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), SweepError>;
    fn write_all(&mut self, buf: &[u8]) -> Result<(), SweepError>;
    fn flush(&mut self) -> Result<(), SweepError>;

    /// Produces the independent read handle the scan-assembly worker
    /// runs on for the duration of a scanning session. Transports that
    /// cannot be cloned (most test doubles) may leave this unimplemented.
    fn try_clone_for_worker(&self) -> Result<Self, SweepError>
    where
        Self: Sized,
    {
        Err(SweepError::Serial(
            "this transport does not support cloning".to_string(),
        ))
    }
}

fn baud_rate(bitrate: u32) -> Result<BaudRate, SweepError> {
    match bitrate {
        50 => Ok(BaudRate::B50),
        75 => Ok(BaudRate::B75),
        110 => Ok(BaudRate::B110),
        134 => Ok(BaudRate::B134),
        150 => Ok(BaudRate::B150),
        200 => Ok(BaudRate::B200),
        300 => Ok(BaudRate::B300),
        600 => Ok(BaudRate::B600),
        1200 => Ok(BaudRate::B1200),
        1800 => Ok(BaudRate::B1800),
        2400 => Ok(BaudRate::B2400),
        4800 => Ok(BaudRate::B4800),
        9600 => Ok(BaudRate::B9600),
        19200 => Ok(BaudRate::B19200),
        38400 => Ok(BaudRate::B38400),
        57600 => Ok(BaudRate::B57600),
        115200 => Ok(BaudRate::B115200),
        230400 => Ok(BaudRate::B230400),
        _ => Err(SweepError::Serial(format!(
            "unsupported bitrate: {}",
            bitrate
        ))),
    }
}

/// Exclusive ownership of one OS serial handle (or a `dup`'d read/write
/// half of one — see [`SerialPort::try_clone`]). Flushes on drop,
/// best-effort.
pub struct SerialPort {
    fd: RawFd,
}

impl SerialPort {
    /// Opens `path`, configuring 8N1, no parity, no flow control, raw
    /// mode, and the given `bitrate` (default 115200 via `Device::open`).
    pub fn open(path: &str, bitrate: u32) -> Result<Self, SweepError> {
        let baud = baud_rate(bitrate)?;

        let fd = fcntl::open(
            path,
            OFlag::O_RDWR | OFlag::O_NOCTTY | OFlag::O_NONBLOCK,
            nix::sys::stat::Mode::empty(),
        )
        .map_err(|e| SweepError::Serial(format!("opening {} failed: {}", path, e)))?;

        match unistd::isatty(fd) {
            Ok(true) => {}
            Ok(false) => {
                let _ = unistd::close(fd);
                return Err(SweepError::Serial(format!("{} is not a tty", path)));
            }
            Err(e) => {
                let _ = unistd::close(fd);
                return Err(SweepError::Serial(format!("isatty check failed: {}", e)));
            }
        }

        let mut options = termios::tcgetattr(fd)
            .map_err(|e| SweepError::Serial(format!("querying terminal options failed: {}", e)))?;

        termios::cfmakeraw(&mut options);
        options.control_flags.insert(
            termios::ControlFlags::CLOCAL
                | termios::ControlFlags::CREAD
                | termios::ControlFlags::CS8,
        );
        options.control_flags.remove(
            termios::ControlFlags::PARENB
                | termios::ControlFlags::CSTOPB
                | termios::ControlFlags::CSIZE,
        );
        options.input_flags.remove(
            termios::InputFlags::IXON | termios::InputFlags::IXOFF | termios::InputFlags::IXANY,
        );

        termios::cfsetispeed(&mut options, baud)
            .map_err(|e| SweepError::Serial(format!("setting input baud failed: {}", e)))?;
        termios::cfsetospeed(&mut options, baud)
            .map_err(|e| SweepError::Serial(format!("setting output baud failed: {}", e)))?;

        termios::tcflush(fd, termios::FlushArg::TCIFLUSH)
            .map_err(|e| SweepError::Serial(format!("flushing serial port failed: {}", e)))?;

        if let Err(e) = termios::tcsetattr(fd, SetArg::TCSANOW, &options) {
            let _ = unistd::close(fd);
            return Err(SweepError::Serial(format!(
                "setting terminal options failed: {}",
                e
            )));
        }

        #[cfg(feature = "log")]
        log::info!("opened serial port {} at {} baud", path, bitrate);

        Ok(SerialPort { fd })
    }

    /// Duplicates the underlying file descriptor so the scan-assembly
    /// worker can read independently of the `Device`'s own handle, without
    /// any runtime lock between the two. Only one of the two handles is
    /// ever used to read at a time (enforced by the device state machine,
    /// not by a mutex).
    pub fn try_clone(&self) -> Result<Self, SweepError> {
        let fd = unistd::dup(self.fd)
            .map_err(|e| SweepError::Serial(format!("duplicating serial handle failed: {}", e)))?;
        Ok(SerialPort { fd })
    }

    fn wait_readable(&self) -> Result<bool, SweepError> {
        let mut fds = [PollFd::new(self.fd, PollFlags::POLLIN)];
        // No timeout: the caller is expected to be scanning continuously;
        // logical timeouts are the caller's responsibility (spec §5).
        match poll(&mut fds, -1) {
            Ok(_) => Ok(fds[0].revents().unwrap_or_else(PollFlags::empty).contains(PollFlags::POLLIN)),
            Err(Errno::EINTR) => Ok(false),
            Err(e) => Err(SweepError::Serial(format!(
                "blocking on data to read failed: {}",
                e
            ))),
        }
    }
}

impl Transport for SerialPort {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), SweepError> {
        let mut received = 0usize;
        while received < buf.len() {
            if !self.wait_readable()? {
                continue;
            }
            match unistd::read(self.fd, &mut buf[received..]) {
                Ok(0) => {
                    return Err(SweepError::Serial(
                        "serial port closed mid-read".to_string(),
                    ))
                }
                Ok(n) => received += n,
                Err(Errno::EAGAIN) | Err(Errno::EINTR) => continue,
                Err(e) => return Err(SweepError::Serial(format!("reading failed: {}", e))),
            }
        }
        Ok(())
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<(), SweepError> {
        let mut written = 0usize;
        while written < buf.len() {
            match unistd::write(self.fd, &buf[written..]) {
                Ok(n) => written += n,
                Err(Errno::EAGAIN) | Err(Errno::EINTR) => continue,
                Err(e) => return Err(SweepError::Serial(format!("writing failed: {}", e))),
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SweepError> {
        termios::tcflush(self.fd, termios::FlushArg::TCIFLUSH)
            .map_err(|e| SweepError::Serial(format!("flushing serial port failed: {}", e)))
    }

    fn try_clone_for_worker(&self) -> Result<Self, SweepError> {
        self.try_clone()
    }
}

impl Drop for SerialPort {
    fn drop(&mut self) {
        let _ = self.flush();
        let _ = unistd::close(self.fd);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_bitrate_is_rejected() {
        assert!(baud_rate(123456).is_err());
    }

    #[test]
    fn default_bitrate_is_supported() {
        assert!(baud_rate(115200).is_ok());
    }
}

/// In-memory [`Transport`] used by integration and unit tests so the
/// suite never touches real hardware. Public only under `cfg(test)` or the
/// `test-util` feature — never part of the normal build.
#[cfg(any(test, feature = "test-util"))]
pub mod test_support {
    use super::Transport;
    use crate::error::SweepError;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    #[derive(Clone)]
    pub struct MockTransport {
        inner: Arc<Mutex<Inner>>,
    }

    struct Inner {
        /// Bytes scripted to be returned by successive `read_exact` calls,
        /// queued whole-frame at a time.
        pending_reads: VecDeque<u8>,
        written: Vec<u8>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            MockTransport {
                inner: Arc::new(Mutex::new(Inner {
                    pending_reads: VecDeque::new(),
                    written: Vec::new(),
                })),
            }
        }

        /// Appends bytes to be returned by future reads, in order.
        pub fn queue_read(&self, bytes: &[u8]) {
            self.inner.lock().unwrap().pending_reads.extend(bytes);
        }

        /// Drops any unread scripted bytes.
        pub fn clear_script(&self) {
            self.inner.lock().unwrap().pending_reads.clear();
        }

        /// Everything written so far, for assertions.
        pub fn written(&self) -> Vec<u8> {
            self.inner.lock().unwrap().written.clone()
        }
    }

    impl Default for MockTransport {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Transport for MockTransport {
        fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), SweepError> {
            let mut inner = self.inner.lock().unwrap();
            if inner.pending_reads.len() < buf.len() {
                return Err(SweepError::Serial(
                    "mock transport exhausted".to_string(),
                ));
            }
            for slot in buf.iter_mut() {
                *slot = inner.pending_reads.pop_front().unwrap();
            }
            Ok(())
        }

        fn write_all(&mut self, buf: &[u8]) -> Result<(), SweepError> {
            self.inner.lock().unwrap().written.extend_from_slice(buf);
            Ok(())
        }

        fn flush(&mut self) -> Result<(), SweepError> {
            Ok(())
        }

        fn try_clone_for_worker(&self) -> Result<Self, SweepError> {
            Ok(self.clone())
        }
    }
}
