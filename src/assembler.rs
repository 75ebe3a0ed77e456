//! Dedicated worker that turns the raw sample stream into completed scans.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::data::{Sample, Scan};
use crate::error::SweepError;
use crate::protocol::ResponseSample;
use crate::queue::BoundedScanQueue;
use crate::serial::Transport;

/// Runs until `stop` is set or a protocol/serial error occurs, at which
/// point it publishes the error (if any) and returns. Intended to be run
/// on its own thread by `Device::start_scanning`.
pub(crate) fn run(
    mut port: impl Transport,
    queue: Arc<BoundedScanQueue>,
    stop: Arc<AtomicBool>,
) {
    let mut buffer: Vec<Sample> = Vec::new();
    #[cfg(feature = "log")]
    log::debug!("scan assembly worker started");

    loop {
        if stop.load(Ordering::Relaxed) {
            #[cfg(feature = "log")]
            log::debug!("scan assembly worker stopping on signal");
            return;
        }

        let mut raw = [0u8; ResponseSample::LEN];
        if let Err(e) = port.read_exact(&mut raw) {
            if !stop.load(Ordering::Relaxed) {
                #[cfg(feature = "log")]
                log::error!("scan assembly worker read failed: {}", e);
                queue.enqueue_error(&e);
            }
            return;
        }

        if stop.load(Ordering::Relaxed) {
            #[cfg(feature = "log")]
            log::debug!("scan assembly worker stopping on signal");
            return;
        }

        let sample = match ResponseSample::decode(&raw) {
            Ok(s) => s,
            Err(e) => {
                #[cfg(feature = "log")]
                log::error!("scan assembly worker decode failed: {}", e);
                queue.enqueue_error(&e);
                return;
            }
        };

        if sample.is_sync() {
            if buffer.len() >= 2 {
                let completed = std::mem::take(&mut buffer);
                queue.enqueue_scan(Scan::new(completed));
            } else {
                buffer.clear();
            }
            if !sample.is_error() {
                buffer.push(Sample::new(
                    sample.angle_millideg(),
                    sample.distance_cm,
                    sample.signal_strength,
                ));
            }
            continue;
        }

        if sample.is_error() {
            continue;
        }

        buffer.push(Sample::new(
            sample.angle_millideg(),
            sample.distance_cm,
            sample.signal_strength,
        ));
    }
}
