//! Bounded, thread-safe handoff between the scan-assembly worker and the
//! caller blocked in `Device::get_scan`.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};

use crate::data::Scan;
use crate::error::SweepError;

const CAPACITY: usize = 20;

struct Inner {
    scans: VecDeque<Scan>,
    /// Set once by the worker on its way out; sticky once the scan
    /// backlog above has fully drained. Kept as the original `SweepError`
    /// so its kind (`Serial`, `Protocol`, ...) survives to the caller.
    error: Option<SweepError>,
}

/// FIFO of completed [`Scan`]s, bounded to [`CAPACITY`] with drop-oldest
/// overflow, plus a one-shot terminal error slot.
pub(crate) struct BoundedScanQueue {
    inner: Mutex<Inner>,
    not_empty: Condvar,
}

impl BoundedScanQueue {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(BoundedScanQueue {
            inner: Mutex::new(Inner {
                scans: VecDeque::with_capacity(CAPACITY),
                error: None,
            }),
            not_empty: Condvar::new(),
        })
    }

    /// Never blocks. Drops the oldest scan first if already at capacity.
    pub(crate) fn enqueue_scan(&self, scan: Scan) {
        let mut inner = self.inner.lock().unwrap();
        if inner.scans.len() == CAPACITY {
            inner.scans.pop_front();
        }
        inner.scans.push_back(scan);
        self.not_empty.notify_one();
    }

    /// Publishes a terminal condition. Any scans already queued are still
    /// drained first, in order; only once the queue empties does every
    /// subsequent `dequeue` return this error.
    pub(crate) fn enqueue_error(&self, err: &SweepError) {
        let mut inner = self.inner.lock().unwrap();
        inner.error = Some(err.clone());
        self.not_empty.notify_one();
    }

    /// Blocks until a scan or the terminal error is available.
    pub(crate) fn dequeue(&self) -> Result<Scan, SweepError> {
        let mut inner = self.inner.lock().unwrap();
        loop {
            if let Some(scan) = inner.scans.pop_front() {
                return Ok(scan);
            }
            if let Some(err) = &inner.error {
                return Err(err.clone());
            }
            inner = self.not_empty.wait(inner).unwrap();
        }
    }

    /// Empties the queue. Used only on the `start_scanning` transition; a
    /// fresh queue is what actually clears a prior sticky error.
    pub(crate) fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.scans.clear();
        inner.error = None;
    }

    /// Non-blocking peek used only by tests to assert on empty-vs-pending
    /// state without risking a hang.
    #[cfg(test)]
    pub(crate) fn is_empty_and_no_error(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.scans.is_empty() && inner.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Sample;
    use std::thread;
    use std::time::Duration;

    fn scan_with_marker(marker: i32) -> Scan {
        Scan::new(vec![Sample::new(marker, marker, 0)])
    }

    fn marker_of(scan: &Scan) -> i32 {
        scan.samples()[0].angle_millideg
    }

    #[test]
    fn overflow_drops_oldest_keeps_newest_in_order() {
        let queue = BoundedScanQueue::new();
        for i in 1..=25 {
            queue.enqueue_scan(scan_with_marker(i));
        }
        let mut seen = Vec::new();
        for _ in 0..20 {
            seen.push(marker_of(&queue.dequeue().unwrap()));
        }
        assert_eq!(seen, (6..=25).collect::<Vec<_>>());
    }

    #[test]
    fn dequeue_blocks_until_enqueue() {
        let queue = BoundedScanQueue::new();
        let worker_queue = Arc::clone(&queue);
        let handle = thread::spawn(move || worker_queue.dequeue().unwrap());

        thread::sleep(Duration::from_millis(20));
        queue.enqueue_scan(scan_with_marker(42));

        let scan = handle.join().unwrap();
        assert_eq!(marker_of(&scan), 42);
    }

    #[test]
    fn error_surfaces_only_after_backlog_drains() {
        let queue = BoundedScanQueue::new();
        queue.enqueue_scan(scan_with_marker(1));
        queue.enqueue_error(&SweepError::Protocol("boom".to_string()));

        assert_eq!(marker_of(&queue.dequeue().unwrap()), 1);
        assert!(queue.dequeue().is_err());
        assert!(queue.dequeue().is_err());
    }

    #[test]
    fn clear_resets_backlog_and_error() {
        let queue = BoundedScanQueue::new();
        queue.enqueue_scan(scan_with_marker(1));
        queue.enqueue_error(&SweepError::Protocol("boom".to_string()));
        queue.clear();

        let worker_queue = Arc::clone(&queue);
        let handle = thread::spawn(move || worker_queue.dequeue().unwrap());
        thread::sleep(Duration::from_millis(20));
        queue.enqueue_scan(scan_with_marker(7));
        assert_eq!(marker_of(&handle.join().unwrap()), 7);
    }

    #[test]
    fn overflow_capacity_three_scenario() {
        let queue = BoundedScanQueue::new();
        for i in 1..=10 {
            queue.enqueue_scan_bounded(3, scan_with_marker(i));
        }
        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(marker_of(&queue.dequeue().unwrap()));
        }
        assert_eq!(seen, vec![8, 9, 10]);
    }

    impl BoundedScanQueue {
        /// Test-only helper emulating a smaller capacity than the
        /// production constant, for scenario coverage.
        fn enqueue_scan_bounded(&self, capacity: usize, scan: Scan) {
            let mut inner = self.inner.lock().unwrap();
            if inner.scans.len() == capacity {
                inner.scans.pop_front();
            }
            inner.scans.push_back(scan);
            self.not_empty.notify_one();
        }
    }
}
