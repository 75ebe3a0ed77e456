//! Sample and scan data returned to callers.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maximum number of samples a single [`Scan`] may hold.
pub const MAX_SAMPLES_PER_SCAN: usize = 4096;

/// One laser measurement: an angle, a distance, and a signal-strength
/// indicator. Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Sample {
    /// Angle in milli-degrees, in `[0, 360_000)`.
    pub angle_millideg: i32,
    /// Distance in centimeters.
    pub distance_cm: i32,
    /// Signal strength, `0..=255`.
    pub signal_strength: u8,
}

impl Sample {
    pub(crate) fn new(angle_millideg: i32, distance_cm: i32, signal_strength: u8) -> Self {
        Sample {
            angle_millideg,
            distance_cm,
            signal_strength,
        }
    }
}

/// One completed ~360° sweep: samples in device arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Scan {
    samples: Vec<Sample>,
}

impl Scan {
    pub(crate) fn new(samples: Vec<Sample>) -> Self {
        debug_assert!(!samples.is_empty());
        debug_assert!(samples.len() <= MAX_SAMPLES_PER_SCAN);
        Scan { samples }
    }

    /// The samples making up this scan, in arrival order.
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn into_samples(self) -> Vec<Sample> {
        self.samples
    }
}
