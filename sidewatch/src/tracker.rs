//! Last-known-block tracking and new-block detection.
//!
//! The tracker owns the single piece of mutable state in the daemon: the
//! highest side height confirmed so far. Both the event stream handler and
//! the periodic poller feed their observations through [`BlockTracker::evaluate`],
//! which decides whether an observed height is a new block, a duplicate, or
//! a regression. Because the read-compare-write happens under one mutex
//! acquisition, two sources observing the same height can never both be
//! told it is new.

use parking_lot::Mutex;

/// Result of evaluating an observed side height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// First observation since startup. Callers must not notify on this
    /// path, or every restart would announce a stale block.
    Initialized,

    /// The height advanced by `delta`. Callers notify.
    NewBlock { delta: u64 },

    /// Same height as before. Nothing to do.
    NoChange,

    /// The height went backwards by `delta`, which usually means a
    /// sidechain reorg or a flaky data source. The tracker adopts the
    /// lower value so it cannot get stuck above the real tip; callers
    /// log a warning and do not notify.
    Regression { delta: u64 },
}

/// Tracks the last known side height across observation sources.
#[derive(Debug, Default)]
pub struct BlockTracker {
    height: Mutex<Option<u64>>,
}

impl BlockTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate an observed height against the tracked state.
    ///
    /// Always adopts the observed value (the latest observation wins,
    /// whether higher or lower), and reports how it relates to the
    /// previous one. Atomic with respect to concurrent callers.
    pub fn evaluate(&self, observed: u64) -> Outcome {
        let mut height = self.height.lock();
        match *height {
            None => {
                *height = Some(observed);
                Outcome::Initialized
            }
            Some(prev) if observed > prev => {
                *height = Some(observed);
                Outcome::NewBlock {
                    delta: observed - prev,
                }
            }
            Some(prev) if observed < prev => {
                *height = Some(observed);
                Outcome::Regression {
                    delta: prev - observed,
                }
            }
            Some(_) => Outcome::NoChange,
        }
    }

    /// The last height adopted, if any observation has been made yet.
    pub fn height(&self) -> Option<u64> {
        *self.height.lock()
    }
}
