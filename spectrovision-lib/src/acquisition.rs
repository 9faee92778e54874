//! Auto-integration and the timing of one measurement cycle.

use crate::constants::{
    MAX_AUTO_INTEGRATION_US, MIN_AUTO_INTEGRATION_US, MIN_INTEGRATION_US, SATURATED_INTEGRATION_US,
    SATURATION_COUNTS, SETTLE_MARGIN, SETTLE_SLICE, TARGET, TARGET_HIGH, TARGET_LOW,
};
use std::time::Duration;
use strum_macros::Display;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::trace;

/// Saturated pixel count that drops straight to the fixed short exposure.
const HEAVY_SATURATION_PIXELS: usize = 600;
/// Saturated pixel count that cuts the exposure to a quarter.
const MODERATE_SATURATION_PIXELS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum AcquisitionState {
    Idle,
    Requested,
    AutoAdjusting(usize),
    Ready,
}

/// Peak and saturation of one raw scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanStats {
    pub peak: u16,
    pub saturated: usize,
}

impl ScanStats {
    pub fn of(counts: &[u16]) -> Self {
        Self {
            peak: counts.iter().copied().max().unwrap_or(0),
            saturated: counts.iter().filter(|&&c| c > SATURATION_COUNTS).count(),
        }
    }
}

/// Next integration time for a scan taken at `current_us`, or `None` when the
/// peak already sits in the target band.
pub fn auto_integrate(counts: &[u16], current_us: u32) -> Option<u32> {
    let stats = ScanStats::of(counts);
    let current = f64::from(current_us);

    let next = if stats.peak > TARGET_HIGH {
        if stats.saturated >= HEAVY_SATURATION_PIXELS {
            SATURATED_INTEGRATION_US
        } else if stats.saturated >= MODERATE_SATURATION_PIXELS {
            (current * 0.25) as u32
        } else {
            (current * 0.8) as u32
        }
    } else if stats.peak < TARGET_LOW && current_us < MAX_AUTO_INTEGRATION_US {
        let scaled = if stats.peak == 0 {
            MAX_AUTO_INTEGRATION_US
        } else {
            (current * TARGET / f64::from(stats.peak)).min(f64::from(MAX_AUTO_INTEGRATION_US)) as u32
        };
        if scaled < MIN_AUTO_INTEGRATION_US {
            MIN_AUTO_INTEGRATION_US * 4
        } else {
            scaled
        }
    } else {
        return None;
    };

    let next = next.max(MIN_INTEGRATION_US);
    trace!(peak = stats.peak, saturated = stats.saturated, current_us, next, "Auto-integration step");
    (next != current_us).then_some(next)
}

/// How long the head needs to finish `averaging` scans of `integration_us`.
pub fn settle_duration(integration_us: u32, averaging: u16) -> Duration {
    Duration::from_micros(u64::from(integration_us) * u64::from(averaging.max(1))) + SETTLE_MARGIN
}

/// Sleep for `duration` in short slices, returning `false` as soon as `stop` is raised.
pub async fn wait_settled(duration: Duration, stop: &mut watch::Receiver<bool>) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if *stop.borrow() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        let slice = SETTLE_SLICE.min(deadline - now);
        tokio::select! {
            _ = tokio::time::sleep(slice) => {}
            changed = stop.changed() => {
                if changed.is_err() {
                    // sender gone, nobody can cancel any more
                    tokio::time::sleep_until(deadline).await;
                    return true;
                }
            }
        }
    }
}
