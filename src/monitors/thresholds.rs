//! Threshold classification
//!
//! Pure severity classification of a metric value against its threshold
//! set. The comparison chain is fixed highest-severity-first; the gap
//! between `clear` and `minor` is a hysteresis band in which an existing
//! alarm persists unchanged, which keeps values oscillating around a
//! boundary from flapping.

use crate::Severity;
use crate::config::ThresholdSet;

/// Outcome of classifying one sample against its threshold set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThresholdDecision {
    /// Value crossed a severity boundary; raise or update an alarm.
    Raise(Severity),

    /// Value is below the clear boundary; release any open alarm.
    Clear,

    /// Value is in the hysteresis band; leave existing state untouched.
    Hold,
}

/// Classify a value against its threshold set, highest severity first.
///
/// The threshold set is deliberately not validated for monotonic ordering;
/// with a misordered set the first matching branch wins.
pub fn classify(value: f64, thresholds: &ThresholdSet) -> ThresholdDecision {
    if value >= thresholds.critical {
        return ThresholdDecision::Raise(Severity::Critical);
    }
    if value >= thresholds.major {
        return ThresholdDecision::Raise(Severity::Major);
    }
    if value >= thresholds.minor {
        return ThresholdDecision::Raise(Severity::Minor);
    }
    if value < thresholds.clear {
        return ThresholdDecision::Clear;
    }

    ThresholdDecision::Hold
}

/// The boundary value that produced a severity, used for cause messages.
pub fn matched_threshold(severity: Severity, thresholds: &ThresholdSet) -> f64 {
    match severity {
        Severity::Critical => thresholds.critical,
        Severity::Major => thresholds.major,
        Severity::Minor => thresholds.minor,
        Severity::Warning => thresholds.clear,
    }
}
