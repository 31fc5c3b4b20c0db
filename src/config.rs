use std::collections::HashMap;

use tracing::trace;

use crate::AlarmType;

/// Severity boundaries for one metric.
///
/// Classification checks `critical`, `major`, `minor` in that order and
/// uses `clear` as the release boundary. The four values are *not*
/// validated for monotonic ordering; a misconfigured set simply yields
/// whatever the first matching comparison produces.
#[derive(Debug, Clone, Copy, serde::Deserialize)]
pub struct ThresholdSet {
    pub critical: f64,
    pub major: f64,
    pub minor: f64,
    pub clear: f64,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct MonitorConfig {
    /// Per-metric threshold sets for automatic alarm creation.
    #[serde(default = "default_thresholds")]
    pub thresholds: HashMap<String, ThresholdSet>,

    /// Seconds between evaluation cycles.
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,

    /// Look-back window when reading the most recent sample of a metric.
    #[serde(default = "default_lookback")]
    pub lookback_secs: u64,

    /// Seconds between performance-job readiness checks. Much shorter than
    /// any job's reporting period; readiness is decided per job.
    #[serde(default = "default_report_check_interval")]
    pub report_check_interval_secs: u64,

    /// Timeout for a single notification POST.
    #[serde(default = "default_delivery_timeout")]
    pub delivery_timeout_secs: u64,

    /// Timeout for a single performance-report POST.
    #[serde(default = "default_report_delivery_timeout")]
    pub report_delivery_timeout_secs: u64,

    /// Delivery attempts per notification before it is dropped.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Resource types whose extensions carry process information and get
    /// process liveness/usage checks.
    #[serde(default = "default_process_resource_types")]
    pub process_resource_types: Vec<String>,

    /// Master switch for the threshold evaluation loop.
    #[serde(default = "default_true")]
    pub enable_automatic_alarms: bool,

    /// Whether alarm state transitions enqueue notifications.
    #[serde(default = "default_true")]
    pub send_notifications: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            thresholds: default_thresholds(),
            check_interval_secs: default_check_interval(),
            lookback_secs: default_lookback(),
            report_check_interval_secs: default_report_check_interval(),
            delivery_timeout_secs: default_delivery_timeout(),
            report_delivery_timeout_secs: default_report_delivery_timeout(),
            max_retries: default_max_retries(),
            process_resource_types: default_process_resource_types(),
            enable_automatic_alarms: true,
            send_notifications: true,
        }
    }
}

fn default_check_interval() -> u64 {
    60
}

fn default_lookback() -> u64 {
    120
}

fn default_report_check_interval() -> u64 {
    10
}

fn default_delivery_timeout() -> u64 {
    5
}

fn default_report_delivery_timeout() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    3
}

fn default_process_resource_types() -> Vec<String> {
    vec!["type-ran-gnb".to_string()]
}

fn default_true() -> bool {
    true
}

/// Built-in threshold table, used when the config file does not override it.
pub fn default_thresholds() -> HashMap<String, ThresholdSet> {
    HashMap::from([
        (
            "cpu_usage".to_string(),
            ThresholdSet {
                critical: 95.0,
                major: 90.0,
                minor: 80.0,
                clear: 75.0,
            },
        ),
        (
            "memory_usage".to_string(),
            ThresholdSet {
                critical: 90.0,
                major: 85.0,
                minor: 75.0,
                clear: 70.0,
            },
        ),
        (
            "disk_usage".to_string(),
            ThresholdSet {
                critical: 95.0,
                major: 90.0,
                minor: 85.0,
                clear: 80.0,
            },
        ),
        (
            "process_cpu".to_string(),
            ThresholdSet {
                critical: 95.0,
                major: 85.0,
                minor: 75.0,
                clear: 70.0,
            },
        ),
        (
            "process_memory".to_string(),
            ThresholdSet {
                critical: 90.0,
                major: 80.0,
                minor: 70.0,
                clear: 65.0,
            },
        ),
    ])
}

/// Fault category for a metric or condition key.
pub fn alarm_type_for(condition: &str) -> AlarmType {
    match condition {
        "cpu_usage" | "process_cpu" => AlarmType::ProcessingError,
        "memory_usage" | "process_memory" => AlarmType::MemoryError,
        "disk_usage" => AlarmType::StorageCapacityProblem,
        "process_not_found" => AlarmType::CommunicationsAlarm,
        "resource_state_change" => AlarmType::EquipmentAlarm,
        _ => AlarmType::Other,
    }
}

/// Human-readable probable cause for a threshold crossing.
pub fn probable_cause_for(condition: &str, value: f64, threshold: f64) -> String {
    match condition {
        "cpu_usage" => format!("System CPU usage {value:.1}% exceeds {threshold}% threshold"),
        "memory_usage" => {
            format!("System memory usage {value:.1}% exceeds {threshold}% threshold")
        }
        "disk_usage" => format!("Disk usage {value:.1}% exceeds {threshold}% threshold"),
        "process_cpu" => format!("Process CPU usage {value:.1}% exceeds {threshold}% threshold"),
        "process_memory" => {
            format!("Process memory usage {value:.1}% exceeds {threshold}% threshold")
        }
        _ => format!("Threshold exceeded: {value:.1} over {threshold}"),
    }
}

pub fn read_config_file(path: &str) -> anyhow::Result<MonitorConfig> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str(&file_content)
        .map_err(|_| anyhow::anyhow!("Invalid configuration file provided!"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}
