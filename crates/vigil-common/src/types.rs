use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw state of a monitored entity, as produced by check execution.
///
/// # Examples
///
/// ```
/// use vigil_common::types::ServiceState;
///
/// let state: ServiceState = "critical".parse().unwrap();
/// assert_eq!(state, ServiceState::Critical);
/// assert_eq!(state.to_string(), "critical");
/// assert!(!state.is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl ServiceState {
    /// Whether this is the non-problem state.
    pub fn is_ok(self) -> bool {
        self == ServiceState::Ok
    }
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceState::Ok => write!(f, "ok"),
            ServiceState::Warning => write!(f, "warning"),
            ServiceState::Critical => write!(f, "critical"),
            ServiceState::Unknown => write!(f, "unknown"),
        }
    }
}

impl std::str::FromStr for ServiceState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ok" => Ok(ServiceState::Ok),
            "warning" => Ok(ServiceState::Warning),
            "critical" => Ok(ServiceState::Critical),
            "unknown" => Ok(ServiceState::Unknown),
            _ => Err(format!("unknown service state: {s}")),
        }
    }
}

/// Confirmation level of a state: soft states are transient observations,
/// hard states have been confirmed over the configured number of rechecks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateType {
    Soft,
    Hard,
}

/// The kind of notification a single delivery attempt carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Problem,
    Recovery,
    FlappingStart,
    FlappingEnd,
}

impl NotificationType {
    /// Whether notifications of this type are re-sent as reminders until the
    /// underlying condition resolves. Recoveries and flapping-end are
    /// terminal and never repeat.
    pub fn repeats(self) -> bool {
        matches!(
            self,
            NotificationType::Problem | NotificationType::FlappingStart
        )
    }
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationType::Problem => write!(f, "problem"),
            NotificationType::Recovery => write!(f, "recovery"),
            NotificationType::FlappingStart => write!(f, "flapping_start"),
            NotificationType::FlappingEnd => write!(f, "flapping_end"),
        }
    }
}

/// Which dependency graph a reachability query is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    CheckExecution,
    Notification,
}

/// Immutable outcome of one check execution against a checkable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub id: String,
    pub state: ServiceState,
    pub output: String,
    pub checked_at: DateTime<Utc>,
}

impl CheckResult {
    pub fn new(state: ServiceState, output: impl Into<String>) -> Self {
        Self {
            id: crate::id::next_id(),
            state,
            output: output.into(),
            checked_at: Utc::now(),
        }
    }
}
