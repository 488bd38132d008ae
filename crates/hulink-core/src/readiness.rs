//! Readiness states reported by sub-components and aggregated by the manager

use serde::{Deserialize, Serialize};

/// Lifecycle state of a sub-component (and of the aggregate built from them).
///
/// ```text
/// SettingUp ──► Ready
///     │           │
///     ├──► Limited ◄─ (partially usable)
///     │
///     └──► Error
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessState {
    /// Initialization still in flight
    SettingUp,
    /// Fully usable
    Ready,
    /// Usable with degraded capability
    Limited,
    /// Unusable
    Error,
}

impl ReadinessState {
    /// Ready and Limited both permit normal operation
    pub fn is_operational(&self) -> bool {
        matches!(self, ReadinessState::Ready | ReadinessState::Limited)
    }
}

impl std::fmt::Display for ReadinessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReadinessState::SettingUp => "setting_up",
            ReadinessState::Ready => "ready",
            ReadinessState::Limited => "limited",
            ReadinessState::Error => "error",
        };
        f.write_str(s)
    }
}
