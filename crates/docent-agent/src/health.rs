//! Health report for the two external dependencies.

use std::fmt;

use serde::Serialize;

/// Health of one dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Unhealthy(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Unhealthy(reason) => write!(f, "unhealthy ({})", reason),
        }
    }
}

/// Combined status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Overall {
    Healthy,
    Degraded,
}

impl fmt::Display for Overall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
        }
    }
}

/// Result of [`ConversationSession::health_check`](crate::session::ConversationSession::health_check).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub completion_api: HealthStatus,
    pub tool_server: HealthStatus,
    pub overall: Overall,
}

impl HealthReport {
    pub fn new(completion_api: HealthStatus, tool_server: HealthStatus) -> Self {
        let overall = if completion_api.is_healthy() && tool_server.is_healthy() {
            Overall::Healthy
        } else {
            Overall::Degraded
        };
        Self {
            completion_api,
            tool_server,
            overall,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overall() {
        let ok = HealthReport::new(HealthStatus::Healthy, HealthStatus::Healthy);
        assert_eq!(ok.overall, Overall::Healthy);

        let degraded = HealthReport::new(
            HealthStatus::Healthy,
            HealthStatus::Unhealthy("connection refused".to_string()),
        );
        assert_eq!(degraded.overall, Overall::Degraded);

        let both = HealthReport::new(
            HealthStatus::Unhealthy("500".to_string()),
            HealthStatus::Unhealthy("down".to_string()),
        );
        assert_eq!(both.overall, Overall::Degraded);
    }

    #[test]
    fn test_serialize() {
        let report = HealthReport::new(
            HealthStatus::Healthy,
            HealthStatus::Unhealthy("down".to_string()),
        );
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["completion_api"]["status"], "healthy");
        assert_eq!(value["tool_server"]["status"], "unhealthy");
        assert_eq!(value["tool_server"]["reason"], "down");
        assert_eq!(value["overall"], "degraded");
    }
}
