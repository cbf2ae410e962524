//! Dynamic tool health.

use serde::{Deserialize, Serialize};

/// Health of one tool, recomputed per query.
///
/// `available == false` always implies `healthy == false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolStatus {
    pub name: String,
    pub available: bool,
    pub healthy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ToolStatus {
    /// Available and healthy.
    pub fn healthy(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            available: true,
            healthy: true,
            error: None,
            version: None,
        }
    }

    /// Reachable but failing its own checks.
    pub fn unhealthy(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            available: true,
            healthy: false,
            error: Some(error.into()),
            version: None,
        }
    }

    /// Cannot be used at all.
    pub fn unavailable(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            available: false,
            healthy: false,
            error: Some(error.into()),
            version: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Enforce `available == false ⇒ healthy == false` on adapter-reported statuses.
    pub fn normalized(mut self) -> Self {
        if !self.available {
            self.healthy = false;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_is_never_healthy() {
        let status = ToolStatus::unavailable("aider", "no module aider");
        assert!(!status.available);
        assert!(!status.healthy);

        let forged = ToolStatus {
            available: false,
            healthy: true,
            ..ToolStatus::healthy("x")
        };
        assert!(!forged.normalized().healthy);
    }

    #[test]
    fn test_serialization_skips_empty_fields() {
        let value = serde_json::to_value(ToolStatus::healthy("semgrep").with_version("1.2")).unwrap();
        assert_eq!(value["version"], "1.2");
        assert!(value.get("error").is_none());
    }
}
