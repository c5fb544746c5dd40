//! Proxy process status as reported by the authority
//!
//! The authority answers `GET /nginx_status` with the raw docker container
//! attributes of the proxy container. Only the `State` block is of interest
//! here; everything else is ignored on decode.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Run state of the remote proxy process.
#[derive(Debug, Clone, PartialEq)]
pub struct NginxStatus {
    pub running: bool,
    /// Docker state label: "running", "exited", "restarting", ...
    pub state: String,
    /// When the container last started. `None` if it never has (docker
    /// reports the zero timestamp `0001-01-01T00:00:00Z` in that case).
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ContainerAttrs {
    #[serde(rename = "State")]
    state: ContainerState,
}

#[derive(Debug, Deserialize)]
struct ContainerState {
    #[serde(rename = "Status")]
    status: String,
    #[serde(rename = "Running")]
    running: bool,
    #[serde(rename = "StartedAt", default)]
    started_at: String,
}

impl<'de> Deserialize<'de> for NginxStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let attrs = ContainerAttrs::deserialize(deserializer)?;
        let started_at = DateTime::parse_from_rfc3339(&attrs.state.started_at)
            .ok()
            .map(|t| t.with_timezone(&Utc))
            .filter(|t| t.timestamp() > 0);

        Ok(NginxStatus {
            running: attrs.state.running,
            state: attrs.state.status,
            started_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_running_container_attrs() {
        // Trimmed-down docker inspect output; unknown keys are ignored.
        let json = r#"{
            "Id": "abc123",
            "State": {
                "Status": "running",
                "Running": true,
                "Paused": false,
                "StartedAt": "2024-05-01T12:30:00.123456789Z"
            },
            "NetworkSettings": {}
        }"#;
        let status: NginxStatus = serde_json::from_str(json).unwrap();
        assert!(status.running);
        assert_eq!(status.state, "running");
        let started = status.started_at.unwrap();
        assert_eq!(started.format("%Y-%m-%d").to_string(), "2024-05-01");
    }

    #[test]
    fn zero_timestamp_means_never_started() {
        let json = r#"{
            "State": {
                "Status": "created",
                "Running": false,
                "StartedAt": "0001-01-01T00:00:00Z"
            }
        }"#;
        let status: NginxStatus = serde_json::from_str(json).unwrap();
        assert!(!status.running);
        assert_eq!(status.state, "created");
        assert_eq!(status.started_at, None);
    }

    #[test]
    fn missing_started_at_is_tolerated() {
        let json = r#"{"State": {"Status": "exited", "Running": false}}"#;
        let status: NginxStatus = serde_json::from_str(json).unwrap();
        assert_eq!(status.started_at, None);
    }
}
