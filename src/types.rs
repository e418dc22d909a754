use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single controller base URL and its current health state.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub url: String,
    pub healthy: bool,
    pub last_message: String,
}

impl Endpoint {
    pub fn new(url: String) -> Self {
        Self {
            url,
            healthy: true,
            last_message: String::new(),
        }
    }
}

/// The currently selected healthy endpoint. Absent means "no leader".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leader {
    pub url: String,
    pub host: String,
    pub port: u16,
}

impl Leader {
    /// Parse host/port out of a leader URL's authority.
    pub fn parse(url: &str) -> Result<Self, crate::error::DroveError> {
        if url.is_empty() {
            return Err(crate::error::DroveError::Protocol(
                "empty leader endpoint".to_string(),
            ));
        }
        let parsed = url::Url::parse(url)
            .map_err(|e| crate::error::DroveError::Protocol(format!("bad leader url: {e}")))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| crate::error::DroveError::Protocol("leader url has no host".into()))?
            .to_string();
        let port = parsed
            .port_or_known_default()
            .ok_or_else(|| crate::error::DroveError::Protocol("leader url has no port".into()))?;
        Ok(Self {
            url: url.to_string(),
            host,
            port,
        })
    }
}

/// A single host/port endpoint an application is currently running on.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Host {
    pub host: String,
    pub port: u16,
    #[serde(rename = "portType", default)]
    pub port_type: String,
}

/// An immutable application snapshot as returned by the controller.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Application {
    #[serde(rename = "appId")]
    pub id: String,
    pub vhost: String,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    #[serde(default)]
    pub hosts: Vec<Host>,
}

impl Application {
    /// The DNS question name this application answers for (FQDN form).
    pub fn question_name(&self) -> String {
        format!("{}.", self.vhost)
    }
}

/// `GET /apis/v1/endpoints` response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct AppsResponse {
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Vec<Application>,
}

/// Event kind counts as reported by the controller's event summary.
pub type EventsCount = HashMap<String, serde_json::Value>;

/// `data` payload of the events-summary endpoint.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct EventSummary {
    #[serde(rename = "eventsCount", default)]
    pub events_count: EventsCount,
    #[serde(rename = "lastSyncTime", default)]
    pub last_sync_time: i64,
}

impl EventSummary {
    /// True iff the summary reports either of the two event kinds that
    /// should trigger an eager index refresh.
    pub fn triggers_refresh(&self) -> bool {
        self.events_count.contains_key("APP_STATE_CHANGE")
            || self.events_count.contains_key("INSTANCE_STATE_CHANGE")
    }
}

/// `GET /apis/v1/cluster/events/summary` response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct EventsApiResponse {
    pub status: String,
    #[serde(default)]
    pub message: String,
    pub data: EventSummary,
}

pub const STATUS_SUCCESS: &str = "SUCCESS";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_name_appends_trailing_dot() {
        let app = Application {
            id: "PS".into(),
            vhost: "ps.blah".into(),
            tags: HashMap::new(),
            hosts: vec![],
        };
        assert_eq!(app.question_name(), "ps.blah.");
    }

    #[test]
    fn event_summary_triggers_on_app_state_change() {
        let mut events_count = EventsCount::new();
        events_count.insert("APP_STATE_CHANGE".to_string(), serde_json::json!(1));
        let summary = EventSummary {
            events_count,
            last_sync_time: 10,
        };
        assert!(summary.triggers_refresh());
    }

    #[test]
    fn event_summary_triggers_on_instance_state_change() {
        let mut events_count = EventsCount::new();
        events_count.insert("INSTANCE_STATE_CHANGE".to_string(), serde_json::json!(3));
        let summary = EventSummary {
            events_count,
            last_sync_time: 10,
        };
        assert!(summary.triggers_refresh());
    }

    #[test]
    fn event_summary_ignores_unrelated_events() {
        let mut events_count = EventsCount::new();
        events_count.insert("SOMETHING_ELSE".to_string(), serde_json::json!(1));
        let summary = EventSummary {
            events_count,
            last_sync_time: 10,
        };
        assert!(!summary.triggers_refresh());
    }

    #[test]
    fn leader_parses_host_and_port() {
        let leader = Leader::parse("http://127.0.0.1:8080").unwrap();
        assert_eq!(leader.host, "127.0.0.1");
        assert_eq!(leader.port, 8080);
    }

    #[test]
    fn leader_rejects_empty_endpoint() {
        assert!(Leader::parse("").is_err());
    }

    #[test]
    fn apps_response_deserializes_sample_payload() {
        let raw = r#"{"status":"ok","message":"ok","data":[{"appId":"PS","vhost":"ps.blah","tags":{},"hosts":[{"host":"host","port":1234,"portType":"http"}]}]}"#;
        let parsed: AppsResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.data.len(), 1);
        assert_eq!(parsed.data[0].hosts.len(), 1);
        assert_eq!(parsed.data[0].hosts[0].port, 1234);
    }
}
