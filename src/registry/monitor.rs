use crate::events::MonitorId;
use serde::{Deserialize, Deserializer};

/// Kind of check a monitor performs
///
/// `Group` is the only composite kind; its status comes from its children.
/// Kinds the bridge does not report on are kept as `Unsupported` so the
/// registry can treat them as absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorKind {
    /// HTTP(S) probe
    Http,
    /// Push receiver, the monitored service calls in
    Push,
    /// TCP port check
    Port,
    /// Container state check
    Docker,
    /// HTTP probe asserting on a JSON response
    JsonQuery,
    /// Composite monitor over other monitors
    Group { children: Vec<MonitorId> },
    /// Any kind the bridge does not handle
    Unsupported(String),
}

impl MonitorKind {
    fn from_wire(kind: &str, children: Vec<MonitorId>) -> Self {
        match kind {
            "http" => MonitorKind::Http,
            "push" => MonitorKind::Push,
            "port" => MonitorKind::Port,
            "docker" => MonitorKind::Docker,
            "json-query" => MonitorKind::JsonQuery,
            "group" => MonitorKind::Group { children },
            other => MonitorKind::Unsupported(other.to_string()),
        }
    }

    /// Whether the monitor performs a direct check (as opposed to grouping)
    pub fn is_leaf(&self) -> bool {
        match self {
            MonitorKind::Http
            | MonitorKind::Push
            | MonitorKind::Port
            | MonitorKind::Docker
            | MonitorKind::JsonQuery => true,
            MonitorKind::Group { .. } | MonitorKind::Unsupported(_) => false,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, MonitorKind::Unsupported(_))
    }

    /// Human readable label used in log lines
    pub fn label(&self) -> &str {
        match self {
            MonitorKind::Http => "HTTP",
            MonitorKind::Push => "Push",
            MonitorKind::Port => "Port",
            MonitorKind::Docker => "Docker",
            MonitorKind::JsonQuery => "JSON query",
            MonitorKind::Group { .. } => "Group",
            MonitorKind::Unsupported(kind) => kind,
        }
    }
}

/// A key/value label attached to a monitor
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
}

impl Tag {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }
}

/// Monitor definition as listed by the monitoring backend
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "MonitorRecord")]
pub struct Monitor {
    pub id: MonitorId,
    pub name: String,
    pub kind: MonitorKind,
    pub active: bool,
    pub tags: Vec<Tag>,
}

impl Monitor {
    pub fn new(id: MonitorId, name: impl Into<String>, kind: MonitorKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            active: true,
            tags: Vec::new(),
        }
    }

    pub fn with_tag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push(Tag::new(name, value));
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Value of the first tag with the given name, ignoring blank values
    pub fn tag_value(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|tag| tag.name == name)
            .and_then(|tag| tag.value.as_deref())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    /// Child ids for group monitors, empty for every other kind
    pub fn children(&self) -> &[MonitorId] {
        match &self.kind {
            MonitorKind::Group { children } => children,
            _ => &[],
        }
    }
}

/// Wire shape of a monitor in the `monitorList` event
#[derive(Deserialize)]
struct MonitorRecord {
    id: MonitorId,
    #[serde(default)]
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default = "active_by_default", deserialize_with = "flag")]
    active: bool,
    #[serde(default)]
    tags: Vec<Tag>,
    #[serde(rename = "childrenIDs", default)]
    children_ids: Vec<MonitorId>,
}

impl From<MonitorRecord> for Monitor {
    fn from(record: MonitorRecord) -> Self {
        Monitor {
            id: record.id,
            name: record.name,
            kind: MonitorKind::from_wire(&record.kind, record.children_ids),
            active: record.active,
            tags: record.tags,
        }
    }
}

fn active_by_default() -> bool {
    true
}

/// The backend sends `active` either as a boolean or as 0/1
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Wire {
        Bool(bool),
        Int(i64),
    }

    Ok(match Wire::deserialize(deserializer)? {
        Wire::Bool(value) => value,
        Wire::Int(value) => value != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monitor_deserialization_from_backend_listing() {
        let json = r##"{
            "id": 7,
            "name": "API",
            "type": "http",
            "active": 1,
            "tags": [
                {"tag_id": 1, "monitor_id": 7, "name": "kener", "value": "api", "color": "#fff"},
                {"tag_id": 2, "monitor_id": 7, "name": "max_ping", "value": "500", "color": "#000"}
            ],
            "childrenIDs": []
        }"##;

        let monitor: Monitor = serde_json::from_str(json).unwrap();
        assert_eq!(monitor.id, 7);
        assert_eq!(monitor.name, "API");
        assert_eq!(monitor.kind, MonitorKind::Http);
        assert!(monitor.active);
        assert_eq!(monitor.tag_value("kener"), Some("api"));
        assert_eq!(monitor.tag_value("max_ping"), Some("500"));
    }

    #[test]
    fn test_group_monitor_keeps_children() {
        let json = r#"{"id": 3, "name": "Edge", "type": "group", "active": true, "childrenIDs": [1, 2]}"#;

        let monitor: Monitor = serde_json::from_str(json).unwrap();
        assert_eq!(monitor.kind, MonitorKind::Group { children: vec![1, 2] });
        assert_eq!(monitor.children(), &[1, 2]);
        assert!(monitor.tags.is_empty());
    }

    #[test]
    fn test_unknown_kind_is_unsupported() {
        let json = r#"{"id": 4, "name": "DNS", "type": "dns", "active": false}"#;

        let monitor: Monitor = serde_json::from_str(json).unwrap();
        assert_eq!(monitor.kind, MonitorKind::Unsupported("dns".to_string()));
        assert!(!monitor.kind.is_supported());
        assert!(!monitor.active);
    }

    #[test]
    fn test_blank_tag_value_is_ignored() {
        let monitor = Monitor::new(1, "Web", MonitorKind::Http)
            .with_tag("kener", "  ")
            .with_tag("other", "x");

        assert_eq!(monitor.tag_value("kener"), None);
        assert_eq!(monitor.tag_value("missing"), None);
        assert_eq!(monitor.tag_value("other"), Some("x"));
    }

    #[test]
    fn test_leaf_kinds() {
        assert!(MonitorKind::Http.is_leaf());
        assert!(MonitorKind::Push.is_leaf());
        assert!(MonitorKind::Port.is_leaf());
        assert!(MonitorKind::Docker.is_leaf());
        assert!(MonitorKind::JsonQuery.is_leaf());
        assert!(!MonitorKind::Group { children: vec![] }.is_leaf());
        assert!(!MonitorKind::Unsupported("dns".to_string()).is_leaf());
    }
}
