//! Translation of feed events into [`InboundEvent`]s
//!
//! The monitoring backend pushes many more events than the bridge needs; only
//! `monitorList`, `heartbeatList`, `heartbeat` and `uptime` are decoded, the
//! rest are ignored.

use crate::error::EventError;
use crate::events::{Heartbeat, InboundEvent, MonitorId, RawStatus};
use crate::registry::Monitor;
use log::warn;
use serde::Deserialize;
use serde_json::Value;

/// Decode a named feed event
///
/// Returns `Ok(None)` for events the bridge does not consume.
pub fn decode_event(name: &str, args: &[Value]) -> Result<Option<InboundEvent>, EventError> {
    let event = match name {
        "monitorList" => InboundEvent::MonitorList(monitor_list(arg(args, 0, name)?)?),
        "heartbeatList" => {
            let monitor_id = monitor_id(arg(args, 0, name)?)?;
            let entries = arg(args, 1, name)?
                .as_array()
                .ok_or_else(|| EventError::Malformed("heartbeat list is not an array".to_string()))?;
            let heartbeats = heartbeat_list(monitor_id, entries)?;
            let overwrite = args.get(2).and_then(Value::as_bool).unwrap_or(false);

            InboundEvent::HeartbeatList {
                monitor_id,
                heartbeats,
                overwrite,
            }
        }
        "heartbeat" => InboundEvent::Heartbeat(heartbeat(arg(args, 0, name)?, None)?),
        "uptime" => InboundEvent::Uptime {
            monitor_id: monitor_id(arg(args, 0, name)?)?,
        },
        _ => return Ok(None),
    };

    Ok(Some(event))
}

fn arg<'a>(args: &'a [Value], index: usize, event: &str) -> Result<&'a Value, EventError> {
    args.get(index).ok_or_else(|| {
        EventError::Malformed(format!("{} is missing argument {}", event, index))
    })
}

/// Monitor ids arrive as numbers, and occasionally as numeric strings
fn monitor_id(value: &Value) -> Result<MonitorId, EventError> {
    match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| EventError::Malformed(format!("invalid monitor id {}", value)))
}

/// The listing is an object keyed by monitor id
///
/// A single unreadable monitor is skipped rather than failing the whole listing.
fn monitor_list(value: &Value) -> Result<Vec<Monitor>, EventError> {
    let listing = value
        .as_object()
        .ok_or_else(|| EventError::Malformed("monitor list is not an object".to_string()))?;

    let mut monitors: Vec<Monitor> = listing
        .iter()
        .filter_map(|(key, entry)| match Monitor::deserialize(entry) {
            Ok(monitor) => Some(monitor),
            Err(e) => {
                warn!(target: "kuma", "Skipping unreadable monitor {}: {}", key, e);
                None
            }
        })
        .collect();
    monitors.sort_by_key(|monitor| monitor.id);

    Ok(monitors)
}

/// Only the last entry is ever recorded, so it alone has to be readable
fn heartbeat_list(monitor_id: MonitorId, entries: &[Value]) -> Result<Vec<Heartbeat>, EventError> {
    let Some((last, older)) = entries.split_last() else {
        return Ok(Vec::new());
    };

    let mut heartbeats: Vec<Heartbeat> = older
        .iter()
        .filter_map(|entry| match heartbeat(entry, Some(monitor_id)) {
            Ok(heartbeat) => Some(heartbeat),
            Err(e) => {
                warn!(target: "kuma", "Skipping unreadable heartbeat for monitor {}: {}", monitor_id, e);
                None
            }
        })
        .collect();
    heartbeats.push(heartbeat(last, Some(monitor_id))?);

    Ok(heartbeats)
}

fn heartbeat(value: &Value, fallback_id: Option<MonitorId>) -> Result<Heartbeat, EventError> {
    let record = value
        .as_object()
        .ok_or_else(|| EventError::Malformed("heartbeat is not an object".to_string()))?;

    let monitor_id = match record.get("monitorID").or_else(|| record.get("monitor_id")) {
        Some(id) => monitor_id(id)?,
        None => fallback_id
            .ok_or_else(|| EventError::Malformed("heartbeat without monitor id".to_string()))?,
    };
    let status = record
        .get("status")
        .ok_or_else(|| EventError::Malformed("heartbeat without status".to_string()))?;
    let status = RawStatus::deserialize(status)?;
    let latency = record.get("ping").and_then(Value::as_f64).unwrap_or(0.0);

    Ok(Heartbeat::new(monitor_id, status, latency))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MonitorKind;
    use serde_json::json;

    #[test]
    fn test_decode_monitor_list() {
        let args = vec![json!({
            "2": {"id": 2, "name": "DB", "type": "port", "active": true, "tags": []},
            "1": {"id": 1, "name": "Web", "type": "http", "active": 1,
                  "tags": [{"name": "kener", "value": "web"}]},
            "3": {"name": "broken"}
        })];

        let event = decode_event("monitorList", &args).unwrap().unwrap();
        match event {
            InboundEvent::MonitorList(monitors) => {
                assert_eq!(monitors.len(), 2);
                assert_eq!(monitors[0].id, 1);
                assert_eq!(monitors[0].tag_value("kener"), Some("web"));
                assert_eq!(monitors[1].kind, MonitorKind::Port);
            }
            other => panic!("Expected MonitorList, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_heartbeat() {
        let args = vec![json!({
            "monitorID": 7,
            "status": 1,
            "time": "2024-03-01 12:00:00.000",
            "msg": "200 - OK",
            "ping": 123,
            "important": false,
            "duration": 60
        })];

        let event = decode_event("heartbeat", &args).unwrap().unwrap();
        assert_eq!(event, InboundEvent::Heartbeat(Heartbeat::up(7, 123.0)));
    }

    #[test]
    fn test_decode_heartbeat_with_null_ping() {
        let args = vec![json!({"monitorID": 7, "status": 0, "ping": null})];

        let event = decode_event("heartbeat", &args).unwrap().unwrap();
        assert_eq!(event, InboundEvent::Heartbeat(Heartbeat::down(7)));
    }

    #[test]
    fn test_decode_heartbeat_list() {
        let args = vec![
            json!(7),
            json!([
                {"monitor_id": 7, "status": 0, "ping": null},
                {"status": 1, "ping": 40}
            ]),
            json!(true),
        ];

        let event = decode_event("heartbeatList", &args).unwrap().unwrap();
        assert_eq!(
            event,
            InboundEvent::HeartbeatList {
                monitor_id: 7,
                heartbeats: vec![Heartbeat::down(7), Heartbeat::up(7, 40.0)],
                overwrite: true,
            }
        );
    }

    #[test]
    fn test_decode_heartbeat_list_defaults_overwrite() {
        let args = vec![json!("7"), json!([])];

        let event = decode_event("heartbeatList", &args).unwrap().unwrap();
        assert_eq!(
            event,
            InboundEvent::HeartbeatList {
                monitor_id: 7,
                heartbeats: vec![],
                overwrite: false,
            }
        );
    }

    #[test]
    fn test_decode_heartbeat_list_skips_unreadable_older_entries() {
        let args = vec![
            json!(7),
            json!([
                {"status": "up"},
                "nope",
                {"status": 0},
                {"status": 1, "ping": 40}
            ]),
        ];

        let event = decode_event("heartbeatList", &args).unwrap().unwrap();
        assert_eq!(
            event,
            InboundEvent::HeartbeatList {
                monitor_id: 7,
                heartbeats: vec![Heartbeat::down(7), Heartbeat::up(7, 40.0)],
                overwrite: false,
            }
        );
    }

    #[test]
    fn test_decode_heartbeat_list_rejects_unreadable_last_entry() {
        let args = vec![json!(7), json!([{"status": 1, "ping": 40}, {"ping": 12}])];

        assert!(matches!(
            decode_event("heartbeatList", &args),
            Err(EventError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_uptime_ignores_extra_fields() {
        let args = vec![json!(7), json!(24), json!(0.9998)];

        let event = decode_event("uptime", &args).unwrap().unwrap();
        assert_eq!(event, InboundEvent::Uptime { monitor_id: 7 });
    }

    #[test]
    fn test_unconsumed_events_are_ignored() {
        assert!(decode_event("avgPing", &[json!(7), json!(12.5)])
            .unwrap()
            .is_none());
        assert!(decode_event("info", &[]).unwrap().is_none());
    }

    #[test]
    fn test_malformed_events() {
        assert!(matches!(
            decode_event("heartbeat", &[]),
            Err(EventError::Malformed(_))
        ));
        assert!(matches!(
            decode_event("heartbeat", &[json!({"status": 1})]),
            Err(EventError::Malformed(_))
        ));
        assert!(matches!(
            decode_event("heartbeat", &[json!({"monitorID": 1, "status": "up"})]),
            Err(EventError::Json(_))
        ));
        assert!(matches!(
            decode_event("uptime", &[json!(-3)]),
            Err(EventError::Malformed(_))
        ));
        assert!(matches!(
            decode_event("monitorList", &[json!([1, 2])]),
            Err(EventError::Malformed(_))
        ));
        assert!(matches!(
            decode_event("heartbeatList", &[json!(1), json!({})]),
            Err(EventError::Malformed(_))
        ));
    }
}
