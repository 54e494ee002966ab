//! Transport seam: reconnects, status requests and their replies
//!
//! Calls into the transport are fire-and-forget. Whatever they cause comes
//! back later as its own event: a telemetry arrival after a reconnect, or a
//! status reply after a request.

use crate::error::ReplyError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request kind used to poll device status
pub const LATEST_QUOTAS: &str = "latestQuotas";

/// Connection to the device, shared by every monitor
pub trait Transport: Send + Sync {
    /// Drop and re-establish the connection. Must not block.
    fn reconnect(&self);

    /// Publish a request. Must not block; the reply arrives asynchronously.
    fn send_request(&self, request: &StatusRequest);
}

/// Outgoing request message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRequest {
    pub version: String,
    #[serde(rename = "moduleType")]
    pub module_type: u32,
    #[serde(rename = "operateType")]
    pub operate_type: String,
    pub params: serde_json::Map<String, Value>,
}

impl StatusRequest {
    pub fn latest_quotas() -> Self {
        Self {
            version: "1.1".to_string(),
            module_type: 0,
            operate_type: LATEST_QUOTAS.to_string(),
            params: serde_json::Map::new(),
        }
    }

    pub fn request_kind(&self) -> &str {
        &self.operate_type
    }
}

/// Status reply folded into liveness by the active strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReply {
    pub request_kind: String,
    pub online: bool,
    /// Serial number reported by an online device
    pub device_id: Option<String>,
}

#[derive(Deserialize)]
struct RawReply {
    #[serde(rename = "operateType")]
    operate_type: String,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Deserialize)]
struct RawReplyData {
    online: OnlineFlag,
    #[serde(default)]
    sn: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OnlineFlag {
    Bool(bool),
    Int(i64),
}

impl StatusReply {
    /// Parse the first payload of a reply batch, accepting only `expected_kind`
    pub fn parse(payloads: &[Value], expected_kind: &str) -> Result<Self, ReplyError> {
        let first = payloads.first().ok_or(ReplyError::Empty)?;
        let raw: RawReply = serde_json::from_value(first.clone())
            .map_err(|e| ReplyError::Malformed(e.to_string()))?;

        if raw.operate_type != expected_kind {
            return Err(ReplyError::Unmatched {
                expected: expected_kind.to_string(),
                actual: raw.operate_type,
            });
        }

        let data = raw
            .data
            .ok_or_else(|| ReplyError::Malformed("missing `data`".to_string()))?;
        let data: RawReplyData =
            serde_json::from_value(data).map_err(|e| ReplyError::Malformed(e.to_string()))?;

        let online = match data.online {
            OnlineFlag::Bool(b) => b,
            OnlineFlag::Int(n) => n == 1,
        };
        if online && data.sn.is_none() {
            return Err(ReplyError::Malformed(
                "online reply without `sn`".to_string(),
            ));
        }

        Ok(Self {
            request_kind: raw.operate_type,
            online,
            device_id: data.sn,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_shape() {
        let request = serde_json::to_value(StatusRequest::latest_quotas()).unwrap();
        assert_eq!(
            request,
            json!({"version": "1.1", "moduleType": 0, "operateType": "latestQuotas", "params": {}})
        );
    }

    #[test]
    fn test_parse_online_reply() {
        let reply = StatusReply::parse(
            &[json!({"operateType": "latestQuotas", "data": {"online": 1, "sn": "X"}})],
            LATEST_QUOTAS,
        )
        .unwrap();
        assert!(reply.online);
        assert_eq!(reply.device_id.as_deref(), Some("X"));
    }

    #[test]
    fn test_parse_offline_reply_without_sn() {
        let reply = StatusReply::parse(
            &[json!({"operateType": "latestQuotas", "data": {"online": false}})],
            LATEST_QUOTAS,
        )
        .unwrap();
        assert!(!reply.online);
        assert_eq!(reply.device_id, None);
    }

    #[test]
    fn test_only_first_payload_counts() {
        let reply = StatusReply::parse(
            &[
                json!({"operateType": "latestQuotas", "data": {"online": 0}}),
                json!({"operateType": "latestQuotas", "data": {"online": 1, "sn": "Y"}}),
            ],
            LATEST_QUOTAS,
        )
        .unwrap();
        assert!(!reply.online);
    }

    #[test]
    fn test_reply_errors() {
        assert_eq!(StatusReply::parse(&[], LATEST_QUOTAS), Err(ReplyError::Empty));

        assert_eq!(
            StatusReply::parse(&[json!({"operateType": "setQuota", "data": {}})], LATEST_QUOTAS),
            Err(ReplyError::Unmatched {
                expected: "latestQuotas".to_string(),
                actual: "setQuota".to_string(),
            })
        );

        assert!(matches!(
            StatusReply::parse(&[json!({"data": {"online": 1}})], LATEST_QUOTAS),
            Err(ReplyError::Malformed(_))
        ));
        assert!(matches!(
            StatusReply::parse(&[json!({"operateType": "latestQuotas"})], LATEST_QUOTAS),
            Err(ReplyError::Malformed(_))
        ));
        assert!(matches!(
            StatusReply::parse(
                &[json!({"operateType": "latestQuotas", "data": {"online": 1}})],
                LATEST_QUOTAS
            ),
            Err(ReplyError::Malformed(_))
        ));
        assert!(matches!(
            StatusReply::parse(&[json!("latestQuotas")], LATEST_QUOTAS),
            Err(ReplyError::Malformed(_))
        ));
    }
}
