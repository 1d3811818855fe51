//! Work-item model
//!
//! A [`WorkItem`] is one unit of tenant work headed for the queue. The queue
//! owns delivery guarantees once an item is enqueued; the worker owns
//! execution; nobody owns the `DispatchId`'s identity, which is assigned at
//! creation and immutable.

use printfleet_shared::ids::{DispatchId, TenantId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One unit of tenant work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub dispatch_id: DispatchId,
    pub tenant_id: TenantId,
    /// Opaque program input, flattened into the message body on the wire.
    pub payload: Map<String, Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum WorkItemCodecError {
    #[error("Message body is not a JSON object")]
    NotAnObject,

    #[error("Message body is missing field: {0}")]
    MissingField(&'static str),

    #[error("Message body field {field} is malformed: {reason}")]
    MalformedField { field: &'static str, reason: String },

    #[error("Message body is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl WorkItem {
    /// Creates a new item, minting its `DispatchId`.
    pub fn new(tenant_id: TenantId, payload: Map<String, Value>) -> Self {
        Self {
            dispatch_id: DispatchId::new(),
            tenant_id,
            payload,
        }
    }

    /// Serializes the enqueue wire body:
    /// `{ "dispatchId": ..., "tenantId": ..., ...payload }`.
    pub fn to_message_body(&self) -> Result<String, serde_json::Error> {
        let mut body = Map::new();
        body.insert(
            "dispatchId".to_string(),
            Value::String(self.dispatch_id.to_string()),
        );
        body.insert(
            "tenantId".to_string(),
            Value::String(self.tenant_id.to_string()),
        );
        for (key, value) in &self.payload {
            body.insert(key.clone(), value.clone());
        }
        serde_json::to_string(&Value::Object(body))
    }

    /// Parses an enqueue wire body back into a `WorkItem`.
    pub fn from_message_body(body: &str) -> Result<Self, WorkItemCodecError> {
        let value: Value = serde_json::from_str(body)?;
        let Value::Object(mut fields) = value else {
            return Err(WorkItemCodecError::NotAnObject);
        };

        let dispatch_id = take_id_field(&mut fields, "dispatchId")?;
        let tenant_id = take_id_field(&mut fields, "tenantId")?;

        Ok(Self {
            dispatch_id: DispatchId::from_string(&dispatch_id).ok_or(
                WorkItemCodecError::MalformedField {
                    field: "dispatchId",
                    reason: "not a uuid".to_string(),
                },
            )?,
            tenant_id: tenant_id.parse::<TenantId>().map_err(|e| {
                WorkItemCodecError::MalformedField {
                    field: "tenantId",
                    reason: e.to_string(),
                }
            })?,
            payload: fields,
        })
    }
}

fn take_id_field(
    fields: &mut Map<String, Value>,
    name: &'static str,
) -> Result<String, WorkItemCodecError> {
    match fields.remove(name) {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(WorkItemCodecError::MalformedField {
            field: name,
            reason: "expected a string".to_string(),
        }),
        None => Err(WorkItemCodecError::MissingField(name)),
    }
}

/// One delivery of a work item to the worker.
///
/// `receive_count` is the substrate's approximate attempt counter, threaded
/// through explicitly so the retry decision is a pure function of
/// `(receive_count, limit)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub item: WorkItem,
    pub receive_count: u32,
}

/// One entry a batch enqueue could not accept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedEntry {
    pub dispatch_id: DispatchId,
    pub tenant_id: TenantId,
    pub message: String,
}

/// Result of one `send_batch` call. Partial failure is data, not an error.
#[derive(Debug, Clone, Default)]
pub struct BatchSendReport {
    pub dispatched: Vec<DispatchId>,
    pub failed: Vec<FailedEntry>,
}

/// Aggregate result of one dispatcher run.
#[derive(Debug, Clone)]
pub struct DispatchSummary {
    pub success: bool,
    pub dispatched: Vec<DispatchId>,
    pub failed: Vec<FailedEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload() -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("papercutServerUri".to_string(), json!("https://pc.internal"));
        map.insert("timezone".to_string(), json!("Europe/Madrid"));
        map
    }

    #[test]
    fn test_message_body_roundtrip() {
        let item = WorkItem::new(TenantId::new(), payload());
        let body = item.to_message_body().unwrap();
        let parsed = WorkItem::from_message_body(&body).unwrap();
        assert_eq!(item, parsed);
    }

    #[test]
    fn test_message_body_is_flattened() {
        let item = WorkItem::new(TenantId::new(), payload());
        let body: Value = serde_json::from_str(&item.to_message_body().unwrap()).unwrap();
        assert_eq!(body["tenantId"], item.tenant_id.to_string());
        assert_eq!(body["timezone"], "Europe/Madrid");
        assert!(body.get("payload").is_none());
    }

    #[test]
    fn test_missing_tenant_is_rejected() {
        let result = WorkItem::from_message_body(r#"{"dispatchId":"not-even-checked"}"#);
        assert!(matches!(
            result,
            Err(WorkItemCodecError::MissingField("tenantId"))
                | Err(WorkItemCodecError::MalformedField { .. })
        ));
    }

    #[test]
    fn test_non_object_body_is_rejected() {
        assert!(matches!(
            WorkItem::from_message_body("[1,2,3]"),
            Err(WorkItemCodecError::NotAnObject)
        ));
        assert!(WorkItem::from_message_body("not json").is_err());
    }
}
