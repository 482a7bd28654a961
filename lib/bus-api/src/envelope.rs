//! Envelope: the unit of bus communication

use crate::Operation;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Captured handler failure, carried by a `CallbackException` envelope
/// back to the original sender.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// Short classification of the failure (root-cause rendering)
    #[serde(default)]
    pub kind: String,
    /// Full failure description, including the cause chain
    #[serde(default)]
    pub message: String,
}

impl Failure {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Capture an error raised by an endpoint handler
    pub fn from_error(error: &anyhow::Error) -> Self {
        Self {
            kind: error.root_cause().to_string(),
            // Alternate Display renders the whole cause chain
            message: format!("{error:#}"),
        }
    }
}

/// The unit of communication between bus nodes.
///
/// An envelope is constructed by a sender, serialized, delivered by the
/// transport, and consumed exactly once by the receiving router. A
/// callback envelope is a new value linked to the request only through
/// its `id`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Correlation id, unique per logical request; immutable once
    /// assigned and reused unchanged by the callback reply
    pub id: String,

    /// Target endpoint within the receiving registry
    #[serde(default)]
    pub endpoint_id: String,

    /// Resource-change verb or callback marker
    pub operation: Operation,

    /// Node that produced this envelope
    pub source: String,

    /// Destination node names; empty means broadcast to all nodes
    #[serde(default)]
    pub targets: Vec<String>,

    /// Payload items. A `CallbackException` envelope carries its
    /// captured failure description as the single item; a
    /// `CallbackSuccess` envelope carries nothing.
    #[serde(default)]
    pub data: Vec<Value>,
}

impl Envelope {
    /// Build a request envelope with a freshly generated correlation id.
    ///
    /// Non-empty `targets` doubles as the acknowledgement opt-in: the
    /// receiving router replies with a callback envelope iff the request
    /// named its recipients. Callers requesting acknowledgement must not
    /// list their own node in `targets`.
    pub fn request<T: Serialize>(
        endpoint_id: impl Into<String>,
        operation: Operation,
        source: impl Into<String>,
        targets: Vec<String>,
        items: &[T],
    ) -> serde_json::Result<Self> {
        let data = items
            .iter()
            .map(serde_json::to_value)
            .collect::<serde_json::Result<Vec<Value>>>()?;

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            endpoint_id: endpoint_id.into(),
            operation,
            source: source.into(),
            targets,
            data,
        })
    }

    /// Build the success acknowledgement for `request`, addressed back
    /// to its sender and sharing its correlation id.
    pub fn callback_success(request: &Envelope, local_node: &str) -> Self {
        Self {
            id: request.id.clone(),
            endpoint_id: request.endpoint_id.clone(),
            operation: Operation::CallbackSuccess,
            source: local_node.to_string(),
            targets: vec![request.source.clone()],
            data: Vec::new(),
        }
    }

    /// Build the failure acknowledgement for `request`, carrying the
    /// captured handler failure back to its sender as the callback's
    /// single payload item.
    pub fn callback_failure(request: &Envelope, local_node: &str, failure: Failure) -> Self {
        Self {
            id: request.id.clone(),
            endpoint_id: request.endpoint_id.clone(),
            operation: Operation::CallbackException,
            source: local_node.to_string(),
            targets: vec![request.source.clone()],
            // A struct of strings always serializes
            data: vec![serde_json::to_value(&failure).unwrap_or_default()],
        }
    }

    /// Whether this envelope is an acknowledgement rather than a request
    pub fn is_callback(&self) -> bool {
        self.operation.is_callback()
    }

    /// The captured failure carried by a `CallbackException` envelope,
    /// decoded from its single payload item. `None` for every other
    /// operation and for a malformed exception callback.
    pub fn failure(&self) -> Option<Failure> {
        if self.operation != Operation::CallbackException {
            return None;
        }
        self.data
            .first()
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Whether the sender asked for an acknowledgement (reply-target
    /// presence is the opt-in signal; broadcasts are never acknowledged)
    pub fn wants_ack(&self) -> bool {
        !self.is_callback() && !self.targets.is_empty()
    }
}
