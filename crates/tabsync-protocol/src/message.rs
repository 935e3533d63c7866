//! Protocol message types exchanged between pages and the coordinator.
//!
//! Every message travels as `{"type": "spe:<name>", "data": {...}}`. The
//! bridging content script relays these unchanged in both directions.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tabsync_core::EntityId;

/// Arbitrary page metadata attached to a close request and echoed back on
/// the matching `closed` notification.
pub type Metadata = serde_json::Map<String, Value>;

/// The only recipient a `send` request may name.
pub const MAIN_TARGET: &str = "main";

/// Requests sent from a page to the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Request {
    /// Open a URL, either as an action of a customer or as a plain tab in
    /// the action window.
    #[serde(rename = "spe:open")]
    Open {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        /// Composite id (`customerId` or `customerId:actionId`)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        /// Human-readable tab name
        #[serde(default, alias = "action", skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },

    /// Close the customer or action named by `id`.
    #[serde(rename = "spe:close")]
    Close {
        id: String,
        /// Metadata echoed back on the `closed` notification
        #[serde(default)]
        rest: Metadata,
    },

    /// Keepalive. With a target, starts/replaces/cancels a periodic visit
    /// of that URL; `interval <= 0` cancels.
    #[serde(rename = "spe:ping")]
    Ping {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
        /// Interval in milliseconds
        #[serde(default, skip_serializing_if = "Option::is_none")]
        interval: Option<i64>,
    },

    /// Rename a registered logical id without touching native handles.
    #[serde(rename = "spe:update", rename_all = "camelCase")]
    Update { prev_id: String, next_id: String },

    /// Relay a payload to a named recipient.
    #[serde(rename = "spe:send")]
    Send {
        target: String,
        #[serde(default)]
        data: Value,
    },
}

impl Request {
    /// Creates an open request.
    pub fn open(url: impl Into<String>, id: Option<&str>) -> Self {
        Self::Open {
            url: Some(url.into()),
            id: id.map(str::to_string),
            name: None,
        }
    }

    /// Creates a close request.
    pub fn close(id: impl Into<String>, rest: Metadata) -> Self {
        Self::Close { id: id.into(), rest }
    }

    /// Creates a bare keepalive ping.
    pub fn ping() -> Self {
        Self::Ping {
            target: None,
            interval: None,
        }
    }

    /// Wire name of this request (e.g. `spe:open`).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Open { .. } => "spe:open",
            Self::Close { .. } => "spe:close",
            Self::Ping { .. } => "spe:ping",
            Self::Update { .. } => "spe:update",
            Self::Send { .. } => "spe:send",
        }
    }

    /// Decoded entity id for requests that carry one.
    pub fn entity_id(&self) -> Option<EntityId> {
        match self {
            Self::Open { id: Some(id), .. } | Self::Close { id, .. } => Some(EntityId::decode(id)),
            _ => None,
        }
    }
}

/// Notifications sent from the coordinator to a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Notification {
    /// An action was closed. Carries the close metadata plus the closed id.
    #[serde(rename = "spe:closed")]
    Closed {
        id: String,
        #[serde(flatten)]
        metadata: Metadata,
    },

    /// Focus moved to an action.
    ///
    /// Pages call the customer id `actionId` and the action id `taskId`.
    #[serde(rename = "spe:select", rename_all = "camelCase")]
    Select { action_id: String, task_id: String },

    /// Payload relayed from a `send` request.
    #[serde(rename = "spe:send")]
    Send(Value),
}

impl Notification {
    /// Creates a closed notification. An `id` key inside the metadata is
    /// replaced by the closed entity's id.
    pub fn closed(id: impl Into<String>, metadata: Option<Metadata>) -> Self {
        let mut metadata = metadata.unwrap_or_default();
        metadata.remove("id");
        Self::Closed {
            id: id.into(),
            metadata,
        }
    }

    /// Creates a select notification for an action of a customer.
    pub fn select(customer_id: impl Into<String>, action_id: impl Into<String>) -> Self {
        Self::Select {
            action_id: customer_id.into(),
            task_id: action_id.into(),
        }
    }

    /// Creates a relay notification.
    pub fn send(data: Value) -> Self {
        Self::Send(data)
    }

    /// Wire name of this notification (e.g. `spe:closed`).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Closed { .. } => "spe:closed",
            Self::Select { .. } => "spe:select",
            Self::Send(_) => "spe:send",
        }
    }
}
