//! Type-safe identifiers and the composite entity id codec.
//!
//! Logical ids travel between pages and the background as strings of the
//! form `"<customerId>"` or `"<customerId>:<actionId>"`. Native handles are
//! the numeric tab and window ids handed out by the browser.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between the customer and action parts of a composite id.
pub const ID_SEPARATOR: char = ':';

// ============================================================================
// Native Handles
// ============================================================================

/// Browser tab handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub u64);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TabId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Browser window handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub u64);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for WindowId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

// ============================================================================
// Entity Ids
// ============================================================================

/// Decoded form of a composite entity id.
///
/// `action_id` is `None` for customer-level ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId {
    pub customer_id: String,
    pub action_id: Option<String>,
}

impl EntityId {
    /// Creates a customer-level id.
    pub fn customer(customer_id: impl Into<String>) -> Self {
        Self {
            customer_id: customer_id.into(),
            action_id: None,
        }
    }

    /// Creates an action-level id.
    pub fn action(customer_id: impl Into<String>, action_id: impl Into<String>) -> Self {
        Self {
            customer_id: customer_id.into(),
            action_id: Some(action_id.into()),
        }
    }

    /// Splits a composite key on its first separator.
    ///
    /// Never fails: a key without a separator is a customer id, and empty
    /// parts are passed through untouched.
    pub fn decode(key: &str) -> Self {
        match key.split_once(ID_SEPARATOR) {
            Some((customer_id, action_id)) => Self::action(customer_id, action_id),
            None => Self::customer(key),
        }
    }

    /// Joins the parts back into the composite key.
    pub fn encode(&self) -> String {
        encode(&self.customer_id, self.action_id.as_deref())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.action_id {
            Some(action_id) => write!(f, "{}{ID_SEPARATOR}{}", self.customer_id, action_id),
            None => write!(f, "{}", self.customer_id),
        }
    }
}

impl From<&str> for EntityId {
    fn from(key: &str) -> Self {
        Self::decode(key)
    }
}

/// Encodes a customer id and optional action id into a composite key.
pub fn encode(customer_id: &str, action_id: Option<&str>) -> String {
    match action_id {
        Some(action_id) => format!("{customer_id}{ID_SEPARATOR}{action_id}"),
        None => customer_id.to_string(),
    }
}

/// Decodes a composite key into its customer and action parts.
pub fn decode(key: &str) -> EntityId {
    EntityId::decode(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_customer_only() {
        assert_eq!(encode("42", None), "42");
    }

    #[test]
    fn test_encode_with_action() {
        assert_eq!(encode("42", Some("7")), "42:7");
    }

    #[test]
    fn test_decode_without_separator() {
        let id = decode("42");
        assert_eq!(id.customer_id, "42");
        assert_eq!(id.action_id, None);
    }

    #[test]
    fn test_decode_splits_on_first_separator() {
        let id = decode("42:7:extra");
        assert_eq!(id.customer_id, "42");
        assert_eq!(id.action_id.as_deref(), Some("7:extra"));
    }

    #[test]
    fn test_decode_passes_malformed_input_through() {
        let id = decode(":7");
        assert_eq!(id.customer_id, "");
        assert_eq!(id.action_id.as_deref(), Some("7"));

        let id = decode("");
        assert_eq!(id.customer_id, "");
        assert_eq!(id.action_id, None);
    }

    #[test]
    fn test_codec_round_trip() {
        let cases = [
            ("42", None),
            ("42", Some("7")),
            ("customer-a", Some("")),
            ("", None),
            ("x", Some("y:z")),
        ];

        for (customer_id, action_id) in cases {
            let decoded = decode(&encode(customer_id, action_id));
            assert_eq!(decoded.customer_id, customer_id);
            assert_eq!(decoded.action_id.as_deref(), action_id);
        }
    }

    #[test]
    fn test_entity_id_display_matches_encode() {
        let id = EntityId::action("42", "7");
        assert_eq!(id.to_string(), id.encode());
        assert_eq!(EntityId::customer("42").to_string(), "42");
    }

    #[test]
    fn test_handles_serialize_transparently() {
        let json = serde_json::to_string(&TabId(10)).unwrap();
        assert_eq!(json, "10");
        let window: WindowId = serde_json::from_str("3").unwrap();
        assert_eq!(window, WindowId(3));
    }
}
