//! Change event payloads.
//!
//! Every committed mutation produces one event per touched entity, carrying
//! the full before and after snapshots. The dotted `<entity>.<verb>` string
//! form is what goes over the wire and into logs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::model::{Item, ItemId, List, ListId};

/// What happened to the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an item changed.
///
/// Stamped at write time by the producer. Events from producers that predate
/// the tag carry no cause, and consumers fall back to a recency heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cause {
    /// A direct edit by a user.
    User,
    /// A status overwrite produced by completion propagation.
    Propagated,
}

/// The dotted `<entity>.<verb>` event type catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    ItemInsert,
    ItemUpdate,
    ItemDelete,
    ListInsert,
    ListUpdate,
    ListDelete,
}

/// Error returned when parsing an unknown event type string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEventType {
    /// The unrecognised input string.
    pub raw: String,
}

impl fmt::Display for UnknownEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown event type '{}': expected one of item.insert, item.update, \
             item.delete, list.insert, list.update, list.delete",
            self.raw
        )
    }
}

impl std::error::Error for UnknownEventType {}

impl EventType {
    /// All known event types in catalog order.
    pub const ALL: [Self; 6] = [
        Self::ItemInsert,
        Self::ItemUpdate,
        Self::ItemDelete,
        Self::ListInsert,
        Self::ListUpdate,
        Self::ListDelete,
    ];

    /// The canonical `<entity>.<verb>` string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ItemInsert => "item.insert",
            Self::ItemUpdate => "item.update",
            Self::ItemDelete => "item.delete",
            Self::ListInsert => "list.insert",
            Self::ListUpdate => "list.update",
            Self::ListDelete => "list.delete",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "item.insert" => Ok(Self::ItemInsert),
            "item.update" => Ok(Self::ItemUpdate),
            "item.delete" => Ok(Self::ItemDelete),
            "list.insert" => Ok(Self::ListInsert),
            "list.update" => Ok(Self::ListUpdate),
            "list.delete" => Ok(Self::ListDelete),
            _ => Err(UnknownEventType { raw: s.to_string() }),
        }
    }
}

// Custom serde: serialize as the `<entity>.<verb>` string.
impl Serialize for EventType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// A committed change to one entity.
///
/// `before` is `None` for inserts, `after` is `None` for deletes, and both
/// are present for updates. Snapshots are full entities so a consumer never
/// has to fetch to apply an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entity", rename_all = "lowercase")]
pub enum ChangeEvent {
    Item {
        kind: ChangeKind,
        before: Option<Item>,
        after: Option<Item>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cause: Option<Cause>,
        wall_ts_us: i64,
    },
    List {
        kind: ChangeKind,
        before: Option<List>,
        after: Option<List>,
        wall_ts_us: i64,
    },
}

impl ChangeEvent {
    #[must_use]
    pub const fn kind(&self) -> ChangeKind {
        match self {
            Self::Item { kind, .. } | Self::List { kind, .. } => *kind,
        }
    }

    #[must_use]
    pub const fn wall_ts_us(&self) -> i64 {
        match self {
            Self::Item { wall_ts_us, .. } | Self::List { wall_ts_us, .. } => *wall_ts_us,
        }
    }

    #[must_use]
    pub const fn event_type(&self) -> EventType {
        match self {
            Self::Item { kind, .. } => match kind {
                ChangeKind::Insert => EventType::ItemInsert,
                ChangeKind::Update => EventType::ItemUpdate,
                ChangeKind::Delete => EventType::ItemDelete,
            },
            Self::List { kind, .. } => match kind {
                ChangeKind::Insert => EventType::ListInsert,
                ChangeKind::Update => EventType::ListUpdate,
                ChangeKind::Delete => EventType::ListDelete,
            },
        }
    }

    /// The item this event concerns, preferring the post-change snapshot.
    #[must_use]
    pub fn item_id(&self) -> Option<&ItemId> {
        match self {
            Self::Item { before, after, .. } => {
                after.as_ref().or(before.as_ref()).map(|item| &item.id)
            }
            Self::List { .. } => None,
        }
    }

    /// The list this event concerns. For item events, the item's owning
    /// list; for list events, the list itself.
    #[must_use]
    pub fn list_id(&self) -> Option<&ListId> {
        match self {
            Self::Item { before, after, .. } => {
                after.as_ref().or(before.as_ref()).map(|item| &item.list_id)
            }
            Self::List { before, after, .. } => {
                after.as_ref().or(before.as_ref()).map(|list| &list.id)
            }
        }
    }

    /// Explicit cause tag, if the producer stamped one. Always `None` for
    /// list events.
    #[must_use]
    pub const fn cause(&self) -> Option<Cause> {
        match self {
            Self::Item { cause, .. } => *cause,
            Self::List { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_fromstr_roundtrip() {
        for et in EventType::ALL {
            let parsed: EventType = et.as_str().parse().expect("should roundtrip");
            assert_eq!(parsed, et);
        }
    }

    #[test]
    fn fromstr_rejects_unknown() {
        let err = "item.compact".parse::<EventType>().unwrap_err();
        assert_eq!(err.raw, "item.compact");
        assert!(err.to_string().contains("expected one of"));
    }

    #[test]
    fn fromstr_rejects_bare_verb() {
        assert!("insert".parse::<EventType>().is_err());
    }

    #[test]
    fn event_type_serializes_as_dotted_string() {
        let json = serde_json::to_string(&EventType::ItemUpdate).expect("serialize");
        assert_eq!(json, "\"item.update\"");
        let back: EventType = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, EventType::ItemUpdate);
    }

    #[test]
    fn item_event_json_shape() {
        let event = ChangeEvent::Item {
            kind: ChangeKind::Delete,
            before: None,
            after: None,
            cause: Some(Cause::Propagated),
            wall_ts_us: 42,
        };
        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["entity"], "item");
        assert_eq!(json["kind"], "delete");
        assert_eq!(json["cause"], "propagated");
        assert_eq!(json["wall_ts_us"], 42);
    }

    #[test]
    fn missing_cause_deserializes_as_none() {
        let json = r#"{"entity":"item","kind":"update","before":null,"after":null,"wall_ts_us":7}"#;
        let event: ChangeEvent = serde_json::from_str(json).expect("deserialize");
        assert_eq!(event.cause(), None);
        assert_eq!(event.event_type(), EventType::ItemUpdate);
    }
}
