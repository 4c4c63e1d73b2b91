//! Lists: typed containers for items, with owner/share visibility.

#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::id::{ListId, UserId};

/// The three list flavors.
///
/// The type only affects presentation (grocery aisles, countdown dates);
/// the link graph treats items from all list types uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListType {
    Simple,
    Grocery,
    Countdown,
}

impl ListType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Grocery => "grocery",
            Self::Countdown => "countdown",
        }
    }
}

impl fmt::Display for ListType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an enum value from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.expected, self.got)
    }
}

impl std::error::Error for ParseEnumError {}

impl FromStr for ListType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" => Ok(Self::Simple),
            "grocery" => Ok(Self::Grocery),
            "countdown" => Ok(Self::Countdown),
            _ => Err(ParseEnumError {
                expected: "list type",
                got: s.to_string(),
            }),
        }
    }
}

/// A list aggregate as stored and as carried in change events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct List {
    pub id: ListId,
    pub title: String,
    pub list_type: ListType,
    pub owner: UserId,
    /// Users this list is shared with, owner excluded.
    #[serde(default)]
    pub shared_with: Vec<UserId>,
    pub created_at_us: i64,
    pub updated_at_us: i64,
}

impl List {
    /// A list is visible to its owner and to every user it is shared with.
    ///
    /// Link creation requires both endpoint lists to be visible to the
    /// acting user; everything else is rejected as `cross_user`.
    pub fn visible_to(&self, user: &UserId) -> bool {
        self.owner == *user || self.shared_with.contains(user)
    }
}
