//! Prefixed string identifiers for the three entity kinds.
//!
//! Every id is a short lowercase token with a kind prefix: `sk-` for items,
//! `sl-` for lists, `su-` for users. The prefix makes ids self-describing in
//! logs and change events, and lets the store reject ids filed under the
//! wrong column at the boundary instead of deep inside a traversal.

#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Alphabet used for minted id suffixes. Crockford-ish base32: lowercase,
/// no `i`/`l`/`o`/`u` to keep ids unambiguous when read aloud.
const MINT_ALPHABET: &[u8] = b"0123456789abcdefghjkmnpqrstvwxyz";

/// Number of random suffix characters in a minted id.
const MINT_LEN: usize = 8;

/// Error returned when an id string fails validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidId {
    /// Expected prefix, e.g. `"sk-"`.
    pub expected_prefix: &'static str,
    /// The rejected input.
    pub got: String,
}

impl fmt::Display for InvalidId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid id '{}': expected '{}' followed by lowercase alphanumerics",
            self.got, self.expected_prefix
        )
    }
}

impl std::error::Error for InvalidId {}

fn validate(prefix: &'static str, raw: &str) -> Result<(), InvalidId> {
    let suffix = raw.strip_prefix(prefix).ok_or_else(|| InvalidId {
        expected_prefix: prefix,
        got: raw.to_string(),
    })?;
    let ok = !suffix.is_empty()
        && suffix
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
    if ok {
        Ok(())
    } else {
        Err(InvalidId {
            expected_prefix: prefix,
            got: raw.to_string(),
        })
    }
}

fn mint_suffix() -> String {
    let mut rng = rand::thread_rng();
    (0..MINT_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..MINT_ALPHABET.len());
            char::from(MINT_ALPHABET[idx])
        })
        .collect()
}

macro_rules! id_type {
    ($name:ident, $prefix:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// The kind prefix, including the trailing dash.
            pub const PREFIX: &'static str = $prefix;

            /// Parse and validate an id string.
            ///
            /// # Errors
            ///
            /// Returns [`InvalidId`] if the prefix is wrong or the suffix
            /// contains characters outside `[a-z0-9-]`.
            pub fn new(raw: impl Into<String>) -> Result<Self, InvalidId> {
                let raw = raw.into();
                validate(Self::PREFIX, &raw)?;
                Ok(Self(raw))
            }

            /// Construct without validation. For test fixtures and rows read
            /// back from the store, which only ever holds validated ids.
            pub fn new_unchecked(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            /// Mint a fresh random id.
            pub fn mint() -> Self {
                Self(format!("{}{}", Self::PREFIX, mint_suffix()))
            }

            /// The full id string, prefix included.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = InvalidId;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

id_type!(ItemId, "sk-", "Identifier of a single list item.");
id_type!(ListId, "sl-", "Identifier of a list.");
id_type!(UserId, "su-", "Identifier of a user account.");
