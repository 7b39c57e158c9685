//! Decentralized identifiers.
//!
//! A DID names a repository (and by extension the actor who owns it).
//! The engine compares DIDs constantly - every classification rule reduces
//! to "does this reference point at the bot's own repository?" - so the
//! type is cheap to clone and compare.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced when parsing a [`Did`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DidError {
    #[error("invalid DID format: {0:?}")]
    InvalidFormat(String),
}

/// A decentralized identifier, e.g. `did:plc:abc123` or `did:web:example.com`.
///
/// Only the outer shape is validated (`did:<method>:<identifier>`); method
/// semantics are the resolver's business.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Did(String);

impl Did {
    /// Parse a DID from a string, validating the `did:<method>:<id>` shape.
    pub fn new(s: impl Into<String>) -> Result<Self, DidError> {
        let s = s.into();
        let mut parts = s.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some("did"), Some(method), Some(id))
                if !method.is_empty()
                    && method.chars().all(|c| c.is_ascii_lowercase())
                    && !id.is_empty() =>
            {
                Ok(Self(s))
            }
            _ => Err(DidError::InvalidFormat(s)),
        }
    }

    /// The full DID string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The method segment (e.g. `plc`, `web`).
    pub fn method(&self) -> &str {
        self.0.split(':').nth(1).unwrap_or_default()
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Did {
    type Err = DidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Did {
    type Error = DidError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Did> for String {
    fn from(did: Did) -> Self {
        did.0
    }
}
