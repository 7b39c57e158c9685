//! Record URIs.
//!
//! Every record in the network is addressed by an `at://` URI naming the
//! repository that holds it, the collection within that repository, and the
//! record key. The classifier's ownership checks all go through
//! [`AtUri::repo`].

use crate::did::{Did, DidError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The URI scheme prefix for record URIs.
const AT_PREFIX: &str = "at://";

/// Errors produced when parsing an [`AtUri`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AtUriError {
    #[error("missing at:// prefix: {0:?}")]
    MissingPrefix(String),
    #[error("expected at://<did>/<collection>/<rkey>: {0:?}")]
    MissingSegments(String),
    #[error("invalid repository DID: {0}")]
    InvalidDid(#[from] DidError),
}

/// A canonical record URI: `at://<did>/<collection>/<rkey>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AtUri {
    repo: Did,
    collection: String,
    rkey: String,
}

impl AtUri {
    /// Assemble a URI from its parts.
    pub fn new(repo: Did, collection: impl Into<String>, rkey: impl Into<String>) -> Self {
        Self {
            repo,
            collection: collection.into(),
            rkey: rkey.into(),
        }
    }

    /// Parse a full `at://` URI string.
    pub fn parse(s: &str) -> Result<Self, AtUriError> {
        let rest = s
            .strip_prefix(AT_PREFIX)
            .ok_or_else(|| AtUriError::MissingPrefix(s.to_string()))?;

        let mut segments = rest.splitn(3, '/');
        match (segments.next(), segments.next(), segments.next()) {
            (Some(did), Some(collection), Some(rkey))
                if !collection.is_empty() && !rkey.is_empty() =>
            {
                Ok(Self {
                    repo: Did::new(did)?,
                    collection: collection.to_string(),
                    rkey: rkey.to_string(),
                })
            }
            _ => Err(AtUriError::MissingSegments(s.to_string())),
        }
    }

    /// Build a URI from a repository DID and a `<collection>/<rkey>` record
    /// path, as carried by commit-stream ops.
    pub fn from_record_path(repo: Did, path: &str) -> Result<Self, AtUriError> {
        let mut segments = path.splitn(2, '/');
        match (segments.next(), segments.next()) {
            (Some(collection), Some(rkey)) if !collection.is_empty() && !rkey.is_empty() => {
                Ok(Self {
                    repo,
                    collection: collection.to_string(),
                    rkey: rkey.to_string(),
                })
            }
            _ => Err(AtUriError::MissingSegments(format!("at://{repo}/{path}"))),
        }
    }

    /// The repository that holds the record.
    pub fn repo(&self) -> &Did {
        &self.repo
    }

    /// The collection segment (e.g. `app.bsky.feed.post`).
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// The record key segment.
    pub fn rkey(&self) -> &str {
        &self.rkey
    }
}

impl fmt::Display for AtUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{AT_PREFIX}{}/{}/{}", self.repo, self.collection, self.rkey)
    }
}

impl FromStr for AtUri {
    type Err = AtUriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AtUri {
    type Error = AtUriError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<AtUri> for String {
    fn from(uri: AtUri) -> Self {
        uri.to_string()
    }
}

/// A content-addressed reference to a specific version of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrongRef {
    /// The record URI.
    pub uri: AtUri,
    /// The content hash of the referenced version.
    pub cid: String,
}
