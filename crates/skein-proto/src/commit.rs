//! Commit events - the streaming source's unit of work.

use crate::did::Did;
use crate::uri::{AtUri, AtUriError};
use serde::{Deserialize, Serialize};

/// The kind of repository mutation an op describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpAction {
    Create,
    Update,
    Delete,
}

/// A single mutation within a commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoOp {
    /// What happened to the record.
    pub action: OpAction,
    /// Record path within the repository: `<collection>/<rkey>`.
    pub path: String,
    /// The record payload. Present for creates and updates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<serde_json::Value>,
}

impl RepoOp {
    /// The canonical URI of the record this op touches.
    pub fn uri(&self, repo: &Did) -> Result<AtUri, AtUriError> {
        AtUri::from_record_path(repo.clone(), &self.path)
    }
}

/// An atomic batch of repository mutations from the commit stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitEvent {
    /// The repository the commit applies to - its owner authored every op.
    pub repo: Did,
    /// Stream sequence number, when the transport provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<i64>,
    /// The mutations, in commit order.
    pub ops: Vec<RepoOp>,
}
