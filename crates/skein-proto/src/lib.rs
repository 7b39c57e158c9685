//! # Skein Proto
//!
//! Wire-level data model for the skein client SDK.
//!
//! This crate defines the types that cross the network boundary: repository
//! identifiers, record URIs, the tagged-union record formats, and the units
//! of work consumed by the event engine (notifications, commit ops, chat log
//! pages). It also defines the hydrated entity views (`Post`, `Profile`,
//! `ChatMessage`) that the resolver produces from bare references.
//!
//! ## Key Types
//!
//! - [`Did`]: A decentralized identifier for a repository/actor
//! - [`AtUri`]: Canonical record URI (`at://<did>/<collection>/<rkey>`)
//! - [`Record`]: Exhaustive sum type over `$type`-tagged wire records
//! - [`Notification`]: Unit of work for the polling source
//! - [`CommitEvent`]: Unit of work for the streaming source
//! - [`ChatLogPage`]: Cursor-paged chat log slice

pub mod chat;
pub mod commit;
pub mod did;
pub mod entity;
pub mod notification;
pub mod record;
pub mod uri;

pub use chat::*;
pub use commit::*;
pub use did::*;
pub use entity::*;
pub use notification::*;
pub use record::*;
pub use uri::*;
