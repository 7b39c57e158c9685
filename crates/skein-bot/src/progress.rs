//! Fetch-progress state: the polling watermark and the paging cursor.
//!
//! Both types encode one invariant each. The watermark never moves
//! backwards; the cursor never regresses to an earlier token except by
//! constructing a fresh one (a full reconnect).

use chrono::{DateTime, Utc};

/// A monotonic timestamp cursor bounding which polled items count as new.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watermark {
    last_seen: DateTime<Utc>,
}

impl Watermark {
    /// Start the watermark at the given instant.
    pub fn starting_at(instant: DateTime<Utc>) -> Self {
        Self { last_seen: instant }
    }

    /// Start the watermark at the current instant.
    pub fn now() -> Self {
        Self::starting_at(Utc::now())
    }

    /// The newest instant observed so far.
    pub fn last_seen(&self) -> DateTime<Utc> {
        self.last_seen
    }

    /// Whether an item indexed at `instant` is newer than everything seen.
    pub fn is_new(&self, instant: DateTime<Utc>) -> bool {
        instant > self.last_seen
    }

    /// Advance to `instant`. Non-newer instants leave the watermark
    /// unchanged; returns whether it moved.
    pub fn advance(&mut self, instant: DateTime<Utc>) -> bool {
        if instant > self.last_seen {
            self.last_seen = instant;
            true
        } else {
            false
        }
    }
}

/// An opaque pagination token echoed back to a paged endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageCursor {
    token: Option<String>,
}

impl PageCursor {
    /// A cursor positioned at the start of the log.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current token, if any page has returned one.
    pub fn get(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Record the cursor a page returned. Pages without a cursor mean
    /// "caught up" and leave the stored token unchanged; returns whether
    /// the cursor moved.
    pub fn advance(&mut self, returned: Option<String>) -> bool {
        match returned {
            Some(token) => {
                self.token = Some(token);
                true
            }
            None => false,
        }
    }
}
