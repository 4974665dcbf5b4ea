//! Change detection over the append-only event log.
//!
//! The log has no push mechanism, so the poller compares the id of the newest
//! record against the last id it has seen. Only the newest record is ever
//! examined: if several events land between two polls, the older ones are
//! not detected.

use std::sync::Arc;

use tirek_core::{event::Event, store::EventLog};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Cursor ──────────────────────────────────────────────────────────────────

/// The last event id the poller has processed.
///
/// Held in memory only. A restart re-primes from whatever is newest at that
/// moment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PollCursor {
  /// Not yet initialised from the log.
  #[default]
  Unprimed,
  /// Initialised; `None` means the log was empty.
  Seen(Option<Uuid>),
}

impl PollCursor {
  pub fn last_seen(&self) -> Option<Uuid> {
    match self {
      Self::Unprimed => None,
      Self::Seen(id) => *id,
    }
  }
}

// ─── Poller ──────────────────────────────────────────────────────────────────

pub struct ChangePoller<L> {
  log:    Arc<L>,
  cursor: PollCursor,
}

impl<L: EventLog> ChangePoller<L> {
  pub fn new(log: Arc<L>) -> Self { Self { log, cursor: PollCursor::Unprimed } }

  pub fn cursor(&self) -> PollCursor { self.cursor }

  /// Initialise the cursor from the current newest event so that history is
  /// not replayed.
  pub async fn prime(&mut self) -> Result<()> {
    let latest = self.log.latest().await.map_err(Error::log)?;
    self.cursor = PollCursor::Seen(latest.map(|e| e.id));
    tracing::info!(last_event = ?self.cursor.last_seen(), "poll cursor primed");
    Ok(())
  }

  /// Check the log once.
  ///
  /// Returns the newest event if it has not been seen before. A read failure
  /// leaves the cursor untouched. An unprimed cursor is primed instead and
  /// nothing is emitted.
  pub async fn poll(&mut self) -> Result<Option<Event>> {
    let latest = self.log.latest().await.map_err(Error::log)?;

    let last_seen = match self.cursor {
      PollCursor::Unprimed => {
        self.cursor = PollCursor::Seen(latest.map(|e| e.id));
        tracing::info!(last_event = ?self.cursor.last_seen(), "poll cursor primed late");
        return Ok(None);
      }
      PollCursor::Seen(id) => id,
    };

    match latest {
      Some(event) if Some(event.id) != last_seen => {
        tracing::info!(event_id = %event.id, event_type = %event.event_type, "new event detected");
        self.cursor = PollCursor::Seen(Some(event.id));
        Ok(Some(event))
      }
      _ => Ok(None),
    }
  }
}
