//! Subscriptions: a recipient's standing interest in a (student, event type)
//! pair.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::EventType;

/// Opaque notification destination (a chat id on the transport side).
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RecipientId(pub i64);

impl fmt::Display for RecipientId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
}

/// A persisted subscription. At most one exists per
/// (recipient, student, event type); rows are never updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
  pub id:              Uuid,
  pub organization_id: Uuid,
  pub recipient_id:    RecipientId,
  pub student_id:      Uuid,
  pub event_type:      EventType,
  pub created_at:      DateTime<Utc>,
}

/// Input to [`crate::store::SubscriptionRegistry::subscribe`].
#[derive(Debug, Clone, Copy)]
pub struct NewSubscription {
  pub organization_id: Uuid,
  pub recipient_id:    RecipientId,
  pub student_id:      Uuid,
  pub event_type:      EventType,
}

/// Result of an idempotent insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
  Created,
  AlreadyExists,
}

impl SubscribeOutcome {
  pub fn is_created(self) -> bool { matches!(self, Self::Created) }
}
