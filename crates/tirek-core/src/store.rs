//! Storage traits.
//!
//! Implemented by storage backends (e.g. `tirek-store-sqlite`). The engine in
//! `tirek-notify` depends on these abstractions, not on any concrete backend.
//!
//! All methods return `Send` futures so implementors can be shared across
//! tokio tasks.

use std::{collections::BTreeSet, future::Future};

use uuid::Uuid;

use crate::{
  directory::{Organization, Student},
  event::{Event, EventType},
  subscription::{NewSubscription, RecipientId, SubscribeOutcome, Subscription},
};

// ─── Event log ───────────────────────────────────────────────────────────────

/// Read-only view over the append-only event log.
pub trait EventLog: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// The event with the greatest `timestamp`, or `None` if the log is empty.
  fn latest(
    &self,
  ) -> impl Future<Output = Result<Option<Event>, Self::Error>> + Send + '_;

  /// Look up a single event. Returns `None` if not found.
  fn get(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Event>, Self::Error>> + Send + '_;

  /// Up to `limit` events, newest first.
  fn recent(
    &self,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Event>, Self::Error>> + Send + '_;
}

// ─── Reference data ──────────────────────────────────────────────────────────

/// Organizations and their students. Read-only.
pub trait Directory: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// All organizations, ordered by name.
  fn list_organizations(
    &self,
  ) -> impl Future<Output = Result<Vec<Organization>, Self::Error>> + Send + '_;

  fn get_organization(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Organization>, Self::Error>> + Send + '_;

  /// Students of `organization_id`, ordered by name. Accounts with other
  /// roles are never returned.
  fn list_students(
    &self,
    organization_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Student>, Self::Error>> + Send + '_;

  fn get_student(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Student>, Self::Error>> + Send + '_;
}

// ─── Subscriptions ───────────────────────────────────────────────────────────

/// Mapping from (student, event type) to recipients.
///
/// Uniqueness of (recipient, student, event type) is enforced by the backend;
/// duplicate inserts are reported as [`SubscribeOutcome::AlreadyExists`],
/// never as errors.
pub trait SubscriptionRegistry: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Idempotently insert one subscription.
  fn subscribe(
    &self,
    input: NewSubscription,
  ) -> impl Future<Output = Result<SubscribeOutcome, Self::Error>> + Send + '_;

  /// Insert one subscription per event type in a single transaction.
  ///
  /// Either every row becomes visible or none does. Returns how many rows
  /// were newly created.
  fn subscribe_many<'a>(
    &'a self,
    organization_id: Uuid,
    recipient_id: RecipientId,
    student_id: Uuid,
    event_types: &'a [EventType],
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + 'a;

  /// Recipients subscribed to `event_type` for `student_id`. Empty when
  /// nothing matches.
  fn find_subscribers(
    &self,
    student_id: Uuid,
    event_type: EventType,
  ) -> impl Future<Output = Result<BTreeSet<RecipientId>, Self::Error>> + Send + '_;

  /// Distinct recipients subscribed to `event_type` for any student.
  fn recipients_for_event_type(
    &self,
    event_type: EventType,
  ) -> impl Future<Output = Result<BTreeSet<RecipientId>, Self::Error>> + Send + '_;

  /// Every subscription held by `recipient_id`.
  fn list_for_recipient(
    &self,
    recipient_id: RecipientId,
  ) -> impl Future<Output = Result<Vec<Subscription>, Self::Error>> + Send + '_;

  /// Remove all of `recipient_id`'s subscriptions for `student_id`.
  /// Returns the number of rows removed.
  fn unsubscribe_student(
    &self,
    recipient_id: RecipientId,
    student_id: Uuid,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;
}

// ─── Schema catalog ──────────────────────────────────────────────────────────

/// Lists the storage collections (tables) currently present.
pub trait SchemaCatalog: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn list_tables(
    &self,
  ) -> impl Future<Output = Result<BTreeSet<String>, Self::Error>> + Send + '_;
}
