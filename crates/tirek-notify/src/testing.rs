//! In-process fakes of the `tirek-core` traits for engine tests.

use std::{
  collections::{BTreeSet, HashSet, VecDeque},
  path::{Path, PathBuf},
  sync::{Mutex, MutexGuard},
  time::Duration,
};

use chrono::{TimeZone, Utc};
use thiserror::Error;
use tirek_core::{
  delivery::{DeliveryError, DeliverySink, ReplySink},
  directory::{Organization, Student},
  event::{Event, EventType},
  interaction::Reply,
  store::{Directory, EventLog, SchemaCatalog, SubscriptionRegistry},
  subscription::{NewSubscription, RecipientId, SubscribeOutcome, Subscription},
};
use uuid::Uuid;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct FakeError(pub &'static str);

pub fn event_for(student: &Student, event_type: EventType, secs: i64) -> Event {
  Event {
    id: Uuid::new_v4(),
    event_type,
    student_id: student.id,
    organization_id: student.organization_id,
    timestamp: Utc.with_ymd_and_hms(2025, 3, 21, 16, 0, 0).unwrap()
      + chrono::Duration::seconds(secs),
    image_reference: None,
  }
}

// ─── MemoryStore ─────────────────────────────────────────────────────────────

#[derive(Default)]
struct Inner {
  events:        Vec<Event>,
  organizations: Vec<Organization>,
  students:      Vec<Student>,
  subscriptions: Vec<Subscription>,
  tables:        BTreeSet<String>,
}

/// A store with knobs for simulating backend failures.
#[derive(Default)]
pub struct MemoryStore {
  inner:             Mutex<Inner>,
  /// `subscribe_many` fails after writing this many rows of a batch.
  fail_batch_after:  Mutex<Option<usize>>,
  fail_directory:    Mutex<bool>,
  /// How many upcoming `recipients_for_event_type` calls fail.
  fail_type_lookups: Mutex<usize>,
}

impl MemoryStore {
  fn lock(&self) -> MutexGuard<'_, Inner> { self.inner.lock().unwrap() }

  pub fn add_organization(&self, name: &str) -> Organization {
    let org = Organization { id: Uuid::new_v4(), name: name.into() };
    self.lock().organizations.push(org.clone());
    org
  }

  pub fn add_student(&self, org: &Organization, name: &str) -> Student {
    let student = Student { id: Uuid::new_v4(), name: name.into(), organization_id: org.id };
    self.lock().students.push(student.clone());
    student
  }

  pub fn push_event(&self, event: Event) { self.lock().events.push(event); }

  pub fn add_table(&self, name: &str) { self.lock().tables.insert(name.into()); }

  pub fn fail_batch_after(&self, rows: Option<usize>) {
    *self.fail_batch_after.lock().unwrap() = rows;
  }

  pub fn fail_directory(&self, fail: bool) { *self.fail_directory.lock().unwrap() = fail; }

  pub fn fail_type_lookups(&self, times: usize) {
    *self.fail_type_lookups.lock().unwrap() = times;
  }

  pub fn subscription_count(&self) -> usize { self.lock().subscriptions.len() }

  fn directory_check(&self) -> Result<(), FakeError> {
    if *self.fail_directory.lock().unwrap() {
      Err(FakeError("directory offline"))
    } else {
      Ok(())
    }
  }

  fn insert(inner: &mut Inner, input: NewSubscription) -> SubscribeOutcome {
    let exists = inner.subscriptions.iter().any(|s| {
      s.recipient_id == input.recipient_id
        && s.student_id == input.student_id
        && s.event_type == input.event_type
    });
    if exists {
      return SubscribeOutcome::AlreadyExists;
    }
    inner.subscriptions.push(Subscription {
      id:              Uuid::new_v4(),
      organization_id: input.organization_id,
      recipient_id:    input.recipient_id,
      student_id:      input.student_id,
      event_type:      input.event_type,
      created_at:      Utc::now(),
    });
    SubscribeOutcome::Created
  }
}

impl EventLog for MemoryStore {
  type Error = FakeError;

  async fn latest(&self) -> Result<Option<Event>, FakeError> {
    Ok(self.lock().events.iter().max_by_key(|e| e.timestamp).cloned())
  }

  async fn get(&self, id: Uuid) -> Result<Option<Event>, FakeError> {
    Ok(self.lock().events.iter().find(|e| e.id == id).cloned())
  }

  async fn recent(&self, limit: usize) -> Result<Vec<Event>, FakeError> {
    let mut events = self.lock().events.clone();
    events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    events.truncate(limit);
    Ok(events)
  }
}

impl Directory for MemoryStore {
  type Error = FakeError;

  async fn list_organizations(&self) -> Result<Vec<Organization>, FakeError> {
    self.directory_check()?;
    let mut orgs = self.lock().organizations.clone();
    orgs.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(orgs)
  }

  async fn get_organization(&self, id: Uuid) -> Result<Option<Organization>, FakeError> {
    self.directory_check()?;
    Ok(self.lock().organizations.iter().find(|o| o.id == id).cloned())
  }

  async fn list_students(&self, organization_id: Uuid) -> Result<Vec<Student>, FakeError> {
    self.directory_check()?;
    let mut students: Vec<_> = self
      .lock()
      .students
      .iter()
      .filter(|s| s.organization_id == organization_id)
      .cloned()
      .collect();
    students.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(students)
  }

  async fn get_student(&self, id: Uuid) -> Result<Option<Student>, FakeError> {
    self.directory_check()?;
    Ok(self.lock().students.iter().find(|s| s.id == id).cloned())
  }
}

impl SubscriptionRegistry for MemoryStore {
  type Error = FakeError;

  async fn subscribe(&self, input: NewSubscription) -> Result<SubscribeOutcome, FakeError> {
    Ok(Self::insert(&mut self.lock(), input))
  }

  async fn subscribe_many(
    &self,
    organization_id: Uuid,
    recipient_id:    RecipientId,
    student_id:      Uuid,
    event_types:     &[EventType],
  ) -> Result<usize, FakeError> {
    let fail_after = *self.fail_batch_after.lock().unwrap();
    let mut inner = self.lock();

    // Stage on a copy; only a fully successful batch replaces the original.
    let mut staged = Inner {
      subscriptions: inner.subscriptions.clone(),
      ..Inner::default()
    };
    let mut created = 0;
    for (written, &event_type) in event_types.iter().enumerate() {
      if fail_after == Some(written) {
        return Err(FakeError("simulated write failure"));
      }
      let input = NewSubscription { organization_id, recipient_id, student_id, event_type };
      if Self::insert(&mut staged, input).is_created() {
        created += 1;
      }
    }
    inner.subscriptions = staged.subscriptions;
    Ok(created)
  }

  async fn find_subscribers(
    &self,
    student_id: Uuid,
    event_type: EventType,
  ) -> Result<BTreeSet<RecipientId>, FakeError> {
    Ok(
      self
        .lock()
        .subscriptions
        .iter()
        .filter(|s| s.student_id == student_id && s.event_type == event_type)
        .map(|s| s.recipient_id)
        .collect(),
    )
  }

  async fn recipients_for_event_type(
    &self,
    event_type: EventType,
  ) -> Result<BTreeSet<RecipientId>, FakeError> {
    {
      let mut remaining = self.fail_type_lookups.lock().unwrap();
      if *remaining > 0 {
        *remaining -= 1;
        return Err(FakeError("registry offline"));
      }
    }
    Ok(
      self
        .lock()
        .subscriptions
        .iter()
        .filter(|s| s.event_type == event_type)
        .map(|s| s.recipient_id)
        .collect(),
    )
  }

  async fn list_for_recipient(
    &self,
    recipient_id: RecipientId,
  ) -> Result<Vec<Subscription>, FakeError> {
    Ok(
      self
        .lock()
        .subscriptions
        .iter()
        .filter(|s| s.recipient_id == recipient_id)
        .cloned()
        .collect(),
    )
  }

  async fn unsubscribe_student(
    &self,
    recipient_id: RecipientId,
    student_id:   Uuid,
  ) -> Result<usize, FakeError> {
    let mut inner = self.lock();
    let before = inner.subscriptions.len();
    inner
      .subscriptions
      .retain(|s| !(s.recipient_id == recipient_id && s.student_id == student_id));
    Ok(before - inner.subscriptions.len())
  }
}

impl SchemaCatalog for MemoryStore {
  type Error = FakeError;

  async fn list_tables(&self) -> Result<BTreeSet<String>, FakeError> {
    Ok(self.lock().tables.clone())
  }
}

// ─── ScriptedLog ─────────────────────────────────────────────────────────────

/// An event log that answers `latest()` from a fixed script.
pub struct ScriptedLog {
  script: Mutex<VecDeque<Result<Option<Event>, FakeError>>>,
}

impl ScriptedLog {
  pub fn new(script: impl IntoIterator<Item = Result<Option<Event>, FakeError>>) -> Self {
    Self { script: Mutex::new(script.into_iter().collect()) }
  }
}

impl EventLog for ScriptedLog {
  type Error = FakeError;

  async fn latest(&self) -> Result<Option<Event>, FakeError> {
    self
      .script
      .lock()
      .unwrap()
      .pop_front()
      .unwrap_or(Err(FakeError("script exhausted")))
  }

  async fn get(&self, _id: Uuid) -> Result<Option<Event>, FakeError> { Ok(None) }

  async fn recent(&self, _limit: usize) -> Result<Vec<Event>, FakeError> { Ok(Vec::new()) }
}

// ─── RecordingSink ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
  Text { recipient: RecipientId, text: String },
  Photo { recipient: RecipientId, image: PathBuf, caption: String },
  Reply { recipient: RecipientId, reply: Reply },
  Ack(String),
}

/// A transport that records every call; chosen recipients fail or stall.
#[derive(Default)]
pub struct RecordingSink {
  sent:    Mutex<Vec<Sent>>,
  failing: HashSet<RecipientId>,
  stalled: HashSet<RecipientId>,
}

impl RecordingSink {
  pub fn failing(recipients: impl IntoIterator<Item = RecipientId>) -> Self {
    Self { failing: recipients.into_iter().collect(), ..Self::default() }
  }

  pub fn stalled(recipients: impl IntoIterator<Item = RecipientId>) -> Self {
    Self { stalled: recipients.into_iter().collect(), ..Self::default() }
  }

  pub fn sent(&self) -> Vec<Sent> { self.sent.lock().unwrap().clone() }

  pub fn delivered_to(&self) -> BTreeSet<RecipientId> {
    self
      .sent()
      .into_iter()
      .filter_map(|s| match s {
        Sent::Text { recipient, .. } | Sent::Photo { recipient, .. } => Some(recipient),
        _ => None,
      })
      .collect()
  }

  async fn attempt(&self, recipient: RecipientId, sent: Sent) -> Result<(), DeliveryError> {
    if self.stalled.contains(&recipient) {
      tokio::time::sleep(Duration::from_secs(5)).await;
    }
    if self.failing.contains(&recipient) {
      return Err(DeliveryError::Rejected("chat not found".into()));
    }
    self.sent.lock().unwrap().push(sent);
    Ok(())
  }
}

impl DeliverySink for RecordingSink {
  async fn send_text(&self, recipient: RecipientId, text: &str) -> Result<(), DeliveryError> {
    self.attempt(recipient, Sent::Text { recipient, text: text.into() }).await
  }

  async fn send_photo(
    &self,
    recipient: RecipientId,
    image:     &Path,
    caption:   &str,
  ) -> Result<(), DeliveryError> {
    let sent = Sent::Photo { recipient, image: image.to_path_buf(), caption: caption.into() };
    self.attempt(recipient, sent).await
  }
}

impl ReplySink for RecordingSink {
  async fn reply(&self, recipient: RecipientId, reply: &Reply) -> Result<(), DeliveryError> {
    self.attempt(recipient, Sent::Reply { recipient, reply: reply.clone() }).await
  }

  async fn acknowledge(&self, callback_id: &str) -> Result<(), DeliveryError> {
    self.sent.lock().unwrap().push(Sent::Ack(callback_id.into()));
    Ok(())
  }
}
