//! The per-recipient subscription onboarding flow.
//!
//! ```text
//! AwaitingOrganization --select organization--> AwaitingStudent --select student--> Committed
//! ```
//!
//! A new `/subscribe` restarts the flow and abandons whatever state the
//! recipient had. There is no timeout.
//!
//! Selection tokens carry every id they need, so a recipient with no
//! session (e.g. after a restart) can still complete a flow from buttons
//! already on screen. A recipient with a session can only use buttons that
//! belong to it.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex},
};

use tirek_core::{
  directory::{Organization, Student},
  event::EventType,
  store::{Directory, SubscriptionRegistry},
  subscription::RecipientId,
};
use uuid::Uuid;

use crate::{Error, Result};

/// Event types every onboarding commit subscribes to.
pub const ONBOARDING_EVENT_TYPES: [EventType; 3] =
  [EventType::Weapon, EventType::Fighting, EventType::Smoking];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnboardingState {
  AwaitingOrganization,
  AwaitingStudent { organization_id: Uuid },
  Committed { organization_id: Uuid, student_id: Uuid },
}

/// What a successful commit produced.
#[derive(Debug, Clone)]
pub struct Commit {
  pub student: Student,
  /// Rows newly written; already-held subscriptions are not counted.
  pub created: usize,
}

pub struct Onboarding<R> {
  registry: Arc<R>,
  sessions: Mutex<HashMap<RecipientId, OnboardingState>>,
}

impl<R> Onboarding<R>
where
  R: SubscriptionRegistry + Directory,
{
  pub fn new(registry: Arc<R>) -> Self {
    Self { registry, sessions: Mutex::new(HashMap::new()) }
  }

  pub fn state(&self, recipient: RecipientId) -> Option<OnboardingState> {
    self.lock().get(&recipient).copied()
  }

  /// Start (or restart) the flow. Returns the organizations to offer.
  pub async fn start(&self, recipient: RecipientId) -> Result<Vec<Organization>> {
    let organizations = self
      .registry
      .list_organizations()
      .await
      .map_err(Error::directory)?;
    self.set(recipient, OnboardingState::AwaitingOrganization);
    tracing::debug!(%recipient, count = organizations.len(), "onboarding started");
    Ok(organizations)
  }

  /// `AwaitingOrganization → AwaitingStudent`. Returns the organization and
  /// its students.
  pub async fn select_organization(
    &self,
    recipient:       RecipientId,
    organization_id: Uuid,
    token:           &str,
  ) -> Result<(Organization, Vec<Student>)> {
    match self.state(recipient) {
      None | Some(OnboardingState::AwaitingOrganization) => {}
      Some(_) => return Err(Error::UnknownReferenceToken(token.to_owned())),
    }

    let organization = self
      .registry
      .get_organization(organization_id)
      .await
      .map_err(Error::directory)?
      .ok_or_else(|| Error::UnknownReferenceToken(token.to_owned()))?;

    let students = self
      .registry
      .list_students(organization_id)
      .await
      .map_err(Error::directory)?;

    self.set(recipient, OnboardingState::AwaitingStudent { organization_id });
    tracing::debug!(%recipient, %organization_id, "organization selected");
    Ok((organization, students))
  }

  /// `AwaitingStudent → Committed`. Writes one subscription per
  /// [`ONBOARDING_EVENT_TYPES`] entry in a single transaction.
  ///
  /// Also accepted from `Committed` within the same organization, so
  /// several students can be picked from one list. On a write failure the
  /// state is left as it was.
  pub async fn select_student(
    &self,
    recipient:       RecipientId,
    student_id:      Uuid,
    organization_id: Uuid,
    token:           &str,
  ) -> Result<Commit> {
    let session_org = match self.state(recipient) {
      None => None,
      Some(OnboardingState::AwaitingStudent { organization_id }) => Some(organization_id),
      Some(OnboardingState::Committed { organization_id, .. }) => Some(organization_id),
      Some(OnboardingState::AwaitingOrganization) => {
        return Err(Error::UnknownReferenceToken(token.to_owned()));
      }
    };
    if session_org.is_some_and(|org| org != organization_id) {
      return Err(Error::UnknownReferenceToken(token.to_owned()));
    }

    let student = self
      .registry
      .get_student(student_id)
      .await
      .map_err(Error::directory)?
      .filter(|s| s.organization_id == organization_id)
      .ok_or_else(|| Error::UnknownReferenceToken(token.to_owned()))?;

    let created = self
      .registry
      .subscribe_many(organization_id, recipient, student_id, &ONBOARDING_EVENT_TYPES)
      .await
      .map_err(Error::registry_write)?;

    self.set(recipient, OnboardingState::Committed { organization_id, student_id });
    tracing::info!(%recipient, %student_id, created, "subscriptions committed");
    Ok(Commit { student, created })
  }

  fn set(&self, recipient: RecipientId, state: OnboardingState) {
    self.lock().insert(recipient, state);
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<RecipientId, OnboardingState>> {
    // Every write is a single insert, so a poisoned map is still consistent.
    self.sessions.lock().unwrap_or_else(|e| e.into_inner())
  }
}
