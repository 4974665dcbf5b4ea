//! Routes recipient interactions to commands and the onboarding flow, and
//! turns every outcome into a [`Reply`].
//!
//! | Input | Effect |
//! |-------|--------|
//! | `/start` | greeting and command list |
//! | `/subscribe` | restart onboarding; organization keyboard |
//! | `o:` token | student keyboard for the organization |
//! | `s:` token | commit subscriptions for the student |
//! | `/my_subscriptions` | list the recipient's subscriptions |
//! | `/unsubscribe`, `u:` token | drop all subscriptions for a student |
//! | `/notify` | recent events matching the recipient's subscriptions |
//! | `/contact_support` | support text |

use std::{
  collections::{BTreeMap, BTreeSet},
  sync::Arc,
};

use tirek_core::{
  event::EventType,
  interaction::{Button, Interaction, Payload, Reply},
  store::{Directory, EventLog, SubscriptionRegistry},
  subscription::RecipientId,
};
use uuid::Uuid;

use crate::{
  Error, Result,
  dispatch::UNKNOWN_STUDENT,
  onboarding::Onboarding,
  token::SelectionToken,
};

/// How many events `/notify` shows.
pub const RECENT_EVENTS_SHOWN: usize = 5;
/// How far back `/notify` scans the log for matching events.
const RECENT_EVENTS_SCANNED: usize = 100;

pub const ERROR_TEXT: &str =
  "An error occurred while processing your request. Please try again.";
pub const COMMIT_ERROR_TEXT: &str =
  "An error occurred while saving your subscription. Please try again.";
pub const STALE_SELECTION_TEXT: &str =
  "This selection is no longer valid. Send /subscribe to start again.";

pub struct Conversation<S> {
  store:      Arc<S>,
  onboarding: Onboarding<S>,
}

impl<S> Conversation<S>
where
  S: SubscriptionRegistry + Directory + EventLog,
{
  pub fn new(store: Arc<S>) -> Self {
    let onboarding = Onboarding::new(store.clone());
    Self { store, onboarding }
  }

  pub fn onboarding(&self) -> &Onboarding<S> { &self.onboarding }

  /// Handle one interaction. Never fails: errors become explanatory replies.
  pub async fn handle(&self, interaction: &Interaction) -> Reply {
    let recipient = interaction.recipient;
    let result = match &interaction.payload {
      Payload::Command(command) => self.command(interaction, command).await,
      Payload::Selection(token) => self.selection(interaction, token).await,
    };

    result.unwrap_or_else(|e| {
      match &e {
        Error::UnknownReferenceToken(_) => {
          tracing::info!(%recipient, error = %e, "selection rejected");
          Reply::text(STALE_SELECTION_TEXT)
        }
        Error::RegistryWrite(_) => {
          tracing::error!(%recipient, error = %e, "subscription commit failed");
          Reply::text(COMMIT_ERROR_TEXT)
        }
        _ => {
          tracing::error!(%recipient, error = %e, "interaction failed");
          Reply::text(ERROR_TEXT)
        }
      }
    })
  }

  // ── Commands ────────────────────────────────────────────────────────────

  async fn command(&self, interaction: &Interaction, command: &str) -> Result<Reply> {
    let recipient = interaction.recipient;
    match command {
      "start" => Ok(Reply::text(greeting(interaction.display_name.as_deref()))),
      "subscribe" => self.subscribe(recipient).await,
      "my_subscriptions" => self.my_subscriptions(recipient).await,
      "unsubscribe" => self.unsubscribe_menu(recipient).await,
      "notify" => self.recent_events(recipient).await,
      "contact_support" => Ok(Reply::text(SUPPORT_TEXT)),
      other => {
        tracing::debug!(%recipient, command = other, "unknown command");
        Ok(Reply::text("Unknown command. Send /start to see what I can do."))
      }
    }
  }

  async fn subscribe(&self, recipient: RecipientId) -> Result<Reply> {
    let organizations = self.onboarding.start(recipient).await?;
    if organizations.is_empty() {
      return Ok(Reply::text("No organizations are available yet."));
    }

    let buttons = organizations
      .into_iter()
      .map(|org| Button {
        label: org.name,
        token: SelectionToken::Organization { organization_id: org.id }.encode(),
      })
      .collect();
    Ok(Reply::text("Select your organization:").with_buttons(buttons))
  }

  async fn my_subscriptions(&self, recipient: RecipientId) -> Result<Reply> {
    let by_student = self.subscriptions_by_student(recipient).await?;
    if by_student.is_empty() {
      return Ok(Reply::text(
        "You have no subscriptions yet. Send /subscribe to add one.",
      ));
    }

    let mut text = String::from("Your subscriptions:\n");
    for (student_id, types) in &by_student {
      let name = self.student_name(*student_id).await?;
      let types: Vec<&str> = types.iter().map(|t| t.as_str()).collect();
      text.push_str(&format!("\n• {name}: {}", types.join(", ")));
    }
    Ok(Reply::text(text))
  }

  async fn unsubscribe_menu(&self, recipient: RecipientId) -> Result<Reply> {
    let by_student = self.subscriptions_by_student(recipient).await?;
    if by_student.is_empty() {
      return Ok(Reply::text("You have no subscriptions to remove."));
    }

    let mut buttons = Vec::with_capacity(by_student.len());
    for student_id in by_student.keys() {
      buttons.push(Button {
        label: self.student_name(*student_id).await?,
        token: SelectionToken::Unsubscribe { student_id: *student_id }.encode(),
      });
    }
    Ok(Reply::text("Select a student to unsubscribe from:").with_buttons(buttons))
  }

  async fn recent_events(&self, recipient: RecipientId) -> Result<Reply> {
    let followed: BTreeSet<(Uuid, EventType)> = self
      .store
      .list_for_recipient(recipient)
      .await
      .map_err(Error::registry_read)?
      .into_iter()
      .map(|s| (s.student_id, s.event_type))
      .collect();
    if followed.is_empty() {
      return Ok(Reply::text(
        "You have no subscriptions yet. Send /subscribe to add one.",
      ));
    }

    let events: Vec<_> = self
      .store
      .recent(RECENT_EVENTS_SCANNED)
      .await
      .map_err(Error::log)?
      .into_iter()
      .filter(|e| followed.contains(&(e.student_id, e.event_type)))
      .take(RECENT_EVENTS_SHOWN)
      .collect();
    if events.is_empty() {
      return Ok(Reply::text("No recent events for your subscriptions."));
    }

    let mut text = String::from("Recent events:\n");
    for event in &events {
      let name = self.student_name(event.student_id).await?;
      text.push_str(&format!(
        "\n• {} — {name} — {}",
        event.event_type,
        event.timestamp.format("%Y-%m-%d %H:%M"),
      ));
    }
    Ok(Reply::text(text))
  }

  // ── Selections ──────────────────────────────────────────────────────────

  async fn selection(&self, interaction: &Interaction, token: &str) -> Result<Reply> {
    let recipient = interaction.recipient;
    let parsed = SelectionToken::decode(token)
      .ok_or_else(|| Error::UnknownReferenceToken(token.to_owned()))?;

    match parsed {
      SelectionToken::Organization { organization_id } => {
        let (_, students) = self
          .onboarding
          .select_organization(recipient, organization_id, token)
          .await?;
        if students.is_empty() {
          return Ok(
            Reply::text("This organization has no students yet.")
              .replacing(interaction.message_id),
          );
        }
        let buttons = students
          .into_iter()
          .map(|student| Button {
            token: SelectionToken::Student {
              student_id: student.id,
              organization_id,
            }
            .encode(),
            label: student.name,
          })
          .collect();
        Ok(
          Reply::text("Select a student:")
            .with_buttons(buttons)
            .replacing(interaction.message_id),
        )
      }
      SelectionToken::Student { student_id, organization_id } => {
        let commit = self
          .onboarding
          .select_student(recipient, student_id, organization_id, token)
          .await?;
        Ok(Reply::text(format!(
          "You have successfully subscribed to notifications for student {}. \
           You will receive notifications about important events.",
          commit.student.name
        )))
      }
      SelectionToken::Unsubscribe { student_id } => {
        let removed = self
          .store
          .unsubscribe_student(recipient, student_id)
          .await
          .map_err(Error::registry_write)?;
        if removed == 0 {
          return Err(Error::UnknownReferenceToken(token.to_owned()));
        }
        tracing::info!(%recipient, %student_id, removed, "subscriptions removed");
        let name = self.student_name(student_id).await?;
        Ok(
          Reply::text(format!(
            "You have unsubscribed from notifications for student {name}."
          ))
          .replacing(interaction.message_id),
        )
      }
    }
  }

  // ── Helpers ─────────────────────────────────────────────────────────────

  async fn subscriptions_by_student(
    &self,
    recipient: RecipientId,
  ) -> Result<BTreeMap<Uuid, BTreeSet<EventType>>> {
    let subscriptions = self
      .store
      .list_for_recipient(recipient)
      .await
      .map_err(Error::registry_read)?;

    let mut by_student: BTreeMap<Uuid, BTreeSet<EventType>> = BTreeMap::new();
    for sub in subscriptions {
      by_student.entry(sub.student_id).or_default().insert(sub.event_type);
    }
    Ok(by_student)
  }

  async fn student_name(&self, student_id: Uuid) -> Result<String> {
    Ok(
      self
        .store
        .get_student(student_id)
        .await
        .map_err(Error::directory)?
        .map(|s| s.name)
        .unwrap_or_else(|| UNKNOWN_STUDENT.to_owned()),
    )
  }
}

const SUPPORT_TEXT: &str = "Need help? Reply to this chat with a description of the \
problem and your organization's administrator will get back to you.";

fn greeting(display_name: Option<&str>) -> String {
  let name = display_name.unwrap_or("my friend");
  format!(
    "Hello, {name}! 👋\n\n\
     I'm your TIREK Bot 🤖\n\n\
     I'm here to help you with notifications. Let's get started!\n\n\
     What would you like to do?\n\
     • Add subscriptions 🔔 - /subscribe\n\
     • View your subscriptions 📋 - /my_subscriptions\n\
     • Remove subscriptions 🔕 - /unsubscribe\n\
     • View recent events 📬 - /notify\n\
     • Get help and support ❓ - /contact_support"
  )
}
