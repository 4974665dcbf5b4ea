//! Fan-out of a detected event to its subscribers.
//!
//! One notification is formatted per event and delivered to every matching
//! recipient concurrently. A failed or timed-out delivery is recorded against
//! that recipient and never affects the others.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use futures::future::join_all;
use tirek_core::{
  delivery::{DeliveryError, DeliverySink},
  event::Event,
  store::{Directory, SubscriptionRegistry},
  subscription::RecipientId,
};
use uuid::Uuid;

use crate::{Error, Result};

/// Display name used when the student cannot be looked up.
pub const UNKNOWN_STUDENT: &str = "Unknown student";

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DispatchConfig {
  /// Directory holding event images written by the detection pipeline.
  pub image_dir:        PathBuf,
  /// Upper bound on a single delivery call.
  pub delivery_timeout: Duration,
}

impl Default for DispatchConfig {
  fn default() -> Self {
    Self {
      image_dir:        PathBuf::from("events"),
      delivery_timeout: Duration::from_secs(15),
    }
  }
}

// ─── Payload ─────────────────────────────────────────────────────────────────

/// The payload shared by every recipient of one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
  pub text:  String,
  /// Sent as a photo with `text` as its caption when present.
  pub image: Option<PathBuf>,
}

/// Render the notification text for `event`.
pub fn format_event(event: &Event, student_name: &str) -> String {
  format!(
    "⚠️ ATTENTION! New event detected!\n\n\
     Student: {student_name}\n\
     Event type: {}\n\
     Date and time: {}\n",
    event.event_type,
    event.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
  )
}

/// Where the image for `event` would live under `image_dir`.
///
/// Uses the event's own reference when it has one, otherwise `{id}.jpg`.
pub fn image_path(image_dir: &Path, event: &Event) -> PathBuf {
  match &event.image_reference {
    Some(reference) => image_dir.join(reference),
    None => image_dir.join(format!("{}.jpg", event.id)),
  }
}

// ─── Report ──────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct RecipientFailure {
  pub recipient: RecipientId,
  pub error:     DeliveryError,
}

/// Outcome of one [`Dispatcher::dispatch`] call, for logging only.
#[derive(Debug)]
pub struct DispatchReport {
  pub event_id:       Uuid,
  pub delivered:      usize,
  pub failures:       Vec<RecipientFailure>,
  pub no_subscribers: bool,
}

impl DispatchReport {
  pub fn failed(&self) -> usize { self.failures.len() }
}

// ─── Dispatcher ──────────────────────────────────────────────────────────────

pub struct Dispatcher<R, D> {
  registry: Arc<R>,
  sink:     Arc<D>,
  config:   DispatchConfig,
}

impl<R, D> Dispatcher<R, D>
where
  R: SubscriptionRegistry + Directory,
  D: DeliverySink,
{
  pub fn new(registry: Arc<R>, sink: Arc<D>, config: DispatchConfig) -> Self {
    Self { registry, sink, config }
  }

  /// Deliver `event` to everyone subscribed to its (student, type) pair.
  ///
  /// Only a failed subscriber lookup is returned as an error; delivery
  /// failures are counted in the report.
  pub async fn dispatch(&self, event: &Event) -> Result<DispatchReport> {
    let recipients = self
      .registry
      .find_subscribers(event.student_id, event.event_type)
      .await
      .map_err(Error::registry_read)?;

    if recipients.is_empty() {
      tracing::info!(event_id = %event.id, "no subscriptions for event");
      return Ok(DispatchReport {
        event_id:       event.id,
        delivered:      0,
        failures:       Vec::new(),
        no_subscribers: true,
      });
    }

    let student_name = self.student_name(event.student_id).await;
    let notification = Notification {
      text:  format_event(event, &student_name),
      image: self.attachment(event).await,
    };

    let attempts = recipients.iter().map(|&recipient| {
      let notification = &notification;
      async move {
        let result = self.deliver(recipient, notification).await;
        (recipient, result)
      }
    });

    let mut report = DispatchReport {
      event_id:       event.id,
      delivered:      0,
      failures:       Vec::new(),
      no_subscribers: false,
    };
    for (recipient, result) in join_all(attempts).await {
      match result {
        Ok(()) => {
          tracing::info!(event_id = %event.id, %recipient, "notification sent");
          report.delivered += 1;
        }
        Err(error) => {
          tracing::warn!(event_id = %event.id, %recipient, %error, "notification failed");
          report.failures.push(RecipientFailure { recipient, error });
        }
      }
    }

    Ok(report)
  }

  async fn deliver(
    &self,
    recipient:    RecipientId,
    notification: &Notification,
  ) -> Result<(), DeliveryError> {
    let timeout = self.config.delivery_timeout;
    let send = async {
      match &notification.image {
        Some(path) => self.sink.send_photo(recipient, path, &notification.text).await,
        None => self.sink.send_text(recipient, &notification.text).await,
      }
    };
    tokio::time::timeout(timeout, send)
      .await
      .unwrap_or(Err(DeliveryError::Timeout(timeout)))
  }

  async fn student_name(&self, student_id: Uuid) -> String {
    match self.registry.get_student(student_id).await {
      Ok(Some(student)) => student.name,
      Ok(None) => UNKNOWN_STUDENT.to_owned(),
      Err(e) => {
        tracing::warn!(%student_id, error = %e, "student lookup failed");
        UNKNOWN_STUDENT.to_owned()
      }
    }
  }

  async fn attachment(&self, event: &Event) -> Option<PathBuf> {
    let path = image_path(&self.config.image_dir, event);
    match tokio::fs::try_exists(&path).await {
      Ok(true) => Some(path),
      Ok(false) => None,
      Err(e) => {
        tracing::warn!(path = %path.display(), error = %e, "cannot check event image");
        None
      }
    }
  }
}
