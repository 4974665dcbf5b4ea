//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`
//! suffix) so that lexical order equals chronological order. UUIDs are stored
//! as hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, Utc};
use tirek_core::{
  directory::{Organization, Student},
  event::{Event, EventType},
  subscription::{RecipientId, Subscription},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── EventType ────────────────────────────────────────────────────────────────

pub fn encode_event_type(t: EventType) -> &'static str { t.as_str() }

pub fn decode_event_type(s: &str) -> Result<EventType> { Ok(EventType::parse(s)?) }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from an `events` row.
pub struct RawEvent {
  pub id:              String,
  pub event_type:      String,
  pub student_id:      String,
  pub organization_id: String,
  pub timestamp:       String,
  pub image_reference: Option<String>,
}

impl RawEvent {
  pub const COLUMNS: &'static str =
    "id, event_type, student_id, organization_id, timestamp, image_reference";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:              row.get(0)?,
      event_type:      row.get(1)?,
      student_id:      row.get(2)?,
      organization_id: row.get(3)?,
      timestamp:       row.get(4)?,
      image_reference: row.get(5)?,
    })
  }

  pub fn into_event(self) -> Result<Event> {
    Ok(Event {
      id:              decode_uuid(&self.id)?,
      event_type:      decode_event_type(&self.event_type)?,
      student_id:      decode_uuid(&self.student_id)?,
      organization_id: decode_uuid(&self.organization_id)?,
      timestamp:       decode_dt(&self.timestamp)?,
      image_reference: self.image_reference,
    })
  }
}

/// Raw strings read directly from a `subscriptions` row.
pub struct RawSubscription {
  pub id:              String,
  pub organization_id: String,
  pub recipient_id:    i64,
  pub student_id:      String,
  pub event_type:      String,
  pub created_at:      String,
}

impl RawSubscription {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:              row.get(0)?,
      organization_id: row.get(1)?,
      recipient_id:    row.get(2)?,
      student_id:      row.get(3)?,
      event_type:      row.get(4)?,
      created_at:      row.get(5)?,
    })
  }

  pub fn into_subscription(self) -> Result<Subscription> {
    Ok(Subscription {
      id:              decode_uuid(&self.id)?,
      organization_id: decode_uuid(&self.organization_id)?,
      recipient_id:    RecipientId(self.recipient_id),
      student_id:      decode_uuid(&self.student_id)?,
      event_type:      decode_event_type(&self.event_type)?,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from an `organizations` row.
pub struct RawOrganization {
  pub id:   String,
  pub name: String,
}

impl RawOrganization {
  pub fn into_organization(self) -> Result<Organization> {
    Ok(Organization { id: decode_uuid(&self.id)?, name: self.name })
  }
}

/// Raw strings read directly from a `user_accounts` row.
pub struct RawStudent {
  pub id:              String,
  pub name:            String,
  pub organization_id: String,
}

impl RawStudent {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:              row.get(0)?,
      name:            row.get(1)?,
      organization_id: row.get(2)?,
    })
  }

  pub fn into_student(self) -> Result<Student> {
    Ok(Student {
      id:              decode_uuid(&self.id)?,
      name:            self.name,
      organization_id: decode_uuid(&self.organization_id)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn encoded_timestamps_sort_chronologically() {
    let whole = Utc.with_ymd_and_hms(2025, 3, 21, 16, 0, 0).unwrap();
    let later = whole + chrono::Duration::microseconds(1500);
    assert!(encode_dt(whole) < encode_dt(later));
    assert_eq!(encode_dt(whole).len(), encode_dt(later).len());
  }

  #[test]
  fn timestamp_roundtrip_keeps_microseconds() {
    let ts = Utc.timestamp_micros(1_742_572_800_123_456).unwrap();
    assert_eq!(decode_dt(&encode_dt(ts)).unwrap(), ts);
  }
}
