//! Safety events: immutable records written by the detection pipeline.
//!
//! The notifier never creates, updates or deletes events. It only reads the
//! newest one and looks events up by id.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::{Error, Result};

// ─── EventType ───────────────────────────────────────────────────────────────

/// What the detection pipeline saw.
///
/// The string form (`WEAPON`, `STUDENT_ENTRANCE`, …) is what the event log
/// stores and what notifications display.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  AsRefStr,
  Display,
  EnumIter,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
  Weapon,
  Fighting,
  Smoking,
  StudentEntrance,
}

impl EventType {
  /// The discriminant stored in the `event_type` column.
  pub fn as_str(self) -> &'static str { self.into() }

  /// Parse a stored discriminant.
  pub fn parse(s: &str) -> Result<Self> {
    Self::from_str(s).map_err(|_| Error::UnknownEventType(s.to_owned()))
  }
}

// ─── Event ───────────────────────────────────────────────────────────────────

/// A detected safety incident for one student.
///
/// Ids are unique but carry no ordering; recency is decided by `timestamp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
  pub id:              Uuid,
  pub event_type:      EventType,
  pub student_id:      Uuid,
  pub organization_id: Uuid,
  pub timestamp:       DateTime<Utc>,
  /// Image file name relative to the configured image directory.
  pub image_reference: Option<String>,
}

#[cfg(test)]
mod tests {
  use strum::IntoEnumIterator;

  use super::*;

  #[test]
  fn discriminants_are_screaming_snake_case() {
    assert_eq!(EventType::Weapon.as_str(), "WEAPON");
    assert_eq!(EventType::StudentEntrance.as_str(), "STUDENT_ENTRANCE");
    assert_eq!(EventType::StudentEntrance.to_string(), "STUDENT_ENTRANCE");
  }

  #[test]
  fn parse_accepts_every_stored_form() {
    for ty in EventType::iter() {
      assert_eq!(EventType::parse(ty.as_str()).unwrap(), ty);
    }
  }

  #[test]
  fn parse_rejects_unknown_discriminant() {
    let err = EventType::parse("LOITERING").unwrap_err();
    assert!(matches!(err, Error::UnknownEventType(s) if s == "LOITERING"));
  }

  #[test]
  fn serde_form_matches_column_form() {
    let json = serde_json::to_string(&EventType::StudentEntrance).unwrap();
    assert_eq!(json, "\"STUDENT_ENTRANCE\"");
  }
}
