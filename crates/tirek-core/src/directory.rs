//! Read-only reference entities enumerated during onboarding.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
  pub id:   Uuid,
  pub name: String,
}

/// A user account with the `STUDENT` role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
  pub id:              Uuid,
  pub name:            String,
  pub organization_id: Uuid,
}
