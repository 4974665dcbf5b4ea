//! Selection tokens carried by interactive buttons.
//!
//! Tokens are self-describing so a button press can be validated without
//! any per-recipient state. UUIDs are written as unpadded base64url (22
//! characters) which keeps the longest token at 47 bytes, under the 64-byte
//! callback limit chat transports impose.
//!
//! | Token | Meaning |
//! |-------|---------|
//! | `o:<org>` | organization chosen during onboarding |
//! | `s:<student>:<org>` | student chosen during onboarding |
//! | `u:<student>` | student chosen for unsubscribe |

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD as B64};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionToken {
  Organization { organization_id: Uuid },
  Student { student_id: Uuid, organization_id: Uuid },
  Unsubscribe { student_id: Uuid },
}

impl SelectionToken {
  pub fn encode(&self) -> String {
    match self {
      Self::Organization { organization_id } => format!("o:{}", encode_id(*organization_id)),
      Self::Student { student_id, organization_id } => {
        format!("s:{}:{}", encode_id(*student_id), encode_id(*organization_id))
      }
      Self::Unsubscribe { student_id } => format!("u:{}", encode_id(*student_id)),
    }
  }

  /// Parse a token. Returns `None` for anything malformed.
  pub fn decode(s: &str) -> Option<Self> {
    let (tag, rest) = s.split_once(':')?;
    match tag {
      "o" => Some(Self::Organization { organization_id: decode_id(rest)? }),
      "s" => {
        let (student, org) = rest.split_once(':')?;
        Some(Self::Student {
          student_id:      decode_id(student)?,
          organization_id: decode_id(org)?,
        })
      }
      "u" => Some(Self::Unsubscribe { student_id: decode_id(rest)? }),
      _ => None,
    }
  }
}

fn encode_id(id: Uuid) -> String { B64.encode(id.as_bytes()) }

fn decode_id(s: &str) -> Option<Uuid> {
  let bytes = B64.decode(s).ok()?;
  Uuid::from_slice(&bytes).ok()
}
