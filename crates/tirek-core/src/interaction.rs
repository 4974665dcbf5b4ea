//! Transport-neutral recipient interactions and the replies they produce.
//!
//! A transport turns its own updates (chat messages, button presses) into
//! [`Interaction`]s and renders [`Reply`]s back, including any selection
//! keyboard.

use crate::subscription::RecipientId;

/// One discrete input from a recipient.
#[derive(Debug, Clone)]
pub struct Interaction {
  pub recipient:    RecipientId,
  /// Human-readable sender name, when the transport knows it.
  pub display_name: Option<String>,
  /// The message a button press belongs to; replies may edit it in place.
  pub message_id:   Option<i64>,
  /// Transport handle that must be acknowledged for button presses.
  pub callback_id:  Option<String>,
  pub payload:      Payload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
  /// A slash command, stored without the leading `/` (e.g. `subscribe`).
  Command(String),
  /// A selection token produced by an earlier reply's button.
  Selection(String),
}

/// One selectable option rendered under a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
  pub label: String,
  pub token: String,
}

/// A message to show the recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
  pub text:    String,
  pub buttons: Vec<Button>,
  /// Edit this earlier message instead of sending a new one.
  pub replace: Option<i64>,
}

impl Reply {
  pub fn text(text: impl Into<String>) -> Self {
    Self { text: text.into(), buttons: Vec::new(), replace: None }
  }

  pub fn with_buttons(mut self, buttons: Vec<Button>) -> Self {
    self.buttons = buttons;
    self
  }

  pub fn replacing(mut self, message_id: Option<i64>) -> Self {
    self.replace = message_id;
    self
  }
}
