//! The subset of Bot API objects the notifier reads and writes.
//!
//! Unknown fields are ignored on the way in, and absent optionals are
//! omitted on the way out.

use serde::{Deserialize, Serialize};
use tirek_core::{
  interaction::{Interaction, Payload, Reply},
  subscription::RecipientId,
};

// ─── Inbound ─────────────────────────────────────────────────────────────────

/// Envelope around every Bot API response.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
  pub ok:          bool,
  pub result:      Option<T>,
  pub description: Option<String>,
  pub error_code:  Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
  pub update_id:      i64,
  pub message:        Option<Message>,
  pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
  pub message_id: i64,
  pub chat:       Chat,
  pub from:       Option<User>,
  pub text:       Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
  pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
  pub id:         i64,
  pub first_name: String,
  pub username:   Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
  pub id:      String,
  pub from:    User,
  pub message: Option<Message>,
  pub data:    Option<String>,
}

impl Update {
  /// Convert to a transport-neutral interaction.
  ///
  /// Returns `None` for updates the notifier does not react to: plain
  /// text, edits, button presses without data, and so on.
  pub fn into_interaction(self) -> Option<Interaction> {
    if let Some(query) = self.callback_query {
      let data = query.data?;
      let recipient = query
        .message
        .as_ref()
        .map_or(query.from.id, |m| m.chat.id);
      return Some(Interaction {
        recipient:    RecipientId(recipient),
        display_name: Some(query.from.first_name),
        message_id:   query.message.map(|m| m.message_id),
        callback_id:  Some(query.id),
        payload:      Payload::Selection(data),
      });
    }

    let message = self.message?;
    let command = parse_command(message.text.as_deref()?)?;
    Some(Interaction {
      recipient:    RecipientId(message.chat.id),
      display_name: message.from.map(|u| u.first_name),
      message_id:   Some(message.message_id),
      callback_id:  None,
      payload:      Payload::Command(command.to_owned()),
    })
  }
}

/// Extract `cmd` from `/cmd`, `/cmd@bot_name` or `/cmd arguments`.
pub fn parse_command(text: &str) -> Option<&str> {
  let word = text.trim_start().strip_prefix('/')?.split_whitespace().next()?;
  let name = word.split_once('@').map_or(word, |(name, _)| name);
  (!name.is_empty()).then_some(name)
}

// ─── Outbound ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardMarkup {
  pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardButton {
  pub text:          String,
  pub callback_data: String,
}

impl InlineKeyboardMarkup {
  /// One button per row, in the order of `reply.buttons`. `None` when the
  /// reply has no buttons.
  pub fn for_reply(reply: &Reply) -> Option<Self> {
    if reply.buttons.is_empty() {
      return None;
    }
    let inline_keyboard = reply
      .buttons
      .iter()
      .map(|b| {
        vec![InlineKeyboardButton {
          text:          b.label.clone(),
          callback_data: b.token.clone(),
        }]
      })
      .collect();
    Some(Self { inline_keyboard })
  }
}

#[derive(Debug, Serialize)]
pub(crate) struct SendMessage<'a> {
  pub chat_id:      i64,
  pub text:         &'a str,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Debug, Serialize)]
pub(crate) struct EditMessageText<'a> {
  pub chat_id:      i64,
  pub message_id:   i64,
  pub text:         &'a str,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnswerCallbackQuery<'a> {
  pub callback_query_id: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct GetUpdates<'a> {
  pub offset:          i64,
  pub timeout:         u64,
  pub allowed_updates: &'a [&'a str],
}

#[derive(Debug, Serialize)]
pub(crate) struct SetWebhook<'a> {
  pub url:             &'a str,
  pub allowed_updates: &'a [&'a str],
}

/// Update kinds requested from Telegram.
pub(crate) const ALLOWED_UPDATES: &[&str] = &["message", "callback_query"];

#[cfg(test)]
mod tests {
  use tirek_core::interaction::Button;

  use super::*;

  fn update(json: serde_json::Value) -> Update { serde_json::from_value(json).unwrap() }

  #[test]
  fn command_message_becomes_command() {
    let interaction = update(serde_json::json!({
      "update_id": 10,
      "message": {
        "message_id": 5,
        "date": 1700000000,
        "chat": { "id": 42, "type": "private" },
        "from": { "id": 42, "is_bot": false, "first_name": "Dana" },
        "text": "/subscribe@tirek_bot now"
      }
    }))
    .into_interaction()
    .unwrap();

    assert_eq!(interaction.recipient, RecipientId(42));
    assert_eq!(interaction.display_name.as_deref(), Some("Dana"));
    assert_eq!(interaction.callback_id, None);
    assert_eq!(interaction.payload, Payload::Command("subscribe".into()));
  }

  #[test]
  fn button_press_becomes_selection() {
    let interaction = update(serde_json::json!({
      "update_id": 11,
      "callback_query": {
        "id": "cbq-1",
        "from": { "id": 7, "is_bot": false, "first_name": "Dana" },
        "chat_instance": "x",
        "message": {
          "message_id": 99,
          "chat": { "id": -100, "type": "group" },
          "text": "Select your organization:"
        },
        "data": "o:abc"
      }
    }))
    .into_interaction()
    .unwrap();

    assert_eq!(interaction.recipient, RecipientId(-100));
    assert_eq!(interaction.message_id, Some(99));
    assert_eq!(interaction.callback_id.as_deref(), Some("cbq-1"));
    assert_eq!(interaction.payload, Payload::Selection("o:abc".into()));
  }

  #[test]
  fn plain_text_is_ignored() {
    let plain = update(serde_json::json!({
      "update_id": 12,
      "message": { "message_id": 1, "chat": { "id": 1 }, "text": "hello" }
    }));
    assert!(plain.into_interaction().is_none());

    let sticker = update(serde_json::json!({
      "update_id": 13,
      "message": { "message_id": 2, "chat": { "id": 1 } }
    }));
    assert!(sticker.into_interaction().is_none());
  }

  #[test]
  fn parse_command_forms() {
    assert_eq!(parse_command("/start"), Some("start"));
    assert_eq!(parse_command("  /notify extra words"), Some("notify"));
    assert_eq!(parse_command("/my_subscriptions@bot"), Some("my_subscriptions"));
    assert_eq!(parse_command("/"), None);
    assert_eq!(parse_command("/@bot"), None);
    assert_eq!(parse_command("start"), None);
  }

  #[test]
  fn keyboard_has_one_button_per_row() {
    let reply = Reply::text("Select a student:").with_buttons(vec![
      Button { label: "S1".into(), token: "s:1".into() },
      Button { label: "S2".into(), token: "s:2".into() },
    ]);
    let markup = InlineKeyboardMarkup::for_reply(&reply).unwrap();
    assert_eq!(
      serde_json::to_value(&markup).unwrap(),
      serde_json::json!({
        "inline_keyboard": [
          [{ "text": "S1", "callback_data": "s:1" }],
          [{ "text": "S2", "callback_data": "s:2" }]
        ]
      })
    );
    assert!(InlineKeyboardMarkup::for_reply(&Reply::text("hi")).is_none());
  }
}
