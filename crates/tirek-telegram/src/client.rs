//! Async Bot API client.

use std::{path::Path, time::Duration};

use reqwest::{
  Client,
  multipart::{Form, Part},
};
use serde::{Serialize, de::DeserializeOwned};
use tirek_core::{
  delivery::{DeliveryError, DeliverySink, ReplySink},
  interaction::Reply,
  subscription::RecipientId,
};

use crate::{
  Error, Result,
  types::{
    ALLOWED_UPDATES, AnswerCallbackQuery, ApiResponse, EditMessageText, GetUpdates,
    InlineKeyboardMarkup, Message, SendMessage, SetWebhook, Update,
  },
};

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Async client for the Telegram Bot API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct TelegramClient {
  client:   Client,
  /// `{api_url}/bot{token}`
  endpoint: String,
}

impl TelegramClient {
  pub fn new(api_url: &str, token: &str) -> Result<Self> {
    let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
    Ok(Self {
      client,
      endpoint: format!("{}/bot{token}", api_url.trim_end_matches('/')),
    })
  }

  fn url(&self, method: &str) -> String { format!("{}/{method}", self.endpoint) }

  async fn call<B, T>(&self, method: &str, body: &B) -> Result<T>
  where
    B: Serialize + ?Sized,
    T: DeserializeOwned,
  {
    let resp = self.client.post(self.url(method)).json(body).send().await?;
    Self::unwrap_response(resp).await
  }

  async fn unwrap_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    let body: ApiResponse<T> = resp.json().await?;
    match body {
      ApiResponse { ok: true, result: Some(result), .. } => Ok(result),
      ApiResponse { error_code, description, .. } => Err(Error::Api {
        code:        error_code.unwrap_or_else(|| i64::from(status.as_u16())),
        description: description.unwrap_or_else(|| "no description".into()),
      }),
    }
  }

  // ── Messages ──────────────────────────────────────────────────────────────

  /// `sendMessage`
  pub async fn send_message(
    &self,
    chat_id: i64,
    text: &str,
    reply_markup: Option<InlineKeyboardMarkup>,
  ) -> Result<Message> {
    self
      .call("sendMessage", &SendMessage { chat_id, text, reply_markup })
      .await
  }

  /// `editMessageText`
  pub async fn edit_message_text(
    &self,
    chat_id: i64,
    message_id: i64,
    text: &str,
    reply_markup: Option<InlineKeyboardMarkup>,
  ) -> Result<Message> {
    let body = EditMessageText { chat_id, message_id, text, reply_markup };
    self.call("editMessageText", &body).await
  }

  /// `sendPhoto`, uploading the file at `path`.
  pub async fn send_photo(&self, chat_id: i64, path: &Path, caption: &str) -> Result<Message> {
    let bytes = tokio::fs::read(path).await.map_err(|source| Error::Attachment {
      path: path.to_path_buf(),
      source,
    })?;
    let file_name = path
      .file_name()
      .map_or_else(|| "event.jpg".to_owned(), |n| n.to_string_lossy().into_owned());

    let form = Form::new()
      .text("chat_id", chat_id.to_string())
      .text("caption", caption.to_owned())
      .part("photo", Part::bytes(bytes).file_name(file_name));
    let resp = self.client.post(self.url("sendPhoto")).multipart(form).send().await?;
    Self::unwrap_response(resp).await
  }

  /// `answerCallbackQuery`
  pub async fn answer_callback_query(&self, callback_query_id: &str) -> Result<bool> {
    self
      .call("answerCallbackQuery", &AnswerCallbackQuery { callback_query_id })
      .await
  }

  // ── Updates ───────────────────────────────────────────────────────────────

  /// `getUpdates`, long-polling for up to `timeout`.
  pub async fn get_updates(&self, offset: i64, timeout: Duration) -> Result<Vec<Update>> {
    let body = GetUpdates {
      offset,
      timeout: timeout.as_secs(),
      allowed_updates: ALLOWED_UPDATES,
    };
    let resp = self
      .client
      .post(self.url("getUpdates"))
      .json(&body)
      .timeout(timeout + Duration::from_secs(10))
      .send()
      .await?;
    Self::unwrap_response(resp).await
  }

  /// `setWebhook`
  pub async fn set_webhook(&self, url: &str) -> Result<bool> {
    self
      .call("setWebhook", &SetWebhook { url, allowed_updates: ALLOWED_UPDATES })
      .await
  }

  /// `deleteWebhook`
  pub async fn delete_webhook(&self) -> Result<bool> {
    self.call("deleteWebhook", &serde_json::json!({})).await
  }
}

impl DeliverySink for TelegramClient {
  async fn send_text(&self, recipient: RecipientId, text: &str) -> Result<(), DeliveryError> {
    self.send_message(recipient.0, text, None).await?;
    Ok(())
  }

  async fn send_photo(
    &self,
    recipient: RecipientId,
    image: &Path,
    caption: &str,
  ) -> Result<(), DeliveryError> {
    TelegramClient::send_photo(self, recipient.0, image, caption).await?;
    Ok(())
  }
}

impl ReplySink for TelegramClient {
  /// Edits the referenced message when the reply asks for it, falling back
  /// to a new message if Telegram refuses the edit.
  async fn reply(&self, recipient: RecipientId, reply: &Reply) -> Result<(), DeliveryError> {
    let markup = InlineKeyboardMarkup::for_reply(reply);
    if let Some(message_id) = reply.replace {
      match self
        .edit_message_text(recipient.0, message_id, &reply.text, markup.clone())
        .await
      {
        Ok(_) => return Ok(()),
        Err(e @ Error::Api { .. }) => {
          tracing::debug!(%recipient, message_id, error = %e, "edit refused; sending new message");
        }
        Err(e) => return Err(e.into()),
      }
    }
    self.send_message(recipient.0, &reply.text, markup).await?;
    Ok(())
  }

  async fn acknowledge(&self, callback_id: &str) -> Result<(), DeliveryError> {
    self.answer_callback_query(callback_id).await?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use axum::{
    Json, Router,
    extract::{Path as UrlPath, State},
    routing::post,
  };
  use serde_json::{Value, json};
  use tirek_core::interaction::Button;
  use tokio::net::TcpListener;

  use super::*;

  type Calls = Arc<Mutex<Vec<(String, Value)>>>;

  /// A fake Bot API that records JSON calls. `editMessageText` always fails.
  async fn fake_api() -> (TelegramClient, Calls) {
    let calls: Calls = Arc::default();
    let app = Router::new()
      .route("/{bot}/{method}", post(handle))
      .with_state(calls.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    let client = TelegramClient::new(&format!("http://{addr}/"), "123:abc").unwrap();
    (client, calls)
  }

  async fn handle(
    State(calls): State<Calls>,
    UrlPath((bot, method)): UrlPath<(String, String)>,
    Json(body): Json<Value>,
  ) -> Json<Value> {
    assert_eq!(bot, "bot123:abc");
    calls.lock().unwrap().push((method.clone(), body));
    match method.as_str() {
      "editMessageText" => Json(json!({
        "ok": false, "error_code": 400, "description": "Bad Request: message can't be edited"
      })),
      "sendMessage" => Json(json!({
        "ok": true,
        "result": { "message_id": 1, "chat": { "id": 42 }, "text": "ok" }
      })),
      _ => Json(json!({ "ok": true, "result": true })),
    }
  }

  #[tokio::test]
  async fn send_text_posts_chat_and_text() {
    let (client, calls) = fake_api().await;
    client.send_text(RecipientId(42), "hello").await.unwrap();

    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "sendMessage");
    assert_eq!(calls[0].1, json!({ "chat_id": 42, "text": "hello" }));
  }

  #[tokio::test]
  async fn refused_edit_falls_back_to_new_message() {
    let (client, calls) = fake_api().await;
    let reply = Reply::text("Select a student:")
      .with_buttons(vec![Button { label: "S1".into(), token: "s:1".into() }])
      .replacing(Some(7));
    client.reply(RecipientId(42), &reply).await.unwrap();

    let calls = calls.lock().unwrap();
    let methods: Vec<_> = calls.iter().map(|(m, _)| m.as_str()).collect();
    assert_eq!(methods, ["editMessageText", "sendMessage"]);
    assert_eq!(calls[0].1["message_id"], 7);
    assert_eq!(
      calls[1].1["reply_markup"]["inline_keyboard"][0][0]["callback_data"],
      "s:1"
    );
  }

  #[tokio::test]
  async fn acknowledge_answers_callback() {
    let (client, calls) = fake_api().await;
    client.acknowledge("cbq-9").await.unwrap();
    assert_eq!(calls.lock().unwrap()[0], (
      "answerCallbackQuery".to_owned(),
      json!({ "callback_query_id": "cbq-9" })
    ));
  }

  #[tokio::test]
  async fn api_refusal_is_a_rejection() {
    let (client, _) = fake_api().await;
    let err = client.edit_message_text(1, 2, "x", None).await.unwrap_err();
    assert!(matches!(err, Error::Api { code: 400, .. }));
    assert!(matches!(DeliveryError::from(err), DeliveryError::Rejected(_)));
  }

  #[tokio::test]
  async fn missing_photo_is_an_attachment_error() {
    let (client, calls) = fake_api().await;
    let err = DeliverySink::send_photo(
      &client,
      RecipientId(1),
      Path::new("/nonexistent/event.jpg"),
      "caption",
    )
    .await
    .unwrap_err();
    assert!(matches!(err, DeliveryError::Attachment(_)));
    assert!(calls.lock().unwrap().is_empty());
  }
}
