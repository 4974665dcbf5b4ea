//! Webhook update source.
//!
//! Telegram POSTs each update to `/bot/{token}`; the token in the path is
//! the only thing that authenticates the caller and is compared in constant
//! time.

use std::sync::Arc;

use axum::{
  Json, Router,
  body::Body,
  extract::{Path, State},
  http::{Request, StatusCode},
  routing::{get, post},
};
use subtle::ConstantTimeEq as _;
use tirek_core::interaction::Interaction;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;

use crate::types::Update;

#[derive(Clone)]
struct WebhookState {
  token: Arc<str>,
  tx:    mpsc::Sender<Interaction>,
}

/// Build the webhook router. Interactions are forwarded to `tx`.
pub fn router(token: &str, tx: mpsc::Sender<Interaction>) -> Router {
  let state = WebhookState { token: token.into(), tx };
  Router::new()
    .route("/bot/{token}", post(receive))
    .route("/healthz", get(healthz))
    .layer(
      // The request path carries the bot token, so spans omit the URI.
      TraceLayer::new_for_http()
        .make_span_with(|req: &Request<Body>| {
          tracing::info_span!("webhook", method = %req.method())
        }),
    )
    .with_state(state)
}

async fn receive(
  State(state): State<WebhookState>,
  Path(token): Path<String>,
  Json(update): Json<Update>,
) -> StatusCode {
  if !bool::from(token.as_bytes().ct_eq(state.token.as_bytes())) {
    return StatusCode::NOT_FOUND;
  }
  let update_id = update.update_id;
  let Some(interaction) = update.into_interaction() else {
    tracing::trace!(update_id, "update ignored");
    return StatusCode::OK;
  };
  match state.tx.send(interaction).await {
    Ok(()) => StatusCode::OK,
    Err(_) => StatusCode::SERVICE_UNAVAILABLE,
  }
}

async fn healthz() -> &'static str { "ok" }

#[cfg(test)]
mod tests {
  use tirek_core::{interaction::Payload, subscription::RecipientId};
  use tower::ServiceExt as _;

  use super::*;

  fn post_update(path: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
      .method("POST")
      .uri(path)
      .header("content-type", "application/json")
      .body(Body::from(body.to_string()))
      .unwrap()
  }

  fn start_command() -> serde_json::Value {
    serde_json::json!({
      "update_id": 1,
      "message": {
        "message_id": 3,
        "chat": { "id": 42 },
        "from": { "id": 42, "first_name": "Dana" },
        "text": "/start"
      }
    })
  }

  #[tokio::test]
  async fn update_is_forwarded() {
    let (tx, mut rx) = mpsc::channel(1);
    let resp = router("secret", tx)
      .oneshot(post_update("/bot/secret", start_command()))
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let interaction = rx.recv().await.unwrap();
    assert_eq!(interaction.recipient, RecipientId(42));
    assert_eq!(interaction.payload, Payload::Command("start".into()));
  }

  #[tokio::test]
  async fn wrong_token_is_not_found() {
    let (tx, mut rx) = mpsc::channel(1);
    let resp = router("secret", tx)
      .oneshot(post_update("/bot/guess", start_command()))
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(rx.try_recv().is_err());
  }

  #[tokio::test]
  async fn near_miss_tokens_are_not_found() {
    for path in ["/bot/secre", "/bot/secrets", "/bot/Secret"] {
      let (tx, mut rx) = mpsc::channel(1);
      let resp = router("secret", tx)
        .oneshot(post_update(path, start_command()))
        .await
        .unwrap();
      assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{path}");
      assert!(rx.try_recv().is_err());
    }
  }

  #[tokio::test]
  async fn closed_channel_is_unavailable() {
    let (tx, rx) = mpsc::channel(1);
    drop(rx);
    let resp = router("secret", tx)
      .oneshot(post_update("/bot/secret", start_command()))
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
  }

  #[tokio::test]
  async fn healthz_answers() {
    let (tx, _rx) = mpsc::channel(1);
    let req = Request::builder().uri("/healthz").body(Body::empty()).unwrap();
    let resp = router("secret", tx).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
  }
}
