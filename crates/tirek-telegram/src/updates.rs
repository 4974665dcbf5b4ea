//! Long-polling update source.

use std::time::Duration;

use tirek_core::interaction::Interaction;
use tokio::sync::{mpsc, watch};

use crate::client::TelegramClient;

const LONG_POLL: Duration = Duration::from_secs(30);
const RETRY_AFTER: Duration = Duration::from_secs(5);

/// Feed `tx` from `getUpdates` until shutdown or until the receiver is gone.
///
/// Any registered webhook is removed first, since Telegram refuses
/// `getUpdates` while one is set.
pub async fn poll_updates(
  client: TelegramClient,
  tx: mpsc::Sender<Interaction>,
  mut shutdown: watch::Receiver<bool>,
) {
  if let Err(e) = client.delete_webhook().await {
    tracing::warn!(error = %e, "cannot remove webhook before polling");
  }

  let mut offset = 0;
  loop {
    let batch = tokio::select! {
      batch = client.get_updates(offset, LONG_POLL) => batch,
      _ = shutdown.changed() => break,
    };

    let updates = match batch {
      Ok(updates) => updates,
      Err(e) => {
        tracing::warn!(error = %e, "getUpdates failed");
        tokio::select! {
          _ = tokio::time::sleep(RETRY_AFTER) => continue,
          _ = shutdown.changed() => break,
        }
      }
    };

    for update in updates {
      offset = offset.max(update.update_id + 1);
      let update_id = update.update_id;
      let Some(interaction) = update.into_interaction() else {
        tracing::trace!(update_id, "update ignored");
        continue;
      };
      if tx.send(interaction).await.is_err() {
        tracing::debug!("interaction receiver closed");
        return;
      }
    }
  }
  tracing::debug!("update polling stopped");
}
