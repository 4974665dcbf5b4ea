//! Runtime configuration, deserialised from `config.toml` and `TIREK_*`
//! environment variables.

use std::{path::PathBuf, time::Duration};

use serde::Deserialize;
use tirek_notify::{dispatch::DispatchConfig, service::ServiceConfig};
use tirek_telegram::DEFAULT_API_URL;

/// Where interactions come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
  /// `getUpdates` long polling.
  #[default]
  Polling,
  /// Telegram pushes updates to our HTTP endpoint.
  Webhook,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
  /// Required by `run`; the operator subcommands only need the store.
  #[serde(default)]
  pub telegram_token:        String,
  #[serde(default = "default_api_url")]
  pub telegram_api_url:      String,
  pub store_path:            PathBuf,
  #[serde(default = "default_image_dir")]
  pub image_dir:             PathBuf,
  #[serde(default = "default_poll_interval")]
  pub poll_interval_secs:    u64,
  #[serde(default = "default_drift_interval")]
  pub drift_interval_secs:   u64,
  #[serde(default = "default_delivery_timeout")]
  pub delivery_timeout_secs: u64,
  #[serde(default)]
  pub transport:             TransportMode,
  #[serde(default = "default_webhook_host")]
  pub webhook_host:          String,
  #[serde(default = "default_webhook_port")]
  pub webhook_port:          u16,
  /// Public base URL Telegram should call, e.g. `https://bot.example.org`.
  #[serde(default)]
  pub webhook_url:           Option<String>,
}

fn default_api_url() -> String { DEFAULT_API_URL.to_owned() }
fn default_image_dir() -> PathBuf { PathBuf::from("events") }
fn default_poll_interval() -> u64 { 10 }
fn default_drift_interval() -> u64 { 3600 }
fn default_delivery_timeout() -> u64 { 15 }
fn default_webhook_host() -> String { "0.0.0.0".to_owned() }
fn default_webhook_port() -> u16 { 5000 }

impl BotConfig {
  pub fn service_config(&self, image_dir: PathBuf) -> ServiceConfig {
    ServiceConfig {
      poll_interval:  Duration::from_secs(self.poll_interval_secs.max(1)),
      drift_interval: Duration::from_secs(self.drift_interval_secs.max(1)),
      dispatch:       DispatchConfig {
        image_dir,
        delivery_timeout: Duration::from_secs(self.delivery_timeout_secs.max(1)),
      },
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn parse(toml: &str) -> BotConfig {
    ::config::Config::builder()
      .add_source(::config::File::from_str(toml, ::config::FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap()
  }

  #[test]
  fn defaults_fill_everything_but_the_store() {
    let cfg = parse(r#"store_path = "~/tirek.db""#);
    assert_eq!(cfg.telegram_api_url, "https://api.telegram.org");
    assert_eq!(cfg.image_dir, PathBuf::from("events"));
    assert_eq!(cfg.transport, TransportMode::Polling);
    assert_eq!(cfg.webhook_port, 5000);
    assert!(cfg.webhook_url.is_none());

    let service = cfg.service_config(cfg.image_dir.clone());
    assert_eq!(service.poll_interval, Duration::from_secs(10));
    assert_eq!(service.drift_interval, Duration::from_secs(3600));
    assert_eq!(service.dispatch.delivery_timeout, Duration::from_secs(15));
  }

  #[test]
  fn webhook_transport_is_parsed() {
    let cfg = parse(
      r#"
        store_path   = "tirek.db"
        telegram_token = "123:abc"
        transport    = "webhook"
        webhook_url  = "https://bot.example.org"
        webhook_port = 8443
        poll_interval_secs = 0
      "#,
    );
    assert_eq!(cfg.transport, TransportMode::Webhook);
    assert_eq!(cfg.webhook_port, 8443);
    assert_eq!(cfg.webhook_url.as_deref(), Some("https://bot.example.org"));
    assert_eq!(
      cfg.service_config(cfg.image_dir.clone()).poll_interval,
      Duration::from_secs(1)
    );
  }

  #[test]
  fn store_path_is_required() {
    let result = ::config::Config::builder()
      .add_source(::config::File::from_str("", ::config::FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize::<BotConfig>();
    assert!(result.is_err());
  }
}
