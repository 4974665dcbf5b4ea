//! tirek-bot binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the SQLite
//! store shared with the detection pipeline, and runs the notifier until
//! ctrl-c.
//!
//! # Operator helpers
//!
//! ```
//! tirek-bot add-organization "School No. 7"
//! tirek-bot add-student --organization <uuid> "Aruzhan"
//! tirek-bot record-event --student <uuid> --event-type WEAPON
//! tirek-bot list-directory
//! ```

mod config;

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tirek_core::{
  event::{Event, EventType},
  store::Directory,
};
use tirek_notify::service::Service;
use tirek_store_sqlite::SqliteStore;
use tirek_telegram::{TelegramClient, updates, webhook};
use tokio::{
  net::TcpListener,
  sync::{mpsc, watch},
  task::JoinSet,
};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::config::{BotConfig, TransportMode};

/// Interactions buffered between the update source and the handler.
const INTERACTION_BUFFER: usize = 64;

#[derive(Parser)]
#[command(author, version, about = "Tirek safety-event notifier")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Run the notifier (the default).
  Run,
  /// Add an organization and print its id.
  AddOrganization { name: String },
  /// Add a student to an organization and print its id.
  AddStudent {
    #[arg(long)]
    organization: Uuid,
    name:         String,
  },
  /// Append an event to the log the way the detection pipeline does.
  RecordEvent {
    #[arg(long)]
    student:    Uuid,
    #[arg(long)]
    event_type: EventType,
    /// Image file name under `image_dir`.
    #[arg(long)]
    image:      Option<String>,
  },
  /// Print every organization and its students.
  ListDirectory,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = ::config::Config::builder()
    .add_source(::config::File::from(cli.config).required(false))
    .add_source(::config::Environment::with_prefix("TIREK"))
    .build()
    .context("failed to read config file")?;

  let bot_cfg: BotConfig = settings
    .try_deserialize()
    .context("failed to deserialise BotConfig")?;

  let store_path = expand_tilde(&bot_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  match cli.command.unwrap_or(Command::Run) {
    Command::Run => run(bot_cfg, store).await,
    Command::AddOrganization { name } => {
      let org = store.add_organization(&name).await?;
      println!("{}", org.id);
      Ok(())
    }
    Command::AddStudent { organization, name } => {
      let student = store
        .add_student(organization, &name)
        .await
        .with_context(|| format!("failed to add student to {organization}"))?;
      println!("{}", student.id);
      Ok(())
    }
    Command::RecordEvent { student, event_type, image } => {
      record_event(&store, student, event_type, image).await
    }
    Command::ListDirectory => list_directory(&store).await,
  }
}

async fn run(cfg: BotConfig, store: SqliteStore) -> anyhow::Result<()> {
  anyhow::ensure!(!cfg.telegram_token.is_empty(), "telegram_token is not set");

  let client = TelegramClient::new(&cfg.telegram_api_url, &cfg.telegram_token)
    .context("failed to build Telegram client")?;

  let (shutdown_tx, shutdown_rx) = watch::channel(false);
  let (tx, rx) = mpsc::channel(INTERACTION_BUFFER);
  let mut tasks = JoinSet::new();

  match cfg.transport {
    TransportMode::Polling => {
      tracing::info!("receiving updates by long polling");
      tasks.spawn(updates::poll_updates(client.clone(), tx, shutdown_rx.clone()));
    }
    TransportMode::Webhook => {
      let base = cfg
        .webhook_url
        .as_deref()
        .context("webhook_url is required for the webhook transport")?;
      client
        .set_webhook(&format!("{}/bot/{}", base.trim_end_matches('/'), cfg.telegram_token))
        .await
        .context("failed to register webhook")?;

      let address = format!("{}:{}", cfg.webhook_host, cfg.webhook_port);
      let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
      tracing::info!("Listening for webhooks on http://{address}");

      let app = webhook::router(&cfg.telegram_token, tx);
      let mut shutdown = shutdown_rx.clone();
      tasks.spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
          let _ = shutdown.changed().await;
        });
        if let Err(e) = server.await {
          tracing::error!(error = %e, "webhook server failed");
        }
      });
    }
  }

  let service_cfg = cfg.service_config(expand_tilde(&cfg.image_dir));
  let service = Service::new(Arc::new(store), Arc::new(client), service_cfg);
  tasks.spawn(service.run(rx, shutdown_rx));

  tokio::select! {
    signal = tokio::signal::ctrl_c() => {
      signal.context("failed to listen for ctrl-c")?;
      tracing::info!("shutting down");
    }
    _ = tasks.join_next() => tracing::warn!("a service task exited early; shutting down"),
  }

  let _ = shutdown_tx.send(true);
  while tasks.join_next().await.is_some() {}
  Ok(())
}

async fn record_event(
  store: &SqliteStore,
  student_id: Uuid,
  event_type: EventType,
  image_reference: Option<String>,
) -> anyhow::Result<()> {
  let student = store
    .get_student(student_id)
    .await?
    .with_context(|| format!("no student with id {student_id}"))?;

  let event = Event {
    id: Uuid::new_v4(),
    event_type,
    student_id,
    organization_id: student.organization_id,
    timestamp: chrono::Utc::now(),
    image_reference,
  };
  store.record_event(&event).await?;
  println!("{}", event.id);
  Ok(())
}

async fn list_directory(store: &SqliteStore) -> anyhow::Result<()> {
  for org in store.list_organizations().await? {
    println!("{}  {}", org.id, org.name);
    for student in store.list_students(org.id).await? {
      println!("  {}  {}", student.id, student.name);
    }
  }
  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
