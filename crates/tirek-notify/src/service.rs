//! Long-running loops that drive the engine.
//!
//! Each loop owns its component, ticks on its own schedule, and stops when
//! the shutdown flag flips. Failures inside an iteration are logged and the
//! loop carries on.

use std::{sync::Arc, time::Duration};

use tirek_core::{
  delivery::{DeliverySink, ReplySink},
  interaction::Interaction,
  store::{Directory, EventLog, SchemaCatalog, SubscriptionRegistry},
};
use tokio::{
  sync::{mpsc, watch},
  task::JoinSet,
  time::MissedTickBehavior,
};

use crate::{
  conversation::Conversation,
  dispatch::{DispatchConfig, Dispatcher},
  drift::DriftChecker,
  poller::ChangePoller,
};

#[derive(Debug, Clone)]
pub struct ServiceConfig {
  pub poll_interval:  Duration,
  pub drift_interval: Duration,
  pub dispatch:       DispatchConfig,
}

impl Default for ServiceConfig {
  fn default() -> Self {
    Self {
      poll_interval:  Duration::from_secs(10),
      drift_interval: Duration::from_secs(3600),
      dispatch:       DispatchConfig::default(),
    }
  }
}

/// Every engine component wired to one store and one transport.
pub struct Service<S, T> {
  store:     Arc<S>,
  transport: Arc<T>,
  config:    ServiceConfig,
}

impl<S, T> Service<S, T>
where
  S: EventLog + Directory + SubscriptionRegistry + SchemaCatalog + 'static,
  T: DeliverySink + ReplySink + 'static,
{
  pub fn new(store: Arc<S>, transport: Arc<T>, config: ServiceConfig) -> Self {
    Self { store, transport, config }
  }

  /// Prime the cursor and snapshot, then run the poll, drift and
  /// interaction loops until `shutdown` turns true.
  pub async fn run(
    self,
    interactions: mpsc::Receiver<Interaction>,
    shutdown:     watch::Receiver<bool>,
  ) {
    let mut poller = ChangePoller::new(self.store.clone());
    if let Err(e) = poller.prime().await {
      tracing::error!(error = %e, "cannot prime poll cursor; first poll will prime it");
    }

    let mut drift = DriftChecker::new(self.store.clone(), self.transport.clone());
    if let Err(e) = drift.prime().await {
      tracing::error!(error = %e, "cannot prime table snapshot");
    }

    let dispatcher = Dispatcher::new(
      self.store.clone(),
      self.transport.clone(),
      self.config.dispatch.clone(),
    );
    let conversation = Conversation::new(self.store.clone());

    let mut tasks = JoinSet::new();
    tasks.spawn(run_poller(
      poller,
      dispatcher,
      self.config.poll_interval,
      shutdown.clone(),
    ));
    tasks.spawn(run_drift_checker(
      drift,
      self.config.drift_interval,
      shutdown.clone(),
    ));
    tasks.spawn(run_interactions(
      conversation,
      self.transport.clone(),
      interactions,
      shutdown,
    ));

    while let Some(joined) = tasks.join_next().await {
      if let Err(e) = joined {
        tracing::error!(error = %e, "service task aborted");
      }
    }
    tracing::info!("service stopped");
  }
}

fn ticker(every: Duration) -> tokio::time::Interval {
  let mut interval = tokio::time::interval(every);
  interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
  interval
}

/// Poll the event log every `every` and dispatch whatever is new.
pub async fn run_poller<L, R, D>(
  mut poller: ChangePoller<L>,
  dispatcher: Dispatcher<R, D>,
  every:      Duration,
  mut shutdown: watch::Receiver<bool>,
) where
  L: EventLog,
  R: SubscriptionRegistry + Directory,
  D: DeliverySink,
{
  let mut interval = ticker(every);
  loop {
    tokio::select! {
      _ = interval.tick() => {}
      _ = shutdown.changed() => break,
    }

    let event = match poller.poll().await {
      Ok(Some(event)) => event,
      Ok(None) => continue,
      Err(e) => {
        tracing::warn!(error = %e, "poll skipped");
        continue;
      }
    };

    match dispatcher.dispatch(&event).await {
      Ok(report) => tracing::info!(
        event_id = %report.event_id,
        delivered = report.delivered,
        failed = report.failed(),
        no_subscribers = report.no_subscribers,
        "event dispatched"
      ),
      Err(e) => tracing::error!(event_id = %event.id, error = %e, "dispatch failed"),
    }
  }
  tracing::debug!("poller stopped");
}

/// Compare the table list against the last snapshot every `every`.
pub async fn run_drift_checker<C, D>(
  mut checker:  DriftChecker<C, D>,
  every:        Duration,
  mut shutdown: watch::Receiver<bool>,
) where
  C: SchemaCatalog + SubscriptionRegistry,
  D: DeliverySink,
{
  let mut interval = ticker(every);
  // The first tick fires immediately and the snapshot is already primed.
  interval.tick().await;
  loop {
    tokio::select! {
      _ = interval.tick() => {}
      _ = shutdown.changed() => break,
    }

    match checker.check().await {
      Ok(report) if !report.added.is_empty() => tracing::info!(
        added = ?report.added,
        notified = report.notified,
        failed = report.failed,
        "schema drift reported"
      ),
      Ok(_) => {}
      Err(e) => tracing::warn!(error = %e, "schema drift check skipped"),
    }
  }
  tracing::debug!("drift checker stopped");
}

/// Answer interactions until the channel closes or shutdown is signalled.
pub async fn run_interactions<S, T>(
  conversation: Conversation<S>,
  transport:    Arc<T>,
  mut rx:       mpsc::Receiver<Interaction>,
  mut shutdown: watch::Receiver<bool>,
) where
  S: SubscriptionRegistry + Directory + EventLog,
  T: ReplySink,
{
  loop {
    let interaction = tokio::select! {
      next = rx.recv() => match next {
        Some(interaction) => interaction,
        None => break,
      },
      _ = shutdown.changed() => break,
    };

    if let Some(callback_id) = &interaction.callback_id
      && let Err(e) = transport.acknowledge(callback_id).await
    {
      tracing::warn!(error = %e, "callback acknowledgement failed");
    }

    let reply = conversation.handle(&interaction).await;
    if let Err(e) = transport.reply(interaction.recipient, &reply).await {
      tracing::warn!(recipient = %interaction.recipient, error = %e, "reply failed");
    }
  }
  tracing::debug!("interaction handler stopped");
}
