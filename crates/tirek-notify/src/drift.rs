//! Schema-drift notification.
//!
//! Compares the current set of storage tables against the previous snapshot
//! and, when tables were added, alerts everyone subscribed to
//! `STUDENT_ENTRANCE` (the stand-in administrator list).

use std::{collections::BTreeSet, sync::Arc};

use tirek_core::{
  delivery::DeliverySink,
  event::EventType,
  store::{SchemaCatalog, SubscriptionRegistry},
};

use crate::{Error, Result};

/// The table names seen by the last check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSnapshot {
  tables: BTreeSet<String>,
}

impl TableSnapshot {
  pub fn tables(&self) -> &BTreeSet<String> { &self.tables }

  /// Names in `current` that the snapshot lacks. Nothing counts as added
  /// while the snapshot is empty.
  pub fn diff(&self, current: &BTreeSet<String>) -> Vec<String> {
    if self.tables.is_empty() {
      return Vec::new();
    }
    current.difference(&self.tables).cloned().collect()
  }

  pub fn replace(&mut self, current: BTreeSet<String>) { self.tables = current; }
}

/// Result of one [`DriftChecker::check`].
#[derive(Debug, Default)]
pub struct DriftReport {
  pub added:     Vec<String>,
  pub notified:  usize,
  pub failed:    usize,
}

pub struct DriftChecker<C, D> {
  catalog:  Arc<C>,
  sink:     Arc<D>,
  snapshot: TableSnapshot,
}

impl<C, D> DriftChecker<C, D>
where
  C: SchemaCatalog + SubscriptionRegistry,
  D: DeliverySink,
{
  pub fn new(catalog: Arc<C>, sink: Arc<D>) -> Self {
    Self { catalog, sink, snapshot: TableSnapshot::default() }
  }

  pub fn snapshot(&self) -> &TableSnapshot { &self.snapshot }

  /// Record the current tables without notifying anyone.
  pub async fn prime(&mut self) -> Result<()> {
    let tables = self.catalog.list_tables().await.map_err(Error::catalog)?;
    tracing::info!(tables = ?tables, "table snapshot primed");
    self.snapshot.replace(tables);
    Ok(())
  }

  /// Report tables added since the last check. The snapshot only moves
  /// forward once the recipients are known, so a failed lookup is retried
  /// on the next check.
  pub async fn check(&mut self) -> Result<DriftReport> {
    let tables = self.catalog.list_tables().await.map_err(Error::catalog)?;
    let added = self.snapshot.diff(&tables);
    if added.is_empty() {
      self.snapshot.replace(tables);
      return Ok(DriftReport::default());
    }

    tracing::info!(added = ?added, "new tables detected");
    let admins = self
      .catalog
      .recipients_for_event_type(EventType::StudentEntrance)
      .await
      .map_err(Error::registry_read)?;
    self.snapshot.replace(tables);

    let text = format!(
      "⚠️ Attention! New tables detected in the database: {}",
      added.join(", ")
    );
    let mut report = DriftReport { added, ..DriftReport::default() };
    for recipient in admins {
      match self.sink.send_text(recipient, &text).await {
        Ok(()) => report.notified += 1,
        Err(error) => {
          tracing::warn!(%recipient, %error, "schema drift notice failed");
          report.failed += 1;
        }
      }
    }
    Ok(report)
  }
}
