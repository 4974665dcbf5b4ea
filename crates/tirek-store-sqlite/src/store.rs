//! [`SqliteStore`], the SQLite implementation of every `tirek-core` storage
//! trait.

use std::{collections::BTreeSet, path::Path};

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use tirek_core::{
  directory::{Organization, Student},
  event::{Event, EventType},
  store::{Directory, EventLog, SchemaCatalog, SubscriptionRegistry},
  subscription::{NewSubscription, RecipientId, SubscribeOutcome, Subscription},
};

use crate::{
  encode::{
    encode_dt, encode_event_type, encode_uuid, RawEvent, RawOrganization, RawStudent,
    RawSubscription,
  },
  schema::{SCHEMA, STUDENT_ROLE},
  Error, Result,
};

const INSERT_SUBSCRIPTION: &str =
  "INSERT INTO subscriptions (
     id, organization_id, telegram_chat_id, student_id, event_type, created_at
   ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
   ON CONFLICT (telegram_chat_id, student_id, event_type) DO NOTHING";

// ─── Store ───────────────────────────────────────────────────────────────────

/// The event log, directory and subscription registry in one SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Writers for the directory and the detection pipeline ─────────────────
  //
  // The notifier itself never calls these; they exist for the operator
  // helpers in `tirek-bot` and for tests.

  /// Insert an organization and return it.
  pub async fn add_organization(&self, name: &str) -> Result<Organization> {
    let org = Organization { id: Uuid::new_v4(), name: name.to_owned() };

    let id_str = encode_uuid(org.id);
    let name   = org.name.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO organizations (id, org_name) VALUES (?1, ?2)",
          rusqlite::params![id_str, name],
        )?;
        Ok(())
      })
      .await?;

    Ok(org)
  }

  /// Insert a user account with an arbitrary role. Returns the new id.
  pub async fn add_user_account(
    &self,
    organization_id: Uuid,
    name:            &str,
    role:            &str,
  ) -> Result<Uuid> {
    if self.get_organization(organization_id).await?.is_none() {
      return Err(Error::OrganizationNotFound(organization_id));
    }

    let id       = Uuid::new_v4();
    let id_str   = encode_uuid(id);
    let org_str  = encode_uuid(organization_id);
    let name     = name.to_owned();
    let role     = role.to_owned();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO user_accounts (id, user_name, user_role, organization_id)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, name, role, org_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(id)
  }

  /// Insert a student account and return it.
  pub async fn add_student(&self, organization_id: Uuid, name: &str) -> Result<Student> {
    let id = self.add_user_account(organization_id, name, STUDENT_ROLE).await?;
    Ok(Student { id, name: name.to_owned(), organization_id })
  }

  /// Append an event to the log, as the detection pipeline does.
  pub async fn record_event(&self, event: &Event) -> Result<()> {
    let id_str    = encode_uuid(event.id);
    let type_str  = encode_event_type(event.event_type);
    let student   = encode_uuid(event.student_id);
    let org       = encode_uuid(event.organization_id);
    let ts_str    = encode_dt(event.timestamp);
    let image_ref = event.image_reference.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO events (
             id, event_type, student_id, organization_id, timestamp, image_reference
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![id_str, type_str, student, org, ts_str, image_ref],
        )?;
        Ok(())
      })
      .await?;

    tracing::debug!(event_id = %event.id, event_type = %event.event_type, "event recorded");
    Ok(())
  }
}

// ─── EventLog impl ───────────────────────────────────────────────────────────

impl EventLog for SqliteStore {
  type Error = Error;

  async fn latest(&self) -> Result<Option<Event>> {
    let raw: Option<RawEvent> = self
      .conn
      .call(|conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {} FROM events ORDER BY timestamp DESC, rowid DESC LIMIT 1",
                RawEvent::COLUMNS
              ),
              [],
              RawEvent::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawEvent::into_event).transpose()
  }

  async fn get(&self, id: Uuid) -> Result<Option<Event>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawEvent> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {} FROM events WHERE id = ?1", RawEvent::COLUMNS),
              rusqlite::params![id_str],
              RawEvent::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawEvent::into_event).transpose()
  }

  async fn recent(&self, limit: usize) -> Result<Vec<Event>> {
    let limit_val = limit as i64;

    let raws: Vec<RawEvent> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM events ORDER BY timestamp DESC, rowid DESC LIMIT ?1",
          RawEvent::COLUMNS
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![limit_val], RawEvent::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEvent::into_event).collect()
  }
}

// ─── Directory impl ──────────────────────────────────────────────────────────

impl Directory for SqliteStore {
  type Error = Error;

  async fn list_organizations(&self) -> Result<Vec<Organization>> {
    let raws: Vec<RawOrganization> = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare("SELECT id, org_name FROM organizations ORDER BY org_name, id")?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawOrganization { id: row.get(0)?, name: row.get(1)? })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawOrganization::into_organization).collect()
  }

  async fn get_organization(&self, id: Uuid) -> Result<Option<Organization>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawOrganization> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT id, org_name FROM organizations WHERE id = ?1",
              rusqlite::params![id_str],
              |row| Ok(RawOrganization { id: row.get(0)?, name: row.get(1)? }),
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawOrganization::into_organization).transpose()
  }

  async fn list_students(&self, organization_id: Uuid) -> Result<Vec<Student>> {
    let org_str = encode_uuid(organization_id);

    let raws: Vec<RawStudent> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT id, user_name, organization_id FROM user_accounts
           WHERE organization_id = ?1 AND user_role = ?2
           ORDER BY user_name, id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![org_str, STUDENT_ROLE], RawStudent::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawStudent::into_student).collect()
  }

  async fn get_student(&self, id: Uuid) -> Result<Option<Student>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawStudent> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT id, user_name, organization_id FROM user_accounts
               WHERE id = ?1 AND user_role = ?2",
              rusqlite::params![id_str, STUDENT_ROLE],
              RawStudent::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawStudent::into_student).transpose()
  }
}

// ─── SubscriptionRegistry impl ───────────────────────────────────────────────

impl SubscriptionRegistry for SqliteStore {
  type Error = Error;

  async fn subscribe(&self, input: NewSubscription) -> Result<SubscribeOutcome> {
    let id_str      = encode_uuid(Uuid::new_v4());
    let org_str     = encode_uuid(input.organization_id);
    let recipient   = input.recipient_id.0;
    let student_str = encode_uuid(input.student_id);
    let type_str    = encode_event_type(input.event_type);
    let at_str      = encode_dt(Utc::now());

    let inserted: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          INSERT_SUBSCRIPTION,
          rusqlite::params![id_str, org_str, recipient, student_str, type_str, at_str],
        )?)
      })
      .await?;

    Ok(if inserted == 0 {
      SubscribeOutcome::AlreadyExists
    } else {
      SubscribeOutcome::Created
    })
  }

  async fn subscribe_many(
    &self,
    organization_id: Uuid,
    recipient_id:    RecipientId,
    student_id:      Uuid,
    event_types:     &[EventType],
  ) -> Result<usize> {
    let org_str     = encode_uuid(organization_id);
    let recipient   = recipient_id.0;
    let student_str = encode_uuid(student_id);
    let at_str      = encode_dt(Utc::now());
    let rows: Vec<(String, &'static str)> = event_types
      .iter()
      .map(|t| (encode_uuid(Uuid::new_v4()), encode_event_type(*t)))
      .collect();

    let created = self
      .conn
      .call(move |conn| {
        // Dropping `tx` without commit rolls every insert back.
        let tx = conn.transaction()?;
        let mut created = 0;
        {
          let mut stmt = tx.prepare(INSERT_SUBSCRIPTION)?;
          for (id_str, type_str) in &rows {
            created += stmt.execute(rusqlite::params![
              id_str,
              org_str,
              recipient,
              student_str,
              type_str,
              at_str,
            ])?;
          }
        }
        tx.commit()?;
        Ok(created)
      })
      .await?;

    Ok(created)
  }

  async fn find_subscribers(
    &self,
    student_id: Uuid,
    event_type: EventType,
  ) -> Result<BTreeSet<RecipientId>> {
    let student_str = encode_uuid(student_id);
    let type_str    = encode_event_type(event_type);

    let ids: Vec<i64> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT telegram_chat_id FROM subscriptions
           WHERE student_id = ?1 AND event_type = ?2",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![student_str, type_str], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(ids.into_iter().map(RecipientId).collect())
  }

  async fn recipients_for_event_type(
    &self,
    event_type: EventType,
  ) -> Result<BTreeSet<RecipientId>> {
    let type_str = encode_event_type(event_type);

    let ids: Vec<i64> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT DISTINCT telegram_chat_id FROM subscriptions WHERE event_type = ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![type_str], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(ids.into_iter().map(RecipientId).collect())
  }

  async fn list_for_recipient(&self, recipient_id: RecipientId) -> Result<Vec<Subscription>> {
    let recipient = recipient_id.0;

    let raws: Vec<RawSubscription> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT id, organization_id, telegram_chat_id, student_id, event_type, created_at
           FROM subscriptions
           WHERE telegram_chat_id = ?1
           ORDER BY student_id, event_type",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![recipient], RawSubscription::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSubscription::into_subscription).collect()
  }

  async fn unsubscribe_student(
    &self,
    recipient_id: RecipientId,
    student_id:   Uuid,
  ) -> Result<usize> {
    let recipient   = recipient_id.0;
    let student_str = encode_uuid(student_id);

    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM subscriptions WHERE telegram_chat_id = ?1 AND student_id = ?2",
          rusqlite::params![recipient, student_str],
        )?)
      })
      .await?;

    Ok(removed)
  }
}

// ─── SchemaCatalog impl ──────────────────────────────────────────────────────

impl SchemaCatalog for SqliteStore {
  type Error = Error;

  async fn list_tables(&self) -> Result<BTreeSet<String>> {
    let names: Vec<String> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT name FROM sqlite_master
           WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        )?;
        let rows = stmt
          .query_map([], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(names.into_iter().collect())
  }
}
