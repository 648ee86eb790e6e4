//! [`SqliteStore`]: the SQLite implementation of [`TrackerStore`].

use std::{collections::BTreeMap, path::Path, str::FromStr};

use chrono::{DateTime, Months, NaiveDate, Utc};
use rusqlite::{params, params_from_iter, types::Value, Connection, OptionalExtension as _};
use uuid::Uuid;

use tracker_core::{
  account::{
    Account, AccountPatch, AccountQuery, AccountSummary, AccountUpdate,
    Credentials, Identity, NewAccount, Removal, Role,
  },
  policy::{Scoped, Visibility},
  record::{
    Activity, ActivityFilter, ActivityPatch, ActivityStatus, Business,
    BusinessFilter, BusinessPatch, BusinessUpdate, Comment, Incident,
    IncidentFilter, IncidentPatch, Lookup, NewActivity, NewBusiness,
    NewIncident, RepActivity, Stats,
  },
  session::{PasswordReset, Session},
  store::TrackerStore,
};

use crate::{
  clause::{Assignments, Clause},
  encode::{
    decode_dt, decode_enum, decode_uuid, encode_date, encode_dt, encode_uuid,
    RawAccount,
    RawActivity, RawBusiness, RawComment, RawIncident, ACCOUNT_COLUMNS,
    ACTIVITY_COLUMNS, BUSINESS_COLUMNS, INCIDENT_COLUMNS,
  },
  schema::SCHEMA,
  Error, Result,
};

const ADMIN: &str = "administrador";

/// Most urgent first, then newest first.
const INCIDENT_ORDER: &str = "
  CASE i.priority
    WHEN 'critical' THEN 0
    WHEN 'high'     THEN 1
    WHEN 'medium'   THEN 2
    ELSE 3
  END,
  i.created_at DESC";

// ─── Store ───────────────────────────────────────────────────────────────────

/// A tracker store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store; useful for testing.
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

  #[cfg(test)]
  pub(crate) fn connection(&self) -> &tokio_rusqlite::Connection { &self.conn }
}

// ─── Row readers (run on the connection thread) ──────────────────────────────

fn read_account(conn: &Connection, id: &str) -> rusqlite::Result<Option<RawAccount>> {
  conn
    .query_row(
      &format!(
        "SELECT {ACCOUNT_COLUMNS}
         FROM accounts a
         LEFT JOIN rep_profiles p ON p.account_id = a.account_id
         WHERE a.account_id = ?1"
      ),
      [id],
      RawAccount::from_row,
    )
    .optional()
}

fn read_business(conn: &Connection, id: &str) -> rusqlite::Result<Option<RawBusiness>> {
  conn
    .query_row(
      &format!(
        "SELECT {BUSINESS_COLUMNS}
         FROM businesses b
         JOIN accounts o ON o.account_id = b.owner_id
         WHERE b.business_id = ?1"
      ),
      [id],
      RawBusiness::from_row,
    )
    .optional()
}

fn read_activity(conn: &Connection, id: &str) -> rusqlite::Result<Option<RawActivity>> {
  conn
    .query_row(
      &format!(
        "SELECT {ACTIVITY_COLUMNS}
         FROM activities a
         JOIN accounts o ON o.account_id = a.owner_id
         WHERE a.activity_id = ?1"
      ),
      [id],
      RawActivity::from_row,
    )
    .optional()
}

fn read_incident(conn: &Connection, id: &str) -> rusqlite::Result<Option<RawIncident>> {
  conn
    .query_row(
      &format!(
        "SELECT {INCIDENT_COLUMNS}
         FROM incidents i
         JOIN accounts o ON o.account_id = i.owner_id
         WHERE i.incident_id = ?1"
      ),
      [id],
      RawIncident::from_row,
    )
    .optional()
}

fn exists(conn: &Connection, table: &str, key_col: &str, id: &str) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row(
        &format!("SELECT 1 FROM {table} WHERE {key_col} = ?1"),
        [id],
        |_| Ok(()),
      )
      .optional()?
      .is_some(),
  )
}

fn count(conn: &Connection, from: &str, clause: Clause) -> rusqlite::Result<u64> {
  let sql = format!("SELECT COUNT(*) {from} {}", clause.where_sql());
  let n: i64 =
    conn.query_row(&sql, params_from_iter(clause.into_params()), |r| r.get(0))?;
  Ok(n.max(0) as u64)
}

/// `(key, count)` pairs of `key_sql` over the rows `clause` admits.
fn grouped(
  conn: &Connection,
  key_sql: &str,
  from: &str,
  clause: Clause,
) -> rusqlite::Result<Vec<(String, u64)>> {
  let sql = format!(
    "SELECT {key_sql}, COUNT(*) {from} {} GROUP BY 1",
    clause.where_sql()
  );
  let mut stmt = conn.prepare(&sql)?;
  let rows = stmt
    .query_map(params_from_iter(clause.into_params()), |r| {
      let n: i64 = r.get(1)?;
      Ok((r.get(0)?, n.max(0) as u64))
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

fn tally<T: FromStr + Ord>(
  what: &'static str,
  rows: Vec<(String, u64)>,
) -> Result<BTreeMap<T, u64>> {
  rows
    .into_iter()
    .map(|(key, n)| Ok((decode_enum(what, &key)?, n)))
    .collect()
}

/// Whether a business other than `except` is already called `name`.
fn name_taken(conn: &Connection, name: &str, except: &str) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row(
        "SELECT 1 FROM businesses
         WHERE name = ?1 COLLATE NOCASE AND business_id <> ?2",
        [name, except],
        |_| Ok(()),
      )
      .optional()?
      .is_some(),
  )
}

fn count_active_admins(conn: &Connection) -> rusqlite::Result<u64> {
  let n: i64 = conn.query_row(
    "SELECT COUNT(*) FROM accounts WHERE role = ?1 AND active = 1",
    [ADMIN],
    |r| r.get(0),
  )?;
  Ok(n.max(0) as u64)
}

fn decode_session(raw: (String, String, String, String)) -> Result<Session> {
  Ok(Session {
    token_digest: raw.0,
    account_id:   decode_uuid(&raw.1)?,
    created_at:   decode_dt(&raw.2)?,
    expires_at:   decode_dt(&raw.3)?,
  })
}

fn text<T: ToString>(value: Option<T>) -> Option<String> {
  value.map(|v| v.to_string())
}

// ─── TrackerStore impl ───────────────────────────────────────────────────────

impl TrackerStore for SqliteStore {
  type Error = Error;

  // ── Accounts ──────────────────────────────────────────────────────────────

  async fn create_account(&self, input: NewAccount) -> Result<Option<Account>> {
    let id_str       = encode_uuid(Uuid::new_v4());
    let at_str       = encode_dt(Utc::now());
    let role_str     = input.role.to_string();
    let subgroup_str = text(input.subgroup);

    let raw: Option<RawAccount> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if exists(&tx, "accounts", "username", &input.username)? {
          return Ok(None);
        }
        tx.execute(
          "INSERT INTO accounts (
             account_id, username, credential_hash, role, subgroup, active,
             created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          params![
            id_str,
            input.username,
            input.credential_hash,
            role_str,
            subgroup_str,
            input.active,
            at_str,
          ],
        )?;
        let profile = input.profile;
        tx.execute(
          "INSERT INTO rep_profiles (
             account_id, first_name, last_name, email, phone, zone
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          params![
            id_str,
            profile.first_name,
            profile.last_name,
            profile.email,
            profile.phone,
            profile.zone,
          ],
        )?;
        let raw = read_account(&tx, &id_str)?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.map(RawAccount::into_account).transpose()
  }

  async fn get_account(&self, id: Uuid) -> Result<Option<Account>> {
    let id_str = encode_uuid(id);
    let raw = self.conn.call(move |conn| Ok(read_account(conn, &id_str)?)).await?;
    raw.map(RawAccount::into_account).transpose()
  }

  async fn get_identity(&self, id: Uuid) -> Result<Option<Identity>> {
    let id_str = encode_uuid(id);
    let raw = self.conn.call(move |conn| Ok(read_account(conn, &id_str)?)).await?;
    raw.as_ref().map(RawAccount::identity).transpose()
  }

  async fn find_credentials(&self, username: &str) -> Result<Option<Credentials>> {
    let username = username.to_owned();

    let raw: Option<(RawAccount, String)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {ACCOUNT_COLUMNS}, a.credential_hash
                 FROM accounts a
                 LEFT JOIN rep_profiles p ON p.account_id = a.account_id
                 WHERE a.username = ?1"
              ),
              [username],
              |row| Ok((RawAccount::from_row(row)?, row.get(11)?)),
            )
            .optional()?,
        )
      })
      .await?;

    raw
      .map(|(raw, credential_hash)| {
        Ok(Credentials { identity: raw.identity()?, credential_hash })
      })
      .transpose()
  }

  async fn find_by_email(&self, email: &str) -> Result<Option<Identity>> {
    let email = email.trim().to_owned();

    let raw: Option<RawAccount> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {ACCOUNT_COLUMNS}
                 FROM accounts a
                 JOIN rep_profiles p ON p.account_id = a.account_id
                 WHERE p.email = ?1 COLLATE NOCASE
                 ORDER BY a.created_at
                 LIMIT 1"
              ),
              [email],
              RawAccount::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.as_ref().map(RawAccount::identity).transpose()
  }

  async fn list_accounts(&self, query: &AccountQuery) -> Result<Vec<AccountSummary>> {
    let mut clause = Clause::default();
    clause.contains(
      &["a.username", "p.first_name", "p.last_name", "p.email", "p.zone"],
      query.text.as_deref(),
    );
    clause.push_opt("a.role = ?", text(query.role));
    clause.push_opt("p.zone = ? COLLATE NOCASE", query.zone.clone());
    clause.push_opt("a.active = ?", query.active);

    let raws: Vec<(RawAccount, i64, i64)> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {ACCOUNT_COLUMNS},
             (SELECT COUNT(*) FROM activities x WHERE x.owner_id = a.account_id),
             (SELECT COUNT(*) FROM activities x
              WHERE x.owner_id = a.account_id AND x.status = 'pending')
           FROM accounts a
           LEFT JOIN rep_profiles p ON p.account_id = a.account_id
           {}
           ORDER BY a.username",
          clause.where_sql()
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(params_from_iter(clause.into_params()), |row| {
            Ok((RawAccount::from_row(row)?, row.get(11)?, row.get(12)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|(raw, activities, pending)| {
        Ok(AccountSummary {
          account:            raw.into_account()?,
          activities:         activities.max(0) as u64,
          pending_activities: pending.max(0) as u64,
        })
      })
      .collect()
  }

  async fn update_account(&self, id: Uuid, patch: AccountPatch) -> Result<AccountUpdate> {
    let id_str = encode_uuid(id);
    let demotes = patch.role.is_some_and(|role| role != Role::Administrador)
      || patch.active == Some(false);

    let mut account = Assignments::default();
    account.set("role", text(patch.role));
    account.set("subgroup", patch.subgroup.map(|s| Value::from(text(s))));
    account.set("active", patch.active);
    account.set("credential_hash", patch.credential_hash);

    let profile_patch = patch.profile;
    let mut profile = Assignments::default();
    profile.set("first_name", profile_patch.first_name);
    profile.set("last_name", profile_patch.last_name);
    profile.set("email", profile_patch.email);
    profile.set("phone", profile_patch.phone);
    profile.set("zone", profile_patch.zone);

    let outcome: Result<RawAccount, AccountUpdate> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let target: Option<(String, bool)> = tx
          .query_row(
            "SELECT role, active FROM accounts WHERE account_id = ?1",
            [&id_str],
            |r| Ok((r.get(0)?, r.get(1)?)),
          )
          .optional()?;
        let Some((role, active)) = target else {
          return Ok(Err(AccountUpdate::NotFound));
        };
        if demotes && role == ADMIN && active && count_active_admins(&tx)? <= 1 {
          return Ok(Err(AccountUpdate::LastAdmin));
        }
        account.execute(&tx, "accounts", "account_id", &id_str)?;
        tx.execute(
          "INSERT OR IGNORE INTO rep_profiles (account_id, first_name)
           VALUES (?1, '')",
          [&id_str],
        )?;
        profile.execute(&tx, "rep_profiles", "account_id", &id_str)?;
        let raw = read_account(&tx, &id_str)?;
        tx.commit()?;
        Ok(raw.ok_or(AccountUpdate::NotFound))
      })
      .await?;

    match outcome {
      Ok(raw) => Ok(AccountUpdate::Updated(raw.into_account()?)),
      Err(AccountUpdate::LastAdmin) => {
        tracing::warn!(account = %id, "refused to demote the last active administrador");
        Ok(AccountUpdate::LastAdmin)
      }
      Err(refused) => Ok(refused),
    }
  }

  async fn delete_account(&self, id: Uuid) -> Result<Removal> {
    let id_str = encode_uuid(id);

    let removal = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let target: Option<(String, bool)> = tx
          .query_row(
            "SELECT role, active FROM accounts WHERE account_id = ?1",
            [&id_str],
            |r| Ok((r.get(0)?, r.get(1)?)),
          )
          .optional()?;
        let Some((role, active)) = target else {
          return Ok(Removal::NotFound);
        };
        if role == ADMIN && active && count_active_admins(&tx)? <= 1 {
          return Ok(Removal::LastAdmin);
        }
        // Profile, sessions, resets and owned records cascade.
        tx.execute("DELETE FROM accounts WHERE account_id = ?1", [&id_str])?;
        tx.commit()?;
        Ok(Removal::Deleted)
      })
      .await?;

    if removal == Removal::LastAdmin {
      tracing::warn!(account = %id, "refused to delete the last active administrador");
    }
    Ok(removal)
  }

  async fn count_active_admins(&self) -> Result<u64> {
    Ok(self.conn.call(|conn| Ok(count_active_admins(conn)?)).await?)
  }

  // ── Sessions ──────────────────────────────────────────────────────────────

  async fn insert_session(&self, session: Session) -> Result<()> {
    let account_str = encode_uuid(session.account_id);
    let created_str = encode_dt(session.created_at);
    let expires_str = encode_dt(session.expires_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO sessions (token_digest, account_id, created_at, expires_at)
           VALUES (?1, ?2, ?3, ?4)",
          params![session.token_digest, account_str, created_str, expires_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn get_session(&self, token_digest: &str) -> Result<Option<Session>> {
    let digest = token_digest.to_owned();

    let raw: Option<(String, String, String, String)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT token_digest, account_id, created_at, expires_at
               FROM sessions WHERE token_digest = ?1",
              [digest],
              |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(decode_session).transpose()
  }

  async fn delete_session(&self, token_digest: &str) -> Result<bool> {
    let digest = token_digest.to_owned();
    let n = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM sessions WHERE token_digest = ?1", [digest])?)
      })
      .await?;
    Ok(n > 0)
  }

  async fn delete_sessions_for(&self, account_id: Uuid) -> Result<u64> {
    let id_str = encode_uuid(account_id);
    let n = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM sessions WHERE account_id = ?1", [id_str])?)
      })
      .await?;
    Ok(n as u64)
  }

  async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64> {
    let now_str = encode_dt(now);
    let n = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", [now_str])?)
      })
      .await?;
    Ok(n as u64)
  }

  // ── Password resets ───────────────────────────────────────────────────────

  async fn insert_reset(&self, reset: PasswordReset) -> Result<()> {
    let account_str = encode_uuid(reset.account_id);
    let created_str = encode_dt(reset.created_at);
    let expires_str = encode_dt(reset.expires_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO password_resets (token_digest, account_id, created_at, expires_at)
           VALUES (?1, ?2, ?3, ?4)",
          params![reset.token_digest, account_str, created_str, expires_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn consume_reset(&self, token_digest: &str, now: DateTime<Utc>) -> Result<Option<Uuid>> {
    let digest  = token_digest.to_owned();
    let now_str = encode_dt(now);

    let account: Option<String> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let account: Option<String> = tx
          .query_row(
            "SELECT account_id FROM password_resets
             WHERE token_digest = ?1 AND used = 0 AND expires_at > ?2",
            params![digest, now_str],
            |r| r.get(0),
          )
          .optional()?;
        if account.is_some() {
          tx.execute(
            "UPDATE password_resets SET used = 1 WHERE token_digest = ?1",
            [&digest],
          )?;
        }
        tx.commit()?;
        Ok(account)
      })
      .await?;

    account.as_deref().map(decode_uuid).transpose()
  }

  // ── Businesses ────────────────────────────────────────────────────────────

  async fn create_business(&self, owner_id: Uuid, input: NewBusiness) -> Result<Option<Business>> {
    let id        = Uuid::new_v4();
    let id_str    = encode_uuid(id);
    let owner_str = encode_uuid(owner_id);
    let at_str    = encode_dt(Utc::now());

    let raw: Option<Option<RawBusiness>> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if name_taken(&tx, &input.name, &id_str)? {
          return Ok(None);
        }
        tx.execute(
          "INSERT INTO businesses (
             business_id, owner_id, name, sector, phone, email, address, notes,
             created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          params![
            id_str,
            owner_str,
            input.name,
            input.sector,
            input.phone,
            input.email,
            input.address,
            input.notes,
            at_str,
          ],
        )?;
        let raw = read_business(&tx, &id_str)?;
        tx.commit()?;
        Ok(Some(raw))
      })
      .await?;

    let Some(raw) = raw else {
      return Ok(None);
    };
    raw
      .ok_or(Error::Vanished { what: "business", id })?
      .into_business()
      .map(Some)
  }

  async fn get_business(&self, id: Uuid) -> Result<Option<Business>> {
    let id_str = encode_uuid(id);
    let raw = self.conn.call(move |conn| Ok(read_business(conn, &id_str)?)).await?;
    raw.map(RawBusiness::into_business).transpose()
  }

  async fn list_businesses(&self, query: &Scoped<BusinessFilter>) -> Result<Vec<Business>> {
    let filters = query.filters();
    let mut clause = Clause::visible(query.visibility(), "b.owner_id");
    clause.contains(
      &["b.name", "b.sector", "b.email", "b.phone"],
      filters.text.as_deref(),
    );
    clause.push_opt("b.sector = ? COLLATE NOCASE", filters.sector.clone());
    clause.push_opt("b.owner_id = ?", filters.owner_id.map(encode_uuid));
    clause.push_opt("o.subgroup = ?", text(filters.owner_subgroup));

    let raws: Vec<RawBusiness> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {BUSINESS_COLUMNS}
           FROM businesses b
           JOIN accounts o ON o.account_id = b.owner_id
           {}
           ORDER BY b.name COLLATE NOCASE, b.created_at",
          clause.where_sql()
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(params_from_iter(clause.into_params()), RawBusiness::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawBusiness::into_business).collect()
  }

  async fn update_business(&self, id: Uuid, patch: BusinessPatch) -> Result<BusinessUpdate> {
    let id_str = encode_uuid(id);
    let new_name = patch.name.clone();

    let mut set = Assignments::default();
    set.set("name", patch.name);
    set.set("sector", patch.sector);
    set.set("phone", patch.phone);
    set.set("email", patch.email);
    set.set("address", patch.address);
    set.set("notes", patch.notes);

    let outcome: Result<RawBusiness, BusinessUpdate> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if !exists(&tx, "businesses", "business_id", &id_str)? {
          return Ok(Err(BusinessUpdate::NotFound));
        }
        if let Some(name) = &new_name {
          if name_taken(&tx, name, &id_str)? {
            return Ok(Err(BusinessUpdate::NameTaken));
          }
        }
        set.execute(&tx, "businesses", "business_id", &id_str)?;
        let raw = read_business(&tx, &id_str)?;
        tx.commit()?;
        Ok(raw.ok_or(BusinessUpdate::NotFound))
      })
      .await?;

    match outcome {
      Ok(raw) => Ok(BusinessUpdate::Updated(raw.into_business()?)),
      Err(refused) => Ok(refused),
    }
  }

  async fn delete_business(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);
    let n = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM businesses WHERE business_id = ?1", [id_str])?)
      })
      .await?;
    Ok(n > 0)
  }

  // ── Activities ────────────────────────────────────────────────────────────

  async fn create_activity(&self, owner_id: Uuid, input: NewActivity) -> Result<Activity> {
    let id           = Uuid::new_v4();
    let id_str       = encode_uuid(id);
    let owner_str    = encode_uuid(owner_id);
    let business_str = input.business_id.map(encode_uuid);
    let kind_str     = input.kind.as_ref().to_owned();
    let status_str   = input.status.as_ref().to_owned();
    let date_str     = encode_date(input.occurred_on);
    let at_str       = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO activities (
             activity_id, owner_id, business_id, kind, title, description,
             outcome, status, occurred_on, duration_min, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
          params![
            id_str,
            owner_str,
            business_str,
            kind_str,
            input.title,
            input.description,
            input.outcome,
            status_str,
            date_str,
            input.duration_min,
            at_str,
          ],
        )?;
        Ok(read_activity(conn, &id_str)?)
      })
      .await?;

    raw
      .ok_or(Error::Vanished { what: "activity", id })?
      .into_activity()
  }

  async fn get_activity(&self, id: Uuid) -> Result<Option<Activity>> {
    let id_str = encode_uuid(id);
    let raw = self.conn.call(move |conn| Ok(read_activity(conn, &id_str)?)).await?;
    raw.map(RawActivity::into_activity).transpose()
  }

  async fn list_activities(&self, query: &Scoped<ActivityFilter>) -> Result<Vec<Activity>> {
    let filters = query.filters();
    let mut clause = Clause::visible(query.visibility(), "a.owner_id");
    clause.contains(
      &["a.title", "a.description", "b.name"],
      filters.text.as_deref(),
    );
    clause.push_opt("a.owner_id = ?", filters.owner_id.map(encode_uuid));
    clause.push_opt("o.subgroup = ?", text(filters.owner_subgroup));
    clause.push_opt("a.business_id = ?", filters.business_id.map(encode_uuid));
    clause.push_opt("a.kind = ?", filters.kind.map(|k| k.as_ref().to_owned()));
    clause.push_opt("a.status = ?", filters.status.map(|s| s.as_ref().to_owned()));
    clause.push_opt("a.occurred_on >= ?", filters.from.map(encode_date));
    clause.push_opt("a.occurred_on <= ?", filters.until.map(encode_date));

    let raws: Vec<RawActivity> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {ACTIVITY_COLUMNS}
           FROM activities a
           JOIN accounts o ON o.account_id = a.owner_id
           LEFT JOIN businesses b ON b.business_id = a.business_id
           {}
           ORDER BY a.occurred_on DESC, a.created_at DESC",
          clause.where_sql()
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(params_from_iter(clause.into_params()), RawActivity::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawActivity::into_activity).collect()
  }

  async fn update_activity(&self, id: Uuid, patch: ActivityPatch) -> Result<Option<Activity>> {
    let id_str = encode_uuid(id);

    let mut set = Assignments::default();
    set.set("business_id", patch.business_id.map(encode_uuid));
    set.set("kind", patch.kind.map(|k| k.as_ref().to_owned()));
    set.set("title", patch.title);
    set.set("description", patch.description);
    set.set("outcome", patch.outcome);
    set.set("status", patch.status.map(|s| s.as_ref().to_owned()));
    set.set("occurred_on", patch.occurred_on.map(encode_date));
    set.set("duration_min", patch.duration_min);
    if !set.is_empty() {
      set.set("updated_at", Some(encode_dt(Utc::now())));
    }

    let raw = self
      .conn
      .call(move |conn| {
        set.execute(conn, "activities", "activity_id", &id_str)?;
        Ok(read_activity(conn, &id_str)?)
      })
      .await?;

    raw.map(RawActivity::into_activity).transpose()
  }

  async fn delete_activity(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);
    let n = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM activities WHERE activity_id = ?1", [id_str])?)
      })
      .await?;
    Ok(n > 0)
  }

  // ── Incidents ─────────────────────────────────────────────────────────────

  async fn create_incident(&self, owner_id: Uuid, input: NewIncident) -> Result<Incident> {
    let id           = Uuid::new_v4();
    let id_str       = encode_uuid(id);
    let owner_str    = encode_uuid(owner_id);
    let business_str = encode_uuid(input.business_id);
    let priority_str = input.priority.as_ref().to_owned();
    let status_str   = input.status.as_ref().to_owned();
    let due_str      = input.due_on.map(encode_date);
    let at_str       = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO incidents (
             incident_id, owner_id, business_id, title, description, priority,
             status, category, assignee, due_on, resolution, created_at,
             updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
          params![
            id_str,
            owner_str,
            business_str,
            input.title,
            input.description,
            priority_str,
            status_str,
            input.category,
            input.assignee,
            due_str,
            input.resolution,
            at_str,
          ],
        )?;
        Ok(read_incident(conn, &id_str)?)
      })
      .await?;

    raw
      .ok_or(Error::Vanished { what: "incident", id })?
      .into_incident()
  }

  async fn get_incident(&self, id: Uuid) -> Result<Option<Incident>> {
    let id_str = encode_uuid(id);
    let raw = self.conn.call(move |conn| Ok(read_incident(conn, &id_str)?)).await?;
    raw.map(RawIncident::into_incident).transpose()
  }

  async fn list_incidents(&self, query: &Scoped<IncidentFilter>) -> Result<Vec<Incident>> {
    let filters = query.filters();
    let mut clause = Clause::visible(query.visibility(), "i.owner_id");
    clause.contains(
      &["i.title", "i.description", "i.category", "b.name"],
      filters.text.as_deref(),
    );
    clause.push_opt("i.owner_id = ?", filters.owner_id.map(encode_uuid));
    clause.push_opt("o.subgroup = ?", text(filters.owner_subgroup));
    clause.push_opt("i.business_id = ?", filters.business_id.map(encode_uuid));
    clause.push_opt("i.status = ?", filters.status.map(|s| s.as_ref().to_owned()));
    clause.push_opt("i.priority = ?", filters.priority.map(|p| p.as_ref().to_owned()));
    clause.push_opt("i.category = ? COLLATE NOCASE", filters.category.clone());

    let raws: Vec<RawIncident> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {INCIDENT_COLUMNS}
           FROM incidents i
           JOIN accounts o ON o.account_id = i.owner_id
           JOIN businesses b ON b.business_id = i.business_id
           {}
           ORDER BY {INCIDENT_ORDER}",
          clause.where_sql()
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(params_from_iter(clause.into_params()), RawIncident::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawIncident::into_incident).collect()
  }

  async fn update_incident(&self, id: Uuid, patch: IncidentPatch) -> Result<Option<Incident>> {
    let id_str = encode_uuid(id);

    let mut set = Assignments::default();
    set.set("title", patch.title);
    set.set("description", patch.description);
    set.set("priority", patch.priority.map(|p| p.as_ref().to_owned()));
    set.set("status", patch.status.map(|s| s.as_ref().to_owned()));
    set.set("category", patch.category);
    set.set("assignee", patch.assignee);
    set.set("due_on", patch.due_on.map(encode_date));
    set.set("resolution", patch.resolution);
    if !set.is_empty() {
      set.set("updated_at", Some(encode_dt(Utc::now())));
    }

    let raw = self
      .conn
      .call(move |conn| {
        set.execute(conn, "incidents", "incident_id", &id_str)?;
        Ok(read_incident(conn, &id_str)?)
      })
      .await?;

    raw.map(RawIncident::into_incident).transpose()
  }

  async fn delete_incident(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);
    let n = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM incidents WHERE incident_id = ?1", [id_str])?)
      })
      .await?;
    Ok(n > 0)
  }

  // ── Comments ──────────────────────────────────────────────────────────────

  async fn add_comment(&self, incident_id: Uuid, author: String, body: String) -> Result<Comment> {
    let comment = Comment {
      comment_id: Uuid::new_v4(),
      incident_id,
      author,
      body,
      created_at: Utc::now(),
    };

    let id_str       = encode_uuid(comment.comment_id);
    let incident_str = encode_uuid(incident_id);
    let at_str       = encode_dt(comment.created_at);
    let author       = comment.author.clone();
    let body         = comment.body.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO comments (comment_id, incident_id, author, body, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          params![id_str, incident_str, author, body, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(comment)
  }

  async fn get_comment(&self, id: Uuid) -> Result<Option<Comment>> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT comment_id, incident_id, author, body, created_at
               FROM comments WHERE comment_id = ?1",
              [id_str],
              RawComment::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawComment::into_comment).transpose()
  }

  async fn list_comments(&self, incident_id: Uuid) -> Result<Vec<Comment>> {
    let incident_str = encode_uuid(incident_id);
    let raws: Vec<RawComment> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT comment_id, incident_id, author, body, created_at
           FROM comments WHERE incident_id = ?1
           ORDER BY created_at, rowid",
        )?;
        let rows = stmt
          .query_map([incident_str], RawComment::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawComment::into_comment).collect()
  }

  async fn delete_comment(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);
    let n = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM comments WHERE comment_id = ?1", [id_str])?)
      })
      .await?;
    Ok(n > 0)
  }

  // ── Dashboard ─────────────────────────────────────────────────────────────

  async fn stats(&self, visibility: Visibility, today: NaiveDate) -> Result<Stats> {
    const OPEN: &str = "i.status IN ('open', 'in_progress')";

    let businesses = Clause::visible(visibility, "b.owner_id");

    let mut reps = Clause::visible(visibility, "o.account_id");
    reps.push("o.role = ?", Role::Comercial.to_string());
    let per_rep = reps.clone();
    reps.require("o.active = 1");

    let activities = Clause::visible(visibility, "a.owner_id");
    let mut pending = activities.clone();
    pending.push("a.status = ?", ActivityStatus::Pending.as_ref().to_owned());

    let incidents = Clause::visible(visibility, "i.owner_id");
    let mut open = incidents.clone();
    open.require(OPEN);
    let mut overdue = open.clone();
    overdue.push("i.due_on < ?", encode_date(today));

    let since = today.checked_sub_months(Months::new(6)).unwrap_or(today);
    let mut recent = incidents.clone();
    recent.push("i.created_at >= ?", encode_date(since));

    let (mut stats, breakdowns) = self
      .conn
      .call(move |conn| {
        const BUSINESSES: &str =
          "FROM businesses b JOIN accounts o ON o.account_id = b.owner_id";
        const ACTIVITIES: &str =
          "FROM activities a JOIN accounts o ON o.account_id = a.owner_id";
        const INCIDENTS: &str =
          "FROM incidents i JOIN accounts o ON o.account_id = i.owner_id";

        let counts = Stats {
          businesses: count(conn, BUSINESSES, businesses)?,
          active_reps: count(conn, "FROM accounts o", reps)?,
          activities: count(conn, ACTIVITIES, activities.clone())?,
          pending_activities: count(conn, ACTIVITIES, pending)?,
          open_incidents: count(conn, INCIDENTS, open.clone())?,
          overdue_incidents: count(conn, INCIDENTS, overdue)?,
          ..Stats::default()
        };

        let per_rep_sql = format!(
          "SELECT o.account_id, o.username, COUNT(a.activity_id)
           FROM accounts o
           LEFT JOIN activities a ON a.owner_id = o.account_id
           {}
           GROUP BY o.account_id
           ORDER BY 3 DESC, o.username",
          per_rep.where_sql()
        );
        let mut stmt = conn.prepare(&per_rep_sql)?;
        let per_rep = stmt
          .query_map(params_from_iter(per_rep.into_params()), |r| {
            let n: i64 = r.get(2)?;
            Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?, n.max(0) as u64))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let breakdowns = RawBreakdowns {
          open_by_priority:    grouped(conn, "i.priority", INCIDENTS, open)?,
          incidents_by_status: grouped(conn, "i.status", INCIDENTS, incidents)?,
          incidents_by_month:  grouped(conn, "substr(i.created_at, 1, 7)", INCIDENTS, recent)?,
          activities_by_kind:  grouped(conn, "a.kind", ACTIVITIES, activities)?,
          per_rep,
        };
        Ok((counts, breakdowns))
      })
      .await?;

    stats.open_by_priority = tally("priority", breakdowns.open_by_priority)?;
    stats.incidents_by_status = tally("incident status", breakdowns.incidents_by_status)?;
    stats.incidents_by_month = breakdowns.incidents_by_month.into_iter().collect();
    stats.activities_by_kind = tally("activity kind", breakdowns.activities_by_kind)?;
    stats.activities_per_rep = breakdowns
      .per_rep
      .into_iter()
      .map(|(id, username, activities)| {
        Ok(RepActivity { account_id: decode_uuid(&id)?, username, activities })
      })
      .collect::<Result<_>>()?;

    Ok(stats)
  }

  async fn lookup(&self, visibility: Visibility, lookup: Lookup) -> Result<Vec<String>> {
    let (column, from, owner_col) = match lookup {
      Lookup::Sectors => (
        "b.sector",
        "FROM businesses b JOIN accounts o ON o.account_id = b.owner_id",
        "b.owner_id",
      ),
      Lookup::Zones => (
        "p.zone",
        "FROM accounts o JOIN rep_profiles p ON p.account_id = o.account_id",
        "o.account_id",
      ),
      Lookup::IncidentCategories => (
        "i.category",
        "FROM incidents i JOIN accounts o ON o.account_id = i.owner_id",
        "i.owner_id",
      ),
    };
    let mut clause = Clause::visible(visibility, owner_col);
    clause.require(&format!("TRIM(COALESCE({column}, '')) <> ''"));

    let values = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT DISTINCT {column} {from} {}
           ORDER BY {column} COLLATE NOCASE",
          clause.where_sql()
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(params_from_iter(clause.into_params()), |r| r.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(values)
  }
}

/// Grouped dashboard counts, decoded once off the connection thread.
struct RawBreakdowns {
  open_by_priority:    Vec<(String, u64)>,
  incidents_by_status: Vec<(String, u64)>,
  incidents_by_month:  Vec<(String, u64)>,
  activities_by_kind:  Vec<(String, u64)>,
  per_rep:             Vec<(String, String, u64)>,
}
