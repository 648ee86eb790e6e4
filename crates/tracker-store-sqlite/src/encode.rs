//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings (microsecond
//! precision, `Z` suffix) so that lexical order equals chronological order.
//! Calendar dates are `YYYY-MM-DD`. UUIDs are hyphenated lowercase strings.
//! Enumerations use their snake_case names.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use tracker_core::{
  account::{Account, Identity, RepProfile, Role, Subgroup},
  record::{Activity, Business, Comment, Incident, OwnerRef},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(e.to_string()))
}

/// Decode a snake_case enumeration column.
pub fn decode_enum<T: FromStr>(what: &'static str, s: &str) -> Result<T> {
  s.parse().map_err(|_| {
    Error::Core(tracker_core::Error::UnknownValue { what, value: s.to_owned() })
  })
}

pub fn decode_subgroup(s: Option<&str>) -> Result<Option<Subgroup>> {
  s.map(|s| decode_enum("subgroup", s)).transpose()
}

fn decode_owner(owner_id: &str, owner_subgroup: Option<&str>) -> Result<OwnerRef> {
  Ok(OwnerRef {
    owner_id:       decode_uuid(owner_id)?,
    owner_subgroup: decode_subgroup(owner_subgroup)?,
  })
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read from an `accounts` row, optionally joined with
/// `rep_profiles`.
pub struct RawAccount {
  pub account_id: String,
  pub username:   String,
  pub role:       String,
  pub subgroup:   Option<String>,
  pub active:     bool,
  pub created_at: String,
  pub first_name: Option<String>,
  pub last_name:  Option<String>,
  pub email:      Option<String>,
  pub phone:      Option<String>,
  pub zone:       Option<String>,
}

/// Column list matching [`RawAccount::from_row`].
pub const ACCOUNT_COLUMNS: &str = "
  a.account_id, a.username, a.role, a.subgroup, a.active, a.created_at,
  p.first_name, p.last_name, p.email, p.phone, p.zone";

impl RawAccount {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      account_id: row.get(0)?,
      username:   row.get(1)?,
      role:       row.get(2)?,
      subgroup:   row.get(3)?,
      active:     row.get(4)?,
      created_at: row.get(5)?,
      first_name: row.get(6)?,
      last_name:  row.get(7)?,
      email:      row.get(8)?,
      phone:      row.get(9)?,
      zone:       row.get(10)?,
    })
  }

  pub fn identity(&self) -> Result<Identity> {
    Ok(Identity {
      account_id: decode_uuid(&self.account_id)?,
      username:   self.username.clone(),
      role:       Role::from_stored(&self.role),
      subgroup:   decode_subgroup(self.subgroup.as_deref())?,
      active:     self.active,
    })
  }

  pub fn into_account(self) -> Result<Account> {
    let identity = self.identity()?;
    Ok(Account {
      identity,
      created_at: decode_dt(&self.created_at)?,
      profile:    RepProfile {
        first_name: self.first_name.unwrap_or_default(),
        last_name:  self.last_name,
        email:      self.email,
        phone:      self.phone,
        zone:       self.zone,
      },
    })
  }
}

pub struct RawBusiness {
  pub business_id:    String,
  pub owner_id:       String,
  pub owner_subgroup: Option<String>,
  pub name:           String,
  pub sector:         Option<String>,
  pub phone:          Option<String>,
  pub email:          Option<String>,
  pub address:        Option<String>,
  pub notes:          Option<String>,
  pub created_at:     String,
}

pub const BUSINESS_COLUMNS: &str = "
  b.business_id, b.owner_id, o.subgroup, b.name, b.sector, b.phone, b.email,
  b.address, b.notes, b.created_at";

impl RawBusiness {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      business_id:    row.get(0)?,
      owner_id:       row.get(1)?,
      owner_subgroup: row.get(2)?,
      name:           row.get(3)?,
      sector:         row.get(4)?,
      phone:          row.get(5)?,
      email:          row.get(6)?,
      address:        row.get(7)?,
      notes:          row.get(8)?,
      created_at:     row.get(9)?,
    })
  }

  pub fn into_business(self) -> Result<Business> {
    Ok(Business {
      business_id: decode_uuid(&self.business_id)?,
      owner:       decode_owner(&self.owner_id, self.owner_subgroup.as_deref())?,
      name:        self.name,
      sector:      self.sector,
      phone:       self.phone,
      email:       self.email,
      address:     self.address,
      notes:       self.notes,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawActivity {
  pub activity_id:    String,
  pub owner_id:       String,
  pub owner_subgroup: Option<String>,
  pub business_id:    Option<String>,
  pub kind:           String,
  pub title:          String,
  pub description:    Option<String>,
  pub outcome:        Option<String>,
  pub status:         String,
  pub occurred_on:    String,
  pub duration_min:   u32,
  pub created_at:     String,
  pub updated_at:     String,
}

pub const ACTIVITY_COLUMNS: &str = "
  a.activity_id, a.owner_id, o.subgroup, a.business_id, a.kind, a.title,
  a.description, a.outcome, a.status, a.occurred_on, a.duration_min,
  a.created_at, a.updated_at";

impl RawActivity {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      activity_id:    row.get(0)?,
      owner_id:       row.get(1)?,
      owner_subgroup: row.get(2)?,
      business_id:    row.get(3)?,
      kind:           row.get(4)?,
      title:          row.get(5)?,
      description:    row.get(6)?,
      outcome:        row.get(7)?,
      status:         row.get(8)?,
      occurred_on:    row.get(9)?,
      duration_min:   row.get(10)?,
      created_at:     row.get(11)?,
      updated_at:     row.get(12)?,
    })
  }

  pub fn into_activity(self) -> Result<Activity> {
    Ok(Activity {
      activity_id:  decode_uuid(&self.activity_id)?,
      owner:        decode_owner(&self.owner_id, self.owner_subgroup.as_deref())?,
      business_id:  self.business_id.as_deref().map(decode_uuid).transpose()?,
      kind:         decode_enum("activity kind", &self.kind)?,
      title:        self.title,
      description:  self.description,
      outcome:      self.outcome,
      status:       decode_enum("activity status", &self.status)?,
      occurred_on:  decode_date(&self.occurred_on)?,
      duration_min: self.duration_min,
      created_at:   decode_dt(&self.created_at)?,
      updated_at:   decode_dt(&self.updated_at)?,
    })
  }
}

pub struct RawIncident {
  pub incident_id:    String,
  pub owner_id:       String,
  pub owner_subgroup: Option<String>,
  pub business_id:    String,
  pub title:          String,
  pub description:    Option<String>,
  pub priority:       String,
  pub status:         String,
  pub category:       Option<String>,
  pub assignee:       Option<String>,
  pub due_on:         Option<String>,
  pub resolution:     Option<String>,
  pub created_at:     String,
  pub updated_at:     String,
}

pub const INCIDENT_COLUMNS: &str = "
  i.incident_id, i.owner_id, o.subgroup, i.business_id, i.title,
  i.description, i.priority, i.status, i.category, i.assignee, i.due_on,
  i.resolution, i.created_at, i.updated_at";

impl RawIncident {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      incident_id:    row.get(0)?,
      owner_id:       row.get(1)?,
      owner_subgroup: row.get(2)?,
      business_id:    row.get(3)?,
      title:          row.get(4)?,
      description:    row.get(5)?,
      priority:       row.get(6)?,
      status:         row.get(7)?,
      category:       row.get(8)?,
      assignee:       row.get(9)?,
      due_on:         row.get(10)?,
      resolution:     row.get(11)?,
      created_at:     row.get(12)?,
      updated_at:     row.get(13)?,
    })
  }

  pub fn into_incident(self) -> Result<Incident> {
    Ok(Incident {
      incident_id: decode_uuid(&self.incident_id)?,
      owner:       decode_owner(&self.owner_id, self.owner_subgroup.as_deref())?,
      business_id: decode_uuid(&self.business_id)?,
      title:       self.title,
      description: self.description,
      priority:    decode_enum("priority", &self.priority)?,
      status:      decode_enum("incident status", &self.status)?,
      category:    self.category,
      assignee:    self.assignee,
      due_on:      self.due_on.as_deref().map(decode_date).transpose()?,
      resolution:  self.resolution,
      created_at:  decode_dt(&self.created_at)?,
      updated_at:  decode_dt(&self.updated_at)?,
    })
  }
}

pub struct RawComment {
  pub comment_id:  String,
  pub incident_id: String,
  pub author:      String,
  pub body:        String,
  pub created_at:  String,
}

impl RawComment {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      comment_id:  row.get(0)?,
      incident_id: row.get(1)?,
      author:      row.get(2)?,
      body:        row.get(3)?,
      created_at:  row.get(4)?,
    })
  }

  pub fn into_comment(self) -> Result<Comment> {
    Ok(Comment {
      comment_id:  decode_uuid(&self.comment_id)?,
      incident_id: decode_uuid(&self.incident_id)?,
      author:      self.author,
      body:        self.body,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn timestamps_sort_lexically() {
    let early = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
    let late = early + chrono::Duration::milliseconds(1500);
    let (a, b) = (encode_dt(early), encode_dt(late));
    assert_eq!(a.len(), b.len());
    assert!(a < b);
    assert_eq!(decode_dt(&b).unwrap(), late);
  }

  #[test]
  fn unknown_enum_value_is_an_error() {
    let parsed: Result<tracker_core::record::Priority> = decode_enum("priority", "urgent");
    assert!(parsed.is_err());
  }
}
