//! Owned records: businesses, activities, incidents and incident comments.
//!
//! Every record except a comment names exactly one owning account, set at
//! creation and never reassigned. A comment inherits its incident's owner.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::account::Subgroup;

// ─── Ownership ───────────────────────────────────────────────────────────────

/// The ownership edge of a record as seen by the policy engine: the owning
/// account and that account's *current* subgroup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRef {
  pub owner_id:       Uuid,
  pub owner_subgroup: Option<Subgroup>,
}

// ─── Enumerations ────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
  strum::AsRefStr, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActivityKind {
  Visit,
  Call,
  Email,
  Meeting,
  Demo,
  Proposal,
  Closing,
  Other,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
  strum::AsRefStr, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActivityStatus {
  #[default]
  Pending,
  Completed,
  Cancelled,
}

/// Ordered from least to most urgent.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize,
  Deserialize, strum::AsRefStr, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Priority {
  Low,
  #[default]
  Medium,
  High,
  Critical,
}

/// Open and in-progress incidents count as open work.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize,
  Deserialize, strum::AsRefStr, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IncidentStatus {
  #[default]
  Open,
  InProgress,
  Resolved,
  Closed,
}

// ─── Business ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Business {
  pub business_id: Uuid,
  #[serde(flatten)]
  pub owner:       OwnerRef,
  pub name:        String,
  pub sector:      Option<String>,
  pub phone:       Option<String>,
  pub email:       Option<String>,
  pub address:     Option<String>,
  pub notes:       Option<String>,
  pub created_at:  DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewBusiness {
  pub name:    String,
  pub sector:  Option<String>,
  pub phone:   Option<String>,
  pub email:   Option<String>,
  pub address: Option<String>,
  pub notes:   Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BusinessPatch {
  pub name:    Option<String>,
  pub sector:  Option<String>,
  pub phone:   Option<String>,
  pub email:   Option<String>,
  pub address: Option<String>,
  pub notes:   Option<String>,
}

impl BusinessPatch {
  pub fn is_empty(&self) -> bool {
    self.name.is_none()
      && self.sector.is_none()
      && self.phone.is_none()
      && self.email.is_none()
      && self.address.is_none()
      && self.notes.is_none()
  }
}

/// Outcome of a business rename or edit.
#[derive(Debug, Clone)]
pub enum BusinessUpdate {
  Updated(Business),
  NotFound,
  /// Another business already carries the requested name.
  NameTaken,
}

#[derive(Debug, Clone, Default)]
pub struct BusinessFilter {
  /// Free-text match over name, sector, email and phone.
  pub text:           Option<String>,
  pub sector:         Option<String>,
  pub owner_id:       Option<Uuid>,
  pub owner_subgroup: Option<Subgroup>,
}

// ─── Activity ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
  pub activity_id:  Uuid,
  #[serde(flatten)]
  pub owner:        OwnerRef,
  pub business_id:  Option<Uuid>,
  pub kind:         ActivityKind,
  pub title:        String,
  pub description:  Option<String>,
  pub outcome:      Option<String>,
  pub status:       ActivityStatus,
  pub occurred_on:  NaiveDate,
  pub duration_min: u32,
  pub created_at:   DateTime<Utc>,
  pub updated_at:   DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewActivity {
  pub business_id:  Option<Uuid>,
  pub kind:         ActivityKind,
  pub title:        String,
  pub description:  Option<String>,
  pub outcome:      Option<String>,
  #[serde(default)]
  pub status:       ActivityStatus,
  pub occurred_on:  NaiveDate,
  #[serde(default)]
  pub duration_min: u32,
}

/// Owner is deliberately absent: ownership is stable after creation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivityPatch {
  pub business_id:  Option<Uuid>,
  pub kind:         Option<ActivityKind>,
  pub title:        Option<String>,
  pub description:  Option<String>,
  pub outcome:      Option<String>,
  pub status:       Option<ActivityStatus>,
  pub occurred_on:  Option<NaiveDate>,
  pub duration_min: Option<u32>,
}

impl ActivityPatch {
  pub fn is_empty(&self) -> bool {
    self.business_id.is_none()
      && self.kind.is_none()
      && self.title.is_none()
      && self.description.is_none()
      && self.outcome.is_none()
      && self.status.is_none()
      && self.occurred_on.is_none()
      && self.duration_min.is_none()
  }
}

#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
  /// Free-text match over title, description and business name.
  pub text:           Option<String>,
  pub owner_id:       Option<Uuid>,
  pub owner_subgroup: Option<Subgroup>,
  pub business_id:    Option<Uuid>,
  pub kind:           Option<ActivityKind>,
  pub status:         Option<ActivityStatus>,
  pub from:           Option<NaiveDate>,
  pub until:          Option<NaiveDate>,
}

// ─── Incident ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
  pub incident_id: Uuid,
  #[serde(flatten)]
  pub owner:       OwnerRef,
  pub business_id: Uuid,
  pub title:       String,
  pub description: Option<String>,
  pub priority:    Priority,
  pub status:      IncidentStatus,
  pub category:    Option<String>,
  /// Free-text name of whoever is handling it.
  pub assignee:    Option<String>,
  pub due_on:      Option<NaiveDate>,
  pub resolution:  Option<String>,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewIncident {
  pub business_id: Uuid,
  pub title:       String,
  pub description: Option<String>,
  #[serde(default)]
  pub priority:    Priority,
  #[serde(default)]
  pub status:      IncidentStatus,
  pub category:    Option<String>,
  pub assignee:    Option<String>,
  pub due_on:      Option<NaiveDate>,
  pub resolution:  Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IncidentPatch {
  pub title:       Option<String>,
  pub description: Option<String>,
  pub priority:    Option<Priority>,
  pub status:      Option<IncidentStatus>,
  pub category:    Option<String>,
  pub assignee:    Option<String>,
  pub due_on:      Option<NaiveDate>,
  pub resolution:  Option<String>,
}

impl IncidentPatch {
  pub fn is_empty(&self) -> bool {
    self.title.is_none()
      && self.description.is_none()
      && self.priority.is_none()
      && self.status.is_none()
      && self.category.is_none()
      && self.assignee.is_none()
      && self.due_on.is_none()
      && self.resolution.is_none()
  }
}

#[derive(Debug, Clone, Default)]
pub struct IncidentFilter {
  /// Free-text match over title, description, category and business name.
  pub text:           Option<String>,
  pub owner_id:       Option<Uuid>,
  pub owner_subgroup: Option<Subgroup>,
  pub business_id:    Option<Uuid>,
  pub status:         Option<IncidentStatus>,
  pub priority:       Option<Priority>,
  pub category:       Option<String>,
}

// ─── Comment ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
  pub comment_id:  Uuid,
  pub incident_id: Uuid,
  pub author:      String,
  pub body:        String,
  pub created_at:  DateTime<Utc>,
}

// ─── Dashboard ───────────────────────────────────────────────────────────────

/// Counts shown on the dashboard, each computed under the caller's visibility.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
  pub businesses:          u64,
  pub active_reps:         u64,
  pub activities:          u64,
  pub pending_activities:  u64,
  pub open_incidents:      u64,
  pub overdue_incidents:   u64,
  pub open_by_priority:    BTreeMap<Priority, u64>,
  pub incidents_by_status: BTreeMap<IncidentStatus, u64>,
  /// Incidents opened per `YYYY-MM` over the last six months.
  pub incidents_by_month:  BTreeMap<String, u64>,
  pub activities_by_kind:  BTreeMap<ActivityKind, u64>,
  /// Every visible comercial, busiest first.
  pub activities_per_rep:  Vec<RepActivity>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepActivity {
  pub account_id: Uuid,
  pub username:   String,
  pub activities: u64,
}

/// Distinct free-text values offered as filter suggestions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
  Sectors,
  Zones,
  IncidentCategories,
}
