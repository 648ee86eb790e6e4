//! The `TrackerStore` trait.
//!
//! Implemented by storage backends (e.g. `tracker-store-sqlite`). Higher
//! layers (`tracker-auth`, `tracker-api`) depend on this abstraction, not on
//! any concrete backend.
//!
//! The store never makes access decisions. List methods take a
//! [`Scoped`] query, whose visibility predicate the backend must apply in
//! conjunction with the filters; single-record methods return the record with
//! its [`OwnerRef`](crate::record::OwnerRef) so the caller can ask the policy
//! engine for a verdict.

use std::future::Future;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::{
  account::{
    Account, AccountPatch, AccountQuery, AccountSummary, AccountUpdate,
    Credentials, Identity, NewAccount, Removal,
  },
  policy::{Scoped, Visibility},
  record::{
    Activity, ActivityFilter, ActivityPatch, Business, BusinessFilter,
    BusinessPatch, BusinessUpdate, Comment, Incident, IncidentFilter,
    IncidentPatch, Lookup, NewActivity, NewBusiness, NewIncident, Stats,
  },
  session::{PasswordReset, Session},
};

/// Abstraction over a tracker storage backend.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`). Each method is a single atomic
/// storage operation.
pub trait TrackerStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Accounts ──────────────────────────────────────────────────────────

  /// Persist a new account and its profile. Returns `None` if the username is
  /// already taken.
  fn create_account(
    &self,
    input: NewAccount,
  ) -> impl Future<Output = Result<Option<Account>, Self::Error>> + Send + '_;

  fn get_account(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Account>, Self::Error>> + Send + '_;

  /// The live identity snapshot for `id`, without the profile.
  fn get_identity(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Identity>, Self::Error>> + Send + '_;

  /// Exact, case-sensitive username lookup including the credential hash.
  fn find_credentials<'a>(
    &'a self,
    username: &'a str,
  ) -> impl Future<Output = Result<Option<Credentials>, Self::Error>> + Send + 'a;

  /// Look up the account whose profile carries `email`.
  fn find_by_email<'a>(
    &'a self,
    email: &'a str,
  ) -> impl Future<Output = Result<Option<Identity>, Self::Error>> + Send + 'a;

  /// Accounts with their activity counts, ordered by username.
  fn list_accounts<'a>(
    &'a self,
    query: &'a AccountQuery,
  ) -> impl Future<Output = Result<Vec<AccountSummary>, Self::Error>> + Send + 'a;

  /// Apply `patch`; last write wins. Refuses atomically to demote or
  /// deactivate the last active administrador.
  fn update_account(
    &self,
    id: Uuid,
    patch: AccountPatch,
  ) -> impl Future<Output = Result<AccountUpdate, Self::Error>> + Send + '_;

  /// Delete an account, its profile, sessions and owned records. Refuses
  /// atomically to remove the last active administrador.
  fn delete_account(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Removal, Self::Error>> + Send + '_;

  fn count_active_admins(
    &self,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  // ── Sessions ──────────────────────────────────────────────────────────

  fn insert_session(
    &self,
    session: Session,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn get_session<'a>(
    &'a self,
    token_digest: &'a str,
  ) -> impl Future<Output = Result<Option<Session>, Self::Error>> + Send + 'a;

  /// Returns whether a row was removed. Removing nothing is not an error.
  fn delete_session<'a>(
    &'a self,
    token_digest: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  fn delete_sessions_for(
    &self,
    account_id: Uuid,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Delete every session with `expires_at <= now`; returns how many.
  fn purge_expired_sessions(
    &self,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  // ── Password resets ───────────────────────────────────────────────────

  fn insert_reset(
    &self,
    reset: PasswordReset,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Mark an unused, unexpired reset as used and return its account. Returns
  /// `None` for unknown, expired or already-used tokens.
  fn consume_reset<'a>(
    &'a self,
    token_digest: &'a str,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<Uuid>, Self::Error>> + Send + 'a;

  // ── Businesses ────────────────────────────────────────────────────────

  /// Returns `None` if another business already carries the name.
  fn create_business(
    &self,
    owner_id: Uuid,
    input: NewBusiness,
  ) -> impl Future<Output = Result<Option<Business>, Self::Error>> + Send + '_;

  fn get_business(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Business>, Self::Error>> + Send + '_;

  fn list_businesses<'a>(
    &'a self,
    query: &'a Scoped<BusinessFilter>,
  ) -> impl Future<Output = Result<Vec<Business>, Self::Error>> + Send + 'a;

  fn update_business(
    &self,
    id: Uuid,
    patch: BusinessPatch,
  ) -> impl Future<Output = Result<BusinessUpdate, Self::Error>> + Send + '_;

  /// Deleting a business removes its incidents and detaches its activities.
  fn delete_business(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Activities ────────────────────────────────────────────────────────

  fn create_activity(
    &self,
    owner_id: Uuid,
    input: NewActivity,
  ) -> impl Future<Output = Result<Activity, Self::Error>> + Send + '_;

  fn get_activity(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Activity>, Self::Error>> + Send + '_;

  fn list_activities<'a>(
    &'a self,
    query: &'a Scoped<ActivityFilter>,
  ) -> impl Future<Output = Result<Vec<Activity>, Self::Error>> + Send + 'a;

  fn update_activity(
    &self,
    id: Uuid,
    patch: ActivityPatch,
  ) -> impl Future<Output = Result<Option<Activity>, Self::Error>> + Send + '_;

  fn delete_activity(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Incidents ─────────────────────────────────────────────────────────

  fn create_incident(
    &self,
    owner_id: Uuid,
    input: NewIncident,
  ) -> impl Future<Output = Result<Incident, Self::Error>> + Send + '_;

  fn get_incident(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Incident>, Self::Error>> + Send + '_;

  /// Sorted by priority (most urgent first), then newest first.
  fn list_incidents<'a>(
    &'a self,
    query: &'a Scoped<IncidentFilter>,
  ) -> impl Future<Output = Result<Vec<Incident>, Self::Error>> + Send + 'a;

  fn update_incident(
    &self,
    id: Uuid,
    patch: IncidentPatch,
  ) -> impl Future<Output = Result<Option<Incident>, Self::Error>> + Send + '_;

  fn delete_incident(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Comments ──────────────────────────────────────────────────────────

  fn add_comment(
    &self,
    incident_id: Uuid,
    author: String,
    body: String,
  ) -> impl Future<Output = Result<Comment, Self::Error>> + Send + '_;

  fn get_comment(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Comment>, Self::Error>> + Send + '_;

  /// Oldest first.
  fn list_comments(
    &self,
    incident_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Comment>, Self::Error>> + Send + '_;

  fn delete_comment(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Dashboard ─────────────────────────────────────────────────────────

  /// Dashboard counts restricted to `visibility`. Incidents due before
  /// `today` that are still open count as overdue.
  fn stats(
    &self,
    visibility: Visibility,
    today: NaiveDate,
  ) -> impl Future<Output = Result<Stats, Self::Error>> + Send + '_;

  /// Distinct non-empty values of `lookup` among records `visibility` admits,
  /// sorted case-insensitively.
  fn lookup(
    &self,
    visibility: Visibility,
    lookup: Lookup,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;
}
