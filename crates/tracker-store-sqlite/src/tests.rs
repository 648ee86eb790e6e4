//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{Duration, NaiveDate, Utc};
use tracker_core::{
  account::{
    AccountPatch, AccountQuery, AccountUpdate, Identity, NewAccount,
    ProfilePatch, RepProfile, Removal, Role, Subgroup,
  },
  policy::{scope, visibility, Visibility},
  record::{
    ActivityFilter, ActivityKind, ActivityPatch, ActivityStatus,
    BusinessFilter, BusinessPatch, BusinessUpdate, IncidentFilter,
    IncidentPatch, IncidentStatus, Lookup, NewActivity, NewBusiness,
    NewIncident, Priority,
  },
  session::{PasswordReset, Session},
  store::TrackerStore,
};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

async fn account(
  s: &SqliteStore,
  username: &str,
  role: Role,
  subgroup: Option<Subgroup>,
) -> Identity {
  s.create_account(NewAccount {
    username:        username.into(),
    credential_hash: "$argon2id$placeholder".into(),
    role,
    subgroup,
    active:          true,
    profile:         RepProfile {
      first_name: username.into(),
      email: Some(format!("{username}@tracker.test")),
      zone: Some("Norte".into()),
      ..Default::default()
    },
  })
  .await
  .unwrap()
  .expect("username free")
  .identity
}

fn business(name: &str) -> NewBusiness {
  NewBusiness {
    name:    name.into(),
    sector:  Some("hosteleria".into()),
    phone:   None,
    email:   None,
    address: None,
    notes:   None,
  }
}

fn activity(title: &str, business_id: Option<Uuid>, on: NaiveDate) -> NewActivity {
  NewActivity {
    business_id,
    kind: ActivityKind::Visit,
    title: title.into(),
    description: None,
    outcome: None,
    status: ActivityStatus::Pending,
    occurred_on: on,
    duration_min: 30,
  }
}

fn incident(title: &str, business_id: Uuid, priority: Priority) -> NewIncident {
  NewIncident {
    business_id,
    title: title.into(),
    description: None,
    priority,
    status: IncidentStatus::Open,
    category: None,
    assignee: None,
    due_on: None,
    resolution: None,
  }
}

fn day(d: u32) -> NaiveDate { NaiveDate::from_ymd_opt(2026, 3, d).unwrap() }

struct Seed {
  admin:  Identity,
  jefe:   Identity,
  jefe_a: Identity,
  carlos: Identity,
  maria:  Identity,
  ana:    Identity,
}

async fn seed(s: &SqliteStore) -> Seed {
  Seed {
    admin:  account(s, "admin", Role::Administrador, None).await,
    jefe:   account(s, "jefe", Role::Jefe, None).await,
    jefe_a: account(s, "jefe_a", Role::JefeGrupo, Some(Subgroup::A)).await,
    carlos: account(s, "carlos", Role::Comercial, Some(Subgroup::A)).await,
    maria:  account(s, "maria", Role::Comercial, Some(Subgroup::A)).await,
    ana:    account(s, "ana", Role::Comercial, Some(Subgroup::B)).await,
  }
}

// ─── Accounts ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn duplicate_username_is_refused() {
  let s = store().await;
  account(&s, "carlos", Role::Comercial, Some(Subgroup::A)).await;

  let again = s
    .create_account(NewAccount {
      username:        "carlos".into(),
      credential_hash: "x".into(),
      role:            Role::Comercial,
      subgroup:        Some(Subgroup::B),
      active:          true,
      profile:         RepProfile::default(),
    })
    .await
    .unwrap();
  assert!(again.is_none());
}

#[tokio::test]
async fn credentials_lookup_is_case_sensitive() {
  let s = store().await;
  account(&s, "carlos", Role::Comercial, Some(Subgroup::A)).await;

  let found = s.find_credentials("carlos").await.unwrap().unwrap();
  assert_eq!(found.identity.role, Role::Comercial);
  assert_eq!(found.credential_hash, "$argon2id$placeholder");
  assert!(s.find_credentials("Carlos").await.unwrap().is_none());
}

#[tokio::test]
async fn find_by_email_ignores_case() {
  let s = store().await;
  let carlos = account(&s, "carlos", Role::Comercial, Some(Subgroup::A)).await;
  let found = s.find_by_email("CARLOS@tracker.test").await.unwrap().unwrap();
  assert_eq!(found.account_id, carlos.account_id);
  assert!(s.find_by_email("nobody@tracker.test").await.unwrap().is_none());
}

#[tokio::test]
async fn unknown_stored_role_decodes_as_unrecognized() {
  let s = store().await;
  let carlos = account(&s, "carlos", Role::Comercial, Some(Subgroup::A)).await;
  let id = carlos.account_id.to_string();
  s.connection()
    .call(move |conn| {
      conn.execute("UPDATE accounts SET role = 'superuser' WHERE account_id = ?1", [id])?;
      Ok(())
    })
    .await
    .unwrap();

  let identity = s.get_identity(carlos.account_id).await.unwrap().unwrap();
  assert_eq!(identity.role, Role::Unrecognized);
  assert_eq!(visibility(&identity), Visibility::Nothing);
}

#[tokio::test]
async fn list_accounts_filters() {
  let s = store().await;
  let seed = seed(&s).await;

  let comerciales = s
    .list_accounts(&AccountQuery { role: Some(Role::Comercial), ..Default::default() })
    .await
    .unwrap();
  let names: Vec<_> =
    comerciales.iter().map(|a| a.account.identity.username.as_str()).collect();
  assert_eq!(names, ["ana", "carlos", "maria"]);

  let by_text = s
    .list_accounts(&AccountQuery { text: Some("MAR".into()), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(by_text.len(), 1);
  assert_eq!(by_text[0].account.identity.account_id, seed.maria.account_id);
}

#[tokio::test]
async fn account_listing_counts_activities() {
  let s = store().await;
  let seed = seed(&s).await;
  s.create_activity(seed.carlos.account_id, activity("Visita", None, day(1)))
    .await
    .unwrap();
  let mut done = activity("Llamada", None, day(2));
  done.status = ActivityStatus::Completed;
  s.create_activity(seed.carlos.account_id, done).await.unwrap();

  let rows = s.list_accounts(&AccountQuery::default()).await.unwrap();
  let carlos = rows
    .iter()
    .find(|r| r.account.identity.account_id == seed.carlos.account_id)
    .unwrap();
  assert_eq!(carlos.activities, 2);
  assert_eq!(carlos.pending_activities, 1);
  let ana = rows
    .iter()
    .find(|r| r.account.identity.account_id == seed.ana.account_id)
    .unwrap();
  assert_eq!(ana.activities, 0);

  let json = serde_json::to_value(carlos).unwrap();
  assert_eq!(json["username"], "carlos");
  assert_eq!(json["activities"], 2);
}

#[tokio::test]
async fn update_account_changes_scope_and_profile() {
  let s = store().await;
  let seed = seed(&s).await;

  let updated = s
    .update_account(seed.carlos.account_id, AccountPatch {
      subgroup: Some(Some(Subgroup::B)),
      profile: ProfilePatch { zone: Some("Sur".into()), ..Default::default() },
      ..Default::default()
    })
    .await
    .unwrap()
    .updated()
    .unwrap();
  assert_eq!(updated.identity.subgroup, Some(Subgroup::B));
  assert_eq!(updated.profile.zone.as_deref(), Some("Sur"));
  assert_eq!(updated.profile.first_name, "carlos");

  let cleared = s
    .update_account(seed.jefe_a.account_id, AccountPatch {
      role: Some(Role::Jefe),
      subgroup: Some(None),
      ..Default::default()
    })
    .await
    .unwrap()
    .updated()
    .unwrap();
  assert_eq!(cleared.identity.role, Role::Jefe);
  assert_eq!(cleared.identity.subgroup, None);

  let gone = s
    .update_account(Uuid::new_v4(), AccountPatch::default())
    .await
    .unwrap();
  assert!(matches!(gone, AccountUpdate::NotFound));
}

#[tokio::test]
async fn last_active_admin_cannot_be_deleted() {
  let s = store().await;
  let seed = seed(&s).await;

  assert_eq!(s.count_active_admins().await.unwrap(), 1);
  assert_eq!(s.delete_account(seed.admin.account_id).await.unwrap(), Removal::LastAdmin);

  let second = account(&s, "admin2", Role::Administrador, None).await;
  assert_eq!(s.count_active_admins().await.unwrap(), 2);
  assert_eq!(s.delete_account(second.account_id).await.unwrap(), Removal::Deleted);
  assert_eq!(s.delete_account(second.account_id).await.unwrap(), Removal::NotFound);
  assert_eq!(s.count_active_admins().await.unwrap(), 1);
}

#[tokio::test]
async fn last_active_admin_cannot_be_demoted_or_deactivated() {
  let s = store().await;
  let seed = seed(&s).await;
  let second = account(&s, "admin2", Role::Administrador, None).await;

  // With two admins one may step down; the survivor is then protected.
  let demoted = s
    .update_account(second.account_id, AccountPatch {
      role: Some(Role::Jefe),
      ..Default::default()
    })
    .await
    .unwrap();
  assert!(matches!(demoted, AccountUpdate::Updated(ref a) if a.identity.role == Role::Jefe));

  let demote = AccountPatch { role: Some(Role::Jefe), ..Default::default() };
  let refused = s.update_account(seed.admin.account_id, demote).await.unwrap();
  assert!(matches!(refused, AccountUpdate::LastAdmin));

  let deactivate = AccountPatch { active: Some(false), ..Default::default() };
  let refused = s.update_account(seed.admin.account_id, deactivate).await.unwrap();
  assert!(matches!(refused, AccountUpdate::LastAdmin));

  let admin = s.get_identity(seed.admin.account_id).await.unwrap().unwrap();
  assert!(admin.is_active_admin());
  assert_eq!(s.count_active_admins().await.unwrap(), 1);

  // Edits that keep the standing still go through.
  let renamed = s
    .update_account(seed.admin.account_id, AccountPatch {
      profile: ProfilePatch { first_name: Some("Ada".into()), ..Default::default() },
      ..Default::default()
    })
    .await
    .unwrap()
    .updated()
    .unwrap();
  assert_eq!(renamed.profile.first_name, "Ada");
}

#[tokio::test]
async fn deleting_one_admin_leaves_the_other_protected() {
  let s = store().await;
  let seed = seed(&s).await;
  let second = account(&s, "admin2", Role::Administrador, None).await;

  assert_eq!(s.delete_account(seed.admin.account_id).await.unwrap(), Removal::Deleted);
  let demote = AccountPatch { role: Some(Role::Comercial), ..Default::default() };
  let refused = s.update_account(second.account_id, demote).await.unwrap();
  assert!(matches!(refused, AccountUpdate::LastAdmin));
  assert_eq!(s.count_active_admins().await.unwrap(), 1);
}

#[tokio::test]
async fn deleting_an_account_cascades() {
  let s = store().await;
  let seed = seed(&s).await;
  let b = s.create_business(seed.carlos.account_id, business("Hotel Sol")).await.unwrap().unwrap();
  let i = s
    .create_incident(seed.carlos.account_id, incident("Caldera", b.business_id, Priority::High))
    .await
    .unwrap();
  s.add_comment(i.incident_id, "carlos".into(), "Llamado".into()).await.unwrap();
  s.insert_session(Session {
    token_digest: "digest".into(),
    account_id:   seed.carlos.account_id,
    created_at:   Utc::now(),
    expires_at:   Utc::now() + Duration::days(7),
  })
  .await
  .unwrap();

  assert_eq!(s.delete_account(seed.carlos.account_id).await.unwrap(), Removal::Deleted);

  assert!(s.get_account(seed.carlos.account_id).await.unwrap().is_none());
  assert!(s.get_business(b.business_id).await.unwrap().is_none());
  assert!(s.get_incident(i.incident_id).await.unwrap().is_none());
  assert!(s.list_comments(i.incident_id).await.unwrap().is_empty());
  assert!(s.get_session("digest").await.unwrap().is_none());
}

// ─── Sessions and resets ─────────────────────────────────────────────────────

#[tokio::test]
async fn purge_removes_only_expired_sessions() {
  let s = store().await;
  let seed = seed(&s).await;
  let now = Utc::now();

  for (digest, expires_at) in [
    ("old", now - Duration::seconds(1)),
    ("edge", now),
    ("live", now + Duration::hours(1)),
  ] {
    s.insert_session(Session {
      token_digest: digest.into(),
      account_id: seed.carlos.account_id,
      created_at: expires_at - Duration::days(7),
      expires_at,
    })
    .await
    .unwrap();
  }

  assert_eq!(s.purge_expired_sessions(now).await.unwrap(), 2);
  assert!(s.get_session("old").await.unwrap().is_none());
  assert!(s.get_session("edge").await.unwrap().is_none());
  let live = s.get_session("live").await.unwrap().unwrap();
  assert_eq!(live.account_id, seed.carlos.account_id);
}

#[tokio::test]
async fn delete_sessions_for_account() {
  let s = store().await;
  let seed = seed(&s).await;
  for digest in ["a", "b"] {
    s.insert_session(Session {
      token_digest: digest.into(),
      account_id:   seed.ana.account_id,
      created_at:   Utc::now(),
      expires_at:   Utc::now() + Duration::days(1),
    })
    .await
    .unwrap();
  }
  assert_eq!(s.delete_sessions_for(seed.ana.account_id).await.unwrap(), 2);
  assert!(!s.delete_session("a").await.unwrap());
}

#[tokio::test]
async fn reset_token_is_single_use_and_expires() {
  let s = store().await;
  let seed = seed(&s).await;
  let now = Utc::now();

  s.insert_reset(PasswordReset {
    token_digest: "fresh".into(),
    account_id:   seed.maria.account_id,
    created_at:   now,
    expires_at:   now + Duration::minutes(60),
  })
  .await
  .unwrap();
  s.insert_reset(PasswordReset {
    token_digest: "stale".into(),
    account_id:   seed.maria.account_id,
    created_at:   now - Duration::minutes(90),
    expires_at:   now - Duration::minutes(30),
  })
  .await
  .unwrap();

  assert_eq!(s.consume_reset("fresh", now).await.unwrap(), Some(seed.maria.account_id));
  assert_eq!(s.consume_reset("fresh", now).await.unwrap(), None);
  assert_eq!(s.consume_reset("stale", now).await.unwrap(), None);
  assert_eq!(s.consume_reset("unknown", now).await.unwrap(), None);
}

// ─── Scoped listing ──────────────────────────────────────────────────────────

#[tokio::test]
async fn activities_follow_the_role_table() {
  let s = store().await;
  let seed = seed(&s).await;

  s.create_activity(seed.carlos.account_id, activity("Visita Carlos", None, day(1)))
    .await
    .unwrap();
  s.create_activity(seed.ana.account_id, activity("Visita Ana", None, day(2)))
    .await
    .unwrap();

  let titles = |actor: &Identity| {
    let query = scope(actor, ActivityFilter::default());
    let s = s.clone();
    async move {
      s.list_activities(&query)
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.title)
        .collect::<Vec<_>>()
    }
  };

  assert_eq!(titles(&seed.carlos).await, ["Visita Carlos"]);
  assert_eq!(titles(&seed.jefe_a).await, ["Visita Carlos"]);
  assert_eq!(titles(&seed.admin).await, ["Visita Ana", "Visita Carlos"]);
  assert_eq!(titles(&seed.jefe).await, ["Visita Ana", "Visita Carlos"]);
  assert!(titles(&seed.maria).await.is_empty());
}

#[tokio::test]
async fn filters_never_widen_visibility() {
  let s = store().await;
  let seed = seed(&s).await;
  let ana_b = s.create_business(seed.ana.account_id, business("Bar Ana")).await.unwrap().unwrap();
  s.create_business(seed.carlos.account_id, business("Bar Carlos")).await.unwrap().unwrap();

  let asks_for_b = BusinessFilter {
    owner_subgroup: Some(Subgroup::B),
    ..Default::default()
  };
  let rows = s.list_businesses(&scope(&seed.jefe_a, asks_for_b.clone())).await.unwrap();
  assert!(rows.is_empty());

  let asks_for_ana = BusinessFilter {
    owner_id: Some(seed.ana.account_id),
    ..Default::default()
  };
  let rows = s.list_businesses(&scope(&seed.carlos, asks_for_ana.clone())).await.unwrap();
  assert!(rows.is_empty());

  let rows = s.list_businesses(&scope(&seed.admin, asks_for_b)).await.unwrap();
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0].business_id, ana_b.business_id);
  assert_eq!(rows[0].owner.owner_subgroup, Some(Subgroup::B));
}

#[tokio::test]
async fn nothing_visibility_returns_no_rows() {
  let s = store().await;
  let seed = seed(&s).await;
  s.create_business(seed.carlos.account_id, business("Hotel Sol")).await.unwrap().unwrap();

  let rows = s
    .list_businesses(&Visibility::Nothing.and(BusinessFilter::default()))
    .await
    .unwrap();
  assert!(rows.is_empty());
}

#[tokio::test]
async fn rows_follow_owner_subgroup_change() {
  let s = store().await;
  let seed = seed(&s).await;
  s.create_business(seed.carlos.account_id, business("Hotel Sol")).await.unwrap().unwrap();

  let jefe_b = account(&s, "jefe_b", Role::JefeGrupo, Some(Subgroup::B)).await;
  let visible_to = |actor: Identity| {
    let s = s.clone();
    async move {
      s.list_businesses(&scope(&actor, BusinessFilter::default()))
        .await
        .unwrap()
        .len()
    }
  };
  assert_eq!(visible_to(seed.jefe_a.clone()).await, 1);
  assert_eq!(visible_to(jefe_b.clone()).await, 0);

  s.update_account(seed.carlos.account_id, AccountPatch {
    subgroup: Some(Some(Subgroup::B)),
    ..Default::default()
  })
  .await
  .unwrap();

  assert_eq!(visible_to(seed.jefe_a).await, 0);
  assert_eq!(visible_to(jefe_b).await, 1);
}

#[tokio::test]
async fn text_search_matches_linked_business_name() {
  let s = store().await;
  let seed = seed(&s).await;
  let b = s.create_business(seed.carlos.account_id, business("Hotel Sol")).await.unwrap().unwrap();
  s.create_activity(seed.carlos.account_id, activity("Demo", Some(b.business_id), day(3)))
    .await
    .unwrap();
  s.create_activity(seed.carlos.account_id, activity("Llamada", None, day(4)))
    .await
    .unwrap();

  let filter = ActivityFilter { text: Some("sol".into()), ..Default::default() };
  let rows = s.list_activities(&scope(&seed.carlos, filter)).await.unwrap();
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0].title, "Demo");

  let filter = ActivityFilter {
    from: Some(day(4)),
    until: Some(day(30)),
    ..Default::default()
  };
  let rows = s.list_activities(&scope(&seed.carlos, filter)).await.unwrap();
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0].title, "Llamada");
}

#[tokio::test]
async fn incidents_sort_by_priority_then_recency() {
  let s = store().await;
  let seed = seed(&s).await;
  let b = s.create_business(seed.carlos.account_id, business("Hotel Sol")).await.unwrap().unwrap();
  for (title, priority) in [
    ("low", Priority::Low),
    ("critical", Priority::Critical),
    ("medium", Priority::Medium),
    ("high", Priority::High),
  ] {
    s.create_incident(seed.carlos.account_id, incident(title, b.business_id, priority))
      .await
      .unwrap();
  }

  let rows = s
    .list_incidents(&scope(&seed.jefe_a, IncidentFilter::default()))
    .await
    .unwrap();
  let titles: Vec<_> = rows.iter().map(|i| i.title.as_str()).collect();
  assert_eq!(titles, ["critical", "high", "medium", "low"]);
}

// ─── Record lifecycle ────────────────────────────────────────────────────────

#[tokio::test]
async fn patch_updates_only_supplied_fields() {
  let s = store().await;
  let seed = seed(&s).await;
  let b = s.create_business(seed.carlos.account_id, business("Hotel Sol")).await.unwrap().unwrap();

  let BusinessUpdate::Updated(patched) = s
    .update_business(b.business_id, BusinessPatch {
      phone: Some("600 000 000".into()),
      ..Default::default()
    })
    .await
    .unwrap()
  else {
    panic!("business should update");
  };
  assert_eq!(patched.name, "Hotel Sol");
  assert_eq!(patched.phone.as_deref(), Some("600 000 000"));
  assert_eq!(patched.owner.owner_id, seed.carlos.account_id);

  let a = s
    .create_activity(seed.carlos.account_id, activity("Visita", None, day(5)))
    .await
    .unwrap();
  let done = s
    .update_activity(a.activity_id, ActivityPatch {
      status: Some(ActivityStatus::Completed),
      ..Default::default()
    })
    .await
    .unwrap()
    .unwrap();
  assert_eq!(done.status, ActivityStatus::Completed);
  assert!(done.updated_at >= a.updated_at);

  let missing = s.update_business(Uuid::new_v4(), BusinessPatch::default()).await.unwrap();
  assert!(matches!(missing, BusinessUpdate::NotFound));
}

#[tokio::test]
async fn business_names_are_unique() {
  let s = store().await;
  let seed = seed(&s).await;
  let sol = s.create_business(seed.carlos.account_id, business("Hotel Sol")).await.unwrap().unwrap();
  let luna = s.create_business(seed.ana.account_id, business("Bar Luna")).await.unwrap().unwrap();

  assert!(s.create_business(seed.ana.account_id, business("Hotel Sol")).await.unwrap().is_none());
  assert!(s.create_business(seed.ana.account_id, business("hotel sol")).await.unwrap().is_none());

  let rename = |name: &str| BusinessPatch { name: Some(name.into()), ..Default::default() };
  let clash = s.update_business(luna.business_id, rename("HOTEL SOL")).await.unwrap();
  assert!(matches!(clash, BusinessUpdate::NameTaken));
  assert_eq!(s.get_business(luna.business_id).await.unwrap().unwrap().name, "Bar Luna");

  // Re-saving a business under its own name is not a clash.
  let same = s.update_business(sol.business_id, rename("Hotel Sol")).await.unwrap();
  assert!(matches!(same, BusinessUpdate::Updated(_)));

  let rows = s
    .list_businesses(&Visibility::Unrestricted.and(BusinessFilter::default()))
    .await
    .unwrap();
  assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn deleting_a_business_removes_incidents_and_detaches_activities() {
  let s = store().await;
  let seed = seed(&s).await;
  let b = s.create_business(seed.carlos.account_id, business("Hotel Sol")).await.unwrap().unwrap();
  let a = s
    .create_activity(seed.carlos.account_id, activity("Visita", Some(b.business_id), day(6)))
    .await
    .unwrap();
  let i = s
    .create_incident(seed.carlos.account_id, incident("Fuga", b.business_id, Priority::Low))
    .await
    .unwrap();

  assert!(s.delete_business(b.business_id).await.unwrap());
  assert!(!s.delete_business(b.business_id).await.unwrap());
  assert!(s.get_incident(i.incident_id).await.unwrap().is_none());
  let a = s.get_activity(a.activity_id).await.unwrap().unwrap();
  assert_eq!(a.business_id, None);
}

#[tokio::test]
async fn comments_are_oldest_first() {
  let s = store().await;
  let seed = seed(&s).await;
  let b = s.create_business(seed.ana.account_id, business("Bar Ana")).await.unwrap().unwrap();
  let i = s
    .create_incident(seed.ana.account_id, incident("Pedido", b.business_id, Priority::Medium))
    .await
    .unwrap();

  let first = s.add_comment(i.incident_id, "ana".into(), "uno".into()).await.unwrap();
  s.add_comment(i.incident_id, "admin".into(), "dos".into()).await.unwrap();

  let bodies: Vec<_> = s
    .list_comments(i.incident_id)
    .await
    .unwrap()
    .into_iter()
    .map(|c| c.body)
    .collect();
  assert_eq!(bodies, ["uno", "dos"]);

  assert_eq!(s.get_comment(first.comment_id).await.unwrap().unwrap().author, "ana");
  assert!(s.delete_comment(first.comment_id).await.unwrap());
  assert_eq!(s.list_comments(i.incident_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn incident_patch_resolves() {
  let s = store().await;
  let seed = seed(&s).await;
  let b = s.create_business(seed.ana.account_id, business("Bar Ana")).await.unwrap().unwrap();
  let i = s
    .create_incident(seed.ana.account_id, incident("Pedido", b.business_id, Priority::Medium))
    .await
    .unwrap();

  let resolved = s
    .update_incident(i.incident_id, IncidentPatch {
      status: Some(IncidentStatus::Resolved),
      resolution: Some("Repuesto enviado".into()),
      ..Default::default()
    })
    .await
    .unwrap()
    .unwrap();
  assert_eq!(resolved.status, IncidentStatus::Resolved);
  assert_eq!(resolved.resolution.as_deref(), Some("Repuesto enviado"));
  assert!(s.delete_incident(i.incident_id).await.unwrap());
}

// ─── Dashboard ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn stats_respect_visibility() {
  let s = store().await;
  let seed = seed(&s).await;
  let today = day(15);

  let carlos_b = s.create_business(seed.carlos.account_id, business("Hotel Sol")).await.unwrap().unwrap();
  let ana_b = s.create_business(seed.ana.account_id, business("Bar Ana")).await.unwrap().unwrap();
  s.create_activity(seed.carlos.account_id, activity("Visita", None, day(1))).await.unwrap();
  let mut overdue = incident("Atrasada", carlos_b.business_id, Priority::High);
  overdue.due_on = Some(day(10));
  s.create_incident(seed.carlos.account_id, overdue).await.unwrap();
  s.create_incident(seed.ana.account_id, incident("Abierta", ana_b.business_id, Priority::Low))
    .await
    .unwrap();

  let all = s.stats(visibility(&seed.admin), today).await.unwrap();
  assert_eq!(all.businesses, 2);
  assert_eq!(all.active_reps, 3);
  assert_eq!(all.activities, 1);
  assert_eq!(all.pending_activities, 1);
  assert_eq!(all.open_incidents, 2);
  assert_eq!(all.overdue_incidents, 1);

  let group_a = s.stats(visibility(&seed.jefe_a), today).await.unwrap();
  assert_eq!(group_a.businesses, 1);
  assert_eq!(group_a.active_reps, 2);
  assert_eq!(group_a.open_incidents, 1);

  let ana = s.stats(visibility(&seed.ana), today).await.unwrap();
  assert_eq!(ana.businesses, 1);
  assert_eq!(ana.active_reps, 1);
  assert_eq!(ana.activities, 0);
  assert_eq!(ana.overdue_incidents, 0);

  let none = s.stats(Visibility::Nothing, today).await.unwrap();
  assert_eq!(none, Default::default());
}

#[tokio::test]
async fn stats_break_down_under_visibility() {
  let s = store().await;
  let seed = seed(&s).await;
  let today = Utc::now().date_naive();

  let carlos_b = s.create_business(seed.carlos.account_id, business("Hotel Sol")).await.unwrap().unwrap();
  let ana_b = s.create_business(seed.ana.account_id, business("Bar Ana")).await.unwrap().unwrap();
  s.create_incident(seed.carlos.account_id, incident("Caldera", carlos_b.business_id, Priority::High))
    .await
    .unwrap();
  let mut resolved = incident("Fuga", carlos_b.business_id, Priority::High);
  resolved.status = IncidentStatus::Resolved;
  s.create_incident(seed.carlos.account_id, resolved).await.unwrap();
  s.create_incident(seed.ana.account_id, incident("Pedido", ana_b.business_id, Priority::Low))
    .await
    .unwrap();
  s.create_activity(seed.carlos.account_id, activity("Visita", None, today)).await.unwrap();
  let mut call = activity("Llamada", None, today);
  call.kind = ActivityKind::Call;
  s.create_activity(seed.carlos.account_id, call).await.unwrap();
  s.create_activity(seed.ana.account_id, activity("Visita", None, today)).await.unwrap();

  let all = s.stats(visibility(&seed.admin), today).await.unwrap();
  assert_eq!(all.open_by_priority.get(&Priority::High), Some(&1));
  assert_eq!(all.open_by_priority.get(&Priority::Low), Some(&1));
  assert_eq!(all.incidents_by_status.get(&IncidentStatus::Open), Some(&2));
  assert_eq!(all.incidents_by_status.get(&IncidentStatus::Resolved), Some(&1));
  assert_eq!(all.incidents_by_month.values().sum::<u64>(), 3);
  assert!(all.incidents_by_month.contains_key(&today.format("%Y-%m").to_string()));
  assert_eq!(all.activities_by_kind.get(&ActivityKind::Visit), Some(&2));
  assert_eq!(all.activities_by_kind.get(&ActivityKind::Call), Some(&1));
  let per_rep: Vec<_> = all
    .activities_per_rep
    .iter()
    .map(|r| (r.username.as_str(), r.activities))
    .collect();
  assert_eq!(per_rep, [("carlos", 2), ("ana", 1), ("maria", 0)]);

  let group_a = s.stats(visibility(&seed.jefe_a), today).await.unwrap();
  assert_eq!(group_a.open_by_priority.get(&Priority::Low), None);
  assert_eq!(group_a.activities_by_kind.get(&ActivityKind::Visit), Some(&1));
  let reps: Vec<_> = group_a.activities_per_rep.iter().map(|r| r.username.as_str()).collect();
  assert_eq!(reps, ["carlos", "maria"]);

  let ana = s.stats(visibility(&seed.ana), today).await.unwrap();
  assert_eq!(ana.incidents_by_status.values().sum::<u64>(), 1);
  assert_eq!(ana.activities_per_rep.len(), 1);
  assert_eq!(ana.activities_per_rep[0].account_id, seed.ana.account_id);

  let json = serde_json::to_value(&all).unwrap();
  assert_eq!(json["open_by_priority"]["high"], 1);
  assert_eq!(json["incidents_by_status"]["resolved"], 1);
}

#[tokio::test]
async fn lookups_respect_visibility() {
  let s = store().await;
  let seed = seed(&s).await;

  let mut carlos_b = business("Hotel Sol");
  carlos_b.sector = Some("Hosteleria".into());
  let carlos_b = s.create_business(seed.carlos.account_id, carlos_b).await.unwrap().unwrap();
  let mut ana_b = business("Taller Ana");
  ana_b.sector = Some("automocion".into());
  let ana_b = s.create_business(seed.ana.account_id, ana_b).await.unwrap().unwrap();
  let mut blank = business("Sin sector");
  blank.sector = Some("  ".into());
  s.create_business(seed.carlos.account_id, blank).await.unwrap().unwrap();

  let mut boiler = incident("Caldera", carlos_b.business_id, Priority::High);
  boiler.category = Some("averia".into());
  s.create_incident(seed.carlos.account_id, boiler).await.unwrap();
  let mut order = incident("Pedido", ana_b.business_id, Priority::Low);
  order.category = Some("facturacion".into());
  s.create_incident(seed.ana.account_id, order).await.unwrap();

  s.update_account(seed.ana.account_id, AccountPatch {
    profile: ProfilePatch { zone: Some("Sur".into()), ..Default::default() },
    ..Default::default()
  })
  .await
  .unwrap();

  let all = visibility(&seed.admin);
  assert_eq!(s.lookup(all, Lookup::Sectors).await.unwrap(), ["automocion", "Hosteleria"]);
  assert_eq!(s.lookup(all, Lookup::Zones).await.unwrap(), ["Norte", "Sur"]);
  assert_eq!(
    s.lookup(all, Lookup::IncidentCategories).await.unwrap(),
    ["averia", "facturacion"]
  );

  let carlos = visibility(&seed.carlos);
  assert_eq!(s.lookup(carlos, Lookup::Sectors).await.unwrap(), ["Hosteleria"]);
  assert_eq!(s.lookup(carlos, Lookup::IncidentCategories).await.unwrap(), ["averia"]);

  let group_a = visibility(&seed.jefe_a);
  assert_eq!(s.lookup(group_a, Lookup::Zones).await.unwrap(), ["Norte"]);

  assert!(s.lookup(Visibility::Nothing, Lookup::Sectors).await.unwrap().is_empty());
}
