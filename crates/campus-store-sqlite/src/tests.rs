//! Integration tests for `SqliteStore` against an in-memory database.

use campus_core::{
  assign::{assign, AssignError, AssignOptions},
  group::NewGroup,
  obligation::{NewObligation, NewTemplate, ObligationStatus, ObligationTemplate},
  principal::{NewPrincipal, OperableState, Role},
  store::{ObligationQuery, RecordStore},
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn due() -> NaiveDate { NaiveDate::from_ymd_opt(2026, 1, 31).unwrap() }

async fn template(s: &SqliteStore) -> ObligationTemplate {
  s.add_template(NewTemplate {
    name:     "Term 1 tuition".into(),
    amount:   Decimal::new(100, 0),
    currency: "LKR".into(),
  })
  .await
  .unwrap()
}

async fn student(s: &SqliteStore, name: &str) -> Uuid {
  s.add_principal(NewPrincipal::new(Role::Student, name, format!("{name}@school.test")))
    .await
    .unwrap()
    .principal_id
}

// ─── Principals ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_and_get_principal() {
  let s = store().await;
  let mut input = NewPrincipal::new(Role::Parent, "Kamala", "kamala@school.test")
    .with_state(OperableState::Pending);
  input.class_ids = vec![Uuid::new_v4()];
  input.password_hash = "$argon2id$v=19$stub".into();

  let p = s.add_principal(input).await.unwrap();
  let fetched = s.get_principal(p.principal_id).await.unwrap().unwrap();

  assert_eq!(fetched.role, Role::Parent);
  assert_eq!(fetched.state, OperableState::Pending);
  assert_eq!(fetched.class_ids, p.class_ids);
  assert_eq!(fetched.password_hash, "$argon2id$v=19$stub");
}

#[tokio::test]
async fn get_principal_missing_returns_none() {
  let s = store().await;
  assert!(s.get_principal(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
  let s = store().await;
  s.add_principal(NewPrincipal::new(Role::Admin, "A", "a@school.test")).await.unwrap();
  let dup = s.add_principal(NewPrincipal::new(Role::Teacher, "B", "a@school.test")).await;
  assert!(dup.is_err());
}

#[tokio::test]
async fn get_principals_ignores_unknown_ids() {
  let s = store().await;
  let a = student(&s, "a").await;
  let b = student(&s, "b").await;

  let mut found: Vec<Uuid> = s
    .get_principals(vec![a, Uuid::new_v4(), b])
    .await
    .unwrap()
    .into_iter()
    .map(|p| p.principal_id)
    .collect();
  found.sort();
  let mut expected = vec![a, b];
  expected.sort();
  assert_eq!(found, expected);

  assert!(s.get_principals(Vec::new()).await.unwrap().is_empty());
}

#[tokio::test]
async fn find_principal_by_email() {
  let s = store().await;
  let id = student(&s, "ruwan").await;
  let found = s.find_principal_by_email("ruwan@school.test".into()).await.unwrap();
  assert_eq!(found.map(|p| p.principal_id), Some(id));
  assert!(s.find_principal_by_email("nobody@school.test".into()).await.unwrap().is_none());
}

// ─── Groups ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn groups_keep_enrolment_order() {
  let s = store().await;
  let members = vec![Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
  let g = s.add_group(NewGroup::new("Grade 7A", members.clone())).await.unwrap();

  let groups = s.get_groups(vec![g.group_id, Uuid::new_v4()]).await.unwrap();
  assert_eq!(groups.len(), 1);
  assert_eq!(groups[0].name, "Grade 7A");
  assert_eq!(groups[0].member_ids, members);
}

#[tokio::test]
async fn repeated_member_is_stored_once() {
  let s = store().await;
  let a = Uuid::new_v4();
  let b = Uuid::new_v4();
  let g = s.add_group(NewGroup::new("Grade 8C", vec![a, b, a])).await.unwrap();
  assert_eq!(g.member_ids, vec![a, b]);

  let fetched = s.get_groups(vec![g.group_id]).await.unwrap();
  assert_eq!(fetched, vec![g]);
}

// More ids than SQLite accepts as variables in a single statement.
const MANY: usize = 33_000;

#[tokio::test]
async fn lookups_by_id_set_beyond_variable_limit() {
  let s = store().await;
  let known = student(&s, "known").await;
  let g = s.add_group(NewGroup::new("Real", vec![known])).await.unwrap();

  let mut ids: Vec<Uuid> = (0..MANY).map(|_| Uuid::new_v4()).collect();
  ids.push(known);
  let principals = s.get_principals(ids.clone()).await.unwrap();
  assert_eq!(principals.len(), 1);
  assert_eq!(principals[0].principal_id, known);

  ids.push(g.group_id);
  let groups = s.get_groups(ids).await.unwrap();
  assert_eq!(groups, vec![g]);
}

// ─── Templates ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn template_amount_round_trips() {
  let s = store().await;
  let t = s
    .add_template(NewTemplate {
      name:     "Lab fee".into(),
      amount:   Decimal::new(250075, 2),
      currency: "LKR".into(),
    })
    .await
    .unwrap();
  let fetched = s.get_template(t.template_id).await.unwrap().unwrap();
  assert_eq!(fetched, t);
  assert!(s.get_template(Uuid::new_v4()).await.unwrap().is_none());
}

// ─── Obligations ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn created_obligation_is_pending_with_key() {
  let s = store().await;
  let t = template(&s).await;
  let input = NewObligation::from_template(&t, Uuid::new_v4(), Uuid::new_v4(), due());
  let key = input.idempotency_key();

  let o = s.create_obligation(input).await.unwrap();
  assert_eq!(o.status, ObligationStatus::Pending);
  assert_eq!(o.idempotency_key, key);

  let found = s.find_obligation_by_key(key).await.unwrap().unwrap();
  assert_eq!(found, o);
}

#[tokio::test]
async fn obligation_for_unknown_template_fails() {
  let s = store().await;
  let mut t = template(&s).await;
  t.template_id = Uuid::new_v4();
  let input = NewObligation::from_template(&t, Uuid::new_v4(), Uuid::new_v4(), due());
  assert!(s.create_obligation(input).await.is_err());
}

#[tokio::test]
async fn batch_create_is_all_or_nothing() {
  let s = store().await;
  let good = template(&s).await;
  let mut bad = good.clone();
  bad.template_id = Uuid::new_v4();

  let inputs = vec![
    NewObligation::from_template(&good, Uuid::new_v4(), Uuid::new_v4(), due()),
    NewObligation::from_template(&bad, Uuid::new_v4(), Uuid::new_v4(), due()),
  ];
  assert!(s.create_obligations(inputs).await.is_err());
  assert!(s.list_obligations(ObligationQuery::default()).await.unwrap().is_empty());

  let inputs = vec![
    NewObligation::from_template(&good, Uuid::new_v4(), Uuid::new_v4(), due()),
    NewObligation::from_template(&good, Uuid::new_v4(), Uuid::new_v4(), due()),
  ];
  let created = s.create_obligations(inputs).await.unwrap();
  assert_eq!(created.len(), 2);
  assert_eq!(s.list_obligations(ObligationQuery::default()).await.unwrap(), created);
}

#[tokio::test]
async fn list_filters_and_status_update() {
  let s = store().await;
  let t = template(&s).await;
  let alice = Uuid::new_v4();
  let bob = Uuid::new_v4();
  let group = Uuid::new_v4();

  let a = s
    .create_obligation(NewObligation::from_template(&t, group, alice, due()))
    .await
    .unwrap();
  s.create_obligation(NewObligation::from_template(&t, group, bob, due()))
    .await
    .unwrap();

  let mine = s
    .list_obligations(ObligationQuery { student_id: Some(alice), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(mine, vec![a.clone()]);

  let paid = s
    .update_obligation_status(a.obligation_id, ObligationStatus::Paid)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(paid.status, ObligationStatus::Paid);

  let pending = s
    .list_obligations(ObligationQuery {
      group_id: Some(group),
      status: Some(ObligationStatus::Pending),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(pending.len(), 1);
  assert_eq!(pending[0].student_id, bob);

  assert!(
    s.update_obligation_status(Uuid::new_v4(), ObligationStatus::Overdue)
      .await
      .unwrap()
      .is_none()
  );
}

// ─── Assignment engine against SQLite ────────────────────────────────────────

#[tokio::test]
async fn assignment_fans_out_and_repeats_duplicate() {
  let s = store().await;
  let t = template(&s).await;
  let s1 = student(&s, "s1").await;
  let s2 = student(&s, "s2").await;
  let s3 = student(&s, "s3").await;
  let c1 = s.add_group(NewGroup::new("C1", vec![s1, s2])).await.unwrap().group_id;
  let c2 = s.add_group(NewGroup::new("C2", vec![s3])).await.unwrap().group_id;

  let first = assign(&s, t.template_id, &[c1, c2], due(), AssignOptions::default())
    .await
    .unwrap();
  assert_eq!(first.created.len(), 3);

  assign(&s, t.template_id, &[c1, c2], due(), AssignOptions::default())
    .await
    .unwrap();
  let all = s.list_obligations(ObligationQuery::default()).await.unwrap();
  assert_eq!(all.len(), 6);

  let deduped = assign(
    &s,
    t.template_id,
    &[c1, c2],
    due(),
    AssignOptions { deduplicate: true, atomic: true },
  )
  .await
  .unwrap();
  assert!(deduped.created.is_empty());
  assert_eq!(deduped.skipped_duplicates.len(), 3);
}

#[tokio::test]
async fn assignment_with_unknown_template_writes_nothing() {
  let s = store().await;
  let s1 = student(&s, "s1").await;
  let c1 = s.add_group(NewGroup::new("C1", vec![s1])).await.unwrap().group_id;

  let err = assign(&s, Uuid::new_v4(), &[c1], due(), AssignOptions::default())
    .await
    .unwrap_err();
  assert!(matches!(err, AssignError::TemplateNotFound(_)));
  assert!(s.list_obligations(ObligationQuery::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn assignment_over_huge_class_skips_unknown_members() {
  let s = store().await;
  let t = template(&s).await;
  let real = student(&s, "real").await;
  let mut members = vec![real];
  members.extend((0..MANY).map(|_| Uuid::new_v4()));
  let class = s.add_group(NewGroup::new("Everyone", members)).await.unwrap().group_id;

  let outcome = assign(&s, t.template_id, &[class], due(), AssignOptions::default())
    .await
    .unwrap();
  assert_eq!(outcome.created.len(), 1);
  assert_eq!(outcome.created[0].student_id, real);
  assert_eq!(outcome.skipped_members.len(), MANY);
}
