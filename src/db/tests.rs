#![allow(clippy::unwrap_used)]

use super::*;
use crate::fixtures::*;
use rust_decimal_macros::dec;

// ── Default data ──────────────────────────────────────────────

#[test]
fn test_default_categories_seeded() {
    let (db, user) = db_with_user();
    let cats = db.get_categories(user.id).unwrap();
    assert_eq!(cats.len(), schema::DEFAULT_CATEGORIES.len());
    assert!(cats.iter().all(Category::is_shared));
    assert!(cats.iter().any(|c| c.name == "Salary"));
    assert!(cats.iter().any(|c| c.name == "Uncategorized"));
}

#[test]
fn test_default_categories_not_reseeded() {
    let (mut db, user) = db_with_user();
    let count_before = db.get_categories(user.id).unwrap().len();
    db.seed_default_categories().unwrap();
    let count_after = db.get_categories(user.id).unwrap().len();
    assert_eq!(count_before, count_after);
}

#[test]
fn test_reopen_file_keeps_schema_and_seed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.db");
    {
        let mut db = Database::open(&path).unwrap();
        db.insert_user("bob@example.com").unwrap();
    }
    let db = Database::open(&path).unwrap();
    let user = db.find_user_by_email("bob@example.com").unwrap().unwrap();
    assert_eq!(
        db.get_categories(user.id).unwrap().len(),
        schema::DEFAULT_CATEGORIES.len()
    );
}

#[test]
fn test_connect_requires_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(Database::connect(&dir.path().join("missing.db")).is_err());
}

// ── Users ─────────────────────────────────────────────────────

#[test]
fn test_insert_user_creates_settings() {
    let (db, user) = db_with_user();
    assert_eq!(user.email, "alice@example.com");
    let settings = db.get_settings(user.id).unwrap().unwrap();
    assert_eq!(settings.user_id, user.id);
    assert_eq!(settings.theme, Theme::Light);
    assert_eq!(settings.sync_options["syncInterval"], 300);
}

#[test]
fn test_insert_user_normalizes_and_rejects_duplicates() {
    let (mut db, user) = db_with_user();
    let found = db.find_user_by_email("  ALICE@example.com ").unwrap().unwrap();
    assert_eq!(found.id, user.id);

    let err = db.insert_user("Alice@Example.com").unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));
    let err = db.insert_user("not-an-email").unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));
}

#[test]
fn test_get_user_missing() {
    let (db, _) = db_with_user();
    assert!(db.get_user(Uuid::new_v4()).unwrap().is_none());
}

// ── Categories ────────────────────────────────────────────────

#[test]
fn test_owned_category_visibility() {
    let (mut db, alice) = db_with_user();
    let bob = db.insert_user("bob@example.com").unwrap();

    let index = db.next_category_index(alice.id).unwrap();
    assert_eq!(index, schema::DEFAULT_CATEGORIES.len() as i64);
    let own = Category::new(Some(alice.id), "Pets".into(), index);
    db.insert_category(&own).unwrap();

    assert!(db.get_categories(alice.id).unwrap().iter().any(|c| c.id == own.id));
    assert!(!db.get_categories(bob.id).unwrap().iter().any(|c| c.id == own.id));

    let salary = shared_category(&db, alice.id, "Salary");
    assert!(category_visible(db.conn(), alice.id, own.id).unwrap());
    assert!(!category_visible(db.conn(), bob.id, own.id).unwrap());
    assert!(category_visible(db.conn(), bob.id, salary).unwrap());
    assert!(!category_visible(db.conn(), bob.id, Uuid::new_v4()).unwrap());
}

#[test]
fn test_duplicate_category_name_rejected() {
    let (db, user) = db_with_user();
    let first = Category::new(Some(user.id), "Pets".into(), 100);
    db.insert_category(&first).unwrap();
    let second = Category::new(Some(user.id), "Pets".into(), 101);
    assert!(matches!(
        db.insert_category(&second),
        Err(ApiError::Storage(_))
    ));
}

// ── Versioned writes ──────────────────────────────────────────

#[test]
fn test_write_then_fetch() {
    let (db, user) = db_with_user();
    let groceries = shared_category(&db, user.id, "Groceries");
    let id = Uuid::new_v4();
    let input = expense(groceries, dec!(42.50), at(2025, 3, 1));

    let written = Transaction::write(db.conn(), user.id, id, &input, None).unwrap();
    let fetched = Transaction::get(db.conn(), user.id, id).unwrap();
    assert_eq!(written, fetched);
    assert_eq!(fetched.amount, dec!(42.50));
    assert_eq!(fetched.amount.to_string(), "42.50");
    assert_eq!(fetched.date, at(2025, 3, 1));
    assert_eq!(fetched.user_id, user.id);
}

#[test]
fn test_versions_strictly_increase() {
    let (db, user) = db_with_user();
    let groceries = shared_category(&db, user.id, "Groceries");
    let before = current_version(db.conn()).unwrap();

    let a = Transaction::write(
        db.conn(),
        user.id,
        Uuid::new_v4(),
        &expense(groceries, dec!(1), at(2025, 1, 1)),
        None,
    )
    .unwrap();
    let b = Budget::write(
        db.conn(),
        user.id,
        Uuid::new_v4(),
        &budget(groceries, dec!(300)),
        None,
    )
    .unwrap();

    assert!(a.version > before);
    assert!(b.version > a.version);
    assert_eq!(current_version(db.conn()).unwrap(), b.version);
}

#[test]
fn test_overwrite_keeps_created_at() {
    let (db, user) = db_with_user();
    let groceries = shared_category(&db, user.id, "Groceries");
    let id = Uuid::new_v4();
    let first = Transaction::write(
        db.conn(),
        user.id,
        id,
        &expense(groceries, dec!(10), at(2025, 1, 1)),
        None,
    )
    .unwrap();
    let second = Transaction::write(
        db.conn(),
        user.id,
        id,
        &expense(groceries, dec!(20), at(2025, 1, 2)),
        Some(&first),
    )
    .unwrap();

    let stored = Transaction::get(db.conn(), user.id, id).unwrap();
    assert_eq!(stored.created_at, first.created_at);
    assert_eq!(stored.amount, dec!(20));
    assert!(stored.version > first.version);
    assert_eq!(stored, second);
}

#[test]
fn test_foreign_owner_write_is_not_found() {
    let (mut db, alice) = db_with_user();
    let bob = db.insert_user("bob@example.com").unwrap();
    let groceries = shared_category(&db, alice.id, "Groceries");
    let id = Uuid::new_v4();
    let original = Transaction::write(
        db.conn(),
        alice.id,
        id,
        &expense(groceries, dec!(10), at(2025, 1, 1)),
        None,
    )
    .unwrap();

    let err = Transaction::write(
        db.conn(),
        bob.id,
        id,
        &expense(groceries, dec!(999), at(2025, 1, 1)),
        None,
    )
    .unwrap_err();
    assert!(matches!(err, ApiError::NotFound { .. }));

    assert!(Transaction::fetch(db.conn(), bob.id, id).unwrap().is_none());
    let untouched = Transaction::get(db.conn(), alice.id, id).unwrap();
    assert_eq!(untouched, original);
}

#[test]
fn test_delete_scoped_to_owner() {
    let (mut db, alice) = db_with_user();
    let bob = db.insert_user("bob@example.com").unwrap();
    let groceries = shared_category(&db, alice.id, "Groceries");
    let id = Uuid::new_v4();
    Budget::write(db.conn(), alice.id, id, &budget(groceries, dec!(100)), None).unwrap();

    assert!(matches!(
        Budget::delete(db.conn(), bob.id, id),
        Err(ApiError::NotFound { .. })
    ));
    assert!(Budget::fetch(db.conn(), alice.id, id).unwrap().is_some());

    Budget::delete(db.conn(), alice.id, id).unwrap();
    assert!(Budget::fetch(db.conn(), alice.id, id).unwrap().is_none());
    assert!(matches!(
        Budget::delete(db.conn(), alice.id, id),
        Err(ApiError::NotFound { .. })
    ));
}

#[test]
fn test_changed_since() {
    let (db, user) = db_with_user();
    let groceries = shared_category(&db, user.id, "Groceries");
    let first = Transaction::write(
        db.conn(),
        user.id,
        Uuid::new_v4(),
        &expense(groceries, dec!(1), at(2025, 1, 1)),
        None,
    )
    .unwrap();
    let second = Transaction::write(
        db.conn(),
        user.id,
        Uuid::new_v4(),
        &expense(groceries, dec!(2), at(2025, 1, 2)),
        None,
    )
    .unwrap();

    let all = Transaction::changed_since(db.conn(), user.id, Version::ZERO).unwrap();
    assert_eq!(all.iter().map(|t| t.id).collect::<Vec<_>>(), vec![first.id, second.id]);

    let later = Transaction::changed_since(db.conn(), user.id, first.version).unwrap();
    assert_eq!(later.len(), 1);
    assert_eq!(later[0].id, second.id);

    let none = Transaction::changed_since(db.conn(), user.id, second.version).unwrap();
    assert!(none.is_empty());
}

// ── Queries ───────────────────────────────────────────────────

#[test]
fn test_get_transactions_filters_and_order() {
    let (db, user) = db_with_user();
    let groceries = shared_category(&db, user.id, "Groceries");
    let salary = shared_category(&db, user.id, "Salary");
    let conn = db.conn();

    Transaction::write(conn, user.id, Uuid::new_v4(), &expense(groceries, dec!(5), at(2025, 1, 5)), None).unwrap();
    Transaction::write(conn, user.id, Uuid::new_v4(), &income(salary, dec!(1000), at(2025, 1, 31)), None).unwrap();
    let mut sms = expense(groceries, dec!(7), at(2025, 2, 10));
    sms.source = TransactionSource::SmsImport;
    sms.sms_id = Some(Uuid::new_v4());
    Transaction::write(conn, user.id, Uuid::new_v4(), &sms, None).unwrap();

    let all = db.get_transactions(user.id, &TransactionFilter::default()).unwrap();
    let dates: Vec<_> = all.iter().map(|t| t.date).collect();
    assert_eq!(dates, vec![at(2025, 2, 10), at(2025, 1, 31), at(2025, 1, 5)]);

    let january = TransactionFilter {
        from: Some(at(2025, 1, 1)),
        to: Some(at(2025, 1, 31)),
        ..Default::default()
    };
    assert_eq!(db.get_transactions(user.id, &january).unwrap().len(), 2);

    let expenses = TransactionFilter {
        kind: Some(TransactionType::Expense),
        ..Default::default()
    };
    assert_eq!(db.get_transactions(user.id, &expenses).unwrap().len(), 2);

    let by_category = TransactionFilter {
        category_ids: vec![salary],
        ..Default::default()
    };
    let salaries = db.get_transactions(user.id, &by_category).unwrap();
    assert_eq!(salaries.len(), 1);
    assert_eq!(salaries[0].kind, TransactionType::Income);

    let imported = TransactionFilter {
        sources: vec![TransactionSource::SmsImport],
        ..Default::default()
    };
    assert_eq!(db.get_transactions(user.id, &imported).unwrap().len(), 1);

    let limited = TransactionFilter {
        limit: Some(1),
        ..Default::default()
    };
    let newest = db.get_transactions(user.id, &limited).unwrap();
    assert_eq!(newest.len(), 1);
    assert_eq!(newest[0].date, at(2025, 2, 10));
}

#[test]
fn test_get_transactions_only_owner() {
    let (mut db, alice) = db_with_user();
    let bob = db.insert_user("bob@example.com").unwrap();
    let groceries = shared_category(&db, alice.id, "Groceries");
    Transaction::write(db.conn(), alice.id, Uuid::new_v4(), &expense(groceries, dec!(5), at(2025, 1, 5)), None).unwrap();

    assert!(db.get_transactions(bob.id, &TransactionFilter::default()).unwrap().is_empty());
}

#[test]
fn test_budget_views_join_category_name() {
    let (db, user) = db_with_user();
    let groceries = shared_category(&db, user.id, "Groceries");
    let travel = shared_category(&db, user.id, "Travel");
    Budget::write(db.conn(), user.id, Uuid::new_v4(), &budget(travel, dec!(50)), None).unwrap();
    Budget::write(db.conn(), user.id, Uuid::new_v4(), &budget(groceries, dec!(400)), None).unwrap();

    let views = db.get_budget_views(user.id).unwrap();
    let names: Vec<&str> = views.iter().map(|v| v.category_name.as_str()).collect();
    // category display order
    assert_eq!(names, vec!["Groceries", "Travel"]);
    assert_eq!(views[0].budget.monthly_limit, dec!(400));
}

// ── Sync attempts ─────────────────────────────────────────────

#[test]
fn test_sync_attempts_newest_first() {
    let (db, user) = db_with_user();
    let mut first = SyncAttempt::new(user.id, Version(1), SyncStatus::Synced);
    first.last_attempt = at(2025, 1, 1);
    let mut second = SyncAttempt::new(user.id, Version(2), SyncStatus::Conflict);
    second.last_attempt = at(2025, 1, 2);
    insert_sync_attempt(db.conn(), &first).unwrap();
    insert_sync_attempt(db.conn(), &second).unwrap();

    let attempts = db.get_sync_attempts(user.id, 10).unwrap();
    assert_eq!(attempts, vec![second.clone(), first]);

    let latest = db.get_sync_attempts(user.id, 1).unwrap();
    assert_eq!(latest, vec![second]);
}

#[test]
fn test_timestamp_text_orders_like_time() {
    let earlier = at(2025, 1, 1);
    let later = earlier + chrono::Duration::nanoseconds(1);
    assert!(ts(&earlier) < ts(&later));
    assert_eq!(ts(&earlier).len(), ts(&later).len());
}
