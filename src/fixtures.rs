//! Builders shared by the test modules.

#![allow(clippy::unwrap_used)]

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::db::Database;
use crate::models::*;

pub(crate) fn db_with_user() -> (Database, User) {
    let mut db = Database::open_in_memory().unwrap();
    let user = db.insert_user("alice@example.com").unwrap();
    (db, user)
}

/// Id of a seeded shared category.
pub(crate) fn shared_category(db: &Database, owner: Uuid, name: &str) -> Uuid {
    let cats = db.get_categories(owner).unwrap();
    Category::find_by_name(&cats, name).unwrap().id
}

pub(crate) fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
}

pub(crate) fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub(crate) fn expense(category_id: Uuid, amount: Decimal, date: DateTime<Utc>) -> TransactionInput {
    TransactionInput {
        kind: TransactionType::Expense,
        amount,
        category_id,
        sub_category_id: None,
        date,
        notes: None,
        attachment_url: None,
        source: TransactionSource::Manual,
        sms_id: None,
    }
}

pub(crate) fn income(category_id: Uuid, amount: Decimal, date: DateTime<Utc>) -> TransactionInput {
    TransactionInput {
        kind: TransactionType::Income,
        ..expense(category_id, amount, date)
    }
}

pub(crate) fn budget(category_id: Uuid, monthly_limit: Decimal) -> BudgetInput {
    BudgetInput {
        category_id,
        monthly_limit,
        start_date: day(2025, 1, 1),
        end_date: None,
    }
}
