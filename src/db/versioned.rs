//! Owner-scoped storage of versioned entities.
//!
//! Every read filters on the owning user, and every write draws a fresh
//! version from the store clock. Writes are upserts keyed on the entity id
//! whose update branch only fires when the stored row has the same owner, so
//! an id that belongs to someone else is reported as not found and left
//! untouched.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use serde::Serialize;
use uuid::Uuid;

use super::{date_at, decimal_at, enum_at, opt_date_at, opt_uuid_at, time_at, ts, uuid_at};
use crate::error::{ApiError, ApiResult};
use crate::models::*;

pub(crate) trait Versioned: Clone + PartialEq + Serialize + Sized {
    type Input: EntityInput + Serialize;

    const KIND: EntityKind;

    fn id(&self) -> Uuid;
    fn version(&self) -> Version;
    fn created_at(&self) -> DateTime<Utc>;
    fn updated_at(&self) -> DateTime<Utc>;

    fn build(
        id: Uuid,
        owner: Uuid,
        input: &Self::Input,
        version: Version,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self;

    /// The owner's entity with this id, if any.
    fn fetch(conn: &Connection, owner: Uuid, id: Uuid) -> ApiResult<Option<Self>>;

    /// Insert or overwrite by id. Returns the number of rows written, which
    /// is zero when the id is held by another owner.
    fn upsert(conn: &Connection, entity: &Self) -> ApiResult<usize>;

    fn remove(conn: &Connection, owner: Uuid, id: Uuid) -> ApiResult<usize>;

    /// The owner's entities with a version greater than `since`, oldest first.
    fn changed_since(conn: &Connection, owner: Uuid, since: Version) -> ApiResult<Vec<Self>>;

    /// Whether this stored entity already holds exactly `input`.
    fn holds(&self, owner: Uuid, input: &Self::Input) -> bool {
        let same = Self::build(
            self.id(),
            owner,
            input,
            self.version(),
            self.created_at(),
            self.updated_at(),
        );
        same == *self
    }

    /// Fetch, failing NotFound when absent or foreign.
    fn get(conn: &Connection, owner: Uuid, id: Uuid) -> ApiResult<Self> {
        Self::fetch(conn, owner, id)?.ok_or_else(|| ApiError::not_found(Self::KIND.as_str(), id))
    }

    /// Stamp a fresh version and update time on `input` and store it under
    /// `id`. The creation time of `existing` is kept when overwriting.
    fn write(
        conn: &Connection,
        owner: Uuid,
        id: Uuid,
        input: &Self::Input,
        existing: Option<&Self>,
    ) -> ApiResult<Self> {
        let version = super::next_version(conn)?;
        let now = Utc::now();
        let created_at = existing.map_or(now, Self::created_at);
        let entity = Self::build(id, owner, input, version, created_at, now);
        if Self::upsert(conn, &entity)? == 0 {
            return Err(ApiError::not_found(Self::KIND.as_str(), id));
        }
        Ok(entity)
    }

    fn delete(conn: &Connection, owner: Uuid, id: Uuid) -> ApiResult<()> {
        if Self::remove(conn, owner, id)? == 0 {
            return Err(ApiError::not_found(Self::KIND.as_str(), id));
        }
        Ok(())
    }
}

// ── Transactions ──────────────────────────────────────────────

pub(super) const TRANSACTION_COLUMNS: &str = "id, user_id, type, amount, category_id, sub_category_id, date, notes, attachment_url, source, sms_id, version, created_at, updated_at";

pub(super) fn transaction_from_row(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    Ok(Transaction {
        id: uuid_at(row, 0)?,
        user_id: uuid_at(row, 1)?,
        kind: enum_at(row, 2, TransactionType::parse)?,
        amount: decimal_at(row, 3)?,
        category_id: uuid_at(row, 4)?,
        sub_category_id: opt_uuid_at(row, 5)?,
        date: time_at(row, 6)?,
        notes: row.get(7)?,
        attachment_url: row.get(8)?,
        source: enum_at(row, 9, TransactionSource::parse)?,
        sms_id: opt_uuid_at(row, 10)?,
        version: row.get(11)?,
        created_at: time_at(row, 12)?,
        updated_at: time_at(row, 13)?,
    })
}

impl Versioned for Transaction {
    type Input = TransactionInput;

    const KIND: EntityKind = EntityKind::Transaction;

    fn id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn build(
        id: Uuid,
        owner: Uuid,
        input: &TransactionInput,
        version: Version,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Transaction::from_input(id, owner, input, version, created_at, updated_at)
    }

    fn fetch(conn: &Connection, owner: Uuid, id: Uuid) -> ApiResult<Option<Self>> {
        let result = conn.query_row(
            &format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ?1 AND user_id = ?2"),
            params![id.to_string(), owner.to_string()],
            transaction_from_row,
        );
        match result {
            Ok(t) => Ok(Some(t)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn upsert(conn: &Connection, txn: &Self) -> ApiResult<usize> {
        Ok(conn.execute(
            "INSERT INTO transactions (id, user_id, type, amount, category_id, sub_category_id, date, notes, attachment_url, source, sms_id, version, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
             ON CONFLICT(id) DO UPDATE SET
                type = excluded.type,
                amount = excluded.amount,
                category_id = excluded.category_id,
                sub_category_id = excluded.sub_category_id,
                date = excluded.date,
                notes = excluded.notes,
                attachment_url = excluded.attachment_url,
                source = excluded.source,
                sms_id = excluded.sms_id,
                version = excluded.version,
                updated_at = excluded.updated_at
             WHERE transactions.user_id = excluded.user_id",
            params![
                txn.id.to_string(),
                txn.user_id.to_string(),
                txn.kind.as_str(),
                txn.amount.to_string(),
                txn.category_id.to_string(),
                txn.sub_category_id.map(|u| u.to_string()),
                ts(&txn.date),
                txn.notes,
                txn.attachment_url,
                txn.source.as_str(),
                txn.sms_id.map(|u| u.to_string()),
                txn.version,
                ts(&txn.created_at),
                ts(&txn.updated_at),
            ],
        )?)
    }

    fn remove(conn: &Connection, owner: Uuid, id: Uuid) -> ApiResult<usize> {
        Ok(conn.execute(
            "DELETE FROM transactions WHERE id = ?1 AND user_id = ?2",
            params![id.to_string(), owner.to_string()],
        )?)
    }

    fn changed_since(conn: &Connection, owner: Uuid, since: Version) -> ApiResult<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions
             WHERE user_id = ?1 AND version > ?2
             ORDER BY version"
        ))?;
        let rows = stmt.query_map(params![owner.to_string(), since], transaction_from_row)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }
}

// ── Budgets ───────────────────────────────────────────────────

const BUDGET_COLUMNS: &str =
    "id, user_id, category_id, monthly_limit, start_date, end_date, version, created_at, updated_at";

pub(super) fn budget_from_row(row: &Row<'_>) -> rusqlite::Result<Budget> {
    Ok(Budget {
        id: uuid_at(row, 0)?,
        user_id: uuid_at(row, 1)?,
        category_id: uuid_at(row, 2)?,
        monthly_limit: decimal_at(row, 3)?,
        start_date: date_at(row, 4)?,
        end_date: opt_date_at(row, 5)?,
        version: row.get(6)?,
        created_at: time_at(row, 7)?,
        updated_at: time_at(row, 8)?,
    })
}

impl Versioned for Budget {
    type Input = BudgetInput;

    const KIND: EntityKind = EntityKind::Budget;

    fn id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn build(
        id: Uuid,
        owner: Uuid,
        input: &BudgetInput,
        version: Version,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Budget::from_input(id, owner, input, version, created_at, updated_at)
    }

    fn fetch(conn: &Connection, owner: Uuid, id: Uuid) -> ApiResult<Option<Self>> {
        let result = conn.query_row(
            &format!("SELECT {BUDGET_COLUMNS} FROM budgets WHERE id = ?1 AND user_id = ?2"),
            params![id.to_string(), owner.to_string()],
            budget_from_row,
        );
        match result {
            Ok(b) => Ok(Some(b)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn upsert(conn: &Connection, budget: &Self) -> ApiResult<usize> {
        Ok(conn.execute(
            "INSERT INTO budgets (id, user_id, category_id, monthly_limit, start_date, end_date, version, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(id) DO UPDATE SET
                category_id = excluded.category_id,
                monthly_limit = excluded.monthly_limit,
                start_date = excluded.start_date,
                end_date = excluded.end_date,
                version = excluded.version,
                updated_at = excluded.updated_at
             WHERE budgets.user_id = excluded.user_id",
            params![
                budget.id.to_string(),
                budget.user_id.to_string(),
                budget.category_id.to_string(),
                budget.monthly_limit.to_string(),
                budget.start_date.to_string(),
                budget.end_date.map(|d| d.to_string()),
                budget.version,
                ts(&budget.created_at),
                ts(&budget.updated_at),
            ],
        )?)
    }

    fn remove(conn: &Connection, owner: Uuid, id: Uuid) -> ApiResult<usize> {
        Ok(conn.execute(
            "DELETE FROM budgets WHERE id = ?1 AND user_id = ?2",
            params![id.to_string(), owner.to_string()],
        )?)
    }

    fn changed_since(conn: &Connection, owner: Uuid, since: Version) -> ApiResult<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {BUDGET_COLUMNS} FROM budgets
             WHERE user_id = ?1 AND version > ?2
             ORDER BY version"
        ))?;
        let rows = stmt.query_map(params![owner.to_string(), since], budget_from_row)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }
}
