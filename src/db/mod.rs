mod schema;
mod versioned;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OpenFlags, Row, TransactionBehavior};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::*;

pub(crate) use versioned::Versioned;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) struct Database {
    conn: Connection,
}

/// Owner-scoped transaction query. Empty vectors mean "no restriction".
#[derive(Debug, Clone, Default)]
pub(crate) struct TransactionFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub kind: Option<TransactionType>,
    pub category_ids: Vec<Uuid>,
    pub sources: Vec<TransactionSource>,
    pub limit: Option<u32>,
}

impl Database {
    /// Open (creating if needed) the database file, bring the schema up to
    /// date and seed the shared categories.
    pub(crate) fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        Self::configure(&conn).context("Failed to set database pragmas")?;
        let mut db = Self { conn };
        db.migrate().context("Database migration failed")?;
        db.seed_default_categories()
            .context("Failed to seed default categories")?;
        Ok(db)
    }

    /// Open another connection to a database that `open` already bootstrapped.
    /// Each request-handling unit uses its own connection; SQLite's locking
    /// is the only coordination between them.
    pub(crate) fn connect(path: &Path) -> ApiResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Self::configure(&conn)?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub(crate) fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let mut db = Self { conn };
        db.migrate()?;
        db.seed_default_categories()?;
        Ok(db)
    }

    fn configure(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        conn.busy_timeout(BUSY_TIMEOUT)
    }

    fn migrate(&mut self) -> anyhow::Result<()> {
        let has_version_table: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            [],
            |row| row.get(0),
        )?;

        if !has_version_table {
            let tx = self.conn.transaction()?;
            tx.execute_batch(schema::SCHEMA_V1)?;
            tx.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                params![schema::CURRENT_VERSION],
            )?;
            tx.commit()?;
            tracing::info!(version = schema::CURRENT_VERSION, "created database schema");
            return Ok(());
        }

        let current: i32 = self
            .conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .unwrap_or(0);

        for &(from_version, sql) in schema::MIGRATIONS {
            if current <= from_version {
                self.conn.execute_batch(sql)?;
            }
        }

        if current < schema::CURRENT_VERSION {
            self.conn.execute(
                "UPDATE schema_version SET version = ?1",
                params![schema::CURRENT_VERSION],
            )?;
            tracing::info!(
                from = current,
                to = schema::CURRENT_VERSION,
                "migrated database schema"
            );
        }

        Ok(())
    }

    fn seed_default_categories(&mut self) -> anyhow::Result<()> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM categories WHERE user_id IS NULL",
            [],
            |row| row.get(0),
        )?;
        if count > 0 {
            return Ok(());
        }

        let tx = self.conn.transaction()?;
        for (index, name) in schema::DEFAULT_CATEGORIES.iter().enumerate() {
            let cat = Category::new(None, (*name).to_string(), index as i64);
            tx.execute(
                "INSERT OR IGNORE INTO categories (id, user_id, name, description, order_index)
                 VALUES (?1, NULL, ?2, NULL, ?3)",
                params![cat.id.to_string(), cat.name, cat.order_index],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Begin a write transaction that holds SQLite's write lock from the
    /// start, so no other connection can read-then-write the same rows
    /// until this one commits or rolls back.
    pub(crate) fn begin_immediate(&mut self) -> ApiResult<rusqlite::Transaction<'_>> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?)
    }

    /// Begin a transaction for a consistent multi-query read.
    pub(crate) fn begin_read(&mut self) -> ApiResult<rusqlite::Transaction<'_>> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Deferred)?)
    }

    // ── Users ─────────────────────────────────────────────────

    pub(crate) fn insert_user(&mut self, email: &str) -> ApiResult<User> {
        let email = email.trim().to_lowercase();
        if !email.contains('@') {
            return Err(ApiError::validation(format!("not an email address: {email}")));
        }
        if self.find_user_by_email(&email)?.is_some() {
            return Err(ApiError::validation(format!("email already exists: {email}")));
        }

        let user = User::new(email);
        let settings = Settings::defaults_for(&user);

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO users (id, email, auth_provider, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user.id.to_string(),
                user.email,
                user.auth_provider,
                ts(&user.created_at),
                ts(&user.updated_at),
            ],
        )?;
        tx.execute(
            "INSERT INTO settings (id, user_id, theme, notification_preferences, sync_options, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                settings.id.to_string(),
                settings.user_id.to_string(),
                settings.theme.as_str(),
                settings.notification_preferences.to_string(),
                settings.sync_options.to_string(),
                ts(&settings.created_at),
                ts(&settings.updated_at),
            ],
        )?;
        tx.commit()?;
        Ok(user)
    }

    pub(crate) fn find_user_by_email(&self, email: &str) -> ApiResult<Option<User>> {
        let result = self.conn.query_row(
            "SELECT id, email, auth_provider, created_at, updated_at FROM users WHERE email = ?1",
            params![email.trim().to_lowercase()],
            user_from_row,
        );
        match result {
            Ok(u) => Ok(Some(u)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub(crate) fn get_user(&self, id: Uuid) -> ApiResult<Option<User>> {
        let result = self.conn.query_row(
            "SELECT id, email, auth_provider, created_at, updated_at FROM users WHERE id = ?1",
            params![id.to_string()],
            user_from_row,
        );
        match result {
            Ok(u) => Ok(Some(u)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub(crate) fn get_settings(&self, user_id: Uuid) -> ApiResult<Option<Settings>> {
        let result = self.conn.query_row(
            "SELECT id, user_id, theme, notification_preferences, sync_options, created_at, updated_at
             FROM settings WHERE user_id = ?1",
            params![user_id.to_string()],
            |row| {
                Ok(Settings {
                    id: uuid_at(row, 0)?,
                    user_id: uuid_at(row, 1)?,
                    theme: enum_at(row, 2, Theme::parse)?,
                    notification_preferences: json_at(row, 3)?,
                    sync_options: json_at(row, 4)?,
                    created_at: time_at(row, 5)?,
                    updated_at: time_at(row, 6)?,
                })
            },
        );
        match result {
            Ok(s) => Ok(Some(s)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    // ── Categories ────────────────────────────────────────────

    /// Shared categories plus the owner's own, in display order.
    pub(crate) fn get_categories(&self, owner: Uuid) -> ApiResult<Vec<Category>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, name, description, order_index FROM categories
             WHERE user_id IS NULL OR user_id = ?1
             ORDER BY order_index, name",
        )?;
        let rows = stmt.query_map(params![owner.to_string()], |row| {
            Ok(Category {
                id: uuid_at(row, 0)?,
                user_id: opt_uuid_at(row, 1)?,
                name: row.get(2)?,
                description: row.get(3)?,
                order_index: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub(crate) fn insert_category(&self, cat: &Category) -> ApiResult<()> {
        self.conn.execute(
            "INSERT INTO categories (id, user_id, name, description, order_index)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                cat.id.to_string(),
                cat.user_id.map(|u| u.to_string()),
                cat.name,
                cat.description,
                cat.order_index,
            ],
        )?;
        Ok(())
    }

    pub(crate) fn next_category_index(&self, owner: Uuid) -> ApiResult<i64> {
        Ok(self.conn.query_row(
            "SELECT COALESCE(MAX(order_index), -1) + 1 FROM categories
             WHERE user_id IS NULL OR user_id = ?1",
            params![owner.to_string()],
            |row| row.get(0),
        )?)
    }

    // ── Transactions ──────────────────────────────────────────

    /// Owner's transactions, newest first (date, then creation time).
    pub(crate) fn get_transactions(
        &self,
        owner: Uuid,
        filter: &TransactionFilter,
    ) -> ApiResult<Vec<Transaction>> {
        select_transactions(&self.conn, owner, filter)
    }

    // ── Budgets ───────────────────────────────────────────────

    pub(crate) fn get_budget_views(&self, owner: Uuid) -> ApiResult<Vec<BudgetView>> {
        select_budget_views(&self.conn, owner)
    }

    // ── Sync attempts ─────────────────────────────────────────

    /// Most recent attempts first.
    pub(crate) fn get_sync_attempts(&self, owner: Uuid, limit: u32) -> ApiResult<Vec<SyncAttempt>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, scope, sequence, status, last_attempt FROM sync_attempts
             WHERE user_id = ?1
             ORDER BY last_attempt DESC, sequence DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![owner.to_string(), limit], |row| {
            Ok(SyncAttempt {
                id: uuid_at(row, 0)?,
                user_id: uuid_at(row, 1)?,
                scope: row.get(2)?,
                sequence: row.get(3)?,
                status: enum_at(row, 4, SyncStatus::parse)?,
                last_attempt: time_at(row, 5)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }
}

// ── Helpers usable inside an open transaction ─────────────────

/// Advance the store clock and return the new version.
pub(crate) fn next_version(conn: &Connection) -> ApiResult<Version> {
    Ok(conn.query_row(
        "UPDATE version_clock SET value = value + 1 WHERE id = 1 RETURNING value",
        [],
        |row| row.get(0),
    )?)
}

pub(crate) fn current_version(conn: &Connection) -> ApiResult<Version> {
    Ok(conn.query_row(
        "SELECT value FROM version_clock WHERE id = 1",
        [],
        |row| row.get(0),
    )?)
}

pub(crate) fn user_exists(conn: &Connection, id: Uuid) -> ApiResult<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
        params![id.to_string()],
        |row| row.get(0),
    )?)
}

/// A category is visible to a user when it is shared or owned by them.
pub(crate) fn category_visible(conn: &Connection, owner: Uuid, id: Uuid) -> ApiResult<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM categories WHERE id = ?1 AND (user_id IS NULL OR user_id = ?2))",
        params![id.to_string(), owner.to_string()],
        |row| row.get(0),
    )?)
}

/// Owner's transactions, newest first (date, then creation time).
pub(crate) fn select_transactions(
    conn: &Connection,
    owner: Uuid,
    filter: &TransactionFilter,
) -> ApiResult<Vec<Transaction>> {
    let mut sql = format!(
        "SELECT {} FROM transactions WHERE user_id = ?1",
        versioned::TRANSACTION_COLUMNS
    );
    let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> =
        vec![Box::new(owner.to_string())];

    if let Some(from) = &filter.from {
        sql.push_str(&format!(" AND date >= ?{}", param_values.len() + 1));
        param_values.push(Box::new(ts(from)));
    }
    if let Some(to) = &filter.to {
        sql.push_str(&format!(" AND date <= ?{}", param_values.len() + 1));
        param_values.push(Box::new(ts(to)));
    }
    if let Some(kind) = filter.kind {
        sql.push_str(&format!(" AND type = ?{}", param_values.len() + 1));
        param_values.push(Box::new(kind.as_str()));
    }
    if !filter.category_ids.is_empty() {
        let start = param_values.len() + 1;
        let placeholders: Vec<String> = (0..filter.category_ids.len())
            .map(|i| format!("?{}", start + i))
            .collect();
        sql.push_str(&format!(" AND category_id IN ({})", placeholders.join(",")));
        for id in &filter.category_ids {
            param_values.push(Box::new(id.to_string()));
        }
    }
    if !filter.sources.is_empty() {
        let start = param_values.len() + 1;
        let placeholders: Vec<String> = (0..filter.sources.len())
            .map(|i| format!("?{}", start + i))
            .collect();
        sql.push_str(&format!(" AND source IN ({})", placeholders.join(",")));
        for source in &filter.sources {
            param_values.push(Box::new(source.as_str()));
        }
    }

    sql.push_str(" ORDER BY date DESC, created_at DESC, id DESC");

    if let Some(l) = filter.limit {
        sql.push_str(&format!(" LIMIT {l}"));
    }

    let params_ref: Vec<&dyn rusqlite::types::ToSql> =
        param_values.iter().map(|p| p.as_ref()).collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_ref.as_slice(), versioned::transaction_from_row)?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

pub(crate) fn select_budget_views(conn: &Connection, owner: Uuid) -> ApiResult<Vec<BudgetView>> {
    let mut stmt = conn.prepare(
        "SELECT b.id, b.user_id, b.category_id, b.monthly_limit, b.start_date, b.end_date,
                b.version, b.created_at, b.updated_at, c.name
         FROM budgets b
         JOIN categories c ON c.id = b.category_id
         WHERE b.user_id = ?1
         ORDER BY c.order_index, c.name, b.start_date",
    )?;
    let rows = stmt.query_map(params![owner.to_string()], |row| {
        Ok(BudgetView {
            budget: versioned::budget_from_row(row)?,
            category_name: row.get(9)?,
        })
    })?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

pub(crate) fn insert_sync_attempt(conn: &Connection, attempt: &SyncAttempt) -> ApiResult<()> {
    conn.execute(
        "INSERT INTO sync_attempts (id, user_id, scope, sequence, status, last_attempt)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            attempt.id.to_string(),
            attempt.user_id.to_string(),
            attempt.scope,
            attempt.sequence,
            attempt.status.as_str(),
            ts(&attempt.last_attempt),
        ],
    )?;
    Ok(())
}

// ── Column codecs ─────────────────────────────────────────────

/// Fixed-width RFC 3339 so that text order equals time order.
pub(crate) fn ts(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn conversion_err<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let s: String = row.get(idx)?;
    Uuid::parse_str(&s).map_err(|e| conversion_err(idx, e))
}

fn opt_uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    row.get::<_, Option<String>>(idx)?
        .map(|s| Uuid::parse_str(&s).map_err(|e| conversion_err(idx, e)))
        .transpose()
}

fn decimal_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let s: String = row.get(idx)?;
    Decimal::from_str(&s).map_err(|e| conversion_err(idx, e))
}

fn time_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let s: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_err(idx, e))
}

fn date_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let s: String = row.get(idx)?;
    NaiveDate::from_str(&s).map_err(|e| conversion_err(idx, e))
}

fn opt_date_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    row.get::<_, Option<String>>(idx)?
        .map(|s| NaiveDate::from_str(&s).map_err(|e| conversion_err(idx, e)))
        .transpose()
}

fn json_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<serde_json::Value> {
    let s: String = row.get(idx)?;
    serde_json::from_str(&s).map_err(|e| conversion_err(idx, e))
}

fn enum_at<T>(row: &Row<'_>, idx: usize, parse: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    let s: String = row.get(idx)?;
    parse(&s).ok_or_else(|| rusqlite::Error::InvalidColumnType(idx, s, Type::Text))
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: uuid_at(row, 0)?,
        email: row.get(1)?,
        auth_provider: row.get(2)?,
        created_at: time_at(row, 3)?,
        updated_at: time_at(row, 4)?,
    })
}

#[cfg(test)]
mod tests;
