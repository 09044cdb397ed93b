//! Owner-scoped single-entity operations behind the HTTP routes and the CLI.
//!
//! Every operation takes the caller identity as resolved by the token layer
//! and fails `Unauthenticated` before touching the store when there is none.

use serde::Serialize;
use uuid::Uuid;

use crate::db::{self, Database, TransactionFilter, Versioned};
use crate::error::{ApiError, ApiResult};
use crate::models::*;
use crate::sync::validate;

/// Upper bound on `sync_status` history.
pub(crate) const STATUS_HISTORY: u32 = 10;

/// Entities changed after a given version, with the version they bring the
/// client up to.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ChangeSet {
    pub since: Version,
    pub transactions: Vec<Transaction>,
    pub budgets: Vec<Budget>,
    pub checkpoint: Version,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SyncStatusReport {
    pub last: Option<SyncAttempt>,
    pub recent: Vec<SyncAttempt>,
    pub version: Version,
}

fn owner(caller: Option<Uuid>) -> ApiResult<Uuid> {
    caller.ok_or(ApiError::Unauthenticated)
}

// ── Generic versioned CRUD ────────────────────────────────────

fn create<E: Versioned>(db: &mut Database, caller: Option<Uuid>, input: &E::Input) -> ApiResult<E> {
    let owner = owner(caller)?;
    input.check().map_err(ApiError::Validation)?;
    let id = Uuid::new_v4();

    let tx = db.begin_immediate()?;
    if !db::user_exists(&tx, owner)? {
        return Err(ApiError::Unauthenticated);
    }
    validate::check_category(&tx, owner, E::KIND, id, input)?;
    let created = E::write(&tx, owner, id, input, None)?;
    tx.commit()?;

    tracing::info!(kind = %E::KIND, %id, version = %created.version(), "created");
    Ok(created)
}

fn update<E: Versioned>(
    db: &mut Database,
    caller: Option<Uuid>,
    id: Uuid,
    input: &E::Input,
) -> ApiResult<E> {
    let owner = owner(caller)?;
    input.check().map_err(ApiError::Validation)?;

    let tx = db.begin_immediate()?;
    let existing = E::get(&tx, owner, id)?;
    validate::check_category(&tx, owner, E::KIND, id, input)?;
    let updated = E::write(&tx, owner, id, input, Some(&existing))?;
    tx.commit()?;

    tracing::info!(kind = %E::KIND, %id, version = %updated.version(), "updated");
    Ok(updated)
}

fn delete<E: Versioned>(db: &mut Database, caller: Option<Uuid>, id: Uuid) -> ApiResult<()> {
    let owner = owner(caller)?;
    let tx = db.begin_immediate()?;
    E::delete(&tx, owner, id)?;
    tx.commit()?;
    tracing::info!(kind = %E::KIND, %id, "deleted");
    Ok(())
}

fn get<E: Versioned>(db: &Database, caller: Option<Uuid>, id: Uuid) -> ApiResult<E> {
    E::get(db.conn(), owner(caller)?, id)
}

// ── Transactions ──────────────────────────────────────────────

pub(crate) fn create_transaction(
    db: &mut Database,
    caller: Option<Uuid>,
    input: &TransactionInput,
) -> ApiResult<Transaction> {
    create(db, caller, input)
}

pub(crate) fn update_transaction(
    db: &mut Database,
    caller: Option<Uuid>,
    id: Uuid,
    input: &TransactionInput,
) -> ApiResult<Transaction> {
    update(db, caller, id, input)
}

pub(crate) fn delete_transaction(db: &mut Database, caller: Option<Uuid>, id: Uuid) -> ApiResult<()> {
    delete::<Transaction>(db, caller, id)
}

pub(crate) fn transaction(db: &Database, caller: Option<Uuid>, id: Uuid) -> ApiResult<Transaction> {
    get(db, caller, id)
}

pub(crate) fn transactions(
    db: &Database,
    caller: Option<Uuid>,
    filter: &TransactionFilter,
) -> ApiResult<Vec<Transaction>> {
    if let (Some(from), Some(to)) = (filter.from, filter.to) {
        if to < from {
            return Err(ApiError::validation(format!(
                "date range ends before it starts: {from} > {to}"
            )));
        }
    }
    db.get_transactions(owner(caller)?, filter)
}

// ── Budgets ───────────────────────────────────────────────────

pub(crate) fn create_budget(
    db: &mut Database,
    caller: Option<Uuid>,
    input: &BudgetInput,
) -> ApiResult<Budget> {
    create(db, caller, input)
}

pub(crate) fn update_budget(
    db: &mut Database,
    caller: Option<Uuid>,
    id: Uuid,
    input: &BudgetInput,
) -> ApiResult<Budget> {
    update(db, caller, id, input)
}

pub(crate) fn delete_budget(db: &mut Database, caller: Option<Uuid>, id: Uuid) -> ApiResult<()> {
    delete::<Budget>(db, caller, id)
}

pub(crate) fn budget(db: &Database, caller: Option<Uuid>, id: Uuid) -> ApiResult<Budget> {
    get(db, caller, id)
}

pub(crate) fn budgets(db: &Database, caller: Option<Uuid>) -> ApiResult<Vec<BudgetView>> {
    db.get_budget_views(owner(caller)?)
}

// ── Categories ────────────────────────────────────────────────

pub(crate) fn categories(db: &Database, caller: Option<Uuid>) -> ApiResult<Vec<Category>> {
    db.get_categories(owner(caller)?)
}

pub(crate) fn create_category(
    db: &Database,
    caller: Option<Uuid>,
    input: CategoryInput,
) -> ApiResult<Category> {
    let owner = owner(caller)?;
    let name = input.name.trim();
    if name.is_empty() {
        return Err(ApiError::validation("category name must not be empty"));
    }
    let visible = db.get_categories(owner)?;
    if Category::find_by_name(&visible, name).is_some() {
        return Err(ApiError::validation(format!("category already exists: {name}")));
    }

    let mut cat = Category::new(Some(owner), name.to_string(), db.next_category_index(owner)?);
    cat.description = input
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());
    db.insert_category(&cat)?;
    tracing::info!(id = %cat.id, name = %cat.name, "created category");
    Ok(cat)
}

// ── Account and sync state ────────────────────────────────────

pub(crate) fn me(db: &Database, caller: Option<Uuid>) -> ApiResult<Profile> {
    let owner = owner(caller)?;
    // a valid token for a removed user is treated as no identity
    let user = db.get_user(owner)?.ok_or(ApiError::Unauthenticated)?;
    let settings = db.get_settings(owner)?;
    Ok(Profile { user, settings })
}

pub(crate) fn changes_since(
    db: &mut Database,
    caller: Option<Uuid>,
    since: Version,
) -> ApiResult<ChangeSet> {
    let owner = owner(caller)?;
    if since.get() < 0 {
        return Err(ApiError::validation(format!(
            "since must not be negative, got {}",
            since.get()
        )));
    }

    let tx = db.begin_read()?;
    let transactions = Transaction::changed_since(&tx, owner, since)?;
    let budgets = Budget::changed_since(&tx, owner, since)?;
    let checkpoint = db::current_version(&tx)?;
    tx.commit()?;

    Ok(ChangeSet {
        since,
        transactions,
        budgets,
        checkpoint,
    })
}

pub(crate) fn sync_status(db: &Database, caller: Option<Uuid>) -> ApiResult<SyncStatusReport> {
    let owner = owner(caller)?;
    let recent = db.get_sync_attempts(owner, STATUS_HISTORY)?;
    Ok(SyncStatusReport {
        last: recent.first().cloned(),
        recent,
        version: db::current_version(db.conn())?,
    })
}
