use std::collections::HashSet;

use rusqlite::Connection;
use uuid::Uuid;

use super::SyncRequest;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{Candidate, EntityInput, EntityKind};

/// Checks that need no store access. Runs before the transaction opens.
pub(super) fn check_batch(request: &SyncRequest, max_batch: usize) -> ApiResult<()> {
    if request.checkpoint.get() < 0 {
        return Err(ApiError::validation(format!(
            "checkpoint must not be negative, got {}",
            request.checkpoint.get()
        )));
    }
    let total = request.transactions.len() + request.budgets.len();
    if total > max_batch {
        return Err(ApiError::validation(format!(
            "batch too large: {total} > {max_batch} entities"
        )));
    }
    check_candidates(EntityKind::Transaction, &request.transactions)?;
    check_candidates(EntityKind::Budget, &request.budgets)?;
    Ok(())
}

fn check_candidates<I: EntityInput>(kind: EntityKind, candidates: &[Candidate<I>]) -> ApiResult<()> {
    let mut seen = HashSet::with_capacity(candidates.len());
    for candidate in candidates {
        if candidate.id.is_nil() {
            return Err(ApiError::validation(format!("{kind} id must not be nil")));
        }
        if !seen.insert(candidate.id) {
            return Err(ApiError::validation(format!(
                "{kind} {} appears more than once in the batch",
                candidate.id
            )));
        }
        candidate
            .input
            .check()
            .map_err(|msg| ApiError::validation(format!("{kind} {}: {msg}", candidate.id)))?;
    }
    Ok(())
}

/// The referenced category must be shared or belong to the owner.
pub(crate) fn check_category<I: EntityInput>(
    conn: &Connection,
    owner: Uuid,
    kind: EntityKind,
    id: Uuid,
    input: &I,
) -> ApiResult<()> {
    let category_id = input.category_id();
    if !db::category_visible(conn, owner, category_id)? {
        return Err(ApiError::validation(format!(
            "{kind} {id}: unknown category {category_id}"
        )));
    }
    Ok(())
}
