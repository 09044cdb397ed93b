//! Batch reconciliation of client changes against the store.
//!
//! A sync call carries the client's checkpoint (the store version it last
//! saw) and every entity it changed while offline. Inside one immediate
//! transaction each candidate is compared with the stored copy: anything the
//! server changed after the checkpoint wins and is reported as a conflict,
//! everything else is written with a fresh version. The call then records a
//! single sync attempt and commits, or rolls back entirely on the first error.

mod ledger;
pub(crate) mod validate;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{self, Database, Versioned};
use crate::error::{ApiError, ApiResult};
use crate::models::*;

pub(crate) use ledger::{Conflict, ConflictLedger};

pub(crate) const DEFAULT_MAX_BATCH: usize = 500;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SyncRequest {
    pub checkpoint: Version,
    #[serde(default)]
    pub transactions: Vec<TransactionCandidate>,
    #[serde(default)]
    pub budgets: Vec<BudgetCandidate>,
}

/// Resolved state for every submitted entity, in submission order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SyncResponse {
    pub transactions: Vec<Transaction>,
    pub budgets: Vec<Budget>,
    pub conflicts: Vec<Conflict>,
    /// Store version when the call committed.
    pub checkpoint: Version,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Coordinator {
    max_batch: usize,
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BATCH)
    }
}

impl Coordinator {
    pub(crate) fn new(max_batch: usize) -> Self {
        Self { max_batch }
    }

    pub(crate) fn max_batch(&self) -> usize {
        self.max_batch
    }

    pub(crate) fn sync(
        &self,
        db: &mut Database,
        caller: Option<Uuid>,
        request: SyncRequest,
    ) -> ApiResult<SyncResponse> {
        let owner = caller.ok_or(ApiError::Unauthenticated)?;
        validate::check_batch(&request, self.max_batch)?;

        let checkpoint = request.checkpoint;
        let tx = db.begin_immediate()?;
        // a valid token for a removed user is treated as no identity
        if !db::user_exists(&tx, owner)? {
            return Err(ApiError::Unauthenticated);
        }
        let mut ledger = ConflictLedger::default();

        let transactions = request
            .transactions
            .iter()
            .map(|c| merge::<Transaction>(&tx, owner, checkpoint, c, &mut ledger))
            .collect::<ApiResult<Vec<_>>>()?;
        let budgets = request
            .budgets
            .iter()
            .map(|c| merge::<Budget>(&tx, owner, checkpoint, c, &mut ledger))
            .collect::<ApiResult<Vec<_>>>()?;

        let current = db::current_version(&tx)?;
        let status = if ledger.is_empty() {
            SyncStatus::Synced
        } else {
            SyncStatus::Conflict
        };
        db::insert_sync_attempt(&tx, &SyncAttempt::new(owner, current, status))?;
        tx.commit()?;

        tracing::info!(
            user = %owner,
            %checkpoint,
            transactions = transactions.len(),
            budgets = budgets.len(),
            conflicts = ledger.len(),
            version = %current,
            %status,
            "sync committed"
        );

        Ok(SyncResponse {
            transactions,
            budgets,
            conflicts: ledger.into_conflicts(),
            checkpoint: current,
        })
    }
}

/// Reconcile one candidate. The stored copy wins when it changed after the
/// client's checkpoint, unless it already holds the candidate's content, in
/// which case nothing is written and nothing is reported. Anything at or
/// below the checkpoint is rewritten with a fresh version.
fn merge<E: Versioned>(
    conn: &rusqlite::Connection,
    owner: Uuid,
    checkpoint: Version,
    candidate: &Candidate<E::Input>,
    ledger: &mut ConflictLedger,
) -> ApiResult<E> {
    validate::check_category(conn, owner, E::KIND, candidate.id, &candidate.input)?;

    let existing = E::fetch(conn, owner, candidate.id)?;
    if let Some(server) = existing.as_ref().filter(|s| s.version() > checkpoint) {
        if server.holds(owner, &candidate.input) {
            tracing::debug!(kind = %E::KIND, id = %candidate.id, "already up to date");
            return Ok(server.clone());
        }
        tracing::warn!(
            kind = %E::KIND,
            id = %candidate.id,
            server_version = %server.version(),
            %checkpoint,
            "conflict, keeping server copy"
        );
        ledger.record(server, candidate)?;
        return Ok(server.clone());
    }

    let written = E::write(conn, owner, candidate.id, &candidate.input, existing.as_ref())?;
    tracing::debug!(kind = %E::KIND, id = %candidate.id, version = %written.version(), "accepted");
    Ok(written)
}
