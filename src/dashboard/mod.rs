//! Read-side summary of a user's finances.

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::db::{self, Database, TransactionFilter};
use crate::error::{ApiError, ApiResult};
use crate::models::{BudgetView, Transaction, TransactionType};

pub(crate) const RECENT_LIMIT: usize = 5;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Dashboard {
    #[serde(with = "rust_decimal::serde::str")]
    pub total_income: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub total_expenses: Decimal,
    pub budgets: Vec<BudgetView>,
    pub recent_transactions: Vec<Transaction>,
}

impl Dashboard {
    /// Income minus expenses, `None` if it does not fit in a `Decimal`.
    pub(crate) fn net(&self) -> Option<Decimal> {
        self.total_income.checked_sub(self.total_expenses)
    }
}

/// Income and expense totals, summed exactly. Fails when a running total
/// leaves the `Decimal` range.
pub(crate) fn totals<'a>(
    transactions: impl IntoIterator<Item = &'a Transaction>,
) -> ApiResult<(Decimal, Decimal)> {
    transactions
        .into_iter()
        .try_fold((Decimal::ZERO, Decimal::ZERO), |(income, expenses), t| {
            let sum = match t.kind {
                TransactionType::Income => income.checked_add(t.amount).map(|i| (i, expenses)),
                TransactionType::Expense => expenses.checked_add(t.amount).map(|e| (income, e)),
            };
            sum.ok_or_else(|| {
                ApiError::validation(format!("{} total out of range at transaction {}", t.kind, t.id))
            })
        })
}

pub(crate) fn build(db: &mut Database, caller: Option<Uuid>) -> ApiResult<Dashboard> {
    let owner = caller.ok_or(ApiError::Unauthenticated)?;

    // one snapshot for transactions and budgets
    let tx = db.begin_read()?;
    // newest first
    let transactions = db::select_transactions(&tx, owner, &TransactionFilter::default())?;
    let budgets = db::select_budget_views(&tx, owner)?;
    tx.commit()?;

    let (total_income, total_expenses) = totals(&transactions)?;

    let recent_transactions = transactions.into_iter().take(RECENT_LIMIT).collect();

    tracing::debug!(
        user = %owner,
        %total_income,
        %total_expenses,
        budgets = budgets.len(),
        "built dashboard"
    );

    Ok(Dashboard {
        total_income,
        total_expenses,
        budgets,
        recent_transactions,
    })
}
