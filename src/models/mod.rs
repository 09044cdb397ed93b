mod budget;
mod category;
mod sync;
mod transaction;
mod user;
mod version;

pub use budget::{Budget, BudgetInput, BudgetView};
pub use category::{Category, CategoryInput};
pub use sync::{Candidate, EntityKind, SyncAttempt, SyncStatus};
pub use transaction::{Transaction, TransactionInput, TransactionSource, TransactionType};
pub use user::{Profile, Settings, Theme, User};
pub use version::Version;

use uuid::Uuid;

/// Client-editable fields of a versioned entity.
pub trait EntityInput {
    fn category_id(&self) -> Uuid;

    /// Stateless well-formedness check. Store-dependent rules (category
    /// visibility, ownership) are enforced by the caller.
    fn check(&self) -> Result<(), String>;
}

pub type TransactionCandidate = Candidate<TransactionInput>;
pub type BudgetCandidate = Candidate<BudgetInput>;
