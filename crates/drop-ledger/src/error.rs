use drop_store::StoreError;
use drop_types::{Category, ItemId, Namespace, TypeError};

/// Errors reported by an [`crate::InventorySource`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InventoryError {
    #[error("item not found: {0}")]
    NotFound(ItemId),

    #[error("item {item} is already reserved for {recipient}")]
    AlreadyReserved { item: ItemId, recipient: String },

    #[error("item {item} has no reservation for {recipient}")]
    NotReserved { item: ItemId, recipient: String },

    #[error("rejected by inventory: {0}")]
    Rejected(String),

    #[error("inventory unavailable: {0}")]
    Unavailable(String),
}

/// Errors produced by ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Malformed or missing identity keys or category.
    #[error("validation error: {0}")]
    Validation(#[from] TypeError),

    /// The identity verifier refused one of the keys.
    #[error("identity not eligible in namespace {0}")]
    NotEligible(Namespace),

    /// No unclaimed item left in the requested category.
    #[error("pool exhausted for category {0}")]
    PoolExhausted(Category),

    /// The inventory refused the reservation; the item was put back.
    #[error("external commit failed for item {item}: {source}")]
    ExternalCommitFailure {
        item: ItemId,
        #[source]
        source: InventoryError,
    },

    /// Identity indices disagree about which item a participant holds.
    #[error("inconsistent index state: {0}")]
    InconsistentIndexState(String),

    /// Inventory failure outside a claim (reconciliation).
    #[error("inventory error: {0}")]
    Inventory(#[from] InventoryError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// An operation reached the ledger before start-up reconciliation.
    #[error("ledger has not been started")]
    NotStarted,
}

impl LedgerError {
    /// Stable, coarse code suitable for returning to callers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NotEligible(_) => "not_eligible",
            Self::PoolExhausted(_) => "pool_exhausted",
            Self::ExternalCommitFailure { .. } => "external_commit_failure",
            Self::InconsistentIndexState(_) => "inconsistent_index_state",
            Self::Inventory(_) => "inventory_error",
            Self::Store(_) => "storage_error",
            Self::NotStarted => "not_started",
        }
    }

    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ExternalCommitFailure { .. } | Self::Inventory(_) | Self::NotStarted => true,
            Self::Store(StoreError::Io(_)) => true,
            _ => false,
        }
    }
}

/// Result alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
