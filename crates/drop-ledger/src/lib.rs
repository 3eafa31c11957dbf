//! Exactly-once allocation of unique items to claimants.
//!
//! A campaign distributes items owned by one inventory account. Each claimant
//! is identified by three keys (wallet, Discord, Twitter) and receives at
//! most one item, whichever of their keys they present. This crate provides:
//! - `InventorySource` / `IdentityVerifier` trait boundaries, with in-memory
//!   implementations for tests and seeded deployments
//! - `AvailablePool` and `IdentityIndices`, the in-memory allocation state
//! - `reconcile`, the pure rebuild of that state from the inventory
//! - `DropLedger`, the single-writer state machine over a `KvStore`
//! - `Partition`, which starts a ledger once and serializes its requests
//!
//! # Design Rules
//!
//! 1. No item is ever bound to two claimants, and no claimant to two items.
//! 2. A claim is acknowledged only after the inventory reserved the item and
//!    the assignment is durable.
//! 3. Every start reconciles with the inventory before serving anything.

pub mod error;
pub mod index;
pub mod init;
pub mod inventory;
pub mod ledger;
pub mod partition;
pub mod pool;
pub mod reconcile;
pub mod traits;
pub mod verifier;

pub use error::{InventoryError, LedgerError, LedgerResult};
pub use index::IdentityIndices;
pub use init::InitOnce;
pub use inventory::InMemoryInventory;
pub use ledger::{
    index_key, ClaimOutcome, DropLedger, Eligibility, LedgerConfig, PoolInfo, StartReport,
    CLAIMS_COLLECTION, INDEX_PREFIX, ITEMS_COLLECTION,
};
pub use partition::{CheckOutcome, Partition};
pub use pool::AvailablePool;
pub use reconcile::{reconcile, OwnedItem, Reconciliation, Revocation};
pub use traits::{IdentityVerifier, InventoryItem, InventorySource, Reservation, ReservationStatus};
pub use verifier::{AllowAllVerifier, AllowListVerifier};
