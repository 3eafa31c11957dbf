use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use drop_types::{ItemId, ItemMetadata, Namespace};

use crate::error::InventoryError;

/// Whether the inventory considers a reservation final.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    /// Submitted but not finalized; left behind by an interrupted claim.
    Pending,
    /// Finalized by the inventory.
    Confirmed,
}

/// An outstanding reservation of an item for a recipient.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub recipient: String,
    pub status: ReservationStatus,
}

impl Reservation {
    pub fn pending(recipient: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            status: ReservationStatus::Pending,
        }
    }

    pub fn confirmed(recipient: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            status: ReservationStatus::Confirmed,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ReservationStatus::Pending
    }
}

/// One item as enumerated by the inventory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: ItemId,
    /// Raw category tag; parsed with [`drop_types::Category::from_tag`].
    pub tag: String,
    pub reservation: Option<Reservation>,
}

/// The authoritative external ledger of items.
///
/// `reserve` is the commit signal of a claim: once it succeeds the item is
/// promised to the recipient on the inventory, whatever happens locally.
#[async_trait]
pub trait InventorySource: Send + Sync {
    /// Items currently owned by the distributing account.
    async fn list_owned_items(&self, owner: &str) -> Result<Vec<InventoryItem>, InventoryError>;

    /// Reserve an item for a recipient.
    async fn reserve(&self, item: &ItemId, recipient: &str) -> Result<(), InventoryError>;

    /// Withdraw a reservation previously made for a recipient.
    async fn revoke(&self, item: &ItemId, recipient: &str) -> Result<(), InventoryError>;

    /// Descriptive metadata for an item.
    async fn describe_item(&self, item: &ItemId) -> Result<ItemMetadata, InventoryError>;
}

/// Per-namespace eligibility check. Only the boolean outcome matters here;
/// implementations decide what "eligible" means.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn is_eligible(&self, key: &str, namespace: Namespace) -> bool;
}
