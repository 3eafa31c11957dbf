//! Rebuilding the available pool from the inventory.
//!
//! [`reconcile`] is pure: it takes what the inventory reports and what the
//! ledger has committed, and returns what to do about it. Applying the
//! result (revoking, deleting, installing the pool) is the caller's job.
//!
//! Decision table for each owned item, keyed by its reservation and the
//! committed assignment for it, if any:
//!
//! | reservation            | committed assignment       | outcome                         |
//! |------------------------|----------------------------|---------------------------------|
//! | pending                | any                        | revoke, delete assignment, pool |
//! | confirmed, recipient R | held by R                  | keep assignment, not pooled     |
//! | confirmed, recipient R | none, or held by someone else | revoke, delete assignment, pool |
//! | none                   | present                    | keep assignment, not pooled     |
//! | none                   | none                       | pool                            |
//!
//! Items whose category tag is unusable follow the same rules but are never
//! pooled. Committed assignments whose item is no longer owned were
//! collected by their recipient and are kept.

use std::collections::{HashMap, HashSet};

use drop_types::{Assignment, Item, ItemId};
use tracing::warn;

use crate::error::{LedgerError, LedgerResult};
use crate::pool::AvailablePool;
use crate::traits::Reservation;

/// An item the campaign account owns, as reported by the inventory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnedItem {
    pub id: ItemId,
    /// The item with category and metadata resolved; `None` if its tag names
    /// no usable category.
    pub item: Option<Item>,
    pub reservation: Option<Reservation>,
}

impl OwnedItem {
    pub fn new(item: Item, reservation: Option<Reservation>) -> Self {
        Self {
            id: item.id.clone(),
            item: Some(item),
            reservation,
        }
    }

    /// An owned item that can never be pooled.
    pub fn unusable(id: ItemId, reservation: Option<Reservation>) -> Self {
        Self {
            id,
            item: None,
            reservation,
        }
    }
}

/// A reservation to withdraw on the inventory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Revocation {
    pub item_id: ItemId,
    pub recipient: String,
}

/// The outcome of [`reconcile`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub pool: AvailablePool,
    pub revocations: Vec<Revocation>,
    /// Committed assignments that must be removed.
    pub deletions: Vec<Assignment>,
    /// Committed assignments that stay, in their committed order.
    pub retained: Vec<Assignment>,
}

/// Derive the pool and the repair actions from the inventory's view and the
/// committed assignments.
///
/// Fails with [`LedgerError::InconsistentIndexState`] if two committed
/// assignments name the same item.
pub fn reconcile(owned: &[OwnedItem], committed: &[Assignment]) -> LedgerResult<Reconciliation> {
    let mut by_item: HashMap<&ItemId, &Assignment> = HashMap::with_capacity(committed.len());
    for assignment in committed {
        if by_item.insert(&assignment.item_id, assignment).is_some() {
            return Err(LedgerError::InconsistentIndexState(format!(
                "item {} is committed more than once",
                assignment.item_id
            )));
        }
    }

    let mut result = Reconciliation::default();
    let mut deleted: HashSet<&ItemId> = HashSet::new();
    let mut seen: HashSet<&ItemId> = HashSet::new();

    for owned_item in owned {
        let id = &owned_item.id;
        if !seen.insert(id) {
            warn!(item = %id, "inventory listed item twice; ignoring duplicate");
            continue;
        }
        if let Some(item) = &owned_item.item {
            result.pool.ensure_category(&item.category);
        }
        let assignment = by_item.get(id).copied();

        match (&owned_item.reservation, assignment) {
            (Some(reservation), Some(a))
                if !reservation.is_pending() && reservation.recipient == a.recipient() => {}
            (Some(reservation), assignment) => {
                result.revocations.push(Revocation {
                    item_id: id.clone(),
                    recipient: reservation.recipient.clone(),
                });
                if let Some(a) = assignment {
                    deleted.insert(&a.item_id);
                    result.deletions.push(a.clone());
                }
                result.pool.extend(owned_item.item.clone());
            }
            (None, Some(a)) => {
                warn!(
                    item = %id,
                    recipient = %a.recipient(),
                    "committed item has no reservation on the inventory; keeping assignment"
                );
            }
            (None, None) => result.pool.extend(owned_item.item.clone()),
        }
    }

    result.retained = committed
        .iter()
        .filter(|a| !deleted.contains(&a.item_id))
        .cloned()
        .collect();
    for a in &result.retained {
        result.pool.ensure_category(&a.category);
    }

    Ok(result)
}
