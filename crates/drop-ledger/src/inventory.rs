//! In-memory [`InventorySource`] for tests, demos, and seeded deployments.

use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use drop_types::{ItemId, ItemMetadata};

use crate::error::InventoryError;
use crate::traits::{InventoryItem, InventorySource, Reservation};

#[derive(Clone, Debug)]
struct Token {
    id: ItemId,
    tag: String,
    metadata: ItemMetadata,
    owner: String,
    reservation: Option<Reservation>,
}

#[derive(Debug, Default)]
struct InventoryState {
    tokens: Vec<Token>,
    failing_reserves: usize,
    unavailable: bool,
    reserve_calls: u64,
    revoke_calls: u64,
}

/// Inventory held in memory. Tokens keep insertion order.
///
/// Reservations made through [`InventorySource::reserve`] are confirmed
/// immediately. Pending reservations and failures can be injected to
/// exercise crash recovery and commit-failure paths.
#[derive(Debug)]
pub struct InMemoryInventory {
    state: RwLock<InventoryState>,
}

impl InMemoryInventory {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(InventoryState::default()),
        }
    }

    /// Add a token owned by `owner`.
    pub fn mint(&self, id: ItemId, tag: impl Into<String>, metadata: ItemMetadata, owner: &str) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.tokens.push(Token {
            id,
            tag: tag.into(),
            metadata,
            owner: owner.to_string(),
            reservation: None,
        });
    }

    /// Move a token to another owner, as when a recipient collects it.
    /// Any reservation is dropped.
    pub fn transfer(&self, id: &ItemId, new_owner: &str) -> Result<(), InventoryError> {
        self.with_token(id, |token| {
            token.owner = new_owner.to_string();
            token.reservation = None;
        })
    }

    /// Overwrite a token's reservation directly.
    pub fn set_reservation(
        &self,
        id: &ItemId,
        reservation: Option<Reservation>,
    ) -> Result<(), InventoryError> {
        self.with_token(id, |token| token.reservation = reservation)
    }

    pub fn reservation(&self, id: &ItemId) -> Option<Reservation> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state
            .tokens
            .iter()
            .find(|t| &t.id == id)
            .and_then(|t| t.reservation.clone())
    }

    /// Make the next `count` reserve calls fail with
    /// [`InventoryError::Rejected`].
    pub fn fail_next_reserves(&self, count: usize) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .failing_reserves = count;
    }

    /// Make every call fail with [`InventoryError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .unavailable = unavailable;
    }

    pub fn reserve_calls(&self) -> u64 {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .reserve_calls
    }

    pub fn revoke_calls(&self) -> u64 {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .revoke_calls
    }

    fn with_token<R>(
        &self,
        id: &ItemId,
        f: impl FnOnce(&mut Token) -> R,
    ) -> Result<R, InventoryError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let token = state
            .tokens
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| InventoryError::NotFound(id.clone()))?;
        Ok(f(token))
    }

    fn check_available(state: &InventoryState) -> Result<(), InventoryError> {
        if state.unavailable {
            return Err(InventoryError::Unavailable("inventory offline".into()));
        }
        Ok(())
    }
}

impl Default for InMemoryInventory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InventorySource for InMemoryInventory {
    async fn list_owned_items(&self, owner: &str) -> Result<Vec<InventoryItem>, InventoryError> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Self::check_available(&state)?;
        Ok(state
            .tokens
            .iter()
            .filter(|t| t.owner == owner)
            .map(|t| InventoryItem {
                id: t.id.clone(),
                tag: t.tag.clone(),
                reservation: t.reservation.clone(),
            })
            .collect())
    }

    async fn reserve(&self, item: &ItemId, recipient: &str) -> Result<(), InventoryError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.reserve_calls += 1;
        Self::check_available(&state)?;
        if state.failing_reserves > 0 {
            state.failing_reserves -= 1;
            return Err(InventoryError::Rejected("reservation refused".into()));
        }
        let token = state
            .tokens
            .iter_mut()
            .find(|t| &t.id == item)
            .ok_or_else(|| InventoryError::NotFound(item.clone()))?;
        if let Some(existing) = &token.reservation {
            return Err(InventoryError::AlreadyReserved {
                item: item.clone(),
                recipient: existing.recipient.clone(),
            });
        }
        token.reservation = Some(Reservation::confirmed(recipient));
        Ok(())
    }

    async fn revoke(&self, item: &ItemId, recipient: &str) -> Result<(), InventoryError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.revoke_calls += 1;
        Self::check_available(&state)?;
        let token = state
            .tokens
            .iter_mut()
            .find(|t| &t.id == item)
            .ok_or_else(|| InventoryError::NotFound(item.clone()))?;
        match &token.reservation {
            Some(r) if r.recipient == recipient => {
                token.reservation = None;
                Ok(())
            }
            _ => Err(InventoryError::NotReserved {
                item: item.clone(),
                recipient: recipient.to_string(),
            }),
        }
    }

    async fn describe_item(&self, item: &ItemId) -> Result<ItemMetadata, InventoryError> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Self::check_available(&state)?;
        state
            .tokens
            .iter()
            .find(|t| &t.id == item)
            .map(|t| t.metadata.clone())
            .ok_or_else(|| InventoryError::NotFound(item.clone()))
    }
}
