use std::collections::HashMap;

use drop_types::{Assignment, IdentityKeys, Namespace};
use tracing::error;

use crate::error::{LedgerError, LedgerResult};

/// Three identity → assignment maps, one per [`Namespace`].
///
/// Every committed assignment appears once in each map. The maps are
/// denormalized views, so a lookup from any single key is O(1); the price is
/// that they can disagree, which [`IdentityIndices::lookup`] reports instead
/// of resolving.
#[derive(Clone, Debug, Default)]
pub struct IdentityIndices {
    maps: [HashMap<String, Assignment>; 3],
}

impl IdentityIndices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, namespace: Namespace, key: &str) -> Option<&Assignment> {
        self.maps[namespace.index()].get(key)
    }

    /// Number of assignments indexed.
    pub fn len(&self) -> usize {
        self.maps[Namespace::Wallet.index()].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find the assignment held by whoever owns the supplied keys.
    ///
    /// Returns `Ok(None)` if no supplied key is indexed, the assignment if
    /// every indexed key agrees on the item, and
    /// [`LedgerError::InconsistentIndexState`] otherwise.
    pub fn lookup(&self, keys: &IdentityKeys) -> LedgerResult<Option<Assignment>> {
        let mut found: Option<(Namespace, &Assignment)> = None;
        for (namespace, key) in keys.supplied()? {
            let Some(candidate) = self.get(namespace, key) else {
                continue;
            };
            match found {
                None => found = Some((namespace, candidate)),
                Some((first_ns, first)) if first.item_id != candidate.item_id => {
                    error!(
                        first_namespace = %first_ns,
                        first_item = %first.item_id,
                        namespace = %namespace,
                        item = %candidate.item_id,
                        "identity indices disagree"
                    );
                    return Err(LedgerError::InconsistentIndexState(format!(
                        "{first_ns} index holds {} but {namespace} index holds {}",
                        first.item_id, candidate.item_id
                    )));
                }
                Some(_) => {}
            }
        }
        Ok(found.map(|(_, assignment)| assignment.clone()))
    }

    /// Index an assignment under all three of its keys.
    ///
    /// Fails without modifying anything if any key is already bound to a
    /// different item.
    pub fn insert(&mut self, assignment: &Assignment) -> LedgerResult<()> {
        for (namespace, key) in assignment.keys.iter() {
            if let Some(existing) = self.get(namespace, key) {
                if existing.item_id != assignment.item_id {
                    return Err(LedgerError::InconsistentIndexState(format!(
                        "{namespace} key already holds {}, cannot bind {}",
                        existing.item_id, assignment.item_id
                    )));
                }
            }
        }
        for (namespace, key) in assignment.keys.iter() {
            self.maps[namespace.index()].insert(key.to_string(), assignment.clone());
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Assignment> {
        self.maps[Namespace::Wallet.index()].values()
    }
}
