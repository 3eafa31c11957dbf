use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::ClaimantKeys;
use crate::item::{Category, Item, ItemId, ItemMetadata};

/// The binding of one item to one complete identity-key triple.
///
/// Created exactly once per successful claim and never modified afterward.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub item_id: ItemId,
    pub category: Category,
    #[serde(default)]
    pub metadata: ItemMetadata,
    pub keys: ClaimantKeys,
    pub claimed_at: DateTime<Utc>,
}

impl Assignment {
    pub fn new(item: Item, keys: ClaimantKeys, claimed_at: DateTime<Utc>) -> Self {
        Self {
            item_id: item.id,
            category: item.category,
            metadata: item.metadata,
            keys,
            claimed_at,
        }
    }

    /// The account the item is reserved for on the inventory.
    pub fn recipient(&self) -> &str {
        &self.keys.wallet
    }

    /// Reconstruct the item this assignment was made from.
    pub fn to_item(&self) -> Item {
        Item::new(
            self.item_id.clone(),
            self.category.clone(),
            self.metadata.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::IdentityKeys;

    #[test]
    fn assignment_carries_item_and_keys() {
        let item = Item::new(
            ItemId::new("itemB").unwrap(),
            Category::parse("small").unwrap(),
            ItemMetadata::titled("B"),
        );
        let keys = IdentityKeys::new("w1", "d1", "t1").complete().unwrap();
        let a = Assignment::new(item.clone(), keys, Utc::now());
        assert_eq!(a.item_id.as_str(), "itemB");
        assert_eq!(a.recipient(), "w1");
        assert_eq!(a.to_item(), item);
    }

    #[test]
    fn serde_roundtrip() {
        let item = Item::new(
            ItemId::new("x").unwrap(),
            Category::parse("large").unwrap(),
            ItemMetadata::default(),
        );
        let keys = IdentityKeys::new("w", "d", "t").complete().unwrap();
        let a = Assignment::new(item, keys, Utc::now());
        let json = serde_json::to_string(&a).unwrap();
        let parsed: Assignment = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, a);
    }
}
