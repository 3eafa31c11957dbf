use std::collections::BTreeMap;

use drop_types::{Category, Item, ItemId};

/// Unclaimed items bucketed by category.
///
/// Each bucket is a stack: [`AvailablePool::pop`] takes the most recently
/// pushed item. A category stays listed after its last item is taken so
/// that exhausted categories still report a count of zero.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AvailablePool {
    buckets: BTreeMap<Category, Vec<Item>>,
}

impl AvailablePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// List `category` even if it has no items.
    pub fn ensure_category(&mut self, category: &Category) {
        self.buckets.entry(category.clone()).or_default();
    }

    pub fn push(&mut self, item: Item) {
        self.buckets
            .entry(item.category.clone())
            .or_default()
            .push(item);
    }

    /// Push every item yielded, in order.
    pub fn extend(&mut self, items: impl IntoIterator<Item = Item>) {
        for item in items {
            self.push(item);
        }
    }

    pub fn pop(&mut self, category: &Category) -> Option<Item> {
        self.buckets.get_mut(category)?.pop()
    }

    pub fn remaining(&self, category: &Category) -> usize {
        self.buckets.get(category).map_or(0, Vec::len)
    }

    pub fn items(&self, category: &Category) -> &[Item] {
        self.buckets
            .get(category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.buckets
            .values()
            .any(|bucket| bucket.iter().any(|item| &item.id == id))
    }

    /// Remaining count per category, including exhausted ones.
    pub fn counts(&self) -> BTreeMap<Category, usize> {
        self.buckets
            .iter()
            .map(|(category, bucket)| (category.clone(), bucket.len()))
            .collect()
    }

    pub fn total(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }
}
