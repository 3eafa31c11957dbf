use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Identifier of a unique distributable item (token id on the inventory).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(TypeError::InvalidItemId {
                value: id,
                reason: "empty".into(),
            });
        }
        if id.chars().any(char::is_control) {
            return Err(TypeError::InvalidItemId {
                value: id,
                reason: "contains control characters".into(),
            });
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ItemId({})", self.0)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A tag partitioning the item pool into disjoint sub-pools.
///
/// Categories are lowercase ASCII `[a-z0-9_-]`, 1 to 64 characters long.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Category(String);

impl Category {
    pub const MAX_LEN: usize = 64;

    /// Parse a category from a caller-supplied string. Surrounding
    /// whitespace is trimmed and ASCII letters are lowercased.
    pub fn parse(raw: &str) -> Result<Self, TypeError> {
        let value = raw.trim().to_ascii_lowercase();
        let invalid = |reason: &str| TypeError::InvalidCategory {
            value: raw.to_string(),
            reason: reason.to_string(),
        };
        if value.is_empty() {
            return Err(invalid("empty"));
        }
        if value.len() > Self::MAX_LEN {
            return Err(invalid("too long"));
        }
        if !value
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_')
        {
            return Err(invalid("only [a-z0-9_-] allowed"));
        }
        Ok(Self(value))
    }

    /// Derive a category from an inventory tag.
    ///
    /// Tags may be namespaced (`"drop/small"`, `"series:small"`); the last
    /// segment names the category.
    pub fn from_tag(tag: &str) -> Result<Self, TypeError> {
        let segment = tag
            .rsplit(['/', ':'])
            .next()
            .unwrap_or(tag);
        Self::parse(segment)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Category {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.0
    }
}

impl fmt::Debug for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Category({})", self.0)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Descriptive metadata reported by the inventory for one item.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl ItemMetadata {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }
}

/// A unique distributable item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub category: Category,
    #[serde(default)]
    pub metadata: ItemMetadata,
}

impl Item {
    pub fn new(id: ItemId, category: Category, metadata: ItemMetadata) -> Self {
        Self {
            id,
            category,
            metadata,
        }
    }
}
