use std::collections::HashSet;

use async_trait::async_trait;

use drop_types::Namespace;

use crate::traits::IdentityVerifier;

/// Treats every key as eligible.
pub struct AllowAllVerifier;

#[async_trait]
impl IdentityVerifier for AllowAllVerifier {
    async fn is_eligible(&self, _key: &str, _namespace: Namespace) -> bool {
        true
    }
}

/// Static allow-lists per namespace. A namespace without a list is
/// unrestricted.
#[derive(Clone, Debug, Default)]
pub struct AllowListVerifier {
    lists: [Option<HashSet<String>>; 3],
}

impl AllowListVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict `namespace` to exactly the given keys.
    pub fn restrict<I, S>(mut self, namespace: Namespace, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lists[namespace.index()] = Some(keys.into_iter().map(Into::into).collect());
        self
    }
}

#[async_trait]
impl IdentityVerifier for AllowListVerifier {
    async fn is_eligible(&self, key: &str, namespace: Namespace) -> bool {
        match &self.lists[namespace.index()] {
            Some(allowed) => allowed.contains(key),
            None => true,
        }
    }
}
