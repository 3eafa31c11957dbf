use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Longest identity key accepted from a caller, in bytes.
pub const MAX_KEY_LEN: usize = 256;

/// One of the independent identification systems a participant is known by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    Wallet,
    Discord,
    Twitter,
}

impl Namespace {
    /// All namespaces, in index order.
    pub const ALL: [Namespace; 3] = [Namespace::Wallet, Namespace::Discord, Namespace::Twitter];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wallet => "wallet",
            Self::Discord => "discord",
            Self::Twitter => "twitter",
        }
    }

    /// Position of this namespace inside [`Namespace::ALL`].
    pub fn index(&self) -> usize {
        match self {
            Self::Wallet => 0,
            Self::Discord => 1,
            Self::Twitter => 2,
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Namespace {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wallet" => Ok(Self::Wallet),
            "discord" => Ok(Self::Discord),
            "twitter" => Ok(Self::Twitter),
            other => Err(TypeError::UnknownNamespace(other.to_string())),
        }
    }
}

/// Identity keys as supplied by a caller. Any subset may be present.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityKeys {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discord: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
}

impl IdentityKeys {
    pub fn new(
        wallet: impl Into<String>,
        discord: impl Into<String>,
        twitter: impl Into<String>,
    ) -> Self {
        Self {
            wallet: Some(wallet.into()),
            discord: Some(discord.into()),
            twitter: Some(twitter.into()),
        }
    }

    pub fn get(&self, namespace: Namespace) -> Option<&str> {
        match namespace {
            Namespace::Wallet => self.wallet.as_deref(),
            Namespace::Discord => self.discord.as_deref(),
            Namespace::Twitter => self.twitter.as_deref(),
        }
    }

    /// Validate every supplied key and return them paired with their
    /// namespace. Fails if no key was supplied at all.
    pub fn supplied(&self) -> Result<Vec<(Namespace, &str)>, TypeError> {
        let mut keys = Vec::with_capacity(3);
        for namespace in Namespace::ALL {
            if let Some(key) = self.get(namespace) {
                validate_key(namespace, key)?;
                keys.push((namespace, key));
            }
        }
        if keys.is_empty() {
            return Err(TypeError::NoKeys);
        }
        Ok(keys)
    }

    /// Require all three keys and validate them.
    pub fn complete(&self) -> Result<ClaimantKeys, TypeError> {
        let take = |namespace: Namespace| -> Result<String, TypeError> {
            let key = self
                .get(namespace)
                .ok_or(TypeError::MissingKey(namespace.as_str()))?;
            validate_key(namespace, key)?;
            Ok(key.to_string())
        };
        Ok(ClaimantKeys {
            wallet: take(Namespace::Wallet)?,
            discord: take(Namespace::Discord)?,
            twitter: take(Namespace::Twitter)?,
        })
    }
}

impl From<&ClaimantKeys> for IdentityKeys {
    fn from(keys: &ClaimantKeys) -> Self {
        Self::new(&keys.wallet, &keys.discord, &keys.twitter)
    }
}

/// A complete key triple, as bound to an [`crate::Assignment`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClaimantKeys {
    pub wallet: String,
    pub discord: String,
    pub twitter: String,
}

impl ClaimantKeys {
    pub fn get(&self, namespace: Namespace) -> &str {
        match namespace {
            Namespace::Wallet => &self.wallet,
            Namespace::Discord => &self.discord,
            Namespace::Twitter => &self.twitter,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Namespace, &str)> + '_ {
        Namespace::ALL.into_iter().map(move |ns| (ns, self.get(ns)))
    }
}

fn validate_key(namespace: Namespace, key: &str) -> Result<(), TypeError> {
    let invalid = |reason: &str| TypeError::InvalidKey {
        namespace: namespace.as_str(),
        reason: reason.to_string(),
    };
    if key.trim().is_empty() {
        return Err(invalid("empty"));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(invalid("too long"));
    }
    if key.chars().any(char::is_control) {
        return Err(invalid("contains control characters"));
    }
    Ok(())
}
