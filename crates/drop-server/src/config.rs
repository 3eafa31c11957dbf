use std::collections::HashSet;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use drop_ledger::AllowListVerifier;
use drop_store::{DEFAULT_CHUNK_SIZE, DEFAULT_MAX_VALUE_SIZE};
use drop_types::Namespace;

use crate::error::{ServerError, ServerResult};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Root of the file-backed stores, one subdirectory per campaign.
    /// Without it every campaign is kept in memory.
    pub data_dir: Option<PathBuf>,
    /// Secret required by the reset and resync endpoints. Without it both
    /// are refused.
    pub admin_secret: Option<String>,
    pub chunk_size: usize,
    pub max_value_size: usize,
    pub campaigns: Vec<CampaignConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8787)),
            data_dir: None,
            admin_secret: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_value_size: DEFAULT_MAX_VALUE_SIZE,
            campaigns: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn from_toml_str(text: &str) -> ServerResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> ServerResult<()> {
        if self.chunk_size == 0 {
            return Err(ServerError::Config("chunk_size must be positive".into()));
        }
        let mut names = HashSet::new();
        for campaign in &self.campaigns {
            campaign.validate()?;
            if !names.insert(campaign.name.as_str()) {
                return Err(ServerError::Config(format!(
                    "duplicate campaign: {}",
                    campaign.name
                )));
            }
        }
        Ok(())
    }

    pub fn campaign(&self, name: &str) -> Option<&CampaignConfig> {
        self.campaigns.iter().find(|c| c.name == name)
    }
}

/// One campaign: the account whose items are distributed and the items it
/// starts out owning.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CampaignConfig {
    /// Used in URLs and as the store directory name.
    pub name: String,
    pub owner_account: String,
    #[serde(default)]
    pub items: Vec<SeedItem>,
    #[serde(default)]
    pub allow: AllowLists,
}

impl CampaignConfig {
    fn validate(&self) -> ServerResult<()> {
        let valid_name = !self.name.is_empty()
            && self
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid_name {
            return Err(ServerError::Config(format!(
                "invalid campaign name {:?}: use letters, digits, '-' and '_'",
                self.name
            )));
        }
        if self.owner_account.trim().is_empty() {
            return Err(ServerError::Config(format!(
                "campaign {} has no owner_account",
                self.name
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedItem {
    pub id: String,
    pub tag: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub media: Option<String>,
}

/// Optional per-namespace allow-lists. An absent list admits every key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowLists {
    #[serde(default)]
    pub wallet: Option<Vec<String>>,
    #[serde(default)]
    pub discord: Option<Vec<String>>,
    #[serde(default)]
    pub twitter: Option<Vec<String>>,
}

impl AllowLists {
    pub fn verifier(&self) -> AllowListVerifier {
        let mut verifier = AllowListVerifier::new();
        for (namespace, list) in [
            (Namespace::Wallet, &self.wallet),
            (Namespace::Discord, &self.discord),
            (Namespace::Twitter, &self.twitter),
        ] {
            if let Some(keys) = list {
                verifier = verifier.restrict(namespace, keys.iter().cloned());
            }
        }
        verifier
    }
}
