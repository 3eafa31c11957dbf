use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

use drop_ledger::{DropLedger, InMemoryInventory, LedgerConfig, Partition};
use drop_store::{FileKvStore, InMemoryKvStore, KvStore};
use drop_types::{ItemId, ItemMetadata};

use crate::auth::AdminSecret;
use crate::config::{CampaignConfig, ServerConfig};
use crate::error::{ServerError, ServerResult};
use crate::router::build_router;
use crate::state::AppState;

/// Drop allocation server hosting one partition per configured campaign.
pub struct DropServer {
    config: ServerConfig,
    state: AppState,
}

impl DropServer {
    /// Open every campaign's store and seed its inventory. Ledgers start on
    /// their first request, or on [`DropServer::warm_up`].
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        config.validate()?;
        let partitions = config
            .campaigns
            .iter()
            .map(|campaign| build_partition(&config, campaign))
            .collect::<ServerResult<Vec<_>>>()?;
        let state = AppState::new(partitions, AdminSecret::new(config.admin_secret.as_deref()));
        Ok(Self { config, state })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(self.state.clone())
    }

    /// Start every campaign ledger. Failures are logged; the affected
    /// campaign retries on its next request.
    pub async fn warm_up(&self) {
        for partition in self.state.partitions() {
            match partition.warm_up().await {
                Ok(()) => info!(campaign = %partition.campaign(), "campaign ready"),
                Err(e) => warn!(campaign = %partition.campaign(), error = %e, "campaign failed to start; will retry on demand"),
            }
        }
    }

    /// Start serving requests.
    pub async fn serve(self) -> ServerResult<()> {
        self.warm_up().await;
        let app = self.router();
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!(
            campaigns = self.config.campaigns.len(),
            "drop server listening on {}", self.config.bind_addr
        );
        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}

fn build_partition(config: &ServerConfig, campaign: &CampaignConfig) -> ServerResult<Partition> {
    let store: Arc<dyn KvStore> = match &config.data_dir {
        Some(root) => Arc::new(FileKvStore::open_with_max_value_size(
            root.join(&campaign.name),
            config.max_value_size,
        )?),
        None => Arc::new(InMemoryKvStore::with_max_value_size(config.max_value_size)),
    };

    let inventory = InMemoryInventory::new();
    for seed in &campaign.items {
        let id = ItemId::new(seed.id.as_str()).map_err(|e| {
            ServerError::Config(format!("campaign {}: {e}", campaign.name))
        })?;
        let metadata = ItemMetadata {
            title: seed.title.clone(),
            description: seed.description.clone(),
            media: seed.media.clone(),
            ..Default::default()
        };
        inventory.mint(id, seed.tag.as_str(), metadata, &campaign.owner_account);
    }

    let ledger = DropLedger::new(
        LedgerConfig {
            campaign: campaign.name.clone(),
            owner_account: campaign.owner_account.clone(),
            chunk_size: config.chunk_size,
        },
        store,
        Arc::new(inventory),
        Arc::new(campaign.allow.verifier()),
    );
    Ok(Partition::new(ledger))
}
