use std::collections::BTreeMap;
use std::sync::Arc;

use drop_ledger::Partition;

use crate::auth::AdminSecret;
use crate::error::{ServerError, ServerResult};

/// Shared handler state: the campaign partitions and the admin secret.
#[derive(Clone, Debug)]
pub struct AppState {
    partitions: Arc<BTreeMap<String, Arc<Partition>>>,
    admin: AdminSecret,
}

impl AppState {
    pub fn new(partitions: impl IntoIterator<Item = Partition>, admin: AdminSecret) -> Self {
        let partitions = partitions
            .into_iter()
            .map(|p| (p.campaign().to_string(), Arc::new(p)))
            .collect();
        Self {
            partitions: Arc::new(partitions),
            admin,
        }
    }

    pub fn partition(&self, campaign: &str) -> ServerResult<&Arc<Partition>> {
        self.partitions
            .get(campaign)
            .ok_or_else(|| ServerError::CampaignNotFound(campaign.to_string()))
    }

    pub fn partitions(&self) -> impl Iterator<Item = &Arc<Partition>> {
        self.partitions.values()
    }

    pub fn admin(&self) -> &AdminSecret {
        &self.admin
    }
}
