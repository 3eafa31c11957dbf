//! One campaign's ledger behind its single-writer gate.

use tokio::sync::{Mutex, MutexGuard};
use tracing::info;

use drop_types::{Assignment, Category, IdentityKeys};

use crate::error::{LedgerError, LedgerResult};
use crate::init::InitOnce;
use crate::ledger::{ClaimOutcome, DropLedger, Eligibility, PoolInfo, StartReport};

/// Answer to a check: the claimant's assignment, if any, and the verifier's
/// view of each supplied key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckOutcome {
    pub assignment: Option<Assignment>,
    pub eligibility: Eligibility,
}

/// A [`DropLedger`] that starts itself on first use and processes one
/// request at a time.
///
/// Requests that arrive during the first start wait for it rather than
/// starting the ledger again. If the ledger later stops being started (after
/// [`Partition::reset`] or a failed [`Partition::resync`]) the next request
/// starts it under the lock.
pub struct Partition {
    campaign: String,
    init: InitOnce<()>,
    ledger: Mutex<DropLedger>,
}

impl Partition {
    pub fn new(ledger: DropLedger) -> Self {
        Self {
            campaign: ledger.config().campaign.clone(),
            init: InitOnce::new(),
            ledger: Mutex::new(ledger),
        }
    }

    pub fn campaign(&self) -> &str {
        &self.campaign
    }

    async fn ready(&self) -> LedgerResult<MutexGuard<'_, DropLedger>> {
        self.init
            .get_or_try_init(|| async {
                let mut ledger = self.ledger.lock().await;
                if !ledger.is_started() {
                    ledger.start().await?;
                }
                Ok::<_, LedgerError>(())
            })
            .await?;

        let mut ledger = self.ledger.lock().await;
        if !ledger.is_started() {
            info!(campaign = %self.campaign, "restarting ledger");
            ledger.start().await?;
        }
        Ok(ledger)
    }

    pub async fn info(&self) -> LedgerResult<PoolInfo> {
        self.ready().await?.info()
    }

    pub async fn check(&self, keys: &IdentityKeys) -> LedgerResult<CheckOutcome> {
        let ledger = self.ready().await?;
        let assignment = ledger.check(keys)?;
        let eligibility = ledger.eligibility(keys).await?;
        Ok(CheckOutcome {
            assignment,
            eligibility,
        })
    }

    pub async fn claim(
        &self,
        keys: &IdentityKeys,
        category: &Category,
    ) -> LedgerResult<ClaimOutcome> {
        self.ready().await?.claim(keys, category).await
    }

    /// Wipe the partition's durable state. The next request reconciles from
    /// the inventory again.
    pub async fn reset(&self) -> LedgerResult<()> {
        self.ledger.lock().await.reset()
    }

    pub async fn resync(&self) -> LedgerResult<StartReport> {
        let mut ledger = self.ledger.lock().await;
        ledger.resync().await
    }

    /// Start the ledger now instead of on the first request.
    pub async fn warm_up(&self) -> LedgerResult<()> {
        self.ready().await.map(|_| ())
    }
}

impl std::fmt::Debug for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Partition")
            .field("campaign", &self.campaign)
            .field("init", &self.init)
            .finish()
    }
}
