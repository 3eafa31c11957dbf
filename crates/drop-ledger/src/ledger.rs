//! The drop allocation ledger of one campaign.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use drop_store::{read_json, write_json, KvStore, ShardedList, DEFAULT_CHUNK_SIZE};
use drop_types::{Assignment, Category, IdentityKeys, Item, ItemId, Namespace};

use crate::error::{InventoryError, LedgerError, LedgerResult};
use crate::index::IdentityIndices;
use crate::pool::AvailablePool;
use crate::reconcile::{reconcile, OwnedItem};
use crate::traits::{IdentityVerifier, InventorySource};

/// Sharded catalog of items last seen in the inventory.
pub const ITEMS_COLLECTION: &str = "items";
/// Sharded list of committed assignments.
pub const CLAIMS_COLLECTION: &str = "claims";
/// Prefix of per-key identity index records.
pub const INDEX_PREFIX: &str = "idx:";

/// Storage key of the index record for one identity key.
pub fn index_key(namespace: Namespace, key: &str) -> String {
    format!("{INDEX_PREFIX}{namespace}:{key}")
}

fn parse_index_key(key: &str) -> Option<(Namespace, &str)> {
    let (namespace, identity) = key.strip_prefix(INDEX_PREFIX)?.split_once(':')?;
    Some((namespace.parse().ok()?, identity))
}

/// Configuration for a [`DropLedger`].
#[derive(Clone, Debug)]
pub struct LedgerConfig {
    /// Campaign name, used in logs.
    pub campaign: String,
    /// Inventory account that owns the items being distributed.
    pub owner_account: String,
    /// Maximum entries per chunk of the sharded collections.
    pub chunk_size: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            campaign: "default".into(),
            owner_account: String::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Per-namespace verdicts of the identity verifier. Namespaces whose key
/// was not supplied are `None`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eligibility {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discord: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter: Option<bool>,
}

impl Eligibility {
    pub fn get(&self, namespace: Namespace) -> Option<bool> {
        match namespace {
            Namespace::Wallet => self.wallet,
            Namespace::Discord => self.discord,
            Namespace::Twitter => self.twitter,
        }
    }

    fn set(&mut self, namespace: Namespace, eligible: bool) {
        let slot = match namespace {
            Namespace::Wallet => &mut self.wallet,
            Namespace::Discord => &mut self.discord,
            Namespace::Twitter => &mut self.twitter,
        };
        *slot = Some(eligible);
    }
}

/// Result of a successful [`DropLedger::claim`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// A new item was reserved and committed for the claimant.
    Allocated(Assignment),
    /// The claimant already held this assignment; nothing changed.
    AlreadyClaimed(Assignment),
}

impl ClaimOutcome {
    pub fn assignment(&self) -> &Assignment {
        match self {
            Self::Allocated(a) | Self::AlreadyClaimed(a) => a,
        }
    }

    pub fn into_assignment(self) -> Assignment {
        match self {
            Self::Allocated(a) | Self::AlreadyClaimed(a) => a,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Self::Allocated(_))
    }
}

/// Snapshot of pool and claim counts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolInfo {
    /// Remaining items per category, exhausted categories included.
    pub categories: BTreeMap<Category, usize>,
    pub claimed: usize,
    pub unclaimed: usize,
}

/// What a start-up reconciliation did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartReport {
    /// Items placed in the pool.
    pub available: usize,
    /// Committed assignments kept.
    pub retained: usize,
    /// Reservations withdrawn on the inventory.
    pub revoked: usize,
    /// Committed assignments removed.
    pub deleted: usize,
    /// Index records removed because no committed assignment backs them.
    pub orphans_removed: usize,
    /// Items whose metadata had to be fetched from the inventory.
    pub described: usize,
}

struct LedgerState {
    catalog: ShardedList<Item>,
    claims: ShardedList<Assignment>,
    pool: AvailablePool,
    indices: IdentityIndices,
}

/// Exactly-once assignment of inventory items to claimants.
///
/// A ledger is a single writer: callers must serialize access to it (see
/// [`crate::Partition`]). Nothing is served until [`DropLedger::start`] has
/// reconciled local state with the inventory.
///
/// # Claim ordering
///
/// 1. Look the claimant up in the identity indices; a hit returns the
///    existing assignment.
/// 2. Pop the newest item of the requested category.
/// 3. Reserve it on the inventory. On failure the item goes back.
/// 4. Write the three index records, then append to the `claims` list and
///    flush. The flush is the commit point; if anything before it fails the
///    records are removed, the reservation withdrawn and the item returned.
pub struct DropLedger {
    config: LedgerConfig,
    store: Arc<dyn KvStore>,
    inventory: Arc<dyn InventorySource>,
    verifier: Arc<dyn IdentityVerifier>,
    state: Option<LedgerState>,
}

impl DropLedger {
    pub fn new(
        config: LedgerConfig,
        store: Arc<dyn KvStore>,
        inventory: Arc<dyn InventorySource>,
        verifier: Arc<dyn IdentityVerifier>,
    ) -> Self {
        Self {
            config,
            store,
            inventory,
            verifier,
            state: None,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn is_started(&self) -> bool {
        self.state.is_some()
    }

    /// The available pool, once started.
    pub fn pool(&self) -> Option<&AvailablePool> {
        self.state.as_ref().map(|s| &s.pool)
    }

    /// The identity indices, once started.
    pub fn indices(&self) -> Option<&IdentityIndices> {
        self.state.as_ref().map(|s| &s.indices)
    }

    /// Load durable state and reconcile it with the inventory.
    ///
    /// Safe to run repeatedly: a second run without external changes makes no
    /// revocations and rebuilds the same pool. Until it succeeds the ledger
    /// rejects every operation with [`LedgerError::NotStarted`].
    pub async fn start(&mut self) -> LedgerResult<StartReport> {
        self.state = None;
        let campaign = self.config.campaign.clone();
        let chunk_size = self.config.chunk_size;

        let mut catalog: ShardedList<Item> =
            ShardedList::open(Arc::clone(&self.store), ITEMS_COLLECTION, chunk_size)?;
        let mut claims: ShardedList<Assignment> =
            ShardedList::open(Arc::clone(&self.store), CLAIMS_COLLECTION, chunk_size)?;

        let listed = self
            .inventory
            .list_owned_items(&self.config.owner_account)
            .await?;
        let cached: HashMap<&ItemId, &Item> = catalog.iter().map(|i| (&i.id, i)).collect();

        let mut owned = Vec::with_capacity(listed.len());
        let mut described = 0;
        for entry in listed {
            let category = match Category::from_tag(&entry.tag) {
                Ok(category) => category,
                Err(e) => {
                    warn!(campaign = %campaign, item = %entry.id, tag = %entry.tag, error = %e, "item has unusable category tag; not pooling it");
                    owned.push(OwnedItem::unusable(entry.id, entry.reservation));
                    continue;
                }
            };
            let metadata = match cached.get(&entry.id) {
                Some(item) => item.metadata.clone(),
                None => {
                    described += 1;
                    self.inventory.describe_item(&entry.id).await?
                }
            };
            owned.push(OwnedItem::new(
                Item::new(entry.id, category, metadata),
                entry.reservation,
            ));
        }

        let plan = reconcile(&owned, claims.as_slice())?;

        let deleted = if plan.deletions.is_empty() {
            0
        } else {
            let doomed: HashSet<&ItemId> = plan.deletions.iter().map(|a| &a.item_id).collect();
            let removed = claims.retain(|a| !doomed.contains(&a.item_id));
            claims.flush()?;
            for a in &plan.deletions {
                info!(campaign = %campaign, item = %a.item_id, recipient = %a.recipient(), "removed interrupted assignment");
            }
            removed
        };

        let mut indices = IdentityIndices::new();
        for assignment in &plan.retained {
            indices.insert(assignment)?;
        }
        let orphans_removed = self.sync_index_records(&indices)?;

        let mut revoked = 0;
        for revocation in &plan.revocations {
            match self
                .inventory
                .revoke(&revocation.item_id, &revocation.recipient)
                .await
            {
                Ok(()) => {
                    revoked += 1;
                    info!(campaign = %campaign, item = %revocation.item_id, recipient = %revocation.recipient, "revoked stale reservation");
                }
                Err(InventoryError::NotReserved { .. }) => {
                    warn!(campaign = %campaign, item = %revocation.item_id, "reservation already gone");
                }
                Err(e) => return Err(e.into()),
            }
        }

        let mut seen = HashSet::new();
        let current: Vec<Item> = owned
            .into_iter()
            .filter_map(|o| o.item)
            .filter(|item| seen.insert(item.id.clone()))
            .collect();
        if catalog.as_slice() != current.as_slice() {
            catalog.replace_all(current);
        }
        catalog.flush()?;

        let report = StartReport {
            available: plan.pool.total(),
            retained: plan.retained.len(),
            revoked,
            deleted,
            orphans_removed,
            described,
        };
        info!(
            campaign = %campaign,
            available = report.available,
            retained = report.retained,
            revoked = report.revoked,
            deleted = report.deleted,
            orphans = report.orphans_removed,
            "ledger started"
        );

        self.state = Some(LedgerState {
            catalog,
            claims,
            pool: plan.pool,
            indices,
        });
        Ok(report)
    }

    /// Re-run reconciliation, admitting items that appeared in the inventory
    /// since the last start.
    pub async fn resync(&mut self) -> LedgerResult<StartReport> {
        info!(campaign = %self.config.campaign, "resyncing with inventory");
        self.start().await
    }

    /// Wipe all durable state. The ledger must be started again before use.
    pub fn reset(&mut self) -> LedgerResult<()> {
        self.state = None;
        self.store.delete_all()?;
        warn!(campaign = %self.config.campaign, "ledger reset; all durable state removed");
        Ok(())
    }

    /// The assignment held by whoever owns `keys`, if any.
    pub fn check(&self, keys: &IdentityKeys) -> LedgerResult<Option<Assignment>> {
        self.state()?.indices.lookup(keys)
    }

    /// Ask the verifier about every supplied key.
    pub async fn eligibility(&self, keys: &IdentityKeys) -> LedgerResult<Eligibility> {
        let mut eligibility = Eligibility::default();
        for (namespace, key) in keys.supplied()? {
            eligibility.set(namespace, self.verifier.is_eligible(key, namespace).await);
        }
        Ok(eligibility)
    }

    /// Assign an item of `category` to the claimant, or return the item they
    /// already hold.
    pub async fn claim(
        &mut self,
        keys: &IdentityKeys,
        category: &Category,
    ) -> LedgerResult<ClaimOutcome> {
        let claimant = keys.complete()?;
        if let Some(existing) = self.state()?.indices.lookup(keys)? {
            debug!(campaign = %self.config.campaign, item = %existing.item_id, "claimant already holds an item");
            return Ok(ClaimOutcome::AlreadyClaimed(existing));
        }

        for (namespace, key) in claimant.iter() {
            if !self.verifier.is_eligible(key, namespace).await {
                warn!(campaign = %self.config.campaign, namespace = %namespace, "claim refused: identity not eligible");
                return Err(LedgerError::NotEligible(namespace));
            }
        }

        let campaign = &self.config.campaign;
        let store = self.store.as_ref();
        let state = self.state.as_mut().ok_or(LedgerError::NotStarted)?;
        let Some(item) = state.pool.pop(category) else {
            debug!(campaign = %campaign, category = %category, "pool exhausted");
            return Err(LedgerError::PoolExhausted(category.clone()));
        };

        if let Err(source) = self.inventory.reserve(&item.id, &claimant.wallet).await {
            warn!(campaign = %campaign, item = %item.id, error = %source, "reservation failed; returning item to pool");
            let item_id = item.id.clone();
            state.pool.push(item);
            return Err(LedgerError::ExternalCommitFailure {
                item: item_id,
                source,
            });
        }

        let assignment = Assignment::new(item, claimant, Utc::now());
        if let Err(e) = commit(store, &mut state.claims, &assignment) {
            error!(campaign = %campaign, item = %assignment.item_id, error = %e, "failed to record assignment; rolling back");
            discard_index_records(store, &assignment);
            if let Err(revoke_err) = self
                .inventory
                .revoke(&assignment.item_id, assignment.recipient())
                .await
            {
                error!(campaign = %campaign, item = %assignment.item_id, error = %revoke_err, "failed to withdraw reservation; next start will revoke it");
            }
            state.pool.push(assignment.to_item());
            return Err(e);
        }
        state.indices.insert(&assignment)?;

        info!(
            campaign = %campaign,
            item = %assignment.item_id,
            category = %assignment.category,
            remaining = state.pool.remaining(category),
            "item allocated"
        );
        Ok(ClaimOutcome::Allocated(assignment))
    }

    pub fn info(&self) -> LedgerResult<PoolInfo> {
        let state = self.state()?;
        Ok(PoolInfo {
            categories: state.pool.counts(),
            claimed: state.claims.len(),
            unclaimed: state.pool.total(),
        })
    }

    /// Number of items in the catalog cache.
    pub fn catalog_len(&self) -> LedgerResult<usize> {
        Ok(self.state()?.catalog.len())
    }

    fn state(&self) -> LedgerResult<&LedgerState> {
        self.state.as_ref().ok_or(LedgerError::NotStarted)
    }

    /// Make the durable index records match `indices`: delete records with no
    /// committed assignment behind them and rewrite missing ones. Returns the
    /// number deleted.
    fn sync_index_records(&self, indices: &IdentityIndices) -> LedgerResult<usize> {
        let store = self.store.as_ref();
        let mut removed = 0;
        for key in store.keys_with_prefix(INDEX_PREFIX)? {
            let expected = parse_index_key(&key).and_then(|(ns, k)| indices.get(ns, k));
            let Some(expected) = expected else {
                store.delete(&key)?;
                removed += 1;
                debug!(campaign = %self.config.campaign, key = %key, "removed orphaned index record");
                continue;
            };
            if let Some(recorded) = read_json::<Assignment>(store, &key)? {
                if recorded.item_id != expected.item_id {
                    error!(
                        campaign = %self.config.campaign,
                        key = %key,
                        recorded = %recorded.item_id,
                        committed = %expected.item_id,
                        "index record disagrees with committed assignment"
                    );
                    return Err(LedgerError::InconsistentIndexState(format!(
                        "{key} holds {} but {} is committed",
                        recorded.item_id, expected.item_id
                    )));
                }
            }
        }

        let mut healed = 0;
        for assignment in indices.iter() {
            for (namespace, identity) in assignment.keys.iter() {
                let key = index_key(namespace, identity);
                if !store.contains(&key)? {
                    write_json(store, &key, assignment)?;
                    healed += 1;
                }
            }
        }
        if healed > 0 {
            warn!(campaign = %self.config.campaign, healed, "rewrote missing index records");
        }
        Ok(removed)
    }
}

/// Write the index records, then append and flush the claim. On error the
/// in-memory claim list is restored; index records may remain.
fn commit(
    store: &dyn KvStore,
    claims: &mut ShardedList<Assignment>,
    assignment: &Assignment,
) -> LedgerResult<()> {
    for (namespace, identity) in assignment.keys.iter() {
        write_json(store, &index_key(namespace, identity), assignment)?;
    }
    claims.append(assignment.clone());
    if let Err(e) = claims.flush() {
        claims.pop();
        return Err(e.into());
    }
    Ok(())
}

fn discard_index_records(store: &dyn KvStore, assignment: &Assignment) {
    for (namespace, identity) in assignment.keys.iter() {
        if let Err(e) = store.delete(&index_key(namespace, identity)) {
            warn!(key = %index_key(namespace, identity), error = %e, "could not remove index record; next start will");
        }
    }
}

impl std::fmt::Debug for DropLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DropLedger")
            .field("config", &self.config)
            .field("started", &self.is_started())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::InMemoryInventory;
    use crate::traits::Reservation;
    use crate::verifier::{AllowAllVerifier, AllowListVerifier};
    use drop_store::{FileKvStore, InMemoryKvStore, StoreError};
    use drop_types::{ItemMetadata, MAX_KEY_LEN};
    use proptest::prelude::*;

    const OWNER: &str = "drop.near";

    struct Fixture {
        store: Arc<InMemoryKvStore>,
        inventory: Arc<InMemoryInventory>,
    }

    impl Fixture {
        fn new(items: &[(&str, &str)]) -> Self {
            let inventory = InMemoryInventory::new();
            for (id, tag) in items {
                inventory.mint(id_of(id), *tag, ItemMetadata::titled(*id), OWNER);
            }
            Self {
                store: Arc::new(InMemoryKvStore::new()),
                inventory: Arc::new(inventory),
            }
        }

        fn ledger_with(&self, chunk_size: usize, verifier: Arc<dyn IdentityVerifier>) -> DropLedger {
            DropLedger::new(
                LedgerConfig {
                    campaign: "test".into(),
                    owner_account: OWNER.into(),
                    chunk_size,
                },
                self.store.clone(),
                self.inventory.clone(),
                verifier,
            )
        }

        fn ledger(&self) -> DropLedger {
            self.ledger_with(DEFAULT_CHUNK_SIZE, Arc::new(AllowAllVerifier))
        }

        async fn started(&self) -> DropLedger {
            let mut ledger = self.ledger();
            ledger.start().await.unwrap();
            ledger
        }

        fn index_keys(&self) -> Vec<String> {
            self.store.keys_with_prefix(INDEX_PREFIX).unwrap()
        }
    }

    fn id_of(s: &str) -> ItemId {
        ItemId::new(s).unwrap()
    }

    fn small() -> Category {
        Category::parse("small").unwrap()
    }

    fn keys(n: u32) -> IdentityKeys {
        IdentityKeys::new(format!("w{n}"), format!("d{n}"), format!("t{n}"))
    }

    fn pool_ids(ledger: &DropLedger, category: &Category) -> Vec<String> {
        ledger
            .pool()
            .unwrap()
            .items(category)
            .iter()
            .map(|i| i.id.to_string())
            .collect()
    }

    #[tokio::test]
    async fn claim_is_lifo_and_idempotent() {
        let fx = Fixture::new(&[("itemA", "small"), ("itemB", "small")]);
        let mut ledger = fx.started().await;
        assert!(ledger.check(&keys(1)).unwrap().is_none());

        let first = ledger.claim(&keys(1), &small()).await.unwrap();
        assert!(first.is_new());
        assert_eq!(first.assignment().item_id.as_str(), "itemB");
        assert_eq!(pool_ids(&ledger, &small()), vec!["itemA"]);

        let again = ledger.claim(&keys(1), &small()).await.unwrap();
        assert_eq!(
            again,
            ClaimOutcome::AlreadyClaimed(first.assignment().clone())
        );
        assert_eq!(pool_ids(&ledger, &small()), vec!["itemA"]);
        assert_eq!(fx.inventory.reserve_calls(), 1);

        let checked = ledger.check(&keys(1)).unwrap().unwrap();
        assert_eq!(checked.item_id.as_str(), "itemB");
        assert_eq!(
            fx.inventory.reservation(&id_of("itemB")),
            Some(Reservation::confirmed("w1"))
        );
    }

    #[tokio::test]
    async fn any_single_key_finds_the_claim() {
        let fx = Fixture::new(&[("itemA", "small")]);
        let mut ledger = fx.started().await;
        ledger.claim(&keys(1), &small()).await.unwrap();

        let discord_only = IdentityKeys {
            discord: Some("d1".into()),
            ..Default::default()
        };
        assert!(ledger.check(&discord_only).unwrap().is_some());

        // Same discord, new wallet and twitter: still the same claimant.
        let mixed = IdentityKeys::new("w9", "d1", "t9");
        let outcome = ledger.claim(&mixed, &small()).await.unwrap();
        assert!(!outcome.is_new());
    }

    #[tokio::test]
    async fn reserve_failure_restores_item() {
        let fx = Fixture::new(&[("itemA", "small"), ("itemB", "small")]);
        let mut ledger = fx.started().await;
        fx.inventory.fail_next_reserves(1);

        let err = ledger.claim(&keys(1), &small()).await.unwrap_err();
        assert!(matches!(err, LedgerError::ExternalCommitFailure { .. }));
        assert!(err.is_retryable());
        assert_eq!(pool_ids(&ledger, &small()), vec!["itemA", "itemB"]);
        assert!(ledger.check(&keys(1)).unwrap().is_none());
        assert!(fx.index_keys().is_empty());

        let retried = ledger.claim(&keys(1), &small()).await.unwrap();
        assert_eq!(retried.assignment().item_id.as_str(), "itemB");
    }

    #[tokio::test]
    async fn exhausted_pool_mutates_nothing() {
        let fx = Fixture::new(&[("itemA", "small")]);
        let mut ledger = fx.started().await;
        ledger.claim(&keys(1), &small()).await.unwrap();

        let err = ledger.claim(&keys(2), &small()).await.unwrap_err();
        assert!(matches!(err, LedgerError::PoolExhausted(ref c) if c == &small()));
        assert_eq!(ledger.indices().unwrap().len(), 1);
        assert_eq!(fx.index_keys().len(), 3);
        assert_eq!(fx.inventory.reserve_calls(), 1);

        let unknown = Category::parse("huge").unwrap();
        assert!(matches!(
            ledger.claim(&keys(3), &unknown).await,
            Err(LedgerError::PoolExhausted(_))
        ));
    }

    #[tokio::test]
    async fn claim_requires_all_three_keys() {
        let fx = Fixture::new(&[("itemA", "small")]);
        let mut ledger = fx.started().await;
        let partial = IdentityKeys {
            wallet: Some("w1".into()),
            discord: Some("d1".into()),
            twitter: None,
        };
        assert!(matches!(
            ledger.claim(&partial, &small()).await,
            Err(LedgerError::Validation(_))
        ));
        assert!(matches!(
            ledger.check(&IdentityKeys::default()),
            Err(LedgerError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn ineligible_identity_is_refused() {
        let fx = Fixture::new(&[("itemA", "small")]);
        let verifier = AllowListVerifier::new().restrict(Namespace::Discord, ["d1"]);
        let mut ledger = fx.ledger_with(DEFAULT_CHUNK_SIZE, Arc::new(verifier));
        ledger.start().await.unwrap();

        let err = ledger.claim(&keys(2), &small()).await.unwrap_err();
        assert!(matches!(err, LedgerError::NotEligible(Namespace::Discord)));
        assert_eq!(fx.inventory.reserve_calls(), 0);
        assert_eq!(pool_ids(&ledger, &small()), vec!["itemA"]);

        let eligibility = ledger.eligibility(&keys(2)).await.unwrap();
        assert_eq!(eligibility.discord, Some(false));
        assert_eq!(eligibility.wallet, Some(true));

        let wallet_only = IdentityKeys {
            wallet: Some("w2".into()),
            ..Default::default()
        };
        let eligibility = ledger.eligibility(&wallet_only).await.unwrap();
        assert_eq!(eligibility.get(Namespace::Discord), None);
    }

    #[tokio::test]
    async fn operations_before_start_fail() {
        let fx = Fixture::new(&[("itemA", "small")]);
        let mut ledger = fx.ledger();
        assert!(matches!(
            ledger.claim(&keys(1), &small()).await,
            Err(LedgerError::NotStarted)
        ));
        assert!(matches!(ledger.info(), Err(LedgerError::NotStarted)));
    }

    #[tokio::test]
    async fn storage_failure_rolls_back_claim() {
        let fx = Fixture::new(&[("itemA", "small"), ("itemB", "small")]);
        let mut ledger = fx.started().await;
        fx.store.set_read_only(true);

        let err = ledger.claim(&keys(1), &small()).await.unwrap_err();
        assert!(matches!(err, LedgerError::Store(StoreError::ReadOnly)));
        assert_eq!(pool_ids(&ledger, &small()), vec!["itemA", "itemB"]);
        assert!(ledger.check(&keys(1)).unwrap().is_none());
        assert_eq!(fx.inventory.revoke_calls(), 1);
        assert!(fx.inventory.reservation(&id_of("itemB")).is_none());

        fx.store.set_read_only(false);
        let outcome = ledger.claim(&keys(1), &small()).await.unwrap();
        assert_eq!(outcome.assignment().item_id.as_str(), "itemB");
        assert_eq!(ledger.info().unwrap().claimed, 1);
    }

    #[tokio::test]
    async fn assignments_survive_restart() {
        let fx = Fixture::new(&[("itemA", "small"), ("itemB", "small"), ("itemC", "large")]);
        let mut ledger = fx.started().await;
        let claimed = ledger.claim(&keys(1), &small()).await.unwrap();
        drop(ledger);

        let mut restarted = fx.ledger();
        let report = restarted.start().await.unwrap();
        assert_eq!(report.retained, 1);
        assert_eq!(report.revoked, 0);
        assert_eq!(report.available, 2);
        assert_eq!(report.described, 0);
        assert_eq!(
            restarted.check(&keys(1)).unwrap().as_ref(),
            Some(claimed.assignment())
        );
        assert_eq!(pool_ids(&restarted, &small()), vec!["itemA"]);
    }

    #[tokio::test]
    async fn second_start_is_a_no_op() {
        let fx = Fixture::new(&[("itemA", "small"), ("itemB", "small")]);
        let mut ledger = fx.started().await;
        ledger.claim(&keys(1), &small()).await.unwrap();
        let before = ledger.pool().cloned();

        let report = ledger.start().await.unwrap();
        assert_eq!(report.revoked, 0);
        assert_eq!(report.deleted, 0);
        assert_eq!(report.orphans_removed, 0);
        assert_eq!(ledger.pool().cloned(), before);
    }

    #[tokio::test]
    async fn pending_remnant_is_revoked_on_start() {
        let fx = Fixture::new(&[("itemA", "small"), ("itemB", "small")]);
        let mut ledger = fx.started().await;
        ledger.claim(&keys(1), &small()).await.unwrap();
        drop(ledger);

        fx.inventory
            .set_reservation(&id_of("itemB"), Some(Reservation::pending("w1")))
            .unwrap();

        let mut restarted = fx.ledger();
        let report = restarted.start().await.unwrap();
        assert_eq!(report.revoked, 1);
        assert_eq!(report.deleted, 1);
        assert_eq!(report.orphans_removed, 3);
        assert!(restarted.check(&keys(1)).unwrap().is_none());
        assert!(fx.inventory.reservation(&id_of("itemB")).is_none());
        assert_eq!(pool_ids(&restarted, &small()), vec!["itemA", "itemB"]);
        assert!(fx.index_keys().is_empty());
        assert_eq!(restarted.info().unwrap().claimed, 0);
    }

    #[tokio::test]
    async fn interrupted_write_is_cleaned_up() {
        // Reservation confirmed and index records written, but the claim was
        // never appended.
        let fx = Fixture::new(&[("itemA", "small")]);
        let item = Item::new(id_of("itemA"), small(), ItemMetadata::titled("itemA"));
        let assignment = Assignment::new(item, keys(1).complete().unwrap(), Utc::now());
        for (ns, k) in assignment.keys.iter() {
            write_json(fx.store.as_ref(), &index_key(ns, k), &assignment).unwrap();
        }
        fx.inventory
            .set_reservation(&id_of("itemA"), Some(Reservation::confirmed("w1")))
            .unwrap();

        let mut ledger = fx.ledger();
        let report = ledger.start().await.unwrap();
        assert_eq!(report.orphans_removed, 3);
        assert_eq!(report.revoked, 1);
        assert_eq!(pool_ids(&ledger, &small()), vec!["itemA"]);
        assert!(fx.inventory.reservation(&id_of("itemA")).is_none());
    }

    #[tokio::test]
    async fn missing_index_record_is_healed() {
        let fx = Fixture::new(&[("itemA", "small")]);
        let mut ledger = fx.started().await;
        ledger.claim(&keys(1), &small()).await.unwrap();
        fx.store.delete(&index_key(Namespace::Twitter, "t1")).unwrap();

        ledger.start().await.unwrap();
        assert!(fx
            .store
            .contains(&index_key(Namespace::Twitter, "t1"))
            .unwrap());
    }

    #[tokio::test]
    async fn conflicting_index_record_fails_start() {
        let fx = Fixture::new(&[("itemA", "small"), ("itemB", "small")]);
        let mut ledger = fx.started().await;
        let held = ledger.claim(&keys(1), &small()).await.unwrap();

        let mut forged = held.into_assignment();
        forged.item_id = id_of("itemA");
        write_json(
            fx.store.as_ref(),
            &index_key(Namespace::Discord, "d1"),
            &forged,
        )
        .unwrap();

        let err = ledger.start().await.unwrap_err();
        assert!(matches!(err, LedgerError::InconsistentIndexState(_)));
        assert!(!ledger.is_started());
    }

    #[tokio::test]
    async fn collected_item_keeps_assignment() {
        let fx = Fixture::new(&[("itemA", "small"), ("itemB", "small")]);
        let mut ledger = fx.started().await;
        ledger.claim(&keys(1), &small()).await.unwrap();
        fx.inventory.transfer(&id_of("itemB"), "w1").unwrap();

        let report = ledger.start().await.unwrap();
        assert_eq!(report.retained, 1);
        assert_eq!(ledger.catalog_len().unwrap(), 1);
        assert_eq!(
            ledger.check(&keys(1)).unwrap().unwrap().item_id.as_str(),
            "itemB"
        );
        let info = ledger.info().unwrap();
        assert_eq!((info.claimed, info.unclaimed), (1, 1));
    }

    #[tokio::test]
    async fn catalog_caches_metadata() {
        let fx = Fixture::new(&[("itemA", "small"), ("itemB", "large")]);
        let mut ledger = fx.ledger();
        assert_eq!(ledger.start().await.unwrap().described, 2);
        assert_eq!(ledger.start().await.unwrap().described, 0);

        fx.inventory.mint(
            id_of("itemC"),
            "collection/small",
            ItemMetadata::titled("C"),
            OWNER,
        );
        assert_eq!(ledger.start().await.unwrap().described, 1);
        let claimed = ledger.claim(&keys(1), &small()).await.unwrap();
        assert_eq!(claimed.assignment().item_id.as_str(), "itemC");
        assert_eq!(claimed.assignment().metadata, ItemMetadata::titled("C"));
    }

    #[tokio::test]
    async fn unusable_tags_are_skipped() {
        let fx = Fixture::new(&[("itemA", "small"), ("itemX", "not a category!")]);
        let ledger = fx.started().await;
        assert_eq!(ledger.info().unwrap().unclaimed, 1);
    }

    #[tokio::test]
    async fn unusable_tag_still_has_its_reservation_revoked() {
        let fx = Fixture::new(&[("itemA", "small"), ("itemX", "not a category!")]);
        fx.inventory
            .set_reservation(&id_of("itemX"), Some(Reservation::pending("w7")))
            .unwrap();
        let mut ledger = fx.ledger();
        let report = ledger.start().await.unwrap();
        assert_eq!(report.revoked, 1);
        assert_eq!(report.available, 1);
        assert_eq!(fx.inventory.reservation(&id_of("itemX")), None);
        assert_eq!(ledger.catalog_len().unwrap(), 1);
        assert_eq!(pool_ids(&ledger, &small()), vec!["itemA"]);
    }

    #[tokio::test]
    async fn large_metadata_spreads_over_more_chunks() {
        let inventory = InMemoryInventory::new();
        for n in 0..100 {
            let metadata = ItemMetadata {
                description: Some("x".repeat(1500)),
                ..ItemMetadata::titled(format!("item {n}"))
            };
            inventory.mint(id_of(&format!("item{n}")), "small", metadata, OWNER);
        }
        let fx = Fixture {
            store: Arc::new(InMemoryKvStore::new()),
            inventory: Arc::new(inventory),
        };

        let mut ledger = fx.started().await;
        assert_eq!(ledger.info().unwrap().unclaimed, 100);
        assert!(fx.store.keys_with_prefix("items:").unwrap().len() > 1);

        let claimed = ledger.claim(&keys(1), &small()).await.unwrap();
        let mut reopened = fx.ledger();
        let report = reopened.start().await.unwrap();
        assert_eq!(report.described, 0);
        assert_eq!(report.retained, 1);
        assert_eq!(reopened.catalog_len().unwrap(), 100);
        assert_eq!(
            reopened.check(&keys(1)).unwrap().as_ref(),
            Some(claimed.assignment())
        );
    }

    #[tokio::test]
    async fn resync_restocks_exhausted_pool() {
        let fx = Fixture::new(&[("itemA", "small")]);
        let mut ledger = fx.started().await;
        ledger.claim(&keys(1), &small()).await.unwrap();
        assert!(ledger.claim(&keys(2), &small()).await.is_err());

        fx.inventory
            .mint(id_of("itemB"), "small", ItemMetadata::default(), OWNER);
        let report = ledger.resync().await.unwrap();
        assert_eq!(report.available, 1);
        let outcome = ledger.claim(&keys(2), &small()).await.unwrap();
        assert_eq!(outcome.assignment().item_id.as_str(), "itemB");
    }

    #[tokio::test]
    async fn reset_wipes_and_restart_revokes() {
        let fx = Fixture::new(&[("itemA", "small"), ("itemB", "small")]);
        let mut ledger = fx.started().await;
        ledger.claim(&keys(1), &small()).await.unwrap();

        ledger.reset().unwrap();
        assert!(!ledger.is_started());
        assert!(fx.store.is_empty());

        let report = ledger.start().await.unwrap();
        assert_eq!(report.revoked, 1);
        assert_eq!(report.available, 2);
        assert!(ledger.check(&keys(1)).unwrap().is_none());
    }

    #[tokio::test]
    async fn info_reports_counts() {
        let fx = Fixture::new(&[("a", "small"), ("b", "small"), ("c", "large")]);
        let mut ledger = fx.started().await;
        ledger
            .claim(&keys(1), &Category::parse("large").unwrap())
            .await
            .unwrap();

        let info = ledger.info().unwrap();
        assert_eq!(info.claimed, 1);
        assert_eq!(info.unclaimed, 2);
        assert_eq!(info.categories.get(&small()), Some(&2));
        assert_eq!(
            info.categories.get(&Category::parse("large").unwrap()),
            Some(&0)
        );
    }

    #[tokio::test]
    async fn claims_are_chunked() {
        let items: Vec<(String, &str)> = (0..5).map(|i| (format!("item{i}"), "small")).collect();
        let refs: Vec<(&str, &str)> = items.iter().map(|(id, t)| (id.as_str(), *t)).collect();
        let fx = Fixture::new(&refs);
        let mut ledger = fx.ledger_with(2, Arc::new(AllowAllVerifier));
        ledger.start().await.unwrap();
        for n in 0..5 {
            ledger.claim(&keys(n), &small()).await.unwrap();
        }
        assert_eq!(
            fx.store.keys_with_prefix("claims:").unwrap(),
            vec!["claims:0", "claims:1", "claims:2"]
        );

        let mut restarted = fx.ledger_with(2, Arc::new(AllowAllVerifier));
        assert_eq!(restarted.start().await.unwrap().retained, 5);
    }

    #[tokio::test]
    async fn file_store_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let inventory = Arc::new(InMemoryInventory::new());
        inventory.mint(id_of("itemA"), "small", ItemMetadata::default(), OWNER);
        let open = || {
            DropLedger::new(
                LedgerConfig {
                    campaign: "file".into(),
                    owner_account: OWNER.into(),
                    chunk_size: 2,
                },
                Arc::new(FileKvStore::open(dir.path()).unwrap()),
                inventory.clone(),
                Arc::new(AllowAllVerifier),
            )
        };

        let mut ledger = open();
        ledger.start().await.unwrap();
        let claimed = ledger.claim(&keys(1), &small()).await.unwrap();
        drop(ledger);

        let mut reopened = open();
        assert_eq!(reopened.start().await.unwrap().retained, 1);
        assert_eq!(
            reopened.check(&keys(1)).unwrap().as_ref(),
            Some(claimed.assignment())
        );
    }

    #[tokio::test]
    async fn longest_identity_keys_claim_on_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let inventory = Arc::new(InMemoryInventory::new());
        inventory.mint(id_of("itemA"), "small", ItemMetadata::default(), OWNER);
        let open = || {
            DropLedger::new(
                LedgerConfig {
                    campaign: "file".into(),
                    owner_account: OWNER.into(),
                    chunk_size: DEFAULT_CHUNK_SIZE,
                },
                Arc::new(FileKvStore::open(dir.path()).unwrap()),
                inventory.clone(),
                Arc::new(AllowAllVerifier),
            )
        };
        let long = IdentityKeys::new(
            "w".repeat(MAX_KEY_LEN),
            "d".repeat(MAX_KEY_LEN),
            "t".repeat(MAX_KEY_LEN),
        );

        let mut ledger = open();
        ledger.start().await.unwrap();
        let claimed = ledger.claim(&long, &small()).await.unwrap();
        assert!(claimed.is_new());
        drop(ledger);

        let mut reopened = open();
        let report = reopened.start().await.unwrap();
        assert_eq!(report.retained, 1);
        assert_eq!(report.orphans_removed, 0);
        let twitter_only = IdentityKeys {
            twitter: Some("t".repeat(MAX_KEY_LEN)),
            ..Default::default()
        };
        assert_eq!(
            reopened.check(&twitter_only).unwrap().as_ref(),
            Some(claimed.assignment())
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn no_item_is_allocated_twice(
            claimants in prop::collection::vec((0u8..4, 0u8..4, 0u8..4), 1..24),
            stock in 1usize..8,
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap();
            runtime.block_on(async {
                let ids: Vec<String> = (0..stock).map(|i| format!("item{i}")).collect();
                let items: Vec<(&str, &str)> = ids.iter().map(|id| (id.as_str(), "small")).collect();
                let fx = Fixture::new(&items);
                let mut ledger = fx.started().await;

                let mut allocated = HashSet::new();
                for (w, d, t) in &claimants {
                    let keys = IdentityKeys::new(format!("w{w}"), format!("d{d}"), format!("t{t}"));
                    if let Ok(ClaimOutcome::Allocated(a)) = ledger.claim(&keys, &small()).await {
                        prop_assert!(allocated.insert(a.item_id.clone()));
                        prop_assert!(!ledger.pool().unwrap().contains(&a.item_id));
                    }
                }

                let info = ledger.info().unwrap();
                prop_assert_eq!(info.claimed, allocated.len());
                prop_assert_eq!(info.claimed + info.unclaimed, stock);
                prop_assert_eq!(ledger.indices().unwrap().len(), allocated.len());
                Ok(())
            })?;
        }
    }
}
