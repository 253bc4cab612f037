//! Conversion cache
//!
//! Owns the experiment-name → snapshot map and the canonical-name →
//! control-index memo for the lifetime of a session.
//!
//! ## Fetch discipline
//!
//! - Hit without `force_refresh`: the cached snapshot, no fetch.
//! - Miss: one fetch per name; concurrent callers attach to it and all
//!   receive the same snapshot (or the same error).
//! - `force_refresh`: waits for a fetch issued before the call to settle,
//!   then starts one new fetch that later forced callers attach to. At most
//!   one fetch per name is outstanding at any time.
//! - Every fetch carries a generation and only the latest generation for a
//!   name may write the cache. `invalidate` and `clear` bump it, so a fetch
//!   they overtake is handed to its own waiters and then dropped.
//!
//! Lock order (never reversed): `in_flight` → `latest_generation` →
//! `control_indices` → `snapshots`. No guard is held across an `.await`.
//!
//! # Example
//!
//! ```rust
//! use bingo_stats::authority::MemoryAuthority;
//! use bingo_stats::cache::ConversionCache;
//!
//! # async fn example() -> bingo_stats::Result<()> {
//! let authority = MemoryAuthority::new();
//! authority.define("mario points", ["off", "on"], ["mario_yay"]);
//! authority.set_counts("mario points", 0, 1000, 100)?;
//! authority.set_counts("mario points", 1, 1000, 150)?;
//!
//! let cache = ConversionCache::new(authority);
//! let snapshot = cache.get("mario points", false).await?;
//! assert_eq!(snapshot.control_index(), 0);
//!
//! // Served from memory
//! let again = cache.get("mario points", false).await?;
//! assert_eq!(cache.authority().fetch_count(), 1);
//! # let _ = again;
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::authority::{ExperimentAuthority, SnapshotRequest};
use crate::config::EngineConfig;
use crate::control::{ControlStrategy, KeywordControl, DEFAULT_CONTROL_INDEX};
use crate::experiment::{Alternative, ExperimentSnapshot};
use crate::{Error, Result};

type FetchOutcome = Result<Arc<ExperimentSnapshot>>;

/// One outstanding fetch, shared by every caller that attaches to it.
#[derive(Debug)]
struct Flight {
    generation: u64,
    outcome: OnceCell<FetchOutcome>,
}

enum Joined {
    Cached(Arc<ExperimentSnapshot>),
    Flight(Arc<Flight>),
    /// Outstanding fetch issued before a forced refresh was requested
    Behind(Arc<Flight>),
}

/// Session-scoped cache of annotated experiment snapshots.
///
/// Construct once and share by reference (or `Arc`) with every consumer.
pub struct ConversionCache<A: ExperimentAuthority> {
    authority: A,
    strategy: Box<dyn ControlStrategy>,
    include_archived: bool,
    snapshots: DashMap<String, Arc<ExperimentSnapshot>>,
    control_indices: DashMap<String, usize>,
    in_flight: DashMap<String, Arc<Flight>>,
    latest_generation: DashMap<String, u64>,
    next_generation: AtomicU64,
}

impl<A: ExperimentAuthority> ConversionCache<A> {
    /// Create a cache with keyword control inference that skips archived
    /// experiments.
    #[must_use]
    pub fn new(authority: A) -> Self {
        Self {
            authority,
            strategy: Box::new(KeywordControl::default()),
            include_archived: false,
            snapshots: DashMap::new(),
            control_indices: DashMap::new(),
            in_flight: DashMap::new(),
            latest_generation: DashMap::new(),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Create a cache configured from `config`.
    #[must_use]
    pub fn with_config(authority: A, config: &EngineConfig) -> Self {
        Self {
            include_archived: config.include_archived,
            ..Self::new(authority)
        }
    }

    /// Replace the control inference strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: impl ControlStrategy + 'static) -> Self {
        self.strategy = Box::new(strategy);
        self
    }

    /// The authority snapshots are fetched from
    #[must_use]
    pub const fn authority(&self) -> &A {
        &self.authority
    }

    /// Annotated snapshot for `experiment_name`, fetching it when missing
    /// or when `force_refresh` is set.
    ///
    /// # Errors
    /// Returns the authority's error verbatim, or a payload/control error
    /// if the fetched data cannot be annotated. Nothing is cached on error.
    pub async fn get(
        &self,
        experiment_name: &str,
        force_refresh: bool,
    ) -> Result<Arc<ExperimentSnapshot>> {
        if !force_refresh {
            if let Some(snapshot) = self.cached(experiment_name) {
                debug!(experiment = experiment_name, "conversion cache hit");
                return Ok(snapshot);
            }
        }

        // Flights issued up to now predate a forced refresh
        let floor = force_refresh.then(|| self.next_generation.load(Ordering::SeqCst));

        loop {
            match self.join_flight(experiment_name, floor) {
                Joined::Cached(snapshot) => return Ok(snapshot),
                Joined::Flight(flight) => return self.settle(experiment_name, &flight).await,
                Joined::Behind(older) => {
                    debug!(
                        experiment = experiment_name,
                        generation = older.generation,
                        "forced refresh waiting for older fetch"
                    );
                    if let Err(e) = self.settle(experiment_name, &older).await {
                        debug!(experiment = experiment_name, error = %e, "older fetch failed");
                    }
                }
            }
        }
    }

    /// Cached snapshot without fetching.
    #[must_use]
    pub fn cached(&self, experiment_name: &str) -> Option<Arc<ExperimentSnapshot>> {
        self.snapshots
            .get(experiment_name)
            .map(|snapshot| Arc::clone(snapshot.value()))
    }

    /// Memoized control index for a canonical name.
    #[must_use]
    pub fn control_index(&self, canonical_name: &str) -> Option<usize> {
        self.control_indices.get(canonical_name).map(|index| *index)
    }

    /// Override the control for every experiment sharing `canonical_name`
    /// and re-annotate their cached snapshots. Counts are untouched.
    ///
    /// With nothing of that canonical name cached the index is only
    /// remembered; a fetch that finds it out of range infers the control
    /// again instead.
    ///
    /// # Errors
    /// Returns `ControlIndexOutOfRange` if any cached snapshot of that
    /// canonical name has too few alternatives; nothing changes then.
    pub fn set_control_index(&self, canonical_name: &str, index: usize) -> Result<()> {
        let entry = self.control_indices.entry(canonical_name.to_string());

        for cached in self.snapshots.iter() {
            if cached.canonical_name() == canonical_name && index >= cached.alternatives().len() {
                return Err(Error::ControlIndexOutOfRange {
                    index,
                    len: cached.alternatives().len(),
                });
            }
        }

        let memo = entry.insert(index);
        for mut cached in self.snapshots.iter_mut() {
            if cached.canonical_name() == canonical_name && cached.control_index() != index {
                *cached = Arc::new(cached.with_control(index)?);
            }
        }
        drop(memo);

        debug!(canonical = canonical_name, index, "control index overridden");
        Ok(())
    }

    /// Forget the control for `canonical_name` and infer it again from a
    /// cached snapshot, re-annotating as needed.
    ///
    /// Returns the new index, or `None` if nothing of that canonical name
    /// is cached (inference then happens on the next fetch).
    ///
    /// # Errors
    /// Propagates errors from [`Self::set_control_index`].
    pub fn reset_control(&self, canonical_name: &str) -> Result<Option<usize>> {
        self.control_indices.remove(canonical_name);

        let alternatives: Option<Vec<Alternative>> = self
            .snapshots
            .iter()
            .find(|cached| cached.canonical_name() == canonical_name)
            .map(|cached| cached.alternatives().to_vec());

        match alternatives {
            None => Ok(None),
            Some(alternatives) => {
                let index = self.strategy.infer_control(&alternatives);
                self.set_control_index(canonical_name, index)?;
                Ok(Some(index))
            }
        }
    }

    /// Evict one experiment. An in-flight fetch for it still completes for
    /// its waiters but does not write its result back.
    pub fn invalidate(&self, experiment_name: &str) {
        let mut latest = self
            .latest_generation
            .entry(experiment_name.to_string())
            .or_insert(0);
        *latest = self.bump_generation();
        self.snapshots.remove(experiment_name);
        drop(latest);

        debug!(experiment = experiment_name, "experiment evicted");
    }

    /// Evict every snapshot. Control memos are kept for the session.
    pub fn clear(&self) {
        for mut latest in self.latest_generation.iter_mut() {
            *latest = self.bump_generation();
        }
        self.snapshots.clear();
    }

    /// Number of cached snapshots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Check if no snapshots are cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    fn bump_generation(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Attach to the outstanding fetch for `experiment_name` or start one.
    ///
    /// `floor` is set for forced refreshes: an outstanding fetch at or
    /// below it was issued before the refresh and must settle first.
    fn join_flight(&self, experiment_name: &str, floor: Option<u64>) -> Joined {
        match self.in_flight.entry(experiment_name.to_string()) {
            Entry::Occupied(current) => {
                let flight = Arc::clone(current.get());
                match floor {
                    Some(floor) if flight.generation <= floor => Joined::Behind(flight),
                    _ => {
                        debug!(experiment = experiment_name, "attaching to in-flight fetch");
                        Joined::Flight(flight)
                    }
                }
            }
            Entry::Vacant(slot) => {
                // A fetch may have landed since the caller's cache check
                if floor.is_none() {
                    if let Some(snapshot) = self.cached(experiment_name) {
                        return Joined::Cached(snapshot);
                    }
                }

                let flight = Arc::new(Flight {
                    generation: self.bump_generation(),
                    outcome: OnceCell::new(),
                });
                self.latest_generation
                    .insert(experiment_name.to_string(), flight.generation);
                slot.insert(Arc::clone(&flight));
                Joined::Flight(flight)
            }
        }
    }

    /// Wait for `flight`, running its fetch if no caller is driving it.
    async fn settle(&self, experiment_name: &str, flight: &Flight) -> FetchOutcome {
        flight
            .outcome
            .get_or_init(|| self.load(experiment_name, flight.generation))
            .await
            .clone()
    }

    /// Fetch and store, then retire the flight before its outcome is
    /// published so that no settled flight is ever attached to.
    async fn load(&self, experiment_name: &str, generation: u64) -> FetchOutcome {
        let outcome = self.fetch(experiment_name, generation).await;
        self.in_flight
            .remove_if(experiment_name, |_, current| current.generation == generation);
        outcome
    }

    async fn fetch(&self, experiment_name: &str, generation: u64) -> FetchOutcome {
        debug!(experiment = experiment_name, generation, "fetching experiment snapshot");

        let request = SnapshotRequest {
            experiment_name: experiment_name.to_string(),
            include_archived: self.include_archived,
        };
        let payload = match self.authority.fetch_snapshot(&request).await {
            Ok(payload) => payload,
            Err(e) => {
                warn!(experiment = experiment_name, error = %e, "snapshot fetch failed");
                return Err(e);
            }
        };

        let canonical_name = payload.canonical_name.clone();
        let snapshot = ExperimentSnapshot::from_payload(experiment_name, payload, |alternatives| {
            self.memoized_control(&canonical_name, alternatives)
        })?;

        self.store(experiment_name, generation, snapshot)
    }

    /// Control memo for `canonical_name`, inferred when missing or when it
    /// does not address one of `alternatives`.
    fn memoized_control(&self, canonical_name: &str, alternatives: &[Alternative]) -> usize {
        let mut memo = self
            .control_indices
            .entry(canonical_name.to_string())
            .or_insert_with(|| self.infer_control(canonical_name, alternatives));

        if *memo >= alternatives.len() {
            warn!(
                canonical = canonical_name,
                index = *memo,
                len = alternatives.len(),
                "control index out of range, inferring again"
            );
            *memo = self.infer_control(canonical_name, alternatives);
        }
        *memo
    }

    fn infer_control(&self, canonical_name: &str, alternatives: &[Alternative]) -> usize {
        let index = self.strategy.infer_control(alternatives);
        if index < alternatives.len() {
            debug!(canonical = canonical_name, index, "control inferred");
            index
        } else {
            warn!(
                canonical = canonical_name,
                index,
                len = alternatives.len(),
                "control strategy out of range, using default"
            );
            DEFAULT_CONTROL_INDEX
        }
    }

    fn store(
        &self,
        experiment_name: &str,
        generation: u64,
        snapshot: ExperimentSnapshot,
    ) -> FetchOutcome {
        let latest = self.latest_generation.get(experiment_name);
        if latest.as_deref() != Some(&generation) {
            warn!(
                experiment = experiment_name,
                generation, "discarding superseded snapshot"
            );
            return Ok(Arc::new(snapshot));
        }

        // The control may have been overridden while the fetch was out
        let control = self.control_indices.get(snapshot.canonical_name());
        let snapshot = match control.as_deref() {
            Some(&index)
                if index != snapshot.control_index() && index < snapshot.alternatives().len() =>
            {
                snapshot.with_control(index)?
            }
            _ => snapshot,
        };

        let snapshot = Arc::new(snapshot);
        self.snapshots
            .insert(experiment_name.to_string(), Arc::clone(&snapshot));
        drop(control);
        drop(latest);

        Ok(snapshot)
    }
}

impl<A: ExperimentAuthority + std::fmt::Debug> std::fmt::Debug for ConversionCache<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversionCache")
            .field("authority", &self.authority)
            .field("include_archived", &self.include_archived)
            .field("snapshots", &self.snapshots.len())
            .field("control_indices", &self.control_indices.len())
            .field("in_flight", &self.in_flight.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authority::{
        AlternativePayload, AssignRequest, AssignResponse, ConversionRequest, MemoryAuthority,
        SnapshotPayload,
    };
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Serves queued `(delay_ms, conversions)` replies in call order. The
    /// payload is fixed when the fetch starts, like a real request.
    #[derive(Default)]
    struct ScriptedAuthority {
        replies: Mutex<VecDeque<(u64, u64)>>,
        fetches: AtomicUsize,
        outstanding: AtomicUsize,
        max_outstanding: AtomicUsize,
    }

    impl ScriptedAuthority {
        fn new(replies: impl IntoIterator<Item = (u64, u64)>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().collect()),
                ..Self::default()
            }
        }

        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }

        fn max_outstanding(&self) -> usize {
            self.max_outstanding.load(Ordering::SeqCst)
        }
    }

    impl ExperimentAuthority for ScriptedAuthority {
        async fn fetch_snapshot(&self, request: &SnapshotRequest) -> Result<SnapshotPayload> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let outstanding = self.outstanding.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_outstanding.fetch_max(outstanding, Ordering::SeqCst);

            let reply = self.replies.lock().unwrap().pop_front();
            let (delay, conversions) = reply.unwrap_or((0, 150));
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.outstanding.fetch_sub(1, Ordering::SeqCst);

            Ok(SnapshotPayload {
                canonical_name: request.experiment_name.clone(),
                hashable_name: request.experiment_name.clone(),
                short_circuit_number: -1,
                live: true,
                alternatives: vec![
                    AlternativePayload {
                        content: "off".into(),
                        participants: 1000,
                        conversions: 100,
                        conversion_rate: None,
                    },
                    AlternativePayload {
                        content: "on".into(),
                        participants: 1000,
                        conversions,
                        conversion_rate: None,
                    },
                ],
                timeline_series: Vec::new(),
                y_axis_title: String::new(),
            })
        }

        async fn assign(&self, _request: &AssignRequest) -> Result<AssignResponse> {
            Ok(AssignResponse::new())
        }

        async fn record_conversion(&self, _request: &ConversionRequest) -> Result<()> {
            Ok(())
        }
    }

    fn mario_authority() -> MemoryAuthority {
        let authority = MemoryAuthority::new();
        authority.define("mario points", ["off", "on"], ["mario_yay"]);
        authority.set_counts("mario points", 0, 1000, 100).unwrap();
        authority.set_counts("mario points", 1, 1000, 150).unwrap();
        authority
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let cache = ConversionCache::new(mario_authority());
        assert!(cache.is_empty());

        let first = cache.get("mario points", false).await.unwrap();
        let second = cache.get("mario points", false).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.authority().fetch_count(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_mario_points_scenario() {
        let cache = ConversionCache::new(mario_authority());
        let snapshot = cache.get("mario points", false).await.unwrap();

        assert_eq!(snapshot.control_index(), 0);
        assert_eq!(cache.control_index("mario points"), Some(0));

        let on = &snapshot.alternatives()[1];
        assert_eq!(on.relative_rate().unwrap().to_string(), "+50.00%");
        let significance = on.significance().unwrap();
        assert!(significance.z_score > 0.0);
        assert!(significance.p_value.is_finite());
    }

    #[tokio::test]
    async fn test_concurrent_gets_share_one_fetch() {
        let cache = ConversionCache::new({
            let authority = MemoryAuthority::with_latency(Duration::from_millis(50));
            authority.define("exp1", ["old", "new"], ["done"]);
            authority
        });

        let (a, b) = tokio::join!(cache.get("exp1", false), cache.get("exp1", false));

        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(cache.authority().fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_failure_shared() {
        let authority = MemoryAuthority::with_latency(Duration::from_millis(20));
        authority.define("exp1", ["a", "b"], ["done"]);
        authority.fail_fetches(
            "exp1",
            Error::Transport {
                status: 500,
                message: "boom".to_string(),
            },
        );
        let cache = ConversionCache::new(authority);

        let (a, b) = tokio::join!(cache.get("exp1", false), cache.get("exp1", false));
        assert_eq!(a.unwrap_err(), b.unwrap_err());
        assert_eq!(cache.authority().fetch_count(), 1);
        assert!(cache.cached("exp1").is_none());
    }

    #[tokio::test]
    async fn test_force_refresh_fetches_again() {
        let cache = ConversionCache::new(mario_authority());
        let before = cache.get("mario points", false).await.unwrap();

        cache.authority().set_counts("mario points", 1, 2000, 500).unwrap();
        let after = cache.get("mario points", true).await.unwrap();

        assert_eq!(cache.authority().fetch_count(), 2);
        assert_eq!(before.alternatives()[1].participants(), 1000);
        assert_eq!(after.alternatives()[1].participants(), 2000);
        assert_eq!(
            after.alternatives()[1].relative_rate().unwrap().to_string(),
            "+150.00%"
        );
        assert!(Arc::ptr_eq(&after, &cache.cached("mario points").unwrap()));
    }

    #[tokio::test]
    async fn test_control_memo_survives_refresh() {
        let cache = ConversionCache::new(mario_authority());
        cache.get("mario points", false).await.unwrap();
        cache.set_control_index("mario points", 1).unwrap();

        let refreshed = cache.get("mario points", true).await.unwrap();
        assert_eq!(refreshed.control_index(), 1);
        assert!(refreshed.alternatives()[1].is_control());
    }

    #[tokio::test]
    async fn test_set_control_index_reannotates() {
        let cache = ConversionCache::new(mario_authority());
        let before = cache.get("mario points", false).await.unwrap();

        cache.set_control_index("mario points", 1).unwrap();
        let after = cache.get("mario points", false).await.unwrap();

        assert_eq!(cache.authority().fetch_count(), 1);
        assert!(after.alternatives()[1].is_control());
        assert!(after.alternatives()[1].relative_rate().is_none());
        assert_eq!(
            after.alternatives()[0].relative_rate().unwrap().to_string(),
            "-33.33%"
        );
        assert_eq!(after.total_participants(), before.total_participants());
    }

    #[tokio::test]
    async fn test_set_control_index_out_of_range() {
        let cache = ConversionCache::new(mario_authority());
        cache.get("mario points", false).await.unwrap();

        let err = cache.set_control_index("mario points", 2).unwrap_err();
        assert_eq!(err, Error::ControlIndexOutOfRange { index: 2, len: 2 });
        assert_eq!(cache.control_index("mario points"), Some(0));
    }

    #[tokio::test]
    async fn test_reset_control() {
        let cache = ConversionCache::new(mario_authority());
        assert_eq!(cache.reset_control("mario points").unwrap(), None);

        cache.get("mario points", false).await.unwrap();
        cache.set_control_index("mario points", 1).unwrap();

        assert_eq!(cache.reset_control("mario points").unwrap(), Some(0));
        assert_eq!(cache.cached("mario points").unwrap().control_index(), 0);
    }

    #[tokio::test]
    async fn test_custom_strategy() {
        struct LastIsControl;

        impl ControlStrategy for LastIsControl {
            fn infer_control(&self, alternatives: &[Alternative]) -> usize {
                alternatives.len() - 1
            }
        }

        let cache = ConversionCache::new(mario_authority()).with_strategy(LastIsControl);
        let snapshot = cache.get("mario points", false).await.unwrap();
        assert_eq!(snapshot.control_index(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_drops_in_flight_result() {
        let authority = MemoryAuthority::with_latency(Duration::from_millis(50));
        authority.define("exp1", ["a", "b"], ["done"]);
        let cache = Arc::new(ConversionCache::new(authority));

        let pending = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get("exp1", false).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        cache.invalidate("exp1");

        let delivered = pending.await.unwrap().unwrap();
        assert_eq!(delivered.experiment_name(), "exp1");
        assert!(cache.cached("exp1").is_none());
    }

    #[tokio::test]
    async fn test_clear_keeps_control_memo() {
        let cache = ConversionCache::new(mario_authority());
        cache.get("mario points", false).await.unwrap();
        cache.clear();

        assert!(cache.is_empty());
        assert_eq!(cache.control_index("mario points"), Some(0));
        cache.get("mario points", false).await.unwrap();
        assert_eq!(cache.authority().fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_include_archived_from_config() {
        let hidden = ConversionCache::new(mario_authority());
        hidden.authority().archive("mario points").unwrap();
        assert_eq!(
            hidden.get("mario points", false).await.unwrap_err(),
            Error::UnknownExperiment("mario points".to_string())
        );

        let config = EngineConfig::default().include_archived(true);
        let cache = ConversionCache::with_config(mario_authority(), &config);
        cache.authority().archive("mario points").unwrap();
        let snapshot = cache.get("mario points", false).await.unwrap();
        assert!(!snapshot.is_live());
    }

    #[tokio::test]
    async fn test_overlapping_forced_gets_fetch_one_at_a_time() {
        let cache = ConversionCache::new(ScriptedAuthority::new([(50, 150), (50, 250)]));

        let (first, second) =
            tokio::join!(cache.get("exp1", true), cache.get("exp1", true));

        assert_eq!(cache.authority().max_outstanding(), 1);
        assert_eq!(cache.authority().fetches(), 2);
        assert_eq!(first.unwrap().alternatives()[1].conversions(), 150);
        assert_eq!(second.unwrap().alternatives()[1].conversions(), 250);
    }

    #[tokio::test]
    async fn test_forced_get_waits_for_older_fetch() {
        // The older fetch is slow; its result must not land over the newer one
        let cache = ConversionCache::new(ScriptedAuthority::new([(80, 150), (0, 250)]));

        let (plain, forced) =
            tokio::join!(cache.get("exp1", false), cache.get("exp1", true));

        assert_eq!(cache.authority().max_outstanding(), 1);
        assert_eq!(cache.authority().fetches(), 2);
        assert_eq!(plain.unwrap().alternatives()[1].conversions(), 150);

        let forced = forced.unwrap();
        assert_eq!(forced.alternatives()[1].conversions(), 250);
        assert!(Arc::ptr_eq(&forced, &cache.cached("exp1").unwrap()));
    }

    #[tokio::test]
    async fn test_waiting_forced_gets_share_one_refresh() {
        let cache = ConversionCache::new(ScriptedAuthority::new([(30, 150), (30, 250)]));

        let (a, b, c) = tokio::join!(
            cache.get("exp1", true),
            cache.get("exp1", true),
            cache.get("exp1", true)
        );

        assert_eq!(cache.authority().fetches(), 2);
        assert_eq!(cache.authority().max_outstanding(), 1);
        assert_eq!(a.unwrap().alternatives()[1].conversions(), 150);
        assert!(Arc::ptr_eq(&b.unwrap(), &c.unwrap()));
    }

    #[tokio::test]
    async fn test_invalidated_fetch_never_overwrites() {
        let cache = Arc::new(ConversionCache::new(ScriptedAuthority::new([(50, 150)])));

        let pending = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get("exp1", false).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        cache.invalidate("exp1");

        assert_eq!(pending.await.unwrap().unwrap().alternatives()[1].conversions(), 150);
        assert!(cache.cached("exp1").is_none());
        assert_eq!(cache.authority().max_outstanding(), 1);
    }

    #[tokio::test]
    async fn test_out_of_range_override_is_repaired() {
        let cache = ConversionCache::new(mario_authority());
        cache.set_control_index("mario points", 5).unwrap();

        let snapshot = cache.get("mario points", false).await.unwrap();
        assert_eq!(snapshot.control_index(), 0);
        assert_eq!(cache.control_index("mario points"), Some(0));

        let refreshed = cache.get("mario points", true).await.unwrap();
        assert_eq!(refreshed.control_index(), 0);
    }

    #[tokio::test]
    async fn test_out_of_range_strategy_not_memoized() {
        struct PastTheEnd;

        impl ControlStrategy for PastTheEnd {
            fn infer_control(&self, alternatives: &[Alternative]) -> usize {
                alternatives.len() + 3
            }
        }

        let cache = ConversionCache::new(mario_authority()).with_strategy(PastTheEnd);
        let snapshot = cache.get("mario points", false).await.unwrap();

        assert_eq!(snapshot.control_index(), DEFAULT_CONTROL_INDEX);
        assert_eq!(cache.control_index("mario points"), Some(DEFAULT_CONTROL_INDEX));
    }
}
