//! Segment lifecycle management: ingest, sealing, merge and optimize
//! execution, durability and recovery.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use ahash::AHashSet;
use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::content::{ContentEntry, EntryUpdate, IndexFeed};
use crate::error::{Result, XiphosError};
use crate::index::policy::AggregationPolicy;
use crate::index::segment::{
    EntrySet, IndexedEntry, OpenSegment, SealedSegment, SegmentFilePayload, SegmentId, SegmentMeta,
};
use crate::index::snapshot::{IndexSnapshot, SegmentSnapshot};
use crate::storage::{Storage, decode_segment, encode_segment};

/// Name of the manifest file listing the sealed segments.
const MANIFEST_FILE: &str = "segments.json";

/// Configuration for segment management.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentManagerConfig {
    /// Document count at which the open segment seals.
    pub max_open_docs: u64,

    /// Approximate byte size at which the open segment seals.
    pub max_open_bytes: u64,

    /// Merge-candidate count threshold handed to the aggregation policy.
    pub required_candidate_count: usize,

    /// Merge-candidate total size threshold handed to the aggregation
    /// policy.
    pub required_total_candidate_size: u64,

    /// How many times a failed merge is retried before giving up until the
    /// next aggregation round.
    pub max_merge_retries: u32,
}

impl Default for SegmentManagerConfig {
    fn default() -> Self {
        SegmentManagerConfig {
            max_open_docs: 1000,
            max_open_bytes: 1024 * 1024,
            required_candidate_count: 4,
            required_total_candidate_size: 4 * 1024 * 1024,
            max_merge_retries: 3,
        }
    }
}

/// Statistics about segment management operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentManagerStats {
    /// Number of sealed segments.
    pub sealed_segments: usize,
    /// Total entries across sealed segments.
    pub sealed_docs: u64,
    /// Total approximate bytes across sealed segments.
    pub sealed_bytes: u64,
    /// Entries in the open segment.
    pub open_docs: u64,
    /// Seals performed.
    pub seals_completed: u64,
    /// Merges completed.
    pub merges_completed: u64,
    /// Merge attempts that failed.
    pub merge_failures: u64,
    /// Optimize rewrites completed.
    pub optimizations_completed: u64,
    /// Generation of the most recently merged segment, 0 if none.
    pub last_merge_generation: u64,
}

/// Outcome of one aggregation round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregationReport {
    /// Segments consumed by a merge this round.
    pub merged_segments: usize,
    /// Segments rewritten for structure this round.
    pub optimized_segments: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerSignal {
    SegmentSealed,
    Shutdown,
}

#[derive(Debug, Default)]
struct Counters {
    seals_completed: u64,
    merges_completed: u64,
    merge_failures: u64,
    optimizations_completed: u64,
    last_merge_generation: u64,
}

#[derive(Debug)]
struct ManagerState {
    open: OpenSegment,
    sealed: Arc<SegmentSnapshot>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    version: u32,
    segments: Vec<ManifestEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ManifestEntry {
    id: SegmentId,
    file: String,
    generation: u64,
}

/// Owns the segment set: the single open segment and the copy-on-write
/// sealed snapshot.
///
/// Readers take an [`IndexSnapshot`] once per query; writers ingest into
/// the open segment and publish new sealed snapshots by swapping one
/// reference. No lock is held across storage I/O.
#[derive(Debug)]
pub struct SegmentManager {
    config: SegmentManagerConfig,
    storage: Arc<dyn Storage>,
    policy: Box<dyn AggregationPolicy>,
    state: RwLock<ManagerState>,
    generation: AtomicU64,
    counters: RwLock<Counters>,
    // One aggregation round at a time.
    aggregation_lock: Mutex<()>,
    worker_tx: Mutex<Option<Sender<WorkerSignal>>>,
}

impl SegmentManager {
    /// Create a manager, recovering any sealed segments the storage holds.
    pub fn new(
        config: SegmentManagerConfig,
        storage: Arc<dyn Storage>,
        policy: Box<dyn AggregationPolicy>,
    ) -> Result<Self> {
        let manager = SegmentManager {
            config,
            storage,
            policy,
            state: RwLock::new(ManagerState {
                open: OpenSegment::new(),
                sealed: Arc::new(SegmentSnapshot::empty()),
            }),
            generation: AtomicU64::new(1),
            counters: RwLock::new(Counters::default()),
            aggregation_lock: Mutex::new(()),
            worker_tx: Mutex::new(None),
        };
        manager.load()?;
        Ok(manager)
    }

    /// Load the sealed-segment set from the manifest, if one exists.
    fn load(&self) -> Result<()> {
        if !self.storage.exists(MANIFEST_FILE) {
            return Ok(());
        }
        let manifest: Manifest = serde_json::from_slice(&self.storage.read(MANIFEST_FILE)?)?;
        if manifest.version != 1 {
            return Err(XiphosError::index(format!(
                "unsupported manifest version: {}",
                manifest.version
            )));
        }

        let mut segments = Vec::with_capacity(manifest.segments.len());
        let mut max_generation = 0;
        for entry in &manifest.segments {
            let payload: SegmentFilePayload = decode_segment(&self.storage.read(&entry.file)?)?;
            max_generation = max_generation.max(payload.meta.generation);
            segments.push(Arc::new(SealedSegment::from_payload(payload)));
        }

        info!(segments = segments.len(), "recovered sealed segments");
        self.state.write().sealed = Arc::new(SegmentSnapshot::new(segments));
        self.generation.store(max_generation + 1, Ordering::Relaxed);
        self.remove_orphan_files(&manifest)?;
        Ok(())
    }

    /// Delete segment files the manifest does not reference; a crash
    /// between writing a merged segment and publishing it leaves one
    /// behind.
    fn remove_orphan_files(&self, manifest: &Manifest) -> Result<()> {
        let referenced: AHashSet<&str> = manifest
            .segments
            .iter()
            .map(|entry| entry.file.as_str())
            .collect();
        for file in self.storage.list()? {
            if file.starts_with("seg_") && !referenced.contains(file.as_str()) {
                warn!(file = %file, "deleting unpublished segment file");
                self.storage.delete(&file)?;
            }
        }
        Ok(())
    }

    /// Take the point-in-time view queries execute against.
    pub fn snapshot(&self) -> IndexSnapshot {
        let state = self.state.read();
        let open = if state.open.set().is_empty() {
            None
        } else {
            Some(Arc::new(state.open.set().clone()))
        };
        IndexSnapshot::new(state.sealed.clone(), open)
    }

    /// Ingest a batch of entry updates into the open segment.
    ///
    /// Entries resident in a sealed segment are skipped; sealed segments
    /// are immutable and an id lives in exactly one segment.
    pub fn apply_updates(&self, updates: &[EntryUpdate]) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }
        {
            let mut state = self.state.write();
            state.open.note_block();
            for update in updates {
                let resident = state
                    .sealed
                    .segments()
                    .iter()
                    .any(|segment| segment.set().contains(&update.id));
                if resident {
                    debug!(id = %update.id, "entry already sealed, skipping update");
                    continue;
                }
                state.open.insert(IndexedEntry::from_update(update.clone()));
            }
        }
        self.maybe_seal()?;
        Ok(())
    }

    /// Remove entries from the open segment. Sealed residents are left in
    /// place.
    pub fn remove_ids(&self, ids: &[String]) -> Result<()> {
        let mut state = self.state.write();
        for id in ids {
            if state.open.remove(id).is_none() {
                debug!(id = %id, "remove of non-open entry ignored");
            }
        }
        Ok(())
    }

    /// Whether an entry id is resident anywhere in the index.
    pub fn contains(&self, id: &str) -> bool {
        let state = self.state.read();
        state.open.set().contains(id)
            || state
                .sealed
                .segments()
                .iter()
                .any(|segment| segment.set().contains(id))
    }

    fn maybe_seal(&self) -> Result<()> {
        let should_seal = {
            let state = self.state.read();
            state.open.doc_count() >= self.config.max_open_docs
                || state.open.size_bytes() >= self.config.max_open_bytes
        };
        if should_seal {
            self.seal_open()?;
        }
        Ok(())
    }

    /// Seal the open segment into a new sealed segment, publish it, and
    /// signal the aggregation worker. No-op when the open segment is
    /// empty.
    pub fn seal_open(&self) -> Result<Option<SegmentMeta>> {
        let (set, blocks) = {
            let mut state = self.state.write();
            if state.open.set().is_empty() {
                return Ok(None);
            }
            state.open.take()
        };

        let meta = SegmentMeta {
            id: SegmentId::random(),
            generation: self.generation.fetch_add(1, Ordering::Relaxed),
            doc_count: set.len() as u64,
            size_bytes: set.size_bytes(),
            block_count: blocks.max(1),
        };
        let sealed = SealedSegment::new(meta.clone(), set);

        // Durable before visible.
        if let Err(e) = self.persist_segment(&sealed) {
            warn!(segment = %meta.id, error = %e, "seal failed, restoring open segment");
            let payload = sealed.to_payload();
            let mut restore_set = EntrySet::new();
            for entry in payload.entries {
                restore_set.insert(entry);
            }
            self.state.write().open.restore(restore_set, blocks);
            return Err(e);
        }

        {
            let mut state = self.state.write();
            state.sealed = Arc::new(state.sealed.with_added(Arc::new(sealed)));
        }
        self.persist_manifest()?;
        self.counters.write().seals_completed += 1;
        debug!(segment = %meta.id, generation = meta.generation, docs = meta.doc_count, "segment sealed");

        if let Some(tx) = &*self.worker_tx.lock() {
            let _ = tx.send(WorkerSignal::SegmentSealed);
        }
        Ok(Some(meta))
    }

    fn persist_segment(&self, segment: &SealedSegment) -> Result<()> {
        let bytes = encode_segment(&segment.to_payload())?;
        self.storage.write(&segment.file_name(), &bytes)
    }

    fn persist_manifest(&self) -> Result<()> {
        let manifest = {
            let state = self.state.read();
            Manifest {
                version: 1,
                segments: state
                    .sealed
                    .segments()
                    .iter()
                    .map(|segment| ManifestEntry {
                        id: segment.id().clone(),
                        file: segment.file_name(),
                        generation: segment.meta().generation,
                    })
                    .collect(),
            }
        };
        self.storage
            .write(MANIFEST_FILE, &serde_json::to_vec_pretty(&manifest)?)
    }

    /// Run one aggregation round: ask the policy for merge candidates,
    /// merge them, then rewrite any optimize candidates.
    pub fn aggregate_once(&self) -> Result<AggregationReport> {
        let _guard = self.aggregation_lock.lock();
        let mut report = AggregationReport::default();

        let metas = self.state.read().sealed.metas();
        let merge_ids = self.policy.select_merge_candidates(
            &metas,
            self.config.required_candidate_count,
            self.config.required_total_candidate_size,
        );
        if merge_ids.len() >= 2 {
            self.merge_with_retries(&merge_ids)?;
            report.merged_segments = merge_ids.len();
        }

        // Optimize is independent of the merge decision; consult the
        // policy against the post-merge population.
        let metas = self.state.read().sealed.metas();
        let optimize_ids = self.policy.select_optimize_candidates(&metas);
        for id in &optimize_ids {
            match self.rewrite_segment(id) {
                Ok(()) => report.optimized_segments += 1,
                Err(e) => warn!(segment = %id, error = %e, "optimize rewrite failed"),
            }
        }

        Ok(report)
    }

    fn merge_with_retries(&self, ids: &AHashSet<SegmentId>) -> Result<SegmentMeta> {
        let mut last_error = None;
        for attempt in 0..=self.config.max_merge_retries {
            match self.merge_segments(ids) {
                Ok(meta) => return Ok(meta),
                Err(e) => {
                    self.counters.write().merge_failures += 1;
                    warn!(attempt, error = %e, "merge attempt failed, pre-merge segment set stays authoritative");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| XiphosError::index("merge failed")))
    }

    /// Merge the given sealed segments into one new segment.
    ///
    /// The combined, deduplicated entry set is written durably under a
    /// fresh generation before the snapshot swap publishes it; in-flight
    /// queries see either all old segments or the one new segment.
    fn merge_segments(&self, ids: &AHashSet<SegmentId>) -> Result<SegmentMeta> {
        let snapshot = self.state.read().sealed.clone();

        let mut victims = Vec::with_capacity(ids.len());
        for id in ids {
            let segment = snapshot
                .segment(id)
                .ok_or_else(|| XiphosError::index(format!("segment '{id}' not in snapshot")))?;
            victims.push(segment.clone());
        }

        let mut merged = EntrySet::new();
        let mut seen = AHashSet::new();
        for segment in &victims {
            for entry in segment.set().entries() {
                if seen.insert(entry.id.clone()) {
                    merged.insert(entry.clone());
                }
            }
        }

        let meta = SegmentMeta {
            id: SegmentId::random(),
            generation: self.generation.fetch_add(1, Ordering::Relaxed),
            doc_count: merged.len() as u64,
            size_bytes: merged.size_bytes(),
            block_count: 1,
        };
        let new_segment = Arc::new(SealedSegment::new(meta.clone(), merged));

        self.persist_segment(&new_segment)?;

        {
            let mut state = self.state.write();
            state.sealed = Arc::new(state.sealed.with_replaced(ids, vec![new_segment]));
        }
        self.persist_manifest()?;

        for victim in &victims {
            if let Err(e) = self.storage.delete(&victim.file_name()) {
                warn!(segment = %victim.id(), error = %e, "retired segment file not deleted");
            }
        }

        {
            let mut counters = self.counters.write();
            counters.merges_completed += 1;
            counters.last_merge_generation = meta.generation;
        }
        info!(
            merged = victims.len(),
            segment = %meta.id,
            generation = meta.generation,
            "segments merged"
        );
        Ok(meta)
    }

    /// Rewrite one segment in place: same entries, fresh generation, a
    /// single block.
    fn rewrite_segment(&self, id: &SegmentId) -> Result<()> {
        let snapshot = self.state.read().sealed.clone();
        let Some(segment) = snapshot.segment(id) else {
            // Consumed by a concurrent merge since selection; nothing to do.
            return Ok(());
        };
        let old_file = segment.file_name();

        let meta = SegmentMeta {
            id: SegmentId::random(),
            generation: self.generation.fetch_add(1, Ordering::Relaxed),
            doc_count: segment.meta().doc_count,
            size_bytes: segment.meta().size_bytes,
            block_count: 1,
        };
        let rewritten = Arc::new(SealedSegment::new(meta.clone(), segment.set().clone()));

        self.persist_segment(&rewritten)?;

        {
            let mut removed = AHashSet::new();
            removed.insert(id.clone());
            let mut state = self.state.write();
            state.sealed = Arc::new(state.sealed.with_replaced(&removed, vec![rewritten]));
        }
        self.persist_manifest()?;

        if let Err(e) = self.storage.delete(&old_file) {
            warn!(segment = %id, error = %e, "rewritten segment file not deleted");
        }
        self.counters.write().optimizations_completed += 1;
        debug!(old = %id, new = %meta.id, "segment rewritten");
        Ok(())
    }

    /// Current statistics.
    pub fn stats(&self) -> SegmentManagerStats {
        let (sealed_segments, sealed_docs, sealed_bytes, open_docs) = {
            let state = self.state.read();
            (
                state.sealed.segments().len(),
                state.sealed.doc_count(),
                state
                    .sealed
                    .segments()
                    .iter()
                    .map(|segment| segment.meta().size_bytes)
                    .sum(),
                state.open.doc_count(),
            )
        };
        let counters = self.counters.read();
        SegmentManagerStats {
            sealed_segments,
            sealed_docs,
            sealed_bytes,
            open_docs,
            seals_completed: counters.seals_completed,
            merges_completed: counters.merges_completed,
            merge_failures: counters.merge_failures,
            optimizations_completed: counters.optimizations_completed,
            last_merge_generation: counters.last_merge_generation,
        }
    }

    /// Configuration in use.
    pub fn config(&self) -> &SegmentManagerConfig {
        &self.config
    }

    /// Start the background aggregation worker. Each seal signals it to
    /// run one aggregation round.
    pub fn start_aggregation_worker(self: &Arc<Self>) -> AggregationWorker {
        let (tx, rx): (Sender<WorkerSignal>, Receiver<WorkerSignal>) = unbounded();
        *self.worker_tx.lock() = Some(tx.clone());

        let manager = Arc::clone(self);
        let handle = thread::spawn(move || {
            while let Ok(signal) = rx.recv() {
                match signal {
                    WorkerSignal::SegmentSealed => {
                        if let Err(e) = manager.aggregate_once() {
                            warn!(error = %e, "background aggregation round failed");
                        }
                    }
                    WorkerSignal::Shutdown => break,
                }
            }
        });

        AggregationWorker {
            tx,
            handle: Some(handle),
        }
    }
}

impl IndexFeed for SegmentManager {
    fn apply(&self, updates: &[EntryUpdate]) -> Result<()> {
        self.apply_updates(updates)
    }

    fn remove(&self, ids: &[String]) -> Result<()> {
        self.remove_ids(ids)
    }

    fn observe(&self, entry: &ContentEntry) {
        if self.contains(entry.id()) {
            return;
        }
        let properties = match entry.properties() {
            Ok(properties) => properties,
            Err(e) => {
                warn!(id = %entry.id(), error = %e, "observed entry not indexed");
                return;
            }
        };
        let update = EntryUpdate {
            id: entry.id().to_string(),
            parent_id: entry.parent_id().map(|p| p.to_string()),
            name: entry.name().to_string(),
            type_name: entry.type_name().to_string(),
            base: entry.base(),
            properties,
        };
        if let Err(e) = self.apply_updates(std::slice::from_ref(&update)) {
            warn!(id = %update.id, error = %e, "observed entry not indexed");
        }
    }
}

/// Handle on the background aggregation worker thread.
#[derive(Debug)]
pub struct AggregationWorker {
    tx: Sender<WorkerSignal>,
    handle: Option<JoinHandle<()>>,
}

impl AggregationWorker {
    /// Stop the worker and wait for it to finish.
    pub fn shutdown(mut self) {
        let _ = self.tx.send(WorkerSignal::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for AggregationWorker {
    fn drop(&mut self) {
        let _ = self.tx.send(WorkerSignal::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
