//! Segment aggregation: policy decisions, merge execution, durability.

use std::sync::Arc;

use xiphos::content::{EntryUpdate, PropertyValue};
use xiphos::index::{
    AggregationPolicy, DecoratedAggregationPolicy, IndexLookup, NoAggregationPolicy,
    SegmentId, SegmentManager, SegmentManagerConfig, SegmentMeta, SizeAggregationPolicy,
};
use xiphos::schema::BaseType;
use xiphos::storage::{FileStorage, MemoryStorage};

fn update(id: &str, title: &str) -> EntryUpdate {
    EntryUpdate {
        id: id.to_string(),
        parent_id: Some("root".to_string()),
        name: format!("{id}.txt"),
        type_name: "document".to_string(),
        base: BaseType::Document,
        properties: vec![(
            "title".to_string(),
            PropertyValue::Text(title.to_string()),
        )],
    }
}

fn meta(id: &str, generation: u64, size_bytes: u64) -> SegmentMeta {
    SegmentMeta {
        id: SegmentId::new(id),
        generation,
        doc_count: 1,
        size_bytes,
        block_count: 1,
    }
}

#[test]
fn test_smallest_segments_win_merge_selection() {
    // Five sealed segments of sizes [10, 10, 10, 50, 50]; thresholds
    // count=3 / size=25 select the three 10-byte segments.
    let segments = vec![
        meta("s1", 1, 10),
        meta("s2", 2, 10),
        meta("s3", 3, 10),
        meta("s4", 4, 50),
        meta("s5", 5, 50),
    ];
    let policy = SizeAggregationPolicy::default();

    let selected = policy.select_merge_candidates(&segments, 3, 25);
    let mut ids: Vec<&str> = selected.iter().map(|id| id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["s1", "s2", "s3"]);
}

#[test]
fn test_merge_preserves_document_union() {
    let config = SegmentManagerConfig {
        max_open_docs: 2,
        required_candidate_count: 3,
        required_total_candidate_size: u64::MAX,
        ..Default::default()
    };
    let manager = SegmentManager::new(
        config,
        Arc::new(MemoryStorage::new()),
        Box::new(SizeAggregationPolicy::default()),
    )
    .unwrap();

    let mut expected = Vec::new();
    for i in 0..8 {
        let id = format!("d{i}");
        manager
            .apply_updates(&[update(&id, &format!("title {i}"))])
            .unwrap();
        expected.push(id);
    }
    let before = manager.stats();
    assert!(before.sealed_segments >= 3);

    manager.aggregate_once().unwrap();

    let after = manager.stats();
    assert!(after.sealed_segments < before.sealed_segments);
    assert_eq!(after.merges_completed, 1);

    // No loss, no duplication.
    let snapshot = manager.snapshot();
    let all = snapshot.evaluate(&IndexLookup::MatchType {
        type_name: "document".to_string(),
    });
    assert_eq!(all.len(), expected.len());
    for id in &expected {
        assert!(snapshot.contains(id), "entry {id} lost by merge");
    }
}

#[test]
fn test_durable_index_survives_restart() {
    let dir = tempfile::TempDir::new().unwrap();
    {
        let storage = Arc::new(FileStorage::new(dir.path()).unwrap());
        let manager = SegmentManager::new(
            SegmentManagerConfig {
                max_open_docs: 2,
                ..Default::default()
            },
            storage,
            Box::new(NoAggregationPolicy),
        )
        .unwrap();
        manager
            .apply_updates(&[update("d1", "alpha"), update("d2", "beta")])
            .unwrap();
        manager
            .apply_updates(&[update("d3", "gamma"), update("d4", "delta")])
            .unwrap();
        assert_eq!(manager.stats().sealed_segments, 2);
    }

    let storage = Arc::new(FileStorage::new(dir.path()).unwrap());
    let reloaded = SegmentManager::new(
        SegmentManagerConfig::default(),
        storage,
        Box::new(NoAggregationPolicy),
    )
    .unwrap();

    assert_eq!(reloaded.stats().sealed_segments, 2);
    let snapshot = reloaded.snapshot();
    for id in ["d1", "d2", "d3", "d4"] {
        assert!(snapshot.contains(id));
    }

    // Generations continue past the recovered ones.
    reloaded.apply_updates(&[update("d5", "epsilon")]).unwrap();
    let sealed = reloaded.seal_open().unwrap().unwrap();
    let max_recovered = snapshot
        .sealed()
        .metas()
        .iter()
        .map(|meta| meta.generation)
        .max()
        .unwrap();
    assert!(sealed.generation > max_recovered);
}

#[test]
fn test_merge_failure_leaves_pre_merge_set_authoritative() {
    /// Storage that accepts the first writes (seals) and then fails every
    /// further write, so the merge cannot persist its new segment.
    #[derive(Debug)]
    struct FailingStorage {
        inner: MemoryStorage,
        allowed_writes: std::sync::atomic::AtomicI64,
    }

    impl xiphos::storage::Storage for FailingStorage {
        fn read(&self, name: &str) -> xiphos::error::Result<Vec<u8>> {
            self.inner.read(name)
        }

        fn write(&self, name: &str, data: &[u8]) -> xiphos::error::Result<()> {
            use std::sync::atomic::Ordering;
            if self.allowed_writes.fetch_sub(1, Ordering::SeqCst) <= 0 {
                return Err(xiphos::error::XiphosError::storage("disk full"));
            }
            self.inner.write(name, data)
        }

        fn delete(&self, name: &str) -> xiphos::error::Result<()> {
            self.inner.delete(name)
        }

        fn exists(&self, name: &str) -> bool {
            self.inner.exists(name)
        }

        fn list(&self) -> xiphos::error::Result<Vec<String>> {
            self.inner.list()
        }
    }

    let config = SegmentManagerConfig {
        max_open_docs: 1,
        required_candidate_count: 2,
        required_total_candidate_size: u64::MAX,
        max_merge_retries: 1,
        ..Default::default()
    };
    // Two seals write two segment files and two manifests; allow those
    // four writes, then fail.
    let storage = Arc::new(FailingStorage {
        inner: MemoryStorage::new(),
        allowed_writes: std::sync::atomic::AtomicI64::new(4),
    });
    let manager = SegmentManager::new(
        config,
        storage,
        Box::new(SizeAggregationPolicy::default()),
    )
    .unwrap();

    manager.apply_updates(&[update("d1", "alpha")]).unwrap();
    manager.apply_updates(&[update("d2", "beta")]).unwrap();
    assert_eq!(manager.stats().sealed_segments, 2);

    let result = manager.aggregate_once();
    assert!(result.is_err());

    // The pre-merge segment set stays authoritative; nothing was lost.
    let stats = manager.stats();
    assert_eq!(stats.sealed_segments, 2);
    assert_eq!(stats.merges_completed, 0);
    assert!(stats.merge_failures >= 1);
    let snapshot = manager.snapshot();
    assert!(snapshot.contains("d1"));
    assert!(snapshot.contains("d2"));
}

#[test]
fn test_decorated_policy_gates_merge_only() {
    let config = SegmentManagerConfig {
        max_open_docs: 1,
        required_candidate_count: 2,
        required_total_candidate_size: u64::MAX,
        ..Default::default()
    };

    // Refuse to merge anything; optimize stays the delegate's call.
    let policy = DecoratedAggregationPolicy::new(Box::new(SizeAggregationPolicy::default()))
        .with_merge_select(|_delegate, _segments, _count, _size| Default::default());

    let manager = SegmentManager::new(
        config,
        Arc::new(MemoryStorage::new()),
        Box::new(policy),
    )
    .unwrap();

    manager.apply_updates(&[update("d1", "alpha")]).unwrap();
    manager.apply_updates(&[update("d2", "beta")]).unwrap();

    let report = manager.aggregate_once().unwrap();
    assert_eq!(report.merged_segments, 0);
    assert_eq!(manager.stats().sealed_segments, 2);
}
