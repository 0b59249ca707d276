//! Point-in-time snapshots of the segment set.
//!
//! The sealed-segment set is copy-on-write: writers build a new
//! [`SegmentSnapshot`] and swap one atomic reference, readers clone the
//! reference once at plan time and keep it for the whole query. A snapshot
//! never mutates, so a reader sees all-old or all-new, never a mix.

use std::sync::Arc;

use ahash::AHashSet;

use crate::content::PropertyValue;
use crate::index::lookup::IndexLookup;
use crate::index::segment::{EntrySet, SealedSegment, SegmentId, SegmentMeta};

/// Immutable view of the sealed-segment set.
#[derive(Debug, Clone, Default)]
pub struct SegmentSnapshot {
    segments: Vec<Arc<SealedSegment>>,
}

impl SegmentSnapshot {
    /// Create an empty snapshot.
    pub fn empty() -> Self {
        SegmentSnapshot::default()
    }

    /// Create a snapshot over the given segments.
    pub fn new(segments: Vec<Arc<SealedSegment>>) -> Self {
        SegmentSnapshot { segments }
    }

    /// The sealed segments.
    pub fn segments(&self) -> &[Arc<SealedSegment>] {
        &self.segments
    }

    /// Metadata of every sealed segment.
    pub fn metas(&self) -> Vec<SegmentMeta> {
        self.segments
            .iter()
            .map(|segment| segment.meta().clone())
            .collect()
    }

    /// Find a segment by id.
    pub fn segment(&self, id: &SegmentId) -> Option<&Arc<SealedSegment>> {
        self.segments.iter().find(|segment| segment.id() == id)
    }

    /// Derive a new snapshot with `removed` segments gone and `added`
    /// appended.
    pub fn with_replaced(
        &self,
        removed: &AHashSet<SegmentId>,
        added: Vec<Arc<SealedSegment>>,
    ) -> Self {
        let mut segments: Vec<Arc<SealedSegment>> = self
            .segments
            .iter()
            .filter(|segment| !removed.contains(segment.id()))
            .cloned()
            .collect();
        segments.extend(added);
        SegmentSnapshot { segments }
    }

    /// Derive a new snapshot with one segment appended.
    pub fn with_added(&self, segment: Arc<SealedSegment>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        SegmentSnapshot { segments }
    }

    /// Total entry count across sealed segments.
    pub fn doc_count(&self) -> u64 {
        self.segments
            .iter()
            .map(|segment| segment.meta().doc_count)
            .sum()
    }
}

/// Parent-pointer metadata of one indexed entry, used by structural joins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryLink {
    /// Parent object identifier, `None` for the root.
    pub parent_id: Option<String>,
    /// Object name within its parent.
    pub name: String,
}

/// The index view one query executes against: the sealed snapshot plus a
/// frozen copy of the open segment.
#[derive(Debug, Clone)]
pub struct IndexSnapshot {
    sealed: Arc<SegmentSnapshot>,
    open: Option<Arc<EntrySet>>,
}

impl IndexSnapshot {
    /// Create a snapshot view.
    pub fn new(sealed: Arc<SegmentSnapshot>, open: Option<Arc<EntrySet>>) -> Self {
        IndexSnapshot { sealed, open }
    }

    /// The sealed portion.
    pub fn sealed(&self) -> &SegmentSnapshot {
        &self.sealed
    }

    /// Evaluate a lookup across every segment, unioning by entry id. An id
    /// lives in exactly one segment, so the union is disjoint by
    /// construction.
    pub fn evaluate(&self, lookup: &IndexLookup) -> AHashSet<String> {
        let mut result = AHashSet::new();
        for segment in self.sealed.segments() {
            result.extend(segment.evaluate(lookup));
        }
        if let Some(open) = &self.open {
            result.extend(open.evaluate(lookup));
        }
        result
    }

    /// Whether an entry id is present anywhere in the view.
    pub fn contains(&self, id: &str) -> bool {
        self.sealed
            .segments()
            .iter()
            .any(|segment| segment.set().contains(id))
            || self.open.as_ref().is_some_and(|open| open.contains(id))
    }

    /// Parent-pointer metadata of an entry, from whichever segment holds it.
    pub fn link_of(&self, id: &str) -> Option<EntryLink> {
        for segment in self.sealed.segments() {
            if let Some(entry) = segment.set().get(id) {
                return Some(EntryLink {
                    parent_id: entry.parent_id.clone(),
                    name: entry.name.clone(),
                });
            }
        }
        self.open.as_ref().and_then(|open| {
            open.get(id).map(|entry| EntryLink {
                parent_id: entry.parent_id.clone(),
                name: entry.name.clone(),
            })
        })
    }

    /// A property value of an indexed entry, from whichever segment holds
    /// it.
    pub fn property_of(&self, id: &str, property: &str) -> Option<PropertyValue> {
        for segment in self.sealed.segments() {
            if let Some(entry) = segment.set().get(id) {
                return entry.properties.get(property).cloned();
            }
        }
        self.open
            .as_ref()
            .and_then(|open| open.get(id))
            .and_then(|entry| entry.properties.get(property).cloned())
    }

    /// Total entry count in the view.
    pub fn doc_count(&self) -> u64 {
        self.sealed.doc_count() + self.open.as_ref().map_or(0, |open| open.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{EntryUpdate, PropertyValue};
    use crate::index::segment::IndexedEntry;
    use crate::schema::BaseType;

    fn entry(id: &str, parent: Option<&str>) -> IndexedEntry {
        IndexedEntry::from_update(EntryUpdate {
            id: id.to_string(),
            parent_id: parent.map(|p| p.to_string()),
            name: id.to_string(),
            type_name: "document".to_string(),
            base: BaseType::Document,
            properties: vec![(
                "title".to_string(),
                PropertyValue::Text(format!("entry {id}")),
            )],
        })
    }

    fn sealed(id: &str, generation: u64, entry_ids: &[&str]) -> Arc<SealedSegment> {
        let mut set = EntrySet::new();
        for entry_id in entry_ids {
            set.insert(entry(entry_id, Some("root")));
        }
        let meta = SegmentMeta {
            id: SegmentId::new(id),
            generation,
            doc_count: set.len() as u64,
            size_bytes: set.size_bytes(),
            block_count: 1,
        };
        Arc::new(SealedSegment::new(meta, set))
    }

    #[test]
    fn test_with_replaced_swaps_segments() {
        let snapshot = SegmentSnapshot::new(vec![
            sealed("a", 1, &["d1"]),
            sealed("b", 2, &["d2"]),
            sealed("c", 3, &["d3"]),
        ]);

        let mut removed = AHashSet::new();
        removed.insert(SegmentId::new("a"));
        removed.insert(SegmentId::new("b"));
        let merged = sealed("m", 4, &["d1", "d2"]);

        let next = snapshot.with_replaced(&removed, vec![merged]);
        assert_eq!(next.segments().len(), 2);
        assert!(next.segment(&SegmentId::new("c")).is_some());
        assert!(next.segment(&SegmentId::new("m")).is_some());
        assert!(next.segment(&SegmentId::new("a")).is_none());

        // The original snapshot is untouched.
        assert_eq!(snapshot.segments().len(), 3);
    }

    #[test]
    fn test_evaluate_unions_across_segments() {
        let snapshot = Arc::new(SegmentSnapshot::new(vec![
            sealed("a", 1, &["d1"]),
            sealed("b", 2, &["d2"]),
        ]));
        let mut open = EntrySet::new();
        open.insert(entry("d3", Some("root")));

        let view = IndexSnapshot::new(snapshot, Some(Arc::new(open)));
        let result = view.evaluate(&IndexLookup::MatchType {
            type_name: "document".to_string(),
        });
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn test_link_of_finds_parent_metadata() {
        let snapshot = Arc::new(SegmentSnapshot::new(vec![sealed("a", 1, &["d1"])]));
        let view = IndexSnapshot::new(snapshot, None);

        let link = view.link_of("d1").unwrap();
        assert_eq!(link.parent_id.as_deref(), Some("root"));
        assert!(view.link_of("ghost").is_none());
    }
}
