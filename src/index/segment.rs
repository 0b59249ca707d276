//! Index segments: indexed entries, the open segment and sealed segments.

use std::collections::{HashMap, HashSet};
use std::fmt;

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::tokenize;
use crate::content::{EntryUpdate, PropertyValue};
use crate::index::lookup::IndexLookup;
use crate::query::Operator;
use crate::schema::BaseType;

/// Identifier of one index segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SegmentId(String);

impl SegmentId {
    /// Create a fresh random segment id.
    pub fn random() -> Self {
        SegmentId(Uuid::new_v4().simple().to_string())
    }

    /// Wrap an existing id string.
    pub fn new(id: impl Into<String>) -> Self {
        SegmentId(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata of one sealed segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentMeta {
    /// Segment identifier.
    pub id: SegmentId,
    /// Creation generation; monotonic across the index lifetime.
    pub generation: u64,
    /// Number of entries in the segment.
    pub doc_count: u64,
    /// Approximate byte size of the indexed data.
    pub size_bytes: u64,
    /// Number of internal blocks; high counts make the segment an
    /// optimize-rewrite candidate.
    pub block_count: u32,
}

/// One entry as resident in the index: identity, structural metadata,
/// property values and full-text terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedEntry {
    /// Object identifier.
    pub id: String,
    /// Parent object identifier, `None` for the root.
    pub parent_id: Option<String>,
    /// Object name within its parent.
    pub name: String,
    /// Content-type name.
    pub type_name: String,
    /// Base kind.
    pub base: BaseType,
    /// Property values.
    pub properties: HashMap<String, PropertyValue>,
    /// Full-text terms per text property.
    terms: HashMap<String, HashSet<String>>,
}

impl IndexedEntry {
    /// Build an indexed entry from a pipeline update, tokenizing every text
    /// property.
    pub fn from_update(update: EntryUpdate) -> Self {
        let mut properties = HashMap::new();
        let mut terms: HashMap<String, HashSet<String>> = HashMap::new();

        for (name, value) in update.properties {
            if let PropertyValue::Text(text) = &value {
                terms.insert(name.clone(), tokenize(text).into_iter().collect());
            }
            properties.insert(name, value);
        }

        IndexedEntry {
            id: update.id,
            parent_id: update.parent_id,
            name: update.name,
            type_name: update.type_name,
            base: update.base,
            properties,
            terms,
        }
    }

    /// Whether every term occurs in the given property, or in any text
    /// property when unscoped.
    pub fn contains_terms(&self, property: Option<&str>, terms: &[String]) -> bool {
        match property {
            Some(property) => match self.terms.get(property) {
                Some(indexed) => terms.iter().all(|term| indexed.contains(term)),
                None => false,
            },
            None => terms
                .iter()
                .all(|term| self.terms.values().any(|indexed| indexed.contains(term))),
        }
    }

    /// All distinct full-text terms of the entry.
    pub fn all_terms(&self) -> impl Iterator<Item = &String> {
        self.terms.values().flatten()
    }

    /// Approximate indexed size of the entry in bytes.
    pub fn approximate_size(&self) -> u64 {
        let mut size = (self.id.len() + self.name.len() + self.type_name.len()) as u64;
        for (name, value) in &self.properties {
            size += name.len() as u64;
            size += match value {
                PropertyValue::Text(v) => v.len() as u64,
                PropertyValue::Id(v) => v.len() as u64,
                _ => 8,
            };
        }
        size
    }
}

/// A set of indexed entries with the postings needed for lookup
/// evaluation.
///
/// Both the open segment and sealed segments are views over an `EntrySet`;
/// sealed sets are simply never mutated again.
#[derive(Debug, Clone, Default)]
pub struct EntrySet {
    entries: AHashMap<String, IndexedEntry>,
    by_type: AHashMap<String, AHashSet<String>>,
    term_postings: AHashMap<String, AHashSet<String>>,
    size_bytes: u64,
}

impl EntrySet {
    /// Create an empty set.
    pub fn new() -> Self {
        EntrySet::default()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Approximate indexed size in bytes.
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Whether an entry id is present.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Get an entry by id.
    pub fn get(&self, id: &str) -> Option<&IndexedEntry> {
        self.entries.get(id)
    }

    /// Iterate over the entries.
    pub fn entries(&self) -> impl Iterator<Item = &IndexedEntry> {
        self.entries.values()
    }

    /// Insert or replace an entry, maintaining postings. Returns the
    /// replaced entry, if any.
    pub fn insert(&mut self, entry: IndexedEntry) -> Option<IndexedEntry> {
        let replaced = self.remove(&entry.id.clone());

        self.by_type
            .entry(entry.type_name.clone())
            .or_default()
            .insert(entry.id.clone());
        for term in entry.all_terms() {
            self.term_postings
                .entry(term.clone())
                .or_default()
                .insert(entry.id.clone());
        }
        self.size_bytes += entry.approximate_size();
        self.entries.insert(entry.id.clone(), entry);

        replaced
    }

    /// Remove an entry by id, maintaining postings.
    pub fn remove(&mut self, id: &str) -> Option<IndexedEntry> {
        let entry = self.entries.remove(id)?;

        if let Some(ids) = self.by_type.get_mut(&entry.type_name) {
            ids.remove(id);
            if ids.is_empty() {
                self.by_type.remove(&entry.type_name);
            }
        }
        for term in entry.all_terms() {
            if let Some(ids) = self.term_postings.get_mut(term) {
                ids.remove(id);
                if ids.is_empty() {
                    self.term_postings.remove(term);
                }
            }
        }
        self.size_bytes = self.size_bytes.saturating_sub(entry.approximate_size());

        Some(entry)
    }

    /// Evaluate a lookup to the matching entry ids within this set.
    pub fn evaluate(&self, lookup: &IndexLookup) -> AHashSet<String> {
        match lookup {
            IndexLookup::MatchType { type_name } => self
                .by_type
                .get(type_name)
                .cloned()
                .unwrap_or_default(),
            IndexLookup::PropertyCompare {
                property,
                operator,
                value,
            } => self
                .entries
                .values()
                .filter(|entry| {
                    entry
                        .properties
                        .get(property)
                        .and_then(|v| v.compare_to_literal(value))
                        .is_some_and(|ordering| operator_matches(*operator, ordering))
                })
                .map(|entry| entry.id.clone())
                .collect(),
            IndexLookup::PropertyLike { property, pattern } => self
                .entries
                .values()
                .filter(|entry| {
                    entry
                        .properties
                        .get(property)
                        .and_then(|v| v.as_text())
                        .is_some_and(|text| pattern.is_match(text))
                })
                .map(|entry| entry.id.clone())
                .collect(),
            IndexLookup::FullText { property: None, terms } => {
                // Postings intersection: start with the rarest term.
                let mut postings: Vec<&AHashSet<String>> = Vec::with_capacity(terms.len());
                for term in terms {
                    match self.term_postings.get(term) {
                        Some(ids) => postings.push(ids),
                        None => return AHashSet::new(),
                    }
                }
                let Some(smallest) = postings.iter().min_by_key(|ids| ids.len()) else {
                    return AHashSet::new();
                };
                smallest
                    .iter()
                    .filter(|id| postings.iter().all(|ids| ids.contains(*id)))
                    .cloned()
                    .collect()
            }
            IndexLookup::FullText {
                property: Some(property),
                terms,
            } => self
                .entries
                .values()
                .filter(|entry| !terms.is_empty() && entry.contains_terms(Some(property), terms))
                .map(|entry| entry.id.clone())
                .collect(),
            IndexLookup::And(children) => {
                let mut result: Option<AHashSet<String>> = None;
                for child in children {
                    let ids = self.evaluate(child);
                    result = Some(match result {
                        Some(acc) => acc.intersection(&ids).cloned().collect(),
                        None => ids,
                    });
                    if result.as_ref().is_some_and(|r| r.is_empty()) {
                        break;
                    }
                }
                result.unwrap_or_default()
            }
            IndexLookup::Or(children) => {
                let mut result = AHashSet::new();
                for child in children {
                    result.extend(self.evaluate(child));
                }
                result
            }
            IndexLookup::Difference(base, negated) => {
                let mut result = self.evaluate(base);
                for id in self.evaluate(negated) {
                    result.remove(&id);
                }
                result
            }
        }
    }
}

fn operator_matches(operator: Operator, ordering: std::cmp::Ordering) -> bool {
    use std::cmp::Ordering::*;
    match operator {
        Operator::Eq => ordering == Equal,
        Operator::Ne => ordering != Equal,
        Operator::Lt => ordering == Less,
        Operator::Le => ordering != Greater,
        Operator::Gt => ordering == Greater,
        Operator::Ge => ordering != Less,
        // LIKE lowers to PropertyLike, never to a comparison.
        Operator::Like => false,
    }
}

/// The single mutable segment receiving writes.
#[derive(Debug, Default)]
pub struct OpenSegment {
    set: EntrySet,
    blocks: u32,
}

impl OpenSegment {
    /// Create an empty open segment.
    pub fn new() -> Self {
        OpenSegment::default()
    }

    /// The entry set.
    pub fn set(&self) -> &EntrySet {
        &self.set
    }

    /// Number of entries.
    pub fn doc_count(&self) -> u64 {
        self.set.len() as u64
    }

    /// Approximate size in bytes.
    pub fn size_bytes(&self) -> u64 {
        self.set.size_bytes()
    }

    /// Number of write blocks absorbed so far.
    pub fn block_count(&self) -> u32 {
        self.blocks
    }

    /// Note the start of one write batch.
    pub fn note_block(&mut self) {
        self.blocks += 1;
    }

    /// Insert or replace an entry.
    pub fn insert(&mut self, entry: IndexedEntry) -> Option<IndexedEntry> {
        self.set.insert(entry)
    }

    /// Remove an entry.
    pub fn remove(&mut self, id: &str) -> Option<IndexedEntry> {
        self.set.remove(id)
    }

    /// Take the accumulated entries out for sealing, leaving the open
    /// segment empty.
    pub fn take(&mut self) -> (EntrySet, u32) {
        let set = std::mem::take(&mut self.set);
        let blocks = std::mem::replace(&mut self.blocks, 0);
        (set, blocks)
    }

    /// Put entries back after a failed seal. Entries written since the
    /// seal attempt win over the restored ones.
    pub fn restore(&mut self, set: EntrySet, blocks: u32) {
        for entry in set.entries() {
            if !self.set.contains(&entry.id) {
                self.set.insert(entry.clone());
            }
        }
        self.blocks += blocks;
    }
}

/// Serialized form of one sealed segment.
#[derive(Debug, Serialize, Deserialize)]
pub struct SegmentFilePayload {
    /// Segment metadata.
    pub meta: SegmentMeta,
    /// The indexed entries.
    pub entries: Vec<IndexedEntry>,
}

/// One immutable, queryable index segment.
#[derive(Debug)]
pub struct SealedSegment {
    meta: SegmentMeta,
    set: EntrySet,
}

impl SealedSegment {
    /// Seal an entry set under the given metadata.
    pub fn new(meta: SegmentMeta, set: EntrySet) -> Self {
        SealedSegment { meta, set }
    }

    /// Segment metadata.
    pub fn meta(&self) -> &SegmentMeta {
        &self.meta
    }

    /// Segment id.
    pub fn id(&self) -> &SegmentId {
        &self.meta.id
    }

    /// The entry set.
    pub fn set(&self) -> &EntrySet {
        &self.set
    }

    /// Evaluate a lookup within this segment.
    pub fn evaluate(&self, lookup: &IndexLookup) -> AHashSet<String> {
        self.set.evaluate(lookup)
    }

    /// Storage file name of the segment.
    pub fn file_name(&self) -> String {
        segment_file_name(&self.meta.id)
    }

    /// Build the serializable payload.
    pub fn to_payload(&self) -> SegmentFilePayload {
        SegmentFilePayload {
            meta: self.meta.clone(),
            entries: self.set.entries().cloned().collect(),
        }
    }

    /// Rebuild a segment from its serialized payload.
    pub fn from_payload(payload: SegmentFilePayload) -> Self {
        let mut set = EntrySet::new();
        for entry in payload.entries {
            set.insert(entry);
        }
        SealedSegment {
            meta: payload.meta,
            set,
        }
    }
}

/// Storage file name for a segment id.
pub fn segment_file_name(id: &SegmentId) -> String {
    format!("seg_{id}.bin")
}
