//! The runtime-resolved shuffle configuration consumed by the read path:
//! built once per task build generation from a task's catalog-level
//! [`models::Shuffle`] plus its source collection's key and partitioning,
//! and held thereafter as an immutable, cheaply-cloned value.

use models::PartitionSelector;
use std::sync::Arc;

/// How a shuffle key is produced for a source document: either directly
/// from the collection's own key, an explicit set of pointers, or a
/// user lambda invoked per document. Mirrors `models::Shuffle`'s
/// Key/Lambda split, plus the collection-key shortcut the runtime adds.
#[derive(Debug, Clone, PartialEq)]
pub enum KeySource {
    /// Shuffle on the source collection's own declared key.
    SourceKey,
    /// Shuffle on the given JSON pointers, evaluated against the source
    /// document.
    Pointers(Arc<[String]>),
    /// Shuffle on the result of invoking a lambda, external to this core.
    Lambda,
}

/// A resolved shuffle: everything the [`crate::read_builder::ReadBuilder`]
/// and [`crate::ring::Ring`] need to select journals, extract keys, and
/// filter documents, without further reference to the catalog.
#[derive(Debug, Clone)]
pub struct Shuffle {
    /// Group name the shuffle belongs to (e.g. `derive/my/collection/transform`),
    /// used to disambiguate multiple shuffles reading the same journal.
    pub group_name: String,
    /// Name of the collection being read.
    pub source_collection: String,
    /// Selects the subset of the source collection's logical partitions
    /// this shuffle reads.
    pub source_partitions: PartitionSelector,
    /// JSON pointer locating the document UUID placeholder.
    pub source_uuid_ptr: String,
    /// How the shuffle key is produced.
    pub key_source: KeySource,
    /// When the shuffle key is fully covered by the source collection's
    /// partition fields, their names, so the read builder can narrow
    /// journals without reading any document content.
    pub shuffle_key_partition_fields: Option<Arc<[String]>>,
    /// Whether documents must additionally be filtered by r-clock range
    /// (vs. delivered to every subscriber whose key range matches).
    pub filter_r_clocks: bool,
    /// Higher priority shuffles are drained first by the governor.
    pub priority: u32,
    /// A governor-side delay applied to this shuffle's document clocks,
    /// used to stagger transforms that must lag behind their source.
    pub read_delay_seconds: u32,
    /// Reads of this shuffle never return documents appended before this
    /// unix-seconds timestamp (0 disables the bound).
    pub not_before: u64,
    /// Reads of this shuffle never return documents appended after this
    /// unix-seconds timestamp (0 disables the bound).
    pub not_after: u64,
    /// Suffix appended to augmented journal names so that multiple
    /// shuffles of the same journal don't collide in the read builder's
    /// or ring's identity keys.
    pub journal_read_suffix: String,
}

impl Shuffle {
    /// The byte delta `tick()` applies to a document's `clock` before
    /// comparing it to wall time: see governor priority ordering.
    pub fn read_delay(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.read_delay_seconds as u64)
    }
}

/// The full identity of one (shuffle, journal) server-side ring: what the
/// coordinator registry keys on, and what a subscriber must match
/// exactly to share an existing ring rather than causing a new one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JournalShuffleId {
    pub journal: String,
    pub coordinator: String,
    pub build_id: String,
    pub replay: bool,
    pub group_name: String,
}

impl JournalShuffleId {
    pub fn new(journal: &str, coordinator: &str, build_id: &str, replay: bool, shuffle: &Shuffle) -> Self {
        Self {
            journal: journal.to_string(),
            coordinator: coordinator.to_string(),
            build_id: build_id.to_string(),
            replay,
            group_name: shuffle.group_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_journal_shuffle_id_distinguishes_group_name() {
        let shuffle = Shuffle {
            group_name: "derive/a/transform".to_string(),
            source_collection: "a/collection".to_string(),
            source_partitions: PartitionSelector::default(),
            source_uuid_ptr: "/_meta/uuid".to_string(),
            key_source: KeySource::SourceKey,
            shuffle_key_partition_fields: None,
            filter_r_clocks: false,
            priority: 0,
            read_delay_seconds: 0,
            not_before: 0,
            not_after: 0,
            journal_read_suffix: ";derive/a/transform".to_string(),
        };
        let mut other = shuffle.clone();
        other.group_name = "derive/a/other-transform".to_string();

        let id_a = JournalShuffleId::new("a/journal", "shard-1", "build-1", false, &shuffle);
        let id_b = JournalShuffleId::new("a/journal", "shard-1", "build-1", false, &other);
        assert_ne!(id_a, id_b);
    }
}
