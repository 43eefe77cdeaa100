//! Wires a shard's shuffled reads end to end: reconciling the set of
//! journals it must read against the current topology (`converge`),
//! draining the merged document stream (`poll`), and advancing
//! read-delay gating on a timer independent of `poll` (`tick`).

use crate::config::Shuffle;
use crate::governor::Governor;
use crate::listing::Listing;
use crate::read::Read;
use crate::read_builder::{self, Assignment, Member};
use models::PartitionSelector;
use proto_flow::flow::{JournalShuffle, RangeSpec, ShuffleRequest};
use std::collections::HashMap;
use std::sync::Arc;

/// Resolves a coordinator's shard id to a dialed transport. Which shard
/// currently coordinates which range, and where that shard's process is
/// reachable, is the shard scheduler's job — an external collaborator
/// this crate only ever consumes through an interface like this one,
/// never by resolving topology itself.
#[async_trait::async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self, coordinator: &str) -> crate::Result<tonic::transport::Channel>;
}

struct ActiveRead {
    assignment: Assignment,
    read: Read,
    governor_index: usize,
}

/// One shard's client-side view of a single shuffle: the journals it's
/// currently reading, each one's background [`Read`] and its slot in the
/// [`Governor`]'s merge.
pub struct ShuffleMerge {
    shuffle: Shuffle,
    build_id: String,
    dialer: Arc<dyn Dialer>,
    governor: Governor,
    active: HashMap<String, ActiveRead>,
}

impl ShuffleMerge {
    pub fn new(shuffle: Shuffle, build_id: String, dialer: Arc<dyn Dialer>) -> Self {
        Self { shuffle, build_id, dialer, governor: Governor::new(), active: HashMap::new() }
    }

    /// Reconcile this shard's reads against a freshly walked assignment
    /// set: start reads for newly assigned journals, and cancel reads
    /// whose journals are no longer assigned (e.g. a split narrowed
    /// `shard_range` out from under them).
    pub async fn converge(&mut self, listing: &Listing, selector: &PartitionSelector, shard_range: &RangeSpec, members: &[Member]) -> crate::Result<()> {
        let walked = read_builder::walk(&self.shuffle, listing, selector, shard_range, members);
        let existing: Vec<Assignment> = self.active.values().map(|a| a.assignment.clone()).collect();
        let (added, drained) = read_builder::reconcile(&existing, &walked);

        for journal in drained {
            if let Some(active) = self.active.remove(&journal) {
                active.read.cancel();
                self.governor.remove(active.governor_index);
            }
        }

        for assignment in added {
            self.start_read(assignment, *shard_range).await?;
        }

        Ok(())
    }

    async fn start_read(&mut self, assignment: Assignment, range: RangeSpec) -> crate::Result<()> {
        let channel = self.dialer.dial(&assignment.coordinator).await?;
        let client = crate::api::ShuffleClient::new(channel);

        let req = ShuffleRequest {
            shuffle: Some(JournalShuffle {
                journal: assignment.journal.clone(),
                coordinator: assignment.coordinator.clone(),
                shuffle: Some(self.wire_shuffle()),
                build_id: self.build_id.clone(),
                replay: false,
            }),
            range: Some(range),
            offset: 0,
            end_offset: 0,
            resolution: None,
        };

        let (tx, rx) = tokio::sync::mpsc::channel(8);
        let read = Read::start(client, req, self.shuffle.read_delay(), tx);
        let governor_index = self.governor.add_read(rx, self.shuffle.priority, false)?;

        self.active.insert(assignment.journal.clone(), ActiveRead { assignment, read, governor_index });
        Ok(())
    }

    fn wire_shuffle(&self) -> proto_flow::flow::Shuffle {
        proto_flow::flow::Shuffle {
            group_name: self.shuffle.group_name.clone(),
            source_collection: self.shuffle.source_collection.clone(),
            source_partitions: None,
            source_uuid_ptr: self.shuffle.source_uuid_ptr.clone(),
            shuffle_key_ptr: Vec::new(),
            uses_source_key: matches!(self.shuffle.key_source, crate::config::KeySource::SourceKey),
            shuffle_lambda_config_json: bytes::Bytes::new(),
            uses_source_schema: false,
            validate_schema_json: bytes::Bytes::new(),
            filter_r_clocks: self.shuffle.filter_r_clocks,
        }
    }

    /// Drain the next ordered document across every active read, or
    /// `None` once every one of them has permanently drained.
    pub async fn poll(&mut self) -> Option<crate::Result<crate::arena::DecodedDoc>> {
        self.governor.step().await
    }

    /// Advance any read whose gating delay has elapsed, independent of
    /// whether `poll` is currently being awaited, and publish how far
    /// behind wall-clock time the furthest-behind ready read is.
    pub fn tick(&mut self) -> Option<i64> {
        let delta = self.governor.tick();
        if let Some(delta) = delta {
            crate::GOVERNOR_CLOCK_DELTA_SECONDS.set(delta);
        }
        delta
    }

    /// How many journals this shard is currently reading.
    pub fn active_reads(&self) -> usize {
        self.active.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeySource;
    use proto_gazette::broker;

    struct LazyDialer;

    #[async_trait::async_trait]
    impl Dialer for LazyDialer {
        async fn dial(&self, _coordinator: &str) -> crate::Result<tonic::transport::Channel> {
            let uri: tonic::transport::Uri = "http://127.0.0.1:1".parse().unwrap();
            Ok(tonic::transport::Endpoint::from(uri).connect_lazy())
        }
    }

    fn shuffle() -> Shuffle {
        Shuffle {
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
            journal_read_suffix: String::new(),
        }
    }

    fn journal(name: &str) -> broker::ListResponseJournal {
        broker::ListResponseJournal { spec: Some(broker::JournalSpec { name: name.to_string(), ..Default::default() }), mod_revision: 1, route: None }
    }

    fn member(id: &str) -> Member {
        Member { shard_id: id.to_string(), range: RangeSpec::full_range() }
    }

    #[tokio::test]
    async fn test_converge_starts_a_read_per_walked_assignment() {
        let mut merge = ShuffleMerge::new(shuffle(), "build-1".to_string(), Arc::new(LazyDialer));
        let listing = Listing::new(vec![journal("a/collection/part-00")]);
        let members = [member("shard-1")];

        merge.converge(&listing, &PartitionSelector::default(), &RangeSpec::full_range(), &members).await.unwrap();

        assert_eq!(merge.active_reads(), 1);
    }

    #[tokio::test]
    async fn test_converge_cancels_reads_no_longer_assigned() {
        let mut merge = ShuffleMerge::new(shuffle(), "build-1".to_string(), Arc::new(LazyDialer));
        let members = [member("shard-1")];

        let listing = Listing::new(vec![journal("a/collection/part-00")]);
        merge.converge(&listing, &PartitionSelector::default(), &RangeSpec::full_range(), &members).await.unwrap();
        assert_eq!(merge.active_reads(), 1);

        let empty = Listing::new(vec![]);
        merge.converge(&empty, &PartitionSelector::default(), &RangeSpec::full_range(), &members).await.unwrap();
        assert_eq!(merge.active_reads(), 0);
    }

    #[tokio::test]
    async fn test_converge_is_idempotent_when_the_listing_is_unchanged() {
        let mut merge = ShuffleMerge::new(shuffle(), "build-1".to_string(), Arc::new(LazyDialer));
        let listing = Listing::new(vec![journal("a/collection/part-00")]);
        let members = [member("shard-1")];

        merge.converge(&listing, &PartitionSelector::default(), &RangeSpec::full_range(), &members).await.unwrap();
        merge.converge(&listing, &PartitionSelector::default(), &RangeSpec::full_range(), &members).await.unwrap();

        assert_eq!(merge.active_reads(), 1);
    }
}
