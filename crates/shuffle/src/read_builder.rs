//! Builds the set of journal reads a shard must maintain for one shuffle:
//! which physical partitions of the source collection it's responsible
//! for, and which ring member coordinates each one.

use crate::config::Shuffle;
use crate::listing::Listing;
use gazette::journal::Client;
use labels::partition;
use models::PartitionSelector;
use proto_flow::flow::RangeSpec;
use proto_gazette::broker;
use std::collections::HashMap;

/// One member of the serving topology eligible to coordinate reads,
/// alongside the range of the shuffle's own task it currently owns.
#[derive(Clone, Debug)]
pub struct Member {
    pub shard_id: String,
    pub range: RangeSpec,
}

/// One journal this shard must read, and who coordinates it.
#[derive(Clone, Debug, PartialEq)]
pub struct Assignment {
    pub journal: String,
    pub coordinator: String,
}

/// Pick the coordinating member for `journal` via rendezvous hashing: the
/// member scoring highest under a hash of `(journal, member)` wins,
/// skipping members whose range has since shrunk to no longer overlap
/// `[lo, hi]` so a mid-flight split doesn't leave a read pinned to a
/// member that can no longer serve it.
pub fn pick_hrw<'m>(journal: &str, members: &'m [Member], lo: u32, hi: u32) -> Option<&'m Member> {
    members
        .iter()
        .filter(|m| m.range.key_begin < hi && lo < m.range.key_end)
        .max_by_key(|m| {
            let mut buf = Vec::with_capacity(journal.len() + m.shard_id.len() + 1);
            buf.extend_from_slice(journal.as_bytes());
            buf.push(0);
            buf.extend_from_slice(m.shard_id.as_bytes());
            crate::key::packed_key_hash(&buf)
        })
}

/// Does `labels` (a journal's partition label set) satisfy `selector`?
/// Every included field must have at least one matching value present
/// (fields the selector doesn't mention are unconstrained); any excluded
/// value present is disqualifying.
pub fn selects(selector: &PartitionSelector, labels: &broker::LabelSet) -> bool {
    if selector.matches_all() {
        return true;
    }

    let field_values = |field: &str| -> Vec<String> {
        let prefixed = format!("{}{field}", labels::FIELD_PREFIX);
        labels.labels.iter().filter(|l| l.name == prefixed).map(|l| l.value.clone()).collect()
    };

    for (field, wanted) in &selector.include {
        let encoded: Vec<String> = wanted.iter().map(|v| partition::encode_field_value(String::new(), json_as_node(v)).unwrap_or_default()).collect();
        let present = field_values(field);
        if !present.iter().any(|v| encoded.contains(v)) {
            return false;
        }
    }

    for (field, excluded) in &selector.exclude {
        let encoded: Vec<String> = excluded.iter().map(|v| partition::encode_field_value(String::new(), json_as_node(v)).unwrap_or_default()).collect();
        let present = field_values(field);
        if present.iter().any(|v| encoded.contains(v)) {
            return false;
        }
    }

    true
}

fn json_as_node(v: &serde_json::Value) -> doc::Node<'_> {
    use doc::AsNode;
    v.as_node()
}

/// Walk a source collection's current journal listing, keeping only
/// partitions this shuffle's selector admits, and assign each a
/// coordinator from `members` via [`pick_hrw`]. `shard_id` augments every
/// returned journal name so concurrent shuffles of the same journal never
/// share a read head.
pub fn walk(shuffle: &Shuffle, listing: &Listing, selector: &PartitionSelector, shard_range: &RangeSpec, members: &[Member]) -> Vec<Assignment> {
    let mut out = Vec::new();

    for journal in listing.journals() {
        let Some(spec) = &journal.spec else { continue };
        let labels = spec.labels.clone().unwrap_or_default();

        if !selects(selector, &labels) {
            continue;
        }

        if shuffle.shuffle_key_partition_fields.is_some() && !narrowed_in_range(&labels, shard_range) {
            continue;
        }

        let Some(coordinator) = pick_hrw(&spec.name, members, shard_range.key_begin, shard_range.key_end) else {
            continue;
        };

        out.push(Assignment { journal: format!("{}{}", spec.name, shuffle.journal_read_suffix), coordinator: coordinator.shard_id.clone() });
    }

    out
}

/// When the shuffle key is exactly the source collection's partition
/// fields, the partition's own key range (decoded straight from its
/// labels) tells us whether any document it could ever hold would fall
/// in `shard_range`, without reading a single document.
fn narrowed_in_range(labels: &broker::LabelSet, shard_range: &RangeSpec) -> bool {
    match partition::decode_key_range(labels) {
        Ok((key_begin, key_end)) => key_begin < shard_range.key_end && shard_range.key_begin <= key_end,
        Err(_) => true,
    }
}

/// Diff a shard's previously-built assignments against a freshly-walked
/// set, returning `(added, drained)`: journals to start reading, and
/// journals that are no longer assigned and whose reads should stop.
pub fn reconcile(existing: &[Assignment], walked: &[Assignment]) -> (Vec<Assignment>, Vec<String>) {
    let added = walked.iter().filter(|a| !existing.contains(a)).cloned().collect();
    let drained = existing.iter().filter(|a| !walked.contains(a)).map(|a| a.journal.clone()).collect();
    (added, drained)
}

/// True once every assignment has a recorded checkpoint offset, meaning a
/// shard can safely begin shuffled reads rather than waiting on a
/// still-pending journal (e.g. right after a split, before the new
/// shard's checkpoint has been seeded from its parent's).
pub fn read_through(assignments: &[Assignment], offsets: &HashMap<String, i64>) -> bool {
    assignments.iter().all(|a| offsets.contains_key(&a.journal))
}

/// Whatever can answer a `FragmentsRequest`, abstracted so
/// [`skip_to_fragment_bound`] is testable without a live broker.
/// [`gazette::journal::Client`] implements it directly.
#[async_trait::async_trait]
pub trait FragmentLister: Send + Sync {
    async fn list_fragments(&self, req: broker::FragmentsRequest) -> crate::Result<broker::FragmentsResponse>;
}

#[async_trait::async_trait]
impl FragmentLister for Client {
    async fn list_fragments(&self, req: broker::FragmentsRequest) -> crate::Result<broker::FragmentsResponse> {
        Client::list_fragments(self, req).await
    }
}

/// Resolve a replay's starting offset to the nearest fragment boundary at
/// or after `not_before - 60s`, so a reader doesn't have to scan from the
/// journal's very beginning to skip content it will discard as
/// `read_delay`-gated anyway.
pub async fn skip_to_fragment_bound(lister: &dyn FragmentLister, journal: &str, not_before: u64) -> crate::Result<i64> {
    let begin_mod_time = not_before.saturating_sub(60) as i64;
    let resp = lister
        .list_fragments(broker::FragmentsRequest { journal: journal.to_string(), begin_mod_time, end_mod_time: 0, next_page_token: String::new(), page_limit: 1 })
        .await?;

    Ok(resp.fragments.first().and_then(|f| f.spec.as_ref()).map(|f| f.begin).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(id: &str, key_begin: u32, key_end: u32) -> Member {
        Member { shard_id: id.to_string(), range: RangeSpec { key_begin, key_end, r_clock_begin: 0, r_clock_end: u32::MAX } }
    }

    #[test]
    fn test_pick_hrw_skips_members_whose_range_no_longer_overlaps() {
        let members = [member("shard-a", 0, 0x80000000), member("shard-b", 0x80000000, u32::MAX)];
        let picked = pick_hrw("a/journal", &members, 0x80000000, u32::MAX).unwrap();
        assert_eq!(picked.shard_id, "shard-b");
    }

    #[test]
    fn test_pick_hrw_is_deterministic() {
        let members = [member("shard-a", 0, u32::MAX), member("shard-b", 0, u32::MAX), member("shard-c", 0, u32::MAX)];
        let a = pick_hrw("a/journal", &members, 0, u32::MAX).unwrap().shard_id.clone();
        let b = pick_hrw("a/journal", &members, 0, u32::MAX).unwrap().shard_id.clone();
        assert_eq!(a, b);
    }

    #[test]
    fn test_selects_matches_all_by_default() {
        let selector = PartitionSelector::default();
        assert!(selects(&selector, &broker::LabelSet::default()));
    }

    #[test]
    fn test_selects_honors_include_and_exclude() {
        let labels = labels::build_set([("estuary.dev/field/region", "US")]);
        let mut selector = PartitionSelector::default();
        selector.include.insert("region".to_string(), vec![serde_json::json!("US")]);
        assert!(selects(&selector, &labels));

        selector.exclude.insert("region".to_string(), vec![serde_json::json!("US")]);
        assert!(!selects(&selector, &labels));
    }

    #[test]
    fn test_reconcile_added_and_drained() {
        let old = vec![Assignment { journal: "a".to_string(), coordinator: "s1".to_string() }];
        let new = vec![Assignment { journal: "b".to_string(), coordinator: "s1".to_string() }];
        let (added, drained) = reconcile(&old, &new);
        assert_eq!(added, vec![Assignment { journal: "b".to_string(), coordinator: "s1".to_string() }]);
        assert_eq!(drained, vec!["a".to_string()]);
    }

    #[test]
    fn test_read_through_requires_every_assignment() {
        let assignments = vec![Assignment { journal: "a".to_string(), coordinator: "s1".to_string() }];
        assert!(!read_through(&assignments, &HashMap::new()));
        assert!(read_through(&assignments, &HashMap::from([("a".to_string(), 0i64)])));
    }

    struct FakeLister(i64);

    #[async_trait::async_trait]
    impl FragmentLister for FakeLister {
        async fn list_fragments(&self, _req: broker::FragmentsRequest) -> crate::Result<broker::FragmentsResponse> {
            Ok(broker::FragmentsResponse {
                fragments: vec![broker::fragments_response::Fragment { spec: Some(broker::Fragment { begin: self.0, ..Default::default() }), ..Default::default() }],
                ..Default::default()
            })
        }
    }

    #[tokio::test]
    async fn test_skip_to_fragment_bound_returns_first_fragments_begin() {
        let lister = FakeLister(4096);
        assert_eq!(skip_to_fragment_bound(&lister, "a/journal", 1_700_000_000).await.unwrap(), 4096);
    }

    #[tokio::test]
    async fn test_skip_to_fragment_bound_defaults_to_zero_with_no_fragments() {
        struct Empty;
        #[async_trait::async_trait]
        impl FragmentLister for Empty {
            async fn list_fragments(&self, _req: broker::FragmentsRequest) -> crate::Result<broker::FragmentsResponse> {
                Ok(broker::FragmentsResponse::default())
            }
        }
        assert_eq!(skip_to_fragment_bound(&Empty, "a/journal", 0).await.unwrap(), 0);
    }
}
