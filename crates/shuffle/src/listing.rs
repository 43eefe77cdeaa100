//! A snapshot of a journal listing, shared by the write-path [`crate::mapper::Mapper`]
//! and the read-path [`crate::read_builder::ReadBuilder`]. Both only ever need a
//! point-in-time, by-name-sorted view; the watch loop that keeps it fresh lives
//! with the caller (typically a task wrapping [`gazette::journal::Client::list_watch`]).

use proto_gazette::broker;
use std::sync::Arc;
use tokio::sync::watch;

/// A by-name-sorted snapshot of journal specs, cheaply clonable so readers
/// never block a concurrent refresh.
#[derive(Clone, Default)]
pub struct Listing {
    journals: Arc<[broker::ListResponseJournal]>,
}

impl Listing {
    pub fn new(mut journals: Vec<broker::ListResponseJournal>) -> Self {
        journals.sort_by(|a, b| journal_name(a).cmp(journal_name(b)));
        Self { journals: journals.into() }
    }

    pub fn journals(&self) -> &[broker::ListResponseJournal] {
        &self.journals
    }

    /// All journals whose name starts with `prefix`, still in name order.
    pub fn under_prefix<'s>(&'s self, prefix: &'s str) -> impl Iterator<Item = &'s broker::ListResponseJournal> {
        let start = self.journals.partition_point(|j| journal_name(j) < prefix);
        self.journals[start..].iter().take_while(move |j| journal_name(j).starts_with(prefix))
    }
}

fn journal_name(j: &broker::ListResponseJournal) -> &str {
    j.spec.as_ref().map(|s| s.name.as_str()).unwrap_or_default()
}

/// A watchable handle to the most recent [`Listing`], kept fresh by a
/// background task driving `gazette::journal::Client::list_watch`.
#[derive(Clone)]
pub struct WatchedListing(watch::Receiver<Listing>);

impl WatchedListing {
    pub fn new(initial: Listing) -> (watch::Sender<Listing>, Self) {
        let (tx, rx) = watch::channel(initial);
        (tx, Self(rx))
    }

    pub fn snapshot(&self) -> Listing {
        self.0.borrow().clone()
    }

    /// Block until the listing changes from `since`, for callers (the
    /// governor's poll, primarily) that must wait for fresh journals
    /// rather than act on a stale snapshot.
    pub async fn changed(&mut self) -> crate::Result<Listing> {
        self.0
            .changed()
            .await
            .map_err(|_| crate::Error::ListingUnavailable("watch sender dropped".to_string()))?;
        Ok(self.0.borrow().clone())
    }
}

/// Adapts one listed journal as a [`crate::key::PartitionCandidate`],
/// decoding its `[KeyBegin,KeyEnd]` labels on demand.
pub struct PartitionCandidate<'j>(pub &'j broker::ListResponseJournal);

impl crate::key::PartitionCandidate for PartitionCandidate<'_> {
    fn name(&self) -> &str {
        journal_name(self.0)
    }

    fn range(&self) -> crate::key::JournalRange {
        let labels = self.0.spec.as_ref().and_then(|s| s.labels.as_ref()).cloned().unwrap_or_default();
        let (key_begin, key_end) = labels::partition::decode_key_range(&labels).unwrap_or((0, u32::MAX));
        crate::key::JournalRange { key_begin, key_end }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labels::build_set;

    fn journal(name: &str, key_begin: &str, key_end: &str) -> broker::ListResponseJournal {
        broker::ListResponseJournal {
            spec: Some(broker::JournalSpec {
                name: name.to_string(),
                labels: Some(build_set([(labels::KEY_BEGIN, key_begin), (labels::KEY_END, key_end)])),
                ..Default::default()
            }),
            mod_revision: 1,
            route: None,
        }
    }

    #[test]
    fn test_listing_sorts_and_filters_by_prefix() {
        let listing = Listing::new(vec![
            journal("b/journal/pivot=00", "00000000", "ffffffff"),
            journal("a/journal/pivot=00", "00000000", "7fffffff"),
            journal("a/journal/pivot=80", "80000000", "ffffffff"),
        ]);

        let under_a: Vec<_> = listing.under_prefix("a/journal/").map(|j| j.spec.as_ref().unwrap().name.clone()).collect();
        assert_eq!(under_a, vec!["a/journal/pivot=00", "a/journal/pivot=80"]);
    }
}
