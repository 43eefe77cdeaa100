//! The governor: drains every journal read assigned to a shard in clock
//! order (subject to shuffle priority), the way a merge of sorted runs
//! drains its inputs, so the shard sees at most one document out of
//! order relative to its own priority tier.

use crate::read::Batch;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tokio::sync::mpsc;

/// One read's place in the governor's priority heap: the next undrained
/// document's delay-adjusted clock, its shuffle's priority, and a stable
/// tie-break so two reads queued at the same instant stay FIFO.
struct HeapEntry {
    priority: u32,
    clock: u64,
    sequence: u64,
    read_index: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    /// Higher priority sorts first; among equal priorities, the lower
    /// clock sorts first (it's due sooner); ties break by insertion
    /// order, oldest first. `BinaryHeap` is a max-heap, so this returns
    /// the *greatest* ordering for the entry that should be drained next.
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.clock.cmp(&self.clock))
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// One journal read the governor is draining, in one of the states the
/// design calls out: queued up but not yet polled (`Pending`), waiting on
/// its read-delay to elapse (`Gated`), holding a document ready to hand
/// to the caller (`Active`), or permanently finished (`Idle`) — its
/// channel has closed, or it was torn down via [`Governor::remove`], and
/// it will never produce another document.
enum Slot {
    Pending,
    Gated { doc: crate::arena::DecodedDoc, not_before: std::time::Instant },
    Active { doc: crate::arena::DecodedDoc },
    Idle,
}

struct ReadState {
    rx: mpsc::Receiver<crate::Result<Batch>>,
    priority: u32,
    has_end_offset: bool,
    pending: std::collections::VecDeque<crate::arena::DecodedDoc>,
    slot: Slot,
}

/// What came back from waiting on a still-open read's channel.
enum Delivery {
    Batch(Batch),
    Error(crate::Error),
    Closed,
}

/// Merges many concurrent journal reads into the single ordered document
/// stream a shard's transform consumes.
pub struct Governor {
    reads: Vec<ReadState>,
    heap: BinaryHeap<HeapEntry>,
    sequence: u64,
}

impl Governor {
    pub fn new() -> Self {
        Self { reads: Vec::new(), heap: BinaryHeap::new(), sequence: 0 }
    }

    /// Register a new read, returning the index later passed to
    /// [`Governor::remove`] when it's torn down (e.g. on a range split).
    ///
    /// The read that holds the highest priority tier must always be one
    /// that never stops on its own: if `has_end_offset` is set and this
    /// read would be the sole occupant of the new top tier, nothing would
    /// ever advance that tier's clock again once it completed, silently
    /// starving every lower-priority read behind it. Such a registration
    /// is rejected rather than accepted and later deadlocking.
    pub fn add_read(&mut self, rx: mpsc::Receiver<crate::Result<Batch>>, priority: u32, has_end_offset: bool) -> crate::Result<usize> {
        let current_top = self.reads.iter().map(|r| r.priority).max();
        let joins_top_alone = match current_top {
            None => true,
            Some(top) if priority > top => true,
            Some(top) if priority == top => !self.reads.iter().any(|r| r.priority == top && !r.has_end_offset),
            Some(_) => false,
        };

        if has_end_offset && joins_top_alone {
            return Err(crate::Error::TopMostReadHasEndOffset);
        }

        self.reads.push(ReadState { rx, priority, has_end_offset, pending: std::collections::VecDeque::new(), slot: Slot::Pending });
        Ok(self.reads.len() - 1)
    }

    /// Return the single next document to hand to the caller, in
    /// priority-then-clock order across every read, blocking on whichever
    /// reads are still transiently empty rather than returning early.
    /// Returns `None` only once every registered read has permanently
    /// drained — its channel closed, or it was removed.
    ///
    /// The top-most (highest priority) read with a document ready is
    /// never allowed to carry an `EndOffset`: a bounded top-priority read
    /// completing silently would starve every lower-priority read forever
    /// once it's removed, rather than surfacing the gap to the caller.
    pub async fn step(&mut self) -> Option<crate::Result<crate::arena::DecodedDoc>> {
        loop {
            self.refill_heap();

            let Some(read_index) = self.heap.peek().map(|e| e.read_index) else {
                if self.all_drained() {
                    return None;
                }
                match Self::wait_for_any_pending(&mut self.reads).await {
                    Some((index, delivery)) => Self::apply(&mut self.reads[index], delivery),
                    None => return None,
                }
                continue;
            };

            if let Slot::Gated { not_before, .. } = &self.reads[read_index].slot {
                let deadline = tokio::time::Instant::from_std(*not_before);
                if deadline > tokio::time::Instant::now() {
                    tokio::select! {
                        _ = tokio::time::sleep_until(deadline) => (),
                        woken = Self::wait_for_any_pending(&mut self.reads) => {
                            if let Some((index, delivery)) = woken {
                                Self::apply(&mut self.reads[index], delivery);
                            }
                        }
                    }
                    continue;
                }
            }

            let entry = self.heap.pop().expect("heap was non-empty at peek");
            let read = &mut self.reads[entry.read_index];
            let doc = match std::mem::replace(&mut read.slot, Slot::Pending) {
                Slot::Active { doc } | Slot::Gated { doc, .. } => doc,
                other => {
                    // Stale entry: the slot changed between refill_heap and
                    // here. Nothing else touches `self.reads` in between,
                    // so this shouldn't happen, but fall back to
                    // re-looping rather than losing the slot's state.
                    read.slot = other;
                    continue;
                }
            };
            Self::advance(read);
            return Some(Ok(doc));
        }
    }

    /// Advance every gated read whose delay has elapsed into `Active`,
    /// and return how far behind wall-clock time (in seconds) the
    /// furthest-behind ready read still is. Safe to call on a fixed
    /// interval independent of `step`, to keep reads flowing even while
    /// nothing is polling for documents.
    pub fn tick(&mut self) -> Option<i64> {
        let now_instant = tokio::time::Instant::now();
        let now_millis = now_millis();
        let mut max_behind = None;

        for read in &mut self.reads {
            if let Slot::Gated { not_before, .. } = &read.slot {
                if tokio::time::Instant::from_std(*not_before) <= now_instant {
                    if let Slot::Gated { doc, .. } = std::mem::replace(&mut read.slot, Slot::Pending) {
                        read.slot = Slot::Active { doc };
                    }
                }
            }

            if let Slot::Active { doc } | Slot::Gated { doc, .. } = &read.slot {
                let behind = (now_millis.saturating_sub(doc.clock) / 1000) as i64;
                max_behind = Some(max_behind.map_or(behind, |m: i64| m.max(behind)));
            }
        }

        max_behind
    }

    /// Wait on every read still in `Pending` for its next batch, error,
    /// or closure, returning as soon as any one of them resolves. Returns
    /// `None` if no read is currently `Pending` (every read is either
    /// already holding a document or permanently drained).
    async fn wait_for_any_pending(reads: &mut [ReadState]) -> Option<(usize, Delivery)> {
        type Wait<'a> = std::pin::Pin<Box<dyn std::future::Future<Output = (usize, Option<crate::Result<Batch>>)> + Send + 'a>>;

        let mut waits: Vec<Wait<'_>> = Vec::new();
        for (index, read) in reads.iter_mut().enumerate() {
            if matches!(read.slot, Slot::Pending) {
                waits.push(Box::pin(async move { (index, read.rx.recv().await) }));
            }
        }

        if waits.is_empty() {
            return None;
        }

        let ((index, received), _, _) = futures::future::select_all(waits).await;
        let delivery = match received {
            Some(Ok(batch)) => Delivery::Batch(batch),
            Some(Err(err)) => Delivery::Error(err),
            None => Delivery::Closed,
        };
        Some((index, delivery))
    }

    fn apply(read: &mut ReadState, delivery: Delivery) {
        match delivery {
            Delivery::Batch(batch) => Self::admit(read, batch),
            Delivery::Error(err) => read.slot = Slot::Active { doc: crate::arena::DecodedDoc::terminal_error(err.to_string()) },
            Delivery::Closed => read.slot = Slot::Idle,
        }
    }

    /// Buffer every document decoded out of `batch`, with the shuffle's
    /// read delay folded into each one's clock, then advance the read to
    /// present the next of them (if any).
    fn admit(read: &mut ReadState, batch: Batch) {
        let delay_millis = batch.read_delay.as_millis() as u64;
        let docs = crate::arena::decode_docs(&batch.response).into_iter().map(|mut doc| {
            doc.clock = doc.clock.saturating_add(delay_millis);
            doc
        });
        read.pending.extend(docs);
        Self::advance(read);
    }

    /// Pop the next buffered document (if any) into `Gated` or `Active`
    /// depending on whether its clock is still in the future; otherwise
    /// leave the read `Pending` for more data.
    fn advance(read: &mut ReadState) {
        let Some(doc) = read.pending.pop_front() else {
            read.slot = Slot::Pending;
            return;
        };

        let now = now_millis();
        if doc.clock > now {
            let not_before = std::time::Instant::now() + std::time::Duration::from_millis(doc.clock - now);
            read.slot = Slot::Gated { doc, not_before };
        } else {
            read.slot = Slot::Active { doc };
        }
    }

    fn refill_heap(&mut self) {
        self.heap.clear();
        for (index, read) in self.reads.iter().enumerate() {
            let clock = match &read.slot {
                Slot::Active { doc } | Slot::Gated { doc, .. } => doc.clock,
                _ => continue,
            };
            self.sequence += 1;
            self.heap.push(HeapEntry { priority: read.priority, clock, sequence: self.sequence, read_index: index });
        }
    }

    fn all_drained(&self) -> bool {
        self.reads.iter().all(|r| matches!(r.slot, Slot::Idle))
    }

    /// Tear down a read: it produces no further documents, and `step`
    /// treats it as permanently drained from here on.
    pub fn remove(&mut self, index: usize) {
        self.reads[index].slot = Slot::Idle;
        self.reads[index].pending.clear();
    }
}

fn now_millis() -> u64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

impl Default for Governor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch_with_docs(clocks: &[u64]) -> Batch {
        let mut b = crate::arena::ResponseBuilder::new();
        for &clock in clocks {
            b.push_doc(b"{}", proto_flow::flow::UuidParts { node: 0, clock }, 0, 1, b"");
        }
        let (response, _next) = b.finish(1, 1);
        Batch { response, read_delay: std::time::Duration::ZERO }
    }

    #[test]
    fn test_heap_entry_prefers_higher_priority() {
        let a = HeapEntry { priority: 5, clock: 100, sequence: 0, read_index: 0 };
        let b = HeapEntry { priority: 1, clock: 1, sequence: 1, read_index: 1 };
        assert!(a > b);
    }

    #[test]
    fn test_heap_entry_prefers_lower_clock_within_priority() {
        let a = HeapEntry { priority: 1, clock: 10, sequence: 0, read_index: 0 };
        let b = HeapEntry { priority: 1, clock: 20, sequence: 1, read_index: 1 };
        assert!(a > b);
    }

    #[test]
    fn test_heap_entry_ties_break_by_insertion_order() {
        let a = HeapEntry { priority: 1, clock: 10, sequence: 0, read_index: 0 };
        let b = HeapEntry { priority: 1, clock: 10, sequence: 1, read_index: 1 };
        assert!(a > b);
    }

    #[test]
    fn test_first_read_with_end_offset_is_rejected() {
        let mut gov = Governor::new();
        let (_tx, rx) = mpsc::channel(1);
        let err = gov.add_read(rx, 0, true).unwrap_err();
        assert!(matches!(err, crate::Error::TopMostReadHasEndOffset));
    }

    #[test]
    fn test_bounded_read_allowed_alongside_an_unbounded_sibling_at_the_same_priority() {
        let mut gov = Governor::new();
        let (_tx1, rx1) = mpsc::channel(1);
        gov.add_read(rx1, 0, false).unwrap();

        let (_tx2, rx2) = mpsc::channel(1);
        gov.add_read(rx2, 0, true).unwrap();
    }

    #[test]
    fn test_bounded_read_allowed_below_the_top_priority_tier() {
        let mut gov = Governor::new();
        let (_tx1, rx1) = mpsc::channel(1);
        gov.add_read(rx1, 5, false).unwrap();

        let (_tx2, rx2) = mpsc::channel(1);
        gov.add_read(rx2, 1, true).unwrap();
    }

    #[tokio::test]
    async fn test_step_drains_two_reads_in_clock_order() {
        let mut gov = Governor::new();
        let (tx1, rx1) = mpsc::channel(4);
        let (tx2, rx2) = mpsc::channel(4);
        gov.add_read(rx1, 0, false).unwrap();
        gov.add_read(rx2, 0, false).unwrap();

        tx1.send(Ok(batch_with_docs(&[10]))).await.unwrap();
        tx2.send(Ok(batch_with_docs(&[5]))).await.unwrap();

        let first = gov.step().await.unwrap().unwrap();
        assert_eq!(first.clock, 5);
        let second = gov.step().await.unwrap().unwrap();
        assert_eq!(second.clock, 10);
    }

    #[tokio::test]
    async fn test_step_blocks_rather_than_returning_none_while_a_read_is_merely_pending() {
        let mut gov = Governor::new();
        let (tx, rx) = mpsc::channel(4);
        gov.add_read(rx, 0, false).unwrap();

        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            let _ = tx.send(Ok(batch_with_docs(&[1]))).await;
        });

        let doc = tokio::time::timeout(std::time::Duration::from_secs(1), gov.step()).await;
        assert!(matches!(doc, Ok(Some(Ok(_)))));
    }

    #[tokio::test]
    async fn test_step_returns_none_only_once_every_read_has_closed() {
        let mut gov = Governor::new();
        let (tx, rx) = mpsc::channel(4);
        gov.add_read(rx, 0, false).unwrap();
        drop(tx);

        assert!(gov.step().await.is_none());
    }

    #[tokio::test]
    async fn test_step_respects_priority_over_clock() {
        let mut gov = Governor::new();
        let (tx_hi, rx_hi) = mpsc::channel(4);
        let (tx_lo, rx_lo) = mpsc::channel(4);
        gov.add_read(rx_hi, 10, false).unwrap();
        gov.add_read(rx_lo, 0, false).unwrap();

        tx_hi.send(Ok(batch_with_docs(&[100]))).await.unwrap();
        tx_lo.send(Ok(batch_with_docs(&[1]))).await.unwrap();

        let first = gov.step().await.unwrap().unwrap();
        assert_eq!(first.clock, 100);
    }

    #[test]
    fn test_tick_reports_how_far_behind_a_ready_document_is() {
        let mut gov = Governor::new();
        let (_tx, rx) = mpsc::channel(4);
        gov.add_read(rx, 0, false).unwrap();
        gov.reads[0].slot = Slot::Active { doc: crate::arena::DecodedDoc { doc_json: bytes::Bytes::new(), packed_key: bytes::Bytes::new(), clock: 0, begin_offset: 0, end_offset: 0, terminal_error: None } };

        let delta = gov.tick().unwrap();
        assert!(delta > 0);
    }

    #[test]
    fn test_remove_marks_a_read_permanently_drained() {
        let mut gov = Governor::new();
        let (_tx, rx) = mpsc::channel(4);
        let index = gov.add_read(rx, 0, false).unwrap();
        gov.remove(index);
        assert!(gov.all_drained());
    }
}
