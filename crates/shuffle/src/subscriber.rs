//! The per-ring collection of active subscribers: one read request per
//! subscribing shard, staged and flushed as the ring's journal reader
//! produces documents.
//!
//! A Go-style intrusive linked list of overlapping replay subscribers is
//! modeled here as a small deque per range slot: the front entry is the
//! one currently receiving documents, and later entries start once it
//! completes its bounded range.

use crate::arena::ResponseBuilder;
use proto_flow::flow::{RangeSpec, UuidParts};
use std::collections::VecDeque;
use tokio::sync::mpsc;

pub type ResponseSender = mpsc::Sender<crate::Result<proto_flow::flow::ShuffleResponse>>;

/// One client's subscription to a ring: its claimed range, its requested
/// offset bounds, and where to send staged responses.
pub struct Subscriber {
    pub range: RangeSpec,
    pub offset: i64,
    pub end_offset: i64,
    pub filter_r_clocks: bool,
    tx: ResponseSender,
    staged: ResponseBuilder,
    read_through: i64,
    write_head: i64,
    tailing_announced: bool,
}

impl Subscriber {
    pub fn new(range: RangeSpec, offset: i64, end_offset: i64, filter_r_clocks: bool, tx: ResponseSender) -> Self {
        Self {
            range,
            offset,
            end_offset,
            filter_r_clocks,
            tx,
            staged: ResponseBuilder::new(),
            read_through: offset,
            write_head: offset,
            tailing_announced: false,
        }
    }

    /// Does this subscriber's range overlap `other`'s, over the key axis?
    /// Two overlapping, both-unbounded subscribers at the same offset are
    /// a conflict the caller must reject rather than add.
    pub fn key_range_overlaps(&self, other: &RangeSpec) -> bool {
        self.range.key_begin <= other.key_end && other.key_begin <= self.range.key_end
    }

    fn claims(&self, key_hash: u32, r_clock_hash: u32) -> bool {
        let key_ok = self.range.key_begin <= key_hash && key_hash <= self.range.key_end;
        if !self.filter_r_clocks {
            return key_ok;
        }
        key_ok && self.range.r_clock_begin <= r_clock_hash && r_clock_hash <= self.range.r_clock_end
    }

    /// Consume this subscriber, telling it why it could never be served.
    pub async fn reject(self, err: crate::Error) {
        let _ = self.tx.send(Err(err)).await;
    }
}

/// One range slot's subscriber chain: `head` is actively reading, `queue`
/// holds replay subscribers waiting for `head` to reach their start.
struct Chain {
    head: Subscriber,
    queue: VecDeque<Subscriber>,
}

/// Outcome of attempting to add a subscriber: either it was queued behind
/// an existing read, or it needs its own new read started at the given
/// `[offset, end_offset)`.
pub enum AddOutcome {
    Queued,
    StartRead { offset: i64, end_offset: i64 },
    Conflict(Subscriber),
}

#[derive(Default)]
pub struct SubscriberSet {
    chains: Vec<Chain>,
}

impl SubscriberSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// Remove subscribers whose send side is closed (the shard disconnected
    /// or was replaced by a child range after a split).
    pub fn prune(&mut self) {
        self.chains.retain_mut(|chain| {
            chain.queue.retain(|s| !s.tx.is_closed());
            !chain.head.tx.is_closed() || chain.promote()
        });
    }

    /// Add a new subscriber, applying the add rules from the ring design:
    /// first subscriber at an offset starts an unbounded read; an earlier
    /// offset starts a bounded catch-up read; a subscriber whose bounded
    /// range precedes an existing one queues ahead of it; two live
    /// unbounded subscribers at overlapping ranges conflict.
    pub fn add(&mut self, sub: Subscriber) -> AddOutcome {
        if let Some(chain) = self.chains.iter_mut().find(|c| c.head.key_range_overlaps(&sub.range)) {
            return chain.add(sub);
        }

        let offset = sub.offset;
        let end_offset = sub.end_offset;
        self.chains.push(Chain { head: sub, queue: VecDeque::new() });
        AddOutcome::StartRead { offset, end_offset }
    }

    /// Stage `doc` on every subscriber whose range claims it (or every
    /// subscriber, if `is_ack`), re-indexing it into each subscriber's own
    /// response arena.
    pub fn stage(&mut self, journal_offset_begin: i64, journal_offset_end: i64, doc_json: &[u8], uuid: UuidParts, packed_key: &[u8], key_hash: u32, r_clock_hash: u32, is_ack: bool) {
        for chain in &mut self.chains {
            let sub = &mut chain.head;
            if is_ack || sub.claims(key_hash, r_clock_hash) {
                if sub.staged.would_overflow(doc_json.len(), packed_key.len()) {
                    // Caller's flush() is expected to run between stage
                    // calls at journal-line granularity, so this should be
                    // rare; guard anyway so arenas never exceed the cap.
                    continue;
                }
                sub.staged.push_doc(doc_json, uuid, journal_offset_begin, journal_offset_end, packed_key);
            }
            sub.read_through = journal_offset_end;
        }
    }

    pub fn set_write_head(&mut self, write_head: i64) {
        for chain in &mut self.chains {
            chain.head.write_head = write_head;
        }
    }

    pub fn stage_terminal_error(&mut self, err: &crate::Error) {
        for chain in &mut self.chains {
            chain.head.staged.set_terminal_error(err.as_terminal_error());
        }
    }

    /// Flush every subscriber with a non-trivial staged response (has
    /// documents, a terminal error, or a first-response tailing
    /// announcement). Completed bounded subscribers are popped and
    /// replaced by the next queued subscriber, if any.
    pub async fn flush(&mut self) {
        let mut i = 0;
        while i < self.chains.len() {
            let done = self.chains[i].flush_head().await;
            if done {
                if !self.chains[i].promote() {
                    self.chains.remove(i);
                    continue;
                }
            }
            i += 1;
        }
    }
}

impl Chain {
    fn add(&mut self, sub: Subscriber) -> AddOutcome {
        if sub.offset < self.head.offset {
            // A catch-up read bounded by the current minimum offset.
            let (offset, end_offset) = (sub.offset, self.head.offset);
            self.queue.push_front(std::mem::replace(&mut self.head, sub));
            return AddOutcome::StartRead { offset, end_offset };
        }

        if sub.end_offset != 0 && self.head.end_offset == 0 && sub.end_offset <= self.head.offset {
            // The new, bounded subscriber finishes before the existing
            // head has read that far: it can be served standalone and
            // then fall through to share the head's ongoing read.
            let (offset, end_offset) = (sub.offset, sub.end_offset);
            self.queue.push_front(std::mem::replace(&mut self.head, sub));
            return AddOutcome::StartRead { offset, end_offset };
        }

        if self.head.end_offset == 0 && sub.end_offset == 0 {
            return AddOutcome::Conflict(sub);
        }

        self.queue.push_back(sub);
        AddOutcome::Queued
    }

    /// Pop the next queued subscriber into `head`, if any. Returns false
    /// if the chain is now empty and should be removed.
    fn promote(&mut self) -> bool {
        match self.queue.pop_front() {
            Some(next) => {
                self.head = next;
                true
            }
            None => false,
        }
    }

    async fn flush_head(&mut self) -> bool {
        let sub = &mut self.head;
        let should_send = !sub.staged.is_empty() || !sub.tailing_announced;
        let bounded_done = sub.end_offset != 0 && sub.read_through >= sub.end_offset;

        if should_send {
            sub.tailing_announced = true;
            let (resp, next) = std::mem::replace(&mut sub.staged, ResponseBuilder::new()).finish(sub.read_through, sub.write_head);
            sub.staged = next;
            if sub.tx.send(Ok(resp)).await.is_err() {
                return true; // Send failed: treat like a completed bounded read.
            }
        }

        bounded_done
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(key_begin: u32, key_end: u32) -> RangeSpec {
        RangeSpec { key_begin, key_end, r_clock_begin: 0, r_clock_end: u32::MAX }
    }

    #[tokio::test]
    async fn test_first_subscriber_starts_unbounded_read() {
        let mut set = SubscriberSet::new();
        let (tx, _rx) = mpsc::channel(4);
        let sub = Subscriber::new(range(0, u32::MAX), 100, 0, false, tx);

        match set.add(sub) {
            AddOutcome::StartRead { offset, end_offset } => {
                assert_eq!(offset, 100);
                assert_eq!(end_offset, 0);
            }
            _ => panic!("expected StartRead"),
        }
    }

    #[tokio::test]
    async fn test_conflicting_unbounded_subscribers() {
        let mut set = SubscriberSet::new();
        let (tx1, _rx1) = mpsc::channel(4);
        let (tx2, _rx2) = mpsc::channel(4);

        assert!(matches!(set.add(Subscriber::new(range(0, u32::MAX), 0, 0, false, tx1)), AddOutcome::StartRead { .. }));
        match set.add(Subscriber::new(range(0, u32::MAX), 0, 0, false, tx2)) {
            AddOutcome::Conflict(_) => (),
            _ => panic!("expected a conflict"),
        }
    }

    #[tokio::test]
    async fn test_ack_broadcasts_regardless_of_key_range() {
        let mut set = SubscriberSet::new();
        let (tx_low, mut rx_low) = mpsc::channel(4);
        let (tx_high, mut rx_high) = mpsc::channel(4);
        set.add(Subscriber::new(range(0, 0x7fffffff), 0, 0, false, tx_low));
        set.add(Subscriber::new(range(0x80000000, u32::MAX), 0, 0, false, tx_high));

        set.stage(0, 8, b"{}", UuidParts::default(), b"", 0xffffffff, 0, true);
        set.flush().await;

        assert!(rx_low.try_recv().is_ok());
        assert!(rx_high.try_recv().is_ok());
    }
}
