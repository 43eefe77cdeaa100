//! One (shuffle, journal) server-side reader: a single reconnecting read
//! of the source journal, fanned out to every subscribing shard through a
//! [`SubscriberSet`]. Key and UUID extraction happen exactly once per
//! document, regardless of how many subscribers claim it.

use crate::subscriber::{AddOutcome, ResponseSender, Subscriber, SubscriberSet};
use futures::StreamExt;
use gazette::journal::{Client, ReadJsonLine};
use proto_flow::flow::RangeSpec;
use proto_gazette::broker;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// A request to add a new subscriber to a running ring.
pub struct SubscribeRequest {
    pub range: RangeSpec,
    pub offset: i64,
    pub end_offset: i64,
    pub tx: ResponseSender,
}

/// A live handle to a ring's main loop. Dropping every clone causes the
/// ring to observe its subscribe channel close and exit once its current
/// subscribers have drained.
#[derive(Clone)]
pub struct RingHandle {
    subscribe: mpsc::Sender<SubscribeRequest>,
}

impl RingHandle {
    pub async fn subscribe(&self, req: SubscribeRequest) -> bool {
        self.subscribe.send(req).await.is_ok()
    }
}

/// Spawn a ring reading `journal`, extracting shuffle keys at `key_ptrs`
/// and the document UUID at `uuid_ptr`, holding `build` alive for as long
/// as the ring runs.
pub fn spawn(client: Client, journal: String, filter_r_clocks: bool, key_ptrs: Vec<String>, uuid_ptr: String, build: crate::build::BuildHandle) -> RingHandle {
    let (tx, rx) = mpsc::channel(8);
    tokio::spawn(run(client, journal, filter_r_clocks, key_ptrs, uuid_ptr, rx, build));
    RingHandle { subscribe: tx }
}

struct Extractors {
    key: Vec<doc::Extractor>,
    uuid_ptr: doc::Pointer,
}

async fn run(
    client: Client,
    journal: String,
    filter_r_clocks: bool,
    key_ptrs: Vec<String>,
    uuid_ptr: String,
    mut subscribe_rx: mpsc::Receiver<SubscribeRequest>,
    build: crate::build::BuildHandle,
) {
    let set = Arc::new(Mutex::new(SubscriberSet::new()));
    let extractors = Arc::new(Extractors {
        key: key_ptrs.iter().map(|p| doc::Extractor::new(p)).collect(),
        uuid_ptr: doc::Pointer::parse(&uuid_ptr),
    });

    while let Some(req) = subscribe_rx.recv().await {
        let mut guard = set.lock().await;
        guard.prune();

        let sub = Subscriber::new(req.range, req.offset, req.end_offset, filter_r_clocks, req.tx);
        match guard.add(sub) {
            AddOutcome::Queued => (),
            AddOutcome::Conflict(sub) => {
                drop(guard);
                sub.reject(crate::Error::SubscriberConflict { key_begin: req.range.key_begin, key_end: req.range.key_end }).await;
            }
            AddOutcome::StartRead { offset, end_offset } => {
                drop(guard);
                tokio::spawn(read_loop(client.clone(), journal.clone(), offset, end_offset, extractors.clone(), set.clone()));
            }
        }
    }

    build.release();
}

/// Read `journal` from `offset` to `end_offset` (0 meaning unbounded,
/// tailing), staging and flushing every document into `set` as it's read.
async fn read_loop(client: Client, journal: String, offset: i64, end_offset: i64, extractors: Arc<Extractors>, set: Arc<Mutex<SubscriberSet>>) {
    let req = broker::ReadRequest {
        journal: journal.clone(),
        offset,
        end_offset,
        block: end_offset == 0,
        do_not_proxy: false,
        metadata_only: false,
        header: None,
    };

    let mut stream = client.read_json_lines(req);
    let mut offset_begin = offset;

    while let Some(item) = stream.next().await {
        match item {
            Ok(ReadJsonLine::Meta(resp)) => {
                let mut guard = set.lock().await;
                guard.set_write_head(resp.write_head);
            }
            Ok(ReadJsonLine::Doc { root, next_offset }) => {
                let Some(parts) = crate::message::extract_uuid(&extractors.uuid_ptr, &root) else {
                    offset_begin = next_offset;
                    continue;
                };
                let is_ack = crate::message::is_ack(&parts);
                let packed_key = doc::Extractor::extract_all(&extractors.key, &root);
                let key_hash = crate::key::packed_key_hash(&packed_key);
                let r_clock_hash = crate::message::r_clock_hash(&parts);
                let doc_json = serde_json::to_vec(&root).unwrap_or_default();

                let mut guard = set.lock().await;
                guard.stage(offset_begin, next_offset, &doc_json, parts, &packed_key, key_hash, r_clock_hash, is_ack);
                guard.flush().await;
                offset_begin = next_offset;
            }
            Err(err) => {
                let mut guard = set.lock().await;
                guard.stage_terminal_error(&err.into());
                guard.flush().await;
                return;
            }
        }
    }
}
