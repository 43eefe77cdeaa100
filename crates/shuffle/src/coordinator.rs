//! The coordinator: the resident service each shard consults to join a
//! shuffled read of a journal. Finds or starts the ring serving the exact
//! `(journal, shuffle, build, replay)` identity a request names, and
//! forwards the subscription to it.

use crate::config::JournalShuffleId;
use crate::ring::{RingHandle, SubscribeRequest};
use proto_flow::flow::{JournalShuffle, ShuffleRequest};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Coordinates shuffled reads for every shard this process is the
/// coordinator of. Owns the registry of live rings; a ring is started on
/// first subscription and torn down once its last subscriber departs.
#[derive(Clone)]
pub struct Coordinator {
    client: gazette::journal::Client,
    build_service: Arc<dyn crate::build::BuildService>,
    rings: Arc<Mutex<HashMap<JournalShuffleId, RingHandle>>>,
}

impl Coordinator {
    pub fn new(client: gazette::journal::Client, build_service: Arc<dyn crate::build::BuildService>) -> Self {
        Self { client, build_service, rings: Arc::new(Mutex::new(HashMap::new())) }
    }

    /// Subscribe `tx` to the shuffled read `req` names, spawning a new
    /// ring if none yet serves this exact identity. Returns `false` if the
    /// request was malformed and could not be dispatched at all; errors
    /// discovered afterward arrive over `tx` as `terminal_error` responses.
    pub async fn subscribe(&self, req: ShuffleRequest, tx: crate::subscriber::ResponseSender) -> bool {
        let Some(shuffle) = req.shuffle.clone() else {
            return false;
        };
        let Some(range) = req.range else {
            return false;
        };

        let id = identity(&shuffle);
        let ring = self.ring_for(&id, &shuffle).await;

        ring.subscribe(SubscribeRequest { range, offset: req.offset, end_offset: req.end_offset, tx }).await
    }

    async fn ring_for(&self, id: &JournalShuffleId, shuffle: &JournalShuffle) -> RingHandle {
        if let Some(ring) = self.rings.lock().unwrap().get(id).cloned() {
            return ring;
        }

        let build = self.build_service.acquire(&shuffle.build_id).await.unwrap_or_else(|_| crate::build::BuildHandle::new(&shuffle.build_id));
        let wire = shuffle.shuffle.clone().unwrap_or_default();
        let key_ptrs = if wire.uses_source_key { Vec::new() } else { wire.shuffle_key_ptr.clone() };

        let ring = crate::ring::spawn(self.client.clone(), shuffle.journal.clone(), wire.filter_r_clocks, key_ptrs, wire.source_uuid_ptr.clone(), build);

        let mut rings = self.rings.lock().unwrap();
        // Another task may have raced us to create this ring; keep
        // whichever was registered first and drop the loser.
        rings.entry(id.clone()).or_insert(ring).clone()
    }

    /// Remove a ring from the registry once its caller has observed it
    /// exit, so a future subscription starts a fresh one rather than
    /// handing a request to a dead channel.
    pub fn forget(&self, id: &JournalShuffleId) {
        self.rings.lock().unwrap().remove(id);
    }
}

fn identity(shuffle: &JournalShuffle) -> JournalShuffleId {
    let group_name = shuffle.shuffle.as_ref().map(|s| s.group_name.clone()).unwrap_or_default();
    JournalShuffleId {
        journal: shuffle.journal.clone(),
        coordinator: shuffle.coordinator.clone(),
        build_id: shuffle.build_id.clone(),
        replay: shuffle.replay,
        group_name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proto_flow::flow::Shuffle;

    struct NoopBuild;

    #[async_trait::async_trait]
    impl crate::build::BuildService for NoopBuild {
        async fn acquire(&self, build_id: &str) -> crate::Result<crate::build::BuildHandle> {
            Ok(crate::build::BuildHandle::new(build_id))
        }
    }

    #[test]
    fn test_identity_distinguishes_replay() {
        let shuffle = JournalShuffle {
            journal: "a/journal".to_string(),
            coordinator: "shard-1".to_string(),
            shuffle: Some(Shuffle { group_name: "derive/x".to_string(), ..Default::default() }),
            build_id: "build-1".to_string(),
            replay: false,
        };
        let mut replay = shuffle.clone();
        replay.replay = true;

        assert_ne!(identity(&shuffle), identity(&replay));
    }

    #[tokio::test]
    async fn test_subscribe_rejects_request_without_shuffle() {
        let router = gazette::Router::new("local");
        let client = gazette::journal::Client::new(router, proto_gazette::broker::process_spec::Id::default());
        let coordinator = Coordinator::new(client, Arc::new(NoopBuild));

        let (tx, _rx) = tokio::sync::mpsc::channel(1);
        assert!(!coordinator.subscribe(ShuffleRequest::default(), tx).await);
    }
}
