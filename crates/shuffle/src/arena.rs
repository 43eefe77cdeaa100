//! A growing byte arena backing one in-flight [`proto_flow::flow::ShuffleResponse`],
//! and the bookkeeping that keeps its capacity growing by power-of-two
//! steps toward recently observed demand without growing unboundedly.

use proto_flow::flow::{Slice, UuidParts};

/// Arena capacity never shrinks below this, nor grows past it.
pub const ARENA_CAP_MIN: usize = 4 * 1024;
pub const ARENA_CAP_MAX: usize = 1024 * 1024;

/// Docs-vector capacity bounds, mirroring the arena's.
pub const DOCS_CAP_MIN: usize = 64;
pub const DOCS_CAP_MAX: usize = 4096;

/// A pending [`proto_flow::flow::ShuffleResponse`] being assembled
/// document-by-document, plus the recent-size tracking that informs the
/// next response's initial capacity.
pub struct ResponseBuilder {
    arena: Vec<u8>,
    docs_json: Vec<Slice>,
    offsets: Vec<i64>,
    uuid_parts: Vec<UuidParts>,
    packed_key: Vec<Slice>,
    terminal_error: String,
    last_arena: usize,
    last_docs: usize,
}

impl ResponseBuilder {
    pub fn new() -> Self {
        Self::with_capacity(ARENA_CAP_MIN, DOCS_CAP_MIN)
    }

    fn with_capacity(arena_cap: usize, docs_cap: usize) -> Self {
        Self {
            arena: Vec::with_capacity(arena_cap),
            docs_json: Vec::with_capacity(docs_cap),
            offsets: Vec::with_capacity(docs_cap),
            uuid_parts: Vec::with_capacity(docs_cap),
            packed_key: Vec::with_capacity(docs_cap),
            terminal_error: String::new(),
            last_arena: arena_cap,
            last_docs: docs_cap,
        }
    }

    /// True if appending one more document of roughly `doc_len` bytes and
    /// `key_len` key bytes would overflow either capacity bound: the
    /// caller should flush the current response and start a fresh one
    /// before appending.
    pub fn would_overflow(&self, doc_len: usize, key_len: usize) -> bool {
        self.arena.len() + doc_len + key_len > ARENA_CAP_MAX || self.docs_json.len() + 1 > DOCS_CAP_MAX
    }

    pub fn is_empty(&self) -> bool {
        self.docs_json.is_empty() && self.terminal_error.is_empty()
    }

    /// Append one document: its raw JSON bytes, UUID parts, offset pair,
    /// and packed shuffle key bytes.
    pub fn push_doc(&mut self, doc_json: &[u8], uuid: UuidParts, begin_offset: i64, end_offset: i64, packed_key: &[u8]) {
        let doc_slice = self.append_arena(doc_json);
        self.docs_json.push(doc_slice);
        self.uuid_parts.push(uuid);
        self.offsets.push(begin_offset);
        self.offsets.push(end_offset);

        let key_slice = self.append_arena(packed_key);
        self.packed_key.push(key_slice);
    }

    pub fn set_terminal_error(&mut self, err: String) {
        self.terminal_error = err;
    }

    fn append_arena(&mut self, bytes: &[u8]) -> Slice {
        let begin = self.arena.len() as u32;
        self.arena.extend_from_slice(bytes);
        Slice { begin, end: self.arena.len() as u32 }
    }

    /// Finish this response, and return the next builder, whose initial
    /// capacity is the power-of-two that would have just contained this
    /// one's final size (bounded).
    pub fn finish(self, read_through: i64, write_head: i64) -> (proto_flow::flow::ShuffleResponse, ResponseBuilder) {
        let next_arena_cap = grow_toward(self.last_arena, self.arena.len(), ARENA_CAP_MIN, ARENA_CAP_MAX);
        let next_docs_cap = grow_toward(self.last_docs, self.docs_json.len(), DOCS_CAP_MIN, DOCS_CAP_MAX);

        let resp = proto_flow::flow::ShuffleResponse {
            terminal_error: self.terminal_error,
            arena: self.arena.into(),
            offsets: self.offsets,
            docs_json: self.docs_json,
            uuid_parts: self.uuid_parts,
            packed_key: self.packed_key,
            read_through,
            write_head,
        };
        (resp, ResponseBuilder::with_capacity(next_arena_cap, next_docs_cap))
    }
}

impl Default for ResponseBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Pick the next power-of-two capacity that covers `observed`, without
/// shrinking below `prev` by more than one halving and never leaving
/// `[min, max]`.
fn grow_toward(prev: usize, observed: usize, min: usize, max: usize) -> usize {
    let mut cap = prev.clamp(min, max);
    while cap < observed && cap < max {
        cap = (cap * 2).min(max);
    }
    while cap / 2 >= observed.max(min) && cap > min {
        cap /= 2;
    }
    cap.clamp(min, max)
}

/// One document decoded back out of a [`proto_flow::flow::ShuffleResponse`]'s
/// arena, on the client side of a read: owned, rather than borrowing the
/// response's arena, so the governor can hold documents from many reads
/// at once without juggling each one's lifetime.
#[derive(Debug, Clone)]
pub struct DecodedDoc {
    pub doc_json: bytes::Bytes,
    pub packed_key: bytes::Bytes,
    pub clock: u64,
    pub begin_offset: i64,
    pub end_offset: i64,
    pub terminal_error: Option<String>,
}

impl DecodedDoc {
    pub fn terminal_error(err: String) -> Self {
        Self { doc_json: bytes::Bytes::new(), packed_key: bytes::Bytes::new(), clock: 0, begin_offset: 0, end_offset: 0, terminal_error: Some(err) }
    }
}

/// Decode every document out of `resp`, slicing its arena once per
/// document rather than copying it whole.
pub fn decode_docs(resp: &proto_flow::flow::ShuffleResponse) -> Vec<DecodedDoc> {
    resp.docs_json
        .iter()
        .enumerate()
        .map(|(i, doc_slice)| DecodedDoc {
            doc_json: resp.arena.slice(doc_slice.begin as usize..doc_slice.end as usize),
            packed_key: resp.packed_key.get(i).map(|s| resp.arena.slice(s.begin as usize..s.end as usize)).unwrap_or_default(),
            clock: resp.uuid_parts.get(i).map(|p| p.clock).unwrap_or_default(),
            begin_offset: resp.offsets.get(2 * i).copied().unwrap_or_default(),
            end_offset: resp.offsets.get(2 * i + 1).copied().unwrap_or_default(),
            terminal_error: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_finish_round_trips_slices() {
        let mut b = ResponseBuilder::new();
        let uuid = UuidParts { node: 1, clock: 2 };
        b.push_doc(b"{\"a\":1}", uuid, 0, 8, b"\x01");
        assert!(!b.is_empty());

        let (resp, _next) = b.finish(8, 100);
        assert_eq!(resp.docs_json.len(), 1);
        let doc_slice = resp.docs_json[0];
        assert_eq!(&resp.arena[doc_slice.begin as usize..doc_slice.end as usize], b"{\"a\":1}");
        assert_eq!(resp.read_through, 8);
        assert_eq!(resp.write_head, 100);
    }

    #[test]
    fn test_would_overflow_respects_caps() {
        let b = ResponseBuilder::new();
        assert!(!b.would_overflow(10, 4));
        assert!(b.would_overflow(ARENA_CAP_MAX + 1, 0));
    }

    #[test]
    fn test_decode_docs_round_trips_builder_output() {
        let mut b = ResponseBuilder::new();
        b.push_doc(b"{\"a\":1}", UuidParts { node: 1, clock: 42 }, 0, 8, b"\x01\x02");
        b.push_doc(b"{\"b\":2}", UuidParts { node: 1, clock: 43 }, 8, 16, b"\x03");
        let (resp, _next) = b.finish(16, 100);

        let docs = decode_docs(&resp);
        assert_eq!(docs.len(), 2);
        assert_eq!(&docs[0].doc_json[..], b"{\"a\":1}");
        assert_eq!(docs[0].clock, 42);
        assert_eq!((docs[0].begin_offset, docs[0].end_offset), (0, 8));
        assert_eq!(&docs[1].doc_json[..], b"{\"b\":2}");
        assert_eq!((docs[1].begin_offset, docs[1].end_offset), (8, 16));
    }

    #[test]
    fn test_grow_toward_is_power_of_two_and_bounded() {
        assert_eq!(grow_toward(ARENA_CAP_MIN, 0, ARENA_CAP_MIN, ARENA_CAP_MAX), ARENA_CAP_MIN);
        assert_eq!(grow_toward(ARENA_CAP_MIN, ARENA_CAP_MIN * 3, ARENA_CAP_MIN, ARENA_CAP_MAX), ARENA_CAP_MIN * 4);
        assert_eq!(grow_toward(ARENA_CAP_MAX, ARENA_CAP_MAX * 10, ARENA_CAP_MIN, ARENA_CAP_MAX), ARENA_CAP_MAX);
    }
}
