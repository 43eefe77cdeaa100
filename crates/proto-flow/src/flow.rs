use proto_gazette::broker::{Header, JournalSpec, LabelSelector};
use serde::{Deserialize, Serialize};

/// A contiguous slice of an Arena, expressed as byte offsets.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Serialize, Deserialize, ::prost::Message)]
pub struct Slice {
    #[prost(uint32, tag = "1")]
    pub begin: u32,
    #[prost(uint32, tag = "2")]
    pub end: u32,
}

/// The embedded UUID of a document, split into its node and clock parts.
/// `clock` encodes both a timestamp and a per-producer sequence counter;
/// `node` carries the producer's r-clock bits in its low byte.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Serialize, Deserialize, ::prost::Message)]
pub struct UuidParts {
    #[prost(uint64, tag = "1")]
    pub node: u64,
    #[prost(uint64, tag = "2")]
    pub clock: u64,
}

/// The [begin, end) hash ranges owned by one split of a task, across both
/// the partitioned key space and the read-time r-clock space.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Serialize, Deserialize, ::prost::Message)]
pub struct RangeSpec {
    #[prost(uint32, tag = "1")]
    pub key_begin: u32,
    #[prost(uint32, tag = "2")]
    pub key_end: u32,
    #[prost(uint32, tag = "3")]
    pub r_clock_begin: u32,
    #[prost(uint32, tag = "4")]
    pub r_clock_end: u32,
}

impl RangeSpec {
    /// The full, unsplit range.
    pub fn full_range() -> Self {
        Self {
            key_begin: u32::MIN,
            key_end: u32::MAX,
            r_clock_begin: u32::MIN,
            r_clock_end: u32::MAX,
        }
    }

    /// Does this range include the given (key, r-clock) hash pair? Ranges
    /// are inclusive on both ends, so a full-coverage range (`key_end` /
    /// `r_clock_end` at `u32::MAX`) includes the maximal hash value.
    pub fn includes(&self, key_hash: u32, r_clock_hash: u32) -> bool {
        self.key_begin <= key_hash
            && key_hash <= self.key_end
            && self.r_clock_begin <= r_clock_hash
            && r_clock_hash <= self.r_clock_end
    }

    /// Does this range overlap another, over the key axis only?
    pub fn overlaps_key_range(&self, other: &Self) -> bool {
        self.key_begin <= other.key_end && other.key_begin <= self.key_end
    }
}

/// A static, schema-derived projection of a document location.
#[derive(Clone, PartialEq, Default, Debug, Serialize, Deserialize, ::prost::Message)]
pub struct Projection {
    #[prost(string, tag = "1")]
    pub ptr: String,
    #[prost(string, tag = "2")]
    pub field: String,
    #[prost(bool, tag = "3")]
    pub is_primary_key: bool,
    #[prost(bool, tag = "4")]
    pub is_partition_key: bool,
}

/// The catalog specification of a Flow collection, trimmed to the fields
/// the shuffled-read core consults: its key and partitioning, its journal
/// template, and where document UUIDs live.
#[derive(Clone, PartialEq, Default, Debug, Serialize, Deserialize, ::prost::Message)]
pub struct CollectionSpec {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, repeated, tag = "2")]
    pub key_ptrs: Vec<String>,
    #[prost(string, repeated, tag = "3")]
    pub partition_fields: Vec<String>,
    #[prost(message, repeated, tag = "4")]
    pub projections: Vec<Projection>,
    #[prost(string, tag = "5")]
    pub uuid_ptr: String,
    #[prost(bytes = "bytes", tag = "6")]
    pub ack_template_json: bytes::Bytes,
    #[prost(message, optional, tag = "7")]
    pub partition_template: Option<JournalSpec>,
}

/// The shuffle a reader applies to documents of `source_collection` before
/// it sees them: which key to extract or lambda to invoke, and whether
/// r-clock filtering applies.
#[derive(Clone, PartialEq, Default, Debug, Serialize, Deserialize, ::prost::Message)]
pub struct Shuffle {
    #[prost(string, tag = "1")]
    pub group_name: String,
    #[prost(string, tag = "2")]
    pub source_collection: String,
    #[prost(message, optional, tag = "3")]
    pub source_partitions: Option<LabelSelector>,
    #[prost(string, tag = "4")]
    pub source_uuid_ptr: String,
    #[prost(string, repeated, tag = "5")]
    pub shuffle_key_ptr: Vec<String>,
    #[prost(bool, tag = "6")]
    pub uses_source_key: bool,
    #[prost(bytes = "bytes", tag = "7")]
    pub shuffle_lambda_config_json: bytes::Bytes,
    #[prost(bool, tag = "8")]
    pub uses_source_schema: bool,
    #[prost(bytes = "bytes", tag = "9")]
    pub validate_schema_json: bytes::Bytes,
    #[prost(bool, tag = "10")]
    pub filter_r_clocks: bool,
    #[prost(uint32, tag = "11")]
    pub read_delay_seconds: u32,
    #[prost(uint32, tag = "12")]
    pub priority: u32,
}

/// The identity of a shuffled read: which journal, shuffled under which
/// configuration, coordinated by which shard.
#[derive(Clone, PartialEq, Default, Debug, Serialize, Deserialize, ::prost::Message)]
pub struct JournalShuffle {
    #[prost(string, tag = "1")]
    pub journal: String,
    #[prost(string, tag = "2")]
    pub coordinator: String,
    #[prost(message, optional, tag = "3")]
    pub shuffle: Option<Shuffle>,
    #[prost(string, tag = "4")]
    pub build_id: String,
    #[prost(bool, tag = "5")]
    pub replay: bool,
}

/// A request to begin (or resume) a shuffled read at a coordinator.
#[derive(Clone, PartialEq, Default, Debug, Serialize, Deserialize, ::prost::Message)]
pub struct ShuffleRequest {
    #[prost(message, optional, tag = "1")]
    pub shuffle: Option<JournalShuffle>,
    #[prost(message, optional, tag = "2")]
    pub range: Option<RangeSpec>,
    #[prost(int64, tag = "3")]
    pub offset: i64,
    #[prost(int64, tag = "4")]
    pub end_offset: i64,
    /// Coordinator shard resolved locally by the caller; included so the
    /// coordinator can detect and reject a request that reached it stale.
    #[prost(message, optional, tag = "5")]
    pub resolution: Option<Header>,
}

/// A batch of shuffled documents. Document bytes, packed shuffle keys, and
/// other variable-length content are appended to `arena` and referenced by
/// `Slice`s elsewhere in the message, mirroring how the source journal
/// fragment content is held without being copied per-document.
#[derive(Clone, PartialEq, Default, Debug, Serialize, Deserialize, ::prost::Message)]
pub struct ShuffleResponse {
    /// Non-empty if the coordinator cannot continue serving this read, e.g.
    /// because this range is no longer assigned to it.
    #[prost(string, tag = "1")]
    pub terminal_error: String,
    /// Byte content referenced by every `Slice` in this message.
    #[prost(bytes = "bytes", tag = "2")]
    pub arena: bytes::Bytes,
    /// Journal offsets spanned by each document, as adjacent (begin, end)
    /// pairs: `offsets[2*i]` is the begin offset of document `i`.
    #[prost(int64, repeated, tag = "3")]
    pub offsets: Vec<i64>,
    /// Raw JSON of each document, one `Slice` per document in `offsets`.
    #[prost(message, repeated, tag = "4")]
    pub docs_json: Vec<Slice>,
    #[prost(message, repeated, tag = "5")]
    pub uuid_parts: Vec<UuidParts>,
    /// Tuple-packed shuffle key of each document.
    #[prost(message, repeated, tag = "6")]
    pub packed_key: Vec<Slice>,
    /// The largest offset through which the coordinator has read the
    /// source journal, whether or not it yielded a document in this batch.
    #[prost(int64, tag = "7")]
    pub read_through: i64,
    /// The source journal's last known write head.
    #[prost(int64, tag = "8")]
    pub write_head: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_includes() {
        let r = RangeSpec {
            key_begin: 10,
            key_end: 20,
            r_clock_begin: u32::MIN,
            r_clock_end: u32::MAX,
        };
        assert!(r.includes(10, 0));
        assert!(r.includes(20, 0));
        assert!(!r.includes(21, 0));
        assert!(!r.includes(9, 0));
    }

    #[test]
    fn test_range_includes_the_maximal_key_of_a_full_coverage_range() {
        assert!(RangeSpec::full_range().includes(u32::MAX, u32::MAX));
    }

    #[test]
    fn test_range_overlaps() {
        let a = RangeSpec { key_begin: 0, key_end: 10, ..RangeSpec::full_range() };
        let b = RangeSpec { key_begin: 5, key_end: 15, ..RangeSpec::full_range() };
        let c = RangeSpec { key_begin: 21, key_end: 30, ..RangeSpec::full_range() };
        assert!(a.overlaps_key_range(&b));
        assert!(!a.overlaps_key_range(&c));
    }
}
