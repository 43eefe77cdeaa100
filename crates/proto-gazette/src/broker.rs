//! Types of the `gazette.broker` protobuf package, as used by journal
//! read/list/apply RPCs and by the routing topology.

use serde::{Deserialize, Serialize};

/// A name/value label attached to a journal spec or carried in a selector.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ::prost::Message)]
pub struct Label {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub value: String,
}

/// An unordered set of labels, always kept sorted by (name, value).
#[derive(Clone, PartialEq, Default, Serialize, Deserialize, ::prost::Message)]
pub struct LabelSet {
    #[prost(message, repeated, tag = "1")]
    pub labels: Vec<Label>,
}

/// Selects journals or shards having (or lacking) particular labels.
#[derive(Clone, PartialEq, Default, Serialize, Deserialize, ::prost::Message)]
pub struct LabelSelector {
    #[prost(message, optional, tag = "1")]
    pub include: Option<LabelSet>,
    #[prost(message, optional, tag = "2")]
    pub exclude: Option<LabelSet>,
}

pub mod journal_spec {
    use serde::{Deserialize, Serialize};

    #[derive(Clone, PartialEq, Default, Serialize, Deserialize, ::prost::Message)]
    pub struct Fragment {
        #[prost(int64, tag = "1")]
        pub length: i64,
        #[prost(int32, tag = "2")]
        pub compression_codec: i32,
        #[prost(string, repeated, tag = "3")]
        pub stores: Vec<String>,
        #[prost(int64, optional, tag = "4")]
        pub flush_interval_seconds: Option<i64>,
        #[prost(string, tag = "5")]
        pub path_postfix_template: String,
    }
}

/// The specification of a journal, as stored in Etcd and returned by List.
#[derive(Clone, PartialEq, Default, Serialize, Deserialize, ::prost::Message)]
pub struct JournalSpec {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(int32, tag = "2")]
    pub replication: i32,
    #[prost(message, optional, tag = "3")]
    pub labels: Option<LabelSet>,
    #[prost(message, optional, tag = "4")]
    pub fragment: Option<journal_spec::Fragment>,
    #[prost(uint32, tag = "5")]
    pub flags: u32,
    #[prost(int64, tag = "6")]
    pub max_append_rate: i64,
}

/// Member identity within the serving topology: a (zone, suffix) pair.
pub mod process_spec {
    use serde::{Deserialize, Serialize};

    #[derive(Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ::prost::Message)]
    pub struct Id {
        #[prost(string, tag = "1")]
        pub zone: String,
        #[prost(string, tag = "2")]
        pub suffix: String,
    }
}

/// The effective route to a journal or shard: its assignments and dial
/// endpoints, in matching order.
#[derive(Clone, PartialEq, Default, Serialize, Deserialize, ::prost::Message)]
pub struct Route {
    #[prost(int32, tag = "1")]
    pub primary: i32,
    #[prost(message, repeated, tag = "2")]
    pub members: Vec<process_spec::Id>,
    #[prost(string, repeated, tag = "3")]
    pub endpoints: Vec<String>,
}

#[derive(Clone, PartialEq, Default, Serialize, Deserialize, ::prost::Message)]
pub struct HeaderEtcd {
    #[prost(uint64, tag = "1")]
    pub cluster_id: u64,
    #[prost(uint64, tag = "2")]
    pub member_id: u64,
    #[prost(int64, tag = "3")]
    pub revision: i64,
    #[prost(uint64, tag = "4")]
    pub raft_term: u64,
}

/// Metadata attached to every broker response, describing the request's
/// resolved route and the Etcd revision it was served at.
#[derive(Clone, PartialEq, Default, Serialize, Deserialize, ::prost::Message)]
pub struct Header {
    #[prost(message, optional, tag = "1")]
    pub process_id: Option<process_spec::Id>,
    #[prost(message, optional, tag = "2")]
    pub route: Option<Route>,
    #[prost(message, optional, tag = "3")]
    pub etcd: Option<HeaderEtcd>,
}

#[derive(Clone, PartialEq, Default, Serialize, Deserialize, ::prost::Message)]
pub struct Sha1Sum {
    #[prost(uint64, tag = "1")]
    pub part1: u64,
    #[prost(uint64, tag = "2")]
    pub part2: u64,
    #[prost(uint32, tag = "3")]
    pub part3: u32,
}

/// A committed span of journal content, as served from a fragment store.
#[derive(Clone, PartialEq, Default, Serialize, Deserialize, ::prost::Message)]
pub struct Fragment {
    #[prost(string, tag = "1")]
    pub journal: String,
    #[prost(int64, tag = "2")]
    pub begin: i64,
    #[prost(int64, tag = "3")]
    pub end: i64,
    #[prost(message, optional, tag = "4")]
    pub sum: Option<Sha1Sum>,
    #[prost(int32, tag = "5")]
    pub compression_codec: i32,
    #[prost(string, tag = "6")]
    pub backing_store: String,
    #[prost(string, tag = "7")]
    pub path_postfix: String,
}

impl Fragment {
    pub fn compression_codec(&self) -> CompressionCodec {
        CompressionCodec::from_i32(self.compression_codec).unwrap_or(CompressionCodec::Invalid)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum CompressionCodec {
    Invalid = 0,
    None = 1,
    Gzip = 2,
    Zstandard = 3,
    Snappy = 4,
    GzipOffloadDecompression = 5,
}

impl CompressionCodec {
    pub fn from_i32(v: i32) -> Option<Self> {
        Some(match v {
            0 => Self::Invalid,
            1 => Self::None,
            2 => Self::Gzip,
            3 => Self::Zstandard,
            4 => Self::Snappy,
            5 => Self::GzipOffloadDecompression,
            _ => return None,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum Status {
    Ok = 0,
    JournalNotFound = 1,
    NoJournalBrokerAvailable = 2,
    NotJournalBroker = 3,
    InsufficientJournalBrokers = 4,
    OffsetNotYetAvailable = 5,
    WrongRoute = 6,
    ProposedMismatch = 7,
    EtcdTransactionFailed = 8,
    NotAllowed = 9,
    WrongAppendOffset = 10,
    IndexHasGreaterOffset = 11,
    RegisterMismatch = 12,
    FragmentStoreUnhealthy = 13,
}

impl Status {
    pub fn from_i32(v: i32) -> Option<Self> {
        Some(match v {
            0 => Self::Ok,
            1 => Self::JournalNotFound,
            2 => Self::NoJournalBrokerAvailable,
            3 => Self::NotJournalBroker,
            4 => Self::InsufficientJournalBrokers,
            5 => Self::OffsetNotYetAvailable,
            6 => Self::WrongRoute,
            7 => Self::ProposedMismatch,
            8 => Self::EtcdTransactionFailed,
            9 => Self::NotAllowed,
            10 => Self::WrongAppendOffset,
            11 => Self::IndexHasGreaterOffset,
            12 => Self::RegisterMismatch,
            13 => Self::FragmentStoreUnhealthy,
            _ => return None,
        })
    }

    pub fn as_str_name(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::JournalNotFound => "JOURNAL_NOT_FOUND",
            Self::NoJournalBrokerAvailable => "NO_JOURNAL_BROKER_AVAILABLE",
            Self::NotJournalBroker => "NOT_JOURNAL_BROKER",
            Self::InsufficientJournalBrokers => "INSUFFICIENT_JOURNAL_BROKERS",
            Self::OffsetNotYetAvailable => "OFFSET_NOT_YET_AVAILABLE",
            Self::WrongRoute => "WRONG_ROUTE",
            Self::ProposedMismatch => "PROPOSED_MISMATCH",
            Self::EtcdTransactionFailed => "ETCD_TRANSACTION_FAILED",
            Self::NotAllowed => "NOT_ALLOWED",
            Self::WrongAppendOffset => "WRONG_APPEND_OFFSET",
            Self::IndexHasGreaterOffset => "INDEX_HAS_GREATER_OFFSET",
            Self::RegisterMismatch => "REGISTER_MISMATCH",
            Self::FragmentStoreUnhealthy => "FRAGMENT_STORE_UNHEALTHY",
        }
    }
}

#[derive(Clone, PartialEq, Default, Serialize, Deserialize, ::prost::Message)]
pub struct ReadRequest {
    #[prost(string, tag = "1")]
    pub journal: String,
    #[prost(int64, tag = "2")]
    pub offset: i64,
    #[prost(bool, tag = "3")]
    pub block: bool,
    #[prost(bool, tag = "4")]
    pub do_not_proxy: bool,
    #[prost(bool, tag = "5")]
    pub metadata_only: bool,
    #[prost(int64, tag = "6")]
    pub end_offset: i64,
    #[prost(message, optional, tag = "7")]
    pub header: Option<Header>,
}

#[derive(Clone, PartialEq, Default, Serialize, Deserialize, ::prost::Message)]
pub struct ReadResponse {
    #[prost(int32, tag = "1")]
    pub status: i32,
    #[prost(message, optional, tag = "2")]
    pub header: Option<Header>,
    #[prost(int64, tag = "3")]
    pub offset: i64,
    #[prost(int64, tag = "4")]
    pub write_head: i64,
    #[prost(message, optional, tag = "5")]
    pub fragment: Option<Fragment>,
    #[prost(string, tag = "6")]
    pub fragment_url: String,
    #[prost(bytes = "bytes", tag = "7")]
    pub content: bytes::Bytes,
}

impl ReadResponse {
    pub fn status(&self) -> Status {
        Status::from_i32(self.status).unwrap_or(Status::Ok)
    }
}

#[derive(Clone, PartialEq, Default, Serialize, Deserialize, ::prost::Message)]
pub struct ListRequest {
    #[prost(message, optional, tag = "1")]
    pub selector: Option<LabelSelector>,
    #[prost(bool, tag = "2")]
    pub watch: bool,
    #[prost(message, optional, tag = "3")]
    pub watch_resume: Option<Header>,
}

#[derive(Clone, PartialEq, Default, Serialize, Deserialize, ::prost::Message)]
pub struct ListResponseJournal {
    #[prost(message, optional, tag = "1")]
    pub spec: Option<JournalSpec>,
    #[prost(int64, tag = "2")]
    pub mod_revision: i64,
    #[prost(message, optional, tag = "3")]
    pub route: Option<Route>,
}

#[derive(Clone, PartialEq, Default, Serialize, Deserialize, ::prost::Message)]
pub struct ListResponse {
    #[prost(int32, tag = "1")]
    pub status: i32,
    #[prost(message, optional, tag = "2")]
    pub header: Option<Header>,
    #[prost(message, repeated, tag = "3")]
    pub journals: Vec<ListResponseJournal>,
}

impl ListResponse {
    pub fn status(&self) -> Status {
        Status::from_i32(self.status).unwrap_or(Status::Ok)
    }
}

#[derive(Clone, PartialEq, Default, Serialize, Deserialize, ::prost::Message)]
pub struct ApplyRequestChange {
    #[prost(int64, tag = "1")]
    pub expect_mod_revision: i64,
    #[prost(message, optional, tag = "2")]
    pub upsert: Option<JournalSpec>,
    #[prost(string, tag = "3")]
    pub delete: String,
}

#[derive(Clone, PartialEq, Default, Serialize, Deserialize, ::prost::Message)]
pub struct ApplyRequest {
    #[prost(message, repeated, tag = "1")]
    pub changes: Vec<ApplyRequestChange>,
}

#[derive(Clone, PartialEq, Default, Serialize, Deserialize, ::prost::Message)]
pub struct ApplyResponse {
    #[prost(int32, tag = "1")]
    pub status: i32,
    #[prost(message, optional, tag = "2")]
    pub header: Option<Header>,
}

impl ApplyResponse {
    pub fn status(&self) -> Status {
        Status::from_i32(self.status).unwrap_or(Status::Ok)
    }
}

#[derive(Clone, PartialEq, Default, Serialize, Deserialize, ::prost::Message)]
pub struct FragmentsRequest {
    #[prost(string, tag = "1")]
    pub journal: String,
    /// Only fragments persisted at or after this time (in unix seconds)
    /// are returned.
    #[prost(int64, tag = "2")]
    pub begin_mod_time: i64,
    #[prost(int64, tag = "3")]
    pub end_mod_time: i64,
    #[prost(string, tag = "4")]
    pub next_page_token: String,
    #[prost(int32, tag = "5")]
    pub page_limit: i32,
}

pub mod fragments_response {
    use serde::{Deserialize, Serialize};

    #[derive(Clone, PartialEq, Default, Serialize, Deserialize, ::prost::Message)]
    pub struct Fragment {
        #[prost(message, optional, tag = "1")]
        pub spec: Option<super::Fragment>,
        #[prost(string, tag = "2")]
        pub signed_url: String,
    }
}

#[derive(Clone, PartialEq, Default, Serialize, Deserialize, ::prost::Message)]
pub struct FragmentsResponse {
    #[prost(int32, tag = "1")]
    pub status: i32,
    #[prost(message, optional, tag = "2")]
    pub header: Option<Header>,
    #[prost(message, repeated, tag = "3")]
    pub fragments: Vec<fragments_response::Fragment>,
    #[prost(string, tag = "4")]
    pub next_page_token: String,
}

impl FragmentsResponse {
    pub fn status(&self) -> Status {
        Status::from_i32(self.status).unwrap_or(Status::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_i32() {
        for s in [Status::Ok, Status::NotJournalBroker, Status::FragmentStoreUnhealthy] {
            assert_eq!(Status::from_i32(s as i32), Some(s));
        }
        assert_eq!(Status::from_i32(99), None);
    }

    #[test]
    fn test_label_set_serializes() {
        let set = LabelSet {
            labels: vec![Label {
                name: "estuary.dev/collection".to_string(),
                value: "acmeCo/widgets".to_string(),
            }],
        };
        let json = serde_json::to_string(&set).unwrap();
        assert!(json.contains("acmeCo/widgets"));
    }
}
