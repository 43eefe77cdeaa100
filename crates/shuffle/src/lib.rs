//! The shuffled-read coordination core: routes produced documents to
//! physical journal partitions on the write path, and on the read path
//! reads each journal exactly once on behalf of many subscribing shards,
//! merging their concurrent reads into a single ordered document stream.

pub mod arena;
pub mod build;
pub mod config;
pub mod coordinator;
pub mod governor;
pub mod key;
pub mod listing;
pub mod logging;
pub mod mapper;
pub mod merge;
pub mod message;
pub mod read;
pub mod read_builder;
pub mod replay;
pub mod ring;
pub mod subscriber;

mod api;
pub use api::{ShuffleClient, ShuffleService};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Gazette(#[from] gazette::Error),
    #[error(transparent)]
    Labels(#[from] labels::Error),
    #[error("creating partition {name}: {status:?}")]
    CreatePartition { name: String, status: proto_gazette::broker::Status },
    #[error("document extraction: {0}")]
    Extraction(String),
    #[error("{0}")]
    Terminal(String),
    #[error("journal listing is no longer available: {0}")]
    ListingUnavailable(String),
    #[error("subscriber range [{key_begin:08x},{key_end:08x}] overlaps an existing live subscriber")]
    SubscriberConflict { key_begin: u32, key_end: u32 },
    #[error("the top-most read on the ring's stack may not carry an EndOffset")]
    TopMostReadHasEndOffset,
}

impl Error {
    /// Render this error the way a [`proto_flow::flow::ShuffleResponse`]
    /// carries it: as a `terminal_error` string, never as an out-of-band
    /// channel.
    pub fn as_terminal_error(&self) -> String {
        self.to_string()
    }
}

lazy_static::lazy_static! {
    pub(crate) static ref PARTITIONS_CREATED: prometheus::IntCounterVec = prometheus::register_int_counter_vec!(
        "flow_collection_partitions_created_total",
        "Number of new physical partitions created by the mapper, by collection.",
        &["collection"],
    )
    .unwrap();
    pub(crate) static ref GOVERNOR_CLOCK_DELTA_SECONDS: prometheus::IntGauge = prometheus::register_int_gauge!(
        "flow_shuffle_governor_clock_delta_seconds",
        "How far behind wall-clock time the furthest-behind ready read in a governor's merge is.",
    )
    .unwrap();
}
