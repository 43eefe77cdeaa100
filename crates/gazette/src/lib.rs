//! A client for the subset of the Gazette broker protocol the shuffled-read
//! core depends on: dispatching RPCs to the right member of a dynamic
//! serving topology, listing and watching journal specs, and reading
//! journal content as a retryable stream.

pub mod journal;

mod router;
pub use router::Router;

use proto_gazette::broker;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid gRPC endpoint: '{0}'")]
    InvalidEndpoint(String),
    #[error(transparent)]
    Transport(#[from] tonic::transport::Error),
    #[error(transparent)]
    Grpc(#[from] tonic::Status),
    #[error("broker returned unexpected status {0:?}")]
    BrokerStatus(broker::Status),
    #[error("broker stream ended unexpectedly")]
    UnexpectedEof,
    #[error("invalid JSON document at journal offset {offset}")]
    InvalidJson { offset: i64, #[source] err: serde_json::Error },
    #[error("{0}")]
    Protocol(&'static str),
}

/// Dial a lazily-connecting Channel to the given address, which must be a
/// `host:port` pair (the scheme and path implied by the broker protocol).
pub(crate) async fn dial_channel(endpoint: &str) -> Result<tonic::transport::Channel> {
    let uri: tonic::transport::Uri = format!("http://{endpoint}")
        .parse()
        .map_err(|_| Error::InvalidEndpoint(endpoint.to_string()))?;

    Ok(tonic::transport::Endpoint::from(uri)
        .connect_timeout(std::time::Duration::from_secs(5))
        .connect_lazy())
}

pub(crate) fn check_ok<R>(status: broker::Status, r: R) -> Result<R> {
    if status == broker::Status::Ok {
        Ok(r)
    } else {
        Err(Error::BrokerStatus(status))
    }
}
