//! The shuffle RPC surface: the single `Shuffle(request) -> stream<response>`
//! method a coordinator exposes to the shards reading through it.
//!
//! No `.proto` source is available in this tree to drive `tonic-build`
//! codegen, so the client is written directly against
//! `tonic::client::Grpc`, the same way `gazette::journal::grpc::JournalClient`
//! is. Wiring a generated server-side service (the `ShuffleServer<T>`
//! wrapper codegen would normally emit) is left to the surrounding
//! process: this core's scope stops at [`ShuffleService`], the RPC's
//! logical contract.

use crate::coordinator::Coordinator;
use futures::{Stream, StreamExt};
use proto_flow::flow::{ShuffleRequest, ShuffleResponse};
use std::pin::Pin;
use tonic::codec::ProstCodec;

pub type ResponseStream = Pin<Box<dyn Stream<Item = Result<ShuffleResponse, tonic::Status>> + Send + 'static>>;

/// The logical contract of the `Shuffle` RPC: one subscription per call,
/// streaming responses until the caller disconnects or the coordinator
/// sends a `terminal_error`.
#[async_trait::async_trait]
pub trait ShuffleService: Send + Sync + 'static {
    async fn shuffle(&self, request: ShuffleRequest) -> Result<ResponseStream, tonic::Status>;
}

#[async_trait::async_trait]
impl ShuffleService for Coordinator {
    async fn shuffle(&self, request: ShuffleRequest) -> Result<ResponseStream, tonic::Status> {
        let (tx, rx) = tokio::sync::mpsc::channel(8);

        if !self.subscribe(request, tx).await {
            return Err(tonic::Status::invalid_argument("shuffle request is missing its shuffle or range"));
        }

        let stream = tokio_stream::wrappers::ReceiverStream::new(rx).map(|item| item.map_err(|err| tonic::Status::internal(err.to_string())));
        Ok(Box::pin(stream))
    }
}

/// A hand-written client of a peer coordinator's `Shuffle` RPC.
#[derive(Clone)]
pub struct ShuffleClient<T> {
    inner: tonic::client::Grpc<T>,
}

impl<T> ShuffleClient<T>
where
    T: tonic::client::GrpcService<tonic::body::BoxBody>,
    T::Error: Into<tonic::codegen::StdError>,
    T::ResponseBody: tonic::codegen::Body<Data = bytes::Bytes> + Send + 'static,
    <T::ResponseBody as tonic::codegen::Body>::Error: Into<tonic::codegen::StdError> + Send,
{
    pub fn new(inner: T) -> Self {
        Self { inner: tonic::client::Grpc::new(inner) }
    }

    pub async fn shuffle(&mut self, request: ShuffleRequest) -> Result<tonic::Response<tonic::Streaming<ShuffleResponse>>, tonic::Status> {
        self.inner.ready().await.map_err(|e| tonic::Status::unknown(e.to_string()))?;
        let path = tonic::codegen::http::uri::PathAndQuery::from_static("/recoverycoordinator.Shuffler/Shuffle");
        self.inner.server_streaming(tonic::Request::new(request), path, ProstCodec::default()).await
    }
}
