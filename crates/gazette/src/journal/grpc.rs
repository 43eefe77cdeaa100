//! A hand-written `protocol.Journal` gRPC client, shaped the way
//! `tonic-build` would generate one from the upstream `broker.proto`
//! service definition. Written directly against `tonic::client::Grpc`
//! since no `.proto` sources are available to drive codegen in this tree.

use proto_gazette::broker;
use tonic::codec::ProstCodec;

#[derive(Clone)]
pub struct JournalClient<T> {
    inner: tonic::client::Grpc<T>,
}

impl<T> JournalClient<T>
where
    T: tonic::client::GrpcService<tonic::body::BoxBody>,
    T::Error: Into<tonic::codegen::StdError>,
    T::ResponseBody: tonic::codegen::Body<Data = bytes::Bytes> + Send + 'static,
    <T::ResponseBody as tonic::codegen::Body>::Error: Into<tonic::codegen::StdError> + Send,
{
    pub fn new(inner: T) -> Self {
        Self {
            inner: tonic::client::Grpc::new(inner),
        }
    }

    pub async fn list(
        &mut self,
        request: broker::ListRequest,
    ) -> Result<tonic::Response<tonic::Streaming<broker::ListResponse>>, tonic::Status> {
        self.inner.ready().await.map_err(|e| tonic::Status::unknown(e.to_string()))?;
        let path = tonic::codegen::http::uri::PathAndQuery::from_static("/protocol.Journal/List");
        self.inner
            .server_streaming(tonic::Request::new(request), path, ProstCodec::default())
            .await
    }

    pub async fn apply(&mut self, request: broker::ApplyRequest) -> Result<tonic::Response<broker::ApplyResponse>, tonic::Status> {
        self.inner.ready().await.map_err(|e| tonic::Status::unknown(e.to_string()))?;
        let path = tonic::codegen::http::uri::PathAndQuery::from_static("/protocol.Journal/Apply");
        self.inner.unary(tonic::Request::new(request), path, ProstCodec::default()).await
    }

    pub async fn list_fragments(
        &mut self,
        request: broker::FragmentsRequest,
    ) -> Result<tonic::Response<broker::FragmentsResponse>, tonic::Status> {
        self.inner.ready().await.map_err(|e| tonic::Status::unknown(e.to_string()))?;
        let path = tonic::codegen::http::uri::PathAndQuery::from_static("/protocol.Journal/ListFragments");
        self.inner.unary(tonic::Request::new(request), path, ProstCodec::default()).await
    }

    pub async fn read(
        &mut self,
        request: broker::ReadRequest,
    ) -> Result<tonic::Response<tonic::Streaming<broker::ReadResponse>>, tonic::Status> {
        self.inner.ready().await.map_err(|e| tonic::Status::unknown(e.to_string()))?;
        let path = tonic::codegen::http::uri::PathAndQuery::from_static("/protocol.Journal/Read");
        self.inner
            .server_streaming(tonic::Request::new(request), path, ProstCodec::default())
            .await
    }
}
