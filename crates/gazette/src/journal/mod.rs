use proto_gazette::broker;
use std::sync::Arc;

mod grpc;
mod list;
mod read;
mod read_json_lines;

pub use read_json_lines::{ReadJsonLine, ReadJsonLines};

type SubClient = grpc::JournalClient<tonic::transport::Channel>;

/// Client dispatches journal RPCs through a Router, discovering and
/// caching the Channel of whichever member currently owns each journal.
#[derive(Clone)]
pub struct Client {
    router: Arc<crate::Router>,
    default: broker::process_spec::Id,
}

impl Client {
    pub fn new(router: crate::Router, default: broker::process_spec::Id) -> Self {
        Self {
            router: Arc::new(router),
            default,
        }
    }

    fn into_sub(&self, channel: tonic::transport::Channel) -> SubClient {
        grpc::JournalClient::new(channel)
    }

    pub async fn apply(&self, req: broker::ApplyRequest) -> crate::Result<broker::ApplyResponse> {
        let channel = self.router.route(None, false, &self.default).await?;
        let mut client = self.into_sub(channel);

        let resp = client.apply(req).await.map_err(crate::Error::Grpc)?.into_inner();
        crate::check_ok(resp.status(), resp)
    }

    /// List fragments of `journal` persisted at or after `begin_mod_time`,
    /// a unix-seconds timestamp, to support fragment-bound offset skips.
    pub async fn list_fragments(&self, req: broker::FragmentsRequest) -> crate::Result<broker::FragmentsResponse> {
        let channel = self.router.route(None, false, &self.default).await?;
        let mut client = self.into_sub(channel);

        let resp = client.list_fragments(req).await.map_err(crate::Error::Grpc)?.into_inner();
        crate::check_ok(resp.status(), resp)
    }
}
