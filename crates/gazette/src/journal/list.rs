use super::Client;
use crate::Error;
use futures::TryStreamExt;
use proto_gazette::broker;

impl Client {
    /// List journals matching the ListRequest.
    #[tracing::instrument(level = "trace", skip_all)]
    pub async fn list(&self, mut req: broker::ListRequest) -> crate::Result<broker::ListResponse> {
        assert!(!req.watch, "list() requires ListRequest.watch is not set");
        let mut stream = self.start_list(&req).await?;
        recv_snapshot(&mut req, &mut stream).await
    }

    /// Watch journals matching the ListRequest, yielding a fresh listing
    /// snapshot on every update the broker pushes.
    pub fn list_watch(self, mut req: broker::ListRequest) -> impl futures::Stream<Item = crate::Result<broker::ListResponse>> + 'static {
        assert!(req.watch, "list_watch() requires ListRequest.watch is set");

        coroutines::coroutine(move |mut co| async move {
            loop {
                let mut stream = match self.start_list(&req).await {
                    Ok(stream) => stream,
                    Err(err) => {
                        () = co.yield_(Err(err)).await;
                        continue;
                    }
                };

                loop {
                    match recv_snapshot(&mut req, &mut stream).await {
                        Ok(resp) => {
                            co.yield_(Ok(resp)).await;
                            continue; // Keep watching the same stream.
                        }
                        Err(Error::UnexpectedEof) if req.watch_resume.is_some() => {
                            // The broker closed an ongoing watch. Expected, not an error.
                        }
                        Err(err) => {
                            co.yield_(Err(err)).await;
                        }
                    }
                    break; // Start a new stream on the next poll.
                }
            }
        })
    }

    async fn start_list(&self, req: &broker::ListRequest) -> crate::Result<tonic::Streaming<broker::ListResponse>> {
        let channel = self.router.route(None, false, &self.default).await?;
        let mut client = self.into_sub(channel);
        Ok(client.list(req.clone()).await.map_err(Error::Grpc)?.into_inner())
    }
}

#[tracing::instrument(level = "trace", skip_all)]
async fn recv_snapshot(req: &mut broker::ListRequest, stream: &mut tonic::Streaming<broker::ListResponse>) -> crate::Result<broker::ListResponse> {
    let mut maybe_resp: Option<broker::ListResponse> = None;

    loop {
        let next = stream.try_next().await.map_err(Error::Grpc)?;

        match (maybe_resp.take(), next) {
            // Completion of a listing snapshot in a unary, !watch request.
            (Some(resp), None) if !req.watch => return Ok(resp),
            // Unexpected EOF of a watch request.
            (Some(_resp), None) => return Err(Error::UnexpectedEof),
            // First response of a listing snapshot.
            (None, Some(next)) => {
                let next = crate::check_ok(next.status(), next)?;
                req.watch_resume = next.header.clone();
                maybe_resp = Some(next);
            }
            // Continued response of a listing snapshot.
            (Some(mut resp), Some(next)) if !next.journals.is_empty() => {
                resp.journals.extend(next.journals);
                maybe_resp = Some(resp);
            }
            // Completion of a listing snapshot in an ongoing watch.
            (Some(resp), Some(_next)) if req.watch => return Ok(resp),
            // !watch responses after the first should never be empty.
            (Some(_resp), Some(_next)) => {
                return Err(Error::Protocol("unexpected empty ListResponse continuation in a !watch request"))
            }
            (None, None) => return Err(Error::UnexpectedEof),
        }
    }
}
