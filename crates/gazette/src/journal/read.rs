use super::Client;
use crate::Error;
use futures::TryStreamExt;
use proto_gazette::broker;

impl Client {
    /// Read a journal as a retryable Stream of ReadResponse, reconnecting
    /// through the Router whenever the stream ends before `end_offset`
    /// (or indefinitely, for a blocking tail read). Direct-from-storage
    /// fragment fetches are not supported by this client: every byte is
    /// proxied through the broker that owns the journal.
    pub fn read(self, mut req: broker::ReadRequest) -> impl futures::Stream<Item = crate::Result<broker::ReadResponse>> + 'static {
        req.metadata_only = false;

        coroutines::coroutine(move |mut co| async move {
            let mut write_head = i64::MAX;

            loop {
                if req.end_offset != 0 && req.offset == req.end_offset {
                    return;
                }
                if !req.block && req.offset == write_head {
                    return;
                }

                match self.read_some(&mut co, &mut req, &mut write_head).await {
                    Ok(()) => (),
                    Err(Error::BrokerStatus(broker::Status::NotJournalBroker)) if req.do_not_proxy => {
                        // Expected: `req.header` now carries the updated route and we restart.
                    }
                    Err(err) => {
                        () = co.yield_(Err(err)).await;
                    }
                }
            }
        })
    }

    async fn read_some(
        &self,
        co: &mut coroutines::Suspend<crate::Result<broker::ReadResponse>, ()>,
        req: &mut broker::ReadRequest,
        write_head: &mut i64,
    ) -> crate::Result<()> {
        let route = req.header.as_ref().and_then(|hdr| hdr.route.as_ref());
        let channel = self.router.route(route, false, &self.default).await?;
        let mut client = self.into_sub(channel);

        tracing::trace!(req = ?ops::DebugJson(&req), "starting journal read");
        let mut stream = client.read(req.clone()).await.map_err(Error::Grpc)?.into_inner();

        while let Some(resp) = stream.try_next().await.map_err(Error::Grpc)? {
            if resp.header.is_some() {
                req.header = resp.header.clone();
            }
            match (resp.status(), &resp.fragment, resp.content.is_empty()) {
                // Metadata response announcing a new fragment being read.
                (broker::Status::Ok, Some(_fragment), true) => {
                    // Offset jumps happen when content is removed from the
                    // middle of a journal, or on an initial tailing read.
                    if req.offset != resp.offset {
                        tracing::info!(req.journal, req.offset, resp.offset, "offset jump");
                        req.offset = resp.offset;
                    }
                    *write_head = resp.write_head;
                    () = co.yield_(Ok(resp)).await;
                }
                // Content response.
                (broker::Status::Ok, None, false) => {
                    req.offset += resp.content.len() as i64;
                    () = co.yield_(Ok(resp)).await;
                }
                // Any other status ends the stream; the caller decides how to react.
                (status, _, _) => return Err(Error::BrokerStatus(status)),
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_offset_stops_without_dispatch() {
        let req = broker::ReadRequest {
            journal: "a/journal".to_string(),
            offset: 100,
            end_offset: 100,
            ..Default::default()
        };
        assert_eq!(req.offset, req.end_offset);
    }
}
