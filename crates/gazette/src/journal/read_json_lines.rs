use super::Client;
use futures::{Stream, StreamExt};
use proto_gazette::broker;

/// The enumerated Item type of a [`Client::read_json_lines`] Stream.
pub enum ReadJsonLine {
    /// A parsed journal document and its `next_offset`: the offset one
    /// byte beyond its trailing newline, which is also the begin offset
    /// of the next document. A preceding `Meta` variant may reset this
    /// run, to the `begin` offset of its contained Fragment.
    Doc { root: serde_json::Value, next_offset: i64 },
    /// A metadata response naming the Fragment currently being read.
    Meta(broker::ReadResponse),
}

impl Client {
    /// Read a journal, splitting its content on newlines and parsing each
    /// line as a JSON document.
    pub fn read_json_lines(self, req: broker::ReadRequest) -> ReadJsonLines {
        ReadJsonLines {
            inner: self.read(req).boxed(),
            carry: Vec::new(),
            carry_offset: 0,
            pending: std::collections::VecDeque::new(),
        }
    }
}

pin_project_lite::pin_project! {
    pub struct ReadJsonLines {
        #[pin]
        inner: futures::stream::BoxStream<'static, crate::Result<broker::ReadResponse>>,
        // Bytes of a line not yet terminated by a newline.
        carry: Vec<u8>,
        // Journal offset of the first byte of `carry`.
        carry_offset: i64,
        // Parsed lines (or metadata) ready to be yielded, in order.
        pending: std::collections::VecDeque<crate::Result<ReadJsonLine>>,
    }
}

impl Stream for ReadJsonLines {
    type Item = crate::Result<ReadJsonLine>;

    fn poll_next(self: std::pin::Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> std::task::Poll<Option<Self::Item>> {
        use std::task::Poll;
        let mut me = self.project();

        loop {
            if let Some(item) = me.pending.pop_front() {
                return Poll::Ready(Some(item));
            }

            match me.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(resp))) => {
                    if resp.fragment.is_some() {
                        *me.carry_offset = resp.offset;
                        me.carry.clear();
                        me.pending.push_back(Ok(ReadJsonLine::Meta(resp)));
                        continue;
                    }

                    me.carry.extend_from_slice(&resp.content);
                    let mut consumed = 0usize;

                    while let Some(nl) = memchr::memchr(b'\n', &me.carry[consumed..]) {
                        let end = consumed + nl + 1;
                        let line = &me.carry[consumed..end];
                        let next_offset = *me.carry_offset + end as i64;

                        match serde_json::from_slice::<serde_json::Value>(line) {
                            Ok(root) => me.pending.push_back(Ok(ReadJsonLine::Doc { root, next_offset })),
                            Err(err) => me.pending.push_back(Err(crate::Error::InvalidJson { offset: next_offset, err })),
                        }
                        consumed = end;
                    }

                    me.carry.drain(..consumed);
                    *me.carry_offset += consumed as i64;
                }
                Poll::Ready(Some(Err(err))) => return Poll::Ready(Some(Err(err))),
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
