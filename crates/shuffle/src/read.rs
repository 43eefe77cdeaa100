//! One ongoing client-side read of a single journal's shuffle: owns the
//! RPC to its coordinator, reconnects it on failure with backoff, and
//! hands completed [`proto_flow::flow::ShuffleResponse`]s back to the
//! [`crate::governor::Governor`] driving it.

use crate::api::ShuffleClient;
use proto_flow::flow::{ShuffleRequest, ShuffleResponse};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// How long to wait before reconnecting after the `n`th consecutive
/// failure (1-indexed): an immediate retry, then a short jittered ramp
/// up to a steady five seconds.
pub fn backoff(attempt: u32) -> Duration {
    match attempt {
        0 => Duration::ZERO,
        1 => Duration::from_millis(10),
        2..=5 => Duration::from_secs((attempt - 1) as u64),
        _ => Duration::from_secs(5),
    }
}

/// A document batch pulled off one read, annotated with the shuffle's
/// configured read delay so the governor can compare it against other
/// reads' heads on a common, delay-adjusted clock.
pub struct Batch {
    pub response: ShuffleResponse,
    pub read_delay: Duration,
}

/// One journal's ongoing read: the background task pumping RPC responses
/// into `batches`, and the controls to poll it for more or tear it down.
pub struct Read {
    poll_tx: watch::Sender<()>,
    cancel: std::sync::Arc<tokio::sync::Notify>,
}

impl Read {
    /// Start a read of `req` against `client`, delivering batches to
    /// `batches` until `req.end_offset` is reached (if nonzero) or the
    /// read is cancelled.
    pub fn start<T>(client: ShuffleClient<T>, req: ShuffleRequest, read_delay: Duration, batches: mpsc::Sender<crate::Result<Batch>>) -> Self
    where
        T: tonic::client::GrpcService<tonic::body::BoxBody> + Clone + Send + 'static,
        T::Future: Send,
        T::Error: Into<tonic::codegen::StdError> + Send,
        T::ResponseBody: tonic::codegen::Body<Data = bytes::Bytes> + Send + 'static,
        <T::ResponseBody as tonic::codegen::Body>::Error: Into<tonic::codegen::StdError> + Send,
    {
        let (poll_tx, poll_rx) = watch::channel(());
        let cancel = std::sync::Arc::new(tokio::sync::Notify::new());

        tokio::spawn(pump(client, req, read_delay, batches, poll_rx, cancel.clone()));

        Self { poll_tx, cancel }
    }

    /// Wake the read's task, e.g. after widening an offset bound.
    pub fn poll(&self) {
        let _ = self.poll_tx.send(());
    }

    pub fn cancel(&self) {
        self.cancel.notify_one();
    }
}

async fn pump<T>(
    client: ShuffleClient<T>,
    mut req: ShuffleRequest,
    read_delay: Duration,
    batches: mpsc::Sender<crate::Result<Batch>>,
    mut poll_rx: watch::Receiver<()>,
    cancel: std::sync::Arc<tokio::sync::Notify>,
) where
    T: tonic::client::GrpcService<tonic::body::BoxBody> + Clone + Send + 'static,
    T::Future: Send,
    T::Error: Into<tonic::codegen::StdError> + Send,
    T::ResponseBody: tonic::codegen::Body<Data = bytes::Bytes> + Send + 'static,
    <T::ResponseBody as tonic::codegen::Body>::Error: Into<tonic::codegen::StdError> + Send,
{
    let mut attempt = 0u32;
    let mut last_send_at = tokio::time::Instant::now();

    'reconnect: loop {
        if req.end_offset != 0 && req.offset >= req.end_offset {
            return;
        }

        tokio::select! {
            _ = tokio::time::sleep(backoff(attempt)) => (),
            _ = cancel.notified() => return,
        }

        let mut client = client.clone();
        let stream = tokio::select! {
            result = client.shuffle(req.clone()) => result,
            _ = cancel.notified() => return,
        };

        let mut stream = match stream {
            Ok(resp) => resp.into_inner(),
            Err(_) => {
                attempt += 1;
                continue 'reconnect;
            }
        };

        use futures::StreamExt;
        loop {
            tokio::select! {
                item = stream.next() => {
                    let Some(item) = item else {
                        attempt += 1;
                        continue 'reconnect;
                    };
                    match item {
                        Ok(resp) if !resp.terminal_error.is_empty() => {
                            let _ = batches.send(Err(crate::Error::Terminal(resp.terminal_error))).await;
                            return;
                        }
                        Ok(resp) => {
                            attempt = 0;
                            req.offset = resp.read_through;

                            // Back off on ourselves if the governor has stopped
                            // draining our batches for a sustained period, rather
                            // than buffering an unbounded backlog in its memory.
                            if batches.capacity() == 0 && last_send_at.elapsed() > Duration::from_secs(120) {
                                cancel.notified().await;
                                return;
                            }
                            if batches.send(Ok(Batch { response: resp, read_delay })).await.is_err() {
                                return;
                            }
                            last_send_at = tokio::time::Instant::now();
                        }
                        Err(status) => {
                            let _ = status;
                            attempt += 1;
                            continue 'reconnect;
                        }
                    }
                }
                _ = poll_rx.changed() => (),
                _ = cancel.notified() => return,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_table() {
        assert_eq!(backoff(0), Duration::ZERO);
        assert_eq!(backoff(1), Duration::from_millis(10));
        assert_eq!(backoff(2), Duration::from_secs(1));
        assert_eq!(backoff(5), Duration::from_secs(4));
        assert_eq!(backoff(6), Duration::from_secs(5));
        assert_eq!(backoff(100), Duration::from_secs(5));
    }
}
