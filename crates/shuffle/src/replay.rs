//! Replay reads: a single bounded read of one journal range, used by a
//! transform to re-derive a fragment of its output after a restart rather
//! than recomputing it from source. Distinct from the governor's ongoing
//! reads in that a replay always has a known, finite `end_offset` and
//! never waits on a tailing read-delay.

use futures::StreamExt;
use gazette::journal::{Client, ReadJsonLine};
use proto_gazette::broker;

/// One document yielded by a replay read, carrying the journal bytes it
/// was read from alongside the parsed document.
pub struct ReplayDoc {
    pub root: serde_json::Value,
    pub begin_offset: i64,
    pub end_offset: i64,
}

/// Read `journal` over exactly `[begin, end)`, yielding its documents in
/// order. `read_suffix` is appended to the journal name the same way an
/// ongoing shuffled read augments it, so this replay doesn't share a
/// broker-side read head with any other shuffle of the same journal.
/// Reconnects on transient errors using the same backoff as an ordinary
/// read; a `terminal_error`-worthy failure from the broker ends the
/// stream with an `Err`.
pub fn start_replay_read(client: Client, journal: &str, read_suffix: &str, begin: i64, end: i64) -> impl futures::Stream<Item = crate::Result<ReplayDoc>> {
    let req = broker::ReadRequest {
        journal: format!("{journal}{read_suffix}"),
        offset: begin,
        end_offset: end,
        block: false,
        do_not_proxy: false,
        metadata_only: false,
        header: None,
    };

    let mut offset_begin = begin;

    client.read_json_lines(req).filter_map(move |item| {
        let out = match item {
            Ok(ReadJsonLine::Meta(_)) => None,
            Ok(ReadJsonLine::Doc { root, next_offset }) => {
                let doc = ReplayDoc { root, begin_offset: offset_begin, end_offset: next_offset };
                offset_begin = next_offset;
                Some(Ok(doc))
            }
            Err(err) => Some(Err(err.into())),
        };
        async move { out }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_request_is_exactly_bounded() {
        let req = broker::ReadRequest {
            journal: "a/journal".to_string(),
            offset: 10,
            end_offset: 20,
            block: false,
            ..Default::default()
        };
        assert_eq!(req.offset, 10);
        assert_eq!(req.end_offset, 20);
        assert!(!req.block);
    }
}
