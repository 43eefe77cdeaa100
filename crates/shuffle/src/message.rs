//! Document UUID parsing: Flow documents carry an RFC 4122 v1 UUID at a
//! fixed pointer, whose bits the runtime repurposes to carry a message
//! clock (used for governor ordering and read-delay gating) and a small
//! set of flags, most importantly "this document is an acknowledgement,
//! broadcast to every subscriber regardless of its key".

use doc::{Node, Pointer};
use proto_flow::flow::UuidParts;

/// Low 4 bits of `clock` are reserved for flags; the remaining 60 bits
/// are the actual timestamp + per-producer sequence value used for
/// ordering.
pub const FLAGS_MASK: u64 = 0xf;
pub const FLAG_ACK_TXN: u64 = 0b0010;
pub const FLAG_CONTINUE_TXN: u64 = 0b0001;

pub fn flags(clock: u64) -> u64 {
    clock & FLAGS_MASK
}

pub fn is_ack(parts: &UuidParts) -> bool {
    flags(parts.clock) & FLAG_ACK_TXN != 0
}

/// A hash of the document's r-clock component, used alongside the key
/// hash to partition work across shards within a single key range. Taken
/// from the clock's high bits, which rotate much faster than the
/// timestamp's low bits, giving good dispersion across shards of a split
/// key range.
pub fn r_clock_hash(parts: &UuidParts) -> u32 {
    (parts.clock >> 32) as u32
}

/// Extract and parse the document UUID at `ptr`, returning `None` if the
/// location is missing, not a string, or not a valid UUID.
pub fn extract_uuid(ptr: &Pointer, doc: &serde_json::Value) -> Option<UuidParts> {
    match ptr.query(doc) {
        Some(Node::String(s)) => parse_uuid(s),
        _ => None,
    }
}

fn parse_uuid(s: &str) -> Option<UuidParts> {
    let uuid = uuid::Uuid::parse_str(s).ok()?;
    let (timestamp, ..) = uuid.get_timestamp()?.to_rfc4122();
    let node = uuid.as_bytes()[10..16].try_into().ok().map(u64::from_be_bytes_node)?;

    // The v1 timestamp's 60 bits become the ordering clock; the flag bits
    // occupy what would otherwise be its lowest 4 bits, since v1
    // timestamps carry 100ns granularity that this runtime does not need.
    let clock = (timestamp << 4) | (node & FLAGS_MASK);
    Some(UuidParts { node, clock })
}

trait FromBeBytesNode {
    fn from_be_bytes_node(bytes: [u8; 6]) -> u64;
}

impl FromBeBytesNode for u64 {
    fn from_be_bytes_node(bytes: [u8; 6]) -> u64 {
        let mut padded = [0u8; 8];
        padded[2..].copy_from_slice(&bytes);
        u64::from_be_bytes(padded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_uuid(flag_nibble: u8) -> String {
        let context = uuid::v1::Context::new(0);
        let ts = uuid::v1::Timestamp::from_unix(&context, 1_700_000_000, 0);
        let node: [u8; 6] = [0, 0, 0, 0, 0, flag_nibble];
        uuid::Uuid::new_v1(ts, &node).to_string()
    }

    #[test]
    fn test_extract_uuid_round_trips_flags() {
        let doc = json!({"_meta": {"uuid": sample_uuid(FLAG_ACK_TXN as u8)}});
        let ptr = Pointer::parse("/_meta/uuid");
        let parts = extract_uuid(&ptr, &doc).unwrap();
        assert!(is_ack(&parts));
    }

    #[test]
    fn test_non_ack_flag_not_detected_as_ack() {
        let doc = json!({"_meta": {"uuid": sample_uuid(FLAG_CONTINUE_TXN as u8)}});
        let ptr = Pointer::parse("/_meta/uuid");
        let parts = extract_uuid(&ptr, &doc).unwrap();
        assert!(!is_ack(&parts));
    }

    #[test]
    fn test_missing_location_is_none() {
        let doc = json!({"_meta": {}});
        let ptr = Pointer::parse("/_meta/uuid");
        assert!(extract_uuid(&ptr, &doc).is_none());
    }
}
