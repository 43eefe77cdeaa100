use crate::{Node, Pointer};
use std::cmp::Ordering;

/// Extracts a located field from a document and packs it into the
/// order-preserving tuple encoding, for use as a shuffle key or an
/// ordering component in the replay merge.
///
/// Missing locations pack as a tuple `Nil`, matching the behavior of
/// looking up a JSON pointer against a document that doesn't have it.
#[derive(Debug, Clone)]
pub struct Extractor {
    ptr: Pointer,
}

impl Extractor {
    pub fn new(ptr: &str) -> Extractor {
        Extractor {
            ptr: Pointer::parse(ptr),
        }
    }

    /// Query the located node directly, for callers that need to inspect
    /// its shape rather than just its packed bytes (e.g. partition value
    /// encoding, which renders each scalar type differently). Missing
    /// locations query as `Node::Null`.
    pub fn query_node<'n>(&self, doc: &'n serde_json::Value) -> Node<'n> {
        self.ptr.query(doc).unwrap_or(Node::Null)
    }

    /// Extract the located node and append its packed tuple encoding to `out`.
    pub fn extract(&self, doc: &serde_json::Value, out: &mut Vec<u8>) {
        use tuple::{TupleDepth, TuplePack};

        match self.ptr.query(doc) {
            Some(node) => {
                node.pack(out, TupleDepth::new())
                    .expect("packing into a Vec<u8> is infallible");
            }
            None => {
                Option::<()>::None
                    .pack(out, TupleDepth::new())
                    .expect("packing into a Vec<u8> is infallible");
            }
        }
    }

    /// Extract and pack each of `extractors` in turn, producing the
    /// composite tuple encoding used as a shuffle or partition key.
    pub fn extract_all(extractors: &[Extractor], doc: &serde_json::Value) -> Vec<u8> {
        let mut out = Vec::new();
        for ex in extractors {
            ex.extract(doc, &mut out);
        }
        out
    }

    /// Compare two documents by the composite key `extractors` locate,
    /// without allocating: used on the hot path of the replay merge, where
    /// every comparison would otherwise re-pack both sides.
    pub fn compare_key(
        extractors: &[Extractor],
        lhs: &serde_json::Value,
        rhs: &serde_json::Value,
    ) -> Ordering {
        let lhs = Self::extract_all(extractors, lhs);
        let rhs = Self::extract_all(extractors, rhs);
        lhs.cmp(&rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_present_and_missing() {
        let ex = Extractor::new("/a/b");
        let doc = json!({"a": {"b": "hi"}});
        let mut out = Vec::new();
        ex.extract(&doc, &mut out);
        assert!(!out.is_empty());

        let missing = json!({"a": {}});
        let mut out2 = Vec::new();
        ex.extract(&missing, &mut out2);
        assert_eq!(out2, vec![0x00u8]); // packed Nil
    }

    #[test]
    fn test_compare_key_orders_like_values() {
        let extractors = vec![Extractor::new("/k")];
        let a = json!({"k": "foobar"});
        let b = json!({"k": "foobas"});
        assert_eq!(
            Extractor::compare_key(&extractors, &a, &b),
            Ordering::Less
        );
    }

    #[test]
    fn test_composite_key() {
        let extractors = vec![Extractor::new("/a"), Extractor::new("/b")];
        let doc = json!({"a": 1, "b": "x"});
        let packed = Extractor::extract_all(&extractors, &doc);
        assert!(!packed.is_empty());
    }
}
