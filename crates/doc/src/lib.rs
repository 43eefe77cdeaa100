//! A trimmed rendering of Flow's `doc` crate: just enough of the document
//! model to extract shuffle and partition keys and UUID placeholders from
//! JSON documents. Document derivation execution, schema validation and
//! the bump-allocated arena document representation are all out of scope
//! for this core (see DESIGN.md) -- every document here is a borrowed
//! `serde_json::Value`.

mod extractor;
mod ptr;

pub use extractor::Extractor;
pub use ptr::Pointer;

/// AsNode is implemented by document representations that can be matched
/// against a [`Node`] shape. The shuffle core only ever extracts from
/// `serde_json::Value`, but keeping the trait lets callers write
/// representation-agnostic extraction code, the way Flow's derivation
/// pipeline does over its bump-allocated `HeapNode`.
pub trait AsNode {
    fn as_node(&self) -> Node<'_>;
}

/// A numeric document value, distinguishing the three JSON number shapes
/// Flow cares about when encoding partition values (see `labels::partition`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Float(f64),
    Signed(i64),
    Unsigned(u64),
}

/// A borrowed, shape-matched view of a document node.
#[derive(Debug, Clone, Copy)]
pub enum Node<'n> {
    Array(&'n Vec<serde_json::Value>),
    Bool(bool),
    Null,
    Number(Number),
    Object(&'n serde_json::Map<String, serde_json::Value>),
    String(&'n str),
}

impl AsNode for serde_json::Value {
    fn as_node(&self) -> Node<'_> {
        match self {
            serde_json::Value::Null => Node::Null,
            serde_json::Value::Bool(b) => Node::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(u) = n.as_u64() {
                    Node::Number(Number::Unsigned(u))
                } else if let Some(i) = n.as_i64() {
                    Node::Number(Number::Signed(i))
                } else {
                    Node::Number(Number::Float(n.as_f64().unwrap_or(f64::NAN)))
                }
            }
            serde_json::Value::String(s) => Node::String(s),
            serde_json::Value::Array(a) => Node::Array(a),
            serde_json::Value::Object(o) => Node::Object(o),
        }
    }
}

impl<'n> tuple::TuplePack for Node<'n> {
    fn pack<W: std::io::Write>(
        &self,
        w: &mut W,
        depth: tuple::TupleDepth,
    ) -> std::io::Result<tuple::VersionstampOffset> {
        match self {
            Node::Array(_) | Node::Object(_) => {
                // Composite values are packed as their canonical JSON encoding,
                // which is sufficient for ordering and hashing purposes but is
                // not itself a further-decomposable tuple element.
                serde_json::to_vec(self.as_json()).unwrap().pack(w, depth)
            }
            Node::Bool(b) => b.pack(w, depth),
            Node::Null => Option::<()>::None.pack(w, depth),
            Node::Number(Number::Float(n)) => n.pack(w, depth),
            Node::Number(Number::Signed(n)) => n.pack(w, depth),
            Node::Number(Number::Unsigned(n)) => n.pack(w, depth),
            Node::String(s) => s.pack(w, depth),
        }
    }
}

impl<'n> Node<'n> {
    fn as_json(&self) -> serde_json::Value {
        match self {
            Node::Array(a) => serde_json::Value::Array((*a).clone()),
            Node::Object(o) => serde_json::Value::Object((*o).clone()),
            _ => unreachable!("only called for Array/Object"),
        }
    }
}
