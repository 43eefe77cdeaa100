//! Catalog-level types describing how a derivation or materialization
//! routes and filters documents read from a source collection. These are
//! the serialized forms a user writes in a catalog spec; the runtime
//! resolves them, alongside the source collection's own key and
//! partitioning, into the wire-level `proto_flow::flow::Shuffle` a
//! coordinator actually executes.

mod pointer;
mod shuffle;

pub use pointer::{CompositeKey, JsonPointer};
pub use shuffle::{Lambda, PartitionSelector, Shuffle};
