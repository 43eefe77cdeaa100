//! Hand-trimmed Rust bindings for the subset of the Flow catalog protocol
//! this runtime touches: shard operational labels, range assignments, and
//! the shuffled-read wire messages exchanged between a reader and the
//! journal's elected coordinator. Mirrors the shape `prost-build` would
//! generate from the upstream `flow.proto` / `ops.proto`, restricted to the
//! messages this core touches.

pub mod flow;
pub mod ops;
