//! Hand-trimmed Rust bindings for the subset of the Gazette broker protocol
//! this runtime speaks: journal specs and labels, reads, listing and
//! applying journal changes, and the route/member topology used to
//! dispatch RPCs. Mirrors the shape `prost-build` would generate from the
//! upstream `broker.proto`, restricted to the messages this core touches.

pub mod broker;
