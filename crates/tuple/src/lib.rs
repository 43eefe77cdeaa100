//! A small subset of the FoundationDB tuple layer, sufficient for packing
//! shuffle keys into an order-preserving byte encoding that's then hashed.
//!
//! Ported from the upstream `foundationdb-rs` `tuple` crate; see the
//! `Cargo.toml` description for provenance. Only the subset of types
//! actually extracted from Flow documents is implemented: nil, bool,
//! signed/unsigned integers, doubles, bytes and UTF-8 strings.

use std::io::{self, Write};

mod pack;
mod unpack;

pub use pack::{TupleDepth, TuplePack, VersionstampOffset};
pub use unpack::{unpack, Element};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unexpected end of packed tuple input")]
    UnexpectedEnd,
    #[error("invalid type code {0:#x} in packed tuple")]
    InvalidTypeCode(u8),
    #[error("invalid UTF-8 in packed tuple string")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

// Type codes, mirroring the FDB tuple layer specification.
const NIL: u8 = 0x00;
const BYTES: u8 = 0x01;
const STRING: u8 = 0x02;
const INT_ZERO: u8 = 0x14;
const INT_MIN: u8 = 0x0c; // INT_ZERO - 8
const INT_MAX: u8 = 0x1c; // INT_ZERO + 8
const DOUBLE: u8 = 0x21;
const FALSE: u8 = 0x26;
const TRUE: u8 = 0x27;

fn write_escaped(w: &mut impl Write, bytes: &[u8]) -> io::Result<()> {
    for &b in bytes {
        w.write_all(&[b])?;
        if b == 0 {
            w.write_all(&[0xff])?;
        }
    }
    w.write_all(&[0x00])
}

pub(crate) fn byte_len(mut v: u64) -> usize {
    let mut n = 0;
    while v > 0 {
        n += 1;
        v >>= 8;
    }
    n
}
