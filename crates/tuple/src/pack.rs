use super::{byte_len, write_escaped, DOUBLE, FALSE, INT_ZERO, NIL, STRING, TRUE};
use std::io::{self, Write};

/// Tracks nesting depth while packing, so that nested tuples (not
/// implemented here) could escape their contained null bytes differently.
/// Kept for API compatibility with the upstream crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct TupleDepth(usize);

impl TupleDepth {
    pub fn new() -> Self {
        Self(0)
    }
    pub fn increment(self) -> Self {
        Self(self.0 + 1)
    }
    pub fn depth(self) -> usize {
        self.0
    }
}

/// Placeholder for FDB versionstamp offset tracking; this core never packs
/// a versionstamp so every implementation returns `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VersionstampOffset(Option<u32>);

impl VersionstampOffset {
    pub fn none() -> Self {
        Self(None)
    }
}

/// TuplePack is implemented by every value which can be packed into the
/// order-preserving tuple encoding.
pub trait TuplePack {
    fn pack<W: Write>(&self, w: &mut W, depth: TupleDepth) -> io::Result<VersionstampOffset>;
}

impl TuplePack for bool {
    fn pack<W: Write>(&self, w: &mut W, _depth: TupleDepth) -> io::Result<VersionstampOffset> {
        w.write_all(&[if *self { TRUE } else { FALSE } ])?;
        Ok(VersionstampOffset::none())
    }
}

impl TuplePack for Option<()> {
    fn pack<W: Write>(&self, w: &mut W, _depth: TupleDepth) -> io::Result<VersionstampOffset> {
        w.write_all(&[NIL])?;
        Ok(VersionstampOffset::none())
    }
}

impl TuplePack for i64 {
    fn pack<W: Write>(&self, w: &mut W, _depth: TupleDepth) -> io::Result<VersionstampOffset> {
        let v = *self;
        if v == 0 {
            w.write_all(&[INT_ZERO])?;
        } else if v > 0 {
            let n = byte_len(v as u64);
            w.write_all(&[INT_ZERO + n as u8])?;
            w.write_all(&(v as u64).to_be_bytes()[8 - n..])?;
        } else {
            let n = byte_len((-v) as u64);
            let max = if n == 8 { u64::MAX } else { (1u64 << (8 * n)) - 1 };
            let encoded = (max as i128 + v as i128) as u64;
            w.write_all(&[INT_ZERO - n as u8])?;
            w.write_all(&encoded.to_be_bytes()[8 - n..])?;
        }
        Ok(VersionstampOffset::none())
    }
}

impl TuplePack for u64 {
    fn pack<W: Write>(&self, w: &mut W, depth: TupleDepth) -> io::Result<VersionstampOffset> {
        // u64 values that exceed i64::MAX still round-trip through the
        // unsigned encoding path; the sign byte only ever grows upward.
        if *self <= i64::MAX as u64 {
            (*self as i64).pack(w, depth)
        } else {
            let n = byte_len(*self);
            w.write_all(&[INT_ZERO + n as u8])?;
            w.write_all(&self.to_be_bytes()[8 - n..])?;
            Ok(VersionstampOffset::none())
        }
    }
}

impl TuplePack for f64 {
    fn pack<W: Write>(&self, w: &mut W, _depth: TupleDepth) -> io::Result<VersionstampOffset> {
        let bits = self.to_bits();
        let flipped = if bits & (1 << 63) != 0 {
            !bits
        } else {
            bits | (1 << 63)
        };
        w.write_all(&[DOUBLE])?;
        w.write_all(&flipped.to_be_bytes())?;
        Ok(VersionstampOffset::none())
    }
}

impl TuplePack for [u8] {
    fn pack<W: Write>(&self, w: &mut W, _depth: TupleDepth) -> io::Result<VersionstampOffset> {
        w.write_all(&[super::BYTES])?;
        write_escaped(w, self)?;
        Ok(VersionstampOffset::none())
    }
}

impl TuplePack for Vec<u8> {
    fn pack<W: Write>(&self, w: &mut W, depth: TupleDepth) -> io::Result<VersionstampOffset> {
        self.as_slice().pack(w, depth)
    }
}

impl TuplePack for str {
    fn pack<W: Write>(&self, w: &mut W, _depth: TupleDepth) -> io::Result<VersionstampOffset> {
        w.write_all(&[STRING])?;
        write_escaped(w, self.as_bytes())?;
        Ok(VersionstampOffset::none())
    }
}

impl TuplePack for String {
    fn pack<W: Write>(&self, w: &mut W, depth: TupleDepth) -> io::Result<VersionstampOffset> {
        self.as_str().pack(w, depth)
    }
}

impl<T: TuplePack + ?Sized> TuplePack for &T {
    fn pack<W: Write>(&self, w: &mut W, depth: TupleDepth) -> io::Result<VersionstampOffset> {
        (*self).pack(w, depth)
    }
}
