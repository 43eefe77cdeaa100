use super::{Error, BYTES, DOUBLE, FALSE, INT_MAX, INT_MIN, INT_ZERO, NIL, STRING, TRUE};

/// A decoded tuple element. Used by tests and diagnostics; the hot path
/// (hashing a packed key) never needs to unpack.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Nil,
    Bool(bool),
    Int(i64),
    Double(f64),
    Bytes(Vec<u8>),
    String(String),
}

/// Decode a packed tuple into its constituent elements.
pub fn unpack(mut buf: &[u8]) -> Result<Vec<Element>, Error> {
    let mut out = Vec::new();

    while !buf.is_empty() {
        let code = buf[0];
        buf = &buf[1..];

        match code {
            NIL => out.push(Element::Nil),
            FALSE => out.push(Element::Bool(false)),
            TRUE => out.push(Element::Bool(true)),
            BYTES | STRING => {
                let (raw, rest) = take_escaped(buf)?;
                buf = rest;
                if code == BYTES {
                    out.push(Element::Bytes(raw));
                } else {
                    out.push(Element::String(String::from_utf8(raw).map_err(|e| {
                        Error::InvalidUtf8(e.utf8_error())
                    })?));
                }
            }
            DOUBLE => {
                if buf.len() < 8 {
                    return Err(Error::UnexpectedEnd);
                }
                let mut bits = u64::from_be_bytes(buf[..8].try_into().unwrap());
                buf = &buf[8..];
                bits = if bits & (1 << 63) != 0 {
                    bits & !(1 << 63)
                } else {
                    !bits
                };
                out.push(Element::Double(f64::from_bits(bits)));
            }
            c if c >= INT_MIN && c <= INT_MAX => {
                let n = (c as i32 - INT_ZERO as i32).unsigned_abs() as usize;
                if buf.len() < n {
                    return Err(Error::UnexpectedEnd);
                }
                let mut bytes = [0u8; 8];
                bytes[8 - n..].copy_from_slice(&buf[..n]);
                buf = &buf[n..];
                let raw = u64::from_be_bytes(bytes);

                let value = if c >= INT_ZERO {
                    raw as i64
                } else {
                    let max = if n == 8 { u64::MAX } else { (1u64 << (8 * n)) - 1 };
                    (raw as i128 - max as i128) as i64
                };
                out.push(Element::Int(value));
            }
            other => return Err(Error::InvalidTypeCode(other)),
        }
    }

    Ok(out)
}

fn take_escaped(buf: &[u8]) -> Result<(Vec<u8>, &[u8]), Error> {
    let mut out = Vec::new();
    let mut i = 0;
    loop {
        if i >= buf.len() {
            return Err(Error::UnexpectedEnd);
        }
        match buf[i] {
            0x00 if buf.get(i + 1) == Some(&0xff) => {
                out.push(0x00);
                i += 2;
            }
            0x00 => {
                return Ok((out, &buf[i + 1..]));
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::pack::{TupleDepth, TuplePack};
    use super::*;

    fn roundtrip(pack: impl FnOnce(&mut Vec<u8>)) -> Vec<Element> {
        let mut buf = Vec::new();
        pack(&mut buf);
        unpack(&buf).unwrap()
    }

    #[test]
    fn test_bool_roundtrip() {
        assert_eq!(
            roundtrip(|b| {
                true.pack(b, TupleDepth::new()).unwrap();
            }),
            vec![Element::Bool(true)]
        );
        assert_eq!(
            roundtrip(|b| {
                false.pack(b, TupleDepth::new()).unwrap();
            }),
            vec![Element::Bool(false)]
        );
    }

    #[test]
    fn test_int_roundtrip() {
        for v in [0i64, 1, -1, 255, -255, 65536, -65536, i64::MAX, i64::MIN + 1] {
            assert_eq!(
                roundtrip(|b| {
                    v.pack(b, TupleDepth::new()).unwrap();
                }),
                vec![Element::Int(v)],
                "value {v}"
            );
        }
    }

    #[test]
    fn test_string_roundtrip() {
        for s in ["foobar", "foobas", "", "has\0null"] {
            assert_eq!(
                roundtrip(|b| {
                    s.pack(b, TupleDepth::new()).unwrap();
                }),
                vec![Element::String(s.to_string())]
            );
        }
    }

    #[test]
    fn test_ordering_preserved() {
        // Packed byte ordering must match the natural ordering of the
        // values for the partition picker's binary search to be valid.
        let mut a = Vec::new();
        let mut b = Vec::new();
        (-5i64).pack(&mut a, TupleDepth::new()).unwrap();
        (5i64).pack(&mut b, TupleDepth::new()).unwrap();
        assert!(a < b);

        let mut a = Vec::new();
        let mut b = Vec::new();
        "foobar".pack(&mut a, TupleDepth::new()).unwrap();
        "foobas".pack(&mut b, TupleDepth::new()).unwrap();
        assert!(a < b);
    }
}
