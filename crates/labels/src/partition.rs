use crate::{expect_one, expect_one_u32, percent_encode, set_value, Error, FIELD_PREFIX, KEY_BEGIN, KEY_BEGIN_MIN, KEY_END};
use proto_gazette::broker::{Label, LabelSet};
use serde_json::Value;
use std::fmt::Write;

/// Encode logical partition field values and their key range into `set`.
/// `fields` must be in sorted order and have the same length as
/// `extractors`, or this function panics.
pub fn encode_field_range(
    mut set: LabelSet,
    key_begin: u32,
    key_end: u32,
    fields: &[impl AsRef<str>],
    extractors: &[doc::Extractor],
    doc: &Value,
) -> Result<LabelSet, Error> {
    assert_eq!(fields.len(), extractors.len());

    for i in 0..fields.len() {
        let field = fields[i].as_ref();
        if i > 0 && field <= fields[i - 1].as_ref() {
            panic!("fields are not in sorted order");
        }

        set = add_value_from_extractor(set, field, &extractors[i], doc)?;
    }

    Ok(encode_key_range(set, key_begin, key_end))
}

fn add_value_from_extractor(
    set: LabelSet,
    field: &str,
    extractor: &doc::Extractor,
    doc: &Value,
) -> Result<LabelSet, Error> {
    // Re-derive the pointed-to node directly so we can inspect its shape;
    // `Extractor` alone only gives us the packed tuple bytes, which aren't
    // suitable for the partition value's scalar-type-specific encoding.
    let node = extractor.query_node(doc);
    let encoded = encode_field_value(String::new(), node)?;
    Ok(crate::add_value(set, &format!("{FIELD_PREFIX}{field}"), &encoded))
}

/// Decode logical partition field values and their key range.
pub fn decode_field_range(set: &LabelSet) -> Result<((u32, u32), Vec<Value>), Error> {
    let key_range = decode_key_range(set)?;
    let mut values = Vec::new();

    for Label { name, value, .. } in &set.labels {
        if name.starts_with(FIELD_PREFIX) {
            values.push(decode_field_value(value)?);
        }
    }

    Ok((key_range, values))
}

/// Encode a begin / end key range into a LabelSet.
pub fn encode_key_range(set: LabelSet, key_begin: u32, key_end: u32) -> LabelSet {
    let fmt = |v: u32| format!("{v:08x}");
    let set = set_value(set, KEY_BEGIN, &fmt(key_begin));
    set_value(set, KEY_END, &fmt(key_end))
}

/// Decode a begin / end key range from a LabelSet.
pub fn decode_key_range(set: &LabelSet) -> Result<(u32, u32), Error> {
    Ok((expect_one_u32(set, KEY_BEGIN)?, expect_one_u32(set, KEY_END)?))
}

/// Encode a partitioned field value by appending into the given String and
/// returning the result. Encoded values are suitable for embedding within
/// journal names as well as label values.
///
/// * Booleans append either `%_true` or `%_false`.
/// * Integers append their base-10 encoding with a `%_` prefix, as in `%_-1234`.
/// * Null appends `%_null`.
/// * String values append their URL query-encoding.
///
/// Types other than strings all use a common `%_` prefix, which can never
/// be produced by a query-encoded string and thus allows unambiguously
/// mapping a partition value back into its JSON value.
pub fn encode_field_value(mut b: String, node: doc::Node<'_>) -> Result<String, Error> {
    match node {
        doc::Node::Null => b.push_str("%_null"),
        doc::Node::Bool(true) => b.push_str("%_true"),
        doc::Node::Bool(false) => b.push_str("%_false"),
        doc::Node::Number(doc::Number::Unsigned(p)) => write!(b, "%_{p}").unwrap(),
        doc::Node::Number(doc::Number::Signed(n)) => write!(b, "%_{n}").unwrap(),
        doc::Node::String(s) => write!(b, "{}", percent_encode(s)).unwrap(),
        doc::Node::Array(_) | doc::Node::Number(doc::Number::Float(_)) | doc::Node::Object(_) => {
            return Err(Error::InvalidValueType)
        }
    };
    Ok(b)
}

/// Decode a partitioned field value into a dynamic Value variant.
pub fn decode_field_value(value: &str) -> Result<Value, Error> {
    Ok(if value == "%_null" {
        Value::Null
    } else if value == "%_true" {
        Value::Bool(true)
    } else if value == "%_false" {
        Value::Bool(false)
    } else if let Some(rest) = value.strip_prefix("%_-") {
        Value::Number((-(rest.parse::<i64>()?)).into())
    } else if let Some(rest) = value.strip_prefix("%_") {
        Value::Number(rest.parse::<u64>()?.into())
    } else {
        Value::String(
            percent_encoding::percent_decode_str(value)
                .decode_utf8()?
                .to_string(),
        )
    })
}

/// Build the journal name suffix implied by the LabelSet. This suffix is
/// appended to the journal template's base name to form a complete name.
pub fn name_suffix(set: &LabelSet) -> Result<String, Error> {
    let mut s = String::new();

    // Relies on labels always being in lexicographic order.
    for label in &set.labels {
        if !label.name.starts_with(FIELD_PREFIX) {
            continue;
        }
        s.push_str(&label.name[FIELD_PREFIX.len()..]);
        s.push('=');
        s.push_str(&label.value);
        s.push('/');
    }
    s.push_str("pivot=");

    let key_begin = expect_one(set, KEY_BEGIN)?;

    // As a prettified special case, and for historical reasons, the
    // KeyBeginMin value of "00000000" is represented as just "00". This is
    // safe because "00" naturally orders before all other splits, exactly
    // as "00000000" would.
    if key_begin == KEY_BEGIN_MIN {
        s.push_str("00");
    } else {
        s.push_str(key_begin);
    }

    Ok(s)
}

/// Extract a journal's templated name prefix.
pub fn name_prefix<'n>(name: &'n str, set: &LabelSet) -> Option<&'n str> {
    let count = set
        .labels
        .iter()
        .filter(|Label { name, .. }| name.starts_with(FIELD_PREFIX))
        .count();

    name.rsplitn(count + 2, '/').nth(count + 1)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::build_set;
    use serde_json::json;

    #[test]
    fn test_partition_value_encoding_round_trip() {
        let cases = [
            (Value::Null, "%_null"),
            (Value::Bool(true), "%_true"),
            (Value::Bool(false), "%_false"),
            (Value::Number(123u64.into()), "%_123"),
            (Value::Number((-123i64).into()), "%_-123"),
            (json!("null"), "null"),
            (json!("%_null"), "%25_null"),
            (json!("hello, world!"), "hello%2C%20world%21"),
            (json!("Baz!@\"Bing\""), "Baz%21%40%22Bing%22"),
        ];

        for (fixture, expect) in cases {
            use doc::AsNode;
            let actual = encode_field_value(String::new(), fixture.as_node()).unwrap();
            assert_eq!(actual, expect);

            let recovered = decode_field_value(&actual).unwrap();
            assert_eq!(recovered, fixture);
        }
    }

    #[test]
    fn test_encoding() {
        let fields = ["bar", "foo"];
        let extractors = [doc::Extractor::new("/b"), doc::Extractor::new("/c")];
        let doc = json!({"a": "hi", "b": -123, "c": true});

        let set = encode_field_range(
            build_set([("pass", "through")]),
            0x12341234,
            0x56785678,
            &fields,
            &extractors,
            &doc,
        )
        .unwrap();

        assert_eq!(crate::values(&set, "estuary.dev/field/bar")[0].value, "%_-123");
        assert_eq!(crate::values(&set, "estuary.dev/field/foo")[0].value, "%_true");
        assert_eq!(crate::values(&set, crate::KEY_BEGIN)[0].value, "12341234");

        let name = format!("base/journal/name/{}", name_suffix(&set).unwrap());
        assert_eq!(name, "base/journal/name/bar=%_-123/foo=%_true/pivot=12341234");
        assert_eq!(name_prefix(&name, &set), Some("base/journal/name"));
    }

    #[test]
    fn test_decode_cases() {
        let model = build_set([
            (crate::KEY_BEGIN, "10001000"),
            (crate::KEY_END, "20002000"),
            ("estuary.dev/field/Bool", "%_true"),
            ("estuary.dev/field/the_int", "%_-8675309"),
        ]);
        let (range, values) = decode_field_range(&model).unwrap();
        assert_eq!(range, (0x10001000, 0x20002000));
        assert_eq!(values, vec![json!(true), json!(-8675309)]);

        let set = crate::remove(model.clone(), crate::KEY_BEGIN);
        assert!(decode_field_range(&set).is_err());
    }
}
