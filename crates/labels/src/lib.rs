// NOTE constants in this file must be mirrored wherever a non-Rust process
// reads or writes journal and shard labels.

pub mod partition;
pub mod shard;

use proto_gazette::broker::{Label, LabelSet};

// JournalSpec & ShardSpec labels.
pub const BUILD: &str = "estuary.dev/build";
pub const COLLECTION: &str = "estuary.dev/collection";
pub const FIELD_PREFIX: &str = "estuary.dev/field/";
pub const KEY_BEGIN: &str = "estuary.dev/key-begin";
pub const KEY_BEGIN_MIN: &str = "00000000";
pub const KEY_END: &str = "estuary.dev/key-end";
pub const KEY_END_MAX: &str = "ffffffff";
pub const MANAGED_BY_FLOW: &str = "estuary.dev/flow";

// ShardSpec labels.
pub const TASK_NAME: &str = "estuary.dev/task-name";
pub const TASK_TYPE: &str = "estuary.dev/task-type";
pub const TASK_TYPE_CAPTURE: &str = "capture";
pub const TASK_TYPE_DERIVATION: &str = "derivation";
pub const TASK_TYPE_MATERIALIZATION: &str = "materialization";
pub const RCLOCK_BEGIN: &str = "estuary.dev/rclock-begin";
pub const RCLOCK_BEGIN_MIN: &str = KEY_BEGIN;
pub const RCLOCK_END: &str = "estuary.dev/rclock-end";
pub const RCLOCK_END_MAX: &str = KEY_END_MAX;
pub const SPLIT_TARGET: &str = "estuary.dev/split-target";
pub const SPLIT_SOURCE: &str = "estuary.dev/split-source";
pub const LOG_LEVEL: &str = "estuary.dev/log-level";
pub const LOGS_JOURNAL: &str = "estuary.dev/logs-journal";
pub const STATS_JOURNAL: &str = "estuary.dev/stats-journal";
// Shard labels related to network connectivity to shards.
pub const HOSTNAME: &str = "estuary.dev/hostname";
pub const EXPOSE_PORT: &str = "estuary.dev/expose-port";
pub const PORT_PROTO_PREFIX: &str = "estuary.dev/port-proto/";
pub const PORT_PUBLIC_PREFIX: &str = "estuary.dev/port-public/";

// A used subset of Gazette labels.
pub const CONTENT_TYPE: &str = "content-type";
pub const CONTENT_TYPE_JSON_LINES: &str = "application/x-ndjson";
pub const MANAGED_BY: &str = "app.gazette.dev/managed-by";

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("expected one label for {0} (got {1:?})")]
    ExpectedOne(String, Vec<Label>),
    #[error("label {0} value is empty but shouldn't be")]
    ValueEmpty(String),
    #[error("invalid value {value:?} for label {name}")]
    InvalidValue { name: String, value: String },
    #[error("both split-source {0} and split-target {1} are set but shouldn't be")]
    SplitSourceAndTarget(String, String),
    #[error("partitioned field value is not a supported scalar type")]
    InvalidValueType,
    #[error("failed to parse label value as integer")]
    InvalidInteger(#[from] std::num::ParseIntError),
    #[error("invalid UTF-8 in percent-decoded label value")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

/// Build a LabelSet from an ordered iterator of (name, value) pairs.
pub fn build_set<'s>(pairs: impl IntoIterator<Item = (&'s str, &'s str)>) -> LabelSet {
    let mut set = LabelSet::default();
    for (name, value) in pairs {
        set = add_value(set, name, value);
    }
    set
}

/// Add a label, keeping the set sorted by (name, value) and allowing
/// multiple values for the same name.
pub fn add_value(mut set: LabelSet, name: &str, value: &str) -> LabelSet {
    set.labels.push(Label {
        name: name.to_string(),
        value: value.to_string(),
    });
    set.labels
        .sort_by(|a, b| (a.name.as_str(), a.value.as_str()).cmp(&(b.name.as_str(), b.value.as_str())));
    set
}

/// Set a single-valued label, replacing any prior values of that name.
pub fn set_value(set: LabelSet, name: &str, value: &str) -> LabelSet {
    add_value(remove(set, name), name, value)
}

/// Remove all labels with the given name.
pub fn remove(mut set: LabelSet, name: &str) -> LabelSet {
    set.labels.retain(|l| l.name != name);
    set
}

/// Return every label value with the given name. The set must be sorted by
/// name, which `add_value` / `set_value` / `remove` maintain.
pub fn values<'s>(set: &'s LabelSet, name: &str) -> &'s [Label] {
    let start = set.labels.partition_point(|l| l.name.as_str() < name);
    let end = start + set.labels[start..].partition_point(|l| l.name.as_str() == name);
    &set.labels[start..end]
}

fn expect_one<'s>(set: &'s LabelSet, name: &str) -> Result<&'s str, Error> {
    let labels = values(set, name);
    if labels.len() != 1 {
        Err(Error::ExpectedOne(name.to_string(), labels.to_vec()))
    } else if labels[0].value.is_empty() {
        Err(Error::ValueEmpty(name.to_string()))
    } else {
        Ok(labels[0].value.as_str())
    }
}

fn maybe_one<'s>(set: &'s LabelSet, name: &str) -> Result<&'s str, Error> {
    let labels = values(set, name);
    if labels.len() > 1 {
        Err(Error::ExpectedOne(name.to_string(), labels.to_vec()))
    } else if labels.is_empty() {
        Ok("")
    } else if labels[0].value.is_empty() {
        Err(Error::ValueEmpty(name.to_string()))
    } else {
        Ok(labels[0].value.as_str())
    }
}

fn expect_one_u32(set: &LabelSet, name: &str) -> Result<u32, Error> {
    let value = expect_one(set, name)?;
    let (8, Ok(parsed)) = (value.len(), u32::from_str_radix(value, 16)) else {
        return Err(Error::InvalidValue {
            name: name.to_string(),
            value: value.to_string(),
        });
    };
    Ok(parsed)
}

const FIELD_VALUE_ENCODE_SET: &percent_encoding::AsciiSet = &percent_encoding::NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

fn percent_encode(s: &str) -> percent_encoding::PercentEncode<'_> {
    percent_encoding::utf8_percent_encode(s, FIELD_VALUE_ENCODE_SET)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_is_sorted_subrange() {
        let set = build_set([("a", "1"), ("b", "2"), ("b", "3"), ("c", "4")]);
        assert_eq!(values(&set, "b").iter().map(|l| l.value.as_str()).collect::<Vec<_>>(), vec!["2", "3"]);
        assert!(values(&set, "missing").is_empty());
    }

    #[test]
    fn test_set_value_replaces() {
        let set = build_set([("a", "1"), ("a", "2")]);
        let set = set_value(set, "a", "3");
        assert_eq!(values(&set, "a").len(), 1);
        assert_eq!(values(&set, "a")[0].value, "3");
    }
}
