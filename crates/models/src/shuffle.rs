use super::CompositeKey;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A Shuffle specifies how a shuffling key is extracted from collection
/// documents, as declared on a derivation transform or materialization
/// binding.
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub enum Shuffle {
    /// Shuffle by extracting the given fields.
    Key(CompositeKey),
    /// Invoke the lambda for each source document, and shuffle on its
    /// returned key.
    Lambda(Lambda),
}

impl Shuffle {
    pub fn example() -> Self {
        Self::Key(CompositeKey::example())
    }
}

/// Lambdas are user functions the runtime invokes to compute a shuffle key
/// or transform a document, outside of the collection's own key.
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub enum Lambda {
    Typescript,
    Remote(String),
    Sql(String),
}

impl Lambda {
    pub fn example_remote() -> Self {
        Self::Remote("http://example/api".to_string())
    }
}

/// Partition selectors identify a desired subset of the available logical
/// partitions of a collection.
#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct PartitionSelector {
    /// Partition field names and corresponding values which must be
    /// matched from the source collection. Only documents having one of
    /// the specified values across all specified partition names match.
    #[serde(default)]
    pub include: BTreeMap<String, Vec<serde_json::Value>>,
    /// Partition field names and values which are excluded. Any document
    /// matching any one of the partition values is excluded.
    #[serde(default)]
    pub exclude: BTreeMap<String, Vec<serde_json::Value>>,
}

impl PartitionSelector {
    pub fn example() -> Self {
        serde_json::from_value(serde_json::json!({
            "include": {"a_partition": ["A", "B"]},
            "exclude": {"other_partition": [32, 64]},
        }))
        .unwrap()
    }

    pub fn matches_all(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shuffle_key_variant_serializes_tagged() {
        let s = Shuffle::Key(CompositeKey::new(vec!["/a".into()]));
        let json = serde_json::to_string(&s).unwrap();
        assert_eq!(json, r#"{"Key":["/a"]}"#);
    }

    #[test]
    fn test_partition_selector_default_matches_all() {
        assert!(PartitionSelector::default().matches_all());
        assert!(!PartitionSelector::example().matches_all());
    }
}
