use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

/// A JSON pointer (RFC 6901) identifying a location within a document,
/// such as `/a/b/0`. An empty string is the document root.
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema)]
#[serde(transparent)]
pub struct JsonPointer(String);

impl JsonPointer {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn example() -> Self {
        Self::new("/json/ptr")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::ops::Deref for JsonPointer {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JsonPointer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JsonPointer {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl Validate for JsonPointer {
    fn validate(&self) -> Result<(), ValidationErrors> {
        if self.0.is_empty() {
            return Ok(());
        }
        if !self.0.starts_with('/') {
            let mut errors = ValidationErrors::new();
            errors.add("0", invalid("must be empty or begin with '/'"));
            return Err(errors);
        }
        for token in self.0[1..].split('/') {
            let mut chars = token.chars().peekable();
            while let Some(c) = chars.next() {
                if c == '~' {
                    match chars.next() {
                        Some('0') | Some('1') => continue,
                        _ => {
                            let mut errors = ValidationErrors::new();
                            errors.add("0", invalid("'~' must be followed by '0' or '1'"));
                            return Err(errors);
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

fn invalid(msg: &'static str) -> ValidationError {
    let mut e = ValidationError::new("json_pointer");
    e.message = Some(msg.into());
    e
}

/// An ordered composite of JSON pointers, identifying the fields that
/// together form a shuffle or collection key.
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq, JsonSchema)]
#[serde(transparent)]
pub struct CompositeKey(Vec<JsonPointer>);

impl CompositeKey {
    pub fn new(parts: impl Into<Vec<JsonPointer>>) -> Self {
        Self(parts.into())
    }

    pub fn example() -> Self {
        Self(vec![JsonPointer::example()])
    }
}

impl std::ops::Deref for CompositeKey {
    type Target = Vec<JsonPointer>;

    fn deref(&self) -> &Vec<JsonPointer> {
        &self.0
    }
}

impl Validate for CompositeKey {
    fn validate(&self) -> Result<(), ValidationErrors> {
        ValidationErrors::merge_all(Ok(()), "composite key", self.0.iter().map(JsonPointer::validate).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_pointer_validation() {
        for (case, expect) in [("", true), ("/a/b", true), ("/a~0b/c~1d", true), ("no/leading/slash", false), ("/a~2b", false)] {
            let result = JsonPointer::new(case).validate();
            assert_eq!(result.is_ok(), expect, "case {case:?}");
        }
    }

    #[test]
    fn test_composite_key_roundtrips_json() {
        let key = CompositeKey::new(vec![JsonPointer::new("/a"), JsonPointer::new("/b")]);
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, r#"["/a","/b"]"#);
        assert_eq!(serde_json::from_str::<CompositeKey>(&json).unwrap(), key);
    }
}
