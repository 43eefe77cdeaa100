use crate::{AsNode, Node};

/// A single token of a parsed JSON pointer (RFC 6901).
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Property(String),
    Index(usize),
    /// The `-` token: one past the end of an array. Only meaningful when
    /// constructing documents, which this crate never does; querying
    /// against it always misses.
    NextIndex,
}

impl Token {
    fn parse(raw: &str) -> Token {
        let unescaped = raw.replace("~1", "/").replace("~0", "~");
        if unescaped == "-" {
            Token::NextIndex
        } else if let Ok(index) = unescaped.parse::<usize>() {
            // Per RFC 6901, only tokens without leading zeros (other than
            // "0" itself) are valid array indices; anything else stays a
            // property lookup so `/items/01` doesn't silently match `/items/1`.
            if unescaped == index.to_string() {
                Token::Index(index)
            } else {
                Token::Property(unescaped)
            }
        } else {
            Token::Property(unescaped)
        }
    }
}

/// A parsed JSON pointer, usable to query a document for the node it
/// addresses. Mirrors the semantics of RFC 6901, with an empty string
/// addressing the document root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pointer(Vec<Token>);

impl Pointer {
    pub fn parse(ptr: &str) -> Pointer {
        if ptr.is_empty() {
            return Pointer(Vec::new());
        }
        let ptr = ptr.strip_prefix('/').unwrap_or(ptr);
        Pointer(ptr.split('/').map(Token::parse).collect())
    }

    /// Query `doc` for the node this pointer addresses, returning `None`
    /// if any component of the path is missing.
    pub fn query<'n>(&self, doc: &'n serde_json::Value) -> Option<Node<'n>> {
        Self::query_value(&self.0, doc)
    }

    fn query_value<'n>(tokens: &[Token], value: &'n serde_json::Value) -> Option<Node<'n>> {
        match tokens.split_first() {
            None => Some(value.as_node()),
            Some((Token::Property(key), rest)) => {
                Self::query_value(rest, value.as_object()?.get(key)?)
            }
            Some((Token::Index(idx), rest)) => {
                Self::query_value(rest, value.as_array()?.get(*idx)?)
            }
            Some((Token::NextIndex, _)) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_root_pointer() {
        let doc = json!({"a": 1});
        let ptr = Pointer::parse("");
        assert!(matches!(ptr.query(&doc), Some(Node::Object(_))));
    }

    #[test]
    fn test_nested_property() {
        let doc = json!({"a": {"b": "hello"}});
        let ptr = Pointer::parse("/a/b");
        match ptr.query(&doc) {
            Some(Node::String(s)) => assert_eq!(s, "hello"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_array_index() {
        let doc = json!({"a": [10, 20, 30]});
        let ptr = Pointer::parse("/a/1");
        match ptr.query(&doc) {
            Some(Node::Number(crate::Number::Unsigned(n))) => assert_eq!(n, 20),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_missing_path() {
        let doc = json!({"a": 1});
        assert!(Pointer::parse("/b/c").query(&doc).is_none());
    }

    #[test]
    fn test_escaped_tokens() {
        let doc = json!({"a/b": 1, "c~d": 2});
        assert!(Pointer::parse("/a~1b").query(&doc).is_some());
        assert!(Pointer::parse("/c~0d").query(&doc).is_some());
    }
}
