use crate::errors::{BridgeError, BridgeResult};
use crate::list::split_list;
use indexmap::IndexMap;
use std::fmt;
use std::str::FromStr;

/// A host-side value that can be rendered into peer syntax.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    /// Plain text, escaped when rendered.
    Str(String),
    /// Ordered sequence of values.
    Seq(Vec<HostValue>),
    /// Insertion-ordered key/value mapping.
    Map(IndexMap<String, HostValue>),
    /// Peer-evaluable source text, rendered verbatim.
    Fragment(String),
}

/// The tag carried by untyped input when it crosses into the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueTag {
    Str,
    Seq,
    Map,
    Fragment,
}

impl FromStr for ValueTag {
    type Err = BridgeError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag {
            "string" | "str" => Ok(ValueTag::Str),
            "list" | "sequence" => Ok(ValueTag::Seq),
            "dict" | "mapping" => Ok(ValueTag::Map),
            "script" | "fragment" => Ok(ValueTag::Fragment),
            other => Err(BridgeError::Serialization(other.to_string())),
        }
    }
}

impl fmt::Display for ValueTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueTag::Str => "string",
            ValueTag::Seq => "list",
            ValueTag::Map => "dict",
            ValueTag::Fragment => "script",
        };
        f.write_str(name)
    }
}

impl HostValue {
    pub fn tag(&self) -> ValueTag {
        match self {
            HostValue::Str(_) => ValueTag::Str,
            HostValue::Seq(_) => ValueTag::Seq,
            HostValue::Map(_) => ValueTag::Map,
            HostValue::Fragment(_) => ValueTag::Fragment,
        }
    }

    /// Builds a value from a tag name and a peer literal.
    ///
    /// List and dict literals are split as peer lists; their elements become
    /// `Str` values. Unknown tags fail with `Serialization`.
    pub fn from_tagged(tag: &str, literal: &str) -> BridgeResult<Self> {
        match tag.parse::<ValueTag>()? {
            ValueTag::Str => Ok(HostValue::Str(literal.to_string())),
            ValueTag::Fragment => Ok(HostValue::Fragment(literal.to_string())),
            ValueTag::Seq => Ok(HostValue::Seq(
                split_list(literal)?.into_iter().map(HostValue::Str).collect(),
            )),
            ValueTag::Map => {
                let words = split_list(literal)?;
                if words.len() % 2 != 0 {
                    return Err(BridgeError::Syntax(
                        "missing value to go with key".to_string(),
                    ));
                }
                let mut map = IndexMap::with_capacity(words.len() / 2);
                let mut words = words.into_iter();
                while let (Some(key), Some(value)) = (words.next(), words.next()) {
                    map.insert(key, HostValue::Str(value));
                }
                Ok(HostValue::Map(map))
            }
        }
    }
}

impl From<&str> for HostValue {
    fn from(text: &str) -> Self {
        HostValue::Str(text.to_string())
    }
}

impl From<String> for HostValue {
    fn from(text: String) -> Self {
        HostValue::Str(text)
    }
}

impl<T: Into<HostValue>> From<Vec<T>> for HostValue {
    fn from(items: Vec<T>) -> Self {
        HostValue::Seq(items.into_iter().map(Into::into).collect())
    }
}
