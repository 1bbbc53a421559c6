use crate::escape::escape;
use crate::value::HostValue;

const OPEN: char = '{';
const CLOSE: char = '}';

/// Renders a host value as peer list/dict literal text.
///
/// Sequences and mappings share the same brace delimiters; the peer tells
/// them apart by context. Fragments are trusted and embedded verbatim.
pub fn serialize(value: &HostValue) -> String {
    match value {
        HostValue::Str(text) => word(text),
        HostValue::Seq(items) => {
            let parts: Vec<String> = items.iter().map(serialize).collect();
            wrap(&parts)
        }
        HostValue::Map(entries) => {
            let mut parts = Vec::with_capacity(entries.len() * 2);
            for (key, value) in entries {
                parts.push(word(key));
                parts.push(serialize(value));
            }
            wrap(&parts)
        }
        HostValue::Fragment(source) => source.clone(),
    }
}

/// Renders a tagged literal, or `None` when the tag is not recognized or the
/// literal cannot be read under it.
pub fn serialize_tagged(tag: &str, literal: &str) -> Option<String> {
    HostValue::from_tagged(tag, literal)
        .ok()
        .map(|value| serialize(&value))
}

/// Renders `text` as exactly one peer word.
///
/// Structural characters are escaped. Empty text, whitespace and command
/// separators are kept inside double quotes.
pub fn word(text: &str) -> String {
    let escaped = escape(text);
    if escaped.is_empty() || escaped.chars().any(|c| c.is_whitespace() || c == ';') {
        format!("\"{}\"", escaped)
    } else {
        escaped
    }
}

fn wrap(parts: &[String]) -> String {
    format!("{}{}{}", OPEN, parts.join(" "), CLOSE)
}
