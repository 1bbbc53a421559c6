/// Characters that carry structure in the peer's command syntax.
pub const STRUCTURAL_CHARS: [char; 7] = ['[', ']', '\\', '$', '"', '{', '}'];

const ESCAPE_MARKER: char = '\\';

fn is_structural(c: char) -> bool {
    STRUCTURAL_CHARS.contains(&c)
}

/// Prefixes every structural character in `text` with a backslash.
///
/// Everything else passes through untouched, so text without any of
/// `[ ] \ $ " { }` comes back unchanged.
pub fn escape(text: &str) -> String {
    if !needs_escape(text) {
        return text.to_string();
    }
    let extra = text.chars().filter(|c| is_structural(*c)).count();
    let mut escaped = String::with_capacity(text.len() + extra);
    for c in text.chars() {
        if is_structural(c) {
            escaped.push(ESCAPE_MARKER);
        }
        escaped.push(c);
    }
    escaped
}

/// Returns true if `text` contains at least one structural character.
pub fn needs_escape(text: &str) -> bool {
    text.chars().any(is_structural)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Every structural char must sit behind an odd run of backslashes.
    fn has_unescaped_structural(text: &str) -> bool {
        let chars: Vec<char> = text.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            if chars[i] == '\\' {
                if i + 1 >= chars.len() {
                    return true;
                }
                i += 2;
                continue;
            }
            if is_structural(chars[i]) {
                return true;
            }
            i += 1;
        }
        false
    }

    #[test]
    fn test_plain_text_is_unchanged() {
        for text in ["", "hello", "changed 5", "a.b-c_d", "ünïcödé text", "tab\there"] {
            assert_eq!(escape(text), text);
            assert!(!needs_escape(text));
        }
    }

    #[test]
    fn test_each_structural_char_is_prefixed() {
        assert_eq!(escape("["), "\\[");
        assert_eq!(escape("]"), "\\]");
        assert_eq!(escape("\\"), "\\\\");
        assert_eq!(escape("$"), "\\$");
        assert_eq!(escape("\""), "\\\"");
        assert_eq!(escape("{"), "\\{");
        assert_eq!(escape("}"), "\\}");
    }

    #[test]
    fn test_mixed_text() {
        assert_eq!(
            escape("puts \"[set x $y]\" {z}"),
            "puts \\\"\\[set x \\$y\\]\\\" \\{z\\}"
        );
    }

    #[test]
    fn test_escaped_output_has_no_unescaped_structure() {
        let samples = [
            "set a {b c}",
            "\\\\\\",
            "$$$[[[]]]",
            "\"quoted\" and {braced} and [bracketed]",
            "trailing backslash \\",
        ];
        for sample in samples {
            assert!(needs_escape(sample));
            assert!(!has_unescaped_structural(&escape(sample)), "{sample}");
        }
    }
}
