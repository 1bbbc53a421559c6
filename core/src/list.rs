//! Splitting of peer list and script text into words.
//!
//! The peer's syntax groups words with braces (contents kept verbatim) or
//! double quotes (backslash sequences substituted). Scripts are sequences of
//! commands separated by newlines or semicolons.

use crate::errors::{BridgeError, BridgeResult};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    List,
    Script,
}

struct Splitter {
    chars: Vec<char>,
    pos: usize,
    mode: Mode,
}

impl Splitter {
    fn new(text: &str, mode: Mode) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            mode,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn is_separator(&self, c: char) -> bool {
        match self.mode {
            Mode::List => c.is_whitespace(),
            Mode::Script => c != '\n' && c.is_whitespace(),
        }
    }

    fn is_terminator(&self, c: char) -> bool {
        self.mode == Mode::Script && (c == '\n' || c == ';')
    }

    fn ends_word(&self, c: char) -> bool {
        self.is_separator(c) || self.is_terminator(c)
    }

    fn skip_separators(&mut self) {
        while let Some(c) = self.peek() {
            if self.is_separator(c) {
                self.pos += 1;
            } else if self.mode == Mode::Script && c == '\\' && self.peek_next() == Some('\n') {
                // line continuation
                self.pos += 2;
            } else {
                break;
            }
        }
    }

    fn skip_blank(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() || c == ';' {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn skip_line(&mut self) {
        while let Some(c) = self.peek() {
            self.pos += 1;
            if c == '\n' {
                break;
            }
        }
    }

    /// Reads words until a command terminator or the end of input.
    fn words(&mut self) -> BridgeResult<Vec<String>> {
        let mut words = Vec::new();
        loop {
            self.skip_separators();
            match self.peek() {
                None => break,
                Some(c) if self.is_terminator(c) => break,
                Some('{') => words.push(self.braced()?),
                Some('"') => words.push(self.quoted()?),
                Some(_) => words.push(self.bare()),
            }
        }
        Ok(words)
    }

    fn braced(&mut self) -> BridgeResult<String> {
        self.pos += 1;
        let mut depth = 1usize;
        let mut word = String::new();
        while let Some(c) = self.peek() {
            self.pos += 1;
            match c {
                '\\' => {
                    word.push(c);
                    if let Some(next) = self.peek() {
                        word.push(next);
                        self.pos += 1;
                    }
                }
                '{' => {
                    depth += 1;
                    word.push(c);
                }
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        self.expect_word_end("close-brace")?;
                        return Ok(word);
                    }
                    word.push(c);
                }
                _ => word.push(c),
            }
        }
        Err(BridgeError::Syntax("missing close-brace".to_string()))
    }

    fn quoted(&mut self) -> BridgeResult<String> {
        self.pos += 1;
        let mut word = String::new();
        while let Some(c) = self.peek() {
            self.pos += 1;
            match c {
                '\\' => word.push(self.backslash()),
                '"' => {
                    self.expect_word_end("close-quote")?;
                    return Ok(word);
                }
                _ => word.push(c),
            }
        }
        Err(BridgeError::Syntax("missing \"".to_string()))
    }

    fn bare(&mut self) -> String {
        let mut word = String::new();
        while let Some(c) = self.peek() {
            if self.ends_word(c) {
                break;
            }
            self.pos += 1;
            if c == '\\' {
                word.push(self.backslash());
            } else {
                word.push(c);
            }
        }
        word
    }

    // Called with the backslash already consumed.
    fn backslash(&mut self) -> char {
        match self.peek() {
            None => '\\',
            Some(c) => {
                self.pos += 1;
                match c {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    '\n' => ' ',
                    other => other,
                }
            }
        }
    }

    fn expect_word_end(&self, after: &str) -> BridgeResult<()> {
        match self.peek() {
            Some(c) if !self.ends_word(c) => Err(BridgeError::Syntax(format!(
                "extra characters after {}",
                after
            ))),
            _ => Ok(()),
        }
    }
}

/// Splits a peer list into its elements.
pub fn split_list(text: &str) -> BridgeResult<Vec<String>> {
    Splitter::new(text, Mode::List).words()
}

/// Splits a peer script into commands, each a list of words.
///
/// Comments (`#` at the start of a command) and empty commands are dropped.
pub fn split_script(text: &str) -> BridgeResult<Vec<Vec<String>>> {
    let mut splitter = Splitter::new(text, Mode::Script);
    let mut commands = Vec::new();
    loop {
        splitter.skip_blank();
        match splitter.peek() {
            None => break,
            Some('#') => {
                splitter.skip_line();
                continue;
            }
            Some(_) => {}
        }
        let words = splitter.words()?;
        if !words.is_empty() {
            commands.push(words);
        }
    }
    Ok(commands)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_split_simple_list() {
        assert_eq!(split_list("a b  c").unwrap(), strings(&["a", "b", "c"]));
        assert!(split_list("   ").unwrap().is_empty());
    }

    #[test]
    fn test_braces_keep_contents_verbatim() {
        assert_eq!(
            split_list("x {a {b c} $d} y").unwrap(),
            strings(&["x", "a {b c} $d", "y"])
        );
        assert_eq!(split_list("{a \\} b}").unwrap(), strings(&["a \\} b"]));
        assert_eq!(split_list("{}").unwrap(), strings(&[""]));
    }

    #[test]
    fn test_quotes_substitute_backslashes() {
        assert_eq!(
            split_list("\"a b\" \"c\\\"d\" e\\$f").unwrap(),
            strings(&["a b", "c\"d", "e$f"])
        );
        assert_eq!(split_list("\"line\\nbreak\"").unwrap(), strings(&["line\nbreak"]));
    }

    #[test]
    fn test_newlines_separate_list_elements() {
        assert_eq!(split_list("a\nb\n\tc").unwrap(), strings(&["a", "b", "c"]));
    }

    #[test]
    fn test_unbalanced_groups_are_syntax_errors() {
        assert!(matches!(split_list("{a b"), Err(BridgeError::Syntax(_))));
        assert!(matches!(split_list("\"a b"), Err(BridgeError::Syntax(_))));
        assert!(matches!(split_list("{a}b"), Err(BridgeError::Syntax(_))));
        assert!(matches!(split_list("\"a\"b"), Err(BridgeError::Syntax(_))));
    }

    #[test]
    fn test_split_script_commands() {
        let script = "log hello world\nset x list {a b\nc}; unset y\n\n";
        assert_eq!(
            split_script(script).unwrap(),
            vec![
                strings(&["log", "hello", "world"]),
                strings(&["set", "x", "list", "a b\nc"]),
                strings(&["unset", "y"]),
            ]
        );
    }

    #[test]
    fn test_split_script_skips_comments() {
        let script = "# leading comment\nlog a\n  # indented comment ; still comment\nlog b";
        assert_eq!(
            split_script(script).unwrap(),
            vec![strings(&["log", "a"]), strings(&["log", "b"])]
        );
    }

    #[test]
    fn test_split_script_line_continuation() {
        assert_eq!(
            split_script("log a \\\n b").unwrap(),
            vec![strings(&["log", "a", "b"])]
        );
    }

    #[test]
    fn test_split_script_empty() {
        assert!(split_script("").unwrap().is_empty());
        assert!(split_script(" ;;\n ").unwrap().is_empty());
    }
}
