//! Bracket balance check run before any run/submit request.
//!
//! Quoted text is skipped so that `print(")")` is accepted. A one-line quote
//! left open ends at the newline, which keeps apostrophes in comments
//! (`# don't`) from swallowing the rest of the file. Comments and Python
//! triple-quoted strings are skipped according to the submission language.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a source failed the bracket check. Positions are 1-based.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum BracketError {
    /// A closing bracket with nothing open.
    #[error("unexpected '{found}' at line {line}, column {column}")]
    Unexpected { found: char, line: usize, column: usize },

    /// A closing bracket that does not match the innermost open one.
    #[error("expected '{expected}' but found '{found}' at line {line}, column {column}")]
    Mismatched {
        expected: char,
        found: char,
        line: usize,
        column: usize,
    },

    /// An opening bracket never closed.
    #[error("'{open}' opened at line {line}, column {column} is never closed")]
    Unclosed { open: char, line: usize, column: usize },
}

/// Comment and string syntax the checker knows how to skip.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SourceSyntax {
    /// `#` line comments and `'''`/`"""` strings.
    Python,
    /// `//` line comments and `/* */` block comments.
    CFamily,
    /// Quotes only.
    #[default]
    Plain,
}

impl SourceSyntax {
    /// Syntax for a contest language name. Unknown languages get `Plain`.
    pub fn for_language(language: &str) -> Self {
        match language.trim().to_ascii_lowercase().as_str() {
            "python" | "python3" | "py" => SourceSyntax::Python,
            "c" | "cpp" | "c++" | "java" | "javascript" | "js" | "typescript" | "ts" | "csharp"
            | "c#" | "go" | "kotlin" | "rust" | "swift" => SourceSyntax::CFamily,
            _ => SourceSyntax::Plain,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Scan {
    Code,
    Quote(char),
    TripleQuote(char),
    LineComment,
    BlockComment,
}

fn closer_for(open: char) -> Option<char> {
    match open {
        '(' => Some(')'),
        '[' => Some(']'),
        '{' => Some('}'),
        _ => None,
    }
}

fn is_triple(chars: &[char], at: usize, quote: char) -> bool {
    chars.get(at + 1) == Some(&quote) && chars.get(at + 2) == Some(&quote)
}

/// Check that `()`, `[]` and `{}` are balanced and properly nested,
/// skipping quoted text only.
pub fn check_brackets(source: &str) -> Result<(), BracketError> {
    check_source(source, SourceSyntax::Plain)
}

/// Bracket check that also skips the comments and strings of `syntax`.
pub fn check_source(source: &str, syntax: SourceSyntax) -> Result<(), BracketError> {
    let chars: Vec<char> = source.chars().collect();
    let mut stack: Vec<(char, usize, usize)> = Vec::new();
    let mut scan = Scan::Code;
    let (mut line, mut column) = (1usize, 1usize);
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        let next = chars.get(i + 1).copied();
        let mut width = 1;

        match scan {
            Scan::Code => match ch {
                '#' if syntax == SourceSyntax::Python => scan = Scan::LineComment,
                '/' if syntax == SourceSyntax::CFamily && next == Some('/') => {
                    scan = Scan::LineComment;
                    width = 2;
                }
                '/' if syntax == SourceSyntax::CFamily && next == Some('*') => {
                    scan = Scan::BlockComment;
                    width = 2;
                }
                '"' | '\'' if syntax == SourceSyntax::Python && is_triple(&chars, i, ch) => {
                    scan = Scan::TripleQuote(ch);
                    width = 3;
                }
                '"' | '\'' | '`' => scan = Scan::Quote(ch),
                '(' | '[' | '{' => stack.push((ch, line, column)),
                ')' | ']' | '}' => match stack.pop() {
                    None => {
                        return Err(BracketError::Unexpected {
                            found: ch,
                            line,
                            column,
                        })
                    }
                    Some((open, _, _)) => {
                        let expected = closer_for(open).unwrap_or(ch);
                        if expected != ch {
                            return Err(BracketError::Mismatched {
                                expected,
                                found: ch,
                                line,
                                column,
                            });
                        }
                    }
                },
                _ => {}
            },
            Scan::Quote(quote) => match ch {
                '\\' => width = 2,
                '\n' => scan = Scan::Code,
                c if c == quote => scan = Scan::Code,
                _ => {}
            },
            Scan::TripleQuote(quote) => match ch {
                '\\' => width = 2,
                c if c == quote && is_triple(&chars, i, quote) => {
                    scan = Scan::Code;
                    width = 3;
                }
                _ => {}
            },
            Scan::LineComment => {
                if ch == '\n' {
                    scan = Scan::Code;
                }
            }
            Scan::BlockComment => {
                if ch == '*' && next == Some('/') {
                    scan = Scan::Code;
                    width = 2;
                }
            }
        }

        for &c in chars.iter().skip(i).take(width) {
            if c == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
        i += width;
    }

    match stack.pop() {
        Some((open, line, column)) => Err(BracketError::Unclosed { open, line, column }),
        None => Ok(()),
    }
}
