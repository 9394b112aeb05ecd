//! Lexer for cell style strings using logos
//!
//! A style string is a `;` separated list of entries. Each entry is either a
//! named style (`rounded`) or an assignment (`fillColor=#ff0000`). A leading
//! `;` means the defaults are not inherited.

use logos::Logos;

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

#[derive(Logos, Debug, Clone, Copy, PartialEq)]
pub enum Token {
    #[token(";")]
    Separator,
    #[token("=")]
    Assign,
    #[regex(r"[^;=]+")]
    Text,
}

/// One entry of a parsed style string, in source order
#[derive(Debug, Clone, PartialEq)]
pub enum StyleEntry {
    /// Merge a named style from the stylesheet
    Named(String),
    /// Set a key
    Set(String, String),
    /// `key=none` removes the key
    Remove(String),
}

/// A tokenized style string
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedStyle {
    pub inherit_defaults: bool,
    pub entries: Vec<StyleEntry>,
}

/// Lex input string into tokens with spans
pub fn lex(input: &str) -> impl Iterator<Item = (Token, Span)> + '_ {
    Token::lexer(input)
        .spanned()
        .filter_map(|(tok, span)| tok.ok().map(|t| (t, span)))
}

/// Split a style string into entries.
///
/// The value of an assignment is everything after its first `=`, so values
/// may themselves contain `=`.
pub fn parse_style(input: &str) -> ParsedStyle {
    let mut parsed = ParsedStyle {
        inherit_defaults: !input.starts_with(';'),
        entries: Vec::new(),
    };

    let mut entry_start: Option<usize> = None;
    let mut assign_at: Option<usize> = None;
    let mut flush = |start: Option<usize>, assign: Option<usize>, end: usize| {
        let Some(start) = start else { return };
        match assign {
            Some(eq) => {
                let key = input[start..eq].trim();
                let value = input[eq + 1..end].trim();
                if key.is_empty() {
                    return;
                }
                if value == "none" {
                    parsed.entries.push(StyleEntry::Remove(key.to_string()));
                } else {
                    parsed
                        .entries
                        .push(StyleEntry::Set(key.to_string(), value.to_string()));
                }
            }
            None => {
                let name = input[start..end].trim();
                if !name.is_empty() {
                    parsed.entries.push(StyleEntry::Named(name.to_string()));
                }
            }
        }
    };

    for (token, span) in lex(input) {
        match token {
            Token::Separator => {
                flush(entry_start.take(), assign_at.take(), span.start);
            }
            Token::Assign => {
                if entry_start.is_none() {
                    entry_start = Some(span.start);
                }
                if assign_at.is_none() {
                    assign_at = Some(span.start);
                }
            }
            Token::Text => {
                if entry_start.is_none() {
                    entry_start = Some(span.start);
                }
            }
        }
    }
    flush(entry_start, assign_at, input.len());

    parsed
}
