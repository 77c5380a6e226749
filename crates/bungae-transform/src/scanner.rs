//! Lexical scanner for the built-in front-end.
//!
//! Produces a flat token stream with comments and whitespace skipped, string
//! values decoded, and template literals (including their embedded
//! expressions) collapsed into single opaque tokens. This is not a full
//! ECMAScript lexer; it is exactly enough structure for dependency-slot
//! collection and line-preserving rewrites.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident,
    /// String literal with its decoded value.
    Str(String),
    /// Template literal, embedded `${}` expressions included.
    Template,
    Number,
    Regex,
    Punct(u8),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

impl Token {
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }

    pub fn is_ident(&self, source: &str, word: &str) -> bool {
        matches!(self.kind, TokenKind::Ident) && self.text(source) == word
    }

    pub fn is_punct(&self, byte: u8) -> bool {
        self.kind == TokenKind::Punct(byte)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Ident => write!(f, "identifier"),
            TokenKind::Str(_) => write!(f, "string"),
            TokenKind::Template => write!(f, "template"),
            TokenKind::Number => write!(f, "number"),
            TokenKind::Regex => write!(f, "regex"),
            TokenKind::Punct(b) => write!(f, "'{}'", *b as char),
        }
    }
}

/// Keywords after which a `/` starts a regular expression.
const REGEX_PRECEDING_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case", "do",
    "else", "yield", "await",
];

pub fn tokenize(source: &str) -> Vec<Token> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];

        if b.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        // Comments.
        if b == b'/' && i + 1 < bytes.len() {
            match bytes[i + 1] {
                b'/' => {
                    while i < bytes.len() && bytes[i] != b'\n' {
                        i += 1;
                    }
                    continue;
                }
                b'*' => {
                    i += 2;
                    while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                        i += 1;
                    }
                    i = (i + 2).min(bytes.len());
                    continue;
                }
                _ => {}
            }
        }

        // String literals.
        if b == b'\'' || b == b'"' {
            let start = i;
            let (value, end) = scan_string(bytes, i, b);
            tokens.push(Token {
                kind: TokenKind::Str(value),
                start,
                end,
            });
            i = end;
            continue;
        }

        // Template literals, collapsed to one token.
        if b == b'`' {
            let start = i;
            let end = skip_template(bytes, i);
            tokens.push(Token {
                kind: TokenKind::Template,
                start,
                end,
            });
            i = end;
            continue;
        }

        // Regex or division.
        if b == b'/' {
            if regex_can_follow(&tokens, source) {
                let start = i;
                let end = skip_regex(bytes, i);
                tokens.push(Token {
                    kind: TokenKind::Regex,
                    start,
                    end,
                });
                i = end;
                continue;
            }
            tokens.push(Token {
                kind: TokenKind::Punct(b'/'),
                start: i,
                end: i + 1,
            });
            i += 1;
            continue;
        }

        // Numbers, scanned loosely (hex/exponent/separator chars included).
        if b.is_ascii_digit() {
            let start = i;
            while i < bytes.len()
                && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'.' || bytes[i] == b'_')
            {
                i += 1;
            }
            tokens.push(Token {
                kind: TokenKind::Number,
                start,
                end: i,
            });
            continue;
        }

        // Identifiers and keywords. Non-ASCII bytes are treated as
        // identifier characters, which is sufficient for slot collection.
        if is_ident_start(b) {
            let start = i;
            while i < bytes.len() && is_ident_continue(bytes[i]) {
                i += 1;
            }
            tokens.push(Token {
                kind: TokenKind::Ident,
                start,
                end: i,
            });
            continue;
        }

        tokens.push(Token {
            kind: TokenKind::Punct(b),
            start: i,
            end: i + 1,
        });
        i += 1;
    }

    tokens
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$' || b >= 0x80
}

fn is_ident_continue(b: u8) -> bool {
    is_ident_start(b) || b.is_ascii_digit()
}

/// Decode a quoted string starting at `start`. Returns the value and the
/// index one past the closing quote.
fn scan_string(bytes: &[u8], start: usize, quote: u8) -> (String, usize) {
    let mut value = Vec::new();
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if i + 1 < bytes.len() => {
                // Minimal unescaping: quotes and backslashes matter for
                // specifier values, everything else passes through.
                value.push(bytes[i + 1]);
                i += 2;
            }
            b if b == quote => {
                i += 1;
                break;
            }
            b => {
                value.push(b);
                i += 1;
            }
        }
    }
    (String::from_utf8_lossy(&value).into_owned(), i)
}

/// Skip a template literal including `${}` expressions with nested strings,
/// templates, and comments. Returns the index one past the closing backtick.
fn skip_template(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if i + 1 < bytes.len() => i += 2,
            b'`' => return i + 1,
            b'$' if i + 1 < bytes.len() && bytes[i + 1] == b'{' => {
                i = skip_template_expression(bytes, i + 2);
            }
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Skip the inside of a `${…}` expression; `i` points just past the opening
/// brace. Returns the index one past the matching closing brace.
fn skip_template_expression(bytes: &[u8], mut i: usize) -> usize {
    let mut depth: usize = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => {
                depth += 1;
                i += 1;
            }
            b'}' => {
                depth -= 1;
                i += 1;
                if depth == 0 {
                    return i;
                }
            }
            b'\'' | b'"' => {
                let (_, end) = scan_string(bytes, i, bytes[i]);
                i = end;
            }
            b'`' => i = skip_template(bytes, i),
            b'/' if i + 1 < bytes.len() && bytes[i + 1] == b'/' => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if i + 1 < bytes.len() && bytes[i + 1] == b'*' => {
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i = (i + 2).min(bytes.len());
            }
            _ => i += 1,
        }
    }
    bytes.len()
}

fn skip_regex(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 1;
    let mut in_class = false;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if i + 1 < bytes.len() => i += 2,
            b'[' => {
                in_class = true;
                i += 1;
            }
            b']' if in_class => {
                in_class = false;
                i += 1;
            }
            b'/' if !in_class => {
                i += 1;
                // Flags.
                while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
                    i += 1;
                }
                return i;
            }
            b'\n' => return i, // unterminated; bail at line end
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Heuristic: a `/` begins a regex unless the previous token could end an
/// expression.
fn regex_can_follow(tokens: &[Token], source: &str) -> bool {
    match tokens.last() {
        None => true,
        Some(tok) => match &tok.kind {
            TokenKind::Number | TokenKind::Str(_) | TokenKind::Template | TokenKind::Regex => false,
            TokenKind::Punct(b) => !matches!(b, b')' | b']' | b'}'),
            TokenKind::Ident => REGEX_PRECEDING_KEYWORDS.contains(&tok.text(source)),
        },
    }
}
