//! Quote-aware tokenizer for command strings.
//!
//! # Design
//! Tokenization never fails; anything malformed is carried forward and
//! rejected by the parser with a position.
//!
//! - Inside single or double quotes every character is literal. A backslash
//!   escapes the active quote character or another backslash. In a clause
//!   value a quote only opens at the start or right after a `<kind>:`
//!   prefix, so JSON written without outer quotes keeps its own.
//! - At token start, `http://` / `https://` begins a URL token that runs to
//!   the next whitespace.
//! - `<ident>=` begins a clause token. The value runs past whitespace until
//!   the remainder starts with a known `key=` or a bare flag, or is empty.
//!   That lookahead is what lets
//!   `include=header: Accept: a, b; q=0.9` stay a single value.
//!   Whitespace right after a closing quote always ends the value.
//! - An unquoted value of the form `<word>:<rest>` that is neither a URL nor
//!   JSON-shaped is additionally exposed as a typed pair (`json:{...}`).

use crate::grammar;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Char offset of the token start in the input.
    pub pos: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Word(String),
    Url(String),
    Clause { key: String, value: Value },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value {
    /// Value text with quoting removed and escapes resolved.
    pub raw: String,
    pub shape: Shape,
    /// A quote was opened and never closed.
    pub unterminated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    Plain,
    /// The value began with a quote.
    Quoted,
    Url,
    Typed { kind: String, text: String },
}

pub fn tokenize(input: &str) -> Vec<Token> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    loop {
        lexer.skip_whitespace();
        if lexer.at_end() {
            break;
        }
        tokens.push(lexer.next_token());
    }
    tokens
}

/// Join pre-split arguments (as a shell delivers them) into one command
/// string that tokenizes back to the same clauses. Values that contain
/// whitespace or quotes are re-quoted.
pub fn join_args<S: AsRef<str>>(args: &[S]) -> String {
    args.iter()
        .map(|arg| {
            let arg = arg.as_ref();
            match split_key(arg) {
                Some((key, value)) if needs_quoting(value) => format!("{key}={}", quote(value)),
                Some(_) => arg.to_string(),
                None if needs_quoting(arg) => quote(arg),
                None => arg.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn split_key(arg: &str) -> Option<(&str, &str)> {
    if is_url_start(arg) {
        return None;
    }
    let (key, value) = arg.split_once('=')?;
    (!key.is_empty() && key.chars().all(is_ident_char)).then_some((key, value))
}

fn needs_quoting(s: &str) -> bool {
    s.chars().any(|c| c.is_whitespace() || c == '\'' || c == '"')
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn is_quote(c: char) -> bool {
    c == '\'' || c == '"'
}

fn is_url_start(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
}

impl Lexer {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn rest_from(&self, at: usize) -> String {
        self.chars[at.min(self.chars.len())..].iter().collect()
    }

    fn next_token(&mut self) -> Token {
        let start = self.pos;
        if is_url_start(&self.rest_from(start)) {
            let url = self.take_until_whitespace();
            return Token { kind: TokenKind::Url(url), pos: start };
        }
        if let Some(key_len) = self.key_prefix_len(start) {
            let key: String = self.chars[start..start + key_len].iter().collect();
            self.pos = start + key_len + 1;
            let value = self.scan_value();
            return Token { kind: TokenKind::Clause { key, value }, pos: start };
        }
        let word = self.scan_word();
        Token { kind: TokenKind::Word(word), pos: start }
    }

    /// Length of `<ident>` when the chars at `at` read `<ident>=`.
    fn key_prefix_len(&self, at: usize) -> Option<usize> {
        let len = self.chars[at..]
            .iter()
            .take_while(|c| is_ident_char(**c))
            .count();
        (len > 0 && self.chars.get(at + len) == Some(&'=')).then_some(len)
    }

    fn take_until_whitespace(&mut self) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek().filter(|c| !c.is_whitespace()) {
            out.push(c);
            self.pos += 1;
        }
        out
    }

    fn scan_word(&mut self) -> String {
        let mut out = String::new();
        let mut quote: Option<char> = None;
        while let Some(c) = self.peek() {
            match quote {
                Some(q) => {
                    if self.consume_escape(q, &mut out) {
                        continue;
                    }
                    if c == q {
                        quote = None;
                    } else {
                        out.push(c);
                    }
                }
                None if c.is_whitespace() => break,
                None if is_quote(c) => quote = Some(c),
                None => out.push(c),
            }
            self.pos += 1;
        }
        out
    }

    /// Inside a quote, `\<q>` and `\\` produce the escaped char.
    fn consume_escape(&mut self, q: char, out: &mut String) -> bool {
        if self.peek() != Some('\\') {
            return false;
        }
        match self.peek_at(1) {
            Some(next) if next == q || next == '\\' => {
                out.push(next);
                self.pos += 2;
                true
            }
            _ => false,
        }
    }

    fn scan_value(&mut self) -> Value {
        let leading_quote = self.peek().is_some_and(is_quote);
        let mut raw = String::new();
        let mut quote: Option<char> = None;
        let mut quoted_once = false;
        let mut just_closed = false;

        while let Some(c) = self.peek() {
            if let Some(q) = quote {
                if self.consume_escape(q, &mut raw) {
                    continue;
                }
                if c == q {
                    quote = None;
                    just_closed = true;
                } else {
                    raw.push(c);
                }
                self.pos += 1;
                continue;
            }
            if c.is_whitespace() && (just_closed || self.value_ends_at(self.pos)) {
                break;
            }
            let opens_quote = is_quote(c)
                && !quoted_once
                && (raw.is_empty() || type_prefix_len(&raw) == Some(raw.len() - 1));
            if opens_quote {
                quote = Some(c);
                quoted_once = true;
                self.pos += 1;
                continue;
            }
            just_closed = false;
            raw.push(c);
            self.pos += 1;
        }

        let unterminated = quote.is_some();
        let shape = classify(&raw, leading_quote);
        Value { raw, shape, unterminated }
    }

    /// Whitespace at `at` terminates a value when what follows is empty, a
    /// known `key=`, or a bare flag word.
    fn value_ends_at(&self, at: usize) -> bool {
        let mut i = at;
        while self.chars.get(i).is_some_and(|c| c.is_whitespace()) {
            i += 1;
        }
        if i >= self.chars.len() {
            return true;
        }
        let ident: String = self.chars[i..]
            .iter()
            .take_while(|c| is_ident_char(**c))
            .collect();
        if ident.is_empty() {
            return false;
        }
        match self.chars.get(i + ident.chars().count()) {
            Some('=') => grammar::is_clause_key(&ident),
            Some(c) if c.is_whitespace() => grammar::is_flag(&ident),
            None => grammar::is_flag(&ident),
            _ => false,
        }
    }
}

/// Length of `<kind>` when `raw` starts with `<kind>:`.
fn type_prefix_len(raw: &str) -> Option<usize> {
    let len = raw
        .char_indices()
        .take_while(|(i, c)| if *i == 0 { c.is_ascii_alphabetic() } else { is_ident_char(*c) })
        .count();
    (len > 0 && raw[len..].starts_with(':')).then_some(len)
}

fn classify(raw: &str, leading_quote: bool) -> Shape {
    if leading_quote {
        return Shape::Quoted;
    }
    if is_url_start(raw) {
        return Shape::Url;
    }
    if raw.starts_with('{') || raw.starts_with('[') {
        return Shape::Plain;
    }
    if let Some(kind_len) = type_prefix_len(raw) {
        return Shape::Typed {
            kind: raw[..kind_len].to_string(),
            text: raw[kind_len + 1..].to_string(),
        };
    }
    Shape::Plain
}
