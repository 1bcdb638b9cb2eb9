//! Grammar parser: tokens to `Command`.
//!
//! # Design
//! `command = verb target clause*`, where `session` takes
//! `session <show|clear|use> <host>` instead. Every clause key dispatches to
//! a sub-parser that validates its own micro-grammar and returns a typed
//! `Clause`, so nothing downstream re-checks syntax.
//!
//! `include=`, `expect=` and `attach=` values hold lists. They split on a
//! separator (`;` or `,`) only where the next item starts with one of the
//! clause's tags; otherwise the separator is part of the current item. That
//! keeps `param: q=test;value` and `header:Content-Type=a; charset=b` intact.

use std::collections::HashSet;

use regex::Regex;

use crate::error::ParseError;
use crate::grammar;
use crate::http::HttpMethod;
use crate::lexer::{tokenize, Shape, Token, TokenKind, Value};
use crate::suggest;
use crate::types::{
    AttachPart, AttachSpec, BodyKind, BodySource, BodySpec, Clause, Command, ExpectCheck,
    FollowPolicy, IncludeItem, Limit, OutputFormat, SessionSubcommand, Verb,
};
use crate::units;

const INCLUDE_TAGS: [&str; 4] = ["header:", "param:", "cookie:", "basic:"];
const EXPECT_TAGS: [&str; 5] = ["status:", "header:", "contains:", "jsonpath:", "matches:"];
const ATTACH_TAGS: [&str; 2] = ["part:", "boundary:"];
const PART_KEYS: [&str; 5] = ["name=", "file=", "value=", "filename=", "type="];

/// Tokenize and parse a command string.
pub fn parse_command(input: &str) -> Result<Command, ParseError> {
    parse(&tokenize(input))
}

pub fn parse(tokens: &[Token]) -> Result<Command, ParseError> {
    let Some(first) = tokens.first() else {
        return Err(ParseError::new(0, "", "expected verb"));
    };
    let verb = parse_verb(first)?;
    if verb == Verb::Session {
        return parse_session(first, &tokens[1..]);
    }

    let target = match tokens.get(1) {
        Some(Token { kind: TokenKind::Url(url), .. }) => url.clone(),
        Some(other) => {
            return Err(ParseError::new(other.pos, token_text(other), "expected URL"));
        }
        None => return Err(ParseError::new(end_of(first), "", "expected target URL")),
    };

    let clauses = parse_clauses(&tokens[2..])?;
    Ok(Command {
        verb,
        target,
        clauses,
        session_subcommand: None,
    })
}

fn parse_verb(token: &Token) -> Result<Verb, ParseError> {
    let TokenKind::Word(word) = &token.kind else {
        return Err(ParseError::new(token.pos, token_text(token), "expected verb"));
    };
    word.parse::<Verb>().map_err(|()| {
        ParseError::new(token.pos, word.as_str(), "unknown verb")
            .with_suggestion(suggest::closest(word, grammar::verb_names()))
    })
}

fn parse_session(verb_token: &Token, rest: &[Token]) -> Result<Command, ParseError> {
    let Some(sub_token) = rest.first() else {
        return Err(ParseError::new(
            end_of(verb_token),
            "",
            "expected session subcommand (show, clear, use)",
        ));
    };
    let sub = match &sub_token.kind {
        TokenKind::Word(word) => word.parse::<SessionSubcommand>().map_err(|()| {
            ParseError::new(sub_token.pos, word.as_str(), "unknown session subcommand")
                .with_suggestion(suggest::closest(word, SessionSubcommand::NAMES))
        })?,
        _ => {
            return Err(ParseError::new(
                sub_token.pos,
                token_text(sub_token),
                "expected session subcommand (show, clear, use)",
            ))
        }
    };

    let target = match rest.get(1).map(|t| &t.kind) {
        Some(TokenKind::Url(url)) => url.clone(),
        Some(TokenKind::Word(host)) => format!("https://{host}"),
        Some(TokenKind::Clause { .. }) | None => {
            let pos = rest.get(1).map_or(end_of(sub_token), |t| t.pos);
            return Err(ParseError::new(pos, "", "expected host"));
        }
    };

    let clauses = parse_clauses(&rest[2..])?;
    Ok(Command {
        verb: Verb::Session,
        target,
        clauses,
        session_subcommand: Some(sub),
    })
}

fn parse_clauses(tokens: &[Token]) -> Result<Vec<Clause>, ParseError> {
    let mut clauses = Vec::with_capacity(tokens.len());
    let mut seen: HashSet<&'static str> = HashSet::new();
    for token in tokens {
        let clause = parse_clause(token)?;
        let key = clause.key();
        if !grammar::is_repeatable(key) && !seen.insert(key) {
            return Err(ParseError::new(
                token.pos,
                key,
                format!("duplicate clause '{key}' (only include= and attach= may repeat)"),
            ));
        }
        clauses.push(clause);
    }
    Ok(clauses)
}

fn parse_clause(token: &Token) -> Result<Clause, ParseError> {
    let (key, value) = match &token.kind {
        TokenKind::Clause { key, value } => (key.as_str(), value),
        TokenKind::Word(word) => return parse_flag(token, word),
        TokenKind::Url(url) => {
            return Err(ParseError::new(token.pos, url.as_str(), "unexpected URL, expected clause"))
        }
    };

    if !grammar::is_clause_key(key) {
        return Err(ParseError::new(token.pos, key, "unknown clause")
            .with_suggestion(suggest::closest(key, grammar::clause_names())));
    }
    if value.unterminated {
        return Err(ParseError::new(token.pos, token_text(token), "unterminated quote"));
    }
    if value.raw.is_empty() {
        return Err(ParseError::new(token.pos, key, format!("expected value after '{key}='")));
    }

    let err = |message: String| ParseError::new(token.pos, token_text(token), message);
    let raw = value.raw.as_str();
    match key {
        "using" => raw
            .parse::<HttpMethod>()
            .map(Clause::Using)
            .map_err(|()| err(format!("invalid HTTP method '{raw}'"))),
        "with" => Ok(Clause::With(parse_body(value))),
        "include" => parse_include(raw).map(Clause::Include).map_err(err),
        "attach" => parse_attach(raw).map(Clause::Attach).map_err(err),
        "expect" => parse_expect(raw).map(Clause::Expect).map_err(err),
        "as" => Ok(Clause::As(OutputFormat::from_name(raw))),
        "to" => Ok(Clause::To(raw.to_string())),
        "retry" => raw
            .parse::<u32>()
            .map(Clause::Retry)
            .map_err(|_| err(format!("retry expects a non-negative integer, got '{raw}'"))),
        "backoff" => units::parse_duration_range(raw)
            .map(|(min, max)| Clause::Backoff { min, max })
            .ok_or_else(|| err(format!("backoff expects <min>..<max> durations, got '{raw}'"))),
        "timeout" => units::parse_duration(raw)
            .map(Clause::Timeout)
            .ok_or_else(|| err(format!("invalid duration '{raw}'"))),
        "under" => units::parse_duration(raw)
            .map(Limit::Duration)
            .or_else(|| units::parse_size(raw).map(Limit::Size))
            .map(Clause::Under)
            .ok_or_else(|| err(format!("under expects a duration (30s) or size (10MB), got '{raw}'"))),
        "via" => match value.shape {
            Shape::Url => Ok(Clause::Via(raw.to_string())),
            _ => Err(err(format!("via expects an http:// or https:// proxy URL, got '{raw}'"))),
        },
        "follow" => match raw {
            "smart" => Ok(Clause::Follow(FollowPolicy::Smart)),
            _ => Err(err(format!("follow expects 'smart', got '{raw}'"))),
        },
        "insecure" => match raw.to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(Clause::Insecure(true)),
            "false" | "no" | "0" => Ok(Clause::Insecure(false)),
            _ => Err(err(format!("insecure expects true or false, got '{raw}'"))),
        },
        "pick" => Ok(Clause::Pick(raw.to_string())),
        "every" => units::parse_duration(raw)
            .filter(|d| !d.is_zero())
            .map(Clause::Every)
            .ok_or_else(|| err(format!("every expects a non-zero duration, got '{raw}'"))),
        "until" => parse_check(raw.trim()).map(Clause::Until).map_err(err),
        unknown => Err(ParseError::new(token.pos, unknown, "unknown clause")),
    }
}

fn parse_flag(token: &Token, word: &str) -> Result<Clause, ParseError> {
    match word {
        "verbose" => Ok(Clause::Verbose),
        "resume" => Ok(Clause::Resume),
        "insecure" => Ok(Clause::Insecure(true)),
        _ => {
            let vocabulary = grammar::clause_names()
                .into_iter()
                .chain(grammar::FLAGS);
            Err(ParseError::new(token.pos, word, "expected clause")
                .with_suggestion(suggest::closest(word, vocabulary)))
        }
    }
}

fn parse_body(value: &Value) -> BodySpec {
    let (explicit, content) = match &value.shape {
        Shape::Typed { kind, text } => match kind.parse::<BodyKind>() {
            Ok(kind) => (Some(kind), text.as_str()),
            Err(()) => (None, value.raw.as_str()),
        },
        _ => (None, value.raw.as_str()),
    };

    let source = match content {
        "@-" => BodySource::Stdin,
        _ => match content.strip_prefix('@') {
            Some(path) => BodySource::File(path.to_string()),
            None => BodySource::Inline(content.to_string()),
        },
    };

    match explicit {
        Some(kind) => BodySpec { kind, source, inferred: false },
        None => {
            let looks_json = matches!(&source, BodySource::Inline(text)
                if text.trim_start().starts_with('{') || text.trim_start().starts_with('['));
            BodySpec {
                kind: if looks_json { BodyKind::Json } else { BodyKind::Raw },
                source,
                inferred: looks_json,
            }
        }
    }
}

/// Split `input` on `sep` outside quotes, starting a new item only where the
/// next segment begins with one of `tags`.
fn split_tagged(input: &str, sep: char, tags: &[&str]) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    for c in input.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == sep => {
                segments.push(std::mem::take(&mut current));
                continue;
            }
            None => {}
        }
        current.push(c);
    }
    segments.push(current);

    let mut items: Vec<String> = Vec::new();
    for segment in segments {
        let starts_item = tags.iter().any(|tag| segment.trim_start().starts_with(tag));
        match items.last_mut() {
            Some(last) if !starts_item => {
                last.push(sep);
                last.push_str(&segment);
            }
            _ => items.push(segment),
        }
    }
    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

/// Splits `item` into its tag (without colon) and the rest.
fn split_tag<'a>(item: &'a str, tags: &[&'a str]) -> Result<(&'a str, &'a str), String> {
    match tags.iter().find(|tag| item.starts_with(**tag)) {
        Some(tag) => Ok((&tag[..tag.len() - 1], &item[tag.len()..])),
        None => {
            let word = item.split(':').next().unwrap_or(item).trim();
            let names = tags.iter().map(|tag| tag.trim_end_matches(':'));
            let hint = suggest::closest(word, names)
                .map(|s| format!(" (did you mean '{s}:'?)"))
                .unwrap_or_default();
            let expected: Vec<&str> = tags.to_vec();
            Err(format!(
                "unknown item '{item}', expected one of {}{hint}",
                expected.join(" ")
            ))
        }
    }
}

fn parse_include(raw: &str) -> Result<Vec<IncludeItem>, String> {
    let items = split_tagged(raw, ';', &INCLUDE_TAGS);
    if items.is_empty() {
        return Err("include expects at least one item".to_string());
    }
    items.iter().map(|item| parse_include_item(item)).collect()
}

fn parse_include_item(item: &str) -> Result<IncludeItem, String> {
    let (tag, rest) = split_tag(item, &INCLUDE_TAGS)?;
    let rest = rest.trim();
    match tag {
        "header" => match rest.split_once(':') {
            Some((name, value)) if !name.trim().is_empty() => Ok(IncludeItem::Header {
                name: name.trim().to_string(),
                value: value.trim().to_string(),
            }),
            _ => Err(format!("header item '{item}' must be 'header: Name: Value'")),
        },
        "param" | "cookie" => match rest.split_once('=') {
            Some((name, value)) if !name.trim().is_empty() => {
                let (name, value) = (name.trim().to_string(), value.trim().to_string());
                Ok(if tag == "param" {
                    IncludeItem::Param { name, value }
                } else {
                    IncludeItem::Cookie { name, value }
                })
            }
            _ => Err(format!("{tag} item '{item}' must be '{tag}: name=value'")),
        },
        _ => {
            let valid = rest.matches(':').count() == 1
                && rest
                    .split_once(':')
                    .is_some_and(|(user, pass)| !user.is_empty() && !pass.is_empty());
            if valid {
                Ok(IncludeItem::Basic(rest.to_string()))
            } else {
                Err(format!("basic item '{item}' must be 'basic: user:pass'"))
            }
        }
    }
}

fn parse_expect(raw: &str) -> Result<Vec<ExpectCheck>, String> {
    let items = split_tagged(raw, ',', &EXPECT_TAGS);
    if items.is_empty() {
        return Err("expect expects at least one check".to_string());
    }
    items.iter().map(|item| parse_check(item)).collect()
}

/// One `expect=` check. Also the grammar of `until=`.
fn parse_check(item: &str) -> Result<ExpectCheck, String> {
    let (tag, rest) = split_tag(item, &EXPECT_TAGS)?;
    let rest = rest.trim();
    if rest.is_empty() {
        return Err(format!("{tag} check expects a value"));
    }
    match tag {
        "status" => Ok(ExpectCheck::Status { value: rest.to_string() }),
        "header" => match rest.split_once('=') {
            Some((name, value)) if !name.trim().is_empty() => Ok(ExpectCheck::Header {
                name: name.trim().to_string(),
                value: value.trim().to_string(),
            }),
            _ => Err(format!("header check '{item}' must be 'header:Name=Value'")),
        },
        "contains" => Ok(ExpectCheck::Contains { value: unquote(rest).to_string() }),
        "jsonpath" => {
            let (path, value) = match split_path_value(rest) {
                Some((path, value)) => (path, Some(unquote(value.trim()).to_string())),
                None => (rest, None),
            };
            if !path.starts_with('$') {
                return Err(format!("jsonpath '{path}' must start with '$'"));
            }
            Ok(ExpectCheck::JsonPath { path: path.trim().to_string(), value })
        }
        _ => {
            let pattern = unquote(rest);
            Regex::new(pattern)
                .map(|_| ExpectCheck::Matches { regex: pattern.to_string() })
                .map_err(|e| format!("invalid regex '{pattern}': {e}"))
        }
    }
}

/// Splits `path=value` at the first `=` that is not inside brackets.
fn split_path_value(input: &str) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    for (i, c) in input.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            '=' if depth == 0 => return Some((&input[..i], &input[i + 1..])),
            _ => {}
        }
    }
    None
}

fn unquote(s: &str) -> &str {
    for q in ['"', '\''] {
        if let Some(inner) = s.strip_prefix(q).and_then(|s| s.strip_suffix(q)) {
            return inner;
        }
    }
    s
}

fn parse_attach(raw: &str) -> Result<AttachSpec, String> {
    let mut spec = AttachSpec { parts: Vec::new(), boundary: None };
    for item in split_tagged(raw, ';', &ATTACH_TAGS) {
        let (tag, rest) = split_tag(&item, &ATTACH_TAGS)?;
        let rest = rest.trim();
        if tag == "boundary" {
            if rest.is_empty() {
                return Err("boundary expects a value".to_string());
            }
            spec.boundary = Some(unquote(rest).to_string());
        } else {
            spec.parts.push(parse_part(rest)?);
        }
    }
    if spec.parts.is_empty() {
        return Err("attach expects at least one 'part:'".to_string());
    }
    Ok(spec)
}

fn parse_part(spec: &str) -> Result<AttachPart, String> {
    let mut part = AttachPart {
        name: String::new(),
        file_path: None,
        value: None,
        filename: None,
        content_type: None,
    };
    for pair in split_tagged(spec, ',', &PART_KEYS) {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(format!("part field '{pair}' must be key=value"));
        };
        let value = unquote(value.trim()).to_string();
        match key.trim() {
            "name" => part.name = value,
            "file" => part.file_path = Some(value.strip_prefix('@').unwrap_or(&value).to_string()),
            "value" => part.value = Some(value),
            "filename" => part.filename = Some(value),
            "type" => part.content_type = Some(value),
            other => {
                let keys = PART_KEYS.iter().map(|k| k.trim_end_matches('='));
                let hint = suggest::closest(other, keys)
                    .map(|s| format!(" (did you mean '{s}'?)"))
                    .unwrap_or_default();
                return Err(format!("unknown part field '{other}'{hint}"));
            }
        }
    }
    if part.name.is_empty() {
        return Err(format!("part '{spec}' requires name="));
    }
    match (&part.file_path, &part.value) {
        (Some(_), Some(_)) => Err(format!("part '{}' takes file= or value=, not both", part.name)),
        (None, None) => Err(format!("part '{}' requires file= or value=", part.name)),
        _ => Ok(part),
    }
}

fn token_text(token: &Token) -> String {
    match &token.kind {
        TokenKind::Word(word) => word.clone(),
        TokenKind::Url(url) => url.clone(),
        TokenKind::Clause { key, value } => format!("{key}={}", value.raw),
    }
}

fn end_of(token: &Token) -> usize {
    token.pos + token_text(token).chars().count()
}
