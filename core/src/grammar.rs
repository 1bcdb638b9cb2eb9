//! Command vocabulary: verbs, clause keys and bare flags.
//!
//! The tokenizer uses the clause keys for its value-boundary lookahead, the
//! parser uses them for multiplicity checks and suggestions, and the CLI
//! renders them as help text.

use std::fmt::Write as _;

use serde::Serialize;

use crate::types::Verb;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct VerbSpec {
    pub name: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ClauseSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub repeatable: bool,
    #[serde(skip)]
    pub example: &'static str,
}

pub const VERBS: [VerbSpec; 8] = [
    VerbSpec { name: "read", description: "GET, print to stdout" },
    VerbSpec { name: "save", description: "GET, write to file via to=" },
    VerbSpec { name: "send", description: "default GET, POST if with= present" },
    VerbSpec { name: "upload", description: "POST when attach= or with= present, else error" },
    VerbSpec { name: "watch", description: "GET, optionally polling with every= and until=" },
    VerbSpec { name: "inspect", description: "HEAD only" },
    VerbSpec { name: "authenticate", description: "login and store session state" },
    VerbSpec { name: "session", description: "session management (show, clear, use)" },
];

pub const CLAUSES: [ClauseSpec; 17] = [
    ClauseSpec { name: "using", description: "HTTP method override", repeatable: false, example: "using=PUT" },
    ClauseSpec { name: "include", description: "Add headers, params, cookies, basic auth", repeatable: true, example: "include='header: Authorization: Bearer token; param: q=search query; basic: user:pass'" },
    ClauseSpec { name: "with", description: "Request body", repeatable: false, example: "with=@user.json or with='{\"name\":\"Ada\"}'" },
    ClauseSpec { name: "expect", description: "Assertions on response", repeatable: false, example: "expect='status:200, header:Content-Type=application/json, contains:\"ok\"'" },
    ClauseSpec { name: "as", description: "Output format for stdout", repeatable: false, example: "as=json" },
    ClauseSpec { name: "to", description: "Destination path", repeatable: false, example: "to=out.json" },
    ClauseSpec { name: "retry", description: "Retry attempts for transient errors", repeatable: false, example: "retry=3" },
    ClauseSpec { name: "backoff", description: "Delay range between retries", repeatable: false, example: "backoff=200ms..5s" },
    ClauseSpec { name: "timeout", description: "Deadline for the whole exchange", repeatable: false, example: "timeout=10s" },
    ClauseSpec { name: "under", description: "Timeout or size limit", repeatable: false, example: "under=30s or under=10MB" },
    ClauseSpec { name: "via", description: "Proxy URL", repeatable: false, example: "via=http://proxy:8080" },
    ClauseSpec { name: "attach", description: "Multipart parts for upload or send", repeatable: true, example: "attach='part: name=avatar, file=@me.png; part: name=meta, value=xyz'" },
    ClauseSpec { name: "follow", description: "Redirect policy for write verbs", repeatable: false, example: "follow=smart" },
    ClauseSpec { name: "insecure", description: "Disable TLS verification for this request", repeatable: false, example: "insecure=true" },
    ClauseSpec { name: "pick", description: "Select part of a JSON response", repeatable: false, example: "pick=$.items[0].id" },
    ClauseSpec { name: "every", description: "Polling interval for watch", repeatable: false, example: "every=5s" },
    ClauseSpec { name: "until", description: "Stop polling once this check holds", repeatable: false, example: "until=jsonpath:$.state=done" },
];

/// Bare words accepted in clause position.
pub const FLAGS: [&str; 3] = ["verbose", "resume", "insecure"];

pub fn verb_names() -> Vec<&'static str> {
    Verb::ALL.iter().map(|v| v.as_str()).collect()
}

pub fn clause_names() -> Vec<&'static str> {
    CLAUSES.iter().map(|c| c.name).collect()
}

pub fn is_clause_key(word: &str) -> bool {
    CLAUSES.iter().any(|c| c.name == word)
}

pub fn is_flag(word: &str) -> bool {
    FLAGS.contains(&word)
}

/// Unknown keys are treated as repeatable so the parser reports them as
/// unknown rather than duplicated.
pub fn is_repeatable(key: &str) -> bool {
    CLAUSES
        .iter()
        .find(|c| c.name == key)
        .map_or(true, |c| c.repeatable)
}

#[derive(Debug, Serialize)]
pub struct Snapshot {
    pub verbs: Vec<&'static str>,
    pub clauses: Vec<ClauseSpec>,
    pub flags: Vec<&'static str>,
}

/// Machine-readable view of the vocabulary, for drift checks.
pub fn snapshot() -> Snapshot {
    Snapshot {
        verbs: VERBS.iter().map(|v| v.name).collect(),
        clauses: CLAUSES.to_vec(),
        flags: FLAGS.to_vec(),
    }
}

pub fn help_text() -> String {
    let mut help = String::new();
    help.push_str("req - HTTP client DSL\n\n");
    help.push_str("Usage: req <verb> <url> [clauses...]\n\n");
    help.push_str("Verbs:\n");
    for verb in VERBS {
        let _ = writeln!(help, "  {:<13} - {}", verb.name, verb.description);
    }
    help.push_str("\nClauses:\n");
    for clause in CLAUSES {
        let name = format!("{}=", clause.name);
        let _ = write!(help, "  {:<13} - {}", name, clause.description);
        if clause.repeatable {
            help.push_str(" (repeatable)");
        }
        help.push('\n');
        let _ = writeln!(help, "                  Example: {}", clause.example);
    }
    help.push_str("\nFlags:\n");
    for flag in FLAGS {
        let _ = writeln!(help, "  {flag}");
    }
    help.push_str("\nExamples:\n");
    help.push_str("  req read https://api.example.com/search include='param: q=search query' as=json\n");
    help.push_str("  req send https://api.example.com/users using=PUT with='{\"name\":\"Ada\"}' expect=status:200\n");
    help.push_str("  req upload https://api.example.com/upload attach='part: name=file, file=@./avatar.png, type=image/png'\n");
    help.push_str("  req authenticate https://api.example.com/login with='{\"user\":\"ada\",\"pass\":\"xyz\"}'\n");
    help.push_str("  req session show api.example.com\n");
    help
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vocabulary_tables_agree_with_verb_enum() {
        let table: Vec<&str> = VERBS.iter().map(|v| v.name).collect();
        assert_eq!(table, verb_names());
    }

    #[test]
    fn only_include_and_attach_repeat() {
        let repeatable: Vec<&str> = CLAUSES
            .iter()
            .filter(|c| c.repeatable)
            .map(|c| c.name)
            .collect();
        assert_eq!(repeatable, vec!["include", "attach"]);
        assert!(is_repeatable("nonsense"));
        assert!(!is_repeatable("using"));
    }

    #[test]
    fn snapshot_serializes_without_examples() {
        let json = serde_json::to_value(snapshot()).unwrap();
        assert_eq!(json["verbs"][0], "read");
        assert_eq!(json["clauses"][0]["name"], "using");
        assert!(json["clauses"][0].get("example").is_none());
    }

    #[test]
    fn help_lists_every_clause() {
        let help = help_text();
        for name in clause_names() {
            assert!(help.contains(&format!("{name}=")), "missing {name}");
        }
        assert!(help.contains("(repeatable)"));
    }
}
