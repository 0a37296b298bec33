use regex::Regex;
use std::sync::OnceLock;

/// Leading keywords accepted when read-only execution is enforced.
const READ_KEYWORDS: [&str; 10] = [
    "SELECT", "WITH", "SHOW", "DESCRIBE", "EXPLAIN", "VALUES", "TABLE", "FROM", "SUMMARIZE",
    "PRAGMA",
];

fn leading_comments() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:\s+|--[^\n]*(?:\n|$)|/\*(?s:.*?)\*/)*").expect("valid comment regex")
    })
}

/// First keyword of a statement, uppercased, skipping whitespace, comments and
/// opening parentheses.
pub fn leading_keyword(sql: &str) -> Option<String> {
    let rest = &sql[leading_comments().find(sql).map_or(0, |m| m.end())..];
    let rest = rest.trim_start_matches(|c: char| c == '(' || c.is_whitespace());
    let keyword: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();

    if keyword.is_empty() {
        None
    } else {
        Some(keyword.to_ascii_uppercase())
    }
}

/// Decides whether a generated statement may reach the database.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryGuard {
    read_only: bool,
}

impl QueryGuard {
    pub fn new(read_only: bool) -> Self {
        Self { read_only }
    }

    /// Returns the rejection reason, if any.
    pub fn check(&self, sql: &str) -> Result<(), String> {
        if !self.read_only {
            return Ok(());
        }

        match leading_keyword(sql) {
            Some(keyword) if READ_KEYWORDS.contains(&keyword.as_str()) => Ok(()),
            Some(keyword) => Err(format!(
                "{} statements are not allowed in read-only mode",
                keyword
            )),
            None => Err("statement has no recognizable leading keyword".to_string()),
        }
    }
}
