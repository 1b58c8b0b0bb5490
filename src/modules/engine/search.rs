//! Free-text query classification

/// What a search string refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// `name.ton` / `name.t.me`, resolved to an account first
    Dns(String),
    /// User-friendly (48 chars) or raw (`wc:hex`, 66/67 chars) address
    Account(String),
    /// Anything else is tried as an event id
    Event(String),
}

pub fn classify_query(text: &str) -> Query {
    let text = text.trim();
    let lower = text.to_lowercase();
    if lower.ends_with(".ton") || lower.ends_with(".t.me") {
        return Query::Dns(lower);
    }
    match text.chars().count() {
        48 | 66 | 67 => Query::Account(text.to_string()),
        _ => Query::Event(text.to_string()),
    }
}
