//! Inline-mode listings
//!
//! Typing `@bot <kind> <account>` in any chat asks for one page of a
//! structured listing. Results are plain articles; picking one posts its
//! address or event id back into the chat, which the bot treats as a search.

use std::fmt;

/// Results per answer; Telegram caps inline answers at 50
pub const INLINE_PAGE: usize = 50;

/// Which listing an inline query asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InlineKind {
    /// Account event feed, paged by the feed cursor
    Transactions,
    /// NFTs owned by the account
    Collectibles,
    /// Jetton balances of the account
    Tokens,
    /// Items of an NFT collection
    Items,
    /// Holders of a jetton
    Holders,
}

impl InlineKind {
    pub const ALL: [InlineKind; 5] = [
        InlineKind::Transactions,
        InlineKind::Collectibles,
        InlineKind::Tokens,
        InlineKind::Items,
        InlineKind::Holders,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InlineKind::Transactions => "transactions",
            InlineKind::Collectibles => "collectibles",
            InlineKind::Tokens => "tokens",
            InlineKind::Items => "items",
            InlineKind::Holders => "holders",
        }
    }

    /// Button caption
    pub fn label(&self) -> &'static str {
        match self {
            InlineKind::Transactions => "Transactions",
            InlineKind::Collectibles => "Collectibles",
            InlineKind::Tokens => "Tokens",
            InlineKind::Items => "Items",
            InlineKind::Holders => "Holders",
        }
    }

    fn parse(word: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(word))
    }
}

impl fmt::Display for InlineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed inline query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineQuery {
    /// Telegram query id, needed to answer
    pub id: String,
    pub kind: InlineKind,
    pub account: String,
    /// Offset echoed from the previous answer; empty on the first page
    pub offset: String,
}

impl InlineQuery {
    /// `"<kind> <account>"`; anything else is not a listing request
    pub fn parse(id: &str, query: &str, offset: &str) -> Option<Self> {
        let mut words = query.split_whitespace();
        let kind = InlineKind::parse(words.next()?)?;
        let account = words.next()?;
        if words.next().is_some() {
            return None;
        }
        Some(Self {
            id: id.to_string(),
            kind,
            account: account.to_string(),
            offset: offset.trim().to_string(),
        })
    }

    /// Numeric offset for the listings paged by position
    pub fn position(&self) -> usize {
        self.offset.parse().unwrap_or(0)
    }

    /// Text of the button that opens this listing in the current chat
    pub fn switch_text(kind: InlineKind, account: &str) -> String {
        format!("{kind} {account}")
    }
}

/// One result row of an inline answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineArticle {
    /// Unique within one answer
    pub id: String,
    pub title: String,
    pub description: String,
    /// Posted into the chat when the article is picked
    pub message_text: String,
}

/// An answer page; an empty `next_offset` ends the listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineAnswer {
    pub articles: Vec<InlineArticle>,
    pub next_offset: String,
}
