//! Inline-mode listings
//!
//! One provider call per answer page. Event feeds page by the feed cursor;
//! every other listing pages by position, and a short page ends it.

use chrono::{TimeZone, Utc};

use crate::core::{BotResult, InlineAnswer, InlineArticle, InlineKind, InlineQuery, INLINE_PAGE};
use crate::domain::{
    short_address, ContractInfo, Cursor, DateRange, EventRecord, JettonBalance, JettonHolder,
    NftSummary,
};
use crate::infrastructure::tonapi::LedgerProvider;
use crate::modules::export::format::format_units;

/// Longest comment shown in an article description
const COMMENT_PREVIEW: usize = 35;

pub async fn answer(provider: &dyn LedgerProvider, query: &InlineQuery) -> BotResult<InlineAnswer> {
    let account = query.account.as_str();
    let position = query.position();
    let answer = match query.kind {
        InlineKind::Transactions => {
            let cursor = (!query.offset.is_empty()).then(|| Cursor(query.offset.clone()));
            let page = provider
                .account_events(account, cursor.as_ref(), INLINE_PAGE, DateRange::AllTime)
                .await?;
            let next_offset = match page.next_cursor {
                Some(Cursor(next)) if !page.events.is_empty() => next,
                _ => String::new(),
            };
            InlineAnswer {
                articles: page.events.iter().map(transaction).collect(),
                next_offset,
            }
        }
        InlineKind::Collectibles => {
            let items = provider.account_nfts(account, INLINE_PAGE, position).await?;
            positional(position, items.len(), nfts(query.kind, position, &items))
        }
        InlineKind::Items => {
            let items = provider
                .collection_items(account, INLINE_PAGE, position)
                .await?;
            positional(position, items.len(), nfts(query.kind, position, &items))
        }
        InlineKind::Tokens => {
            // the balance endpoint is not paged; page over the non-empty ones
            let held: Vec<JettonBalance> = provider
                .jetton_balances(account)
                .await?
                .into_iter()
                .filter(|b| b.balance > 0)
                .collect();
            let page: Vec<InlineArticle> = held
                .iter()
                .enumerate()
                .skip(position)
                .take(INLINE_PAGE)
                .map(|(i, balance)| token(i, balance))
                .collect();
            let end = position + page.len();
            InlineAnswer {
                articles: page,
                next_offset: if end < held.len() {
                    end.to_string()
                } else {
                    String::new()
                },
            }
        }
        InlineKind::Holders => {
            let jetton = provider.jetton(account).await?;
            let holders = provider.jetton_holders(account, INLINE_PAGE, position).await?;
            let articles = holders
                .iter()
                .enumerate()
                .map(|(i, entry)| holder(position + i, &jetton, entry))
                .collect();
            positional(position, holders.len(), articles)
        }
    };
    Ok(answer)
}

/// A full page may have a successor; a short one ends the listing
fn positional(position: usize, fetched: usize, articles: Vec<InlineArticle>) -> InlineAnswer {
    let next_offset = if fetched >= INLINE_PAGE {
        (position + fetched).to_string()
    } else {
        String::new()
    };
    InlineAnswer {
        articles,
        next_offset,
    }
}

fn transaction(event: &EventRecord) -> InlineArticle {
    let time = Utc
        .timestamp_opt(event.timestamp, 0)
        .single()
        .map(|dt| dt.format("%d %b, %H:%M").to_string())
        .unwrap_or_default();
    let mut description = event
        .participants
        .iter()
        .map(|p| short_address(p))
        .collect::<Vec<_>>()
        .join(" → ");
    if let Some(comment) = &event.comment {
        let preview: String = comment.chars().take(COMMENT_PREVIEW).collect();
        let ellipsis = if comment.chars().count() > COMMENT_PREVIEW {
            "..."
        } else {
            ""
        };
        description.push_str(&format!("\n• {preview}{ellipsis}"));
    }
    InlineArticle {
        id: event.id.chars().take(64).collect(),
        title: format!("{time} {} {}", event.label, event.value_display)
            .trim_end()
            .to_string(),
        description,
        message_text: event.id.clone(),
    }
}

fn nfts(kind: InlineKind, position: usize, items: &[NftSummary]) -> Vec<InlineArticle> {
    items
        .iter()
        .enumerate()
        .map(|(i, nft)| {
            let description = match (&nft.collection, &nft.description) {
                (Some(collection), Some(text)) => format!("• Collection: {collection}\n{text}"),
                (Some(collection), None) => format!("• Collection: {collection}"),
                (None, text) => text.clone().unwrap_or_default(),
            };
            InlineArticle {
                id: format!("{kind}-{}", position + i),
                title: nft.title(),
                description,
                message_text: nft.address.clone(),
            }
        })
        .collect()
}

fn token(index: usize, balance: &JettonBalance) -> InlineArticle {
    let name = balance.name.as_deref().unwrap_or("Unknown");
    let symbol = balance.symbol.as_deref().unwrap_or("UNKNOWN");
    InlineArticle {
        id: format!("tokens-{index}"),
        title: format!(
            "{name} - {} {symbol}",
            format_units(balance.balance, balance.decimals)
        ),
        description: verification(balance.verified).to_string(),
        message_text: balance.jetton_address.clone(),
    }
}

fn holder(index: usize, jetton: &ContractInfo, holder: &JettonHolder) -> InlineArticle {
    let symbol = jetton.symbol().unwrap_or("UNKNOWN");
    InlineArticle {
        id: format!("holders-{index}"),
        title: format!(
            "{} - {} {symbol}",
            short_address(&holder.address),
            format_units(holder.balance, jetton.decimals())
        ),
        description: jetton.name.clone().unwrap_or_else(|| "Unknown".to_string()),
        message_text: holder.address.clone(),
    }
}

fn verification(verified: bool) -> &'static str {
    if verified {
        "• Verified"
    } else {
        "• Not Verified"
    }
}
