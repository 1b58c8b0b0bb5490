//! Inline keyboards attached to rendered windows

use serde_json::{json, Value};

use crate::core::Button;

/// What pressing a button does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Press {
    /// Sends a callback query with the button's data
    Callback(Button),
    /// Prefills the input field with an inline query for this bot
    Inline(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyButton {
    pub text: String,
    pub press: Press,
}

impl KeyButton {
    pub fn new(text: impl Into<String>, action: Button) -> Self {
        Self {
            text: text.into(),
            press: Press::Callback(action),
        }
    }

    pub fn inline(text: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            press: Press::Inline(query.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<KeyButton>>,
}

impl Keyboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row; empty rows are skipped
    pub fn row(mut self, buttons: Vec<KeyButton>) -> Self {
        if !buttons.is_empty() {
            self.rows.push(buttons);
        }
        self
    }

    /// Lay `buttons` out `per_row` at a time
    pub fn grid(mut self, buttons: Vec<KeyButton>, per_row: usize) -> Self {
        let per_row = per_row.max(1);
        let mut buttons = buttons.into_iter().peekable();
        while buttons.peek().is_some() {
            let row: Vec<KeyButton> = buttons.by_ref().take(per_row).collect();
            self.rows.push(row);
        }
        self
    }

    /// Append every row of `other`
    pub fn append(mut self, other: Keyboard) -> Self {
        self.rows.extend(other.rows);
        self
    }

    pub fn contains(&self, action: Button) -> bool {
        self.rows
            .iter()
            .flatten()
            .any(|b| b.press == Press::Callback(action))
    }

    /// Whether some button prefills exactly `query`
    pub fn offers_query(&self, query: &str) -> bool {
        self.rows
            .iter()
            .flatten()
            .any(|b| matches!(&b.press, Press::Inline(q) if q == query))
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Bot API `InlineKeyboardMarkup`
    pub fn to_markup(&self) -> Value {
        let rows: Vec<Vec<Value>> = self
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|b| match &b.press {
                        Press::Callback(action) => {
                            json!({ "text": b.text, "callback_data": action.callback_data() })
                        }
                        Press::Inline(query) => {
                            json!({ "text": b.text, "switch_inline_query_current_chat": query })
                        }
                    })
                    .collect()
            })
            .collect();
        json!({ "inline_keyboard": rows })
    }
}
