//! Flat export row shared by the CSV and JSON writers

use serde::{Deserialize, Serialize};

use crate::domain::EventRecord;

/// Column order of both export forms
pub const COLUMNS: [&str; 10] = [
    "datetime",
    "event_id",
    "account_address",
    "account_name",
    "action_type",
    "description",
    "value",
    "comment",
    "first_account_address",
    "second_account_address",
];

/// Exports render timestamps in UTC
const DATETIME_FORMAT: &str = "%d-%m-%Y %H:%M";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRow {
    pub datetime: String,
    pub event_id: String,
    pub account_address: String,
    pub account_name: Option<String>,
    pub action_type: Option<String>,
    pub description: Option<String>,
    pub value: Option<String>,
    pub comment: Option<String>,
    pub first_account_address: Option<String>,
    pub second_account_address: Option<String>,
}

/// Top-level JSON document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRows {
    pub rows: Vec<EventRow>,
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

impl From<&EventRecord> for EventRow {
    fn from(event: &EventRecord) -> Self {
        EventRow {
            datetime: event
                .datetime()
                .map(|dt| dt.format(DATETIME_FORMAT).to_string())
                .unwrap_or_default(),
            event_id: event.id.clone(),
            account_address: event.account_address.clone(),
            account_name: event.account_name.clone(),
            action_type: non_empty(&event.label),
            description: non_empty(&event.description),
            value: non_empty(&event.value_display),
            comment: event.comment.clone(),
            first_account_address: event.participants.first().cloned(),
            second_account_address: event.participants.get(1).cloned(),
        }
    }
}

impl EventRow {
    /// Values in `COLUMNS` order; `None` for absent optional fields
    pub fn fields(&self) -> [Option<&str>; 10] {
        [
            Some(self.datetime.as_str()),
            Some(self.event_id.as_str()),
            Some(self.account_address.as_str()),
            self.account_name.as_deref(),
            self.action_type.as_deref(),
            self.description.as_deref(),
            self.value.as_deref(),
            self.comment.as_deref(),
            self.first_account_address.as_deref(),
            self.second_account_address.as_deref(),
        ]
    }
}
