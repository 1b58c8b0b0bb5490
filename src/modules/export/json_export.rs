//! JSON Export
//!
//! `{"rows": [...]}`, two-space indent, keys in declaration order, explicit nulls.

use super::rows::{EventRow, EventRows};

pub fn write_rows(rows: &[EventRow]) -> Result<Vec<u8>, serde_json::Error> {
    let document = EventRows {
        rows: rows.to_vec(),
    };
    serde_json::to_vec_pretty(&document)
}

pub fn read_rows(bytes: &[u8]) -> Result<EventRows, serde_json::Error> {
    serde_json::from_slice(bytes)
}
