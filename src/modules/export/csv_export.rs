//! CSV Export
//!
//! Header row of column names, every value quoted, `null` for absent fields.

use csv::{QuoteStyle, WriterBuilder};

use super::rows::{EventRow, COLUMNS};

const NULL: &str = "null";

pub fn write_rows(rows: &[EventRow]) -> Result<Vec<u8>, csv::Error> {
    let mut wtr = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .from_writer(Vec::new());

    wtr.write_record(COLUMNS)?;
    for row in rows {
        wtr.write_record(row.fields().map(|field| field.unwrap_or(NULL)))?;
    }

    wtr.flush()?;
    wtr.into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}
