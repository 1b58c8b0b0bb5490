//! Button actions carried in inline keyboard callback data

use std::fmt;

use serde::{Deserialize, Serialize};

/// Actions a user can trigger by pressing an inline button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    /// Go back to the main window
    GoMain,
    /// Go back to the window that produced the current one
    Back,
    /// Open the API key prompt
    SetKey,
    /// Remove the stored API key
    DeleteKey,
    /// Toggle mainnet / testnet
    ToggleNetwork,
    /// Open the event history listing of the current account
    Events,
    /// Show contract metadata
    Metadata,
    /// Show the traits of an NFT item
    Attributes,
    /// Start an export of the current account history
    Export,
    /// Show the raw JSON of the current event
    ShowJson,
    /// Open an item of the listing (absolute index)
    SelectEvent(usize),
    /// Jump to a listing page (1-based)
    Page(u32),
    /// Pick a date range preset
    Range(RangePreset),
    /// Confirm the export in the given format
    Format(ExportFormat),
}

/// Date range presets offered by the range picker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangePreset {
    AllTime,
    LastDays(u32),
}

/// Serialization form of an export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

impl Button {
    /// Encode as callback data (at most 64 bytes on the wire)
    pub fn callback_data(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Button::GoMain => f.write_str("go_main"),
            Button::Back => f.write_str("back"),
            Button::SetKey => f.write_str("set_key"),
            Button::DeleteKey => f.write_str("del_key"),
            Button::ToggleNetwork => f.write_str("network"),
            Button::Events => f.write_str("events"),
            Button::Metadata => f.write_str("metadata"),
            Button::Attributes => f.write_str("attributes"),
            Button::Export => f.write_str("export"),
            Button::ShowJson => f.write_str("json"),
            Button::SelectEvent(index) => write!(f, "event:{index}"),
            Button::Page(page) => write!(f, "page:{page}"),
            Button::Range(RangePreset::AllTime) => f.write_str("range:all"),
            Button::Range(RangePreset::LastDays(days)) => write!(f, "range:{days}"),
            Button::Format(format) => write!(f, "fmt:{}", format.extension()),
        }
    }
}
