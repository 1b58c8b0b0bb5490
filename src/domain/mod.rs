//! Domain types: sessions and ledger records

pub mod ledger;
pub mod session;

pub use ledger::{
    normalize_address, short_address, AccountSnapshot, ContractInfo, ContractKind, Cursor,
    DateRange, EventKind, EventPage, EventRecord, JettonBalance, JettonHolder, NftSummary,
    TransferValue, NANO,
};
pub use session::{
    origin_of, AccountPayload, DetailView, EventListing, EventPayload, ExportDraft, Payload,
    Preferences, Session,
};
