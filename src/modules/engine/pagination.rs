//! Listing pagination: cached pages re-render, the next page fetches once,
//! anything further ahead is ignored

use crate::domain::{EventListing, EventPage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageRequest {
    /// Page is already cached
    Cached(u32),
    /// Page is the first unfetched one; fetch it through the stored cursor
    FetchNext(u32),
    /// Out of range or beyond the next unfetched page
    Skip,
}

pub fn plan(listing: &EventListing, page: u32) -> PageRequest {
    if page == 0 {
        PageRequest::Skip
    } else if page <= listing.fetched_pages {
        PageRequest::Cached(page)
    } else if page == listing.fetched_pages + 1 && !listing.exhausted {
        PageRequest::FetchNext(page)
    } else {
        PageRequest::Skip
    }
}

/// Append a fetched batch and extend the cached bound.
///
/// Returns false when the batch was empty, in which case the listing is
/// marked exhausted and the bound stays where it was.
pub fn apply_batch(listing: &mut EventListing, batch: EventPage, limit: usize) -> bool {
    let received = batch.events.len();
    listing.exhausted = received == 0 || received < limit || batch.next_cursor.is_none();
    listing.cursor = batch.next_cursor;
    if received == 0 {
        return false;
    }
    listing.events.extend(batch.events);
    listing.fetched_pages += 1;
    true
}
