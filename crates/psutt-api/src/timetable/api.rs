//! `HtmlFetcher` trait definition.
#![allow(clippy::future_not_send)]

use super::error::FetchError;
use super::params::PageQuery;

/// Source of raw timetable pages.
///
/// Abstracts the HTTP transport for mock substitution in tests.
/// Uses `trait_variant::make` to generate a `Send`-bound async trait.
#[trait_variant::make(HtmlFetcher: Send)]
pub trait LocalHtmlFetcher {
    /// Fetches the HTML of one timetable page.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on network failure or a non-success status.
    async fn fetch(&self, query: PageQuery) -> Result<String, FetchError>;
}
