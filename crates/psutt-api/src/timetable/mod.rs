//! Timetable scraping module.
//!
//! Fetches the student portal's timetable pages, walks their fixed
//! positional structure, and assembles a [`ScheduleSnapshot`].

mod api;
mod builder;
mod client;
mod error;
mod extract;
mod html;
mod params;
mod rate_limiter;
mod types;

pub use api::{HtmlFetcher, LocalHtmlFetcher};
pub use builder::{DEFAULT_CONCURRENCY, build_snapshot};
#[allow(clippy::module_name_repetitions)]
pub use client::{TimetableClient, TimetableClientBuilder};
pub use error::{BuildError, FetchError, Location, ParseError, ParseReason};
pub use extract::{IndexEntry, extract_week, parse_week_index};
pub use params::PageQuery;
pub use types::{Day, Period, ScheduleSnapshot, Week};
