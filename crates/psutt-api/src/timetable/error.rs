//! Error types for fetching and extracting timetable pages.

use std::fmt;

use super::params::PageQuery;

/// Where in the source markup an expected node was not found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Location {
    /// Week number of the page (`None` for the index page).
    pub week: Option<u32>,
    /// Zero-based day block index.
    pub day: Option<usize>,
    /// Zero-based table row index within the day.
    pub row: Option<usize>,
}

impl Location {
    /// Location on the week index page.
    #[must_use]
    pub const fn index() -> Self {
        Self {
            week: None,
            day: None,
            row: None,
        }
    }

    /// Location on a week page.
    #[must_use]
    pub const fn week(number: u32) -> Self {
        Self {
            week: Some(number),
            day: None,
            row: None,
        }
    }

    /// Narrows to a day block.
    #[must_use]
    pub const fn day(self, day: usize) -> Self {
        Self {
            day: Some(day),
            ..self
        }
    }

    /// Narrows to a table row.
    #[must_use]
    pub const fn row(self, row: usize) -> Self {
        Self {
            row: Some(row),
            ..self
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.week {
            Some(week) => write!(f, "week {week}")?,
            None => write!(f, "week index")?,
        }
        if let Some(day) = self.day {
            write!(f, ", day {day}")?;
        }
        if let Some(row) = self.row {
            write!(f, ", row {row}")?;
        }
        Ok(())
    }
}

/// What went wrong while reading a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseReason {
    /// A required node is absent.
    Missing(&'static str),
    /// A week index entry is not a number.
    InvalidWeekNumber(String),
}

impl fmt::Display for ParseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(node) => write!(f, "missing {node}"),
            Self::InvalidWeekNumber(text) => write!(f, "invalid week number {text:?}"),
        }
    }
}

/// Source markup did not match the expected document shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed timetable page ({location}): {reason}")]
pub struct ParseError {
    /// Where the mismatch occurred.
    pub location: Location,
    /// What was expected.
    pub reason: ParseReason,
}

impl ParseError {
    /// A required node is missing at `location`.
    #[must_use]
    pub const fn missing(location: Location, node: &'static str) -> Self {
        Self {
            location,
            reason: ParseReason::Missing(node),
        }
    }
}

/// Transport failure while fetching a page.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The request could not be sent or the body could not be read.
    #[error("request for {query} failed")]
    Transport {
        /// Requested page.
        query: PageQuery,
        /// Underlying HTTP client error.
        #[source]
        source: reqwest::Error,
    },
    /// The server answered with a non-success status.
    #[error("request for {query} returned HTTP {status}")]
    Status {
        /// Requested page.
        query: PageQuery,
        /// HTTP status code.
        status: u16,
    },
}

/// A schedule build failed; no snapshot was produced.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// A page could not be fetched.
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// A page could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),
}
