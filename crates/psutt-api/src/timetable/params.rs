//! Timetable page request parameters.

use std::fmt;

/// Which timetable page to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageQuery {
    /// The schedule page without a week parameter (carries the week index).
    Index,
    /// The page for one published week.
    Week(u32),
}

impl PageQuery {
    /// Builds the query string pairs sent with the request.
    ///
    /// Example: `Week(12)` → `[("p_cons", "n"), ("p_week", "12")]`
    #[must_use]
    pub fn to_query_pairs(self) -> Vec<(&'static str, String)> {
        match self {
            Self::Index => Vec::new(),
            Self::Week(number) => vec![
                ("p_cons", String::from("n")),
                ("p_week", number.to_string()),
            ],
        }
    }
}

impl fmt::Display for PageQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index => write!(f, "week index"),
            Self::Week(number) => write!(f, "week {number}"),
        }
    }
}
