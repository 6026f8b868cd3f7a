//! Page extractor: timetable HTML → [`Week`] records.

use scraper::{ElementRef, Html};
use tracing::instrument;

use super::error::{Location, ParseError, ParseReason};
use super::html::{
    NodePath, child_elements, inner_text, non_empty, require, resolve, step, table_rows,
    trimmed_text,
};
use super::types::{Day, Period, Week};

/// Number of leading characters of the first cell that form the period label.
const ORDINAL_LEN: usize = 6;

const WEEK_INDEX: NodePath = NodePath {
    name: "week index list",
    steps: &[
        step("body", 1),
        step("div", 2),
        step("div", 1),
        step("div", 2),
        step("div", 2),
        step("ul", 1),
    ],
};

const WEEK_CAPTION: NodePath = NodePath {
    name: "week caption",
    steps: &[
        step("body", 1),
        step("div", 2),
        step("div", 1),
        step("div", 2),
        step("div", 2),
        step("div", 2),
        step("span", 1),
    ],
};

const TIMETABLE: NodePath = NodePath {
    name: "timetable container",
    steps: &[
        step("body", 1),
        step("div", 2),
        step("div", 1),
        step("div", 2),
        step("div", 3),
    ],
};

const DAY_HEADING: NodePath = NodePath {
    name: "day heading",
    steps: &[step("h3", 1)],
};

const DAY_TABLE: NodePath = NodePath {
    name: "day table",
    steps: &[step("table", 1)],
};

const LEAD_CELL: NodePath = NodePath {
    name: "period number cell",
    steps: &[step("td", 1)],
};

const TIME_CELL: NodePath = NodePath {
    name: "period time cell",
    steps: &[step("td", 1), step("font", 1)],
};

const INFO_BLOCK: NodePath = NodePath {
    name: "period info block",
    steps: &[step("td", 2), step("div", 1)],
};

const TITLE: NodePath = NodePath {
    name: "period title",
    steps: &[step("div", 1), step("span", 2)],
};

const TEACHER: NodePath = NodePath {
    name: "period teacher",
    steps: &[step("div", 1), step("span", 1), step("a", 1)],
};

const ROOM: NodePath = NodePath {
    name: "period room",
    steps: &[step("div", 2), step("span", 1)],
};

/// One entry of the week index list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// Published week number.
    pub number: u32,
    /// `true` for the unlinked entry the server considers the current week.
    pub is_current: bool,
}

/// Reads the week index list from a timetable page.
///
/// # Errors
///
/// Returns [`ParseError`] if the list is missing or an entry is not a number.
#[instrument(skip_all)]
pub fn parse_week_index(html: &str) -> Result<Vec<IndexEntry>, ParseError> {
    let document = Html::parse_document(html);
    let list = require(document.root_element(), &WEEK_INDEX, Location::index())?;

    child_elements(list, "li")
        .enumerate()
        .map(|(i, item)| {
            let (text, is_current) = child_elements(item, "a")
                .next()
                .map_or_else(|| (trimmed_text(item), true), |a| (trimmed_text(a), false));
            let number = text.parse::<u32>().map_err(|_| ParseError {
                location: Location::index().row(i),
                reason: ParseReason::InvalidWeekNumber(text.clone()),
            })?;
            Ok(IndexEntry { number, is_current })
        })
        .collect()
}

/// Extracts one week from its timetable page.
///
/// A page without a timetable container yields a week with no days.
///
/// # Errors
///
/// Returns [`ParseError`] if the week caption, a day heading, a period's
/// time cell, or a sub-node of a present info block is missing.
#[instrument(skip(html))]
pub fn extract_week(html: &str, week_number: u32) -> Result<Week, ParseError> {
    let document = Html::parse_document(html);
    let root = document.root_element();
    let location = Location::week(week_number);

    let caption = require(root, &WEEK_CAPTION, location)?;
    let label = non_empty(trimmed_text(caption));

    let Some(container) = resolve(root, TIMETABLE.steps) else {
        tracing::debug!(week = week_number, "no timetable container, week has no days");
        return Ok(Week {
            number: week_number,
            label,
            days: Vec::new(),
        });
    };

    let days = child_elements(container, "div")
        .enumerate()
        .map(|(i, block)| extract_day(block, location.day(i)))
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(week = week_number, days = days.len(), "week extracted");

    Ok(Week {
        number: week_number,
        label,
        days,
    })
}

/// Extracts one day block.
fn extract_day(block: ElementRef<'_>, location: Location) -> Result<Day, ParseError> {
    let name = trimmed_text(require(block, &DAY_HEADING, location)?);

    let Some(table) = resolve(block, DAY_TABLE.steps) else {
        return Ok(Day {
            name,
            has_periods: false,
            periods: Vec::new(),
        });
    };

    let periods = table_rows(table)
        .into_iter()
        .enumerate()
        .map(|(i, row)| extract_period(row, location.row(i)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Day {
        name,
        has_periods: true,
        periods,
    })
}

/// Extracts one table row.
fn extract_period(row: ElementRef<'_>, location: Location) -> Result<Period, ParseError> {
    let start_time = trimmed_text(require(row, &TIME_CELL, location)?);
    let lead = inner_text(require(row, &LEAD_CELL, location)?);
    let ordinal = lead
        .trim_start()
        .chars()
        .take(ORDINAL_LEN)
        .collect::<String>()
        .trim_end()
        .to_owned();

    let Some(info) = resolve(row, INFO_BLOCK.steps) else {
        return Ok(Period::empty(ordinal, start_time));
    };

    let title = trimmed_text(require(info, &TITLE, location)?);
    let teacher = trimmed_text(require(info, &TEACHER, location)?);
    let room = trimmed_text(require(info, &ROOM, location)?);

    Ok(Period {
        exists: true,
        title: non_empty(title),
        ordinal,
        start_time,
        teacher: non_empty(teacher),
        room: non_empty(room),
    })
}
