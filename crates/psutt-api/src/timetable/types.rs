//! Timetable record types.

use chrono::NaiveDateTime;
use serde::de::Error;
use serde::{Deserialize, Deserializer, Serialize};

/// A single class slot ("pair") within a day.
///
/// A period that does not take place keeps its position in the day with
/// `exists == false` and every optional field set to `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    /// Whether a class is held in this slot.
    pub exists: bool,
    /// Subject title.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_empty_string_as_none"
    )]
    pub title: Option<String>,
    /// Period label as printed (e.g. `"1 пара"`).
    pub ordinal: String,
    /// Start time as printed (e.g. `"08:00"`).
    pub start_time: String,
    /// Teacher name.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_empty_string_as_none"
    )]
    pub teacher: Option<String>,
    /// Room.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_empty_string_as_none"
    )]
    pub room: Option<String>,
}

impl Period {
    /// Creates a placeholder for a slot with no class.
    #[must_use]
    pub const fn empty(ordinal: String, start_time: String) -> Self {
        Self {
            exists: false,
            title: None,
            ordinal,
            start_time,
            teacher: None,
            room: None,
        }
    }
}

/// One day of a week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Day {
    /// Day name as printed in the heading.
    pub name: String,
    /// `true` iff the page rendered a table for this day.
    pub has_periods: bool,
    /// Periods in table order (empty when `has_periods` is false).
    #[serde(rename = "period", default)]
    pub periods: Vec<Period>,
}

/// One published week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Week {
    /// Week number as published by the source.
    pub number: u32,
    /// Caption (usually a date range).
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_empty_string_as_none"
    )]
    pub label: Option<String>,
    /// Days in published order.
    #[serde(rename = "day", default)]
    pub days: Vec<Day>,
}

/// The complete result of one successful schedule fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSnapshot {
    /// Weeks in index-list order.
    #[serde(rename = "week", default)]
    pub weeks: Vec<Week>,
    /// Index into `weeks` of the week the server flagged as current.
    pub current_week_index: usize,
    /// Local time the fetch completed.
    #[serde(with = "timestamp")]
    pub last_updated_at: NaiveDateTime,
}

impl ScheduleSnapshot {
    /// Returns the week at `current_week_index`, if any.
    #[must_use]
    pub fn server_current_week(&self) -> Option<&Week> {
        self.weeks.get(self.current_week_index)
    }
}

/// Deserializes empty strings as `None`.
fn deserialize_empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let result = Option::deserialize(deserializer);
    let s: Option<String> = result.map_err(D::Error::custom)?;
    Ok(s.filter(|s| !s.is_empty()))
}

/// `NaiveDateTime` as `%Y-%m-%dT%H:%M:%S%.f` text.
mod timestamp {
    use chrono::NaiveDateTime;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

    pub fn serialize<S>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&value.format(FORMAT))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(s.trim(), FORMAT)
            .map_err(|e| D::Error::custom(format!("invalid timestamp {s:?}: {e}")))
    }
}
