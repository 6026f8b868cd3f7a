//! Timetable client library for psutt.
//!
//! Provides the HTML transport, the page extractor, and the schedule
//! builder for the student portal timetable.

/// Timetable pages: fetching, extraction, and snapshot assembly.
pub mod timetable;
