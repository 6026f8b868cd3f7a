//! Persisted timetable snapshot with week-based staleness.
//!
//! [`Timetable`] is the entry point: it keeps the latest
//! [`ScheduleSnapshot`](psutt_api::timetable::ScheduleSnapshot) in memory,
//! mirrors it to an XML file through [`SnapshotStore`], and rebuilds it from
//! the portal once per calendar week.

mod clock;
mod error;
/// Calendar-week staleness rules.
pub mod staleness;
mod store;
mod timetable;

pub use clock::{Clock, SystemClock};
pub use error::{StoreError, TimetableError};
pub use store::SnapshotStore;
pub use timetable::Timetable;
