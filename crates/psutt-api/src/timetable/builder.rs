//! Schedule builder: index page + one page per week → [`ScheduleSnapshot`].

use chrono::NaiveDateTime;
use futures::{StreamExt, TryStreamExt, stream};
use tracing::instrument;

use super::api::HtmlFetcher;
use super::error::BuildError;
use super::extract::{IndexEntry, extract_week, parse_week_index};
use super::params::PageQuery;
use super::types::ScheduleSnapshot;

/// Default number of week pages fetched concurrently.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Fetches every published week and assembles a snapshot.
///
/// Week pages are fetched with at most `concurrency` requests in flight and
/// collected in index-list order regardless of completion order. `now` is
/// called once, after the last page has been extracted, to stamp the result.
///
/// # Errors
///
/// Returns [`BuildError`] if any page fails to fetch or parse. No partial
/// snapshot is produced.
#[instrument(skip(fetcher, now))]
pub async fn build_snapshot<F>(
    fetcher: &F,
    concurrency: usize,
    now: impl FnOnce() -> NaiveDateTime + Send,
) -> Result<ScheduleSnapshot, BuildError>
where
    F: HtmlFetcher + Sync,
{
    let index_html = fetcher.fetch(PageQuery::Index).await?;
    let entries = parse_week_index(&index_html)?;
    tracing::info!(weeks = entries.len(), "Week index parsed");

    let current_week_index = current_week_index(&entries);

    let weeks = stream::iter(entries.iter().map(|entry| entry.number))
        .map(|number| async move {
            let html = fetcher.fetch(PageQuery::Week(number)).await?;
            Ok::<_, BuildError>(extract_week(&html, number)?)
        })
        .buffered(concurrency.max(1))
        .try_collect::<Vec<_>>()
        .await?;

    let snapshot = ScheduleSnapshot {
        weeks,
        current_week_index,
        last_updated_at: now(),
    };
    tracing::info!(
        weeks = snapshot.weeks.len(),
        current_week_index,
        "Schedule snapshot built"
    );
    Ok(snapshot)
}

/// Offset of the unlinked entry from the first listed week.
///
/// When several entries are unlinked the last one wins.
/// Falls back to the entry's list position when the numbering is not
/// contiguous, and to `0` when no entry is unlinked.
fn current_week_index(entries: &[IndexEntry]) -> usize {
    let Some(start) = entries.first().map(|e| e.number) else {
        tracing::warn!("Week index is empty");
        return 0;
    };

    let mut flagged = entries.iter().enumerate().filter(|(_, e)| e.is_current);
    let Some(first) = flagged.next() else {
        tracing::warn!("Week index has no current week entry, using the first week");
        return 0;
    };
    let (position, entry) = flagged.last().map_or(first, |last| {
        tracing::warn!(
            week = last.1.number,
            "Week index flags several current weeks, using the last"
        );
        last
    });

    let offset = entry
        .number
        .checked_sub(start)
        .and_then(|d| usize::try_from(d).ok())
        .filter(|&d| d < entries.len());
    offset.unwrap_or_else(|| {
        tracing::warn!(
            week = entry.number,
            start,
            position,
            "Week numbers are not contiguous, using list position"
        );
        position
    })
}
