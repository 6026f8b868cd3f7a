//! Staleness-aware timetable facade.

use std::sync::Arc;

use chrono::NaiveDateTime;
use psutt_api::timetable::{
    DEFAULT_CONCURRENCY, HtmlFetcher, ScheduleSnapshot, Week, build_snapshot,
};
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;

use super::clock::{Clock, SystemClock};
use super::error::TimetableError;
use super::staleness::{is_sunday, needs_refresh, resolve_current_week_index};
use super::store::SnapshotStore;

/// Single entry point for reading the timetable.
///
/// Holds the current snapshot in memory, loads it lazily from the
/// [`SnapshotStore`], and rebuilds it from the portal once the calendar
/// week has rolled over. At most one rebuild runs at a time; callers that
/// arrive during a rebuild wait for it and reuse its result.
#[derive(Debug)]
pub struct Timetable<F, C = SystemClock> {
    fetcher: F,
    store: SnapshotStore,
    clock: C,
    concurrency: usize,
    snapshot: RwLock<Option<Arc<ScheduleSnapshot>>>,
    refresh_guard: Mutex<()>,
}

impl<F> Timetable<F, SystemClock>
where
    F: HtmlFetcher + Sync,
{
    /// Creates a facade using the system clock.
    #[must_use]
    pub fn new(fetcher: F, store: SnapshotStore) -> Self {
        Self::with_clock(fetcher, store, SystemClock)
    }
}

impl<F, C> Timetable<F, C>
where
    F: HtmlFetcher + Sync,
    C: Clock,
{
    /// Creates a facade reading time from `clock`.
    #[must_use]
    pub fn with_clock(fetcher: F, store: SnapshotStore, clock: C) -> Self {
        Self {
            fetcher,
            store,
            clock,
            concurrency: DEFAULT_CONCURRENCY,
            snapshot: RwLock::new(None),
            refresh_guard: Mutex::new(()),
        }
    }

    /// Sets the number of week pages fetched concurrently during a rebuild.
    #[must_use]
    pub const fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Backing store.
    #[must_use]
    pub const fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Makes sure an up-to-date snapshot is held, rebuilding it if stale.
    ///
    /// # Errors
    ///
    /// Returns [`TimetableError::Build`] if a rebuild was needed and failed;
    /// the previous snapshot stays in place. Returns
    /// [`TimetableError::Store`] if the snapshot cannot be read or saved.
    #[instrument(skip_all)]
    pub async fn ensure_fresh(&self) -> Result<Arc<ScheduleSnapshot>, TimetableError> {
        let _guard = self.refresh_guard.lock().await;

        let cached = self.cached_locked().await?;
        let has_cached = cached.is_some() && self.store.exists();
        let now = self.clock.now();

        if let Some(snapshot) = cached
            && !needs_refresh(has_cached, now, snapshot.last_updated_at)
        {
            tracing::debug!(
                last_updated_at = %snapshot.last_updated_at,
                "Cached timetable is fresh"
            );
            return Ok(snapshot);
        }

        tracing::info!("Timetable is stale, refreshing");
        self.refresh_locked().await
    }

    /// Rebuilds the snapshot unconditionally.
    ///
    /// # Errors
    ///
    /// Same as [`Self::ensure_fresh`].
    #[instrument(skip_all)]
    pub async fn force_refresh(&self) -> Result<Arc<ScheduleSnapshot>, TimetableError> {
        let _guard = self.refresh_guard.lock().await;
        self.refresh_locked().await
    }

    /// Every cached week in portal order.
    ///
    /// # Errors
    ///
    /// Returns [`TimetableError::NoSnapshot`] if nothing has been fetched yet.
    pub async fn all_weeks(&self) -> Result<Vec<Week>, TimetableError> {
        Ok(self.current_snapshot().await?.weeks.clone())
    }

    /// Index of the week presented as current, previewing next week on Sundays.
    ///
    /// # Errors
    ///
    /// Returns [`TimetableError::NoSnapshot`] if nothing has been fetched yet
    /// or the snapshot holds no weeks.
    pub async fn current_week_index(&self) -> Result<usize, TimetableError> {
        let snapshot = self.current_snapshot().await?;
        self.resolve_index(&snapshot)
    }

    /// The week presented as current.
    ///
    /// # Errors
    ///
    /// Same as [`Self::current_week_index`].
    pub async fn current_week(&self) -> Result<Week, TimetableError> {
        let snapshot = self.current_snapshot().await?;
        let index = self.resolve_index(&snapshot)?;
        snapshot
            .weeks
            .get(index)
            .cloned()
            .ok_or(TimetableError::NoSnapshot)
    }

    /// When the held snapshot was built.
    ///
    /// # Errors
    ///
    /// Returns [`TimetableError::NoSnapshot`] if nothing has been fetched yet.
    pub async fn last_updated_at(&self) -> Result<NaiveDateTime, TimetableError> {
        Ok(self.current_snapshot().await?.last_updated_at)
    }

    /// Deletes the persisted snapshot so the next [`Self::ensure_fresh`]
    /// rebuilds it.
    ///
    /// The in-memory copy stays readable until that rebuild succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`TimetableError::Store`] if the file cannot be removed.
    #[instrument(skip_all)]
    pub async fn force_clear(&self) -> Result<(), TimetableError> {
        let _guard = self.refresh_guard.lock().await;
        self.store.clear()?;
        tracing::info!(path = %self.store.path().display(), "Persisted timetable removed");
        Ok(())
    }

    fn resolve_index(&self, snapshot: &ScheduleSnapshot) -> Result<usize, TimetableError> {
        if snapshot.server_current_week().is_none() {
            return Err(TimetableError::NoSnapshot);
        }
        let sunday = is_sunday(self.clock.now().date());
        Ok(resolve_current_week_index(
            snapshot.current_week_index,
            snapshot.weeks.len(),
            sunday,
        ))
    }

    /// Held snapshot, loading it from the store on first use.
    async fn current_snapshot(&self) -> Result<Arc<ScheduleSnapshot>, TimetableError> {
        if let Some(snapshot) = self.snapshot.read().await.clone() {
            return Ok(snapshot);
        }
        let _guard = self.refresh_guard.lock().await;
        self.cached_locked().await?.ok_or(TimetableError::NoSnapshot)
    }

    /// Caller must hold `refresh_guard`.
    async fn cached_locked(&self) -> Result<Option<Arc<ScheduleSnapshot>>, TimetableError> {
        if let Some(snapshot) = self.snapshot.read().await.clone() {
            return Ok(Some(snapshot));
        }
        let Some(loaded) = self.store.load_or_discard()? else {
            return Ok(None);
        };
        tracing::debug!(
            path = %self.store.path().display(),
            weeks = loaded.weeks.len(),
            "Loaded persisted timetable"
        );
        let loaded = Arc::new(loaded);
        *self.snapshot.write().await = Some(Arc::clone(&loaded));
        Ok(Some(loaded))
    }

    /// Caller must hold `refresh_guard`.
    async fn refresh_locked(&self) -> Result<Arc<ScheduleSnapshot>, TimetableError> {
        let built = build_snapshot(&self.fetcher, self.concurrency, || self.clock.now())
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "Timetable refresh failed"))?;
        let built = Arc::new(built);
        *self.snapshot.write().await = Some(Arc::clone(&built));
        self.store.save(&built)?;
        tracing::info!(
            weeks = built.weeks.len(),
            last_updated_at = %built.last_updated_at,
            "Timetable refreshed"
        );
        Ok(built)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use chrono::NaiveDate;
    use psutt_api::timetable::{FetchError, PageQuery};

    use super::*;

    struct FixtureFetcher {
        pages: HashMap<PageQuery, &'static str>,
        calls: AtomicUsize,
        failing: AtomicBool,
        week_delay: Option<Duration>,
    }

    impl FixtureFetcher {
        fn new() -> Self {
            let pages = HashMap::from([
                (
                    PageQuery::Index,
                    include_str!("../../../fixtures/timetable/index.html"),
                ),
                (
                    PageQuery::Week(10),
                    include_str!("../../../fixtures/timetable/week_10.html"),
                ),
                (
                    PageQuery::Week(11),
                    include_str!("../../../fixtures/timetable/week_11.html"),
                ),
                (
                    PageQuery::Week(12),
                    include_str!("../../../fixtures/timetable/week_12.html"),
                ),
            ]);
            Self {
                pages,
                calls: AtomicUsize::new(0),
                failing: AtomicBool::new(false),
                week_delay: None,
            }
        }

        fn index_fetches(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl HtmlFetcher for FixtureFetcher {
        async fn fetch(&self, query: PageQuery) -> Result<String, FetchError> {
            if query == PageQuery::Index {
                self.calls.fetch_add(1, Ordering::SeqCst);
            } else if let Some(delay) = self.week_delay {
                tokio::time::sleep(delay).await;
            }
            if self.failing.load(Ordering::SeqCst) {
                return Err(FetchError::Status { query, status: 503 });
            }
            self.pages
                .get(&query)
                .map(|page| String::from(*page))
                .ok_or(FetchError::Status { query, status: 404 })
        }
    }

    struct FixedClock(std::sync::Mutex<NaiveDateTime>);

    impl FixedClock {
        fn at(value: NaiveDateTime) -> Self {
            Self(std::sync::Mutex::new(value))
        }

        fn set(&self, value: NaiveDateTime) {
            *self.0.lock().unwrap() = value;
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> NaiveDateTime {
            *self.0.lock().unwrap()
        }
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    // 2025-10-15 is a Wednesday
    fn wednesday() -> NaiveDateTime {
        at(2025, 10, 15, 10)
    }

    fn facade(
        dir: &tempfile::TempDir,
        now: NaiveDateTime,
    ) -> Timetable<FixtureFetcher, FixedClock> {
        Timetable::with_clock(
            FixtureFetcher::new(),
            SnapshotStore::new(dir.path().join("timetable.xml")),
            FixedClock::at(now),
        )
    }

    #[tokio::test]
    async fn test_ensure_fresh_fetches_and_persists() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let timetable = facade(&dir, wednesday());

        // Act
        let snapshot = timetable.ensure_fresh().await.unwrap();

        // Assert
        assert_eq!(timetable.fetcher.index_fetches(), 1);
        assert_eq!(snapshot.weeks.len(), 3);
        assert_eq!(snapshot.last_updated_at, wednesday());
        let persisted = timetable.store().load().unwrap().unwrap();
        assert_eq!(persisted, *snapshot);
    }

    #[tokio::test]
    async fn test_ensure_fresh_same_week_does_not_refetch() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let timetable = facade(&dir, wednesday());
        timetable.ensure_fresh().await.unwrap();
        timetable.clock.set(at(2025, 10, 18, 21));

        // Act
        timetable.ensure_fresh().await.unwrap();

        // Assert
        assert_eq!(timetable.fetcher.index_fetches(), 1);
    }

    #[tokio::test]
    async fn test_ensure_fresh_reuses_persisted_copy() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        facade(&dir, wednesday()).ensure_fresh().await.unwrap();
        let restarted = facade(&dir, at(2025, 10, 16, 9));

        // Act
        let snapshot = restarted.ensure_fresh().await.unwrap();

        // Assert
        assert_eq!(restarted.fetcher.index_fetches(), 0);
        assert_eq!(snapshot.last_updated_at, wednesday());
    }

    #[tokio::test]
    async fn test_ensure_fresh_new_week_refetches() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let timetable = facade(&dir, wednesday());
        timetable.ensure_fresh().await.unwrap();
        let monday = at(2025, 10, 20, 8);
        timetable.clock.set(monday);

        // Act
        let snapshot = timetable.ensure_fresh().await.unwrap();

        // Assert
        assert_eq!(timetable.fetcher.index_fetches(), 2);
        assert_eq!(snapshot.last_updated_at, monday);
    }

    #[tokio::test]
    async fn test_ensure_fresh_sunday_keeps_stale_snapshot() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let timetable = facade(&dir, at(2025, 10, 10, 12));
        timetable.ensure_fresh().await.unwrap();
        timetable.clock.set(at(2025, 10, 19, 12));

        // Act
        timetable.ensure_fresh().await.unwrap();

        // Assert
        assert_eq!(timetable.fetcher.index_fetches(), 1);
    }

    #[tokio::test]
    async fn test_current_week_previews_next_week_on_sunday() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let timetable = facade(&dir, wednesday());
        timetable.ensure_fresh().await.unwrap();

        // Act
        let weekday = timetable.current_week().await.unwrap();
        timetable.clock.set(at(2025, 10, 19, 12));
        let sunday = timetable.current_week().await.unwrap();

        // Assert
        assert_eq!(weekday.number, 11);
        assert_eq!(sunday.number, 12);
        assert_eq!(timetable.current_week_index().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let timetable = facade(&dir, wednesday());
        timetable.ensure_fresh().await.unwrap();
        timetable.clock.set(at(2025, 10, 21, 9));
        timetable.fetcher.failing.store(true, Ordering::SeqCst);

        // Act
        let err = timetable.ensure_fresh().await.unwrap_err();

        // Assert
        assert!(matches!(err, TimetableError::Build(_)));
        assert_eq!(timetable.last_updated_at().await.unwrap(), wednesday());
        assert_eq!(timetable.all_weeks().await.unwrap().len(), 3);
        let persisted = timetable.store().load().unwrap().unwrap();
        assert_eq!(persisted.last_updated_at, wednesday());
    }

    #[tokio::test]
    async fn test_reads_before_any_fetch_fail() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let timetable = facade(&dir, wednesday());

        // Act & Assert
        assert!(matches!(
            timetable.all_weeks().await,
            Err(TimetableError::NoSnapshot)
        ));
        assert!(matches!(
            timetable.current_week().await,
            Err(TimetableError::NoSnapshot)
        ));
        assert!(matches!(
            timetable.last_updated_at().await,
            Err(TimetableError::NoSnapshot)
        ));
    }

    #[tokio::test]
    async fn test_current_week_of_empty_snapshot_fails() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let timetable = facade(&dir, wednesday());
        let empty = ScheduleSnapshot {
            weeks: Vec::new(),
            current_week_index: 0,
            last_updated_at: wednesday(),
        };
        timetable.store().save(&empty).unwrap();

        // Act & Assert
        assert!(timetable.all_weeks().await.unwrap().is_empty());
        assert!(matches!(
            timetable.current_week_index().await,
            Err(TimetableError::NoSnapshot)
        ));
        assert!(matches!(
            timetable.current_week().await,
            Err(TimetableError::NoSnapshot)
        ));
    }

    #[tokio::test]
    async fn test_reads_load_persisted_copy_without_fetching() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        facade(&dir, wednesday()).ensure_fresh().await.unwrap();
        let restarted = facade(&dir, at(2025, 11, 3, 9));

        // Act
        let weeks = restarted.all_weeks().await.unwrap();

        // Assert
        assert_eq!(weeks.len(), 3);
        assert_eq!(restarted.fetcher.index_fetches(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_persisted_copy_is_refetched() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("timetable.xml"), "not a timetable").unwrap();
        let timetable = facade(&dir, wednesday());

        // Act
        let snapshot = timetable.ensure_fresh().await.unwrap();

        // Assert
        assert_eq!(timetable.fetcher.index_fetches(), 1);
        assert_eq!(timetable.store().load().unwrap().unwrap(), *snapshot);
    }

    #[tokio::test]
    async fn test_force_clear_triggers_refetch() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let timetable = facade(&dir, wednesday());
        timetable.ensure_fresh().await.unwrap();

        // Act
        timetable.force_clear().await.unwrap();

        // Assert
        assert!(!timetable.store().exists());
        assert_eq!(timetable.all_weeks().await.unwrap().len(), 3);
        timetable.ensure_fresh().await.unwrap();
        assert_eq!(timetable.fetcher.index_fetches(), 2);
        assert!(timetable.store().exists());
    }

    #[tokio::test]
    async fn test_force_refresh_ignores_freshness() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let timetable = facade(&dir, wednesday());
        timetable.ensure_fresh().await.unwrap();

        // Act
        timetable.force_refresh().await.unwrap();

        // Assert
        assert_eq!(timetable.fetcher.index_fetches(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let mut fetcher = FixtureFetcher::new();
        fetcher.week_delay = Some(Duration::from_millis(20));
        let timetable = Timetable::with_clock(
            fetcher,
            SnapshotStore::new(dir.path().join("timetable.xml")),
            FixedClock::at(wednesday()),
        );

        // Act
        let (a, b, c) = tokio::join!(
            timetable.ensure_fresh(),
            timetable.ensure_fresh(),
            timetable.ensure_fresh()
        );

        // Assert
        assert_eq!(timetable.fetcher.index_fetches(), 1);
        let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&b, &c));
    }

    #[tokio::test]
    async fn test_cancelled_refresh_persists_nothing() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let mut fetcher = FixtureFetcher::new();
        fetcher.week_delay = Some(Duration::from_secs(5));
        let timetable = Timetable::with_clock(
            fetcher,
            SnapshotStore::new(dir.path().join("timetable.xml")),
            FixedClock::at(wednesday()),
        );

        // Act
        let outcome =
            tokio::time::timeout(Duration::from_millis(20), timetable.ensure_fresh()).await;

        // Assert
        assert!(outcome.is_err());
        assert!(!timetable.store().exists());
        assert!(matches!(
            timetable.all_weeks().await,
            Err(TimetableError::NoSnapshot)
        ));
    }
}
