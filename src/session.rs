use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::activity::{self, ActivityMap};
use crate::api::{AdvancementData, ApiError, SheetClient};
use crate::calendar::CalendarGrid;
use crate::import::{self, ImportError};
use crate::models::Project;

pub const CACHE_TTL: Duration = Duration::from_secs(5);
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Import(#[from] ImportError),
}

pub trait ProjectSource {
    fn projects(&self) -> impl Future<Output = Result<Vec<Arc<Project>>, SourceError>> + Send;
    fn advancements(&self) -> impl Future<Output = Result<AdvancementData, SourceError>> + Send;
}

impl ProjectSource for SheetClient {
    async fn projects(&self) -> Result<Vec<Arc<Project>>, SourceError> {
        Ok(self.fetch_projects().await?)
    }

    async fn advancements(&self) -> Result<AdvancementData, SourceError> {
        Ok(self.fetch_advancements().await?)
    }
}

#[derive(Debug, Clone)]
pub struct CsvSource {
    pub projects: PathBuf,
    pub advancements: Option<PathBuf>,
}

impl ProjectSource for CsvSource {
    async fn projects(&self) -> Result<Vec<Arc<Project>>, SourceError> {
        Ok(import::load_projects(&self.projects)?)
    }

    async fn advancements(&self) -> Result<AdvancementData, SourceError> {
        let Some(path) = &self.advancements else {
            return Ok(AdvancementData::default());
        };
        Ok(AdvancementData {
            events: Vec::new(),
            rows: import::load_advancement_rows(path)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SessionCache {
    projects: Option<Vec<Arc<Project>>>,
    fetched_at: Option<Instant>,
    ttl: Duration,
}

impl SessionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            projects: None,
            fetched_at: None,
            ttl,
        }
    }

    pub fn is_fresh(&self, now: Instant) -> bool {
        match (self.fetched_at, &self.projects) {
            (Some(at), Some(_)) => now.saturating_duration_since(at) < self.ttl,
            _ => false,
        }
    }

    pub fn store(&mut self, projects: Vec<Arc<Project>>, now: Instant) {
        self.projects = Some(projects);
        self.fetched_at = Some(now);
    }

    pub fn projects(&self) -> Option<&[Arc<Project>]> {
        self.projects.as_deref()
    }
}

impl Default for SessionCache {
    fn default() -> Self {
        Self::new(CACHE_TTL)
    }
}

/// Everything derived from one fetch. Rebuilt wholesale on every refresh.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub projects: Vec<Arc<Project>>,
    pub activity: ActivityMap,
    pub grid: CalendarGrid,
}

impl Snapshot {
    pub fn build(projects: Vec<Arc<Project>>, advancements: &AdvancementData, today: NaiveDate) -> Self {
        let activity = ActivityMap::build(&projects, &advancements.events, &advancements.rows, today);
        let grid = CalendarGrid::build(&activity, today);
        Self {
            projects,
            activity,
            grid,
        }
    }
}

pub struct Session<S> {
    source: S,
    cache: SessionCache,
}

impl<S: ProjectSource> Session<S> {
    pub fn new(source: S, cache: SessionCache) -> Self {
        Self { source, cache }
    }

    /// Serves the cached list while it is fresh unless `force` is set.
    pub async fn load_projects(&mut self, force: bool) -> Result<Vec<Arc<Project>>, SourceError> {
        let now = Instant::now();
        if !force && self.cache.is_fresh(now) {
            if let Some(projects) = self.cache.projects() {
                debug!(count = projects.len(), "serving cached projects");
                return Ok(projects.to_vec());
            }
        }
        let projects = self.source.projects().await?;
        self.cache.store(projects.clone(), now);
        Ok(projects)
    }

    /// Projects are required; advancement data is best effort and its
    /// failure leaves a projects-only calendar.
    pub async fn load_snapshot(&mut self, force: bool, today: NaiveDate) -> Result<Snapshot, SourceError> {
        let projects = self.load_projects(force).await?;
        let advancements = match self.source.advancements().await {
            Ok(data) => data,
            Err(err) => {
                warn!(error = %err, "advancement data unavailable, using projects only");
                AdvancementData::default()
            }
        };
        Ok(Snapshot::build(projects, &advancements, today))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub snapshot: Snapshot,
    pub changed: bool,
    pub removed: bool,
    pub forced: bool,
}

pub struct Refresher<S> {
    session: Session<S>,
    period: Duration,
    last_count: Option<usize>,
}

impl<S: ProjectSource> Refresher<S> {
    pub fn new(session: Session<S>, period: Duration) -> Self {
        Self {
            session,
            period,
            last_count: None,
        }
    }

    pub async fn refresh(&mut self, force: bool) -> Result<RefreshOutcome, SourceError> {
        let snapshot = self.session.load_snapshot(force, activity::today()).await?;
        let count = snapshot.projects.len();
        let previous = self.last_count.replace(count);
        Ok(RefreshOutcome {
            changed: previous != Some(count),
            removed: previous.is_some_and(|previous| count < previous),
            forced: force,
            snapshot,
        })
    }

    /// Polls every period while visible. Becoming visible again refreshes
    /// at once and restarts the period. Never returns on its own.
    pub async fn run<F>(&mut self, mut visibility: watch::Receiver<Visibility>, mut on_refresh: F)
    where
        F: FnMut(&RefreshOutcome),
    {
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut visible = *visibility.borrow_and_update() == Visibility::Visible;
        let mut watching = true;

        loop {
            tokio::select! {
                _ = ticker.tick(), if visible => {
                    self.refresh_and_report(false, &mut on_refresh).await;
                }
                changed = visibility.changed(), if watching => {
                    if changed.is_err() {
                        debug!("visibility sender dropped, keeping last state");
                        watching = false;
                        continue;
                    }
                    let now_visible = *visibility.borrow_and_update() == Visibility::Visible;
                    if now_visible && !visible {
                        info!("view visible, resuming refresh");
                        self.refresh_and_report(true, &mut on_refresh).await;
                        ticker.reset();
                    } else if !now_visible && visible {
                        info!("view hidden, pausing refresh");
                    }
                    visible = now_visible;
                }
                else => {
                    // Hidden with nobody left to un-hide it.
                    std::future::pending::<()>().await;
                }
            }
        }
    }

    async fn refresh_and_report<F>(&mut self, force: bool, on_refresh: &mut F)
    where
        F: FnMut(&RefreshOutcome),
    {
        match self.refresh(force).await {
            Ok(outcome) => {
                debug!(
                    projects = outcome.snapshot.projects.len(),
                    changed = outcome.changed,
                    forced = force,
                    "refreshed"
                );
                on_refresh(&outcome);
            }
            Err(err) => warn!(error = %err, "refresh failed"),
        }
    }
}
