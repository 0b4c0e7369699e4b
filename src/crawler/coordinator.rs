//! Crawler coordinator - main crawl orchestration logic
//!
//! The coordinator owns no crawl state of its own beyond counters. Each
//! cycle it claims a batch from the frontier, runs one task per entry
//! (robots check, fetch, extract, enqueue links, mark the entry) and waits
//! for the whole batch before claiming the next one.
//!
//! Per-URL failures stay inside their task and come back as counters. Only
//! frontier and store failures end the run.

use crate::config::Config;
use crate::crawler::extractor::{CandidateLink, Extractor};
use crate::crawler::fetcher::{FetchOutcome, Fetcher};
use crate::crawler::frontier::{EnqueueOutcome, Frontier, FrontierCounts};
use crate::crawler::persister::{PersistTotals, Persister};
use crate::crawler::priority::PriorityPolicy;
use crate::output::{CrawlObserver, LogObserver};
use crate::robots::RobotsCache;
use crate::state::FrontierStatus;
use crate::storage::{
    lock_storage, open_storage, FrontierEntry, RunStatus, RunTotals, SharedStorage, Storage,
};
use crate::url::Normalizer;
use crate::CrawlError;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use url::Url;

/// How a run is started
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Clear the frontier before seeding
    pub fresh: bool,

    /// Stored on the run row
    pub config_hash: Option<String>,
}

/// Lifecycle of a coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlPhase {
    Idle,
    Running,
    /// The last claim came back empty; polling until work shows up or the
    /// empty-poll budget runs out
    Draining,
    Terminated,
}

/// Summary counters of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlCounters {
    /// Entries marked crawled, skipped ones included
    pub crawled: u64,
    /// New frontier entries, seeds included
    pub queued: u64,
    /// Entries crawled without a usable result (404, robots, no content region, ...)
    pub warnings: u64,
    /// Entries marked error
    pub errors: u64,
}

impl CrawlCounters {
    fn absorb(&mut self, outcome: &TaskOutcome) {
        self.queued += outcome.queued;
        match outcome.status {
            FrontierStatus::Error => self.errors += 1,
            _ => self.crawled += 1,
        }
        if outcome.warning {
            self.warnings += 1;
        }
    }
}

impl From<CrawlCounters> for RunTotals {
    fn from(counters: CrawlCounters) -> Self {
        Self {
            crawled: counters.crawled,
            queued: counters.queued,
            warnings: counters.warnings,
            errors: counters.errors,
        }
    }
}

/// Final report of a run
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub run_id: i64,
    pub status: RunStatus,
    pub counters: CrawlCounters,
    /// Frontier state at the end of the run, across all runs sharing the store
    pub frontier: FrontierCounts,
    pub persisted: PersistTotals,
    /// Stored records with at least one term sentence lacking a link
    pub link_opportunities: u64,
    pub elapsed: Duration,
}

/// What one task did with its entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TaskOutcome {
    status: FrontierStatus,
    warning: bool,
    queued: u64,
}

impl TaskOutcome {
    fn crawled(queued: u64) -> Self {
        Self {
            status: FrontierStatus::Crawled,
            warning: false,
            queued,
        }
    }

    fn skipped() -> Self {
        Self {
            status: FrontierStatus::Crawled,
            warning: true,
            queued: 0,
        }
    }

    fn failed() -> Self {
        Self {
            status: FrontierStatus::Error,
            warning: false,
            queued: 0,
        }
    }
}

/// Everything a crawl task needs; cheap to clone
#[derive(Clone)]
struct TaskContext {
    frontier: Frontier,
    fetcher: Fetcher,
    extractor: Arc<Extractor>,
    normalizer: Arc<Normalizer>,
    persister: Arc<Persister>,
    robots: Option<Arc<RobotsCache>>,
    observer: Arc<dyn CrawlObserver>,
    max_depth: Option<u32>,
}

impl TaskContext {
    /// Takes one claimed entry to crawled or error
    ///
    /// Returns `Err` only for failures of the frontier or the store.
    async fn process(self, entry: FrontierEntry) -> Result<TaskOutcome, CrawlError> {
        let url = entry.url.as_str();

        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Unparseable frontier URL {}: {}", url, e);
                self.frontier.mark_error(url)?;
                return Ok(TaskOutcome::failed());
            }
        };

        if let Some(robots) = &self.robots {
            if !robots.is_allowed(&parsed).await {
                tracing::info!("URL {} disallowed by robots.txt", url);
                self.frontier.mark_crawled(url)?;
                return Ok(TaskOutcome::skipped());
            }
        }

        let page = match self.fetcher.fetch(url).await {
            FetchOutcome::Content(page) => page,
            FetchOutcome::NotFound { .. } => {
                tracing::debug!("Not found: {}", url);
                self.frontier.mark_crawled(url)?;
                return Ok(TaskOutcome::skipped());
            }
            FetchOutcome::Failed { error, .. } if error.is_skip() => {
                tracing::warn!("Skipping {}: {}", url, error);
                self.frontier.mark_crawled(url)?;
                return Ok(TaskOutcome::skipped());
            }
            FetchOutcome::Failed { error, attempts } => {
                tracing::warn!("Giving up on {} after {} attempts: {}", url, attempts, error);
                self.frontier.mark_error(url)?;
                return Ok(TaskOutcome::failed());
            }
        };

        if !page.is_html() {
            tracing::debug!(
                "Skipping {}: content type {}",
                url,
                page.content_type.as_deref().unwrap_or("unknown")
            );
            self.frontier.mark_crawled(url)?;
            return Ok(TaskOutcome::skipped());
        }

        let extraction = self
            .extractor
            .extract(&entry.url, &page.final_url, &page.body);

        let mut outcome = TaskOutcome::crawled(0);
        match extraction.record {
            Some(record) => {
                self.observer.on_item(&record);
                self.persister.add_record(record)?;
            }
            None => {
                tracing::warn!("No content region on {}", url);
                outcome.warning = true;
            }
        }

        outcome.queued = self.enqueue_links(&entry, &page.final_url, &extraction.links)?;
        self.frontier.mark_crawled(url)?;

        Ok(outcome)
    }

    /// Normalizes, scopes and enqueues the links found on `entry`
    ///
    /// Returns the number of URLs new to the frontier.
    fn enqueue_links(
        &self,
        entry: &FrontierEntry,
        base: &Url,
        links: &[CandidateLink],
    ) -> Result<u64, CrawlError> {
        let depth = entry.depth + 1;
        if self.max_depth.is_some_and(|max| depth > max) {
            tracing::debug!("Not following links from {} past depth {}", entry.url, entry.depth);
            return Ok(0);
        }

        let mut queued = 0;
        for link in links {
            let canonical = match self.normalizer.normalize(&link.url, Some(base)) {
                Ok(canonical) => canonical,
                Err(e) => {
                    tracing::trace!("Dropping {}: {}", link.url, e);
                    continue;
                }
            };

            self.frontier.record_parameters(&canonical)?;
            if self.frontier.enqueue(&canonical, depth)? == EnqueueOutcome::Inserted {
                queued += 1;
            }
        }

        Ok(queued)
    }
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    storage: SharedStorage,
    ctx: TaskContext,
    run_id: i64,
    phase: CrawlPhase,
    counters: CrawlCounters,
    dispatched: u64,
}

impl Coordinator {
    /// Opens the store named in the configuration and creates a run
    ///
    /// # Arguments
    ///
    /// * `config` - A validated configuration
    /// * `options` - Fresh start and the config hash to record
    pub fn new(config: Config, options: RunOptions) -> Result<Self, CrawlError> {
        let storage = open_storage(Path::new(&config.output.database_path))?;
        Self::with_storage(config, storage, options)
    }

    /// Like [`Coordinator::new`], on an already opened store
    pub fn with_storage(
        config: Config,
        storage: SharedStorage,
        options: RunOptions,
    ) -> Result<Self, CrawlError> {
        let fetcher = Fetcher::from_config(&config)?;
        let robots = config.crawler.respect_robots.then(|| {
            Arc::new(RobotsCache::new(
                fetcher.client().clone(),
                fetcher.permits(),
                config.user_agent.crawler_name.clone(),
            ))
        });

        let ctx = TaskContext {
            frontier: Frontier::new(
                Arc::clone(&storage),
                PriorityPolicy::from_config(&config.priority),
            ),
            fetcher,
            extractor: Arc::new(Extractor::new(&config.extract)?),
            normalizer: Arc::new(Normalizer::from_config(&config.scope)),
            persister: Arc::new(Persister::from_config(Arc::clone(&storage), &config.output)),
            robots,
            observer: Arc::new(LogObserver),
            max_depth: config.crawler.max_depth,
        };

        let run_id = {
            let mut store = lock_storage(&storage)?;
            if options.fresh {
                store.clear_frontier()?;
                tracing::info!("Cleared frontier for a fresh crawl");
            }
            store.create_run(options.config_hash.as_deref().unwrap_or_default())?
        };

        Ok(Self {
            config: Arc::new(config),
            storage,
            ctx,
            run_id,
            phase: CrawlPhase::Idle,
            counters: CrawlCounters::default(),
            dispatched: 0,
        })
    }

    /// Replaces the default logging observer
    pub fn with_observer(mut self, observer: Arc<dyn CrawlObserver>) -> Self {
        self.ctx.observer = observer;
        self
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    pub fn phase(&self) -> CrawlPhase {
        self.phase
    }

    pub fn counters(&self) -> CrawlCounters {
        self.counters
    }

    pub fn frontier(&self) -> &Frontier {
        &self.ctx.frontier
    }

    /// Runs the crawl to completion
    ///
    /// Ends when the URL limit is reached or the frontier stays empty for
    /// `max-empty-polls` consecutive polls. The buffered records are flushed
    /// and the run row completed in every case; a fatal store error is
    /// returned after that.
    pub async fn run(&mut self) -> Result<CrawlReport, CrawlError> {
        if self.phase != CrawlPhase::Idle {
            return Err(CrawlError::Task(format!(
                "run {} has already been started",
                self.run_id
            )));
        }

        tracing::info!("Starting crawl run {}", self.run_id);
        let started = Instant::now();

        let crawled = self.crawl().await;
        self.phase = CrawlPhase::Terminated;
        let flushed = self.ctx.persister.flush();

        let fatal = match (crawled, flushed) {
            (Err(e), flushed) => {
                if let Err(flush_error) = flushed {
                    tracing::error!("Final flush failed: {}", flush_error);
                }
                Some(e)
            }
            (Ok(()), Err(e)) => Some(e),
            (Ok(()), Ok(_)) => None,
        };

        let status = if fatal.is_some() {
            RunStatus::Failed
        } else {
            RunStatus::Completed
        };
        let completed = lock_storage(&self.storage)
            .and_then(|mut store| store.complete_run(self.run_id, status, self.counters.into()));

        if let Some(e) = fatal {
            if let Err(complete_error) = completed {
                tracing::error!("Failed to close run {}: {}", self.run_id, complete_error);
            }
            tracing::error!("Crawl run {} failed: {}", self.run_id, e);
            return Err(e);
        }
        completed?;

        let report = self.report(status, started.elapsed())?;
        self.ctx.observer.on_finish(&report);
        Ok(report)
    }

    async fn crawl(&mut self) -> Result<(), CrawlError> {
        self.seed()?;
        self.phase = CrawlPhase::Running;

        let limit = self.config.crawler.url_limit;
        let batch_size = u64::from(self.config.crawler.batch_size.max(1));
        let max_empty_polls = self.config.crawler.max_empty_polls.max(1);
        let poll_interval = Duration::from_millis(self.config.crawler.poll_interval);
        let started = Instant::now();
        let mut empty_polls = 0;

        while self.dispatched < limit {
            let claim = batch_size.min(limit - self.dispatched) as usize;
            let batch = self.ctx.frontier.dequeue_batch(claim)?;

            if batch.is_empty() {
                empty_polls += 1;
                self.phase = CrawlPhase::Draining;
                if empty_polls >= max_empty_polls {
                    tracing::info!("Frontier exhausted after {} empty polls", empty_polls);
                    return Ok(());
                }
                tracing::debug!(
                    "Frontier empty ({}/{}), polling again in {:?}",
                    empty_polls,
                    max_empty_polls,
                    poll_interval
                );
                tokio::time::sleep(poll_interval).await;
                continue;
            }

            empty_polls = 0;
            self.phase = CrawlPhase::Running;
            self.dispatched += batch.len() as u64;
            self.run_batch(batch).await?;

            tracing::info!(
                "Progress: {} dispatched, {} crawled, {} queued, {:.2} pages/sec",
                self.dispatched,
                self.counters.crawled,
                self.counters.queued,
                self.dispatched as f64 / started.elapsed().as_secs_f64().max(f64::EPSILON)
            );
        }

        tracing::info!("URL limit of {} reached", limit);
        Ok(())
    }

    /// Normalizes the configured seeds and queues them at depth 0
    fn seed(&mut self) -> Result<(), CrawlError> {
        let mut seeds = Vec::with_capacity(self.config.scope.seeds.len());

        for raw in &self.config.scope.seeds {
            let canonical = self.ctx.normalizer.normalize(raw, None)?;
            self.ctx.frontier.record_parameters(&canonical)?;
            if self.ctx.frontier.enqueue(&canonical, 0)? == EnqueueOutcome::Inserted {
                self.counters.queued += 1;
            }
            seeds.push(canonical.to_string());
        }

        let counts = self.ctx.frontier.counts()?;
        if counts.in_progress > 0 {
            tracing::warn!(
                "{} entries are still in progress from an earlier run; \
                 requeue them with --recover-stale if no other crawler is running",
                counts.in_progress
            );
        }
        tracing::info!(
            "Seeded {} URLs, {} pending in frontier",
            seeds.len(),
            counts.pending
        );

        self.ctx.observer.on_start(self.run_id, &seeds);
        Ok(())
    }

    /// Runs one task per entry and waits for all of them
    ///
    /// Every task is awaited even after one fails, so no result of the
    /// batch is lost.
    async fn run_batch(&mut self, batch: Vec<FrontierEntry>) -> Result<(), CrawlError> {
        let mut tasks = JoinSet::new();
        for entry in batch {
            tasks.spawn(self.ctx.clone().process(entry));
        }

        let mut fatal = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(outcome)) => self.counters.absorb(&outcome),
                Ok(Err(e)) => {
                    tracing::error!("Crawl task failed: {}", e);
                    fatal.get_or_insert(e);
                }
                Err(e) => {
                    tracing::error!("Crawl task panicked: {}", e);
                    fatal.get_or_insert(CrawlError::Task(e.to_string()));
                }
            }
        }

        match fatal {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn report(&self, status: RunStatus, elapsed: Duration) -> Result<CrawlReport, CrawlError> {
        let frontier = self.ctx.frontier.counts()?;
        let link_opportunities = lock_storage(&self.storage)?.count_link_opportunities()?;

        Ok(CrawlReport {
            run_id: self.run_id,
            status,
            counters: self.counters,
            frontier,
            persisted: self.ctx.persister.totals()?,
            link_opportunities,
            elapsed,
        })
    }
}
