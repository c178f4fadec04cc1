use crate::config::CrawlConfig;
use crate::crawlers::fetch::Fetch;
use crate::crawlers::session::{Claim, CrawlSession, CrawlStats, FrontierEntry};
use crate::error::{CrawlError, FailureReason, FetchError, UrlFailure};
use crate::normalizer::normalize;
use crate::parsers::detail::extract_detail;
use crate::parsers::listing::{CompiledListingSelectors, walk_listing_with};
use crate::results::{MarkupDocument, NormalizedRecord, PageKind};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Notify, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use url::Url;

/// How a crawl ended
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CrawlEnd {
    /// The frontier drained
    #[default]
    Completed,
    /// Stopped by the caller, or the record consumer went away
    Cancelled,
    /// The fetch capability failed in a way retries cannot fix
    Aborted(FetchError),
}

/// Totals for a finished crawl
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    pub stats: CrawlStats,
    /// Frontier entries left unprocessed
    pub pending: usize,
    /// Distinct URLs claimed for fetching
    pub visited: usize,
    pub elapsed: Duration,
    pub end: CrawlEnd,
}

/// Everything a crawl produced, gathered by [`CrawlHandle::collect`]
#[derive(Debug)]
pub struct CrawlOutcome {
    pub records: Vec<NormalizedRecord>,
    pub failures: Vec<UrlFailure>,
    /// Terminal error, if the crawl did not complete
    pub error: Option<CrawlError>,
    pub summary: CrawlSummary,
}

/// A running crawl.
///
/// Records arrive on `records` as they are normalized; the last item is an
/// `Err` when the crawl was cancelled or aborted. Per-URL failures arrive on
/// `failures` and may be ignored.
pub struct CrawlHandle {
    pub records: mpsc::Receiver<Result<NormalizedRecord, CrawlError>>,
    pub failures: mpsc::UnboundedReceiver<UrlFailure>,
    cancel: CancellationToken,
    driver: JoinHandle<CrawlSummary>,
}

impl CrawlHandle {
    /// Next record, or `None` once the crawl is over
    pub async fn next_record(&mut self) -> Option<Result<NormalizedRecord, CrawlError>> {
        self.records.recv().await
    }

    /// Ask the crawl to stop after in-flight fetches settle
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Take every failure reported so far without waiting for more
    pub fn drain_failures(&mut self) -> Vec<UrlFailure> {
        let mut failures = Vec::new();
        while let Ok(failure) = self.failures.try_recv() {
            failures.push(failure);
        }
        failures
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the crawl to end. Records not yet read are discarded, which
    /// stops a crawl that is still running.
    pub async fn finish(self) -> CrawlSummary {
        drop(self.records);
        drop(self.failures);
        join_driver(self.driver).await
    }

    /// Drain both streams and wait for the crawl to end
    pub async fn collect(mut self) -> CrawlOutcome {
        let mut records = Vec::new();
        let mut error = None;
        while let Some(item) = self.records.recv().await {
            match item {
                Ok(record) => records.push(record),
                Err(e) => error = Some(e),
            }
        }

        let summary = join_driver(self.driver).await;

        let mut failures = Vec::new();
        while let Some(failure) = self.failures.recv().await {
            failures.push(failure);
        }

        CrawlOutcome {
            records,
            failures,
            error,
            summary,
        }
    }
}

async fn join_driver(driver: JoinHandle<CrawlSummary>) -> CrawlSummary {
    match driver.await {
        Ok(summary) => summary,
        Err(e) => {
            ::log::error!("Crawl driver failed: {}", e);
            CrawlSummary {
                end: CrawlEnd::Cancelled,
                ..CrawlSummary::default()
            }
        }
    }
}

/// State shared by every worker of one crawl
struct WorkerContext {
    fetcher: Arc<dyn Fetch>,
    session: Mutex<CrawlSession>,
    notify: Notify,
    selectors: CompiledListingSelectors,
    records_tx: mpsc::Sender<Result<NormalizedRecord, CrawlError>>,
    failures_tx: mpsc::UnboundedSender<UrlFailure>,
    /// Cancelled by the caller, on a fatal error, or when the consumer leaves
    stop: CancellationToken,
    fatal: std::sync::Mutex<Option<FetchError>>,
    config: CrawlConfig,
}

enum FetchOutcome {
    Fetched(Result<MarkupDocument, FetchError>),
    /// Cancellation arrived and the grace period ran out
    Abandoned,
}

/// Starts a crawl in the background and returns its handle.
///
/// Must be called from within a tokio runtime.
pub fn start(
    start_url: Url,
    config: CrawlConfig,
    fetcher: Arc<dyn Fetch>,
    cancel: CancellationToken,
) -> Result<CrawlHandle, CrawlError> {
    config
        .validate()
        .map_err(|e| CrawlError::InvalidConfig(e.to_string()))?;
    let filter = config
        .url_filter(&start_url)
        .map_err(|e| CrawlError::InvalidConfig(e.to_string()))?;
    let selectors = config
        .listing
        .compile()
        .map_err(|e| CrawlError::InvalidConfig(e.to_string()))?;

    ::log::info!(
        "Starting crawl of {} with {} worker(s), allowed domains: {:?}",
        start_url,
        config.concurrency,
        filter.allowed_domains()
    );

    let (records_tx, records_rx) = mpsc::channel(config.channel_capacity);
    let (failures_tx, failures_rx) = mpsc::unbounded_channel();

    let ctx = Arc::new(WorkerContext {
        fetcher,
        session: Mutex::new(CrawlSession::new(start_url, filter)),
        notify: Notify::new(),
        selectors,
        records_tx,
        failures_tx,
        stop: cancel.child_token(),
        fatal: std::sync::Mutex::new(None),
        config,
    });

    let driver = tokio::spawn(drive(ctx));

    Ok(CrawlHandle {
        records: records_rx,
        failures: failures_rx,
        cancel,
        driver,
    })
}

/// Runs the workers to completion and reports how the crawl ended
async fn drive(ctx: Arc<WorkerContext>) -> CrawlSummary {
    let started = Instant::now();

    let mut workers = JoinSet::new();
    for worker_id in 0..ctx.config.concurrency {
        workers.spawn(run_worker(worker_id, Arc::clone(&ctx)));
    }

    let mut completed_workers = 0;
    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok(()) => {
                completed_workers += 1;
                ::log::debug!(
                    "Worker completed. {} of {} workers done.",
                    completed_workers,
                    ctx.config.concurrency
                );
            }
            Err(e) => {
                ::log::error!("Crawl worker failed: {}", e);
                ctx.stop.cancel();
            }
        }
    }

    let fatal = ctx.fatal.lock().ok().and_then(|mut fatal| fatal.take());
    let summary = {
        let session = ctx.session.lock().await;
        let end = match fatal {
            Some(error) => CrawlEnd::Aborted(error),
            None if session.is_drained() => CrawlEnd::Completed,
            None => CrawlEnd::Cancelled,
        };
        CrawlSummary {
            stats: session.stats.clone(),
            pending: session.pending(),
            visited: session.visited_count(),
            elapsed: started.elapsed(),
            end,
        }
    };

    let terminal = match &summary.end {
        CrawlEnd::Completed => None,
        CrawlEnd::Cancelled => Some(CrawlError::Cancelled),
        CrawlEnd::Aborted(error) => Some(CrawlError::Fatal(error.clone())),
    };
    if let Some(error) = terminal {
        ::log::warn!("Crawl ended early: {}", error);
        // The consumer may already be gone
        let _ = ctx.records_tx.send(Err(error)).await;
    }

    ::log::info!(
        "Crawl finished - {} records from {} pages in {:.2} seconds ({} dropped, {} failed, {} pending)",
        summary.stats.records_emitted,
        summary.stats.pages_fetched,
        summary.elapsed.as_secs_f64(),
        summary.stats.records_dropped,
        summary.stats.urls_failed,
        summary.pending
    );

    summary
}

/// Main processing loop for a worker
///
/// Claims frontier entries until the crawl drains or is stopped.
async fn run_worker(worker_id: usize, ctx: Arc<WorkerContext>) {
    ::log::trace!("Worker {} starting processing loop", worker_id);

    loop {
        // Register for wakeups before looking at the frontier so a
        // notification between the check and the wait is not lost
        let notified = ctx.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if ctx.stop.is_cancelled() {
            ::log::debug!("Worker {} stopping on cancellation", worker_id);
            break;
        }

        let claim = ctx.session.lock().await.claim();
        let entry = match claim {
            Claim::Entry(entry) => entry,
            Claim::Wait => {
                tokio::select! {
                    _ = &mut notified => continue,
                    _ = ctx.stop.cancelled() => break,
                }
            }
            Claim::Done => {
                ctx.notify.notify_waiters();
                break;
            }
        };

        process_entry(worker_id, &ctx, entry).await;
        ctx.notify.notify_waiters();
    }

    ::log::debug!("Worker {} completed processing loop", worker_id);
}

async fn process_entry(worker_id: usize, ctx: &WorkerContext, entry: FrontierEntry) {
    ::log::debug!(
        "Worker {} fetching {} page {} (attempt {})",
        worker_id,
        entry.kind,
        entry.url,
        entry.attempt + 1
    );

    let document = match fetch_page(ctx, &entry.url).await {
        FetchOutcome::Fetched(Ok(document)) => document,
        FetchOutcome::Fetched(Err(error)) => {
            handle_fetch_error(worker_id, ctx, entry, error).await;
            return;
        }
        FetchOutcome::Abandoned => {
            ::log::warn!("Worker {} abandoned in-flight fetch of {}", worker_id, entry.url);
            ctx.session.lock().await.release(entry);
            return;
        }
    };

    ctx.session.lock().await.stats.pages_fetched += 1;

    match entry.kind {
        PageKind::Listing => process_listing(worker_id, ctx, &document).await,
        PageKind::Detail => process_detail(worker_id, ctx, &entry, &document).await,
    }

    ctx.session.lock().await.complete();
}

/// Fetch with the per-fetch timeout, giving an in-flight fetch the
/// shutdown grace period once the crawl is stopped
async fn fetch_page(ctx: &WorkerContext, url: &Url) -> FetchOutcome {
    let fetch = tokio::time::timeout(ctx.config.fetch_timeout(), ctx.fetcher.fetch(url));
    tokio::pin!(fetch);

    tokio::select! {
        biased;
        result = &mut fetch => {
            FetchOutcome::Fetched(result.unwrap_or_else(|_| Err(FetchError::Timeout)))
        }
        _ = ctx.stop.cancelled() => {
            match tokio::time::timeout(ctx.config.shutdown_grace(), &mut fetch).await {
                Ok(result) => FetchOutcome::Fetched(result.unwrap_or_else(|_| Err(FetchError::Timeout))),
                Err(_) => FetchOutcome::Abandoned,
            }
        }
    }
}

async fn handle_fetch_error(
    worker_id: usize,
    ctx: &WorkerContext,
    entry: FrontierEntry,
    error: FetchError,
) {
    if !error.is_retryable() {
        ::log::error!(
            "Worker {} hit an unrecoverable fetch error on {}: {}",
            worker_id,
            entry.url,
            error
        );
        if let Ok(mut fatal) = ctx.fatal.lock() {
            fatal.get_or_insert(error);
        }
        ctx.stop.cancel();
        ctx.session.lock().await.release(entry);
        return;
    }

    let attempts = entry.attempt + 1;
    if entry.attempt < ctx.config.max_retries {
        ::log::warn!(
            "Fetch of {} failed (attempt {} of {}): {}",
            entry.url,
            attempts,
            ctx.config.max_retries + 1,
            error
        );
        let backoff = ctx.config.retry_backoff(attempts);
        if !backoff.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(backoff) => {}
                _ = ctx.stop.cancelled() => {}
            }
        }
        ctx.session.lock().await.requeue(entry);
        return;
    }

    ::log::error!("Giving up on {} after {} attempts: {}", entry.url, attempts, error);
    {
        let mut session = ctx.session.lock().await;
        session.stats.urls_failed += 1;
        session.complete();
    }
    report_failure(
        ctx,
        entry.url,
        entry.kind,
        FailureReason::Fetch { attempts, error },
    );
}

async fn process_listing(worker_id: usize, ctx: &WorkerContext, document: &MarkupDocument) {
    let listing = walk_listing_with(document, &document.url, &ctx.selectors);
    ::log::info!(
        "Worker {} found {} detail links in {}",
        worker_id,
        listing.detail_urls.len(),
        document.url
    );

    let mut session = ctx.session.lock().await;
    for url in listing.detail_urls {
        session.enqueue(url, PageKind::Detail);
    }
    if let Some(next_page) = listing.next_page {
        session.enqueue(next_page, PageKind::Listing);
    }
}

async fn process_detail(
    worker_id: usize,
    ctx: &WorkerContext,
    entry: &FrontierEntry,
    document: &MarkupDocument,
) {
    let result = extract_detail(document)
        .map_err(FailureReason::from)
        .and_then(|raw| normalize(raw).map_err(FailureReason::from));

    let record = match result {
        Ok(record) => record,
        Err(reason) => {
            ::log::warn!("Dropping record from {}: {}", entry.url, reason);
            ctx.session.lock().await.stats.records_dropped += 1;
            report_failure(ctx, entry.url.clone(), PageKind::Detail, reason);
            return;
        }
    };

    if !ctx.session.lock().await.mark_emitted(&record.url) {
        ::log::debug!("Worker {} skipping duplicate record for {}", worker_id, record.url);
        ctx.session.lock().await.stats.duplicates_skipped += 1;
        return;
    }

    if ctx.records_tx.send(Ok(record)).await.is_err() {
        ::log::warn!("Record consumer went away, stopping crawl");
        ctx.stop.cancel();
        return;
    }
    ctx.session.lock().await.stats.records_emitted += 1;
}

fn report_failure(ctx: &WorkerContext, url: Url, kind: PageKind, reason: FailureReason) {
    // Nobody is obliged to listen for failures
    let _ = ctx.failures_tx.send(UrlFailure { url, kind, reason });
}
