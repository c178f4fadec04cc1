use catalog_crawl::{Crawl, CrawlConfig, CrawlEnd, NormalizedRecord, WebDriverFetcher};
use clap::Parser;
use std::error::Error;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

mod args;
use args::Args;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize logging
    env_logger::init();

    // Parse command-line arguments
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => CrawlConfig::from_file(path)?,
        None => CrawlConfig::default(),
    };
    let config = args.apply(config.with_env_overrides());
    let start_url = args.start_url(&config);

    ::log::info!("Starting crawler for URI: {}", start_url);
    ::log::info!("Fetching pages through WebDriver at {}", config.webdriver_url);

    let fetcher = Arc::new(WebDriverFetcher::new(config.webdriver_url.clone()));

    // Ctrl-C stops the crawl cooperatively
    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ::log::warn!("Interrupted, stopping crawl");
            ctrl_c_token.cancel();
        }
    });

    let mut handle = Crawl::new(&start_url)
        .with_config(config)
        .with_cancellation(cancel)
        .start(Arc::clone(&fetcher))?;

    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(std::io::stdout())),
    };

    let mut records_written = 0;
    let mut failures_seen = 0;
    let mut failures_open = true;
    loop {
        tokio::select! {
            record = handle.records.recv() => match record {
                Some(Ok(record)) => {
                    write_record(&mut out, &record)?;
                    records_written += 1;
                }
                Some(Err(e)) => ::log::error!("{}", e),
                None => break,
            },
            failure = handle.failures.recv(), if failures_open => match failure {
                Some(failure) => {
                    failures_seen += 1;
                    ::log::debug!("Failed {}", failure);
                }
                None => failures_open = false,
            },
        }
    }
    out.flush()?;

    // The record stream closes once the crawl is over, so every failure has been sent
    for failure in handle.drain_failures() {
        failures_seen += 1;
        ::log::debug!("Failed {}", failure);
    }

    let summary = handle.finish().await;
    fetcher.close().await;

    ::log::info!(
        "Crawling complete - wrote {} records, {} URLs failed, {} pages fetched in {:.2} seconds",
        records_written,
        failures_seen,
        summary.stats.pages_fetched,
        summary.elapsed.as_secs_f64()
    );

    match summary.end {
        CrawlEnd::Aborted(e) => Err(e.into()),
        CrawlEnd::Completed | CrawlEnd::Cancelled => Ok(()),
    }
}

/// Writes one record as a JSON line
fn write_record(out: &mut dyn Write, record: &NormalizedRecord) -> Result<(), Box<dyn Error>> {
    serde_json::to_writer(&mut *out, record)?;
    out.write_all(b"\n")?;
    Ok(())
}
