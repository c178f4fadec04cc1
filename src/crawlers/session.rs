//! Mutable state of one crawl run.
//!
//! A session is created per crawl, shared by the workers behind a single
//! lock, and dropped when the crawl ends. Nothing here is global.

use crate::filter::UrlFilter;
use crate::results::PageKind;
use std::collections::{HashSet, VecDeque};
use url::Url;

/// A discovered URL waiting to be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub url: Url,
    pub kind: PageKind,
    /// Previous failed fetches of this URL; 0 for a fresh discovery
    pub attempt: u32,
}

impl FrontierEntry {
    pub fn new(url: Url, kind: PageKind) -> Self {
        Self {
            url,
            kind,
            attempt: 0,
        }
    }
}

/// Result of asking the session for work
#[derive(Debug, PartialEq, Eq)]
pub enum Claim {
    /// Fetch this entry; it now counts as in flight
    Entry(FrontierEntry),
    /// Nothing queued, but in-flight work may still discover more
    Wait,
    /// Frontier empty and nothing in flight
    Done,
}

/// Counters reported at the end of a crawl
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStats {
    pub fetch_attempts: usize,
    pub pages_fetched: usize,
    pub records_emitted: usize,
    pub records_dropped: usize,
    pub urls_failed: usize,
    pub urls_skipped: usize,
    pub duplicates_skipped: usize,
}

#[derive(Debug)]
pub struct CrawlSession {
    frontier: VecDeque<FrontierEntry>,
    visited: HashSet<Url>,
    emitted: HashSet<Url>,
    in_flight: usize,
    filter: UrlFilter,
    pub stats: CrawlStats,
}

impl CrawlSession {
    /// Start a session whose frontier holds only the start listing page
    pub fn new(start_url: Url, filter: UrlFilter) -> Self {
        let mut session = Self {
            frontier: VecDeque::new(),
            visited: HashSet::new(),
            emitted: HashSet::new(),
            in_flight: 0,
            filter,
            stats: CrawlStats::default(),
        };
        session.enqueue(start_url, PageKind::Listing);
        session
    }

    /// Queue a discovered URL. Returns false if it was already visited.
    pub fn enqueue(&mut self, url: Url, kind: PageKind) -> bool {
        let url = self.filter.normalize_url(&url);
        if self.visited.contains(&url) {
            ::log::trace!("Skipping already visited link: {}", url);
            self.stats.duplicates_skipped += 1;
            return false;
        }
        ::log::debug!("Queuing {} link: {}", kind, url);
        self.frontier.push_back(FrontierEntry::new(url, kind));
        true
    }

    /// Take the next fetchable entry in FIFO order.
    ///
    /// Fresh entries whose URL was already claimed, and entries outside the
    /// allowed domains, are discarded on the way. The claimed URL is marked
    /// visited, so the first claimant wins.
    pub fn claim(&mut self) -> Claim {
        while let Some(entry) = self.frontier.pop_front() {
            if entry.attempt == 0 {
                if self.visited.contains(&entry.url) {
                    ::log::trace!("Dropping duplicate frontier entry: {}", entry.url);
                    self.stats.duplicates_skipped += 1;
                    continue;
                }
                if !self.filter.should_crawl(&entry.url) {
                    ::log::debug!("URL filter rejected: {}", entry.url);
                    self.stats.urls_skipped += 1;
                    continue;
                }
                self.visited.insert(entry.url.clone());
            }
            self.in_flight += 1;
            self.stats.fetch_attempts += 1;
            return Claim::Entry(entry);
        }

        if self.in_flight == 0 { Claim::Done } else { Claim::Wait }
    }

    /// Finish an in-flight entry, whatever its outcome
    pub fn complete(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    /// Put a failed entry back at the end of the frontier for another attempt
    pub fn requeue(&mut self, mut entry: FrontierEntry) {
        entry.attempt += 1;
        self.frontier.push_back(entry);
        self.complete();
    }

    /// Return an entry that was claimed but never processed
    pub fn release(&mut self, entry: FrontierEntry) {
        if entry.attempt == 0 {
            self.visited.remove(&entry.url);
        }
        self.frontier.push_front(entry);
        self.complete();
    }

    /// Record a URL as emitted. Returns false if a record for it already went out.
    pub fn mark_emitted(&mut self, url: &Url) -> bool {
        self.emitted.insert(url.clone())
    }

    /// Entries still waiting in the frontier
    pub fn pending(&self) -> usize {
        self.frontier.len()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    pub fn is_drained(&self) -> bool {
        self.frontier.is_empty() && self.in_flight == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn session() -> CrawlSession {
        CrawlSession::new(
            url("https://books.toscrape.com/"),
            UrlFilter::for_domains(["books.toscrape.com"]),
        )
    }

    fn claim_entry(session: &mut CrawlSession) -> FrontierEntry {
        match session.claim() {
            Claim::Entry(entry) => entry,
            other => panic!("expected an entry, got {:?}", other),
        }
    }

    #[test]
    fn test_starts_with_listing_entry() {
        let mut session = session();
        assert_eq!(session.pending(), 1);
        let entry = claim_entry(&mut session);
        assert_eq!(entry.kind, PageKind::Listing);
        assert_eq!(session.in_flight(), 1);
        assert_eq!(session.claim(), Claim::Wait);
        session.complete();
        assert_eq!(session.claim(), Claim::Done);
        assert!(session.is_drained());
    }

    #[test]
    fn test_fifo_order() {
        let mut session = session();
        let _start = claim_entry(&mut session);
        session.enqueue(url("https://books.toscrape.com/a"), PageKind::Detail);
        session.enqueue(url("https://books.toscrape.com/b"), PageKind::Detail);
        session.enqueue(url("https://books.toscrape.com/page-2"), PageKind::Listing);
        session.complete();

        let order: Vec<String> = (0..3)
            .map(|_| claim_entry(&mut session).url.path().to_string())
            .collect();
        assert_eq!(order, vec!["/a", "/b", "/page-2"]);
    }

    #[test]
    fn test_duplicates_claimed_once() {
        let mut session = session();
        let _start = claim_entry(&mut session);
        assert!(session.enqueue(url("https://books.toscrape.com/a"), PageKind::Detail));
        assert!(session.enqueue(url("https://books.toscrape.com/a#top"), PageKind::Detail));
        session.complete();

        let first = claim_entry(&mut session);
        assert_eq!(first.url.as_str(), "https://books.toscrape.com/a");
        // The queued copy is discarded once the first claim marked it visited
        assert_eq!(session.claim(), Claim::Wait);
        session.complete();
        assert_eq!(session.claim(), Claim::Done);
        assert_eq!(session.stats.duplicates_skipped, 1);

        assert!(!session.enqueue(url("https://books.toscrape.com/a"), PageKind::Detail));
    }

    #[test]
    fn test_foreign_domain_skipped() {
        let mut session = session();
        let _start = claim_entry(&mut session);
        session.enqueue(url("https://other.com/book"), PageKind::Detail);
        session.complete();

        assert_eq!(session.claim(), Claim::Done);
        assert_eq!(session.stats.urls_skipped, 1);
        assert_eq!(session.stats.fetch_attempts, 1);
    }

    #[test]
    fn test_requeued_entry_bypasses_visited_check() {
        let mut session = session();
        let start = claim_entry(&mut session);
        session.requeue(start);

        let retry = claim_entry(&mut session);
        assert_eq!(retry.attempt, 1);
        assert_eq!(retry.url.as_str(), "https://books.toscrape.com/");
        assert_eq!(session.stats.fetch_attempts, 2);
    }

    #[test]
    fn test_released_entry_goes_to_front() {
        let mut session = session();
        let start = claim_entry(&mut session);
        session.enqueue(url("https://books.toscrape.com/a"), PageKind::Detail);
        session.release(start);
        assert_eq!(session.pending(), 2);
        assert_eq!(session.in_flight(), 0);
        assert_eq!(claim_entry(&mut session).kind, PageKind::Listing);
    }

    #[test]
    fn test_emitted_urls_unique() {
        let mut session = session();
        let book = url("https://books.toscrape.com/a");
        assert!(session.mark_emitted(&book));
        assert!(!session.mark_emitted(&book));
    }
}
