pub mod fetch;
pub mod orchestrator;
pub mod session;
pub mod webdriver;


pub use fetch::{Fetch, MemoryFetcher};
pub use orchestrator::{CrawlEnd, CrawlHandle, CrawlOutcome, CrawlSummary};
pub use session::{CrawlSession, CrawlStats, FrontierEntry};
pub use webdriver::WebDriverFetcher;
