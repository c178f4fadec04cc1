use crate::crawlers::fetch::Fetch;
use crate::error::FetchError;
use crate::parsers::{compile_selector, element_text};
use crate::results::MarkupDocument;
use async_trait::async_trait;
use fantoccini::{Client, ClientBuilder};
use scraper::Html;
use tokio::sync::Mutex;
use url::Url;

/// Common local WebDriver endpoints tried when the configured one is down
const FALLBACK_URLS: [&str; 4] = [
    "http://localhost:9515", // ChromeDriver default
    "http://localhost:4723", // Appium default
    "http://localhost:9222", // Chrome debug port default
    "http://127.0.0.1:4444", // Try with IP instead of localhost
];

/// Fetches pages through WebDriver sessions.
///
/// A session navigates one page at a time, so idle sessions are pooled and
/// a new one is opened whenever every pooled session is busy.
///
/// WebDriver does not expose HTTP status codes. A page titled like a stock
/// server error page, such as `404 Not Found` or `502 Bad Gateway`, is
/// reported as a [`FetchError::Status`] so it is retried. Error pages with
/// other titles come back as documents and fail extraction instead.
pub struct WebDriverFetcher {
    webdriver_url: String,
    idle: Mutex<Vec<Client>>,
}

impl WebDriverFetcher {
    pub fn new(webdriver_url: impl Into<String>) -> Self {
        Self {
            webdriver_url: webdriver_url.into(),
            idle: Mutex::new(Vec::new()),
        }
    }

    /// Close every pooled session
    pub async fn close(&self) {
        let clients = std::mem::take(&mut *self.idle.lock().await);
        for client in clients {
            if let Err(e) = client.close().await {
                ::log::warn!("Failed to close WebDriver session: {}", e);
            }
        }
    }

    async fn checkout(&self) -> Result<Client, FetchError> {
        if let Some(client) = self.idle.lock().await.pop() {
            return Ok(client);
        }
        self.connect().await
    }

    async fn checkin(&self, client: Client) {
        self.idle.lock().await.push(client);
    }

    /// Connects to the WebDriver instance, trying well-known fallbacks
    async fn connect(&self) -> Result<Client, FetchError> {
        match ClientBuilder::native().connect(&self.webdriver_url).await {
            Ok(client) => {
                ::log::debug!("Connected to WebDriver at {}", self.webdriver_url);
                return Ok(client);
            }
            Err(e) => {
                ::log::error!(
                    "Failed to connect to WebDriver at {}: {}",
                    self.webdriver_url,
                    e
                );
            }
        }

        for url in FALLBACK_URLS.iter() {
            if *url == self.webdriver_url {
                continue;
            }
            ::log::info!("Trying fallback WebDriver URL: {}", url);
            if let Ok(client) = ClientBuilder::native().connect(url).await {
                ::log::debug!("Connected to fallback WebDriver at {}", url);
                return Ok(client);
            }
        }

        ::log::error!(
            "Make sure a WebDriver server is running or set the WEBDRIVER_URL environment variable"
        );
        Err(FetchError::Configuration(format!(
            "no WebDriver server reachable at {}",
            self.webdriver_url
        )))
    }

    async fn navigate(client: &Client, url: &Url) -> Result<MarkupDocument, fantoccini::error::CmdError> {
        client.goto(url.as_str()).await?;
        let source = client.source().await?;
        let final_url = client.current_url().await?;
        Ok(MarkupDocument::new(final_url, source))
    }
}

#[async_trait]
impl Fetch for WebDriverFetcher {
    async fn fetch(&self, url: &Url) -> Result<MarkupDocument, FetchError> {
        let client = self.checkout().await?;

        match Self::navigate(&client, url).await {
            Ok(document) => {
                self.checkin(client).await;
                if let Some(status) = error_page_status(&document.source) {
                    ::log::warn!("{} served an error page with status {}", url, status);
                    return Err(FetchError::Status(status));
                }
                Ok(document)
            }
            Err(e) => {
                let message = e.to_string();
                if is_lost_session(&message) {
                    // Drop the dead session; the next attempt opens a fresh one
                    ::log::warn!("Lost WebDriver session while fetching {}", url);
                } else {
                    ::log::error!("Failed to fetch {}: {}", url, message);
                    self.checkin(client).await;
                }
                Err(FetchError::Network(message))
            }
        }
    }
}

/// Reason phrases that follow the status code in stock error page titles
const ERROR_REASONS: [&str; 10] = [
    "bad request",
    "unauthorized",
    "forbidden",
    "not found",
    "too many requests",
    "internal server error",
    "bad gateway",
    "service unavailable",
    "service temporarily unavailable",
    "gateway timeout",
];

/// Status code announced by an error page's title, if any
fn error_page_status(source: &str) -> Option<u16> {
    let selector = compile_selector("title").ok()?;
    let document = Html::parse_document(source);
    let title = document.select(&selector).next().map(element_text)?;
    let (code, reason) = title.split_once(' ')?;
    let status = code.parse::<u16>().ok()?;
    let reason = reason.to_lowercase();
    let known = ERROR_REASONS.iter().any(|phrase| reason.starts_with(phrase));
    ((400..600).contains(&status) && known).then_some(status)
}

fn is_lost_session(message: &str) -> bool {
    message.contains("Unable to find session") || message.contains("invalid session id")
}
