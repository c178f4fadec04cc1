use crate::results::{Field, PageKind};
use thiserror::Error;
use url::Url;

/// Failure to retrieve a page
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("fetch timed out")]
    Timeout,

    #[error("server responded with status {0}")]
    Status(u16),

    #[error("network error: {0}")]
    Network(String),

    /// The fetch capability itself is unusable; retrying cannot help
    #[error("fetcher misconfigured: {0}")]
    Configuration(String),
}

impl FetchError {
    /// Whether another attempt at the same URL may succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FetchError::Configuration(_))
    }
}

/// A required selector found nothing on a detail page
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("required field `{field}` not found on {url}")]
    MissingField { field: Field, url: Url },

    #[error("invalid selector `{0}`")]
    InvalidSelector(String),
}

/// A raw field could not be turned into its typed value
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NormalizationError {
    #[error("required field `{0}` is missing")]
    Missing(Field),

    #[error("field `{field}` has invalid value {value:?}: {reason}")]
    Invalid {
        field: Field,
        value: String,
        reason: String,
    },
}

impl NormalizationError {
    pub(crate) fn invalid(field: Field, value: &str, reason: impl Into<String>) -> Self {
        NormalizationError::Invalid {
            field,
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// The field that failed
    pub fn field(&self) -> Field {
        match self {
            NormalizationError::Missing(field) => *field,
            NormalizationError::Invalid { field, .. } => *field,
        }
    }
}

/// Terminal failure of a crawl, delivered as the last item of the record stream
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CrawlError {
    #[error("crawl cancelled")]
    Cancelled,

    #[error("crawl aborted: {0}")]
    Fatal(FetchError),

    #[error("invalid start URL `{0}`")]
    InvalidStartUrl(String),

    #[error("invalid crawl configuration: {0}")]
    InvalidConfig(String),
}

/// Problems loading or validating a crawl configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid URL pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("invalid selector `{0}`")]
    Selector(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Why a URL produced no record
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FailureReason {
    /// Fetching kept failing after all retries
    #[error("gave up after {attempts} attempts: {error}")]
    Fetch { attempts: u32, error: FetchError },

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Normalization(#[from] NormalizationError),
}

/// A per-URL failure reported alongside the record stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlFailure {
    pub url: Url,
    pub kind: PageKind,
    pub reason: FailureReason,
}

impl std::fmt::Display for UrlFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} page {}: {}", self.kind, self.url, self.reason)
    }
}
