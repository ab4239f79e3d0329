use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("http status {0}")]
    Status(u16),
    #[error("not an html document (content-type: {0})")]
    NotHtml(String),
    #[error("cannot read url list {path}: {message}")]
    Input { path: PathBuf, message: String },
    #[error("cannot write report {path}: {message}")]
    Report { path: PathBuf, message: String },
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchRequest {
    pub url: String,
    /// Timeout for the whole request (connect + body).
    pub timeout_ms: Option<u64>,
    /// Hard cap on bytes read from the response body.
    pub max_bytes: Option<u64>,
}

impl FetchRequest {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn parsed_url(&self) -> Result<url::Url> {
        url::Url::parse(self.url.trim()).map_err(|e| Error::InvalidUrl(format!("{}: {e}", self.url)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResponse {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
    pub truncated: bool,
}

impl FetchResponse {
    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes).to_string()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// True unless the server declared a content type that is clearly not an HTML document.
    /// A missing content type is given the benefit of the doubt.
    pub fn is_html(&self) -> bool {
        let Some(ct) = self.content_type.as_deref() else {
            return true;
        };
        let mime = ct
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        mime.is_empty() || mime == "text/html" || mime == "application/xhtml+xml"
    }
}

#[async_trait::async_trait]
pub trait FetchBackend: Send + Sync {
    async fn fetch(&self, req: &FetchRequest) -> Result<FetchResponse>;
}

/// Outcome of a best-effort page fetch. Failures are values, never propagated.
#[derive(Debug)]
pub enum FetchOutcome {
    /// `truncated` is set when the body hit the byte cap and `html` is only its prefix.
    Fetched { html: String, truncated: bool },
    Failed { cause: Error },
}

impl FetchOutcome {
    pub fn html(&self) -> Option<&str> {
        match self {
            Self::Fetched { html, .. } => Some(html),
            Self::Failed { .. } => None,
        }
    }
}

/// One input URL with the text extracted from its page.
///
/// `index` is the position of the URL in the input list; it is also the row/column of the page
/// in the similarity matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    pub index: usize,
    pub url: String,
    pub title: String,
    /// Pipe-joined (`" | "`) text of every `<h1>`.
    pub h1: String,
    pub h2: String,
    pub h3: String,
    /// `title h1 h2 h3 paragraphs`, space-joined. This is what gets vectorized.
    pub full_content: String,
}

impl PageRecord {
    /// Record for a page whose fetch failed: every text field empty.
    pub fn empty(index: usize, url: impl Into<String>) -> Self {
        Self {
            index,
            url: url.into(),
            title: String::new(),
            h1: String::new(),
            h2: String::new(),
            h3: String::new(),
            full_content: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReportPolicy {
    /// Unordered pairs, each reported once with `i < j`.
    #[default]
    Pairs,
    /// Directed matches: every `(main, matched)` with `i != j`.
    Groups,
}

impl ReportPolicy {
    pub fn default_threshold(self) -> f64 {
        match self {
            Self::Pairs => 0.3,
            Self::Groups => 0.7,
        }
    }

    pub fn default_output(self) -> &'static str {
        match self {
            Self::Pairs => "cannibalization_report.csv",
            Self::Groups => "cannibalization_group_report.csv",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pairs => "pairs",
            Self::Groups => "groups",
        }
    }
}

impl fmt::Display for ReportPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReportShape {
    /// URL, title and H1 for both pages.
    #[default]
    Detailed,
    /// Bare URLs and score (pairs policy only).
    Simple,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub policy: ReportPolicy,
    /// Strict lower bound on reported similarity. `None` means the policy default.
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub report_shape: ReportShape,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
    /// Number of fetches in flight at once. 1 reproduces a strictly sequential run.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_timeout_ms() -> u64 {
    15_000
}

fn default_max_bytes() -> u64 {
    5_000_000
}

fn default_concurrency() -> usize {
    1
}

fn default_user_agent() -> String {
    "kwcannibal/0.1".to_string()
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            policy: ReportPolicy::default(),
            threshold: None,
            report_shape: ReportShape::default(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
            concurrency: default_concurrency(),
            user_agent: default_user_agent(),
        }
    }
}

impl AnalysisConfig {
    pub fn effective_threshold(&self) -> f64 {
        self.threshold
            .unwrap_or_else(|| self.policy.default_threshold())
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(t) = self.threshold {
            if !t.is_finite() || !(0.0..=1.0).contains(&t) {
                return Err(Error::Config(format!("threshold must be within [0, 1], got {t}")));
            }
        }
        if self.concurrency == 0 {
            return Err(Error::Config("concurrency must be at least 1".to_string()));
        }
        if self.timeout_ms == 0 {
            return Err(Error::Config("timeout_ms must be positive".to_string()));
        }
        if self.policy == ReportPolicy::Groups && self.report_shape == ReportShape::Simple {
            return Err(Error::Config(
                "the simple report shape only exists for the pairs policy".to_string(),
            ));
        }
        Ok(())
    }

    pub fn fetch_request(&self, url: &str) -> FetchRequest {
        FetchRequest {
            url: url.to_string(),
            timeout_ms: Some(self.timeout_ms),
            max_bytes: Some(self.max_bytes),
        }
    }
}

/// Milestones and failures observed while running an analysis.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    UrlsLoaded { count: usize },
    FetchFailed { index: usize, url: String, cause: String },
    PageTruncated { index: usize, url: String, max_bytes: u64 },
    AnalysisStarted { pages: usize },
    PairsFound { count: usize, policy: ReportPolicy },
    ReportSaved { path: PathBuf },
}

/// Sink for pipeline events. Components receive one explicitly instead of logging globally.
pub trait Observer: Send + Sync {
    fn on_event(&self, event: &PipelineEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl Observer for NullObserver {
    fn on_event(&self, _event: &PipelineEvent) {}
}
