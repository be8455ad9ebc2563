use thiserror::Error;

pub type Result<T> = std::result::Result<T, CrawlError>;

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("unexpected page structure at {url}: {detail}")]
    Parse { url: String, detail: &'static str },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("a crawl for {year} is already running")]
    AlreadyRunning { year: i64 },

    #[error("crawl worker stopped unexpectedly: {0}")]
    Worker(String),
}

impl CrawlError {
    pub fn fetch(url: &str, reason: impl ToString) -> Self {
        CrawlError::Fetch {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn parse(url: &str, detail: &'static str) -> Self {
        CrawlError::Parse {
            url: url.to_string(),
            detail,
        }
    }
}
