//! Error types for fetching, analysis and downloads

use std::path::PathBuf;

/// A request could not be completed through any relay
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("network failure fetching {url} ({attempts} relay attempt(s) failed)")]
    NetworkFailure { url: String, attempts: usize },
}

impl FetchError {
    pub fn url(&self) -> &str {
        match self {
            FetchError::NetworkFailure { url, .. } => url,
        }
    }
}

/// Failure classification for a page analysis
#[derive(Debug, thiserror::Error)]
pub enum AnalyzeError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("could not fetch page: {0}")]
    FetchFailure(#[from] FetchError),

    #[error("bot protection detected on {url} (marker: {marker})")]
    BotProtectionDetected { url: String, marker: String },

    #[error("no fonts found on {url}")]
    NoFontsFound { url: String },
}

impl AnalyzeError {
    /// True for "fetched fine, nothing there", which is not a pipeline failure
    pub fn is_empty_result(&self) -> bool {
        matches!(self, AnalyzeError::NoFontsFound { .. })
    }

    /// Short message for end users
    pub fn user_message(&self) -> String {
        match self {
            AnalyzeError::InvalidUrl(url) => {
                format!("'{}' is not a valid URL. Check it and try again.", url)
            }
            AnalyzeError::FetchFailure(_) => {
                "Could not reach that page. Check the URL or try again in a moment.".to_string()
            }
            AnalyzeError::BotProtectionDetected { .. } => {
                "That site is behind bot protection. Try again later or another page.".to_string()
            }
            AnalyzeError::NoFontsFound { .. } => "No fonts found.".to_string(),
        }
    }
}

/// Failure downloading a font variant
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("{family} {weight} has no downloadable URL")]
    NoBinaryUrl { family: String, weight: String },

    #[error("{family} {weight} has a malformed inline data: URL")]
    InvalidDataUrl { family: String, weight: String },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
