//! Export configuration and localized labels

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::time::Duration;

/// Default per-request timeout for attachment downloads
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Default deflate level, balancing speed and size
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// `F j, Y g:i a`
pub const DEFAULT_DATE_FORMAT: &str = "%B %-d, %Y %-I:%M %P";

/// User-facing strings written into the workbook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Labels {
    pub submissions_sheet: String,
    pub attachments_sheet: String,
    pub submission_date: String,
    pub no_submissions: String,
    /// Headers of the attachment log: row, column, original URL, embedded part
    pub attachment_headers: [String; 4],
    pub download_failed: String,
    pub title_prefix: String,
}

impl Default for Labels {
    fn default() -> Self {
        Labels {
            submissions_sheet: "Submissions".to_string(),
            attachments_sheet: "Attachments".to_string(),
            submission_date: "Submission Date".to_string(),
            no_submissions: "No submissions available for this form.".to_string(),
            attachment_headers: [
                "Row".to_string(),
                "Column".to_string(),
                "Original URL".to_string(),
                "Embedded Part".to_string(),
            ],
            download_failed: "Download failed".to_string(),
            title_prefix: "Submissions Export".to_string(),
        }
    }
}

/// Where uploaded files live on disk and how they are served.
///
/// Used to turn stored file paths into public URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRoot {
    pub base_dir: PathBuf,
    pub base_url: String,
}

impl UploadRoot {
    pub fn new(base_dir: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        UploadRoot {
            base_dir: base_dir.into(),
            base_url: base_url.into(),
        }
    }
}

/// Options for one export
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub labels: Labels,
    /// chrono format string for the submission date column
    pub date_format: String,
    pub creator: Option<String>,
    pub company: Option<String>,
    pub application: String,
    /// Fixed document timestamp; `None` uses the current time
    pub created_at: Option<DateTime<Utc>>,
    /// Deflate level 0-9
    pub compression_level: u32,
    pub fetch_timeout: Duration,
    /// Extra attempts after a failed download (at most 1)
    pub fetch_retries: u32,
    pub uploads: Option<UploadRoot>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        ExportOptions {
            labels: Labels::default(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            creator: None,
            company: None,
            application: "formsheet".to_string(),
            created_at: None,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            fetch_retries: 0,
            uploads: None,
        }
    }
}

impl ExportOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `FORMSHEET_*` environment variables.
    ///
    /// Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut options = Self::default();

        if let Some(secs) = env_parse::<u64>("FORMSHEET_FETCH_TIMEOUT_SECS") {
            options.fetch_timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = env_parse::<u32>("FORMSHEET_FETCH_RETRIES") {
            options = options.with_fetch_retries(retries);
        }
        if let Some(level) = env_parse::<u32>("FORMSHEET_COMPRESSION_LEVEL") {
            options = options.with_compression_level(level);
        }
        if let Ok(format) = std::env::var("FORMSHEET_DATE_FORMAT") {
            if !format.trim().is_empty() {
                options.date_format = format;
            }
        }

        options
    }

    pub fn with_labels(mut self, labels: Labels) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_date_format(mut self, format: impl Into<String>) -> Self {
        self.date_format = format.into();
        self
    }

    pub fn with_creator(mut self, creator: impl Into<String>) -> Self {
        self.creator = Some(creator.into());
        self
    }

    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.company = Some(company.into());
        self
    }

    pub fn with_created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }

    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level.min(9);
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_fetch_retries(mut self, retries: u32) -> Self {
        self.fetch_retries = retries.min(1);
        self
    }

    pub fn with_uploads(mut self, uploads: UploadRoot) -> Self {
        self.uploads = Some(uploads);
        self
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}
