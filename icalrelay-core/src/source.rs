//! Calendar sources: remote feeds and local files, and merging their
//! events into a document.

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::header::HeaderMap;
use tokio::time::timeout;
use tracing::{debug, error, warn};

use crate::document::{CalendarDocument, Component};
use crate::error::{RelayError, RelayResult};
use crate::ics::parse_calendar;

/// Where a calendar comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// An http, https or webcal URL
    Url(String),
    File(PathBuf),
    /// Nothing: the empty template
    Empty,
}

impl Source {
    /// Classify a configured source string. URLs are recognised by scheme,
    /// anything else non-empty is a local path.
    pub fn parse(source: &str) -> Self {
        let source = source.trim();
        if source.is_empty() {
            Source::Empty
        } else if ["http://", "https://", "webcal://"]
            .iter()
            .any(|scheme| source.starts_with(scheme))
        {
            Source::Url(source.to_string())
        } else {
            Source::File(PathBuf::from(source))
        }
    }

    /// Load the source as a document of its own.
    ///
    /// A feed answering with an error status yields the empty template,
    /// the same way `add-url` treats it as zero events.
    pub async fn load(&self, fetcher: &Fetcher) -> RelayResult<CalendarDocument> {
        match self {
            Source::Url(url) => Ok(fetcher
                .fetch(url, &HeaderMap::new())
                .await?
                .unwrap_or_default()),
            Source::File(path) => read_calendar_file(path),
            Source::Empty => Ok(CalendarDocument::new()),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Source::Url(url) => f.write_str(url),
            Source::File(path) => write!(f, "{}", path.display()),
            Source::Empty => f.write_str("(empty)"),
        }
    }
}

/// `webcal://` is a hint for calendar clients; it is fetched over https.
pub(crate) fn normalize_url(url: &str) -> String {
    match url.trim().strip_prefix("webcal://") {
        Some(rest) => format!("https://{rest}"),
        None => url.trim().to_string(),
    }
}

/// HTTP access for sources, with an optional per-request time limit.
#[derive(Debug, Clone, Default)]
pub struct Fetcher {
    client: reqwest::Client,
    timeout: Option<Duration>,
}

impl Fetcher {
    /// A fetcher that waits as long as the server takes.
    pub fn new() -> Self {
        Fetcher::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Fetcher {
            client: reqwest::Client::new(),
            timeout: Some(timeout),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// GET a calendar feed.
    ///
    /// Returns `Ok(None)` when the server answers with a non-success status
    /// or a body that does not parse; both are logged. Transport failures
    /// and timeouts are errors.
    pub async fn fetch(
        &self,
        url: &str,
        headers: &HeaderMap,
    ) -> RelayResult<Option<CalendarDocument>> {
        let url = normalize_url(url);

        let body = match self.timeout {
            Some(limit) => timeout(limit, self.fetch_body(&url, headers))
                .await
                .map_err(|_| RelayError::FetchTimeout {
                    url: url.clone(),
                    timeout: humantime::format_duration(limit).to_string(),
                })??,
            None => self.fetch_body(&url, headers).await?,
        };

        let Some(body) = body else {
            return Ok(None);
        };

        match parse_calendar(&body) {
            Ok(doc) => Ok(Some(doc)),
            Err(e) => {
                error!(%url, "Could not parse calendar: {}", e);
                Ok(None)
            }
        }
    }

    async fn fetch_body(&self, url: &str, headers: &HeaderMap) -> RelayResult<Option<String>> {
        let unavailable = |e: reqwest::Error| RelayError::SourceUnavailable(format!("{url}: {e}"));

        let response = self
            .client
            .get(url)
            .headers(headers.clone())
            .send()
            .await
            .map_err(unavailable)?;

        let status = response.status();
        if !status.is_success() {
            warn!(%url, %status, "Source answered with an error status, adding no events");
            return Ok(None);
        }

        let body = response.text().await.map_err(unavailable)?;
        debug!(%url, bytes = body.len(), "Fetched source");
        Ok(Some(body))
    }
}

/// Read and parse a local calendar file. A missing file is `NotFound`.
pub fn read_calendar_file(path: &Path) -> RelayResult<CalendarDocument> {
    let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => RelayError::NotFound(format!("calendar file {}", path.display())),
        _ => RelayError::Io(e),
    })?;

    parse_calendar(&content).map_err(|e| match e {
        RelayError::IcsParse(reason) => {
            RelayError::IcsParse(format!("{}: {}", path.display(), reason))
        }
        other => other,
    })
}

/// Append every event of `source` to `target`. Everything else in `target`
/// (calendar properties, timezones, other components) stays as it is.
/// Returns the number of events added.
pub fn merge_into(target: &mut CalendarDocument, source: CalendarDocument) -> usize {
    let mut added = 0;
    for component in source.components {
        if let Component::Event(event) = component {
            target.push_event(event);
            added += 1;
        }
    }
    added
}

pub async fn add_events_url(
    target: &mut CalendarDocument,
    fetcher: &Fetcher,
    url: &str,
    headers: &HeaderMap,
) -> RelayResult<usize> {
    match fetcher.fetch(url, headers).await? {
        Some(source) => Ok(merge_into(target, source)),
        None => Ok(0),
    }
}

pub fn add_events_file(target: &mut CalendarDocument, path: &Path) -> RelayResult<usize> {
    let source = read_calendar_file(path)?;
    Ok(merge_into(target, source))
}

/// Outcome of merging several sources in order.
#[derive(Debug, Default)]
pub struct MergeReport {
    /// Events added before the first failure (or in total)
    pub added: usize,
    /// The failure that stopped the merge
    pub error: Option<RelayError>,
}

impl MergeReport {
    pub fn into_result(self) -> RelayResult<usize> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.added),
        }
    }
}

/// Merge each source in turn, stopping at the first error.
pub async fn add_multi(
    target: &mut CalendarDocument,
    fetcher: &Fetcher,
    sources: &[Source],
) -> MergeReport {
    let mut report = MergeReport::default();

    for source in sources {
        let result = match source {
            Source::Url(url) => add_events_url(target, fetcher, url, &HeaderMap::new()).await,
            Source::File(path) => add_events_file(target, path),
            Source::Empty => Ok(0),
        };

        match result {
            Ok(added) => report.added += added,
            Err(e) => {
                warn!(%source, added = report.added, "Stopped merging sources: {}", e);
                report.error = Some(e);
                break;
            }
        }
    }

    report
}

pub async fn add_multi_url(
    target: &mut CalendarDocument,
    fetcher: &Fetcher,
    urls: &[String],
) -> MergeReport {
    let sources: Vec<Source> = urls.iter().map(|u| Source::Url(u.clone())).collect();
    add_multi(target, fetcher, &sources).await
}

pub fn add_multi_file(target: &mut CalendarDocument, paths: &[PathBuf]) -> MergeReport {
    let mut report = MergeReport::default();

    for path in paths {
        match add_events_file(target, path) {
            Ok(added) => report.added += added,
            Err(e) => {
                warn!(path = %path.display(), added = report.added, "Stopped merging files: {}", e);
                report.error = Some(e);
                break;
            }
        }
    }

    report
}
