//! Addition modules: bring events in from elsewhere.

use std::path::PathBuf;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use super::params::Params;
use crate::document::CalendarDocument;
use crate::error::RelayResult;
use crate::source::{self, Fetcher};

/// `add-url`: merge the events of a remote feed.
#[derive(Debug, Clone)]
pub struct AddUrl {
    pub url: String,
    /// Forwarded verbatim from `header-<name>` parameters
    pub headers: HeaderMap,
}

impl AddUrl {
    pub(crate) fn from_params(params: &Params) -> RelayResult<Self> {
        let url = params.required("url")?;
        reqwest::Url::parse(&source::normalize_url(url))
            .map_err(|e| params.invalid("url", e))?;

        let mut headers = HeaderMap::new();
        for (name, value) in params.with_prefix("header-") {
            let key = format!("header-{name}");
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| params.invalid(&key, e))?;
            let value = HeaderValue::from_str(value).map_err(|e| params.invalid(&key, e))?;
            headers.append(name, value);
        }

        Ok(AddUrl {
            url: url.to_string(),
            headers,
        })
    }

    pub async fn apply(&self, doc: &mut CalendarDocument, fetcher: &Fetcher) -> RelayResult<i64> {
        let added = source::add_events_url(doc, fetcher, &self.url, &self.headers).await?;
        Ok(added as i64)
    }
}

/// `add-file`: merge the events of a local calendar file.
#[derive(Debug, Clone)]
pub struct AddFile {
    pub path: PathBuf,
}

impl AddFile {
    pub(crate) fn from_params(params: &Params) -> RelayResult<Self> {
        Ok(AddFile {
            path: PathBuf::from(params.required("filename")?),
        })
    }

    pub fn apply(&self, doc: &mut CalendarDocument) -> RelayResult<i64> {
        let added = source::add_events_file(doc, &self.path)?;
        Ok(added as i64)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::error::RelayError;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_headers_are_collected() {
        let map = params(&[
            ("url", "webcal://example.com/feed.ics"),
            ("header-Authorization", "Bearer abc"),
            ("header-X-Api-Key", "k"),
        ]);
        let module = AddUrl::from_params(&Params::new("add-url", &map)).unwrap();

        assert_eq!(module.headers.len(), 2);
        assert_eq!(module.headers["authorization"], "Bearer abc");
        assert_eq!(module.url, "webcal://example.com/feed.ics");
    }

    #[test]
    fn test_bad_url_and_header_are_rejected() {
        let map = params(&[("url", "not a url")]);
        assert!(matches!(
            AddUrl::from_params(&Params::new("add-url", &map)),
            Err(RelayError::InvalidParameter { .. })
        ));

        let map = params(&[("url", "https://example.com"), ("header-Bad Name", "x")]);
        assert!(matches!(
            AddUrl::from_params(&Params::new("add-url", &map)),
            Err(RelayError::InvalidParameter { ref parameter, .. }) if parameter == "header-Bad Name"
        ));
    }

    #[test]
    fn test_add_file_missing_is_not_found() {
        let module = AddFile {
            path: PathBuf::from("/nonexistent/calendar.ics"),
        };
        let mut doc = CalendarDocument::new();

        assert!(matches!(module.apply(&mut doc), Err(RelayError::NotFound(_))));
        assert_eq!(doc.event_count(), 0);
    }
}
