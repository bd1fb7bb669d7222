//! HTTP client for the portal's REST API.

use chrono::{DateTime, Utc};
use portal_core::{GroupId, SourceId, SourceRecord};
use portal_logging::portal_warn;
use reqwest::header::AUTHORIZATION;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::fetch::{build_client, map_reqwest_error};
use crate::{FailureKind, FetchError, FetchSettings, SourcePage};

/// Sources per list-sources page.
pub const DEFAULT_PAGE_SIZE: u32 = 250;

/// Parameters of one list-sources request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceQuery {
    pub group_id: GroupId,
    pub page_number: u32,
    pub num_per_page: u32,
    /// Echoed from the first page's response.
    pub query_id: Option<String>,
    pub saved_after: Option<String>,
    pub saved_before: Option<String>,
}

impl SourceQuery {
    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("group_ids", self.group_id.to_string()),
            ("includeHosts", "true".to_string()),
            ("includeComments", "false".to_string()),
            ("pageNumber", self.page_number.to_string()),
            ("numPerPage", self.num_per_page.to_string()),
            ("useCache", "true".to_string()),
        ];
        if let Some(query_id) = &self.query_id {
            params.push(("queryID", query_id.clone()));
        }
        if let Some(after) = &self.saved_after {
            params.push(("startDate", after.clone()));
        }
        if let Some(before) = &self.saved_before {
            params.push(("endDate", before.clone()));
        }
        params
    }
}

/// The portal operations the extractor and the watcher need.
#[async_trait::async_trait]
pub trait Portal: Send + Sync {
    async fn list_sources(&self, query: &SourceQuery) -> Result<SourcePage, FetchError>;

    /// Ids of sources saved to any of `group_ids` after `since`, in listing order.
    async fn sources_saved_after(
        &self,
        since: DateTime<Utc>,
        group_ids: &[GroupId],
    ) -> Result<Vec<SourceId>, FetchError>;

    async fn photometry_instruments(&self, source_id: &SourceId) -> Result<Vec<String>, FetchError>;

    async fn spectra_instruments(&self, source_id: &SourceId) -> Result<Vec<String>, FetchError>;

    /// Name of the telescope carrying `instrument`, `None` when the portal does not know it.
    async fn telescope_for_instrument(&self, instrument: &str) -> Result<Option<String>, FetchError>;
}

#[derive(Debug, Deserialize)]
struct Envelope {
    status: String,
    #[serde(default)]
    message: Value,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct PageData {
    #[serde(default)]
    sources: Vec<Value>,
    #[serde(rename = "totalMatches")]
    total_matches: usize,
    #[serde(rename = "queryID", default)]
    query_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListedSource {
    id: SourceId,
}

#[derive(Debug, Deserialize)]
struct InstrumentRef {
    instrument_name: String,
}

#[derive(Debug, Default, Deserialize)]
struct SpectraData {
    #[serde(default)]
    spectra: Vec<InstrumentRef>,
}

#[derive(Debug, Deserialize)]
struct Instrument {
    telescope: Telescope,
}

#[derive(Debug, Deserialize)]
struct Telescope {
    name: String,
}

#[derive(Debug, Clone)]
pub struct ReqwestPortal {
    client: reqwest::Client,
    base_url: Url,
    token: String,
}

impl ReqwestPortal {
    /// `base_url` is the API root, e.g. `https://portal.example/api`; endpoints are appended to it.
    pub fn new(base_url: &str, token: &str, settings: &FetchSettings) -> Result<Self, FetchError> {
        let base_url = Url::parse(base_url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(FetchError::new(FailureKind::InvalidUrl, base_url.to_string()));
        }
        Ok(Self {
            client: build_client(settings)?,
            base_url,
            token: token.to_string(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, FetchError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| FetchError::new(FailureKind::InvalidUrl, self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Issues a GET and unwraps the `data` member of a successful envelope.
    async fn get_data(
        &self,
        segments: &[&str],
        params: &[(&str, String)],
    ) -> Result<Value, FetchError> {
        let response = self
            .client
            .get(self.endpoint(segments)?)
            .header(AUTHORIZATION, format!("token {}", self.token))
            .query(params)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::new(FailureKind::RateLimited, ""));
        }
        let body = response.bytes().await.map_err(map_reqwest_error)?;

        let envelope: Envelope = serde_json::from_slice(&body).map_err(|err| {
            if status.is_success() {
                FetchError::new(FailureKind::Decode, err.to_string())
            } else {
                FetchError::new(FailureKind::HttpStatus(status.as_u16()), status.to_string())
            }
        })?;
        if envelope.status != "success" {
            let message = match envelope.message {
                Value::String(message) => message,
                Value::Null => format!("status {:?}", envelope.status),
                other => other.to_string(),
            };
            return Err(FetchError::new(FailureKind::Api, message));
        }
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }
        Ok(envelope.data)
    }

    async fn get_typed<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        params: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let data = self.get_data(segments, params).await?;
        serde_json::from_value(data).map_err(|err| FetchError::new(FailureKind::Decode, err.to_string()))
    }
}

/// Decodes each entry on its own so one malformed source does not sink the page.
fn decode_each<T: DeserializeOwned>(values: Vec<Value>, what: &str) -> (Vec<T>, usize) {
    let mut decoded = Vec::with_capacity(values.len());
    let mut skipped = 0;
    for value in values {
        match serde_json::from_value::<T>(value) {
            Ok(item) => decoded.push(item),
            Err(err) => {
                portal_warn!("Skipping malformed {}: {}", what, err);
                skipped += 1;
            }
        }
    }
    (decoded, skipped)
}

#[async_trait::async_trait]
impl Portal for ReqwestPortal {
    async fn list_sources(&self, query: &SourceQuery) -> Result<SourcePage, FetchError> {
        let data: PageData = self.get_typed(&["sources"], &query.params()).await?;
        let (sources, skipped) = decode_each::<SourceRecord>(data.sources, "source");
        Ok(SourcePage {
            sources,
            skipped,
            total_matches: data.total_matches,
            query_id: data.query_id,
        })
    }

    async fn sources_saved_after(
        &self,
        since: DateTime<Utc>,
        group_ids: &[GroupId],
    ) -> Result<Vec<SourceId>, FetchError> {
        let mut params = vec![("savedAfter", since.to_rfc3339())];
        params.extend(group_ids.iter().map(|id| ("group_ids", id.to_string())));

        let data: PageData = self.get_typed(&["sources"], &params).await?;
        let (listed, _) = decode_each::<ListedSource>(data.sources, "source listing");
        Ok(listed.into_iter().map(|source| source.id).collect())
    }

    async fn photometry_instruments(&self, source_id: &SourceId) -> Result<Vec<String>, FetchError> {
        let id = source_id.to_string();
        let points: Option<Vec<InstrumentRef>> = self
            .get_typed(&["sources", id.as_str(), "photometry"], &[])
            .await?;
        Ok(points
            .unwrap_or_default()
            .into_iter()
            .map(|point| point.instrument_name)
            .collect())
    }

    async fn spectra_instruments(&self, source_id: &SourceId) -> Result<Vec<String>, FetchError> {
        let id = source_id.to_string();
        let data: Option<SpectraData> = self
            .get_typed(&["sources", id.as_str(), "spectra"], &[])
            .await?;
        Ok(data
            .unwrap_or_default()
            .spectra
            .into_iter()
            .map(|spectrum| spectrum.instrument_name)
            .collect())
    }

    async fn telescope_for_instrument(&self, instrument: &str) -> Result<Option<String>, FetchError> {
        let instruments: Option<Vec<Instrument>> = self
            .get_typed(&["instrument"], &[("name", instrument.to_string())])
            .await?;
        Ok(instruments
            .unwrap_or_default()
            .into_iter()
            .next()
            .map(|instrument| instrument.telescope.name))
    }
}
