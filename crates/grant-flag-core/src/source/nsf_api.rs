use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use super::AwardSource;
use crate::{award::RawAward, settings::AppSettings};

/// Paginated client for the NSF awards search API.
///
/// Pages are requested one after another with `offset` starting at 1 and
/// advancing by the page size; an empty page ends the run. Any failed request
/// aborts the whole fetch.
#[derive(Debug, Clone)]
pub struct NsfApiSource {
    http: Client,
    url: String,
    page_size: u32,
}

impl NsfApiSource {
    pub fn new(url: impl Into<String>, page_size: u32, timeout: Duration) -> Result<Self> {
        if page_size == 0 {
            bail!("page size must be greater than zero");
        }
        let http = Client::builder()
            .user_agent(concat!("grant-flag/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("failed to build awards API HTTP client")?;
        Ok(Self {
            http,
            url: url.into(),
            page_size,
        })
    }

    pub fn from_settings(settings: &AppSettings) -> Result<Self> {
        Self::new(
            settings.api_base_url.clone(),
            settings.page_size,
            settings.timeout()?,
        )
    }

    async fn fetch_page(&self, year: u16, offset: u32) -> Result<Option<Vec<RawAward>>> {
        let query = [
            ("dateStart", format!("01/01/{year}")),
            ("dateEnd", format!("12/31/{year}")),
            ("rpp", self.page_size.to_string()),
            ("offset", offset.to_string()),
            ("printFields", RawAward::FIELDS.join(",")),
        ];
        let response = self
            .http
            .get(&self.url)
            .query(&query)
            .send()
            .await
            .with_context(|| format!("failed to call awards API at {}", self.url))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("awards API error ({}): {}", status, body);
        }

        let envelope: ApiEnvelope = response
            .json()
            .await
            .context("failed to parse awards API response")?;
        Ok(envelope.response.and_then(|body| body.award))
    }
}

#[async_trait]
impl AwardSource for NsfApiSource {
    #[instrument(name = "fetch_awards", skip(self), fields(url = %self.url))]
    async fn load(&self, year: u16) -> Result<Vec<RawAward>> {
        info!(year, "starting awards fetch");
        let mut awards = Vec::new();
        let mut offset = 1u32;
        loop {
            debug!(
                from = offset,
                to = offset.saturating_add(self.page_size - 1),
                "fetching records"
            );
            let Some(batch) = self.fetch_page(year, offset).await? else {
                warn!(offset, "no award data in response; stopping");
                break;
            };
            if batch.is_empty() {
                debug!(offset, "empty page; stopping");
                break;
            }
            awards.extend(batch);
            debug!(total = awards.len(), "page fetched");
            let Some(next) = offset.checked_add(self.page_size) else {
                warn!(offset, "offset range exhausted; stopping");
                break;
            };
            offset = next;
        }
        if awards.is_empty() {
            warn!(year, "no records downloaded");
        } else {
            info!(year, count = awards.len(), "finished fetching awards");
        }
        Ok(awards)
    }

    fn describe(&self) -> String {
        format!("awards API {}", self.url)
    }
}

#[derive(Deserialize)]
struct ApiEnvelope {
    #[serde(default)]
    response: Option<ApiBody>,
}

#[derive(Deserialize)]
struct ApiBody {
    #[serde(default)]
    award: Option<Vec<RawAward>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn source(server: &MockServer) -> NsfApiSource {
        NsfApiSource::new(server.url("/awards.json"), 2, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn paginates_until_an_empty_page() {
        let server = MockServer::start_async().await;
        let first = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/awards.json")
                    .query_param("offset", "1")
                    .query_param("rpp", "2")
                    .query_param("dateStart", "01/01/2023")
                    .query_param("dateEnd", "12/31/2023");
                then.status(200).json_body(json!({
                    "response": {"award": [
                        {"id": "1", "abstractText": "equity", "fundsObligatedAmt": "100"},
                        {"id": "2", "abstractText": "sensors", "fundsObligatedAmt": "200"}
                    ]}
                }));
            })
            .await;
        let second = server
            .mock_async(|when, then| {
                when.method(GET).path("/awards.json").query_param("offset", "3");
                then.status(200).json_body(json!({
                    "response": {"award": [{"id": "3", "title": "Third"}]}
                }));
            })
            .await;
        let last = server
            .mock_async(|when, then| {
                when.method(GET).path("/awards.json").query_param("offset", "5");
                then.status(200)
                    .json_body(json!({"response": {"award": []}}));
            })
            .await;

        let awards = source(&server).load(2023).await.unwrap();
        first.assert_async().await;
        second.assert_async().await;
        last.assert_async().await;
        let ids: Vec<_> = awards.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(awards[2].title, "Third");
    }

    #[tokio::test]
    async fn missing_award_key_ends_the_fetch() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/awards.json");
                then.status(200).json_body(json!({"response": {}}));
            })
            .await;
        let awards = source(&server).load(2020).await.unwrap();
        assert!(awards.is_empty());
    }

    #[tokio::test]
    async fn http_errors_abort_without_retry() {
        let server = MockServer::start_async().await;
        let failing = server
            .mock_async(|when, then| {
                when.method(GET).path("/awards.json");
                then.status(503).body("maintenance");
            })
            .await;
        let err = source(&server).load(2021).await.unwrap_err();
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("maintenance"));
        failing.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn huge_page_sizes_stop_at_the_end_of_the_offset_range() {
        let server = MockServer::start_async().await;
        let page = server
            .mock_async(|when, then| {
                when.method(GET).path("/awards.json");
                then.status(200)
                    .json_body(json!({"response": {"award": [{"id": "1"}]}}));
            })
            .await;
        let source =
            NsfApiSource::new(server.url("/awards.json"), u32::MAX, Duration::from_secs(5))
                .unwrap();
        let awards = source.load(2023).await.unwrap();
        assert_eq!(awards.len(), 1);
        page.assert_hits_async(1).await;
    }

    #[test]
    fn rejects_zero_page_size() {
        assert!(NsfApiSource::new("http://localhost", 0, Duration::from_secs(1)).is_err());
    }
}
