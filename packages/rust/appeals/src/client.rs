//! CourtListener search API client.
//!
//! Every request first passes the shared [`RateLimiter`], so the
//! one-query-per-second ceiling holds across all callers of one run.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use ttabkit_shared::{
    AppealRecord, CourtListenerConfig, Outcome, RateLimiter, Result, TtabError,
};

/// User-Agent string for search requests.
const USER_AGENT: &str = concat!("ttabkit/", env!("CARGO_PKG_VERSION"));

/// Appellate dispositions, checked in this order against summary text.
const APPEAL_OUTCOMES: &[(&str, Outcome)] = &[
    ("affirmed", Outcome::Affirmed),
    ("reversed", Outcome::Reversed),
    ("remanded", Outcome::Remanded),
    ("dismissed", Outcome::Dismissed),
    ("granted", Outcome::Granted),
    ("denied", Outcome::Denied),
];

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<RawHit>,
}

/// Citations come back as a list in v4 and as a string in older responses.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Citation {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct RawOpinion {
    #[serde(default)]
    snippet: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawHit {
    #[serde(rename = "caseName", default)]
    case_name: Option<String>,
    #[serde(rename = "docketNumber", default)]
    docket_number: Option<String>,
    #[serde(default)]
    citation: Option<Citation>,
    #[serde(rename = "dateFiled", default)]
    date_filed: Option<String>,
    #[serde(default)]
    cluster_id: Option<u64>,
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    absolute_url: Option<String>,
    #[serde(default)]
    snippet: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    opinions: Vec<RawOpinion>,
}

// ---------------------------------------------------------------------------
// SearchHit
// ---------------------------------------------------------------------------

/// One candidate appellate case.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub case_name: String,
    pub docket_number: Option<String>,
    pub citation: Option<String>,
    pub date_filed: Option<NaiveDate>,
    /// Stable cluster identifier in the external index.
    pub source_id: String,
    pub url: Option<String>,
    /// Summary or snippet text, used to infer the disposition.
    pub summary: String,
}

impl SearchHit {
    fn from_raw(raw: RawHit, origin: &Url) -> Option<Self> {
        let source_id = raw.cluster_id.or(raw.id)?.to_string();
        let citation = match raw.citation {
            Some(Citation::One(c)) => Some(c),
            Some(Citation::Many(list)) => (!list.is_empty()).then(|| list.join("; ")),
            None => None,
        }
        .filter(|c| !c.trim().is_empty());
        let summary = raw
            .summary
            .into_iter()
            .chain(raw.snippet)
            .chain(raw.opinions.into_iter().filter_map(|o| o.snippet))
            .collect::<Vec<_>>()
            .join(" ");

        Some(Self {
            case_name: raw.case_name.unwrap_or_default(),
            docket_number: raw.docket_number.filter(|d| !d.trim().is_empty()),
            citation,
            date_filed: raw
                .date_filed
                .as_deref()
                .and_then(|d| d.get(..10))
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
            source_id,
            url: raw
                .absolute_url
                .and_then(|path| origin.join(&path).ok())
                .map(String::from),
            summary,
        })
    }

    /// Disposition inferred from the summary text.
    pub fn outcome(&self) -> Outcome {
        let text = self.summary.to_lowercase();
        APPEAL_OUTCOMES
            .iter()
            .find(|(word, _)| text.contains(word))
            .map(|(_, outcome)| *outcome)
            .unwrap_or(Outcome::Unknown)
    }

    pub fn to_appeal(&self) -> AppealRecord {
        AppealRecord {
            case_number: self
                .docket_number
                .clone()
                .unwrap_or_else(|| format!("cluster-{}", self.source_id)),
            case_name: self.case_name.clone(),
            citation: self.citation.clone(),
            docket_number: self.docket_number.clone(),
            filing_date: self.date_filed,
            decision_date: None,
            outcome: self.outcome(),
            source_id: self.source_id.clone(),
            url: self.url.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// CourtListenerClient
// ---------------------------------------------------------------------------

pub struct CourtListenerClient {
    client: Client,
    search_url: Url,
    origin: Url,
    token: String,
    court_id: String,
    page_size: u32,
    limiter: Arc<RateLimiter>,
}

impl CourtListenerClient {
    pub fn new(
        config: &CourtListenerConfig,
        token: String,
        limiter: Arc<RateLimiter>,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TtabError::Network(format!("failed to build HTTP client: {e}")))?;

        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base = Url::parse(&base)
            .map_err(|e| TtabError::config(format!("invalid courtlistener.base_url: {e}")))?;
        let search_url = base
            .join("search/")
            .map_err(|e| TtabError::config(format!("invalid courtlistener.base_url: {e}")))?;
        let origin = base
            .join("/")
            .map_err(|e| TtabError::config(format!("invalid courtlistener.base_url: {e}")))?;

        Ok(Self {
            client,
            search_url,
            origin,
            token,
            court_id: config.court_id.clone(),
            page_size: config.page_size,
            limiter,
        })
    }

    /// Run one opinion search, waiting on the shared limiter first.
    #[instrument(skip_all, fields(query = %query))]
    pub async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        self.limiter.acquire().await;

        let page_size = self.page_size.to_string();
        let response = self
            .client
            .get(self.search_url.clone())
            .header("Authorization", format!("Token {}", self.token))
            .query(&[
                ("q", query),
                ("court", self.court_id.as_str()),
                ("type", "o"),
                ("order_by", "dateFiled desc"),
                ("page_size", page_size.as_str()),
            ])
            .send()
            .await
            .map_err(|e| TtabError::Network(format!("{}: {e}", self.search_url)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TtabError::from_status(
                status.as_u16(),
                self.search_url.as_str(),
            ));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| TtabError::parse(format!("invalid search response: {e}")))?;

        let hits: Vec<SearchHit> = body
            .results
            .into_iter()
            .filter_map(|raw| SearchHit::from_raw(raw, &self.origin))
            .collect();
        debug!(hits = hits.len(), "search complete");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> CourtListenerClient {
        let config = CourtListenerConfig {
            base_url: format!("{}/api/rest/v4", server.uri()),
            ..CourtListenerConfig::default()
        };
        CourtListenerClient::new(
            &config,
            "tok".into(),
            Arc::new(RateLimiter::new(Duration::from_millis(1))),
        )
        .expect("client")
    }

    #[tokio::test]
    async fn search_sends_filters_and_parses_hits() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "count": 2,
            "results": [
                {
                    "caseName": "Acme Inc. v. Globex Corp.",
                    "docketNumber": "2024-1001",
                    "citation": ["101 F.4th 1"],
                    "dateFiled": "2024-09-30",
                    "cluster_id": 9876,
                    "absolute_url": "/opinion/9876/acme-v-globex/",
                    "opinions": [{ "snippet": "The Board's decision is AFFIRMED." }]
                },
                { "caseName": "No identifier" }
            ]
        });
        Mock::given(method("GET"))
            .and(path("/api/rest/v4/search/"))
            .and(header("Authorization", "Token tok"))
            .and(query_param("court", "cafc"))
            .and(query_param("type", "o"))
            .and(query_param("q", "\"91123456\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(&server)
            .await;

        let hits = client(&server).search("\"91123456\"").await.expect("search");
        assert_eq!(hits.len(), 1);
        let hit = &hits[0];
        assert_eq!(hit.source_id, "9876");
        assert_eq!(hit.citation.as_deref(), Some("101 F.4th 1"));
        assert_eq!(hit.date_filed, NaiveDate::from_ymd_opt(2024, 9, 30));
        assert_eq!(hit.outcome(), Outcome::Affirmed);
        assert_eq!(
            hit.url.as_deref(),
            Some(format!("{}/opinion/9876/acme-v-globex/", server.uri()).as_str())
        );

        let appeal = hit.to_appeal();
        assert_eq!(appeal.case_number, "2024-1001");
        assert_eq!(appeal.outcome, Outcome::Affirmed);
    }

    #[tokio::test]
    async fn legacy_string_citation_and_id() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "results": [{ "caseName": "In re Foo", "citation": "5 F.3d 7", "id": 12, "summary": "reversed" }]
        });
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let hits = client(&server).search("foo").await.expect("search");
        assert_eq!(hits[0].citation.as_deref(), Some("5 F.3d 7"));
        assert_eq!(hits[0].to_appeal().case_number, "cluster-12");
        assert_eq!(hits[0].outcome(), Outcome::Reversed);
    }

    #[tokio::test]
    async fn status_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("q", "denied"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("q", "busy"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let c = client(&server);
        assert!(c.search("denied").await.unwrap_err().is_fatal());
        assert!(c.search("busy").await.unwrap_err().is_retryable());
    }
}
