//! Client for the bulk-data products endpoint and descriptor windowing.

use std::time::Duration;

use chrono::{Datelike, NaiveDate};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use ttabkit_shared::{Dataset, FileDescriptor, Result, TtabError, UsptoConfig};

use crate::{API_KEY_HEADER, USER_AGENT};

// ---------------------------------------------------------------------------
// Window
// ---------------------------------------------------------------------------

/// Which descriptors of a listing are in scope for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    /// Files whose coverage starts within the last `n` days.
    RecentDays(u32),
    /// Files whose coverage starts in the given calendar year.
    Year(i32),
    All,
}

impl Window {
    /// Descriptors without a usable date are always kept.
    pub fn includes(&self, descriptor: &FileDescriptor, today: NaiveDate) -> bool {
        let Some(date) = descriptor.from_date.or(descriptor.to_date) else {
            return true;
        };
        match *self {
            Self::RecentDays(days) => {
                let cutoff = today - chrono::Duration::days(i64::from(days));
                date >= cutoff
            }
            Self::Year(year) => date.year() == year,
            Self::All => true,
        }
    }

    pub fn select(
        &self,
        descriptors: Vec<FileDescriptor>,
        today: NaiveDate,
    ) -> Vec<FileDescriptor> {
        descriptors
            .into_iter()
            .filter(|d| self.includes(d, today))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ProductsResponse {
    #[serde(rename = "bulkDataProductBag", default)]
    products: Vec<Product>,
}

#[derive(Debug, Deserialize)]
struct Product {
    #[serde(rename = "productFileBag", default)]
    file_bag: Option<FileBag>,
}

#[derive(Debug, Deserialize)]
struct FileBag {
    #[serde(rename = "fileDataBag", default)]
    files: Vec<RawFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFile {
    file_name: Option<String>,
    #[serde(default)]
    file_size: Option<u64>,
    file_data_from_date: Option<String>,
    file_data_to_date: Option<String>,
    file_date: Option<String>,
    #[serde(rename = "fileDownloadURI")]
    file_download_uri: Option<String>,
}

/// Portal dates are `YYYY-MM-DD`, sometimes followed by a time part.
fn parse_listing_date(raw: Option<&str>) -> Option<NaiveDate> {
    let raw = raw?.trim();
    let day = raw.get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

impl RawFile {
    fn into_descriptor(self) -> Option<FileDescriptor> {
        let name = self.file_name?.trim().to_string();
        if name.is_empty() {
            return None;
        }
        let from_date = parse_listing_date(self.file_data_from_date.as_deref())
            .or_else(|| parse_listing_date(self.file_date.as_deref()));
        Some(FileDescriptor {
            name,
            size: self.file_size.unwrap_or(0),
            from_date,
            to_date: parse_listing_date(self.file_data_to_date.as_deref()),
            download_uri: self.file_download_uri,
        })
    }
}

// ---------------------------------------------------------------------------
// ListingClient
// ---------------------------------------------------------------------------

/// Reads the file listing for a dataset product.
pub struct ListingClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl ListingClient {
    pub fn new(config: &UsptoConfig, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TtabError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Fetch every descriptor the portal lists for `dataset`.
    #[instrument(skip_all, fields(product = dataset.product_id()))]
    pub async fn list(&self, dataset: Dataset) -> Result<Vec<FileDescriptor>> {
        let url = format!("{}/{}", self.base_url, dataset.product_id());
        debug!(%url, "requesting file listing");

        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| TtabError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TtabError::from_status(status.as_u16(), url));
        }

        let body: ProductsResponse = response
            .json()
            .await
            .map_err(|e| TtabError::parse(format!("{url}: invalid listing: {e}")))?;

        let descriptors: Vec<FileDescriptor> = body
            .products
            .into_iter()
            .next()
            .and_then(|p| p.file_bag)
            .map(|bag| bag.files)
            .unwrap_or_default()
            .into_iter()
            .filter_map(RawFile::into_descriptor)
            .collect();

        info!(files = descriptors.len(), "listing received");
        Ok(descriptors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn descriptor(name: &str, from: Option<NaiveDate>) -> FileDescriptor {
        FileDescriptor {
            name: name.into(),
            size: 1,
            from_date: from,
            to_date: None,
            download_uri: None,
        }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn recent_window_keeps_undated() {
        let today = day(2025, 1, 10);
        let picked = Window::RecentDays(7).select(
            vec![
                descriptor("old.zip", Some(day(2024, 12, 1))),
                descriptor("new.zip", Some(day(2025, 1, 5))),
                descriptor("undated.zip", None),
            ],
            today,
        );
        let names: Vec<_> = picked.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["new.zip", "undated.zip"]);
    }

    #[test]
    fn year_window() {
        let today = day(2025, 6, 1);
        let w = Window::Year(2024);
        assert!(w.includes(&descriptor("a", Some(day(2024, 3, 3))), today));
        assert!(!w.includes(&descriptor("b", Some(day(2025, 3, 3))), today));
        assert!(Window::All.includes(&descriptor("c", Some(day(1999, 1, 1))), today));
    }

    #[test]
    fn listing_dates_accept_time_suffix() {
        assert_eq!(
            parse_listing_date(Some("2025-01-02 00:00:00")),
            Some(day(2025, 1, 2))
        );
        assert_eq!(parse_listing_date(Some("01/02/2025")), None);
        assert_eq!(parse_listing_date(None), None);
    }

    fn test_config(server: &MockServer) -> UsptoConfig {
        UsptoConfig {
            api_base_url: format!("{}/products", server.uri()),
            ..UsptoConfig::default()
        }
    }

    #[tokio::test]
    async fn list_parses_file_bag() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "bulkDataProductBag": [{
                "productIdentifier": "TTABTDXF",
                "productFileBag": {
                    "fileDataBag": [
                        {
                            "fileName": "ttab2025-01-02.zip",
                            "fileSize": 1024,
                            "fileDataFromDate": "2025-01-02",
                            "fileDataToDate": "2025-01-02",
                            "fileDownloadURI": "https://example.com/ttab2025-01-02.zip"
                        },
                        { "fileName": "ttab2025-01-03.zip", "fileDate": "2025-01-03" },
                        { "fileSize": 5 }
                    ]
                }
            }]
        });
        Mock::given(method("GET"))
            .and(path("/products/TTABTDXF"))
            .and(header("X-API-KEY", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(&server)
            .await;

        let client = ListingClient::new(&test_config(&server), "secret".into()).expect("client");
        let files = client.list(Dataset::Daily).await.expect("list");

        assert_eq!(files.len(), 2);
        assert_eq!(files[0].size, 1024);
        assert_eq!(files[0].from_date, Some(day(2025, 1, 2)));
        assert_eq!(files[1].from_date, Some(day(2025, 1, 3)));
        assert!(files[1].download_uri.is_none());
    }

    #[tokio::test]
    async fn forbidden_listing_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let client = ListingClient::new(&test_config(&server), "bad".into()).expect("client");
        let err = client.list(Dataset::Annual).await.unwrap_err();
        assert!(err.is_fatal());
    }
}
