//! Quota-metered search backend using the YouTube Data API.
//!
//! [`ApiSearch`] queries the Data API v3 `search` endpoint and extracts the
//! first well-formed video ID from the response. A 403 response, or an error
//! body naming `quotaExceeded`, maps to [`SearchError::QuotaExceeded`] so the
//! resolver can stop spending API calls for the rest of the process.

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use super::http_client::build_search_http_client;
use super::{SearchError, VIDEO_ID_LEN};

/// Default Data API base URL.
const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

/// Results requested per search call. Skips past the first candidate stay
/// within a single page.
const MAX_RESULTS: usize = 10;

// ==================== API Response Types ====================

/// Top-level Data API search response.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiSearchResponse {
    pub items: Option<Vec<ApiSearchItem>>,
}

/// A single result entry from a Data API search response.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiSearchItem {
    pub id: ApiResultId,
}

/// The `id` field of a search result.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiResultId {
    #[serde(rename = "videoId")]
    pub video_id: Option<String>,
}

// ==================== ApiSearch ====================

/// Searches for videos via the Data API using a caller-supplied key.
pub struct ApiSearch {
    client: Client,
    base_url: String,
    api_key: String,
}

impl ApiSearch {
    /// Creates a new `ApiSearch` against the production Data API.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError`] if HTTP client construction fails.
    pub fn new(api_key: impl Into<String>) -> Result<Self, SearchError> {
        Self::build(api_key.into(), DEFAULT_BASE_URL.to_string())
    }

    /// Creates an `ApiSearch` with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`SearchError`] if HTTP client construction fails.
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, SearchError> {
        Self::build(api_key.into(), base_url.into())
    }

    fn build(api_key: String, base_url: String) -> Result<Self, SearchError> {
        let client = build_search_http_client()?;
        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    /// Finds the video ID of the `skip`-th well-formed candidate for `query`.
    ///
    /// Medium-duration filtering biases results toward full songs rather
    /// than shorts or full albums.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::QuotaExceeded`] when the daily quota is spent,
    /// [`SearchError::NoMatches`] when no candidate survives filtering, and
    /// network or status errors otherwise.
    #[tracing::instrument(skip(self), fields(query = %query, skip))]
    pub async fn search(&self, query: &str, skip: usize) -> Result<String, SearchError> {
        let url = format!(
            "{}/search?part=id,snippet&type=video&videoDuration=medium&maxResults={}&q={}&key={}",
            self.base_url,
            MAX_RESULTS,
            urlencoding::encode(query),
            urlencoding::encode(&self.api_key),
        );

        debug!("Calling video search API");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SearchError::from_request(query, &e))?;

        let status = response.status();
        if status.as_u16() == 403 {
            warn!("Search API returned 403; treating quota as exhausted");
            return Err(SearchError::QuotaExceeded);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if body.contains("quotaExceeded") {
                warn!("Search API reported quotaExceeded; stopping API usage");
                return Err(SearchError::QuotaExceeded);
            }
            debug!(status = status.as_u16(), "Search API error response");
            return Err(SearchError::http_status(query, status.as_u16()));
        }

        let body = response
            .json::<ApiSearchResponse>()
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to parse search API response JSON");
                SearchError::BadResponse {
                    query: query.to_string(),
                }
            })?;

        let items = body.items.unwrap_or_default();
        items
            .into_iter()
            .filter_map(|item| item.id.video_id)
            .filter(|id| id.len() == VIDEO_ID_LEN)
            .nth(skip)
            .ok_or_else(|| SearchError::no_matches(query))
    }
}

impl std::fmt::Debug for ApiSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiSearch")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn search_results_json(ids: &[&str]) -> serde_json::Value {
        let items: Vec<serde_json::Value> = ids
            .iter()
            .map(|id| serde_json::json!({"id": {"videoId": id}}))
            .collect();
        serde_json::json!({"items": items})
    }

    #[test]
    fn test_api_response_deserialize_full() {
        let json = search_results_json(&["dQw4w9WgXcQ", "kJQP7kiw5Fk"]);
        let resp: ApiSearchResponse = serde_json::from_value(json).unwrap();
        let items = resp.items.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id.video_id.as_deref(), Some("dQw4w9WgXcQ"));
    }

    #[test]
    fn test_api_response_deserialize_channel_result_without_video_id() {
        let json = serde_json::json!({
            "items": [{"id": {"kind": "youtube#channel", "channelId": "UC123"}}]
        });
        let resp: ApiSearchResponse = serde_json::from_value(json).unwrap();
        assert!(resp.items.unwrap()[0].id.video_id.is_none());
    }

    #[tokio::test]
    async fn test_api_search_returns_first_well_formed_id() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "test song"))
            .and(query_param("videoDuration", "medium"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(search_results_json(&["dQw4w9WgXcQ", "kJQP7kiw5Fk"])),
            )
            .mount(&mock_server)
            .await;

        let search = ApiSearch::with_base_url("test-key", mock_server.uri()).unwrap();
        let id = search.search("test song", 0).await.unwrap();
        assert_eq!(id, "dQw4w9WgXcQ");
    }

    #[tokio::test]
    async fn test_api_search_skip_selects_later_candidate() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(search_results_json(&["dQw4w9WgXcQ", "kJQP7kiw5Fk"])),
            )
            .mount(&mock_server)
            .await;

        let search = ApiSearch::with_base_url("test-key", mock_server.uri()).unwrap();
        let id = search.search("test song", 1).await.unwrap();
        assert_eq!(id, "kJQP7kiw5Fk");
    }

    #[tokio::test]
    async fn test_api_search_skips_malformed_ids() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(search_results_json(&["short", "dQw4w9WgXcQ"])),
            )
            .mount(&mock_server)
            .await;

        let search = ApiSearch::with_base_url("test-key", mock_server.uri()).unwrap();
        let id = search.search("test song", 0).await.unwrap();
        assert_eq!(id, "dQw4w9WgXcQ");
    }

    #[tokio::test]
    async fn test_api_search_403_maps_to_quota_exceeded() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&mock_server)
            .await;

        let search = ApiSearch::with_base_url("test-key", mock_server.uri()).unwrap();
        let err = search.search("test song", 0).await.unwrap_err();
        assert!(err.is_quota_exceeded());
    }

    #[tokio::test]
    async fn test_api_search_quota_exceeded_body_maps_to_quota_exceeded() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(400).set_body_string(
                r#"{"error": {"errors": [{"reason": "quotaExceeded"}]}}"#,
            ))
            .mount(&mock_server)
            .await;

        let search = ApiSearch::with_base_url("test-key", mock_server.uri()).unwrap();
        let err = search.search("test song", 0).await.unwrap_err();
        assert!(err.is_quota_exceeded());
    }

    #[tokio::test]
    async fn test_api_search_empty_items_is_no_matches() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&mock_server)
            .await;

        let search = ApiSearch::with_base_url("test-key", mock_server.uri()).unwrap();
        let err = search.search("test song", 0).await.unwrap_err();
        assert!(matches!(err, SearchError::NoMatches { .. }));
    }

    #[tokio::test]
    async fn test_api_search_500_maps_to_http_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let search = ApiSearch::with_base_url("test-key", mock_server.uri()).unwrap();
        let err = search.search("test song", 0).await.unwrap_err();
        assert!(matches!(err, SearchError::HttpStatus { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_api_search_sends_key_param() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("key", "secret-key"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(search_results_json(&["dQw4w9WgXcQ"])),
            )
            .mount(&mock_server)
            .await;

        let search = ApiSearch::with_base_url("secret-key", mock_server.uri()).unwrap();
        // Missing key param would not match the mock and fail here.
        let id = search.search("test song", 0).await.unwrap();
        assert_eq!(id, "dQw4w9WgXcQ");
    }
}
