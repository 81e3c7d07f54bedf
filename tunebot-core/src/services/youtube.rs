//! YouTube Data API v3 search client.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, error};

use tunebot_common::models::Candidate;
use tunebot_common::traits::Search;

use crate::Error;
use crate::http::HttpClient;

const SEARCH_ENDPOINT: &str = "https://www.googleapis.com/youtube/v3/search";

#[derive(Debug, Deserialize)]
struct SearchListResponse {
    #[serde(default)]
    items: Option<Vec<SearchResult>>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    id: Option<ResourceId>,
    #[serde(default)]
    snippet: Option<Snippet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceId {
    #[serde(default)]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Snippet {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl From<SearchResult> for Candidate {
    fn from(result: SearchResult) -> Self {
        let snippet = result.snippet;
        Candidate {
            external_id: result.id.and_then(|id| id.video_id),
            title: snippet.as_ref().and_then(|s| s.title.clone()).unwrap_or_default(),
            description: snippet.and_then(|s| s.description).unwrap_or_default(),
        }
    }
}

pub struct YoutubeSearch {
    client: Arc<dyn HttpClient>,
    api_key: String,
}

impl YoutubeSearch {
    pub fn new(client: Arc<dyn HttpClient>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
        }
    }

    fn search_url(&self, query: &str, limit: usize) -> String {
        format!(
            "{SEARCH_ENDPOINT}?part=id,snippet&type=video&maxResults={limit}&q={}&key={}",
            urlencoding::encode(query),
            urlencoding::encode(&self.api_key)
        )
    }

    fn parse(body: &str) -> Result<Vec<Candidate>, Error> {
        let response: SearchListResponse = serde_json::from_str(body)?;
        if let Some(api_error) = response.error {
            return Err(Error::SearchUnavailable(format!(
                "YouTube API error {}: {}",
                api_error.code.map(|c| c.to_string()).unwrap_or_else(|| "?".into()),
                api_error.message.unwrap_or_default()
            )));
        }
        Ok(response
            .items
            .unwrap_or_default()
            .into_iter()
            .map(Candidate::from)
            .collect())
    }
}

#[async_trait]
impl Search for YoutubeSearch {
    async fn find(&self, query: &str, limit: usize) -> Result<Vec<Candidate>, Error> {
        let url = self.search_url(query, limit);
        let body = self.client.get(url, HashMap::new()).await.map_err(|e| {
            error!("YouTube search for '{query}' failed: {e}");
            Error::SearchUnavailable(e.to_string())
        })?;
        let candidates = Self::parse(&body).map_err(|e| match e {
            Error::SearchUnavailable(_) => e,
            other => Error::SearchUnavailable(format!("unreadable search response: {other}")),
        })?;
        debug!("YouTube search for '{query}' returned {} items", candidates.len());
        Ok(candidates)
    }
}
