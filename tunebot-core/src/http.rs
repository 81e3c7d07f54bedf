//! HTTP client seam for the search integration.
//!
//! The search client only ever needs a GET that returns the body text, so the
//! trait stays that small. Tests swap in `MockHttpClient` instead of touching
//! the network.

use async_trait::async_trait;
use reqwest;
use std::collections::HashMap;
use crate::Error;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(&self, url: String, headers: HashMap<String, String>) -> Result<String, Error>;
}

#[derive(Clone)]
pub struct DefaultHttpClient {
    client: reqwest::Client,
}

impl DefaultHttpClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for DefaultHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for DefaultHttpClient {
    async fn get(&self, url: String, headers: HashMap<String, String>) -> Result<String, Error> {
        let mut request = self.client.get(&url);
        for (key, value) in headers {
            request = request.header(&key, value);
        }
        let response = request
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(response)
    }
}
