use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT_LANGUAGE, REFERER};
use tracing::debug;

use crate::config::HttpSettings;
use crate::error::StageError;

/// Which request headers go out with a GET.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    /// User-Agent, Accept-Language and Referer of a desktop browser.
    Browser,
    /// Client defaults only.
    Plain,
}

/// Blocking HTTP client shared by every stage. Keeps cookies across requests.
pub struct Fetcher {
    client: Client,
    user_agent: String,
    accept_language: String,
    referer: String,
    page_identity: Identity,
}

impl Fetcher {
    pub fn new(settings: &HttpSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .cookie_store(true)
            .build()
            .context("Failed to create HTTP client")?;

        let page_identity = if settings.browser_identity_on_pages {
            Identity::Browser
        } else {
            Identity::Plain
        };

        Ok(Fetcher {
            client,
            user_agent: settings.user_agent.clone(),
            accept_language: settings.accept_language.clone(),
            referer: settings.referer.clone(),
            page_identity,
        })
    }

    /// Identity used when fetching individual crash pages.
    pub fn page_identity(&self) -> Identity {
        self.page_identity
    }

    /// GET `url` and return the body. Non-2xx responses are errors.
    pub fn fetch_html(&self, url: &str, identity: Identity) -> Result<String, StageError> {
        let mut request = self.client.get(url);
        if identity == Identity::Browser {
            request = request
                .header(reqwest::header::USER_AGENT, &self.user_agent)
                .header(ACCEPT_LANGUAGE, &self.accept_language)
                .header(REFERER, &self.referer);
        }

        let response = request.send().map_err(|source| StageError::Request {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(StageError::Status {
                url: url.to_string(),
                status,
            });
        }

        let body = response.text().map_err(|source| StageError::Request {
            url: url.to_string(),
            source,
        })?;
        debug!(url, bytes = body.len(), "fetched page");
        Ok(body)
    }
}
