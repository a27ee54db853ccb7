use std::{str::FromStr, time::Duration};

use anyhow::{Context, Result};
use http::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;

use crate::{config::Config, error, url_builder::URLBuilder};

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    HTTP,
    HTTPS,
}

impl Scheme {
    pub fn as_str(&self) -> &str {
        match self {
            Self::HTTP => "http",
            Self::HTTPS => "https",
        }
    }
}

/// The one HTTP client of a run, bound to a single portal
///
/// Cookies set by the portal are kept for the lifetime of the session, so the
/// login performed through it authenticates every later request.
pub struct Session {
    client: reqwest::Client,
    base_url: String,
}

impl Session {
    /// Creates a session for the portal at `base`
    ///
    /// The scheme falls back to the configured one when the portal input did
    /// not name it.
    pub fn new(mut base: URLBuilder, config: &Config) -> Result<Self> {
        if base.scheme.is_none() {
            base.scheme = Some(config.scheme.as_str().to_string());
        }

        let base_url = base.build()?;

        if config.insecure {
            log::warn!("TLS certificate validation is disabled for {}", base_url);
        }

        let client = client_builder(config)?
            .build()
            .context("build HTTP client")?;

        Ok(Self { client, base_url })
    }

    /// Returns the absolute URL of a portal path, e.g. "/login"
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Fetches `url` and returns the response body, whatever its status
    ///
    /// Used for HTML pages, whose content decides success.
    pub async fn get_page(&self, url: &str) -> error::Result<String> {
        log::debug!("GET {}", url);

        let response = self.client.get(url).send().await?;
        log::debug!("{} {}", response.status(), url);

        Ok(response.text().await?)
    }

    /// Fetches `url` and returns the response body of a successful response
    pub async fn get_text(&self, url: &str) -> error::Result<String> {
        log::debug!("GET {}", url);

        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }

    /// Posts `form` to `url` as a urlencoded body and returns the response
    /// body, whatever its status
    pub async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> error::Result<String> {
        log::debug!("POST {}", url);

        let response = self.client.post(url).form(form).send().await?;
        log::debug!("{} {}", response.status(), url);

        Ok(response.text().await?)
    }
}

fn client_builder(config: &Config) -> Result<reqwest::ClientBuilder> {
    let mut headers = HeaderMap::new();
    for (key, values) in &config.headers {
        for value in values {
            add_header(&mut headers, key, value)?;
        }
    }

    let mut builder = reqwest::Client::builder()
        .cookie_store(true)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .default_headers(headers);

    if config.timeout_secs > 0 {
        builder = builder.timeout(Duration::from_secs(config.timeout_secs));
    }

    if config.insecure {
        builder = builder.danger_accept_invalid_certs(true);
    }

    Ok(builder)
}

fn add_header(map: &mut HeaderMap, key: &str, value: &str) -> Result<()> {
    let key = HeaderName::from_str(key).context("valid header name")?;
    let value = HeaderValue::from_str(value).context("valid header value")?;
    map.append(key, value);
    Ok(())
}
