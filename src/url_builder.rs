use anyhow::{bail, Context, Result};
use url::Url;

/// A builder for portal URLs that allows for both reading and writing of URL
/// parts
///
/// The portal base is parsed once from user input. Missing parts, such as the
/// scheme, are filled in from configuration before the base URL is built.
#[derive(Clone, Debug, PartialEq)]
pub struct URLBuilder {
    pub scheme: Option<String>,
    pub hostname: Option<String>,
    pub port: Option<String>,
    pub path: Option<String>,
}

impl URLBuilder {
    /// Returns the URL authority
    ///
    /// The authority is the hostname and port, e.g. "ems.example.org:8443"
    ///
    /// If the hostname is missing, we return an error. If the port is missing,
    /// we return just the hostname.
    pub fn authority(&self) -> Result<String> {
        let mut authority = String::new();
        let hostname = self.hostname.as_ref().context("hostname is required")?;

        authority.push_str(hostname);

        if let Some(port) = &self.port {
            authority.push(':');
            authority.push_str(port);
        }

        Ok(authority)
    }

    /// Builds the URL from the parts
    ///
    /// If a required component is missing, we return an error.
    pub fn build(&self) -> Result<String> {
        let scheme = self.scheme.as_ref().context("scheme is required")?;
        let authority = self.authority()?;
        let path = self.path.as_deref().unwrap_or_default();

        Ok(format!("{}://{}{}", scheme, authority, path))
    }

    /// Creates a new URL builder from user input
    ///
    /// We expect a few forms of portal input from a user:
    /// - A bare host, e.g. "ems.example.org"
    /// - A host and port, e.g. "ems.example.org:8443"
    /// - A complete base URL, e.g. "https://ems.example.org/suite"
    ///
    /// The scheme is only set when the input names one. A trailing slash on
    /// the path is dropped so that endpoint paths can be appended.
    pub fn from_input(input: &str) -> Result<Self> {
        let input = input.trim();

        if input.is_empty() {
            bail!("portal URL is required");
        }

        let mut builder = Self::new();

        let parsed_url = match input {
            input if input.starts_with("http://") || input.starts_with("https://") => {
                let parsed_url = input.parse::<Url>().context("parse URL")?;
                builder.scheme = Some(parsed_url.scheme().to_string());
                parsed_url
            }

            s => format!("https://{}", s)
                .parse::<Url>()
                .context("parse URL")?,
        };

        builder.hostname = Some(parsed_url.host_str().context("get host")?.to_string());
        builder.port = parsed_url.port().map(|p| p.to_string());
        builder.path = Some(parsed_url.path().trim_end_matches('/').to_string());

        Ok(builder)
    }

    /// Creates a new empty URL builder
    fn new() -> Self {
        Self {
            scheme: None,
            hostname: None,
            port: None,
            path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bare_host() {
        let url = URLBuilder::from_input("ems.example.org").unwrap();

        assert_eq!(url.scheme, None);
        assert_eq!(url.hostname.as_deref(), Some("ems.example.org"));
        assert_eq!(url.port, None);
        assert_eq!(url.path.as_deref(), Some(""));
    }

    #[test]
    fn parse_host_with_port() {
        let url = URLBuilder::from_input("ems.example.org:8443").unwrap();
        assert_eq!(url.authority().unwrap(), "ems.example.org:8443");
    }

    #[test]
    fn parse_full_url_with_prefix() {
        let url = URLBuilder::from_input("http://127.0.0.1:8080/suite/").unwrap();
        assert_eq!(url.build().unwrap(), "http://127.0.0.1:8080/suite");
    }

    #[test]
    fn default_port_is_implied() {
        let mut url = URLBuilder::from_input("ems.example.org:443").unwrap();
        url.scheme = Some("https".to_string());

        assert_eq!(url.build().unwrap(), "https://ems.example.org");
    }

    #[test]
    fn reject_empty_input() {
        let error = URLBuilder::from_input("  ").unwrap_err();
        assert_eq!(error.to_string(), "portal URL is required");
    }

    #[test]
    fn build_requires_scheme() {
        let url = URLBuilder::from_input("ems.example.org").unwrap();
        assert_eq!(url.build().unwrap_err().to_string(), "scheme is required");
    }
}
