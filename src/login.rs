use std::fmt;

use scraper::{Html, Selector};

use crate::{
    error::{Result, ScrapeError},
    session::Session,
};

pub const LOGIN_PATH: &str = "/login";

const TOKEN_SELECTOR: &str = r#"input[name="authenticityToken"]"#;

/// The anti-forgery value echoed back with the login form
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AuthenticityToken(pub String);

/// The account the portal scopes every report query to
#[derive(Clone, Debug, PartialEq)]
pub struct AccountId(pub String);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Fetches the login page and extracts its authenticity token
///
/// A page without a token yields an empty one. The login is still attempted
/// with it and fails later if the portal insists on a token.
pub async fn fetch_token(session: &Session) -> Result<AuthenticityToken> {
    let body = session.get_page(&session.endpoint(LOGIN_PATH)).await?;
    let token = extract_token(&body)?;

    if token.0.is_empty() {
        log::warn!("login page carries no authenticity token, submitting an empty one");
    }

    Ok(token)
}

/// Submits the login form and discovers the account id on the landing page
pub async fn login(
    session: &Session,
    token: &AuthenticityToken,
    credentials: &Credentials,
    menu: &str,
) -> Result<AccountId> {
    let form = [
        ("authenticityToken", token.0.as_str()),
        ("username", credentials.username.as_str()),
        ("password", credentials.password.as_str()),
    ];

    let body = session
        .post_form(&session.endpoint(LOGIN_PATH), &form)
        .await?;
    let account = extract_account(&body, menu)?;

    log::info!(
        "logged in as {:?}, account {}",
        credentials.username,
        account
    );

    Ok(account)
}

pub fn extract_token(html: &str) -> Result<AuthenticityToken> {
    let document = Html::parse_document(html);
    let selector = selector(TOKEN_SELECTOR)?;

    let token = document
        .select(&selector)
        .next()
        .and_then(|input| input.value().attr("value"))
        .unwrap_or_default();

    Ok(AuthenticityToken(token.to_string()))
}

/// Reads the account id from the navigation entry of `menu`
///
/// The entry's href looks like "/<section>/<account>/...". The account is the
/// third "/"-separated segment, counting the empty one before the leading
/// slash. A rejected login renders no such entry, so bad credentials surface
/// as a missing account too.
pub fn extract_account(html: &str, menu: &str) -> Result<AccountId> {
    let document = Html::parse_document(html);
    let selector = selector(&format!(
        r#"li [id="{}"] a"#,
        menu.replace('\\', "\\\\").replace('"', "\\\"")
    ))?;

    let href = document
        .select(&selector)
        .next()
        .and_then(|anchor| anchor.value().attr("href"))
        .unwrap_or_default();

    href.split('/')
        .nth(2)
        .map(|segment| AccountId(segment.to_string()))
        .ok_or(ScrapeError::AccountNotFound)
}

fn selector(selectors: &str) -> Result<Selector> {
    Selector::parse(selectors)
        .map_err(|err| ScrapeError::Parse(format!("invalid selector {}: {:?}", selectors, err)))
}
