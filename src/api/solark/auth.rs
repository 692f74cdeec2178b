use http::{HeaderMap, HeaderValue, header};
use serde::Serialize;

use crate::payload::KeyPath;

const PORTAL_ORIGIN: &str = "https://www.mysolark.com";
const PORTAL_REFERER: &str = "https://www.mysolark.com/";

/// Where the access token may sit in the token response.
pub const ACCESS_TOKEN: &[KeyPath] = &[&["data", "access_token"], &["access_token"]];

/// Controls which HTTP headers accompany the token requests.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, clap::ValueEnum)]
pub enum AuthMode {
    /// Try the strict headers first and fall back to the legacy ones.
    #[default]
    Auto,

    /// Pretend to be the web portal: send `Origin` and `Referer`.
    Strict,

    /// Minimal headers.
    Legacy,
}

impl AuthMode {
    /// Header sets to try, in order.
    pub const fn header_sets(self) -> &'static [HeaderSet] {
        match self {
            Self::Auto => &[HeaderSet::Strict, HeaderSet::Legacy],
            Self::Strict => &[HeaderSet::Strict],
            Self::Legacy => &[HeaderSet::Legacy],
        }
    }
}

/// Concrete set of headers sent with a token request.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HeaderSet {
    Strict,
    Legacy,
}

impl HeaderSet {
    pub fn headers(self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.append(header::ACCEPT, HeaderValue::from_static("application/json"));
        if self == Self::Strict {
            headers.append(header::ORIGIN, HeaderValue::from_static(PORTAL_ORIGIN));
            headers.append(header::REFERER, HeaderValue::from_static(PORTAL_REFERER));
        }
        headers
    }
}

#[derive(Serialize)]
pub struct TokenRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,

    #[serde(rename = "grant_type")]
    pub grant_type: &'static str,

    #[serde(rename = "client_id")]
    pub client_id: &'static str,
}

impl<'a> TokenRequest<'a> {
    pub const fn new(username: &'a str, password: &'a str) -> Self {
        Self { username, password, grant_type: "password", client_id: "csp-web" }
    }
}
