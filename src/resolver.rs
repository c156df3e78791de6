//! Turns the many shapes of TikTok link into a canonical numeric item id.

use std::{fmt, sync::LazyLock};

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::{
    error::ResolveError,
    http::{BROWSER_USER_AGENT, Transport, UpstreamRequest},
};

/// Where short-link tokens are expanded.
pub const SHORT_LINK_BASE: &str = "https://www.tiktok.com/t";

static NUMERIC_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]+$").unwrap());

static VANITY_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:https?://)?(?:(?:www|m)\.)?tiktok\.com/@(?P<author>[^/?#]+)/(?:video|photo)/(?P<id>[0-9]+)(?:[/?#]|$)",
    )
    .unwrap()
});

static SHORT_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:https?://)?(?:(?:vm|vt)\.tiktok\.com/|(?:(?:www|m)\.)?tiktok\.com/t/)(?P<token>[A-Za-z0-9]+)/?(?:[?#].*)?$",
    )
    .unwrap()
});

static SHORT_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]+$").unwrap());

/// A TikTok post id. Always a non-empty string of ASCII digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Validates `value` without touching the network.
    pub fn parse(value: &str) -> Result<Self, ResolveError> {
        if NUMERIC_ID.is_match(value) {
            Ok(Self(value.to_string()))
        } else {
            Err(ResolveError::InvalidId(value.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ItemId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Recognised input shapes, classified before any request is made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkKind {
    Id(ItemId),
    Vanity { author: String, id: ItemId },
    Short { token: String },
}

/// Classifies `input` purely syntactically.
pub fn classify(input: &str) -> Result<LinkKind, ResolveError> {
    let input = input.trim();
    if NUMERIC_ID.is_match(input) {
        return Ok(LinkKind::Id(ItemId(input.to_string())));
    }
    if let Some((author, id)) = match_vanity(input) {
        return Ok(LinkKind::Vanity { author, id });
    }
    if let Some(captures) = SHORT_LINK.captures(input) {
        return Ok(LinkKind::Short {
            token: captures["token"].to_string(),
        });
    }
    Err(ResolveError::InvalidId(input.to_string()))
}

/// Applies the vanity pattern, returning `(author, id)`.
pub fn match_vanity(url: &str) -> Option<(String, ItemId)> {
    VANITY_URL.captures(url).map(|captures| {
        (
            captures["author"].to_string(),
            ItemId(captures["id"].to_string()),
        )
    })
}

/// Builds the short-link URL for a bare token taken from a request path.
pub fn short_link_for(token: &str) -> Result<String, ResolveError> {
    if SHORT_TOKEN.is_match(token) {
        Ok(format!("https://vm.tiktok.com/{token}/"))
    } else {
        Err(ResolveError::InvalidId(token.to_string()))
    }
}

/// Resolves any supported link shape to an [`ItemId`].
///
/// Numeric ids and vanity links are answered locally. Short links cost exactly
/// one request, without retry, to the redirect target for their token.
pub fn resolve(transport: &dyn Transport, input: &str) -> Result<ItemId, ResolveError> {
    match classify(input)? {
        LinkKind::Id(id) => Ok(id),
        LinkKind::Vanity { id, .. } => Ok(id),
        LinkKind::Short { token } => follow_short_link(transport, &token),
    }
}

fn follow_short_link(transport: &dyn Transport, token: &str) -> Result<ItemId, ResolveError> {
    let request = UpstreamRequest::get(format!("{SHORT_LINK_BASE}/{token}/"))
        .header("User-Agent", BROWSER_USER_AGENT);
    let response = transport.execute(&request)?;

    if response.status != 200 {
        return Err(ResolveError::Upstream(format!(
            "{} answered with HTTP {}",
            request.url, response.status
        )));
    }

    debug!(token, location = %response.final_url, "short link expanded");
    match_vanity(&response.final_url)
        .map(|(_, id)| id)
        .ok_or(ResolveError::FailedToParseVideoId(response.final_url))
}
