//! Item data scraped from the hydration state embedded in the video page.
//!
//! The page has carried its server state in three different script tags over
//! the years. Each is tried in turn; whichever is present first decides the
//! outcome, including an explicit "unavailable" status for deleted or private
//! posts.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use super::{SourceKind, UpstreamSource, web::WebItem};
use crate::{
    error::SourceError,
    http::{BROWSER_USER_AGENT, Transport, UpstreamRequest},
    resolver::ItemId,
};

const KIND: SourceKind = SourceKind::Embedded;

/// Script tag conventions, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hydration {
    /// `__UNIVERSAL_DATA_FOR_REHYDRATION__`
    Universal,
    /// Legacy `SIGI_STATE`.
    Sigi,
    /// `__NEXT_DATA__` from the Next.js era.
    NextData,
}

impl Hydration {
    pub const ALL: [Hydration; 3] = [Hydration::Universal, Hydration::Sigi, Hydration::NextData];

    pub fn script_id(&self) -> &'static str {
        match self {
            Hydration::Universal => "__UNIVERSAL_DATA_FOR_REHYDRATION__",
            Hydration::Sigi => "SIGI_STATE",
            Hydration::NextData => "__NEXT_DATA__",
        }
    }

    fn pattern(&self) -> &'static Regex {
        match self {
            Hydration::Universal => &UNIVERSAL_TAG,
            Hydration::Sigi => &SIGI_TAG,
            Hydration::NextData => &NEXT_DATA_TAG,
        }
    }

    /// Pulls `(status, item)` out of a decoded blob. `None` when the blob does
    /// not have this convention's layout at all.
    fn locate<'a>(&self, blob: &'a Value, id: &ItemId) -> Option<(i64, Option<&'a Value>)> {
        match self {
            Hydration::Universal => {
                let scope = blob.pointer("/__DEFAULT_SCOPE__/webapp.video-detail")?;
                Some((
                    status_of(scope.get("statusCode")),
                    scope.pointer("/itemInfo/itemStruct"),
                ))
            }
            Hydration::Sigi => {
                let module = blob.get("ItemModule");
                let page = blob.get("VideoPage");
                if module.is_none() && page.is_none() {
                    return None;
                }
                let status = status_of(page.and_then(|page| page.get("statusCode")));
                Some((status, module.and_then(|module| module.get(id.as_str()))))
            }
            Hydration::NextData => {
                let props = blob.pointer("/props/pageProps")?;
                Some((
                    status_of(props.get("statusCode")),
                    props.pointer("/itemInfo/itemStruct"),
                ))
            }
        }
    }
}

fn script_tag(id: &str) -> Regex {
    Regex::new(&format!(r#"<script[^>]*\bid=["']{}["'][^>]*>"#, regex::escape(id))).unwrap()
}

static UNIVERSAL_TAG: LazyLock<Regex> =
    LazyLock::new(|| script_tag(Hydration::Universal.script_id()));
static SIGI_TAG: LazyLock<Regex> = LazyLock::new(|| script_tag(Hydration::Sigi.script_id()));
static NEXT_DATA_TAG: LazyLock<Regex> =
    LazyLock::new(|| script_tag(Hydration::NextData.script_id()));

/// Missing status fields mean "fine"; anything unparsable is treated as an
/// error status.
fn status_of(value: Option<&Value>) -> i64 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Number(n)) => n.as_i64().unwrap_or(-1),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(-1),
        Some(_) => -1,
    }
}

pub fn page_url(id: &ItemId) -> String {
    format!("https://www.tiktok.com/@i/video/{id}")
}

/// Decodes the JSON document that immediately follows the script tag for
/// `convention`. Only the first complete value is read, so trailing markup is
/// never part of the parse.
pub fn extract_blob(html: &str, convention: Hydration) -> Option<Value> {
    let tag = convention.pattern().find(html)?;
    let rest = &html[tag.end()..];
    let value = serde_json::Deserializer::from_str(rest)
        .into_iter::<Value>()
        .next()?
        .ok()?;
    value.is_object().then_some(value)
}

pub fn fetch(transport: &dyn Transport, id: &ItemId) -> Result<UpstreamSource, SourceError> {
    let request = UpstreamRequest::get(page_url(id)).header("User-Agent", BROWSER_USER_AGENT);
    let response = transport
        .execute(&request)
        .map_err(|error| SourceError::Transport {
            source_kind: KIND,
            error,
        })?;

    if response.status != 200 {
        return Err(SourceError::Status {
            source_kind: KIND,
            status: response.status,
        });
    }
    if response.is_empty() {
        return Err(SourceError::EmptyBody { source_kind: KIND });
    }

    parse_page(&response.body, id)
}

/// Walks the hydration conventions over a page body.
pub fn parse_page(html: &str, id: &ItemId) -> Result<UpstreamSource, SourceError> {
    for convention in Hydration::ALL {
        let Some(blob) = extract_blob(html, convention) else {
            continue;
        };
        let Some((status, item)) = convention.locate(&blob, id) else {
            debug!(script = convention.script_id(), "hydration blob has an unknown layout");
            continue;
        };
        if status != 0 {
            return Err(SourceError::Unavailable {
                source_kind: KIND,
                status,
            });
        }
        let Some(raw) = item.cloned() else {
            continue;
        };

        let web: WebItem = match serde_json::from_value(raw.clone()) {
            Ok(web) => web,
            Err(error) => {
                debug!(script = convention.script_id(), %error, "hydration item did not decode");
                continue;
            }
        };
        if web.is_empty() || web.id != id.as_str() {
            continue;
        }
        debug!(script = convention.script_id(), "item found in page hydration data");
        return Ok(UpstreamSource::Embedded { item: web, raw });
    }

    Err(SourceError::MissingItem { source_kind: KIND })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::{FakeTransport, ok, status};
    use serde_json::json;

    const ID: &str = "7106658991907802374";

    fn id() -> ItemId {
        ItemId::parse(ID).unwrap()
    }

    fn page(script_id: &str, blob: &Value) -> String {
        format!(
            r#"<!DOCTYPE html><html><head><script>var x = {{}};</script>
<script id="{script_id}" type="application/json">{blob}</script>
<script src="/app.js"></script></head><body></body></html>"#
        )
    }

    #[test]
    fn universal_blob_is_found() {
        let blob = json!({"__DEFAULT_SCOPE__": {"webapp.video-detail": {
            "statusCode": 0,
            "itemInfo": {"itemStruct": {"id": ID, "desc": "universal"}}
        }}});
        let source = parse_page(&page("__UNIVERSAL_DATA_FOR_REHYDRATION__", &blob), &id()).unwrap();
        let UpstreamSource::Embedded { item, .. } = source else {
            panic!("expected embedded source");
        };
        assert_eq!(item.desc.as_deref(), Some("universal"));
    }

    #[test]
    fn sigi_blob_is_keyed_by_item_id() {
        let blob = json!({
            "VideoPage": {"statusCode": 0},
            "ItemModule": {ID: {"id": ID, "desc": "sigi"}}
        });
        let source = parse_page(&page("SIGI_STATE", &blob), &id()).unwrap();
        assert_eq!(source.raw()["desc"], "sigi");
    }

    #[test]
    fn next_data_blob_is_found() {
        let blob = json!({"props": {"pageProps": {
            "statusCode": "0",
            "itemInfo": {"itemStruct": {"id": ID, "desc": "next"}}
        }}});
        let source = parse_page(&page("__NEXT_DATA__", &blob), &id()).unwrap();
        assert_eq!(source.raw()["desc"], "next");
    }

    #[test]
    fn non_zero_status_short_circuits() {
        let blob = json!({"__DEFAULT_SCOPE__": {"webapp.video-detail": {
            "statusCode": 10204,
            "itemInfo": {"itemStruct": {}}
        }}});
        let err = parse_page(&page("__UNIVERSAL_DATA_FOR_REHYDRATION__", &blob), &id()).unwrap_err();
        assert!(matches!(err, SourceError::Unavailable { status: 10204, .. }));
    }

    #[test]
    fn blob_with_braces_inside_strings_is_isolated() {
        let blob = json!({"props": {"pageProps": {
            "itemInfo": {"itemStruct": {"id": ID, "desc": "</script> {not json"}}
        }}});
        let html = page("__NEXT_DATA__", &blob);
        let extracted = extract_blob(&html, Hydration::NextData).unwrap();
        assert_eq!(extracted, blob);
    }

    #[test]
    fn pages_without_hydration_are_missing() {
        let err = parse_page("<html><body>captcha</body></html>", &id()).unwrap_err();
        assert!(matches!(err, SourceError::MissingItem { .. }));
    }

    #[test]
    fn fetch_requires_http_ok() {
        let transport = FakeTransport::new();
        transport.respond("/video/", status(404));
        assert!(matches!(
            fetch(&transport, &id()).unwrap_err(),
            SourceError::Status { status: 404, .. }
        ));

        let blob = json!({"props": {"pageProps": {"itemInfo": {"itemStruct": {"id": ID}}}}});
        let transport = FakeTransport::new();
        transport.respond("/video/", ok(page("__NEXT_DATA__", &blob)));
        assert!(fetch(&transport, &id()).is_ok());
        assert_eq!(
            transport.urls(),
            vec![format!("https://www.tiktok.com/@i/video/{ID}")]
        );
    }
}
