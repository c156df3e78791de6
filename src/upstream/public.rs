//! Unauthenticated web item-detail API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{SourceKind, UpstreamSource, de, web::WebItem};
use crate::{
    error::SourceError,
    http::{BROWSER_USER_AGENT, Transport, UpstreamRequest},
    resolver::ItemId,
};

pub const ITEM_DETAIL_URL: &str = "https://www.tiktok.com/api/item/detail/";

const KIND: SourceKind = SourceKind::Public;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PublicItemDetails {
    #[serde(deserialize_with = "de::status_code")]
    pub status_code: Option<i64>,
    pub item_info: Option<ItemInfo>,
    pub share_meta: Option<ShareMeta>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ItemInfo {
    pub item_struct: Option<WebItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShareMeta {
    pub desc: Option<String>,
    pub title: Option<String>,
}

impl PublicItemDetails {
    pub fn item(&self) -> Option<&WebItem> {
        self.item_info.as_ref()?.item_struct.as_ref()
    }
}

pub fn detail_request(id: &ItemId) -> UpstreamRequest {
    UpstreamRequest::get(ITEM_DETAIL_URL)
        .query_pair("itemId", id.as_str())
        .header("User-Agent", BROWSER_USER_AGENT)
}

pub fn fetch(transport: &dyn Transport, id: &ItemId) -> Result<UpstreamSource, SourceError> {
    let response = transport
        .execute(&detail_request(id))
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

    let raw: Value = serde_json::from_str(&response.body).map_err(|error| SourceError::Decode {
        source_kind: KIND,
        error,
    })?;
    parse(raw, id)
}

/// Validates a decoded detail payload.
pub fn parse(raw: Value, id: &ItemId) -> Result<UpstreamSource, SourceError> {
    let item: PublicItemDetails =
        serde_json::from_value(raw.clone()).map_err(|error| SourceError::Decode {
            source_kind: KIND,
            error,
        })?;

    match item.status_code {
        Some(status) if status != 0 => {
            return Err(SourceError::Unavailable {
                source_kind: KIND,
                status,
            });
        }
        _ => {}
    }

    match item.item() {
        Some(web) if !web.is_empty() && web.id == id.as_str() => {}
        _ => return Err(SourceError::MissingItem { source_kind: KIND }),
    }

    Ok(UpstreamSource::Public { item, raw })
}
