//! The `itemStruct` schema shared by the web API and the page hydration data.

use serde::{Deserialize, Serialize};

use super::de;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WebItem {
    #[serde(deserialize_with = "de::id_string")]
    pub id: String,
    pub desc: Option<String>,
    pub video: Option<WebVideo>,
    pub author: Option<WebAuthor>,
    pub music: Option<WebMusic>,
    pub stats: Option<WebStats>,
    /// Newer pages carry string counters here and leave `stats` stale.
    pub stats_v2: Option<WebStats>,
    pub image_post: Option<WebImagePost>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WebVideo {
    #[serde(deserialize_with = "de::count")]
    pub height: Option<u64>,
    #[serde(deserialize_with = "de::count")]
    pub width: Option<u64>,
    pub cover: Option<String>,
    pub origin_cover: Option<String>,
    pub play_addr: Option<String>,
    pub download_addr: Option<String>,
    pub bitrate_info: Vec<BitrateInfo>,
}

/// One rung of the bitrate ladder. The page uses PascalCase here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct BitrateInfo {
    #[serde(deserialize_with = "de::count")]
    pub bitrate: Option<u64>,
    pub gear_name: Option<String>,
    pub play_addr: Option<BitratePlayAddr>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct BitratePlayAddr {
    pub url_list: Vec<String>,
    #[serde(deserialize_with = "de::count")]
    pub width: Option<u64>,
    #[serde(deserialize_with = "de::count")]
    pub height: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WebAuthor {
    pub unique_id: Option<String>,
    pub nickname: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WebMusic {
    pub play_url: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WebStats {
    #[serde(deserialize_with = "de::count")]
    pub digg_count: Option<u64>,
    #[serde(deserialize_with = "de::count")]
    pub comment_count: Option<u64>,
    #[serde(deserialize_with = "de::count")]
    pub share_count: Option<u64>,
    #[serde(deserialize_with = "de::count")]
    pub play_count: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WebImagePost {
    pub images: Vec<WebImage>,
    pub cover: Option<WebImage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WebImage {
    #[serde(rename = "imageURL")]
    pub image_url: Option<WebImageUrl>,
    #[serde(deserialize_with = "de::count")]
    pub image_width: Option<u64>,
    #[serde(deserialize_with = "de::count")]
    pub image_height: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WebImageUrl {
    pub url_list: Vec<String>,
}

impl WebItem {
    /// True when the payload carries no usable item (deleted posts decode to
    /// an all-default struct).
    pub fn is_empty(&self) -> bool {
        self.id.is_empty()
    }
}
