//! Mobile app feed (`/aweme/v1/feed/`).
//!
//! Richest schema we have access to (URL ladders, slideshow images, numeric
//! counters) and the most fragile: any app-version profile can be rejected at
//! any time, which the feed signals by answering with an empty body.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{SourceKind, UpstreamSource, de};
use crate::{
    device::{APP_PROFILES, AppProfile, DeviceIdentity},
    error::SourceError,
    http::{Transport, UpstreamRequest},
    resolver::ItemId,
};

pub const FEED_URL: &str = "https://api22-normal-c-useast2a.tiktokv.com/aweme/v1/feed/";

const KIND: SourceKind = SourceKind::Internal;

/// Body of a feed response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedResponse {
    #[serde(default)]
    pub aweme_list: Vec<Value>,
}

/// A single post as the app sees it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Aweme {
    #[serde(deserialize_with = "de::id_string")]
    pub aweme_id: String,
    pub desc: Option<String>,
    pub author: Option<AwemeAuthor>,
    pub music: Option<AwemeMusic>,
    pub video: Option<AwemeVideo>,
    pub image_post_info: Option<ImagePostInfo>,
    pub statistics: Option<AwemeStatistics>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AwemeAuthor {
    pub unique_id: Option<String>,
    pub nickname: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AwemeMusic {
    pub play_url: Option<AssetDetail>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AwemeVideo {
    pub play_addr: Option<AssetDetail>,
    pub download_addr: Option<AssetDetail>,
    pub cover: Option<AssetDetail>,
    pub origin_cover: Option<AssetDetail>,
}

/// URL ladder for one asset. The best variant sorts last.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetDetail {
    pub uri: Option<String>,
    pub url_list: Vec<String>,
    #[serde(deserialize_with = "de::count")]
    pub width: Option<u64>,
    #[serde(deserialize_with = "de::count")]
    pub height: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagePostInfo {
    pub images: Vec<ImagePostImage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagePostImage {
    pub display_image: Option<AssetDetail>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AwemeStatistics {
    #[serde(deserialize_with = "de::count")]
    pub digg_count: Option<u64>,
    #[serde(deserialize_with = "de::count")]
    pub comment_count: Option<u64>,
    #[serde(deserialize_with = "de::count")]
    pub share_count: Option<u64>,
    #[serde(deserialize_with = "de::count")]
    pub play_count: Option<u64>,
}

/// Builds the feed request for one profile and a fresh device identity.
pub fn feed_request(id: &ItemId, profile: &AppProfile, device: &DeviceIdentity) -> UpstreamRequest {
    let mut request = UpstreamRequest::get(FEED_URL).header("User-Agent", profile.user_agent());
    request.query = device.feed_query(profile, id.as_str());
    request
}

/// Asks the feed for `id`, cycling through the known app profiles until one of
/// them is answered with a non-empty, decodable body.
pub fn fetch(transport: &dyn Transport, id: &ItemId) -> Result<UpstreamSource, SourceError> {
    let mut rng = rand::thread_rng();

    for profile in APP_PROFILES {
        let device = DeviceIdentity::generate(&mut rng, Utc::now());
        let request = feed_request(id, profile, &device);

        let response = match transport.execute(&request) {
            Ok(response) => response,
            Err(error) => {
                debug!(version = profile.version_name, %error, "feed profile failed");
                continue;
            }
        };
        if !response.is_success() {
            debug!(version = profile.version_name, status = response.status, "feed profile rejected");
            continue;
        }
        if response.is_empty() {
            debug!(version = profile.version_name, "feed profile returned an empty body");
            continue;
        }

        let feed: FeedResponse = match serde_json::from_str(&response.body) {
            Ok(feed) => feed,
            Err(error) => {
                debug!(version = profile.version_name, %error, "feed body is not JSON");
                continue;
            }
        };

        return select_item(feed, id);
    }

    Err(SourceError::ProfilesExhausted { source_kind: KIND })
}

/// The feed answers with a list of recommendations that may or may not start
/// with the item asked for. Only an exact id match counts.
pub fn select_item(feed: FeedResponse, id: &ItemId) -> Result<UpstreamSource, SourceError> {
    for raw in feed.aweme_list {
        let matches = match raw.get("aweme_id") {
            Some(Value::String(value)) => value == id.as_str(),
            Some(Value::Number(value)) => value.to_string() == id.as_str(),
            _ => false,
        };
        if !matches {
            continue;
        }
        let item: Aweme = serde_json::from_value(raw.clone()).map_err(|error| SourceError::Decode {
            source_kind: KIND,
            error,
        })?;
        return Ok(UpstreamSource::Internal { item, raw });
    }
    Err(SourceError::MissingItem { source_kind: KIND })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::{FakeTransport, empty, ok, status};
    use serde_json::json;

    fn id() -> ItemId {
        ItemId::parse("7106658991907802374").unwrap()
    }

    fn feed_with(ids: &[&str]) -> String {
        let list: Vec<Value> = ids
            .iter()
            .map(|id| json!({"aweme_id": id, "desc": format!("post {id}")}))
            .collect();
        json!({ "aweme_list": list }).to_string()
    }

    #[test]
    fn empty_profiles_are_skipped_until_one_answers() {
        let transport = FakeTransport::new();
        transport
            .respond("tiktokv.com", empty())
            .respond("tiktokv.com", status(403))
            .respond("tiktokv.com", ok(feed_with(&["1", "7106658991907802374"])));

        let source = fetch(&transport, &id()).unwrap();
        let UpstreamSource::Internal { item, .. } = source else {
            panic!("expected internal source");
        };
        assert_eq!(item.desc.as_deref(), Some("post 7106658991907802374"));

        let requests = transport.requests.lock();
        assert_eq!(requests.len(), 3);
        let codes: Vec<_> = requests
            .iter()
            .map(|req| req.query_value("version_code").unwrap().to_string())
            .collect();
        assert_eq!(codes, vec!["260103", "260102", "260101"]);
        assert!(requests[2].header_value("User-Agent").unwrap().contains("/260101 "));
    }

    #[test]
    fn every_profile_empty_means_unavailable() {
        let transport = FakeTransport::new();
        for _ in APP_PROFILES {
            transport.respond("tiktokv.com", empty());
        }
        let err = fetch(&transport, &id()).unwrap_err();
        assert!(matches!(err, SourceError::ProfilesExhausted { .. }));
        assert_eq!(transport.request_count(), APP_PROFILES.len());
    }

    #[test]
    fn feed_without_the_requested_item_is_missing() {
        let transport = FakeTransport::new();
        transport.respond("tiktokv.com", ok(feed_with(&["1", "2"])));
        let err = fetch(&transport, &id()).unwrap_err();
        assert!(matches!(err, SourceError::MissingItem { .. }));
    }

    #[test]
    fn malformed_body_moves_to_the_next_profile() {
        let transport = FakeTransport::new();
        transport
            .respond("tiktokv.com", ok("<html>blocked</html>"))
            .respond("tiktokv.com", ok(feed_with(&["7106658991907802374"])));
        assert!(fetch(&transport, &id()).is_ok());
    }

    #[test]
    fn numeric_aweme_ids_still_match() {
        let feed: FeedResponse =
            serde_json::from_value(json!({"aweme_list": [{"aweme_id": 7106658991907802374u64}]}))
                .unwrap();
        let source = select_item(feed, &id()).unwrap();
        assert_eq!(source.kind(), SourceKind::Internal);
    }
}
