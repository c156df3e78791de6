//! Normalises every upstream schema into [`AdaptedItemDetails`].
//!
//! Adaptation is pure and total: missing fields are defaulted, never errors.
//! Whenever a source offers a ladder of URLs for the same asset, the last entry
//! is the highest quality one and is the one picked.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::upstream::{
    SourceKind, UpstreamSource,
    internal::{AssetDetail, Aweme},
    public::PublicItemDetails,
    web::{WebImage, WebImagePost, WebItem, WebStats},
};

/// Width used when the upstream omits video dimensions.
pub const DEFAULT_VIDEO_WIDTH: u64 = 1920;
/// Height used when the upstream omits video dimensions.
pub const DEFAULT_VIDEO_HEIGHT: u64 = 1080;

/// Pointer to a remotely hosted asset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSource {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u64>,
}

impl MediaSource {
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            width: None,
            height: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub likes: u64,
    pub comments: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub username: String,
}

/// Slideshow content. When present it takes precedence over `video`/`image`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePost {
    pub images: Vec<MediaSource>,
}

/// Which upstream produced an item, with its raw payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum Provenance {
    Internal(Value),
    Public(Value),
    Embedded(Value),
}

impl Provenance {
    pub fn kind(&self) -> SourceKind {
        match self {
            Provenance::Internal(_) => SourceKind::Internal,
            Provenance::Public(_) => SourceKind::Public,
            Provenance::Embedded(_) => SourceKind::Embedded,
        }
    }

    pub fn data(&self) -> &Value {
        match self {
            Provenance::Internal(data) | Provenance::Public(data) | Provenance::Embedded(data) => {
                data
            }
        }
    }
}

/// The stable item contract every renderer consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptedItemDetails {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub video: MediaSource,
    pub image: MediaSource,
    pub audio: MediaSource,
    pub statistics: Statistics,
    pub author: Author,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_post: Option<ImagePost>,
    pub src: Provenance,
}

impl AdaptedItemDetails {
    pub fn is_slideshow(&self) -> bool {
        self.image_post.is_some()
    }

    /// Image shown for slideshow slot `index`.
    ///
    /// Out-of-range indices clamp to the last slide; items without a slideshow
    /// fall back to the cover image.
    pub fn slide(&self, index: usize) -> &MediaSource {
        match &self.image_post {
            Some(post) if !post.images.is_empty() => {
                &post.images[index.min(post.images.len() - 1)]
            }
            _ => &self.image,
        }
    }

    /// Canonical link to the post on TikTok.
    pub fn canonical_url(&self) -> String {
        let kind = if self.is_slideshow() { "photo" } else { "video" };
        format!(
            "https://www.tiktok.com/@{}/{kind}/{}",
            self.author.username, self.id
        )
    }
}

/// Maps any upstream item onto the stable contract.
pub fn adapt(source: &UpstreamSource) -> AdaptedItemDetails {
    match source {
        UpstreamSource::Internal { item, raw } => adapt_internal(item, raw),
        UpstreamSource::Public { item, raw } => adapt_public(item, raw),
        UpstreamSource::Embedded { item, raw } => adapt_embedded(item, raw),
    }
}

fn last_url(urls: &[String]) -> Option<&String> {
    urls.iter().rev().find(|url| !url.is_empty())
}

fn ladder_url(asset: Option<&AssetDetail>) -> Option<String> {
    asset.and_then(|asset| last_url(&asset.url_list)).cloned()
}

fn non_zero(value: Option<u64>) -> Option<u64> {
    value.filter(|value| *value > 0)
}

fn video_source(url: Option<String>, width: Option<u64>, height: Option<u64>) -> MediaSource {
    MediaSource {
        url: url.unwrap_or_default(),
        width: Some(non_zero(width).unwrap_or(DEFAULT_VIDEO_WIDTH)),
        height: Some(non_zero(height).unwrap_or(DEFAULT_VIDEO_HEIGHT)),
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty()).cloned()
}

fn adapt_internal(item: &Aweme, raw: &Value) -> AdaptedItemDetails {
    let video = item.video.as_ref();
    let play = video.and_then(|video| video.play_addr.as_ref());

    let video_url = ladder_url(play)
        .or_else(|| ladder_url(video.and_then(|video| video.download_addr.as_ref())));

    let images: Vec<MediaSource> = item
        .image_post_info
        .as_ref()
        .map(|info| {
            info.images
                .iter()
                .filter_map(|image| image.display_image.as_ref())
                .filter_map(|display| {
                    last_url(&display.url_list).map(|url| MediaSource {
                        url: url.clone(),
                        width: non_zero(display.width),
                        height: non_zero(display.height),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let cover = ladder_url(video.and_then(|video| video.cover.as_ref()))
        .or_else(|| ladder_url(video.and_then(|video| video.origin_cover.as_ref())));
    let thumbnail = images
        .first()
        .map(|image| image.url.clone())
        .or(cover)
        .unwrap_or_default();

    let stats = item.statistics.as_ref();

    AdaptedItemDetails {
        id: item.aweme_id.clone(),
        description: non_empty(item.desc.as_ref()),
        video: video_source(
            video_url,
            play.and_then(|play| play.width),
            play.and_then(|play| play.height),
        ),
        image: MediaSource::url(thumbnail),
        audio: MediaSource::url(
            ladder_url(item.music.as_ref().and_then(|music| music.play_url.as_ref()))
                .unwrap_or_default(),
        ),
        statistics: Statistics {
            likes: stats.and_then(|stats| stats.digg_count).unwrap_or(0),
            comments: stats.and_then(|stats| stats.comment_count).unwrap_or(0),
        },
        author: Author {
            username: item
                .author
                .as_ref()
                .and_then(|author| author.unique_id.clone())
                .unwrap_or_default(),
        },
        image_post: item.image_post_info.as_ref().map(|_| ImagePost { images }),
        src: Provenance::Internal(raw.clone()),
    }
}

fn web_image(image: &WebImage) -> Option<MediaSource> {
    let url = image.image_url.as_ref().and_then(|url| last_url(&url.url_list))?;
    Some(MediaSource {
        url: url.clone(),
        width: non_zero(image.image_width),
        height: non_zero(image.image_height),
    })
}

fn web_image_post(post: Option<&WebImagePost>) -> Option<ImagePost> {
    post.map(|post| ImagePost {
        images: post.images.iter().filter_map(web_image).collect(),
    })
}

fn web_thumbnail(item: &WebItem, image_post: Option<&ImagePost>) -> String {
    let slide = image_post
        .and_then(|post| post.images.first())
        .map(|image| image.url.clone());
    let post_cover = item
        .image_post
        .as_ref()
        .and_then(|post| post.cover.as_ref())
        .and_then(web_image)
        .map(|image| image.url);
    let video = item.video.as_ref();
    let video_cover = video
        .and_then(|video| non_empty(video.cover.as_ref()))
        .or_else(|| video.and_then(|video| non_empty(video.origin_cover.as_ref())));

    slide.or(post_cover).or(video_cover).unwrap_or_default()
}

fn web_statistics(stats: Option<&WebStats>) -> Statistics {
    Statistics {
        likes: stats.and_then(|stats| stats.digg_count).unwrap_or(0),
        comments: stats.and_then(|stats| stats.comment_count).unwrap_or(0),
    }
}

fn web_common(
    item: &WebItem,
    video_url: Option<String>,
    statistics: Statistics,
    description: Option<String>,
    src: Provenance,
) -> AdaptedItemDetails {
    let video = item.video.as_ref();
    let image_post = web_image_post(item.image_post.as_ref());
    let thumbnail = web_thumbnail(item, image_post.as_ref());

    AdaptedItemDetails {
        id: item.id.clone(),
        description,
        video: video_source(
            video_url,
            video.and_then(|video| video.width),
            video.and_then(|video| video.height),
        ),
        image: MediaSource::url(thumbnail),
        audio: MediaSource::url(
            item.music
                .as_ref()
                .and_then(|music| non_empty(music.play_url.as_ref()))
                .unwrap_or_default(),
        ),
        statistics,
        author: Author {
            username: item
                .author
                .as_ref()
                .and_then(|author| author.unique_id.clone())
                .unwrap_or_default(),
        },
        image_post,
        src,
    }
}

/// The web API offers a single download URL and plain numeric counters.
fn adapt_public(details: &PublicItemDetails, raw: &Value) -> AdaptedItemDetails {
    let fallback = WebItem::default();
    let item = details.item().unwrap_or(&fallback);
    let video = item.video.as_ref();
    let video_url = video
        .and_then(|video| non_empty(video.download_addr.as_ref()))
        .or_else(|| video.and_then(|video| non_empty(video.play_addr.as_ref())));

    let description = non_empty(item.desc.as_ref()).or_else(|| {
        details
            .share_meta
            .as_ref()
            .and_then(|meta| non_empty(meta.desc.as_ref()))
    });

    web_common(
        item,
        video_url,
        web_statistics(item.stats.as_ref()),
        description,
        Provenance::Public(raw.clone()),
    )
}

/// Page hydration data carries the bitrate ladder and string counters.
fn adapt_embedded(item: &WebItem, raw: &Value) -> AdaptedItemDetails {
    let video = item.video.as_ref();
    let top_rung = video
        .and_then(|video| video.bitrate_info.last())
        .and_then(|rung| rung.play_addr.as_ref())
        .and_then(|addr| last_url(&addr.url_list))
        .cloned();
    let video_url = top_rung
        .or_else(|| video.and_then(|video| non_empty(video.play_addr.as_ref())))
        .or_else(|| video.and_then(|video| non_empty(video.download_addr.as_ref())));

    let stats = match (&item.stats_v2, &item.stats) {
        (Some(v2), _) if v2.digg_count.is_some() || v2.comment_count.is_some() => Some(v2),
        (_, stats) => stats.as_ref(),
    };

    web_common(
        item,
        video_url,
        web_statistics(stats),
        non_empty(item.desc.as_ref()),
        Provenance::Embedded(raw.clone()),
    )
}
