//! Open Graph documents for chat-client link previews.
//!
//! Discord reads `og:*` meta tags plus an optional oEmbed document; nothing in
//! the page body is ever shown, so the documents here are head-only.

use std::fmt::Write;

use serde::Serialize;

use crate::adapter::AdaptedItemDetails;

pub const SITE_NAME: &str = "TikTxk - Prettier Embeds";
pub const PROVIDER_NAME: &str = "TikTxk - Embed using s/o/x";
pub const PROVIDER_URL: &str = "https://github.com/britmoji/tiktxk";
pub const ERROR_COLOR: &str = "#f44336";
const THEME_COLORS: [&str; 2] = ["#69C9D0", "#EE1D52"];

/// Slideshows show at most this many images in one preview.
pub const MAX_PREVIEW_IMAGES: usize = 4;

/// User agents containing this marker get embed HTML instead of a redirect.
pub const DISCORD_MARKER: &str = "Discordbot";

pub fn is_discord(user_agent: Option<&str>, raw: bool) -> bool {
    !raw && user_agent.is_some_and(|agent| agent.contains(DISCORD_MARKER))
}

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Compact counter formatting: `999`, `1.2K`, `3.4M`, `1B`.
pub fn format_number(value: u64) -> String {
    const UNITS: [(u64, &str); 3] = [
        (1_000_000_000, "B"),
        (1_000_000, "M"),
        (1_000, "K"),
    ];
    for (scale, suffix) in UNITS {
        if value >= scale {
            // one decimal, truncated rather than rounded up to the next unit
            let tenths = value / (scale / 10);
            let whole = tenths / 10;
            let fraction = tenths % 10;
            return if fraction == 0 {
                format!("{whole}{suffix}")
            } else {
                format!("{whole}.{fraction}{suffix}")
            };
        }
    }
    value.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedAuthor {
    pub name: String,
    pub url: Option<String>,
}

/// Everything one preview document needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscordEmbed {
    pub title: Option<String>,
    pub color: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub author: Option<EmbedAuthor>,
    /// Pre-rendered preview meta tags.
    pub preview: String,
}

/// oEmbed document fetched by Discord for the author line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OEmbed {
    pub author_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_url: Option<String>,
    pub provider_name: &'static str,
    pub provider_url: &'static str,
    pub title: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub version: &'static str,
}

impl OEmbed {
    pub fn new(author_name: impl Into<String>, author_url: Option<String>) -> Self {
        Self {
            author_name: author_name.into(),
            author_url,
            provider_name: PROVIDER_NAME,
            provider_url: PROVIDER_URL,
            title: "TikTok Embed",
            kind: "link",
            version: "1.0",
        }
    }
}

fn meta(out: &mut String, property: &str, content: &str) {
    let _ = writeln!(
        out,
        r#"<meta property="{}" content="{}" />"#,
        html_escape(property),
        html_escape(content)
    );
}

fn video_preview(item: &AdaptedItemDetails, host_url: &str) -> String {
    let mut out = String::new();
    meta(&mut out, "og:video", &format!("{host_url}/meta/{}/video", item.id));
    meta(&mut out, "og:video:type", "video/mp4");
    meta(&mut out, "og:video:width", "1080");
    meta(&mut out, "og:video:height", "1920");
    meta(&mut out, "og:type", "video.other");
    out
}

fn image_previews(item: &AdaptedItemDetails, host_url: &str) -> String {
    let mut out = String::new();
    let Some(post) = &item.image_post else {
        return out;
    };
    for (index, image) in post.images.iter().take(MAX_PREVIEW_IMAGES).enumerate() {
        meta(
            &mut out,
            "og:image",
            &format!("{host_url}/meta/{}/image/{index}", item.id),
        );
        meta(&mut out, "og:image:type", "image/jpeg");
        if let Some(width) = image.width {
            meta(&mut out, "og:image:width", &width.to_string());
        }
        if let Some(height) = image.height {
            meta(&mut out, "og:image:height", &height.to_string());
        }
        meta(&mut out, "og:type", "image.other");
        meta(&mut out, "twitter:card", "summary_large_image");
    }
    out
}

/// Builds the preview for an adapted item. Slideshows preview their images,
/// everything else previews the video.
pub fn item_embed(item: &AdaptedItemDetails, host_url: &str) -> DiscordEmbed {
    let likes = format_number(item.statistics.likes);
    let comments = format_number(item.statistics.comments);
    let username = &item.author.username;

    let (heading, preview) = if item.is_slideshow() {
        (
            format!("@{username} (slideshow)"),
            image_previews(item, host_url),
        )
    } else {
        (format!("@{username}"), video_preview(item, host_url))
    };

    DiscordEmbed {
        title: Some(format!("❤️ {likes} 💬 {comments}")),
        color: None,
        description: item.description.clone(),
        url: Some(format!("https://tiktok.com/@{username}/video/{}", item.id)),
        author: Some(EmbedAuthor {
            name: heading,
            url: Some(format!("https://tiktok.com/@{username}")),
        }),
        preview,
    }
}

/// Embed shown to Discord in place of an error page.
pub fn error_embed(message: &str) -> DiscordEmbed {
    DiscordEmbed {
        title: Some("TikTxk - Error".to_string()),
        color: Some(ERROR_COLOR.to_string()),
        description: Some(message.to_string()),
        ..DiscordEmbed::default()
    }
}

/// Renders the head-only HTML document for `embed`.
///
/// `theme_pick` chooses between the two brand colours when the embed does not
/// set one.
pub fn render_document(embed: &DiscordEmbed, host_url: &str, theme_pick: bool) -> String {
    let mut head = String::new();
    if let Some(title) = &embed.title {
        meta(&mut head, "og:title", title);
    }
    meta(&mut head, "og:site_name", SITE_NAME);
    if let Some(url) = &embed.url {
        meta(&mut head, "og:url", url);
    }
    if let Some(description) = &embed.description {
        meta(&mut head, "og:description", description);
    }
    let color = embed
        .color
        .as_deref()
        .unwrap_or(THEME_COLORS[usize::from(theme_pick)]);
    meta(&mut head, "theme-color", color);

    head.push_str(&embed.preview);

    if let Some(author) = &embed.author {
        let author_url = author.url.as_deref().unwrap_or(host_url);
        let oembed = format!(
            "{host_url}/internal/embed?authorName={}&authorUrl={}",
            urlencoding::encode(&author.name),
            urlencoding::encode(author_url)
        );
        let _ = writeln!(
            head,
            r#"<link rel="alternate" href="{}" type="application/json+oembed" />"#,
            html_escape(&oembed)
        );
    }

    format!("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n{head}</head>\n</html>\n")
}
