//! The three upstream data sources and their raw schemas.
//!
//! Each source module knows how to ask for one item and how to decode the
//! answer into its own typed shape. Raw field names never leave this module
//! tree except through [`crate::adapter`].

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod embedded;
pub mod internal;
pub mod public;
pub mod web;

mod de;

/// Provenance tag for an upstream item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Mobile app feed with device spoofing.
    Internal,
    /// Unauthenticated web item-detail API.
    Public,
    /// Hydration data scraped from the public video page.
    Embedded,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [SourceKind::Internal, SourceKind::Public, SourceKind::Embedded];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Internal => "internal",
            SourceKind::Public => "public",
            SourceKind::Embedded => "embedded",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "internal" | "app" => Ok(SourceKind::Internal),
            "public" | "web" => Ok(SourceKind::Public),
            "embedded" | "page" => Ok(SourceKind::Embedded),
            other => Err(format!("unknown upstream source {other:?}")),
        }
    }
}

/// Parses a comma separated source list such as `public,embedded`.
///
/// Duplicates are dropped, keeping the first occurrence.
pub fn parse_source_order(value: &str) -> Result<Vec<SourceKind>, String> {
    let mut order = Vec::new();
    for part in value.split(',').filter(|part| !part.trim().is_empty()) {
        let kind: SourceKind = part.parse()?;
        if !order.contains(&kind) {
            order.push(kind);
        }
    }
    if order.is_empty() {
        return Err("source order must name at least one source".to_string());
    }
    Ok(order)
}

/// An item as returned by whichever source answered first.
///
/// Every variant keeps the raw JSON for the item next to its typed view so
/// renderers can reach for source-specific fields without a second request.
#[derive(Debug, Clone)]
pub enum UpstreamSource {
    Internal {
        item: internal::Aweme,
        raw: Value,
    },
    Public {
        item: public::PublicItemDetails,
        raw: Value,
    },
    Embedded {
        item: web::WebItem,
        raw: Value,
    },
}

impl UpstreamSource {
    pub fn kind(&self) -> SourceKind {
        match self {
            UpstreamSource::Internal { .. } => SourceKind::Internal,
            UpstreamSource::Public { .. } => SourceKind::Public,
            UpstreamSource::Embedded { .. } => SourceKind::Embedded,
        }
    }

    pub fn raw(&self) -> &Value {
        match self {
            UpstreamSource::Internal { raw, .. }
            | UpstreamSource::Public { raw, .. }
            | UpstreamSource::Embedded { raw, .. } => raw,
        }
    }
}
