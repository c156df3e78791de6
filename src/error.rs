//! Error taxonomy shared by the resolver, the upstream sources and the server.
//!
//! Only [`ResolveError`] ever reaches a caller. [`SourceError`] describes why a
//! single upstream attempt was abandoned and is swallowed by the fetcher, which
//! moves on to the next source.

use thiserror::Error;

use crate::upstream::SourceKind;

/// Failure of the outbound HTTP transport itself (DNS, TLS, socket, body read).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {url} failed: {message}")]
    Network { url: String, message: String },

    #[error("reading response body from {url} failed: {source}")]
    Body {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

/// Input problems detected while turning a URL or ID into an item id.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("INVALID_ID: {0:?} is neither a numeric id nor a supported TikTok link")]
    InvalidId(String),

    #[error("FAILED_TO_PARSE_VIDEO_ID: {0} does not point at a video")]
    FailedToParseVideoId(String),

    #[error("short link lookup failed: {0}")]
    Upstream(String),
}

impl ResolveError {
    /// Stable machine-readable code used in JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            ResolveError::InvalidId(_) => "INVALID_ID",
            ResolveError::FailedToParseVideoId(_) => "FAILED_TO_PARSE_VIDEO_ID",
            ResolveError::Upstream(_) => "UPSTREAM_TRANSPORT_FAILURE",
        }
    }
}

impl From<TransportError> for ResolveError {
    fn from(err: TransportError) -> Self {
        ResolveError::Upstream(err.to_string())
    }
}

/// Why one upstream source could not provide an item.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{source_kind} transport failure: {error}")]
    Transport {
        source_kind: SourceKind,
        error: TransportError,
    },

    #[error("{source_kind} answered with HTTP {status}")]
    Status { source_kind: SourceKind, status: u16 },

    #[error("{source_kind} returned an empty body")]
    EmptyBody { source_kind: SourceKind },

    #[error("{source_kind} returned malformed JSON: {error}")]
    Decode {
        source_kind: SourceKind,
        error: serde_json::Error,
    },

    #[error("{source_kind} reports the item unavailable (status {status})")]
    Unavailable { source_kind: SourceKind, status: i64 },

    #[error("{source_kind} response did not contain the item")]
    MissingItem { source_kind: SourceKind },

    #[error("no version profile of the {source_kind} source answered")]
    ProfilesExhausted { source_kind: SourceKind },
}

impl SourceError {
    pub fn kind(&self) -> SourceKind {
        match self {
            SourceError::Transport { source_kind, .. }
            | SourceError::Status { source_kind, .. }
            | SourceError::EmptyBody { source_kind }
            | SourceError::Decode { source_kind, .. }
            | SourceError::Unavailable { source_kind, .. }
            | SourceError::MissingItem { source_kind }
            | SourceError::ProfilesExhausted { source_kind } => *source_kind,
        }
    }
}
