#![forbid(unsafe_code)]

//! Public entry point for the tikembed crate.
//!
//! The library holds the whole link pipeline: [`resolver`] turns links into
//! item ids, [`fetcher`] walks the upstream sources in [`upstream`], and
//! [`adapter`] normalises whatever answered. The binaries only add HTTP
//! serving and a command-line lookup on top.

pub mod adapter;
pub mod config;
pub mod device;
pub mod embed;
pub mod error;
pub mod fetcher;
pub mod http;
pub mod resolver;
pub mod upstream;

pub use adapter::{AdaptedItemDetails, MediaSource};
pub use error::ResolveError;
pub use fetcher::TikTokClient;
pub use resolver::ItemId;
pub use upstream::SourceKind;
