//! Ties the resolver, the upstream sources and the adapter together.

use std::sync::Arc;

use tracing::{debug, info_span, warn};

use crate::{
    adapter::{AdaptedItemDetails, adapt},
    error::{ResolveError, SourceError},
    http::Transport,
    resolver::{self, ItemId},
    upstream::{SourceKind, UpstreamSource, embedded, internal, public},
};

/// Priority order used when nothing else is configured.
pub const DEFAULT_SOURCE_ORDER: [SourceKind; 3] =
    [SourceKind::Internal, SourceKind::Public, SourceKind::Embedded];

type FetchFn = fn(&dyn Transport, &ItemId) -> Result<UpstreamSource, SourceError>;

fn fetch_fn(kind: SourceKind) -> FetchFn {
    match kind {
        SourceKind::Internal => internal::fetch,
        SourceKind::Public => public::fetch,
        SourceKind::Embedded => embedded::fetch,
    }
}

/// Stateless handle on the whole pipeline. Cheap to clone and share.
#[derive(Clone)]
pub struct TikTokClient {
    transport: Arc<dyn Transport>,
    order: Vec<SourceKind>,
}

impl TikTokClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            order: DEFAULT_SOURCE_ORDER.to_vec(),
        }
    }

    /// Replaces the source priority order. An empty list keeps the default.
    pub fn with_source_order(mut self, order: Vec<SourceKind>) -> Self {
        if !order.is_empty() {
            self.order = order;
        }
        self
    }

    pub fn source_order(&self) -> &[SourceKind] {
        &self.order
    }

    pub fn resolve(&self, input: &str) -> Result<ItemId, ResolveError> {
        resolver::resolve(self.transport.as_ref(), input)
    }

    /// Tries each source in order and returns the first usable item.
    ///
    /// `None` is the ordinary "not found" outcome: every source either failed
    /// or reported the item unavailable. Which one is deliberately not exposed.
    pub fn fetch_item(&self, id: &ItemId) -> Option<UpstreamSource> {
        let _span = info_span!("fetch_item", id = %id).entered();

        for kind in &self.order {
            match fetch_fn(*kind)(self.transport.as_ref(), id) {
                Ok(source) => {
                    debug!(source = %kind, "upstream answered");
                    return Some(source);
                }
                Err(err) => debug!(source = %err.kind(), error = %err, "upstream unavailable"),
            }
        }

        warn!(tried = self.order.len(), "no upstream source produced the item");
        None
    }

    /// Resolve, fetch and adapt in one go.
    pub fn details(&self, id_or_url: &str) -> Result<Option<AdaptedItemDetails>, ResolveError> {
        let id = self.resolve(id_or_url)?;
        Ok(self.fetch_item(&id).as_ref().map(adapt))
    }
}
