//! Outbound HTTP plumbing.
//!
//! Every upstream call goes through the [`Transport`] trait so the pipeline can
//! be driven by a scripted fake in tests. The production implementation wraps a
//! blocking `ureq` agent; callers are expected to run it off the async reactor.

use std::{io::Read, time::Duration};

use tracing::trace;

use crate::error::TransportError;

/// Desktop browser user-agent sent to the public web endpoints.
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// Upper bound on how much of a response body is read into memory.
const MAX_BODY_BYTES: u64 = 8 * 1024 * 1024;

/// Time-to-live for one inclusive range of response status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTtl {
    pub min_status: u16,
    pub max_status: u16,
    pub ttl_secs: u64,
}

/// Advisory caching directive attached to each outbound request.
///
/// The transport may honour it or ignore it; nothing in the pipeline depends on
/// a cache being present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheHint {
    pub cache_everything: bool,
    pub ttl_by_status: &'static [StatusTtl],
}

/// 2xx for an hour, 4xx for a few seconds, 5xx never.
pub const DEFAULT_STATUS_TTLS: &[StatusTtl] = &[
    StatusTtl {
        min_status: 200,
        max_status: 299,
        ttl_secs: 60 * 60,
    },
    StatusTtl {
        min_status: 400,
        max_status: 499,
        ttl_secs: 5,
    },
    StatusTtl {
        min_status: 500,
        max_status: 599,
        ttl_secs: 0,
    },
];

impl CacheHint {
    pub const fn standard() -> Self {
        Self {
            cache_everything: true,
            ttl_by_status: DEFAULT_STATUS_TTLS,
        }
    }

    /// TTL for `status`, or `None` when no range covers it.
    pub fn ttl_for(&self, status: u16) -> Option<u64> {
        self.ttl_by_status
            .iter()
            .find(|range| (range.min_status..=range.max_status).contains(&status))
            .map(|range| range.ttl_secs)
    }
}

impl Default for CacheHint {
    fn default() -> Self {
        Self::standard()
    }
}

/// A fully described outbound GET.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub cache: CacheHint,
}

impl UpstreamRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            cache: CacheHint::standard(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query_pair(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// What the pipeline needs to know about an upstream response.
#[derive(Debug, Clone, Default)]
pub struct UpstreamResponse {
    pub status: u16,
    /// URL after following redirects.
    pub final_url: String,
    pub content_length: Option<u64>,
    pub body: String,
}

impl UpstreamResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// True when the upstream explicitly advertised a zero-length body, or sent
    /// nothing at all.
    pub fn is_empty(&self) -> bool {
        self.content_length == Some(0) || self.body.trim().is_empty()
    }
}

/// Blocking HTTP client abstraction.
pub trait Transport: Send + Sync {
    fn execute(&self, request: &UpstreamRequest) -> Result<UpstreamResponse, TransportError>;
}

/// [`Transport`] backed by a shared `ureq` agent.
///
/// Redirects are followed by the agent; HTTP error statuses are returned as
/// ordinary responses so each source can decide what they mean.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .redirects(8)
            .build();
        Self { agent }
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &UpstreamRequest) -> Result<UpstreamResponse, TransportError> {
        let mut call = self.agent.get(&request.url);
        for (name, value) in &request.query {
            call = call.query(name, value);
        }
        for (name, value) in &request.headers {
            call = call.set(name, value);
        }

        trace!(
            url = %request.url,
            cache_everything = request.cache.cache_everything,
            "outbound request"
        );

        let response = match call.call() {
            Ok(response) => response,
            Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(err)) => {
                return Err(TransportError::Network {
                    url: request.url.clone(),
                    message: err.to_string(),
                });
            }
        };

        let status = response.status();
        let final_url = response.get_url().to_string();
        let content_length = response
            .header("Content-Length")
            .and_then(|value| value.trim().parse::<u64>().ok());

        let mut body = String::new();
        response
            .into_reader()
            .take(MAX_BODY_BYTES)
            .read_to_string(&mut body)
            .map_err(|source| TransportError::Body {
                url: request.url.clone(),
                source,
            })?;

        Ok(UpstreamResponse {
            status,
            final_url,
            content_length,
            body,
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted transport used by the pipeline tests.

    use std::collections::VecDeque;

    use parking_lot::Mutex;

    use super::*;

    type Responder = Box<dyn Fn(&UpstreamRequest) -> bool + Send + Sync>;

    /// Replies to requests from a queue of `(matcher, outcome)` pairs and keeps
    /// a log of every URL it was asked for.
    #[derive(Default)]
    pub struct FakeTransport {
        script: Mutex<VecDeque<(Responder, Result<UpstreamResponse, String>)>>,
        pub requests: Mutex<Vec<UpstreamRequest>>,
    }

    impl FakeTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a response for the next request whose URL contains `needle`.
        pub fn respond(&self, needle: &str, response: UpstreamResponse) -> &Self {
            let needle = needle.to_string();
            self.script.lock().push_back((
                Box::new(move |req: &UpstreamRequest| req.url.contains(&needle)),
                Ok(response),
            ));
            self
        }

        /// Queue a network failure for the next request whose URL contains `needle`.
        pub fn fail(&self, needle: &str) -> &Self {
            let needle = needle.to_string();
            self.script.lock().push_back((
                Box::new(move |req: &UpstreamRequest| req.url.contains(&needle)),
                Err("connection reset".to_string()),
            ));
            self
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().len()
        }

        pub fn urls(&self) -> Vec<String> {
            self.requests
                .lock()
                .iter()
                .map(|req| req.url.clone())
                .collect()
        }
    }

    impl Transport for FakeTransport {
        fn execute(&self, request: &UpstreamRequest) -> Result<UpstreamResponse, TransportError> {
            self.requests.lock().push(request.clone());
            let mut script = self.script.lock();
            let position = script.iter().position(|(matches, _)| matches(request));
            match position.and_then(|index| script.remove(index)) {
                Some((_, Ok(response))) => Ok(response),
                Some((_, Err(message))) => Err(TransportError::Network {
                    url: request.url.clone(),
                    message,
                }),
                None => Err(TransportError::Network {
                    url: request.url.clone(),
                    message: "no scripted response".to_string(),
                }),
            }
        }
    }

    pub fn ok(body: impl Into<String>) -> UpstreamResponse {
        let body = body.into();
        UpstreamResponse {
            status: 200,
            final_url: String::new(),
            content_length: Some(body.len() as u64),
            body,
        }
    }

    pub fn empty() -> UpstreamResponse {
        UpstreamResponse {
            status: 200,
            final_url: String::new(),
            content_length: Some(0),
            body: String::new(),
        }
    }

    pub fn status(code: u16) -> UpstreamResponse {
        UpstreamResponse {
            status: code,
            final_url: String::new(),
            content_length: None,
            body: String::new(),
        }
    }

    pub fn redirected_to(url: &str) -> UpstreamResponse {
        UpstreamResponse {
            status: 200,
            final_url: url.to_string(),
            content_length: None,
            body: "<html></html>".to_string(),
        }
    }
}
