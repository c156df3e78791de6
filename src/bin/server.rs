#![forbid(unsafe_code)]

//! HTTP front end: maps TikTok-shaped paths onto the lookup pipeline and
//! answers with Discord embeds, redirects or JSON.

use std::{convert::Infallible, net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, Query, State},
    http::{HeaderValue, StatusCode, header, request::Parts},
    middleware,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use clap::Parser;
use serde::Deserialize;
use tikembed::{
    AdaptedItemDetails, ItemId, ResolveError, TikTokClient,
    config::{DEFAULT_CONFIG_PATH, RuntimeConfig, load_runtime_config_from},
    embed::{self, OEmbed},
    http::{CacheHint, UreqTransport},
    resolver,
};
use tokio::{signal, task};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

const PROJECT_URL: &str = "https://britmoji.org";
const ISSUE_URL: &str = "https://github.com/Britmoji/tiktxk/issues/new";

#[derive(Parser, Debug)]
#[command(author, version, about = "Serve TikTok link previews for chat clients.")]
struct Cli {
    #[arg(long = "config", value_name = "PATH", default_value = DEFAULT_CONFIG_PATH, help = "Path to the env-style config file")]
    config: PathBuf,
    #[arg(long = "host", value_name = "ADDR", help = "Override the listen address")]
    host: Option<String>,
    #[arg(short = 'p', long = "port", value_name = "PORT", help = "Override the listen port")]
    port: Option<u16>,
    #[arg(
        long = "host-url",
        value_name = "URL",
        help = "Public base URL used in embed links"
    )]
    host_url: Option<String>,
}

#[derive(Clone)]
struct AppState {
    client: Arc<TikTokClient>,
    host_url: Arc<str>,
}

/// How the caller wants to be answered.
#[derive(Debug, Clone, Copy)]
struct Viewer {
    discord: bool,
}

impl<S: Send + Sync> FromRequestParts<S> for Viewer {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|value| value.to_str().ok());
        let raw = parts
            .uri
            .query()
            .is_some_and(|query| query.split('&').any(|pair| pair == "raw=true"));
        Ok(Self {
            discord: embed::is_discord(agent, raw),
        })
    }
}

const ERROR_COMMENT: &str = "If you're here, and have no idea what this is, something went wrong when \
trying to embed a TikTok video. We don't support LIVE videos, and we can't show videos that are \
private, or have been deleted. Sorry! Something wrong? Open an issue on GitHub.";

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
    discord: bool,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            discord: false,
        }
    }

    fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "UNKNOWN_ITEM")
    }

    fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    fn for_viewer(mut self, viewer: Viewer) -> Self {
        self.discord = viewer.discord;
        self
    }
}

impl From<ResolveError> for ApiError {
    fn from(err: ResolveError) -> Self {
        let status = match err {
            ResolveError::InvalidId(_) | ResolveError::FailedToParseVideoId(_) => {
                StatusCode::BAD_REQUEST
            }
            ResolveError::Upstream(_) => StatusCode::BAD_GATEWAY,
        };
        Self::new(status, err.code())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = if self.discord {
            // Discord only renders embeds from successful responses.
            let document = embed::render_document(
                &embed::error_embed(&self.message),
                PROJECT_URL,
                false,
            );
            Html(document).into_response()
        } else {
            let body = serde_json::json!({
                "_comment": ERROR_COMMENT,
                "error": self.message,
                "success": false,
            });
            (self.status, Json(body)).into_response()
        };
        // Cached by the error's own status, not the 200 an embed goes out with.
        set_cache_control(&mut response, self.status);
        response
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = apply_cli(load_runtime_config_from(&cli.config)?, &cli);

    let transport = Arc::new(UreqTransport::new(config.upstream_timeout));
    let client = TikTokClient::new(transport).with_source_order(config.source_order.clone());
    let state = AppState {
        client: Arc::new(client),
        host_url: Arc::from(config.host_url.as_str()),
    };

    let addr = SocketAddr::new(
        config
            .host
            .parse()
            .with_context(|| format!("parsing listen address {}", config.host))?,
        config.port,
    );
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {}", addr))?;
    info!(%addr, host_url = %config.host_url, sources = ?config.source_order, "embed server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running embed server")?;

    Ok(())
}

fn apply_cli(mut config: RuntimeConfig, cli: &Cli) -> RuntimeConfig {
    if let Some(host) = &cli.host {
        config.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(host_url) = &cli.host_url {
        config.host_url = host_url.trim_end_matches('/').to_string();
    }
    config
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { Redirect::to(PROJECT_URL) }))
        .route("/crab", get(|| async { "🦀" }))
        .route("/issue", get(|| async { Redirect::to(ISSUE_URL) }))
        .route("/internal/embed", get(oembed))
        .route("/meta/{id}", get(meta_json))
        .route("/meta/{id}/video", get(meta_video))
        .route("/meta/{id}/audio", get(meta_audio))
        .route("/meta/{id}/image/{index}", get(meta_image))
        .route("/t/{slug}", get(render_short))
        .route("/t/{slug}/", get(render_short))
        .route("/{slug}", get(render_short))
        .route("/{slug}/", get(render_short))
        .route("/{slug}/video/{id}", get(render_item))
        .route("/{slug}/video/{id}/", get(render_item))
        .route("/{slug}/photo/{id}", get(render_item))
        .route("/{slug}/photo/{id}/", get(render_item))
        .fallback(unknown_route)
        .layer(middleware::map_response(cache_control))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        error!(%err, "failed to install Ctrl+C handler");
    }
}

/// Mirrors the upstream caching hint onto our own responses. Responses that
/// already chose a policy keep it.
async fn cache_control(mut response: Response) -> Response {
    if !response.headers().contains_key(header::CACHE_CONTROL) {
        let status = response.status();
        set_cache_control(&mut response, status);
    }
    response
}

fn set_cache_control(response: &mut Response, status: StatusCode) {
    if let Ok(value) = HeaderValue::from_str(&cache_control_value(status)) {
        response.headers_mut().insert(header::CACHE_CONTROL, value);
    }
}

const ROUTES: [&str; 10] = [
    "/",
    "/issue",
    "/crab",
    "/internal/embed",
    "/meta/{id}",
    "/meta/{id}/video",
    "/meta/{id}/audio",
    "/meta/{id}/image/{index}",
    "/t/{token}",
    "/{author}/video/{id}",
];

async fn unknown_route() -> Response {
    let body = serde_json::json!({
        "message": "Not Found",
        "success": false,
        "routes": ROUTES,
    });
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}

fn cache_control_value(status: StatusCode) -> String {
    match CacheHint::standard().ttl_for(status.as_u16()) {
        Some(0) | None => "no-store".to_string(),
        Some(ttl) => format!("public, max-age={ttl}"),
    }
}

impl AppState {
    /// Runs the blocking pipeline off the reactor.
    async fn lookup(&self, input: String) -> ApiResult<AdaptedItemDetails> {
        let client = self.client.clone();
        task::spawn_blocking(move || client.details(&input))
            .await
            .map_err(|err| ApiError::internal(format!("task join error: {err}")))??
            .ok_or_else(ApiError::not_found)
    }

    async fn lookup_id(&self, id: &str) -> ApiResult<AdaptedItemDetails> {
        let id = ItemId::parse(id)?;
        self.lookup(id.to_string()).await
    }

    fn render(&self, viewer: Viewer, item: &AdaptedItemDetails) -> Response {
        if viewer.discord {
            let embed = embed::item_embed(item, &self.host_url);
            let document = embed::render_document(&embed, &self.host_url, rand::random());
            Html(document).into_response()
        } else {
            found(&item.canonical_url())
        }
    }
}

async fn render_item(
    State(state): State<AppState>,
    viewer: Viewer,
    Path((_slug, id)): Path<(String, String)>,
) -> ApiResult<Response> {
    let item = state
        .lookup_id(&id)
        .await
        .map_err(|err| err.for_viewer(viewer))?;
    Ok(state.render(viewer, &item))
}

async fn render_short(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(slug): Path<String>,
) -> ApiResult<Response> {
    let result = match resolver::short_link_for(&slug) {
        Ok(link) => state.lookup(link).await,
        Err(err) => Err(err.into()),
    };
    let item = result.map_err(|err| err.for_viewer(viewer))?;
    Ok(state.render(viewer, &item))
}

async fn meta_json(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<AdaptedItemDetails>> {
    Ok(Json(state.lookup_id(&id).await?))
}

async fn meta_video(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Response> {
    let item = state.lookup_id(&id).await?;
    asset(&item.video.url)
}

async fn meta_audio(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Response> {
    let item = state.lookup_id(&id).await?;
    asset(&item.audio.url)
}

async fn meta_image(
    State(state): State<AppState>,
    Path((id, index)): Path<(String, String)>,
) -> ApiResult<Response> {
    let item = state.lookup_id(&id).await?;
    asset(&item.slide(parse_index(&index)).url)
}

/// Plain 302 to an upstream asset or page.
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// Slideshows have no video and some items no audio; those URLs are empty.
fn asset(url: &str) -> ApiResult<Response> {
    if url.is_empty() {
        return Err(ApiError::not_found());
    }
    Ok(found(url))
}

/// Non-numeric indices select the first slide.
fn parse_index(raw: &str) -> usize {
    raw.parse().unwrap_or(0)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OEmbedQuery {
    author_name: Option<String>,
    author_url: Option<String>,
}

async fn oembed(Query(query): Query<OEmbedQuery>) -> ApiResult<Json<OEmbed>> {
    let author_name = query
        .author_name
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, "Missing authorName"))?;
    Ok(Json(OEmbed::new(author_name, query.author_url)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_control_follows_status_ranges() {
        assert_eq!(cache_control_value(StatusCode::OK), "public, max-age=3600");
        assert_eq!(cache_control_value(StatusCode::NOT_FOUND), "public, max-age=5");
        assert_eq!(cache_control_value(StatusCode::BAD_GATEWAY), "no-store");
        assert_eq!(cache_control_value(StatusCode::FOUND), "no-store");
    }

    #[test]
    fn resolve_errors_map_to_statuses() {
        let err: ApiError = ResolveError::InvalidId("x".into()).into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "INVALID_ID");

        let err: ApiError = ResolveError::FailedToParseVideoId("u".into()).into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "FAILED_TO_PARSE_VIDEO_ID");

        let err: ApiError = ResolveError::Upstream("down".into()).into();
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn discord_errors_render_as_embeds() {
        let response = ApiError::not_found()
            .for_viewer(Viewer { discord: true })
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let response = ApiError::not_found().into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn discord_error_embeds_keep_the_error_cache_policy() {
        let response = ApiError::not_found()
            .for_viewer(Viewer { discord: true })
            .into_response();
        let response = cache_control(response).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "public, max-age=5");

        let response = ApiError::from(ResolveError::Upstream("down".into()))
            .for_viewer(Viewer { discord: true })
            .into_response();
        let response = cache_control(response).await;
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
    }

    #[tokio::test]
    async fn successful_responses_get_the_long_ttl() {
        let response = cache_control(Html("ok").into_response()).await;
        assert_eq!(
            response.headers()[header::CACHE_CONTROL],
            "public, max-age=3600"
        );
    }

    #[tokio::test]
    async fn unknown_routes_list_the_known_ones() {
        let response = unknown_route().await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["message"], "Not Found");
        assert_eq!(body["success"], false);
        assert!(body["routes"].as_array().unwrap().len() > 1);
    }

    #[test]
    fn empty_asset_urls_are_unknown_items() {
        let err = asset("").unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.message, "UNKNOWN_ITEM");
        let response = asset("https://cdn.example/a.mp3").unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
    }

    #[test]
    fn asset_redirects_use_found() {
        let response = found("https://cdn.example/v.mp4");
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers()[header::LOCATION],
            "https://cdn.example/v.mp4"
        );
    }

    #[test]
    fn image_index_defaults_to_zero() {
        assert_eq!(parse_index("2"), 2);
        assert_eq!(parse_index("two"), 0);
        assert_eq!(parse_index("-1"), 0);
    }

    #[test]
    fn cli_overrides_config() {
        let cli = Cli::parse_from(["server", "--port", "9999", "--host-url", "https://x.example/"]);
        let config = apply_cli(RuntimeConfig::default(), &cli);
        assert_eq!(config.port, 9999);
        assert_eq!(config.host_url, "https://x.example");
        assert_eq!(config.host, tikembed::config::DEFAULT_HOST);
    }
}
