//! REST endpoints for the Radio Browser service
//!
//! Operations answer HTTP 200 with the [`Envelope`] as body, whatever the
//! outcome: failures are reported through `success: false`. Request bodies
//! and query strings are parsed leniently, missing or malformed fields take
//! their default value and the service decides what to answer.
//!
//! Cached artwork is served by a separate router, mounted at the root.

use crate::envelope::Envelope;
use crate::models::{SearchFilters, Station};
use crate::service::{RadioBrowser, PERMANENT_LOGOS_PREFIX};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use pmocovers::sniff_content_type;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

type AppState = Arc<RadioBrowser>;
type Params = Query<HashMap<String, String>>;

/// Create the router of the operations (to be nested under `/api/radiobrowser`)
pub fn create_router(service: AppState) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/search", get(search))
        .route("/top", get(top_stations))
        .route("/countries", get(countries))
        .route("/genres", get(genres))
        .route("/servers", get(mirror_status))
        .route("/recent", get(recently_played))
        .route("/status", get(current_status))
        .route("/play", post(play))
        .route("/stop", post(stop))
        .route("/favorites", get(favorites).post(add_favorite))
        .route("/favorites/remove", post(remove_favorite))
        .route("/logo", get(station_logo))
        .route("/cache/flush", post(flush_cache))
        .route("/custom-apis", get(custom_apis).post(add_custom_api))
        .route("/custom-apis/{id}", delete(remove_custom_api))
        .route("/maintenance/{task}", post(run_maintenance_task))
        .with_state(service)
}

/// Create the router serving cached favicons and permanent logos
///
/// - `/logos/{file}`: favicons of the logo cache
/// - `/radio-logos/{file}` and `/radio-logos/thumbs/{file}`: favorites logos
pub fn create_artwork_router(service: AppState) -> Router {
    Router::new()
        .route("/logos/{file}", get(get_cached_logo))
        .route(
            &format!("{PERMANENT_LOGOS_PREFIX}/{{file}}"),
            get(get_permanent_logo),
        )
        .route(
            &format!("{PERMANENT_LOGOS_PREFIX}/thumbs/{{file}}"),
            get(get_permanent_thumb),
        )
        .with_state(service)
}

/// Parse a JSON body, falling back to the default value
fn lenient_body<T: for<'de> Deserialize<'de> + Default>(body: &Bytes) -> T {
    serde_json::from_slice(body).unwrap_or_else(|e| {
        debug!("Ignoring malformed request body: {}", e);
        T::default()
    })
}

fn param<'a>(params: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    params
        .get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn filters_from(params: &HashMap<String, String>) -> SearchFilters {
    SearchFilters {
        name: param(params, "name").map(str::to_string),
        countrycode: param(params, "countrycode").map(str::to_string),
        tag: param(params, "tag").map(str::to_string),
        offset: param(params, "offset").and_then(|v| v.parse().ok()),
        limit: param(params, "limit").and_then(|v| v.parse().ok()),
        order: param(params, "order").map(str::to_string),
        reverse: param(params, "reverse").and_then(|v| v.parse().ok()),
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// GET /api/radiobrowser/ping
async fn ping(State(service): State<AppState>) -> Json<Envelope> {
    Json(service.ping().await)
}

/// GET /api/radiobrowser/search?name=&countrycode=&tag=&offset=&limit=&order=&reverse=
async fn search(State(service): State<AppState>, Query(params): Params) -> Json<Envelope> {
    Json(service.search(&filters_from(&params)).await)
}

/// GET /api/radiobrowser/top?limit=
async fn top_stations(State(service): State<AppState>, Query(params): Params) -> Json<Envelope> {
    let limit = param(&params, "limit").and_then(|v| v.parse().ok());
    Json(service.top_stations(limit).await)
}

/// GET /api/radiobrowser/countries
async fn countries(State(service): State<AppState>) -> Json<Envelope> {
    Json(service.countries().await)
}

/// GET /api/radiobrowser/genres
async fn genres(State(service): State<AppState>) -> Json<Envelope> {
    Json(service.genres().await)
}

/// GET /api/radiobrowser/servers
async fn mirror_status(State(service): State<AppState>) -> Json<Envelope> {
    Json(service.mirror_status().await)
}

/// GET /api/radiobrowser/recent
async fn recently_played(State(service): State<AppState>) -> Json<Envelope> {
    Json(service.recently_played().await)
}

/// GET /api/radiobrowser/status
async fn current_status(State(service): State<AppState>) -> Json<Envelope> {
    Json(service.current_status().await)
}

/// POST /api/radiobrowser/play
/// Body: a station object
async fn play(State(service): State<AppState>, body: Bytes) -> Json<Envelope> {
    let station: Station = lenient_body(&body);
    Json(service.play(&station).await)
}

/// POST /api/radiobrowser/stop
async fn stop(State(service): State<AppState>) -> Json<Envelope> {
    Json(service.stop().await)
}

/// GET /api/radiobrowser/favorites
async fn favorites(State(service): State<AppState>) -> Json<Envelope> {
    Json(service.favorites().await)
}

/// POST /api/radiobrowser/favorites
/// Body: a station object
async fn add_favorite(State(service): State<AppState>, body: Bytes) -> Json<Envelope> {
    let station: Station = lenient_body(&body);
    Json(service.add_favorite(&station).await)
}

#[derive(Debug, Default, Deserialize)]
struct UrlBody {
    #[serde(default)]
    url: String,
}

/// POST /api/radiobrowser/favorites/remove
/// Body: `{"url": "..."}`
async fn remove_favorite(State(service): State<AppState>, body: Bytes) -> Json<Envelope> {
    let UrlBody { url } = lenient_body(&body);
    Json(service.remove_favorite(&url).await)
}

/// GET /api/radiobrowser/logo?url=
async fn station_logo(State(service): State<AppState>, Query(params): Params) -> Json<Envelope> {
    let url = param(&params, "url").unwrap_or_default();
    Json(service.station_logo(url).await)
}

/// POST /api/radiobrowser/cache/flush
async fn flush_cache(State(service): State<AppState>) -> Json<Envelope> {
    Json(service.flush_cache().await)
}

/// GET /api/radiobrowser/custom-apis
async fn custom_apis(State(service): State<AppState>) -> Json<Envelope> {
    Json(service.custom_apis().await)
}

#[derive(Debug, Default, Deserialize)]
struct CustomApiBody {
    #[serde(default)]
    name: String,
    #[serde(default)]
    url: String,
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// POST /api/radiobrowser/custom-apis
/// Body: `{"name": "...", "url": "...", "type": "..."}`
async fn add_custom_api(State(service): State<AppState>, body: Bytes) -> Json<Envelope> {
    let api: CustomApiBody = lenient_body(&body);
    Json(
        service
            .add_custom_api(&api.name, &api.url, api.kind.as_deref())
            .await,
    )
}

/// DELETE /api/radiobrowser/custom-apis/{id}
async fn remove_custom_api(
    State(service): State<AppState>,
    Path(id): Path<String>,
) -> Json<Envelope> {
    Json(service.remove_custom_api(&id).await)
}

/// POST /api/radiobrowser/maintenance/{task}
async fn run_maintenance_task(
    State(service): State<AppState>,
    Path(task): Path<String>,
) -> Json<Envelope> {
    Json(service.run_maintenance_task(&task).await)
}

// ============================================================================
// Artwork
// ============================================================================

fn image_response(content_type: &'static str, data: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(content_type)),
            (
                header::CACHE_CONTROL,
                HeaderValue::from_static("public, max-age=86400"),
            ),
        ],
        data,
    )
        .into_response()
}

/// GET /logos/{file}
async fn get_cached_logo(State(service): State<AppState>, Path(file): Path<String>) -> Response {
    let Some(logos) = service.logos() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    match logos.read(&file).await {
        Some(data) => image_response(sniff_content_type(&data), data),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// A permanent logo file name: `*.jpg`, no path component
fn is_logo_file_name(file: &str) -> bool {
    file.ends_with(".jpg")
        && !file.starts_with('.')
        && !file.contains(['/', '\\'])
        && !file.contains("..")
}

async fn serve_permanent(service: &RadioBrowser, sub_dir: Option<&str>, file: &str) -> Response {
    let Some(importer) = service.permanent_logos() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if !is_logo_file_name(file) {
        return StatusCode::NOT_FOUND.into_response();
    }

    let mut path = importer.root().to_path_buf();
    if let Some(sub_dir) = sub_dir {
        path.push(sub_dir);
    }
    path.push(file);

    match tokio::fs::read(&path).await {
        Ok(data) => image_response("image/jpeg", data),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

/// GET /radio-logos/{file}
async fn get_permanent_logo(State(service): State<AppState>, Path(file): Path<String>) -> Response {
    serve_permanent(&service, None, &file).await
}

/// GET /radio-logos/thumbs/{file}
async fn get_permanent_thumb(
    State(service): State<AppState>,
    Path(file): Path<String>,
) -> Response {
    serve_permanent(&service, Some("thumbs"), &file).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filters_from_query() {
        let params: HashMap<String, String> = [
            ("tag", "jazz"),
            ("name", "  "),
            ("limit", "12"),
            ("reverse", "false"),
            ("offset", "abc"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let filters = filters_from(&params);
        assert_eq!(filters.tag.as_deref(), Some("jazz"));
        assert_eq!(filters.name, None);
        assert_eq!(filters.limit, Some(12));
        assert_eq!(filters.reverse, Some(false));
        assert_eq!(filters.offset, None);
    }

    #[test]
    fn test_lenient_body() {
        let station: Station = lenient_body(&Bytes::from_static(b"{not json"));
        assert_eq!(station, Station::default());

        let UrlBody { url } = lenient_body(&Bytes::from_static(br#"{"url":"http://s/1"}"#));
        assert_eq!(url, "http://s/1");
    }

    #[test]
    fn test_logo_file_names() {
        assert!(is_logo_file_name("FIP Jazz.jpg"));
        assert!(is_logo_file_name("FIP Jazz_sm.jpg"));
        assert!(!is_logo_file_name("../secret.jpg"));
        assert!(!is_logo_file_name("logo.png"));
        assert!(!is_logo_file_name(".jpg"));
    }
}
