//! Unsplash random-photo client.
//!
//! One GET per call, no retries, no storage side effects. The response is
//! validated field by field and mapped into a [`WallpaperRecord`] whose
//! attribution link points at the canonical `www` host.

use std::future::Future;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use reqwest::header::AUTHORIZATION;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use skylight_shared::constants::{
    ATTRIBUTION_HOST, CANONICAL_ATTRIBUTION_HOST, ORIENTATION_LANDSCAPE, RANDOM_PHOTO_PATH,
};
use skylight_shared::{Topic, WallpaperRecord};

use crate::error::AcquisitionError;

/// Anything that can produce a fresh wallpaper for a topic.
pub trait PhotoSource: Send + Sync + 'static {
    fn fetch_wallpaper(
        &self,
        topic: &Topic,
    ) -> impl Future<Output = Result<WallpaperRecord, AcquisitionError>> + Send;
}

// ---------------------------------------------------------------------------
// Acquisition clock
// ---------------------------------------------------------------------------

/// Hands out acquisition timestamps that never go backwards, even if the
/// wall clock does.
#[derive(Debug, Default)]
pub struct AcquisitionClock {
    last_millis: AtomicI64,
}

impl AcquisitionClock {
    pub fn stamp(&self) -> DateTime<Utc> {
        self.stamp_at(Utc::now())
    }

    fn stamp_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let now_millis = now.timestamp_millis();
        let previous = self.last_millis.fetch_max(now_millis, Ordering::AcqRel);
        let millis = previous.max(now_millis);
        DateTime::from_timestamp_millis(millis).unwrap_or(now)
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct UnsplashClient {
    http: reqwest::Client,
    api_base: String,
    access_key: String,
    clock: AcquisitionClock,
}

impl UnsplashClient {
    pub fn new(
        http: reqwest::Client,
        api_base: impl Into<String>,
        access_key: impl Into<String>,
    ) -> Self {
        Self {
            http,
            api_base: api_base.into(),
            access_key: access_key.into(),
            clock: AcquisitionClock::default(),
        }
    }

    /// `{base}/photos/random?[query=…&]orientation=landscape`
    pub fn request_url(&self, topic: &Topic) -> Result<Url, AcquisitionError> {
        let endpoint = format!("{}{}", self.api_base.trim_end_matches('/'), RANDOM_PHOTO_PATH);

        let mut params: Vec<(&str, String)> = Vec::with_capacity(2);
        if let Some(query) = topic.query_term() {
            params.push(("query", query));
        }
        params.push(("orientation", ORIENTATION_LANDSCAPE.to_string()));

        Url::parse_with_params(&endpoint, &params)
            .map_err(|e| AcquisitionError::InvalidEndpoint(format!("{endpoint}: {e}")))
    }

    async fn fetch(&self, topic: &Topic) -> Result<WallpaperRecord, AcquisitionError> {
        let url = self.request_url(topic)?;
        debug!(url = %url, topic = %topic, "requesting wallpaper");

        let response = self
            .http
            .get(url)
            .header(AUTHORIZATION, client_id_header(&self.access_key))
            .send()
            .await
            .map_err(AcquisitionError::network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AcquisitionError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AcquisitionError::SchemaValidation(format!("body is not JSON: {e}")))?;

        let record = parse_photo(body, self.clock.stamp())?;
        info!(
            id = %record.id,
            photographer = %record.photographer,
            topic = %topic,
            "wallpaper acquired"
        );
        Ok(record)
    }
}

impl PhotoSource for UnsplashClient {
    fn fetch_wallpaper(
        &self,
        topic: &Topic,
    ) -> impl Future<Output = Result<WallpaperRecord, AcquisitionError>> + Send {
        self.fetch(topic)
    }
}

/// Value of the `Authorization` header for the Unsplash API.
pub fn client_id_header(access_key: &str) -> String {
    format!("Client-ID {access_key}")
}

/// Rewrite the attribution link to the canonical host.
pub fn normalize_attribution(link: &str) -> String {
    link.replacen(ATTRIBUTION_HOST, CANONICAL_ATTRIBUTION_HOST, 1)
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawPhoto {
    id: Option<String>,
    urls: Option<RawUrls>,
    user: Option<RawUser>,
    links: Option<RawLinks>,
}

#[derive(Debug, Deserialize)]
struct RawUrls {
    full: Option<String>,
    thumb: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawLinks {
    html: Option<String>,
    download_location: Option<String>,
}

/// Validate a `/photos/random` response and map it into a record stamped
/// with `timestamp`.
pub fn parse_photo(
    body: Value,
    timestamp: DateTime<Utc>,
) -> Result<WallpaperRecord, AcquisitionError> {
    let raw: RawPhoto = serde_json::from_value(body)
        .map_err(|e| AcquisitionError::SchemaValidation(e.to_string()))?;

    let urls = raw.urls.ok_or_else(|| missing("urls"))?;
    let user = raw.user.ok_or_else(|| missing("user"))?;
    let links = raw.links.ok_or_else(|| missing("links"))?;

    Ok(WallpaperRecord {
        id: required(raw.id, "id")?,
        full_url: required(urls.full, "urls.full")?,
        thumb_url: required(urls.thumb, "urls.thumb")?,
        photographer: required(user.name, "user.name")?,
        photo_page_url: normalize_attribution(&required(links.html, "links.html")?),
        download_location: required(links.download_location, "links.download_location")?,
        timestamp,
    })
}

fn required(field: Option<String>, name: &str) -> Result<String, AcquisitionError> {
    field.filter(|v| !v.is_empty()).ok_or_else(|| missing(name))
}

fn missing(name: &str) -> AcquisitionError {
    AcquisitionError::SchemaValidation(format!("missing {name}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_api::{photo_json, FakeApi, REVOKED_KEY};
    use chrono::TimeZone;

    fn client(base: &str) -> UnsplashClient {
        UnsplashClient::new(reqwest::Client::new(), base, "test-key")
    }

    fn query_of(url: &Url) -> Vec<(String, String)> {
        url.query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[test]
    fn test_unfiltered_request_url() {
        let c = client("https://api.unsplash.com/");
        for topic in ["", "all"] {
            let url = c.request_url(&Topic::new(topic)).unwrap();
            assert_eq!(url.path(), "/photos/random");
            assert_eq!(
                query_of(&url),
                [("orientation".to_string(), "landscape".to_string())]
            );
        }
    }

    #[test]
    fn test_topic_request_url() {
        let url = client("https://api.unsplash.com")
            .request_url(&Topic::new("street-photography"))
            .unwrap();
        let query = query_of(&url);
        assert!(query.contains(&("query".to_string(), "street photography".to_string())));
        assert!(query.contains(&("orientation".to_string(), "landscape".to_string())));
    }

    #[test]
    fn test_bad_base_url() {
        let err = client("not a url").request_url(&Topic::unfiltered()).unwrap_err();
        assert!(matches!(err, AcquisitionError::InvalidEndpoint(_)));
    }

    #[test]
    fn test_parse_normalizes_attribution() {
        let ts = Utc.timestamp_millis_opt(42).unwrap();
        let record = parse_photo(photo_json("abc"), ts).unwrap();
        assert_eq!(record.id, "abc");
        assert_eq!(record.photo_page_url, "https://www.unsplash.com/photos/abc");
        assert_eq!(record.timestamp, ts);
    }

    #[test]
    fn test_parse_rejects_missing_fields() {
        let mut body = photo_json("abc");
        body["user"].as_object_mut().unwrap().remove("name");
        let err = parse_photo(body, Utc::now()).unwrap_err();
        assert!(err.to_string().contains("user.name"));

        let err = parse_photo(serde_json::json!({"id": "x"}), Utc::now()).unwrap_err();
        assert!(matches!(err, AcquisitionError::SchemaValidation(_)));

        let err = parse_photo(serde_json::json!([1, 2]), Utc::now()).unwrap_err();
        assert!(matches!(err, AcquisitionError::SchemaValidation(_)));
    }

    #[test]
    fn test_clock_never_goes_backwards() {
        let clock = AcquisitionClock::default();
        let later = Utc.timestamp_millis_opt(2_000).unwrap();
        let earlier = Utc.timestamp_millis_opt(1_000).unwrap();

        assert_eq!(clock.stamp_at(later), later);
        assert_eq!(clock.stamp_at(earlier), later);
    }

    #[tokio::test]
    async fn test_fetch_sends_client_id_and_query() {
        let api = FakeApi::spawn().await;
        let record = client(&api.base_url)
            .fetch_wallpaper(&Topic::new("street-photography"))
            .await
            .unwrap();

        // The fake API echoes the query term into the photo id.
        assert_eq!(record.id, "street photography");
        assert_eq!(api.last_authorization().as_deref(), Some("Client-ID test-key"));
    }

    #[tokio::test]
    async fn test_fetch_reports_http_status() {
        let api = FakeApi::spawn().await;
        let err = UnsplashClient::new(reqwest::Client::new(), &api.base_url, REVOKED_KEY)
            .fetch_wallpaper(&Topic::unfiltered())
            .await
            .unwrap_err();
        assert!(matches!(err, AcquisitionError::HttpStatus { status: 401 }));
        assert_eq!(err.to_string(), "HTTP error! status: 401");
        assert_eq!(api.last_authorization().as_deref(), Some("Client-ID revoked"));
    }

    #[tokio::test]
    async fn test_fetch_without_access_key_is_unauthorized() {
        let api = FakeApi::spawn().await;
        let err = UnsplashClient::new(reqwest::Client::new(), &api.base_url, "")
            .fetch_wallpaper(&Topic::unfiltered())
            .await
            .unwrap_err();
        assert!(matches!(err, AcquisitionError::HttpStatus { status: 401 }));
    }

    #[tokio::test]
    async fn test_fetch_rejects_incomplete_body() {
        let api = FakeApi::spawn().await;
        let err = client(&format!("{}/broken", api.base_url))
            .fetch_wallpaper(&Topic::unfiltered())
            .await
            .unwrap_err();
        assert!(matches!(err, AcquisitionError::SchemaValidation(_)));
    }

    #[tokio::test]
    async fn test_fetch_network_error() {
        // Nothing listens on port 9 of localhost.
        let err = client("http://127.0.0.1:9")
            .fetch_wallpaper(&Topic::unfiltered())
            .await
            .unwrap_err();
        assert!(matches!(err, AcquisitionError::Network(_)));
    }
}
