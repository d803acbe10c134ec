//! Spotify Web API client (primary catalog).
//!
//! Authenticates with the client-credentials flow; the token is cached and
//! renewed five minutes before expiry. Concurrent renewals are benign, the
//! last token written wins.

use super::{CatalogArtist, CatalogError, CatalogRelease, PrimaryCatalog};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const ACCOUNTS_BASE: &str = "https://accounts.spotify.com";
const API_BASE: &str = "https://api.spotify.com/v1";
const TOKEN_SAFETY_MARGIN: Duration = Duration::from_secs(300);
const MAX_SEARCH_LIMIT: usize = 50;
const ALBUMS_PAGE_SIZE: usize = 50;

pub struct SpotifyCatalog {
    client: reqwest::Client,
    accounts_base: String,
    api_base: String,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<CachedToken>>,
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Deserialize)]
struct SearchResponse {
    artists: ArtistPage,
}

#[derive(Deserialize)]
struct ArtistPage {
    items: Vec<ArtistObject>,
}

#[derive(Deserialize)]
struct ArtistObject {
    id: String,
    name: String,
    #[serde(default)]
    genres: Vec<String>,
    #[serde(default)]
    images: Vec<ImageObject>,
    #[serde(default)]
    popularity: i64,
    followers: Option<FollowersObject>,
    external_urls: Option<ExternalUrls>,
}

#[derive(Deserialize)]
struct FollowersObject {
    total: i64,
}

#[derive(Deserialize)]
struct ImageObject {
    url: String,
}

#[derive(Deserialize)]
struct ExternalUrls {
    spotify: Option<String>,
}

#[derive(Deserialize)]
struct AlbumsPage {
    items: Vec<AlbumObject>,
    next: Option<String>,
}

#[derive(Deserialize)]
struct AlbumObject {
    id: String,
    name: String,
    #[serde(default)]
    album_type: String,
    release_date: Option<String>,
    total_tracks: Option<i64>,
    #[serde(default)]
    images: Vec<ImageObject>,
    external_urls: Option<ExternalUrls>,
}

impl ArtistObject {
    fn into_catalog_artist(self) -> CatalogArtist {
        CatalogArtist {
            id: self.id,
            name: self.name,
            genres: self.genres,
            image_url: self.images.into_iter().next().map(|i| i.url),
            popularity: self.popularity,
            followers: self.followers.map(|f| f.total).unwrap_or(0),
            url: self.external_urls.and_then(|u| u.spotify),
        }
    }
}

impl SpotifyCatalog {
    pub fn new(client_id: &str, client_secret: &str) -> Self {
        Self::with_base_urls(client_id, client_secret, ACCOUNTS_BASE, API_BASE)
    }

    pub fn with_base_urls(
        client_id: &str,
        client_secret: &str,
        accounts_base: &str,
        api_base: &str,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            accounts_base: accounts_base.trim_end_matches('/').to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            token: Mutex::new(None),
        }
    }

    async fn access_token(&self) -> Result<String, CatalogError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.access_token.clone());
            }
        }

        let credentials = BASE64.encode(format!("{}:{}", self.client_id, self.client_secret));
        let response = self
            .client
            .post(format!("{}/api/token", self.accounts_base))
            .header("Authorization", format!("Basic {}", credentials))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CatalogError::Unavailable(format!(
                "Token request failed with status {}",
                response.status()
            )));
        }

        let body: TokenResponse = response.json().await?;
        let lifetime = Duration::from_secs(body.expires_in)
            .checked_sub(TOKEN_SAFETY_MARGIN)
            .unwrap_or(Duration::ZERO);
        *cached = Some(CachedToken {
            access_token: body.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(body.access_token)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<T, CatalogError> {
        let token = self.access_token().await?;
        let response = self
            .client
            .get(url)
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(response.json().await?),
            reqwest::StatusCode::NOT_FOUND => Err(CatalogError::NotFound),
            status => Err(CatalogError::Unavailable(format!(
                "Request to {} failed with status {}",
                url, status
            ))),
        }
    }
}

#[async_trait]
impl PrimaryCatalog for SpotifyCatalog {
    async fn search_artists(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<CatalogArtist>, CatalogError> {
        let url = format!(
            "{}/search?q={}&type=artist&limit={}",
            self.api_base,
            urlencoding::encode(query),
            limit.min(MAX_SEARCH_LIMIT)
        );
        let body: SearchResponse = self.get_json(&url).await?;
        Ok(body
            .artists
            .items
            .into_iter()
            .map(ArtistObject::into_catalog_artist)
            .collect())
    }

    async fn get_artist(&self, id: &str) -> Result<CatalogArtist, CatalogError> {
        let url = format!("{}/artists/{}", self.api_base, id);
        let body: ArtistObject = self.get_json(&url).await?;
        Ok(body.into_catalog_artist())
    }

    async fn get_artist_releases(&self, id: &str) -> Result<Vec<CatalogRelease>, CatalogError> {
        let mut url = format!(
            "{}/artists/{}/albums?include_groups=album,single,compilation&limit={}",
            self.api_base, id, ALBUMS_PAGE_SIZE
        );
        let mut releases = Vec::new();
        loop {
            let page: AlbumsPage = self.get_json(&url).await?;
            for album in page.items {
                // A release with an unparseable date is skipped, not fatal
                let release_date = match album
                    .release_date
                    .as_deref()
                    .and_then(super::parse_release_date)
                {
                    Some(date) => date,
                    None => {
                        tracing::warn!(
                            "Skipping release '{}' with unparseable date {:?}",
                            album.name,
                            album.release_date
                        );
                        continue;
                    }
                };
                let release_url = match album.external_urls.and_then(|u| u.spotify) {
                    Some(url) => url,
                    None => format!("https://open.spotify.com/album/{}", album.id),
                };
                releases.push(CatalogRelease {
                    id: album.id,
                    name: album.name,
                    album_type: album.album_type,
                    release_date,
                    total_tracks: album.total_tracks,
                    image_url: album.images.into_iter().next().map(|i| i.url),
                    url: release_url,
                });
            }
            match page.next {
                Some(next) => url = next,
                None => break,
            }
        }
        Ok(releases)
    }
}
