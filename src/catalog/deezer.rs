//! Deezer API client (secondary catalog).
//!
//! No authentication. Deezer rejects bursts, so requests are spaced by a
//! minimum interval.

use super::{CatalogError, SecondaryAlbum, SecondaryArtist, SecondaryCatalog};
use crate::matching;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

const API_BASE: &str = "https://api.deezer.com";
const RATE_LIMIT_INTERVAL: Duration = Duration::from_millis(150);
const MAX_SEARCH_LIMIT: usize = 100;
const SEARCH_LIMIT_FOR_NAME_LOOKUP: usize = 10;

pub struct DeezerCatalog {
    client: reqwest::Client,
    api_base: String,
    last_request: Mutex<Instant>,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<DeezerArtist>,
    error: Option<DeezerApiError>,
}

#[derive(Deserialize)]
struct ArtistResponse {
    id: Option<i64>,
    name: Option<String>,
    link: Option<String>,
    picture_medium: Option<String>,
    error: Option<DeezerApiError>,
}

#[derive(Deserialize)]
struct DeezerArtist {
    id: i64,
    name: String,
    link: Option<String>,
    picture_medium: Option<String>,
}

#[derive(Deserialize)]
struct AlbumsResponse {
    #[serde(default)]
    data: Vec<DeezerAlbum>,
    error: Option<DeezerApiError>,
}

#[derive(Deserialize)]
struct DeezerAlbum {
    id: i64,
    title: String,
    link: Option<String>,
}

// Deezer reports errors as a 200 with an error object in the body.
#[derive(Deserialize)]
struct DeezerApiError {
    code: Option<i64>,
    message: Option<String>,
}

const ERROR_CODE_NO_DATA: i64 = 800;

impl From<DeezerArtist> for SecondaryArtist {
    fn from(artist: DeezerArtist) -> Self {
        SecondaryArtist {
            id: artist.id.to_string(),
            name: artist.name,
            url: artist.link,
            image_url: artist.picture_medium,
        }
    }
}

impl DeezerCatalog {
    pub fn new() -> Self {
        Self::with_base_url(API_BASE)
    }

    pub fn with_base_url(api_base: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            last_request: Mutex::new(Instant::now() - RATE_LIMIT_INTERVAL),
        }
    }

    async fn rate_limit(&self) {
        let mut last = self.last_request.lock().await;
        let elapsed = last.elapsed();
        if elapsed < RATE_LIMIT_INTERVAL {
            tokio::time::sleep(RATE_LIMIT_INTERVAL - elapsed).await;
        }
        *last = Instant::now();
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<T, CatalogError> {
        self.rate_limit().await;
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(CatalogError::Unavailable(format!(
                "Request to {} failed with status {}",
                url,
                response.status()
            )));
        }
        Ok(response.json().await?)
    }
}

fn check_api_error(error: Option<DeezerApiError>) -> Result<(), CatalogError> {
    match error {
        None => Ok(()),
        Some(err) if err.code == Some(ERROR_CODE_NO_DATA) => Err(CatalogError::NotFound),
        Some(err) => Err(CatalogError::Unavailable(format!(
            "API error {:?}: {}",
            err.code,
            err.message.unwrap_or_default()
        ))),
    }
}

#[async_trait]
impl SecondaryCatalog for DeezerCatalog {
    async fn search_artists(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SecondaryArtist>, CatalogError> {
        let url = format!(
            "{}/search/artist?q={}&limit={}",
            self.api_base,
            urlencoding::encode(query),
            limit.min(MAX_SEARCH_LIMIT)
        );
        let body: SearchResponse = self.get_json(&url).await?;
        check_api_error(body.error)?;
        Ok(body.data.into_iter().map(SecondaryArtist::from).collect())
    }

    async fn get_artist(&self, id: &str) -> Result<SecondaryArtist, CatalogError> {
        let url = format!("{}/artist/{}", self.api_base, id);
        let body: ArtistResponse = self.get_json(&url).await?;
        check_api_error(body.error)?;
        match (body.id, body.name) {
            (Some(id), Some(name)) => Ok(SecondaryArtist {
                id: id.to_string(),
                name,
                url: body.link,
                image_url: body.picture_medium,
            }),
            _ => Err(CatalogError::Unavailable(
                "Artist response missing id or name".to_string(),
            )),
        }
    }

    async fn find_artist_by_name(
        &self,
        name: &str,
    ) -> Result<Option<SecondaryArtist>, CatalogError> {
        let candidates = self
            .search_artists(name, SEARCH_LIMIT_FOR_NAME_LOOKUP)
            .await?;
        Ok(matching::find_best_match(name, &candidates, |a| &a.name).cloned())
    }

    async fn get_artist_albums(
        &self,
        id: &str,
        limit: usize,
    ) -> Result<Vec<SecondaryAlbum>, CatalogError> {
        let url = format!(
            "{}/artist/{}/albums?limit={}",
            self.api_base,
            id,
            limit.min(MAX_SEARCH_LIMIT)
        );
        let body: AlbumsResponse = self.get_json(&url).await?;
        check_api_error(body.error)?;
        Ok(body
            .data
            .into_iter()
            .map(|album| SecondaryAlbum {
                id: album.id.to_string(),
                name: album.title,
                url: album.link,
            })
            .collect())
    }
}

impl Default for DeezerCatalog {
    fn default() -> Self {
        Self::new()
    }
}
