//! External music catalog clients.
//!
//! Two catalogs feed the tracker: the primary one is authoritative for
//! artists and releases, the secondary one contributes best-effort links and
//! artwork. Both are exposed behind traits so services and tests don't care
//! which provider is behind them.

mod deezer;
mod spotify;

pub use deezer::DeezerCatalog;
pub use spotify::SpotifyCatalog;

use async_trait::async_trait;
use chrono::NaiveDate;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The requested entity does not exist in the catalog. Callers treat
    /// this as a definitive answer, not a transient failure.
    #[error("Not found in catalog")]
    NotFound,
    /// The catalog could not be reached or answered with a failure status.
    #[error("Catalog unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        CatalogError::Unavailable(err.to_string())
    }
}

/// An artist as reported by the primary catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogArtist {
    pub id: String,
    pub name: String,
    pub genres: Vec<String>,
    pub image_url: Option<String>,
    pub popularity: i64,
    pub followers: i64,
    pub url: Option<String>,
}

/// A release as reported by the primary catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogRelease {
    pub id: String,
    pub name: String,
    /// Raw album group string ("album", "single", "compilation").
    pub album_type: String,
    pub release_date: NaiveDate,
    pub total_tracks: Option<i64>,
    pub image_url: Option<String>,
    pub url: String,
}

/// An artist as reported by the secondary catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct SecondaryArtist {
    pub id: String,
    pub name: String,
    pub url: Option<String>,
    pub image_url: Option<String>,
}

/// An album as reported by the secondary catalog, used to cross-link
/// releases by name.
#[derive(Debug, Clone, PartialEq)]
pub struct SecondaryAlbum {
    pub id: String,
    pub name: String,
    pub url: Option<String>,
}

#[async_trait]
pub trait PrimaryCatalog: Send + Sync {
    async fn search_artists(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<CatalogArtist>, CatalogError>;

    async fn get_artist(&self, id: &str) -> Result<CatalogArtist, CatalogError>;

    /// All albums, singles and compilations of the artist, most recent page
    /// first as the provider returns them.
    async fn get_artist_releases(&self, id: &str) -> Result<Vec<CatalogRelease>, CatalogError>;
}

#[async_trait]
pub trait SecondaryCatalog: Send + Sync {
    async fn search_artists(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SecondaryArtist>, CatalogError>;

    async fn get_artist(&self, id: &str) -> Result<SecondaryArtist, CatalogError>;

    /// Search by name and pick the exact normalized match, falling back to
    /// the provider's first result. `Ok(None)` when nothing was found.
    async fn find_artist_by_name(
        &self,
        name: &str,
    ) -> Result<Option<SecondaryArtist>, CatalogError>;

    async fn get_artist_albums(
        &self,
        id: &str,
        limit: usize,
    ) -> Result<Vec<SecondaryAlbum>, CatalogError>;
}

/// Parse a primary-catalog release date, which comes at year, year-month or
/// full-date precision. Coarser precisions resolve to the first day of the
/// period. `None` for anything else.
pub fn parse_release_date(raw: &str) -> Option<NaiveDate> {
    match raw.len() {
        4 => {
            let year: i32 = raw.parse().ok()?;
            NaiveDate::from_ymd_opt(year, 1, 1)
        }
        7 => {
            let (year, month) = raw.split_once('-')?;
            NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1)
        }
        _ => NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok(),
    }
}
