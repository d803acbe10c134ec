//! Artist resolution: local cache in front of the catalogs.
//!
//! Artists are stored on first use and enriched with a secondary-catalog
//! identity when one can be matched. Popularity snapshots are refreshed
//! lazily once they are older than a day.

use crate::catalog::{CatalogArtist, CatalogError, PrimaryCatalog, SecondaryCatalog};
use crate::tracker_store::{Artist, Favorite, NewArtist, TrackerStore};
use anyhow::{bail, Context, Result};
use chrono::{Duration, Utc};
use std::sync::Arc;

const SNAPSHOT_TTL_HOURS: i64 = 24;

pub struct ArtistResolver {
    store: Arc<dyn TrackerStore>,
    primary: Arc<dyn PrimaryCatalog>,
    secondary: Arc<dyn SecondaryCatalog>,
}

impl ArtistResolver {
    pub fn new(
        store: Arc<dyn TrackerStore>,
        primary: Arc<dyn PrimaryCatalog>,
        secondary: Arc<dyn SecondaryCatalog>,
    ) -> Self {
        Self {
            store,
            primary,
            secondary,
        }
    }

    /// Search the primary catalog. Results are not persisted; an artist only
    /// enters the store once somebody favorites it.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<CatalogArtist>> {
        self.primary
            .search_artists(query, limit)
            .await
            .context("Artist search failed")
    }

    /// Fetch the stored artist for a primary catalog id, creating it from
    /// the catalog on first use.
    ///
    /// A primary catalog failure is fatal here; the secondary enrichment is
    /// best-effort and never fails the resolution.
    pub async fn get_or_create(&self, primary_id: &str) -> Result<Artist> {
        if let Some(artist) = self.store.get_artist_by_primary_id(primary_id)? {
            if artist.secondary_id.is_none() {
                return self.try_enrich(artist).await;
            }
            return Ok(artist);
        }

        let catalog_artist = self
            .primary
            .get_artist(primary_id)
            .await
            .with_context(|| format!("Failed to resolve artist {}", primary_id))?;

        let secondary_id = self.lookup_secondary_id(&catalog_artist.name).await;
        let artist = self.store.insert_artist(&NewArtist {
            primary_id: catalog_artist.id,
            secondary_id,
            name: catalog_artist.name,
            genres: catalog_artist.genres,
            image_url: catalog_artist.image_url,
            popularity: catalog_artist.popularity,
            followers: catalog_artist.followers,
        })?;
        tracing::info!("Created artist '{}' ({})", artist.name, artist.primary_id);
        Ok(artist)
    }

    /// Favorite an artist for a user, resolving it first.
    pub async fn add_favorite(
        &self,
        user_id: i64,
        primary_id: &str,
        category: &str,
    ) -> Result<(Favorite, Artist)> {
        let artist = self.get_or_create(primary_id).await?;
        let favorite = self.store.add_favorite(user_id, artist.id, category)?;
        Ok((favorite, artist))
    }

    pub fn remove_favorite(&self, user_id: i64, artist_id: i64) -> Result<()> {
        if self.store.remove_favorite(user_id, artist_id)? == 0 {
            bail!("Artist {} is not in user {}'s favorites", artist_id, user_id);
        }
        Ok(())
    }

    /// The user's favorites, refreshing stale popularity snapshots along the
    /// way. A failed refresh keeps the cached values.
    pub async fn get_user_favorites(&self, user_id: i64) -> Result<Vec<(Favorite, Artist)>> {
        let favorites = self.store.get_user_favorites(user_id)?;
        let mut refreshed = Vec::with_capacity(favorites.len());
        for (favorite, artist) in favorites {
            let artist = self.refresh_if_stale(artist).await;
            refreshed.push((favorite, artist));
        }
        Ok(refreshed)
    }

    /// Refresh the popularity snapshot when it is older than the TTL.
    pub async fn refresh_if_stale(&self, artist: Artist) -> Artist {
        let age = Utc::now() - artist.last_refreshed_at;
        if age < Duration::hours(SNAPSHOT_TTL_HOURS) {
            return artist;
        }
        match self.primary.get_artist(&artist.primary_id).await {
            Ok(fresh) => {
                if let Err(err) =
                    self.store
                        .update_artist_snapshot(artist.id, fresh.popularity, fresh.followers)
                {
                    tracing::error!("Failed to persist snapshot for '{}': {}", artist.name, err);
                    return artist;
                }
                match self.store.get_artist(artist.id) {
                    Ok(Some(updated)) => updated,
                    _ => artist,
                }
            }
            Err(err) => {
                tracing::warn!("Snapshot refresh failed for '{}': {}", artist.name, err);
                artist
            }
        }
    }

    async fn try_enrich(&self, artist: Artist) -> Result<Artist> {
        match self.lookup_secondary_id(&artist.name).await {
            Some(secondary_id) => {
                self.store
                    .set_artist_secondary_id(artist.id, &secondary_id)?;
                tracing::info!(
                    "Enriched artist '{}' with secondary id {}",
                    artist.name,
                    secondary_id
                );
                Ok(Artist {
                    secondary_id: Some(secondary_id),
                    ..artist
                })
            }
            None => Ok(artist),
        }
    }

    async fn lookup_secondary_id(&self, name: &str) -> Option<String> {
        match self.secondary.find_artist_by_name(name).await {
            Ok(Some(found)) => Some(found.id),
            Ok(None) => None,
            Err(CatalogError::NotFound) => None,
            Err(err) => {
                tracing::warn!("Secondary lookup failed for '{}': {}", name, err);
                None
            }
        }
    }
}
