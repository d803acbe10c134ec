//! Encore Server Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod artists;
pub mod background_jobs;
pub mod catalog;
pub mod config;
pub mod email;
pub mod matching;
pub mod notifications;
pub mod releases;
pub mod sqlite_persistence;
pub mod tracker_store;

// Re-export commonly used types for convenience
pub use artists::ArtistResolver;
pub use notifications::{NotificationDispatcher, WeeklyDigest};
pub use releases::ReleaseSynchronizer;
pub use tracker_store::{SqliteTrackerStore, TrackerStore};
