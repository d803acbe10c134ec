mod models;
mod schema;
mod store;
mod trait_def;

pub use models::{
    Artist, Favorite, NewArtist, NewRelease, NotificationChannel, NotificationFrequency,
    NotificationLogEntry, NotificationPreference, NotificationStatus, Release,
    ReleaseInsertOutcome, ReleaseType, User,
};
pub use store::SqliteTrackerStore;
pub use trait_def::TrackerStore;
