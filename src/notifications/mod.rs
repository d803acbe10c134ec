mod digest;
mod dispatcher;

pub use digest::{week_bounds, DigestStats, WeeklyDigest};
pub use dispatcher::NotificationDispatcher;
