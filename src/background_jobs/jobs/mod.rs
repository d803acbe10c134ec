mod daily_notifications;
mod notification_log_cleanup;
mod release_sync;
mod weekly_notifications;

pub use daily_notifications::DailyNotificationsJob;
pub use notification_log_cleanup::NotificationLogCleanupJob;
pub use release_sync::ReleaseSyncJob;
pub use weekly_notifications::WeeklyNotificationsJob;
