use super::context::JobContext;
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration as ChronoDuration, NaiveTime, Utc, Weekday};
use std::time::Duration;

/// Schedule for when a job should run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobSchedule {
    /// Run at fixed intervals, first run one interval after startup.
    Interval(Duration),
    /// Run once a day at the given UTC time.
    Daily { hour: u32, minute: u32 },
    /// Run once a week on the given UTC weekday and time.
    Weekly {
        weekday: Weekday,
        hour: u32,
        minute: u32,
    },
}

impl JobSchedule {
    /// The next instant strictly after `now` at which the schedule fires.
    pub fn next_run(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            JobSchedule::Interval(interval) => {
                now + ChronoDuration::from_std(*interval).unwrap_or(ChronoDuration::zero())
            }
            JobSchedule::Daily { hour, minute } => {
                let at = NaiveTime::from_hms_opt(*hour, *minute, 0)
                    .unwrap_or(NaiveTime::MIN);
                let mut candidate = now.date_naive().and_time(at).and_utc();
                if candidate <= now {
                    candidate += ChronoDuration::days(1);
                }
                candidate
            }
            JobSchedule::Weekly {
                weekday,
                hour,
                minute,
            } => {
                let at = NaiveTime::from_hms_opt(*hour, *minute, 0)
                    .unwrap_or(NaiveTime::MIN);
                let days_ahead = (weekday.num_days_from_monday() as i64
                    - now.weekday().num_days_from_monday() as i64)
                    .rem_euclid(7);
                let mut candidate =
                    (now.date_naive() + ChronoDuration::days(days_ahead)).and_time(at).and_utc();
                if candidate <= now {
                    candidate += ChronoDuration::days(7);
                }
                candidate
            }
        }
    }
}

/// Errors surfaced by job execution.
#[derive(Debug)]
pub enum JobError {
    ExecutionFailed(String),
    Cancelled,
}

impl std::fmt::Display for JobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobError::ExecutionFailed(msg) => write!(f, "Execution failed: {}", msg),
            JobError::Cancelled => write!(f, "Job was cancelled"),
        }
    }
}

impl std::error::Error for JobError {}

impl From<anyhow::Error> for JobError {
    fn from(err: anyhow::Error) -> Self {
        JobError::ExecutionFailed(format!("{:#}", err))
    }
}

/// A recurring background job owned by the scheduler.
#[async_trait]
pub trait BackgroundJob: Send + Sync {
    fn id(&self) -> &'static str;

    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn schedule(&self) -> JobSchedule;

    async fn execute(&self, ctx: &JobContext) -> Result<(), JobError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_interval_next_run() {
        let now = Utc.with_ymd_and_hms(2024, 3, 13, 10, 0, 0).unwrap();
        let schedule = JobSchedule::Interval(Duration::from_secs(3600));
        assert_eq!(
            schedule.next_run(now),
            Utc.with_ymd_and_hms(2024, 3, 13, 11, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_daily_next_run_same_day_and_next_day() {
        let schedule = JobSchedule::Daily { hour: 9, minute: 0 };

        let before = Utc.with_ymd_and_hms(2024, 3, 13, 7, 30, 0).unwrap();
        assert_eq!(
            schedule.next_run(before),
            Utc.with_ymd_and_hms(2024, 3, 13, 9, 0, 0).unwrap()
        );

        let after = Utc.with_ymd_and_hms(2024, 3, 13, 9, 0, 0).unwrap();
        assert_eq!(
            schedule.next_run(after),
            Utc.with_ymd_and_hms(2024, 3, 14, 9, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_weekly_next_run() {
        let schedule = JobSchedule::Weekly {
            weekday: Weekday::Mon,
            hour: 9,
            minute: 0,
        };

        // 2024-03-13 is a Wednesday, next Monday is the 18th
        let wednesday = Utc.with_ymd_and_hms(2024, 3, 13, 10, 0, 0).unwrap();
        assert_eq!(
            schedule.next_run(wednesday),
            Utc.with_ymd_and_hms(2024, 3, 18, 9, 0, 0).unwrap()
        );

        // A Monday before 09:00 fires the same day
        let monday_early = Utc.with_ymd_and_hms(2024, 3, 11, 8, 0, 0).unwrap();
        assert_eq!(
            schedule.next_run(monday_early),
            Utc.with_ymd_and_hms(2024, 3, 11, 9, 0, 0).unwrap()
        );

        // A Monday at exactly 09:00 rolls over a full week
        let monday_sharp = Utc.with_ymd_and_hms(2024, 3, 11, 9, 0, 0).unwrap();
        assert_eq!(
            schedule.next_run(monday_sharp),
            Utc.with_ymd_and_hms(2024, 3, 18, 9, 0, 0).unwrap()
        );
    }
}
