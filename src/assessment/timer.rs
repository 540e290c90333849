use std::time::Duration;

use chrono::{DateTime, Utc};
use log::info;
use tokio::time::Instant;

use crate::models::Attempt;

/// Deadline of a timed attempt, pinned to the runtime clock.
///
/// The wall-clock offset `started_at + limit - now` is taken once when the
/// countdown is created; everything afterwards is measured on the monotonic
/// tokio clock.
#[derive(Debug, Clone, Copy)]
pub struct Countdown {
    deadline: Instant,
    limit: Duration,
}

impl Countdown {
    /// `None` for attempts without a limit (absent or zero minutes).
    pub fn for_attempt(attempt: &Attempt) -> Option<Self> {
        Self::at(attempt, Utc::now())
    }

    pub(crate) fn at(attempt: &Attempt, now: DateTime<Utc>) -> Option<Self> {
        let minutes = attempt.time_limit_minutes.filter(|m| *m > 0)?;
        let limit = Duration::from_secs(u64::from(minutes) * 60);

        let elapsed = (now - attempt.started_at).to_std().unwrap_or(Duration::ZERO);
        let left = limit.saturating_sub(elapsed);
        info!(
            "⏱️ Countdown for attempt {}: {}s of {}s left",
            attempt.id,
            left.as_secs(),
            limit.as_secs()
        );

        Some(Self {
            deadline: Instant::now() + left,
            limit,
        })
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }

    /// `max(0, deadline - now)`.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }
}

/// `mm:ss`, or `h:mm:ss` past the hour.
pub fn format_remaining(remaining: Duration) -> String {
    let secs = remaining.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{:02}:{:02}", m, s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AttemptStatus;

    fn attempt(limit: Option<u32>, started_at: DateTime<Utc>) -> Attempt {
        Attempt {
            id: 1,
            user_id: Some(1),
            assessment_id: Some(1),
            status: AttemptStatus::Started,
            started_at,
            time_limit_minutes: limit,
            score: None,
            submitted_at: None,
        }
    }

    #[test]
    fn zero_or_missing_limit_means_no_countdown() {
        let now = Utc::now();
        assert!(Countdown::at(&attempt(None, now), now).is_none());
        assert!(Countdown::at(&attempt(Some(0), now), now).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn remaining_accounts_for_time_already_spent() {
        let now = Utc::now();
        let started = now - chrono::Duration::seconds(90);
        let countdown = Countdown::at(&attempt(Some(2), started), now).unwrap();
        assert_eq!(countdown.limit(), Duration::from_secs(120));
        assert_eq!(countdown.remaining(), Duration::from_secs(30));

        tokio::time::advance(Duration::from_secs(45)).await;
        assert!(countdown.is_expired());
        assert_eq!(countdown.remaining(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn overdue_attempt_is_expired_immediately() {
        let now = Utc::now();
        let started = now - chrono::Duration::minutes(30);
        let countdown = Countdown::at(&attempt(Some(10), started), now).unwrap();
        assert!(countdown.is_expired());
    }

    #[test]
    fn formats_remaining_time() {
        assert_eq!(format_remaining(Duration::from_secs(65)), "01:05");
        assert_eq!(format_remaining(Duration::from_secs(3725)), "1:02:05");
        assert_eq!(format_remaining(Duration::ZERO), "00:00");
    }
}
