//! Daily assessment streaks.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Offset, Timelike, Utc};

use crate::models::Streak;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StreakUpdate {
    Started,
    SameDay,
    Extended,
    Reset,
}

/// Advance (or create) a user's streak for a submission made on `today`.
pub fn advance(user_uid: &str, prior: Option<&Streak>, today: NaiveDate) -> (Streak, StreakUpdate) {
    let Some(prior) = prior else {
        let streak = Streak {
            user_uid: user_uid.to_string(),
            current_streak: 1,
            longest_streak: 1,
            last_assessment_date: today,
        };
        return (streak, StreakUpdate::Started);
    };

    let gap = (today - prior.last_assessment_date).num_days();
    match gap {
        // a clock that moved backwards counts as the same day
        d if d <= 0 => (prior.clone(), StreakUpdate::SameDay),
        1 => {
            let current = prior.current_streak + 1;
            let streak = Streak {
                user_uid: prior.user_uid.clone(),
                current_streak: current,
                longest_streak: prior.longest_streak.max(current),
                last_assessment_date: today,
            };
            (streak, StreakUpdate::Extended)
        }
        _ => {
            let streak = Streak {
                user_uid: prior.user_uid.clone(),
                current_streak: 1,
                longest_streak: prior.longest_streak.max(1),
                last_assessment_date: today,
            };
            (streak, StreakUpdate::Reset)
        }
    }
}

/// Daily cutoff for accepting submissions, evaluated in server-local time.
///
/// A time is accepted when `hour < cutoff_hour`, or when `hour == cutoff_hour`
/// and `minute <= cutoff_minute`. Seconds are ignored, so with the default
/// cutoff of 23:59 every time of day is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionWindow {
    pub cutoff_hour: u32,
    pub cutoff_minute: u32,
    pub offset: FixedOffset,
}

impl Default for SubmissionWindow {
    fn default() -> Self {
        Self {
            cutoff_hour: 23,
            cutoff_minute: 59,
            offset: Utc.fix(),
        }
    }
}

impl SubmissionWindow {
    pub fn new(cutoff_hour: u32, cutoff_minute: u32, offset: FixedOffset) -> Self {
        Self { cutoff_hour, cutoff_minute, offset }
    }

    /// Parse an `HH:MM` cutoff.
    pub fn parse_cutoff(raw: &str) -> Option<(u32, u32)> {
        let time = NaiveTime::parse_from_str(raw.trim(), "%H:%M").ok()?;
        Some((time.hour(), time.minute()))
    }

    pub fn local(&self, now: DateTime<Utc>) -> DateTime<FixedOffset> {
        now.with_timezone(&self.offset)
    }

    pub fn accepts(&self, local: NaiveTime) -> bool {
        let (hour, minute) = (local.hour(), local.minute());
        hour < self.cutoff_hour || (hour == self.cutoff_hour && minute <= self.cutoff_minute)
    }

    /// The calendar date a submission at `now` counts towards, or `None` when
    /// the window is closed.
    pub fn submission_date(&self, now: DateTime<Utc>) -> Option<NaiveDate> {
        let local = self.local(now);
        self.accepts(local.time()).then(|| local.date_naive())
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always reports the same instant.
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
