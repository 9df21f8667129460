//! Sleep statistics.
//!
//! Sessions are attributed to the UTC calendar day they ended on (the wake
//! day), so a night that starts at 23:00 counts towards the next morning.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::session::SleepSession;

/// Upper bound on how many days back the streak scan looks.
pub const STREAK_SCAN_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SleepStats {
    /// Mean duration of closed sessions in the window, one decimal.
    pub average_sleep: f64,
    /// Consecutive days, ending today, with a session meeting the goal.
    pub sleep_streak: u32,
    /// Sessions in the window meeting the goal.
    pub goal_achievement: u32,
    /// All-time closed session count.
    pub total_sessions: usize,
}

fn wake_day(session: &SleepSession) -> Option<NaiveDate> {
    session.end_time.map(|t| t.date_naive())
}

fn meets_goal(session: &SleepSession, goal_hours: f64) -> bool {
    session.duration_hours.is_some_and(|d| d >= goal_hours)
}

pub fn compute_sleep_stats(
    sessions: &[SleepSession],
    now: DateTime<Utc>,
    goal_hours: f64,
    window_days: u32,
) -> SleepStats {
    let today = now.date_naive();
    let closed: Vec<&SleepSession> = sessions.iter().filter(|s| !s.is_open()).collect();

    let window_start = today - Duration::days(i64::from(window_days.max(1)) - 1);
    let in_window: Vec<&SleepSession> = closed
        .iter()
        .copied()
        .filter(|s| wake_day(s).is_some_and(|d| d >= window_start && d <= today))
        .collect();

    let average_sleep = if in_window.is_empty() {
        0.0
    } else {
        let total: f64 = in_window.iter().filter_map(|s| s.duration_hours).sum();
        (total / in_window.len() as f64 * 10.0).round() / 10.0
    };

    let goal_achievement = in_window.iter().filter(|s| meets_goal(s, goal_hours)).count() as u32;

    let mut sleep_streak = 0;
    for offset in 0..STREAK_SCAN_DAYS {
        let day = today - Duration::days(offset);
        let qualifies = closed
            .iter()
            .any(|s| wake_day(s) == Some(day) && meets_goal(s, goal_hours));
        if !qualifies {
            break;
        }
        sleep_streak += 1;
    }

    SleepStats {
        average_sleep,
        sleep_streak,
        goal_achievement,
        total_sessions: closed.len(),
    }
}
