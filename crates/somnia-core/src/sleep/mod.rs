mod schedule;
mod session;
mod stats;
mod tracker;

pub use schedule::{parse_clock_time, SleepSchedule};
pub use session::{round_hours, SleepQuality, SleepSession, TrackingState};
pub use stats::{compute_sleep_stats, SleepStats, STREAK_SCAN_DAYS};
pub use tracker::{GoalProgress, SleepTracker};
