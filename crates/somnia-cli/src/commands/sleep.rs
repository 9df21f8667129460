use clap::Subcommand;
use somnia_core::SleepQuality;

use super::{print_json, CliResult, Context};

#[derive(Subcommand)]
pub enum SleepAction {
    /// Start tracking a sleep session
    Start,
    /// End the open session
    End {
        /// Poor, Fair, Good, Great or Excellent
        #[arg(long)]
        quality: SleepQuality,
        /// Free-form notes
        #[arg(long)]
        notes: Option<String>,
    },
    /// Print the tracking state as JSON
    Status,
    /// Averages, streak and goal achievement
    Stats {
        /// Days to include, defaults to sleep.stats_window_days
        #[arg(long)]
        window: Option<u32>,
    },
    /// Set the nightly sleep goal in hours
    Goal { hours: f64 },
    /// List closed sessions, newest first
    History {
        #[arg(long, default_value = "20")]
        limit: usize,
    },
}

pub fn run(action: SleepAction) -> CliResult {
    let ctx = Context::open()?;
    let mut tracker = ctx.tracker()?;

    match action {
        SleepAction::Start => {
            let event = tracker.start_sleep()?;
            print_json(&event)?;
        }
        SleepAction::End { quality, notes } => {
            let event = tracker.end_sleep(quality, notes)?;
            print_json(&event)?;
        }
        SleepAction::Status => {
            print_json(&tracker.snapshot())?;
        }
        SleepAction::Stats { window } => {
            let window = window.unwrap_or(ctx.config.sleep.stats_window_days);
            print_json(&tracker.sleep_stats(window))?;
        }
        SleepAction::Goal { hours } => {
            let event = tracker.set_sleep_goal(hours)?;
            print_json(&event)?;
        }
        SleepAction::History { limit } => {
            let sessions: Vec<_> = tracker.sessions().iter().rev().take(limit).collect();
            print_json(&sessions)?;
        }
    }

    // The command already reported the change; surface a failed write.
    if tracker.has_unsaved_changes() {
        tracker.flush()?;
    }
    Ok(())
}
