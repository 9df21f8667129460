use clap::Subcommand;
use serde_json::json;
use somnia_core::sleep::parse_clock_time;
use somnia_core::{Clock, SleepSchedule};

use super::{print_json, CliResult, Context};

#[derive(Subcommand)]
pub enum ScheduleAction {
    /// Show bedtime, wake time and the next wake-up
    Show,
    /// Change bedtime and/or wake time (HH:MM, UTC)
    Set {
        #[arg(long)]
        bedtime: Option<String>,
        #[arg(long)]
        wake: Option<String>,
    },
}

fn describe(ctx: &Context, schedule: &SleepSchedule) -> CliResult {
    print_json(&json!({
        "bedtime": schedule.bedtime.format("%H:%M").to_string(),
        "wakeTime": schedule.wake_time.format("%H:%M").to_string(),
        "plannedHours": schedule.planned_hours(),
        "nextWake": schedule.next_wake_time(ctx.clock.now()),
    }))
}

pub fn run(action: ScheduleAction) -> CliResult {
    let ctx = Context::open()?;
    let mut schedule = SleepSchedule::load(ctx.store.as_ref())?;

    match action {
        ScheduleAction::Show => describe(&ctx, &schedule)?,
        ScheduleAction::Set { bedtime, wake } => {
            if let Some(bedtime) = bedtime {
                schedule.bedtime = parse_clock_time(&bedtime)?;
            }
            if let Some(wake) = wake {
                schedule.wake_time = parse_clock_time(&wake)?;
            }
            schedule.save(ctx.store.as_ref())?;
            describe(&ctx, &schedule)?;
        }
    }
    Ok(())
}
