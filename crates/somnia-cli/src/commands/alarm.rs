use std::error::Error;
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use clap::Subcommand;
use somnia_core::alarm::{spawn_alarm_loop, AlarmDispatcher, AlarmPrompt, Notice, Playback};
use somnia_core::sleep::parse_clock_time;
use somnia_core::{
    AlarmEngine, AlarmMonitor, DispatchError, NotificationCenter, SleepSchedule, TokioScheduler,
};

use super::{print_json, CliResult, Context};

#[derive(Subcommand)]
pub enum AlarmAction {
    /// Arm the alarm at HH:MM (next occurrence, UTC) or an RFC 3339 time
    Set {
        #[arg(required_unless_present = "from_schedule")]
        time: Option<String>,
        /// Use the wake time from `schedule`
        #[arg(long, conflicts_with = "time")]
        from_schedule: bool,
    },
    /// Snooze a ringing alarm
    Snooze {
        /// Defaults to alarm.snooze_minutes
        #[arg(long)]
        minutes: Option<u32>,
    },
    /// Silence and disarm
    Stop,
    /// Disarm without ringing
    Disable,
    /// Evaluate once and print the alarm state
    Status,
    /// Keep evaluating every tick until Ctrl-C, printing events as JSON
    Watch,
}

/// Rings the terminal bell (muted at volume 0) and writes prompts to
/// stderr. Notices also go to the notification inbox.
struct TerminalDispatcher {
    inbox: NotificationCenter,
}

impl AlarmDispatcher for TerminalDispatcher {
    fn play(&mut self, sound: &str, playback: Playback) -> Result<(), DispatchError> {
        if playback.volume == 0 {
            return Ok(());
        }
        let mut err = std::io::stderr();
        write!(err, "\x07")
            .and_then(|()| err.flush())
            .map_err(|e| DispatchError::Audio(format!("{sound}: {e}")))
    }

    fn stop(&mut self) -> Result<(), DispatchError> {
        Ok(())
    }

    fn prompt(&mut self, prompt: &AlarmPrompt) -> Result<(), DispatchError> {
        eprintln!("⏰ {}: {}", prompt.title, prompt.message);
        eprintln!("   somnia-cli alarm snooze | somnia-cli alarm stop");
        Ok(())
    }

    fn notify(&mut self, notice: &Notice) -> Result<(), DispatchError> {
        eprintln!("{}: {}", notice.title, notice.body);
        self.inbox
            .push_notice(notice)
            .map(|_| ())
            .map_err(|e| DispatchError::Prompt(e.to_string()))
    }
}

fn parse_alarm_time(raw: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, Box<dyn Error>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    let wake_time = parse_clock_time(raw)?;
    Ok(SleepSchedule {
        wake_time,
        ..SleepSchedule::default()
    }
    .next_wake_time(now))
}

fn monitor(ctx: &Context) -> Result<AlarmMonitor, Box<dyn Error>> {
    let engine = AlarmEngine::load(ctx.store.as_ref(), &ctx.config.alarm)?;
    let tracker = Arc::new(Mutex::new(ctx.tracker()?));
    let dispatcher = TerminalDispatcher {
        inbox: NotificationCenter::new(Arc::clone(&ctx.store), Arc::clone(&ctx.clock)),
    };
    Ok(
        AlarmMonitor::new(engine, tracker, Arc::clone(&ctx.clock), Box::new(dispatcher))
            .with_store(Arc::clone(&ctx.store))
            .with_notifications(&ctx.config.notifications),
    )
}

pub fn run(action: AlarmAction) -> CliResult {
    let ctx = Context::open()?;
    let mut monitor = monitor(&ctx)?;

    let events = match action {
        AlarmAction::Set {
            time,
            from_schedule,
        } => {
            let now = monitor.now();
            let alarm_time = match time {
                Some(raw) if !from_schedule => parse_alarm_time(&raw, now)?,
                _ => SleepSchedule::load(ctx.store.as_ref())?.next_wake_time(now),
            };
            monitor.set_alarm(alarm_time)?
        }
        AlarmAction::Snooze { minutes } => monitor.snooze(minutes)?,
        AlarmAction::Stop => monitor.stop(),
        AlarmAction::Disable => monitor.disable(),
        AlarmAction::Status => {
            let mut events = monitor.tick();
            events.push(monitor.engine().snapshot(monitor.now()));
            events
        }
        AlarmAction::Watch => return watch(monitor, &ctx),
    };

    for event in &events {
        print_json(event)?;
    }
    Ok(())
}

fn watch(monitor: AlarmMonitor, ctx: &Context) -> CliResult {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()?;
    let period = ctx.config.alarm.tick_period();

    runtime.block_on(async move {
        print_json(&monitor.engine().snapshot(monitor.now()))?;
        let monitor = Arc::new(Mutex::new(monitor));
        let scheduler = TokioScheduler::new(tokio::runtime::Handle::current());
        let token = spawn_alarm_loop(Arc::clone(&monitor), &scheduler, period);

        let mut drain = tokio::time::interval(period);
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        loop {
            tokio::select! {
                _ = &mut ctrl_c => break,
                _ = drain.tick() => {
                    let events = monitor
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .drain_events();
                    for event in &events {
                        print_json(event)?;
                    }
                }
            }
        }

        token.cancel();
        tracing::info!("alarm watch stopped");
        Ok::<(), Box<dyn Error>>(())
    })
}
