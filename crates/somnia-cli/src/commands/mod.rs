pub mod alarm;
pub mod config;
pub mod journal;
pub mod notifications;
pub mod schedule;
pub mod sleep;

use std::error::Error;
use std::sync::Arc;

use serde::Serialize;
use somnia_core::storage::KeyValueStore;
use somnia_core::{Clock, Config, Database, SleepTracker, SystemClock};

pub type CliResult = Result<(), Box<dyn Error>>;

/// What every command needs: the on-disk store, the config and a clock.
pub struct Context {
    pub store: Arc<dyn KeyValueStore>,
    pub config: Config,
    pub clock: Arc<dyn Clock>,
}

impl Context {
    pub fn open() -> Result<Self, Box<dyn Error>> {
        Ok(Self {
            store: Arc::new(Database::open()?),
            config: Config::load()?,
            clock: Arc::new(SystemClock),
        })
    }

    pub fn tracker(&self) -> Result<SleepTracker, Box<dyn Error>> {
        Ok(SleepTracker::load(
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            self.config.sleep.default_goal_hours,
        )?)
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
