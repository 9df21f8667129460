mod effects;
mod engine;
mod monitor;
mod state;

pub use effects::{
    AlarmDispatcher, AlarmPrompt, DispatchCall, DispatchReport, Effect, EffectRunner, Notice,
    Playback, PromptAction, RecordingDispatcher,
};
pub use engine::{AlarmEngine, Transition};
pub use monitor::{spawn_alarm_loop, AlarmMonitor, MAX_PENDING_EVENTS};
pub use state::{AlarmPhase, AlarmState, TriggerReason};
