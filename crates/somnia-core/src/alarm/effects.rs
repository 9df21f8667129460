//! Alarm side effects.
//!
//! The alarm engine never touches audio or UI. It returns a list of
//! [`Effect`]s, and an [`EffectRunner`] hands them to an
//! [`AlarmDispatcher`]. Dispatcher failures are logged and turned into
//! notices; they never stop the remaining effects from running, so the
//! stop/snooze prompt is shown even when the sound cannot be played.

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::state::TriggerReason;
use crate::error::DispatchError;
use crate::storage::NotificationsConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PromptAction {
    Snooze { minutes: u32 },
    Stop,
}

/// The wake-up prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmPrompt {
    pub reason: TriggerReason,
    pub title: String,
    pub message: String,
    pub actions: Vec<PromptAction>,
}

/// A non-fatal, user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Effect {
    PlaySound { sound: String },
    StopSound,
    ShowPrompt(AlarmPrompt),
    Notice(Notice),
}

/// Output settings handed to [`AlarmDispatcher::play`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Playback {
    /// 0 to 100.
    pub volume: u32,
    pub vibrate: bool,
}

impl Default for Playback {
    fn default() -> Self {
        Self {
            volume: 50,
            vibrate: true,
        }
    }
}

/// Executes effects against the platform (audio, dialogs, notices).
pub trait AlarmDispatcher: Send {
    fn play(&mut self, sound: &str, playback: Playback) -> Result<(), DispatchError>;

    /// Stop whatever is playing without waiting for it to finish.
    fn stop(&mut self) -> Result<(), DispatchError>;

    fn prompt(&mut self, prompt: &AlarmPrompt) -> Result<(), DispatchError>;

    fn notify(&mut self, notice: &Notice) -> Result<(), DispatchError>;
}

/// Outcome of running a batch of effects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchReport {
    pub executed: usize,
    pub failures: Vec<DispatchError>,
    /// Notices raised because an effect failed.
    pub notices: Vec<Notice>,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs effects with the user's notification preferences applied.
///
/// With notifications disabled, notices are still collected in the
/// report but never reach the dispatcher. The alarm sound and prompt are
/// not affected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectRunner {
    playback: Playback,
    notices_enabled: bool,
}

impl Default for EffectRunner {
    fn default() -> Self {
        Self::new(&NotificationsConfig::default())
    }
}

impl EffectRunner {
    pub fn new(config: &NotificationsConfig) -> Self {
        Self {
            playback: Playback {
                volume: config.volume.min(100),
                vibrate: config.vibration,
            },
            notices_enabled: config.enabled,
        }
    }

    pub fn playback(&self) -> Playback {
        self.playback
    }

    pub fn run(&self, dispatcher: &mut dyn AlarmDispatcher, effects: &[Effect]) -> DispatchReport {
        let mut report = DispatchReport::default();
        for effect in effects {
            let result = match effect {
                Effect::PlaySound { sound } => {
                    dispatcher.play(sound, self.playback).map_err(|e| {
                        report.notices.push(Notice {
                            title: "Alarm".into(),
                            body: "Could not play alarm sound".into(),
                        });
                        e
                    })
                }
                Effect::StopSound => dispatcher.stop(),
                Effect::ShowPrompt(prompt) => dispatcher.prompt(prompt),
                Effect::Notice(notice) => {
                    if !self.notices_enabled {
                        debug!(title = %notice.title, "notifications disabled; notice skipped");
                        continue;
                    }
                    dispatcher.notify(notice)
                }
            };
            match result {
                Ok(()) => report.executed += 1,
                Err(e) => {
                    warn!(error = %e, ?effect, "alarm effect failed");
                    report.failures.push(e);
                }
            }
        }

        if self.notices_enabled {
            for notice in &report.notices {
                if let Err(e) = dispatcher.notify(notice) {
                    warn!(error = %e, "failed to surface alarm notice");
                }
            }
        }
        report
    }
}

/// One call recorded by [`RecordingDispatcher`].
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchCall {
    Play(String, Playback),
    Stop,
    Prompt(AlarmPrompt),
    Notify(Notice),
}

/// Dispatcher that records calls and can be told to fail playback.
///
/// Clones share the call log, so a test can keep a handle after moving the
/// dispatcher into a monitor.
#[derive(Debug, Clone, Default)]
pub struct RecordingDispatcher {
    calls: Arc<Mutex<Vec<DispatchCall>>>,
    fail_play: bool,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_audio() -> Self {
        Self {
            calls: Arc::default(),
            fail_play: true,
        }
    }

    pub fn calls(&self) -> Vec<DispatchCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn prompts(&self) -> Vec<AlarmPrompt> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                DispatchCall::Prompt(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: DispatchCall) {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(call);
    }
}

impl AlarmDispatcher for RecordingDispatcher {
    fn play(&mut self, sound: &str, playback: Playback) -> Result<(), DispatchError> {
        self.record(DispatchCall::Play(sound.to_string(), playback));
        if self.fail_play {
            return Err(DispatchError::Audio(format!("unsupported format: {sound}")));
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), DispatchError> {
        self.record(DispatchCall::Stop);
        Ok(())
    }

    fn prompt(&mut self, prompt: &AlarmPrompt) -> Result<(), DispatchError> {
        self.record(DispatchCall::Prompt(prompt.clone()));
        Ok(())
    }

    fn notify(&mut self, notice: &Notice) -> Result<(), DispatchError> {
        self.record(DispatchCall::Notify(notice.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trigger_effects() -> Vec<Effect> {
        vec![
            Effect::PlaySound {
                sound: "gentle_chime".into(),
            },
            Effect::ShowPrompt(AlarmPrompt {
                reason: TriggerReason::Scheduled,
                title: "Wake up!".into(),
                message: "It's time to wake up.".into(),
                actions: vec![PromptAction::Snooze { minutes: 5 }, PromptAction::Stop],
            }),
        ]
    }

    #[test]
    fn runs_every_effect_in_order() {
        let mut dispatcher = RecordingDispatcher::new();
        let report = EffectRunner::default().run(&mut dispatcher, &trigger_effects());
        assert!(report.is_clean());
        assert_eq!(report.executed, 2);
        let calls = dispatcher.calls();
        assert_eq!(
            calls[0],
            DispatchCall::Play("gentle_chime".into(), Playback::default())
        );
        assert!(matches!(calls[1], DispatchCall::Prompt(_)));
    }

    #[test]
    fn audio_failure_still_shows_prompt_and_raises_notice() {
        let mut dispatcher = RecordingDispatcher::failing_audio();
        let report = EffectRunner::default().run(&mut dispatcher, &trigger_effects());

        assert_eq!(report.failures.len(), 1);
        assert_eq!(dispatcher.prompts().len(), 1);
        assert_eq!(report.notices.len(), 1);
        assert!(matches!(
            dispatcher.calls().last(),
            Some(DispatchCall::Notify(n)) if n.body == "Could not play alarm sound"
        ));
    }

    #[test]
    fn volume_and_vibration_come_from_preferences() {
        let config = NotificationsConfig {
            enabled: true,
            volume: 80,
            vibration: false,
        };
        let mut dispatcher = RecordingDispatcher::new();
        EffectRunner::new(&config).run(&mut dispatcher, &trigger_effects());
        assert_eq!(
            dispatcher.calls()[0],
            DispatchCall::Play(
                "gentle_chime".into(),
                Playback {
                    volume: 80,
                    vibrate: false
                }
            )
        );
    }

    #[test]
    fn disabled_notifications_skip_notices_but_keep_the_prompt() {
        let config = NotificationsConfig {
            enabled: false,
            ..NotificationsConfig::default()
        };
        let runner = EffectRunner::new(&config);
        let mut dispatcher = RecordingDispatcher::failing_audio();

        let mut effects = trigger_effects();
        effects.push(Effect::Notice(Notice {
            title: "Sleep".into(),
            body: "Goal reached".into(),
        }));
        let report = runner.run(&mut dispatcher, &effects);

        assert_eq!(report.notices.len(), 1);
        assert_eq!(dispatcher.prompts().len(), 1);
        assert!(!dispatcher
            .calls()
            .iter()
            .any(|c| matches!(c, DispatchCall::Notify(_))));
    }
}
