//! Periodic state recovery
//!
//! Idempotent safety nets for states the system should never be stuck in.
//! These are not part of the transition logic, and none of them may fire
//! while a legitimate multi-chunk response is still streaming.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::state::{ConversationState, StateMachine};

/// Longest a conversation may legitimately sit in Processing
const PROCESSING_CEILING: Duration = Duration::from_secs(30);

/// Observations and remedies supplied by the daemon each sweep.
///
/// The monitor decides; the closures act. Keeps the checks testable
/// without real audio hardware.
pub struct RecoveryContext<'a> {
    pub wake_paused: bool,
    pub device_playing: bool,
    pub resume_wake: &'a dyn Fn(),
    pub stop_playback: &'a dyn Fn(),
}

pub struct RecoveryMonitor {
    state: Arc<StateMachine>,
    sequential_active: Arc<AtomicBool>,
    processing_ceiling: Duration,
}

impl RecoveryMonitor {
    pub fn new(state: Arc<StateMachine>, sequential_active: Arc<AtomicBool>) -> Self {
        Self {
            state,
            sequential_active,
            processing_ceiling: PROCESSING_CEILING,
        }
    }

    #[cfg(test)]
    fn with_ceiling(mut self, ceiling: Duration) -> Self {
        self.processing_ceiling = ceiling;
        self
    }

    /// Run all checks once; returns the labels of checks that fired
    pub fn sweep(&self, ctx: &RecoveryContext) -> Vec<&'static str> {
        let mut fired = Vec::new();
        let state = self.state.state();
        let streaming = self.sequential_active.load(Ordering::SeqCst);

        if state == ConversationState::Idle && ctx.wake_paused {
            tracing::warn!("wake detection paused while idle, resuming");
            (ctx.resume_wake)();
            fired.push("wake_resumed");
        }

        if state == ConversationState::Idle && ctx.device_playing && !streaming {
            tracing::warn!("device playing while idle, stopping");
            (ctx.stop_playback)();
            fired.push("playback_stopped");
        }

        if state == ConversationState::Processing
            && !streaming
            && self.state.time_in_state() > self.processing_ceiling
        {
            tracing::warn!(
                ceiling_secs = self.processing_ceiling.as_secs(),
                "stuck in Processing past ceiling, forcing idle"
            );
            (ctx.stop_playback)();
            self.state
                .transition(ConversationState::Idle, "recovery_timeout");
            fired.push("processing_timeout");
        }

        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn machine_in(state: ConversationState) -> Arc<StateMachine> {
        let machine = Arc::new(StateMachine::new());
        match state {
            ConversationState::Idle => {}
            ConversationState::Listening => {
                machine.transition(ConversationState::Listening, "test");
            }
            ConversationState::Processing => {
                machine.transition(ConversationState::Listening, "test");
                machine.transition(ConversationState::Processing, "test");
            }
            ConversationState::Speaking => {
                machine.transition(ConversationState::Listening, "test");
                machine.transition(ConversationState::Processing, "test");
                machine.transition(ConversationState::Speaking, "test");
            }
        }
        machine
    }

    fn quiet_ctx<'a>(noop: &'a dyn Fn()) -> RecoveryContext<'a> {
        RecoveryContext {
            wake_paused: false,
            device_playing: false,
            resume_wake: noop,
            stop_playback: noop,
        }
    }

    #[test]
    fn healthy_system_fires_nothing() {
        let monitor = RecoveryMonitor::new(
            machine_in(ConversationState::Idle),
            Arc::new(AtomicBool::new(false)),
        );
        let noop = || {};
        assert!(monitor.sweep(&quiet_ctx(&noop)).is_empty());
    }

    #[test]
    fn resumes_wake_paused_in_idle() {
        let monitor = RecoveryMonitor::new(
            machine_in(ConversationState::Idle),
            Arc::new(AtomicBool::new(false)),
        );
        let resumed = AtomicU32::new(0);
        let resume = || {
            resumed.fetch_add(1, Ordering::SeqCst);
        };
        let noop = || {};

        let fired = monitor.sweep(&RecoveryContext {
            wake_paused: true,
            device_playing: false,
            resume_wake: &resume,
            stop_playback: &noop,
        });

        assert_eq!(fired, vec!["wake_resumed"]);
        assert_eq!(resumed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stops_playback_in_idle_unless_streaming() {
        let sequential = Arc::new(AtomicBool::new(false));
        let monitor = RecoveryMonitor::new(
            machine_in(ConversationState::Idle),
            Arc::clone(&sequential),
        );
        let stops = AtomicU32::new(0);
        let stop = || {
            stops.fetch_add(1, Ordering::SeqCst);
        };
        let noop = || {};
        fn ctx<'a>(stop: &'a dyn Fn(), noop: &'a dyn Fn()) -> RecoveryContext<'a> {
            RecoveryContext {
                wake_paused: false,
                device_playing: true,
                resume_wake: noop,
                stop_playback: stop,
            }
        }

        assert_eq!(monitor.sweep(&ctx(&stop, &noop)), vec!["playback_stopped"]);
        assert_eq!(stops.load(Ordering::SeqCst), 1);

        // A streaming response suppresses the check
        sequential.store(true, Ordering::SeqCst);
        assert!(monitor.sweep(&ctx(&stop, &noop)).is_empty());
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn forces_idle_after_processing_ceiling() {
        let machine = machine_in(ConversationState::Processing);
        let monitor = RecoveryMonitor::new(Arc::clone(&machine), Arc::new(AtomicBool::new(false)))
            .with_ceiling(Duration::from_millis(10));

        std::thread::sleep(Duration::from_millis(30));
        let noop = || {};
        let fired = monitor.sweep(&quiet_ctx(&noop));

        assert_eq!(fired, vec!["processing_timeout"]);
        assert_eq!(machine.state(), ConversationState::Idle);
        let history = machine.history(1);
        assert_eq!(history[0].trigger, "recovery_timeout");
    }

    #[test]
    fn processing_within_ceiling_is_left_alone() {
        let machine = machine_in(ConversationState::Processing);
        let monitor = RecoveryMonitor::new(Arc::clone(&machine), Arc::new(AtomicBool::new(false)));

        let noop = || {};
        assert!(monitor.sweep(&quiet_ctx(&noop)).is_empty());
        assert_eq!(machine.state(), ConversationState::Processing);
    }
}
