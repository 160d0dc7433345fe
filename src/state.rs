//! Conversation state machine
//!
//! Four states (Idle, Listening, Processing, Speaking) with a fixed legal
//! adjacency table. Illegal transition requests are no-ops that report
//! failure; callers decide whether that matters. Registered per-state
//! callbacks run after the internal lock is released.

use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime};

/// Maximum number of transitions kept for diagnostics
const HISTORY_LIMIT: usize = 64;

/// Conversation states for the animatronic system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversationState {
    /// Waiting for the wake word
    Idle,
    /// Recording the user's utterance
    Listening,
    /// Transcribing and generating a response
    Processing,
    /// Playing the response through the toy
    Speaking,
}

impl ConversationState {
    /// Lowercase name used in logs and transition records
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Processing => "processing",
            Self::Speaking => "speaking",
        }
    }

    /// Whether moving to `target` is legal from this state
    #[must_use]
    pub fn allows(self, target: Self) -> bool {
        if self == target {
            return true;
        }
        matches!(
            (self, target),
            (Self::Idle, Self::Listening)
                | (Self::Listening, Self::Processing | Self::Idle)
                | (Self::Processing, Self::Speaking | Self::Idle)
                | (Self::Speaking, Self::Listening | Self::Idle)
        )
    }
}

/// One accepted state transition, kept for diagnostics only
#[derive(Debug, Clone)]
pub struct StateTransition {
    /// State before the transition
    pub from: ConversationState,
    /// State after the transition
    pub to: ConversationState,
    /// Wall-clock time of the transition
    pub timestamp: SystemTime,
    /// What requested the transition (e.g. "wake_word", "speech_end")
    pub trigger: String,
}

/// Callback invoked on entering a state
pub type StateCallback = std::sync::Arc<dyn Fn() + Send + Sync>;

struct Inner {
    state: ConversationState,
    last_activity: Instant,
    last_transition: Instant,
    conversation_start: Option<Instant>,
    history: Vec<StateTransition>,
}

/// Thread-safe conversation state machine
pub struct StateMachine {
    inner: Mutex<Inner>,
    callbacks: Mutex<Vec<(ConversationState, StateCallback)>>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// Create a new machine in the Idle state
    #[must_use]
    pub fn new() -> Self {
        tracing::info!("state machine initialized in idle state");
        Self {
            inner: Mutex::new(Inner {
                state: ConversationState::Idle,
                last_activity: Instant::now(),
                last_transition: Instant::now(),
                conversation_start: None,
                history: Vec::new(),
            }),
            callbacks: Mutex::new(Vec::new()),
        }
    }

    /// Current state (point read under the lock)
    #[must_use]
    pub fn state(&self) -> ConversationState {
        self.inner.lock().expect("state lock poisoned").state
    }

    /// Seconds since the last accepted transition or activity reset
    #[must_use]
    pub fn idle_duration(&self) -> Duration {
        self.inner
            .lock()
            .expect("state lock poisoned")
            .last_activity
            .elapsed()
    }

    /// Time spent in the current state
    #[must_use]
    pub fn time_in_state(&self) -> Duration {
        self.inner
            .lock()
            .expect("state lock poisoned")
            .last_transition
            .elapsed()
    }

    /// Duration of the active conversation session, or `None` outside one
    #[must_use]
    pub fn conversation_duration(&self) -> Option<Duration> {
        self.inner
            .lock()
            .expect("state lock poisoned")
            .conversation_start
            .map(|start| start.elapsed())
    }

    /// Request a transition to `target`.
    ///
    /// Returns `true` and mutates state iff the transition is legal
    /// (self-transitions count as accepted no-ops). On success the activity
    /// timestamp is refreshed, the conversation timer is started on
    /// Idle→Listening and cleared on entry to Idle, and the transition is
    /// appended to the bounded history. Callbacks for the entered state run
    /// after the lock is released; a panicking callback is logged and does
    /// not roll back the transition.
    pub fn transition(&self, target: ConversationState, trigger: &str) -> bool {
        {
            let mut inner = self.inner.lock().expect("state lock poisoned");
            let from = inner.state;

            if !from.allows(target) {
                tracing::warn!(
                    from = from.name(),
                    to = target.name(),
                    trigger,
                    "rejected state transition"
                );
                return false;
            }

            inner.state = target;
            inner.last_activity = Instant::now();
            inner.last_transition = Instant::now();

            if from == ConversationState::Idle && target == ConversationState::Listening {
                inner.conversation_start = Some(Instant::now());
                tracing::info!("conversation session started");
            } else if target == ConversationState::Idle {
                inner.conversation_start = None;
            }

            inner.history.push(StateTransition {
                from,
                to: target,
                timestamp: SystemTime::now(),
                trigger: trigger.to_string(),
            });
            if inner.history.len() > HISTORY_LIMIT {
                inner.history.remove(0);
            }

            tracing::info!(
                from = from.name(),
                to = target.name(),
                trigger,
                "state transition"
            );
        }

        self.run_callbacks(target);
        true
    }

    /// Register a callback executed whenever `state` is entered
    pub fn register_callback(&self, state: ConversationState, callback: StateCallback) {
        self.callbacks
            .lock()
            .expect("callback lock poisoned")
            .push((state, callback));
        tracing::debug!(state = state.name(), "registered state callback");
    }

    fn run_callbacks(&self, entered: ConversationState) {
        // Clone the matching callbacks out so a callback may itself request
        // a transition without deadlocking on the registry lock.
        let matching: Vec<StateCallback> = {
            let callbacks = self.callbacks.lock().expect("callback lock poisoned");
            callbacks
                .iter()
                .filter(|(state, _)| *state == entered)
                .map(|(_, cb)| StateCallback::clone(cb))
                .collect()
        };

        for callback in matching {
            if std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| callback())).is_err() {
                tracing::error!(state = entered.name(), "state callback panicked");
            }
        }
    }

    /// Refresh the activity timestamp without changing state
    pub fn reset_activity_timer(&self) {
        self.inner.lock().expect("state lock poisoned").last_activity = Instant::now();
    }

    /// Most recent transitions, newest last
    #[must_use]
    pub fn history(&self, limit: usize) -> Vec<StateTransition> {
        let inner = self.inner.lock().expect("state lock poisoned");
        let start = inner.history.len().saturating_sub(limit);
        inner.history[start..].to_vec()
    }
}
