//! Connection lifecycle state machine shared by both session managers

use std::fmt;

/// Which side of the link a session serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Producer,
    Consumer,
}

/// Lifecycle state of an owned connection session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Connecting,
    /// Producer only: connected, snapshot being built and pushed
    Connected,
    /// Consumer only: connected with the receiver registered
    Listening,
    /// Producer only: the cycle's push was accepted
    Pushed,
    Disconnected,
    Failed,
}

impl SessionState {
    /// Whether a connection attempt or live connection is owned right now
    pub fn is_in_flight(self) -> bool {
        matches!(self, SessionState::Connecting | SessionState::Connected | SessionState::Listening)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Listening => "listening",
            SessionState::Pushed => "pushed",
            SessionState::Disconnected => "disconnected",
            SessionState::Failed => "failed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs to the lifecycle machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// `start_sync()` / `start()` called
    Start,
    /// Transport reported a live connection
    Connected,
    /// Transport refused or timed out the connect
    ConnectionFailed,
    /// Live connection dropped by the service
    Suspended,
    /// Producer push accepted
    Pushed,
    /// Producer finished without a push (no data, or push failed)
    NothingPushed,
    /// Explicit teardown
    Teardown,
}

/// The single transition function for both roles.
///
/// Returns the next state, or `None` when the event does not apply in `state`
/// (the caller ignores it and keeps the current state).
pub fn transition(role: Role, state: SessionState, event: SessionEvent) -> Option<SessionState> {
    use SessionEvent as E;
    use SessionState as S;

    match (role, state, event) {
        (_, s, E::Teardown) if s != S::Idle => Some(S::Disconnected),

        (_, S::Idle | S::Pushed | S::Disconnected | S::Failed, E::Start) => Some(S::Connecting),
        (_, S::Connecting, E::ConnectionFailed) => Some(S::Failed),

        (Role::Producer, S::Connecting, E::Connected) => Some(S::Connected),
        (Role::Producer, S::Connected, E::Pushed) => Some(S::Pushed),
        (Role::Producer, S::Connected, E::NothingPushed) => Some(S::Disconnected),
        (Role::Producer, S::Connecting | S::Connected, E::Suspended) => Some(S::Disconnected),

        (Role::Consumer, S::Connecting, E::Connected) => Some(S::Listening),
        (Role::Consumer, S::Listening, E::Suspended) => Some(S::Connecting),

        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const STATES: [SessionState; 7] = [
        SessionState::Idle,
        SessionState::Connecting,
        SessionState::Connected,
        SessionState::Listening,
        SessionState::Pushed,
        SessionState::Disconnected,
        SessionState::Failed,
    ];

    const EVENTS: [SessionEvent; 7] = [
        SessionEvent::Start,
        SessionEvent::Connected,
        SessionEvent::ConnectionFailed,
        SessionEvent::Suspended,
        SessionEvent::Pushed,
        SessionEvent::NothingPushed,
        SessionEvent::Teardown,
    ];

    fn run(role: Role, events: &[SessionEvent]) -> SessionState {
        events.iter().fold(SessionState::Idle, |state, event| {
            transition(role, state, *event).unwrap_or(state)
        })
    }

    #[test]
    fn producer_happy_path() {
        use SessionEvent::*;
        assert_eq!(run(Role::Producer, &[Start, Connected, Pushed]), SessionState::Pushed);
        assert_eq!(run(Role::Producer, &[Start, Connected, NothingPushed]), SessionState::Disconnected);
        assert_eq!(run(Role::Producer, &[Start, ConnectionFailed]), SessionState::Failed);
    }

    #[test]
    fn producer_start_is_ignored_while_in_flight() {
        assert_eq!(transition(Role::Producer, SessionState::Connecting, SessionEvent::Start), None);
        assert_eq!(transition(Role::Producer, SessionState::Connected, SessionEvent::Start), None);
    }

    #[test]
    fn consumer_suspension_returns_to_connecting() {
        use SessionEvent::*;
        assert_eq!(run(Role::Consumer, &[Start, Connected]), SessionState::Listening);
        assert_eq!(run(Role::Consumer, &[Start, Connected, Suspended]), SessionState::Connecting);
        assert_eq!(
            run(Role::Consumer, &[Start, Connected, Suspended, Connected]),
            SessionState::Listening
        );
        assert_eq!(run(Role::Consumer, &[Start, Connected, Teardown]), SessionState::Disconnected);
    }

    #[test]
    fn consumer_never_reaches_producer_states() {
        for state in STATES {
            for event in EVENTS {
                let next = transition(Role::Consumer, state, event);
                assert_ne!(next, Some(SessionState::Connected));
                assert_ne!(next, Some(SessionState::Pushed));
            }
        }
    }

    proptest! {
        #[test]
        fn prop_no_second_connection_while_in_flight(
            events in prop::collection::vec(prop::sample::select(EVENTS.to_vec()), 0..40),
            producer in any::<bool>()
        ) {
            let role = if producer { Role::Producer } else { Role::Consumer };
            let mut state = SessionState::Idle;
            for event in events {
                let next = transition(role, state, event);
                if state.is_in_flight() && event == SessionEvent::Start {
                    prop_assert_eq!(next, None);
                }
                state = next.unwrap_or(state);
            }
        }
    }
}
