//! Connection lifecycle as a pure state machine.
//!
//! The driver task feeds transport outcomes in and carries out the returned
//! [`Action`]; nothing in here touches timers or sockets, so every transition
//! can be checked without a runtime.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    /// Manual `connect()`.
    Connect,
    /// Transport handshake completed.
    Opened,
    /// Handshake attempt failed.
    Failed,
    /// A live connection went away.
    Dropped,
    /// Manual `disconnect()`.
    Disconnect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    Open,
    /// Announce our identity; must precede any other traffic on the new link.
    Register,
    Retry { attempt: u32, delay: Duration },
    GiveUp,
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { base_delay: Duration::from_secs(1), max_attempts: 5 }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (1-based): base, 2*base, 4*base, ...
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exp)
    }
}

#[derive(Debug, Clone)]
pub struct Machine {
    policy: ReconnectPolicy,
    state: ConnState,
    attempt: u32,
}

impl Machine {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self { policy, state: ConnState::Disconnected, attempt: 0 }
    }

    pub fn state(&self) -> ConnState {
        self.state
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn step(&mut self, input: Input) -> Action {
        use ConnState::*;
        match (self.state, input) {
            (Disconnected, Input::Connect) => {
                self.state = Connecting;
                self.attempt = 0;
                Action::Open
            }
            (Connecting | Connected, Input::Connect) => Action::None,
            (Connecting, Input::Opened) => {
                self.state = Connected;
                self.attempt = 0;
                Action::Register
            }
            (Connecting, Input::Failed) | (Connected, Input::Dropped) => {
                self.attempt += 1;
                if self.attempt <= self.policy.max_attempts {
                    self.state = Connecting;
                    Action::Retry { attempt: self.attempt, delay: self.policy.delay_for(self.attempt) }
                } else {
                    self.state = Disconnected;
                    Action::GiveUp
                }
            }
            (_, Input::Disconnect) => {
                let was_live = self.state != Disconnected;
                self.state = Disconnected;
                self.attempt = 0;
                if was_live { Action::Close } else { Action::None }
            }
            // late transport outcomes for a connection we no longer want
            (Disconnected, _) | (Connected, Input::Opened | Input::Failed) | (Connecting, Input::Dropped) => {
                Action::None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> Machine {
        Machine::new(ReconnectPolicy::default())
    }

    #[test]
    fn connect_then_open_registers() {
        let mut m = machine();
        assert_eq!(m.step(Input::Connect), Action::Open);
        assert_eq!(m.state(), ConnState::Connecting);
        assert_eq!(m.step(Input::Connect), Action::None);
        assert_eq!(m.step(Input::Opened), Action::Register);
        assert_eq!(m.state(), ConnState::Connected);
        assert_eq!(m.step(Input::Connect), Action::None);
    }

    #[test]
    fn backoff_doubles_and_stops_after_five() {
        let mut m = machine();
        m.step(Input::Connect);
        let mut delays = Vec::new();
        for _ in 0..5 {
            match m.step(Input::Failed) {
                Action::Retry { delay, .. } => delays.push(delay.as_secs()),
                other => panic!("expected retry, got {other:?}"),
            }
            assert_eq!(m.state(), ConnState::Connecting);
        }
        assert_eq!(delays, vec![1, 2, 4, 8, 16]);
        assert_eq!(m.step(Input::Failed), Action::GiveUp);
        assert_eq!(m.state(), ConnState::Disconnected);
        assert_eq!(m.step(Input::Failed), Action::None);
        assert_eq!(m.step(Input::Connect), Action::Open);
        assert_eq!(m.attempt(), 0);
    }

    #[test]
    fn success_resets_attempts() {
        let mut m = machine();
        m.step(Input::Connect);
        m.step(Input::Failed);
        m.step(Input::Failed);
        m.step(Input::Opened);
        assert_eq!(m.attempt(), 0);
        assert_eq!(m.step(Input::Dropped), Action::Retry { attempt: 1, delay: Duration::from_secs(1) });
    }

    #[test]
    fn disconnect_wins_over_pending_retry() {
        let mut m = machine();
        m.step(Input::Connect);
        m.step(Input::Failed);
        assert_eq!(m.step(Input::Disconnect), Action::Close);
        assert_eq!(m.state(), ConnState::Disconnected);
        assert_eq!(m.step(Input::Opened), Action::None);
        assert_eq!(m.step(Input::Disconnect), Action::None);
    }
}
