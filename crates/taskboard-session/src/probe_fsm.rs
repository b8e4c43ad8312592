//! Boot probe state machine using rust-fsm.
//!
//! ```text
//! ┌────────────┐  ProbeStarted   ┌────────────┐  ProbeSucceeded / ProbeFailed  ┌────────────┐
//! │  Unprobed  │ ──────────────► │  Probing   │ ─────────────────────────────► │  Settled   │
//! └────────────┘                 └────────────┘                                └────────────┘
//!   (initial)                                                                     (terminal)
//! ```
//!
//! `Settled` has no outgoing transitions: a process probes at most once.

use rust_fsm::*;

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub probe_machine(Unprobed)

    Unprobed => {
        ProbeStarted => Probing
    },
    Probing => {
        ProbeSucceeded => Settled,
        ProbeFailed => Settled
    }
}

pub use probe_machine::Input as ProbeMachineInput;
pub use probe_machine::State as ProbeMachineState;
pub use probe_machine::StateMachine as ProbeMachine;

/// Public view of the probe lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbePhase {
    Unprobed,
    Probing,
    Settled,
}

impl ProbePhase {
    pub fn is_settled(&self) -> bool {
        matches!(self, ProbePhase::Settled)
    }
}

impl From<&ProbeMachineState> for ProbePhase {
    fn from(state: &ProbeMachineState) -> Self {
        match state {
            ProbeMachineState::Unprobed => ProbePhase::Unprobed,
            ProbeMachineState::Probing => ProbePhase::Probing,
            ProbeMachineState::Settled => ProbePhase::Settled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_unprobed() {
        let machine = ProbeMachine::new();
        assert_eq!(*machine.state(), ProbeMachineState::Unprobed);
    }

    #[test]
    fn test_success_settles() {
        let mut machine = ProbeMachine::new();
        machine.consume(&ProbeMachineInput::ProbeStarted).unwrap();
        assert_eq!(*machine.state(), ProbeMachineState::Probing);
        machine.consume(&ProbeMachineInput::ProbeSucceeded).unwrap();
        assert_eq!(*machine.state(), ProbeMachineState::Settled);
    }

    #[test]
    fn test_failure_settles() {
        let mut machine = ProbeMachine::new();
        machine.consume(&ProbeMachineInput::ProbeStarted).unwrap();
        machine.consume(&ProbeMachineInput::ProbeFailed).unwrap();
        assert_eq!(*machine.state(), ProbeMachineState::Settled);
    }

    #[test]
    fn test_settled_is_terminal() {
        let mut machine = ProbeMachine::new();
        machine.consume(&ProbeMachineInput::ProbeStarted).unwrap();
        machine.consume(&ProbeMachineInput::ProbeFailed).unwrap();

        assert!(machine.consume(&ProbeMachineInput::ProbeStarted).is_err());
        assert!(machine.consume(&ProbeMachineInput::ProbeSucceeded).is_err());
        assert_eq!(*machine.state(), ProbeMachineState::Settled);
    }

    #[test]
    fn test_cannot_settle_without_probing() {
        let mut machine = ProbeMachine::new();
        assert!(machine.consume(&ProbeMachineInput::ProbeSucceeded).is_err());
        assert!(machine.consume(&ProbeMachineInput::ProbeStarted).is_ok());
        assert!(machine.consume(&ProbeMachineInput::ProbeStarted).is_err());
    }

    #[test]
    fn test_phase_conversion() {
        assert_eq!(
            ProbePhase::from(&ProbeMachineState::Probing),
            ProbePhase::Probing
        );
        assert!(ProbePhase::from(&ProbeMachineState::Settled).is_settled());
    }
}
