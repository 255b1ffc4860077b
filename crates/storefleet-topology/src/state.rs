use crate::TopologyError;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationState {
    Unregistered,
    Registering,
    Registered,
}

impl RegistrationState {
    pub fn can_transition_to(self, to: RegistrationState) -> bool {
        use RegistrationState::{Registered, Registering, Unregistered};
        matches!(
            (self, to),
            (Unregistered | Registered, Registering)
                | (Registering, Registered | Unregistered)
                | (Registered, Unregistered)
        )
    }

    pub fn transition(self, to: RegistrationState) -> Result<RegistrationState, TopologyError> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(TopologyError::InvalidTransition { from: self, to })
        }
    }
}

impl fmt::Display for RegistrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RegistrationState::Unregistered => "unregistered",
            RegistrationState::Registering => "registering",
            RegistrationState::Registered => "registered",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::RegistrationState::*;
    use super::*;

    #[test]
    fn valid_transitions() {
        assert!(Unregistered.can_transition_to(Registering));
        assert!(Registering.can_transition_to(Registered));
        assert!(Registering.can_transition_to(Unregistered));
        assert!(Registered.can_transition_to(Unregistered));
        // self-heal re-enters registering
        assert!(Registered.can_transition_to(Registering));
    }

    #[test]
    fn invalid_transitions() {
        assert!(!Unregistered.can_transition_to(Registered));
        assert!(!Unregistered.can_transition_to(Unregistered));
        assert!(!Registered.can_transition_to(Registered));
        assert!(!Registering.can_transition_to(Registering));
    }

    #[test]
    fn transition_error_names_both_states() {
        let err = Unregistered.transition(Registered).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid registration transition: unregistered -> registered"
        );
    }
}
